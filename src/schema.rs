use std::sync::Arc;

use async_graphql::{
    Context, EmptySubscription, InputObject, Object, ResultExt, Schema, SimpleObject, ID,
};

use crate::app::App;
use crate::auth::{self, Authentication};
use crate::common::errors::ApiError;
use crate::common::helpers::iso;
use crate::models::{NewUser, Post, PostInput, User};
use crate::posts::{self, find_post};
use crate::users::{self, find_user};

pub type BlogSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

pub fn build_schema() -> BlogSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription).finish()
}

static ANONYMOUS: Authentication = Authentication::Unauthenticated;

fn app<'a>(ctx: &Context<'a>) -> async_graphql::Result<&'a Arc<App>> {
    ctx.data::<Arc<App>>()
}

fn authentication<'a>(ctx: &Context<'a>) -> &'a Authentication {
    ctx.data_opt::<Authentication>().unwrap_or(&ANONYMOUS)
}

// === Output types ===

pub struct PostObject(pub Post);

#[Object(name = "Post")]
impl PostObject {
    #[graphql(name = "_id")]
    async fn id(&self) -> ID {
        ID(self.0.id.clone())
    }

    async fn title(&self) -> &str {
        &self.0.title
    }

    async fn content(&self) -> &str {
        &self.0.content
    }

    async fn image_url(&self) -> &str {
        &self.0.image_url
    }

    async fn created_at(&self) -> String {
        iso(&self.0.created_at)
    }

    async fn updated_at(&self) -> String {
        iso(&self.0.updated_at)
    }

    async fn creator(&self, ctx: &Context<'_>) -> async_graphql::Result<UserObject> {
        let app = app(ctx)?;
        let user = find_user(app.store(), &self.0.creator)
            .map_err(ApiError::from)
            .and_then(|u| u.ok_or_else(|| ApiError::NotFound("Creator not found".to_string())))
            .extend()?;
        Ok(UserObject(user))
    }
}

pub struct UserObject(pub User);

#[Object(name = "User")]
impl UserObject {
    #[graphql(name = "_id")]
    async fn id(&self) -> ID {
        ID(self.0.id.clone())
    }

    async fn email(&self) -> &str {
        &self.0.email
    }

    /// Always null; the stored hash never leaves the server.
    async fn password(&self) -> Option<String> {
        None
    }

    async fn name(&self) -> &str {
        &self.0.name
    }

    async fn status(&self) -> Option<&str> {
        Some(&self.0.status)
    }

    async fn posts(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<PostObject>> {
        let app = app(ctx)?;
        let mut posts = Vec::with_capacity(self.0.posts.len());
        for id in &self.0.posts {
            // dangling ids are tolerated, the creator field is authoritative
            if let Some(post) = find_post(app.store(), id).map_err(ApiError::from).extend()? {
                posts.push(PostObject(post));
            }
        }
        Ok(posts)
    }
}

#[derive(SimpleObject)]
#[graphql(name = "AuthData")]
pub struct AuthDataObject {
    token: String,
    user_id: String,
}

#[derive(SimpleObject)]
#[graphql(name = "LoadPostData")]
pub struct LoadPostData {
    posts: Vec<PostObject>,
    total_posts: i32,
}

// === Input types ===

#[derive(InputObject)]
#[graphql(name = "PostData")]
pub struct PostData {
    title: String,
    content: String,
    image_url: String,
}

impl From<PostData> for PostInput {
    fn from(data: PostData) -> Self {
        PostInput {
            title: data.title,
            content: data.content,
            image_url: data.image_url,
        }
    }
}

#[derive(InputObject)]
#[graphql(name = "userData")]
pub struct UserData {
    name: String,
    email: String,
    password: String,
}

#[derive(InputObject)]
#[graphql(name = "userStatus")]
pub struct StatusData {
    status: String,
}

// === Roots ===

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    async fn login_user(
        &self,
        ctx: &Context<'_>,
        email: String,
        password: String,
    ) -> async_graphql::Result<AuthDataObject> {
        let data = auth::login(app(ctx)?, &email, &password).extend()?;
        Ok(AuthDataObject {
            token: data.token,
            user_id: data.user_id,
        })
    }

    async fn load_posts(
        &self,
        ctx: &Context<'_>,
        current_page: i32,
    ) -> async_graphql::Result<LoadPostData> {
        let page = posts::load_posts(app(ctx)?, authentication(ctx), current_page).extend()?;
        Ok(LoadPostData {
            posts: page.posts.into_iter().map(PostObject).collect(),
            total_posts: i32::try_from(page.total_posts).unwrap_or(i32::MAX),
        })
    }

    async fn single_post(&self, ctx: &Context<'_>, post_id: ID) -> async_graphql::Result<PostObject> {
        let post = posts::single_post(app(ctx)?, authentication(ctx), &post_id).extend()?;
        Ok(PostObject(post))
    }

    async fn user_status(&self, ctx: &Context<'_>) -> async_graphql::Result<String> {
        users::user_status(app(ctx)?, authentication(ctx)).extend()
    }
}

pub struct MutationRoot;

#[Object]
impl MutationRoot {
    async fn signup_user(
        &self,
        ctx: &Context<'_>,
        user_input: UserData,
    ) -> async_graphql::Result<UserObject> {
        let input = NewUser {
            name: user_input.name,
            email: user_input.email,
            password: user_input.password,
        };
        let user = users::signup(app(ctx)?, input).extend()?;
        Ok(UserObject(user))
    }

    async fn create_post(
        &self,
        ctx: &Context<'_>,
        user_input: PostData,
    ) -> async_graphql::Result<PostObject> {
        let post = posts::create_post(app(ctx)?, authentication(ctx), user_input.into()).extend()?;
        Ok(PostObject(post))
    }

    async fn update_post(
        &self,
        ctx: &Context<'_>,
        post_id: ID,
        user_input: PostData,
    ) -> async_graphql::Result<PostObject> {
        let post = posts::update_post(app(ctx)?, authentication(ctx), &post_id, user_input.into())
            .extend()?;
        Ok(PostObject(post))
    }

    async fn delete_post(&self, ctx: &Context<'_>, post_id: ID) -> async_graphql::Result<PostObject> {
        let post = posts::delete_post(app(ctx)?, authentication(ctx), &post_id).extend()?;
        Ok(PostObject(post))
    }

    async fn update_status(
        &self,
        ctx: &Context<'_>,
        user_input: StatusData,
    ) -> async_graphql::Result<String> {
        users::update_status(app(ctx)?, authentication(ctx), &user_input.status).extend()
    }
}

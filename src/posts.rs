use chrono::Utc;
use uuid::Uuid;

use crate::app::App;
use crate::auth::Authentication;
use crate::common::db::{post_key, Store, StoreExt, FEED_KEY};
use crate::common::errors::ApiError;
use crate::common::helpers::validate_uuid;
use crate::common::validation::Violations;
use crate::config::{MIN_CONTENT_LENGTH, MIN_TITLE_LENGTH, POSTS_PER_PAGE};
use crate::images::clear_image;
use crate::models::{Identity, Post, PostInput, PostPage};
use crate::users::{find_user, save_user};

// === Content store ===

pub fn find_post(store: &dyn Store, id: &str) -> anyhow::Result<Option<Post>> {
    if !validate_uuid(id) {
        return Ok(None);
    }
    store.get_json(&post_key(id))
}

fn save_post(store: &dyn Store, post: &Post) -> anyhow::Result<()> {
    store.set_json(&post_key(&post.id), post)
}

fn feed(store: &dyn Store) -> anyhow::Result<Vec<String>> {
    Ok(store.get_json(FEED_KEY)?.unwrap_or_default())
}

fn insert_post(store: &dyn Store, post: &Post) -> anyhow::Result<()> {
    save_post(store, post)?;

    let mut feed = feed(store)?;
    feed.insert(0, post.id.clone()); // newest first
    store.set_json(FEED_KEY, &feed)
}

fn remove_post(store: &dyn Store, id: &str) -> anyhow::Result<()> {
    store.delete(&post_key(id))?;

    let mut feed = feed(store)?;
    feed.retain(|p| p != id);
    store.set_json(FEED_KEY, &feed)
}

/// `(page - 1) * POSTS_PER_PAGE` entries of the feed are skipped.
pub fn page_of_posts(store: &dyn Store, page: usize) -> anyhow::Result<PostPage> {
    let feed = feed(store)?;
    let skip = (page.max(1) - 1) * POSTS_PER_PAGE;

    let mut posts = Vec::with_capacity(POSTS_PER_PAGE);
    for id in feed.iter().skip(skip).take(POSTS_PER_PAGE) {
        if let Some(post) = find_post(store, id)? {
            posts.push(post);
        }
    }

    Ok(PostPage {
        posts,
        total_posts: feed.len(),
    })
}

// === Operations ===

fn validate_post(input: &PostInput) -> Result<(), ApiError> {
    let mut violations = Violations::new();
    violations
        .min_length(
            "title",
            &input.title,
            MIN_TITLE_LENGTH,
            "The title is too short, minimum length is 5",
        )
        .min_length(
            "content",
            &input.content,
            MIN_CONTENT_LENGTH,
            "The content is too short, minimum length is 5",
        );
    violations.finish("Bad Input!")
}

/// Browser clients send the literal `"undefined"` when no new image was picked.
fn supplied_image(image_url: &str) -> Option<&str> {
    match image_url.trim() {
        "" | "undefined" | "null" => None,
        url => Some(url),
    }
}

fn owned_post(store: &dyn Store, identity: &Identity, post_id: &str, missing: &str) -> Result<Post, ApiError> {
    let post = find_post(store, post_id)?.ok_or_else(|| ApiError::NotFound(missing.to_string()))?;
    if post.creator != identity.user_id {
        tracing::warn!(post_id, user_id = %identity.user_id, "rejected change to someone else's post");
        return Err(ApiError::Forbidden("Not authorized".to_string()));
    }
    Ok(post)
}

pub fn create_post(app: &App, auth: &Authentication, input: PostInput) -> Result<Post, ApiError> {
    let identity = auth.require()?;
    validate_post(&input)?;

    let store = app.store();
    let mut user = find_user(store, &identity.user_id)?
        .ok_or_else(|| ApiError::Forbidden("Invalid user".to_string()))?;

    let now = Utc::now();
    let post = Post {
        id: Uuid::new_v4().to_string(),
        title: input.title,
        content: input.content,
        image_url: input.image_url,
        creator: user.id.clone(),
        created_at: now,
        updated_at: now,
    };
    insert_post(store, &post)?;

    user.posts.push(post.id.clone());
    save_user(store, &user)?;

    tracing::info!(post_id = %post.id, user_id = %user.id, "post created");
    Ok(post)
}

pub fn load_posts(app: &App, auth: &Authentication, current_page: i32) -> Result<PostPage, ApiError> {
    auth.require()?;
    let page = usize::try_from(current_page).unwrap_or(1).max(1);
    Ok(page_of_posts(app.store(), page)?)
}

pub fn single_post(app: &App, auth: &Authentication, post_id: &str) -> Result<Post, ApiError> {
    auth.require()?;
    find_post(app.store(), post_id)?.ok_or_else(|| ApiError::NotFound("Post not found".to_string()))
}

pub fn update_post(
    app: &App,
    auth: &Authentication,
    post_id: &str,
    input: PostInput,
) -> Result<Post, ApiError> {
    let identity = auth.require()?;
    validate_post(&input)?;

    let store = app.store();
    let mut post = owned_post(store, identity, post_id, "No post found")?;

    if let Some(image_url) = supplied_image(&input.image_url) {
        post.image_url = image_url.to_string();
    }
    post.title = input.title;
    post.content = input.content;
    post.updated_at = Utc::now();
    save_post(store, &post)?;

    tracing::info!(post_id = %post.id, "post updated");
    Ok(post)
}

pub fn delete_post(app: &App, auth: &Authentication, post_id: &str) -> Result<Post, ApiError> {
    let identity = auth.require()?;

    let store = app.store();
    let post = owned_post(store, identity, post_id, "Post not found")?;

    clear_image(store, &post.image_url);
    remove_post(store, &post.id)?;

    // back-reference is an index; a missing creator record only leaves it stale
    match find_user(store, &identity.user_id)? {
        Some(mut user) => {
            user.posts.retain(|id| id != &post.id);
            save_user(store, &user)?;
        }
        None => tracing::warn!(user_id = %identity.user_id, "creator record missing on delete"),
    }

    tracing::info!(post_id = %post.id, "post deleted");
    Ok(post)
}

use uuid::Uuid;

use crate::app::App;
use crate::auth::Authentication;
use crate::common::db::{email_key, user_key, Store, StoreExt, USERS_LIST_KEY};
use crate::common::errors::ApiError;
use crate::common::helpers::hash_password;
use crate::common::validation::Violations;
use crate::config::{DEFAULT_STATUS, MIN_PASSWORD_LENGTH, MIN_STATUS_LENGTH};
use crate::models::{NewUser, User};

// === Credential store ===

pub fn find_user(store: &dyn Store, id: &str) -> anyhow::Result<Option<User>> {
    store.get_json(&user_key(id))
}

pub fn find_user_by_email(store: &dyn Store, email: &str) -> anyhow::Result<Option<User>> {
    match store.get_json::<String>(&email_key(email))? {
        Some(id) => find_user(store, &id),
        None => Ok(None),
    }
}

pub fn save_user(store: &dyn Store, user: &User) -> anyhow::Result<()> {
    store.set_json(&user_key(&user.id), user)
}

fn insert_user(store: &dyn Store, user: &User) -> anyhow::Result<()> {
    save_user(store, user)?;
    store.set_json(&email_key(&user.email), &user.id)?;

    let mut users: Vec<String> = store.get_json(USERS_LIST_KEY)?.unwrap_or_default();
    users.push(user.id.clone());
    store.set_json(USERS_LIST_KEY, &users)?;
    Ok(())
}

// === Operations ===

pub fn signup(app: &App, input: NewUser) -> Result<User, ApiError> {
    let mut violations = Violations::new();
    violations
        .email("email", &input.email, "Invalid email")
        .min_length(
            "password",
            &input.password,
            MIN_PASSWORD_LENGTH,
            "Password is too short",
        );
    violations.finish("Bad Input")?;

    let store = app.store();
    if store.exists(&email_key(&input.email))? {
        return Err(ApiError::Conflict("User already exists".to_string()));
    }

    let user = User {
        id: Uuid::new_v4().to_string(),
        email: input.email,
        password: hash_password(&input.password, app.config())?,
        name: input.name,
        status: DEFAULT_STATUS.to_string(),
        posts: Vec::new(),
    };
    insert_user(store, &user)?;

    tracing::info!(user_id = %user.id, "user signed up");
    Ok(user)
}

pub fn user_status(app: &App, auth: &Authentication) -> Result<String, ApiError> {
    let identity = auth.require()?;

    let user = find_user(app.store(), &identity.user_id)?
        .ok_or_else(|| ApiError::NotFound("No status found".to_string()))?;
    Ok(user.status)
}

pub fn update_status(app: &App, auth: &Authentication, status: &str) -> Result<String, ApiError> {
    let identity = auth.require()?;

    let mut violations = Violations::new();
    violations.min_length("status", status, MIN_STATUS_LENGTH, "Status is too short");
    violations.finish("Bad Input")?;

    let store = app.store();
    let mut user = find_user(store, &identity.user_id)?
        .ok_or_else(|| ApiError::NotFound("User does not exist".to_string()))?;

    user.status = status.to_string();
    save_user(store, &user)?;

    tracing::info!(user_id = %user.id, "status updated");
    Ok(user.status)
}

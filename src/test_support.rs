use std::sync::Arc;

use crate::app::App;
use crate::auth::{login, Authentication};
use crate::common::db::MemoryStore;
use crate::config::Config;
use crate::models::{NewUser, User};
use crate::users::signup;

pub const PASSWORD: &str = "password123";

/// App over a fresh in-memory store with cheap password hashing.
pub fn test_app() -> Arc<App> {
    let mut config = Config::new("test-secret-key-for-testing");
    config.hash_memory_kib = 64;
    config.hash_iterations = 1;
    App::new(config, Arc::new(MemoryStore::new()))
}

pub fn signup_as(app: &App, email: &str) -> User {
    signup(
        app,
        NewUser {
            name: email.split('@').next().unwrap_or("user").to_string(),
            email: email.to_string(),
            password: PASSWORD.to_string(),
        },
    )
    .unwrap()
}

pub fn login_as(app: &App, email: &str) -> Authentication {
    let data = login(app, email, PASSWORD).unwrap();
    Authentication::Authenticated(app.tokens().verify(&data.token).unwrap())
}

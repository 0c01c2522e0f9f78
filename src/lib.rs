use std::sync::Arc;

use spin_sdk::{
    http::{IntoResponse, Request, Response},
    http_component,
};

pub mod app;
pub mod auth;
pub mod config;
pub mod handlers;
pub mod images;
pub mod models;
pub mod posts;
pub mod schema;
pub mod users;

pub mod common {
    pub mod db;
    pub mod errors;
    pub mod helpers;
    pub mod validation;
}

#[cfg(test)]
mod test_support;

use crate::app::App;
use crate::auth::Authentication;
use crate::common::db::SpinKv;
use crate::common::errors::ApiError;
use crate::common::helpers::init_tracing;
use crate::config::Config;

const CORS_HEADERS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "GET, POST, PUT, PATCH, DELETE"),
    ("Access-Control-Allow-Headers", "Content-Type, Authorization"),
];

fn with_cors(mut resp: Response) -> Response {
    for (name, value) in CORS_HEADERS {
        resp.set_header(name, value);
    }
    resp
}

/// Runs the auth gate, then dispatches. Every response carries CORS headers.
pub async fn route(app: &Arc<App>, req: Request) -> Response {
    let method = req.method().to_string();
    let path = req.path().to_string();

    if method == "OPTIONS" {
        return with_cors(Response::builder().status(200).build());
    }

    let auth = Authentication::from_request(&req, app.tokens());
    tracing::debug!(%method, %path, authenticated = auth.is_authenticated(), "request");

    let result: Result<Response, ApiError> = match (method.as_str(), path.as_str()) {
        ("POST", "/graphql") => Ok(handlers::graphql(app, auth, &req).await),
        ("GET", "/graphql") => Ok(handlers::graphiql()),
        ("PUT", "/post-image") => handlers::post_image(app, &auth, &req).await,
        ("GET", p) if p.starts_with("/images/") => {
            images::serve_image(app.store(), p).map_err(ApiError::from)
        }
        _ => Err(ApiError::NotFound("No route found".to_string())),
    };

    with_cors(result.unwrap_or_else(Response::from))
}

// === Component entrypoint ===
#[cfg_attr(target_arch = "wasm32", http_component)]
async fn handle(req: Request) -> anyhow::Result<impl IntoResponse> {
    init_tracing();

    let config = Config::from_spin_variables()?;
    let store = Arc::new(SpinKv::new(config.store_label.clone()));
    let app = App::new(config, store);

    Ok(route(&app, req).await)
}

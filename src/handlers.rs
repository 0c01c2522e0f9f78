use std::convert::Infallible;
use std::sync::Arc;

use async_graphql::http::GraphiQLSource;
use spin_sdk::http::{Request, Response};

use crate::app::App;
use crate::auth::Authentication;
use crate::common::errors::ApiError;
use crate::common::helpers::{json_response, message_response};
use crate::images::{clear_image, is_accepted_type, store_image};

/// `POST /graphql`
pub async fn graphql(app: &Arc<App>, auth: Authentication, req: &Request) -> Response {
    let request: async_graphql::Request = match serde_json::from_slice(req.body()) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(error = %e, "unparsable graphql request");
            return message_response(400, "Invalid GraphQL request body");
        }
    };

    let response = app
        .schema()
        .execute(request.data(Arc::clone(app)).data(auth))
        .await;

    let failed = !response.errors.is_empty() && response.data == async_graphql::Value::Null;
    let mut body = match serde_json::to_value(&response) {
        Ok(body) => body,
        Err(e) => return ApiError::Internal(e.into()).into(),
    };
    if let Some(errors) = body.get_mut("errors").and_then(|e| e.as_array_mut()) {
        for error in errors.iter_mut() {
            flatten_error(error);
        }
    }

    json_response(if failed { 500 } else { 200 }, &body)
}

/// Lifts `statusCode` and `data` out of the extensions so clients see
/// `{message, statusCode, data, locations, path}`.
fn flatten_error(error: &mut serde_json::Value) {
    let Some(object) = error.as_object_mut() else {
        return;
    };
    let Some(serde_json::Value::Object(mut extensions)) = object.remove("extensions") else {
        return;
    };
    for key in ["statusCode", "data"] {
        if let Some(value) = extensions.remove(key) {
            object.insert(key.to_string(), value);
        }
    }
    if !extensions.is_empty() {
        object.insert("extensions".to_string(), serde_json::Value::Object(extensions));
    }
}

/// `GET /graphql`
pub fn graphiql() -> Response {
    Response::builder()
        .status(200)
        .header("Content-Type", "text/html; charset=utf-8")
        .body(GraphiQLSource::build().endpoint("/graphql").finish())
        .build()
}

struct ImageFile {
    name: String,
    content_type: String,
    bytes: bytes::Bytes,
}

#[derive(Default)]
struct Upload {
    file: Option<ImageFile>,
    old_path: Option<String>,
}

fn malformed(e: multer::Error) -> ApiError {
    tracing::warn!(error = %e, "malformed multipart upload");
    ApiError::bad_input("Malformed upload")
}

async fn read_upload(req: &Request) -> Result<Upload, ApiError> {
    let mut upload = Upload::default();

    let boundary = req
        .header("Content-Type")
        .and_then(|h| h.as_str())
        .and_then(|ct| multer::parse_boundary(ct).ok());
    let Some(boundary) = boundary else {
        return Ok(upload);
    };

    let body = bytes::Bytes::copy_from_slice(req.body());
    let stream = futures_util::stream::once(async move { Ok::<_, Infallible>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("image") => {
                let content_type = field
                    .content_type()
                    .map(|m| m.essence_str().to_string())
                    .unwrap_or_default();
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field.bytes().await.map_err(malformed)?;

                if !is_accepted_type(&content_type) {
                    tracing::info!(content_type = %content_type, "ignoring upload of unsupported type");
                } else if upload.file.is_none() {
                    upload.file = Some(ImageFile {
                        name: file_name,
                        content_type,
                        bytes,
                    });
                }
            }
            Some("oldPath") | Some("oldpath") => {
                upload.old_path = Some(field.text().await.map_err(malformed)?);
            }
            _ => {}
        }
    }

    Ok(upload)
}

/// `PUT /post-image`
pub async fn post_image(app: &App, auth: &Authentication, req: &Request) -> Result<Response, ApiError> {
    auth.require()?;

    let upload = read_upload(req).await?;
    let Some(file) = upload.file else {
        return Ok(message_response(200, "No file picked"));
    };

    let path = store_image(app.store(), &file.name, &file.content_type, &file.bytes)?;
    if let Some(old_path) = upload.old_path.filter(|p| !p.trim().is_empty()) {
        clear_image(app.store(), &old_path);
    }

    Ok(json_response(
        201,
        &serde_json::json!({ "message": "File stored", "path": path }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extensions_are_flattened() {
        let mut error = json!({
            "message": "Bad Input!",
            "locations": [{"line": 1, "column": 3}],
            "path": ["createPost"],
            "extensions": {"statusCode": 422, "data": [{"field": "title", "message": "short"}]}
        });
        flatten_error(&mut error);

        assert_eq!(error["statusCode"], 422);
        assert_eq!(error["data"][0]["field"], "title");
        assert!(error.get("extensions").is_none());
        assert_eq!(error["path"][0], "createPost");
    }

    #[test]
    fn errors_without_extensions_are_untouched() {
        let mut error = json!({"message": "Unknown field \"nope\""});
        flatten_error(&mut error);
        assert_eq!(error, json!({"message": "Unknown field \"nope\""}));
    }
}

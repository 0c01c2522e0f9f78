use async_graphql::ErrorExtensions;
use serde::Serialize;
use spin_sdk::http::Response;
use thiserror::Error;

use crate::common::helpers::json_response;

/// One failed validation rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    BadInput {
        message: String,
        violations: Vec<FieldViolation>,
    },
    #[error("{0}")]
    Unauthenticated(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("An error occurred!")]
    Internal(#[source] anyhow::Error),
}

/// Body shared by REST error responses and GraphQL error entries.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub message: String,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub data: Option<Vec<FieldViolation>>,
}

impl ApiError {
    pub fn bad_input(message: impl Into<String>) -> Self {
        ApiError::BadInput {
            message: message.into(),
            violations: Vec::new(),
        }
    }

    pub fn not_authenticated() -> Self {
        ApiError::Unauthenticated("Not authenticated".to_string())
    }

    pub fn status(&self) -> http::StatusCode {
        match self {
            ApiError::BadInput { .. } | ApiError::Conflict(_) => {
                http::StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::Unauthenticated(_) => http::StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => http::StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => http::StatusCode::NOT_FOUND,
            ApiError::Internal(_) => http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn violations(&self) -> &[FieldViolation] {
        match self {
            ApiError::BadInput { violations, .. } => violations,
            _ => &[],
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        if let ApiError::Internal(source) = self {
            tracing::error!(error = ?source, "internal error");
        }
        let violations = self.violations();
        ErrorEnvelope {
            message: self.to_string(),
            status_code: self.status().as_u16(),
            data: (!violations.is_empty()).then(|| violations.to_vec()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl From<ApiError> for Response {
    fn from(err: ApiError) -> Self {
        let envelope = err.envelope();
        json_response(envelope.status_code, &envelope)
    }
}

impl ErrorExtensions for ApiError {
    fn extend(&self) -> async_graphql::Error {
        let envelope = self.envelope();
        async_graphql::Error::new(envelope.message).extend_with(|_, e| {
            e.set("statusCode", envelope.status_code as i32);
            if let Some(data) = &envelope.data {
                match serde_json::to_value(data).map(async_graphql::Value::from_json) {
                    Ok(Ok(value)) => e.set("data", value),
                    _ => tracing::warn!("could not attach violations to graphql error"),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_error_kinds() {
        assert_eq!(ApiError::bad_input("x").status().as_u16(), 422);
        assert_eq!(ApiError::Conflict("dup".into()).status().as_u16(), 422);
        assert_eq!(ApiError::not_authenticated().status().as_u16(), 401);
        assert_eq!(ApiError::Forbidden("no".into()).status().as_u16(), 403);
        assert_eq!(ApiError::NotFound("gone".into()).status().as_u16(), 404);
        assert_eq!(
            ApiError::Internal(anyhow::anyhow!("disk on fire")).status().as_u16(),
            500
        );
    }

    #[test]
    fn internal_errors_do_not_leak_details() {
        let envelope = ApiError::Internal(anyhow::anyhow!("password table missing")).envelope();
        assert_eq!(envelope.message, "An error occurred!");
        assert!(envelope.data.is_none());
    }

    #[test]
    fn envelope_carries_violations() {
        let err = ApiError::BadInput {
            message: "Bad Input!".into(),
            violations: vec![FieldViolation {
                field: "title".into(),
                message: "too short".into(),
            }],
        };
        let json = serde_json::to_value(err.envelope()).unwrap();
        assert_eq!(json["statusCode"], 422);
        assert_eq!(json["data"][0]["field"], "title");
    }

    #[test]
    fn graphql_extension_includes_status() {
        let gql = ApiError::NotFound("Post not found".into()).extend();
        assert_eq!(gql.message, "Post not found");
        let json =
            serde_json::to_value(gql.into_server_error(async_graphql::Pos::default())).unwrap();
        assert_eq!(json["extensions"]["statusCode"], 404);
    }
}

use std::sync::Once;

use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use chrono::{DateTime, SecondsFormat, Utc};
use rand::rngs::OsRng;
use serde::Serialize;
use spin_sdk::http::Response;
use uuid::Uuid;

use crate::config::Config;

/// JavaScript-style ISO timestamp (`2024-01-01T00:00:00.000Z`).
pub fn iso(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn json_response<T: Serialize>(status: u16, body: &T) -> Response {
    let body = match serde_json::to_vec(body) {
        Ok(body) => body,
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize response body");
            return Response::builder().status(500).body("Internal Server Error").build();
        }
    };
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(body)
        .build()
}

pub fn message_response(status: u16, message: &str) -> Response {
    json_response(status, &serde_json::json!({ "message": message }))
}

fn hasher(config: &Config) -> anyhow::Result<Argon2<'static>> {
    let params = Params::new(config.hash_memory_kib, config.hash_iterations, 1, None)
        .map_err(|e| anyhow::anyhow!("Invalid password hash parameters: {}", e))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

pub fn hash_password(password: &str, config: &Config) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    hasher(config)?
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))
}

/// Cost parameters are read back from the PHC string, so hashes made with
/// older settings keep verifying.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

pub fn validate_uuid(id: &str) -> bool {
    Uuid::parse_str(id).is_ok()
}

/// Installs the fmt subscriber once. Later calls are no-ops.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap_config() -> Config {
        let mut config = Config::new("secret");
        config.hash_memory_kib = 64;
        config.hash_iterations = 1;
        config
    }

    #[test]
    fn hashed_password_verifies() {
        let hash = hash_password("correct horse", &cheap_config()).unwrap();
        assert_ne!(hash, "correct horse");
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
    }

    #[test]
    fn garbage_hash_never_verifies() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn iso_uses_millis_and_z() {
        let at = DateTime::parse_from_rfc3339("2024-03-01T10:20:30Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(iso(&at), "2024-03-01T10:20:30.000Z");
    }

    #[test]
    fn uuid_check() {
        assert!(validate_uuid(&Uuid::new_v4().to_string()));
        assert!(!validate_uuid("post-1"));
    }
}

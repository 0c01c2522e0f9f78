use anyhow::Context;

pub const TOKEN_TTL_HOURS: i64 = 1;
pub const POSTS_PER_PAGE: usize = 2;
pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MIN_TITLE_LENGTH: usize = 5;
pub const MIN_CONTENT_LENGTH: usize = 5;
pub const MIN_STATUS_LENGTH: usize = 5;
pub const DEFAULT_STATUS: &str = "I am new!";
pub const IMAGE_PREFIX: &str = "images";

/// Runtime settings, built once at startup and handed to [`crate::app::App`].
#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub store_label: String,
    pub bind_addr: String,
    pub hash_memory_kib: u32,
    pub hash_iterations: u32,
}

impl Config {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            store_label: "default".to_string(),
            bind_addr: "0.0.0.0:8080".to_string(),
            hash_memory_kib: argon2::Params::DEFAULT_M_COST,
            hash_iterations: argon2::Params::DEFAULT_T_COST,
        }
    }

    /// Reads `QUILL_*` environment variables. Used by the native server.
    pub fn from_env() -> anyhow::Result<Self> {
        let secret = std::env::var("QUILL_JWT_SECRET")
            .context("QUILL_JWT_SECRET must be set")?;
        let mut config = Config::new(secret);

        if let Ok(label) = std::env::var("QUILL_STORE_LABEL") {
            config.store_label = label;
        }
        if let Ok(addr) = std::env::var("QUILL_BIND_ADDR") {
            config.bind_addr = addr;
        }
        config.hash_memory_kib = env_number("QUILL_HASH_MEMORY_KIB", config.hash_memory_kib);
        config.hash_iterations = env_number("QUILL_HASH_ITERATIONS", config.hash_iterations);

        Ok(config)
    }

    /// Reads the component variables declared in the Spin manifest.
    pub fn from_spin_variables() -> anyhow::Result<Self> {
        let secret = spin_sdk::variables::get("jwt_secret")
            .map_err(|e| anyhow::anyhow!("spin variable `jwt_secret` must be set: {:?}", e))?;
        let mut config = Config::new(secret);

        if let Ok(label) = spin_sdk::variables::get("store_label") {
            config.store_label = label;
        }

        Ok(config)
    }
}

fn env_number(name: &str, default: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(default)
}

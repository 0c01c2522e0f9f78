use std::sync::Arc;

use crate::auth::TokenService;
use crate::common::db::Store;
use crate::config::Config;
use crate::schema::{build_schema, BlogSchema};

/// Everything a request needs, built once from [`Config`] at startup.
pub struct App {
    config: Config,
    store: Arc<dyn Store>,
    tokens: TokenService,
    schema: BlogSchema,
}

impl App {
    pub fn new(config: Config, store: Arc<dyn Store>) -> Arc<Self> {
        let tokens = TokenService::new(&config.jwt_secret);
        Arc::new(Self {
            config,
            store,
            tokens,
            schema: build_schema(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn schema(&self) -> &BlogSchema {
        &self.schema
    }
}

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub const USERS_LIST_KEY: &str = "users_list";
pub const FEED_KEY: &str = "feed";

pub fn user_key(id: &str) -> String {
    format!("user:{}", id)
}

pub fn email_key(email: &str) -> String {
    format!("email:{}", email)
}

pub fn post_key(id: &str) -> String {
    format!("post:{}", id)
}

pub fn image_key(file: &str) -> String {
    format!("image:{}", file)
}

pub fn image_type_key(file: &str) -> String {
    format!("image_type:{}", file)
}

/// Byte-oriented key/value document store.
pub trait Store: Send + Sync {
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;
    fn set(&self, key: &str, value: &[u8]) -> anyhow::Result<()>;
    fn delete(&self, key: &str) -> anyhow::Result<()>;
    fn exists(&self, key: &str) -> anyhow::Result<bool>;
}

/// JSON helpers layered over any [`Store`].
pub trait StoreExt: Store {
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>> {
        match self.get(key)? {
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes)
                    .with_context(|| format!("corrupt document at {}", key))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn set_json<T: Serialize>(&self, key: &str, value: &T) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.set(key, &bytes)
    }
}

impl<S: Store + ?Sized> StoreExt for S {}

/// Spin key-value store, opened by label on every call.
pub struct SpinKv {
    label: String,
}

impl SpinKv {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }

    fn open(&self) -> anyhow::Result<spin_sdk::key_value::Store> {
        spin_sdk::key_value::Store::open(&self.label)
            .with_context(|| format!("KV store `{}` must exist", self.label))
    }
}

impl Store for SpinKv {
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.open()?.get(key)?)
    }

    fn set(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        Ok(self.open()?.set(key, value)?)
    }

    fn delete(&self, key: &str) -> anyhow::Result<()> {
        Ok(self.open()?.delete(key)?)
    }

    fn exists(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.open()?.exists(key)?)
    }
}

/// Process-local store used by the native server and tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> anyhow::Result<std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>>> {
        self.entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        self.entries()?.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.entries()?.remove(key);
        Ok(())
    }

    fn exists(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.entries()?.contains_key(key))
    }
}

//! Replicated key-value settings store.
//!
//! World-scoped values every participant can read; only the authority
//! writes. The persistent AfterMain queue lives here.
use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value;

use super::errors::{Result, RuntimeError};

pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>>;

    fn set(&self, key: &str, value: Value) -> Result<()>;
}

/// In-memory store for tests and single-process sessions.
#[derive(Debug, Default)]
pub struct InMemorySettings {
    values: RwLock<HashMap<String, Value>>,
}

impl InMemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for InMemorySettings {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let values = self
            .values
            .read()
            .map_err(|_| RuntimeError::LockPoisoned("settings"))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut values = self
            .values
            .write()
            .map_err(|_| RuntimeError::LockPoisoned("settings"))?;
        values.insert(key.to_owned(), value);
        Ok(())
    }
}

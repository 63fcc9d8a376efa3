use std::sync::Arc;

use crate::api::{Result, SettingsStore};
use crate::protocol::AfterMainEntry;

/// Settings key of the persistent queue.
pub const AFTER_MAIN_KEY: &str = "afterMainQueue";

/// FIFO queue stored as a JSON array in the settings store.
///
/// Reads and writes are not atomic across two callers; only the authority
/// writes, one request at a time.
#[derive(Clone)]
pub struct AfterMainQueue {
    store: Arc<dyn SettingsStore>,
}

impl AfterMainQueue {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    pub fn entries(&self) -> Result<Vec<AfterMainEntry>> {
        match self.store.get(AFTER_MAIN_KEY)? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Vec::new()),
        }
    }

    /// Appends an entry and returns the new queue depth.
    pub fn push(&self, entry: AfterMainEntry) -> Result<usize> {
        let mut entries = self.entries()?;
        entries.push(entry);
        let depth = entries.len();
        self.store
            .set(AFTER_MAIN_KEY, serde_json::to_value(&entries)?)?;
        Ok(depth)
    }

    /// Removes the first `count` entries, keeping anything pushed after
    /// them. Returns the remaining depth.
    pub fn drop_front(&self, count: usize) -> Result<usize> {
        let mut entries = self.entries()?;
        entries.drain(..count.min(entries.len()));
        let depth = entries.len();
        self.store
            .set(AFTER_MAIN_KEY, serde_json::to_value(&entries)?)?;
        Ok(depth)
    }

    pub fn clear(&self) -> Result<()> {
        self.store
            .set(AFTER_MAIN_KEY, serde_json::Value::Array(Vec::new()))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.entries()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// Outcome of one drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub executed: usize,
    /// Entries whose actor or item no longer exists.
    pub skipped: usize,
    pub failed: usize,
}

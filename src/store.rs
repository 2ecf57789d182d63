use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

use futures::future::{self, BoxFuture};
use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;

/// Minimal persistent key-value capability the marker needs from its host.
pub trait KeyValueStore: Send + Sync + 'static {
    /// Returns the stored value, or `default` when the key was never set.
    fn get<'a>(&'a self, key: &'a str, default: Value) -> BoxFuture<'a, Result<Value, StoreError>>;

    fn set<'a>(&'a self, key: &'a str, value: Value) -> BoxFuture<'a, Result<(), StoreError>>;
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(#[from] sqlx::Error),
    #[error("stored value is not valid JSON: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Value>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl MemoryStore {
    pub fn with_value(key: &str, value: Value) -> Self {
        let store = Self::new();
        store.values.lock().insert(key.to_string(), value);
        store
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful `set` calls.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn peek(&self, key: &str) -> Option<Value> {
        self.values.lock().get(key).cloned()
    }
}

impl KeyValueStore for MemoryStore {
    fn get<'a>(&'a self, key: &'a str, default: Value) -> BoxFuture<'a, Result<Value, StoreError>> {
        let result = if self.fail_reads.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable(format!("read of {key} rejected")))
        } else {
            Ok(self.values.lock().get(key).cloned().unwrap_or(default))
        };
        Box::pin(future::ready(result))
    }

    fn set<'a>(&'a self, key: &'a str, value: Value) -> BoxFuture<'a, Result<(), StoreError>> {
        let result = if self.fail_writes.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable(format!("write of {key} rejected")))
        } else {
            self.values.lock().insert(key.to_string(), value);
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        };
        Box::pin(future::ready(result))
    }
}

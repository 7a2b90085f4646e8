//! Named-array storage shared between workers
//!
//! Distributed transports plug in behind [`ArrayStore`]; the engine only
//! needs asynchronous `fetch` and `put`. [`LocalStore`] keeps values in
//! process memory.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use thiserror::Error;

use crate::value::Value;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("no value stored under '{0}'")]
    Missing(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub trait ArrayStore: Send + Sync {
    fn fetch(&self, key: &str) -> BoxFuture<'static, Result<Value, StoreError>>;

    fn put(&self, key: &str, value: Value) -> BoxFuture<'static, Result<(), StoreError>>;
}

#[derive(Clone, Default)]
pub struct LocalStore {
    values: Arc<Mutex<HashMap<String, Value>>>,
}

impl LocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Synchronous insert for seeding a store before evaluation
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArrayStore for LocalStore {
    fn fetch(&self, key: &str) -> BoxFuture<'static, Result<Value, StoreError>> {
        let found = self
            .values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::Missing(key.to_string()));
        future::ready(found).boxed()
    }

    fn put(&self, key: &str, value: Value) -> BoxFuture<'static, Result<(), StoreError>> {
        self.insert(key, value);
        future::ready(Ok(())).boxed()
    }
}

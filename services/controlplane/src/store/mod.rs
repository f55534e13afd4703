//! Resource store contract.
//!
//! # Purpose
//! Generic get/list/watch/create/update/delete over the closed `Object` set,
//! with optimistic concurrency on `resourceVersion`, finalizer-gated deletion,
//! owner-reference garbage collection and namespace-scoped teardown.
use crate::model::{Kind, Object, ObjectKey};
use async_trait::async_trait;
use thiserror::Error;

pub mod client;
pub mod memory;
mod watch;

pub use client::Client;
pub use watch::{WatchEvent, WatchFilter, WatchStream};

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Number of change events retained for `watch(since)` replay.
    pub change_retention: usize,
    /// Capacity of the live broadcast channel before watchers lag.
    pub watch_buffer: usize,
}

impl StoreConfig {
    pub fn change_window(&self) -> usize {
        self.change_retention.max(1)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            change_retention: 1024,
            watch_buffer: 1024,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("invalid: {0}")]
    Invalid(String),
    #[error("expired: {0}")]
    Expired(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn get(&self, key: &ObjectKey) -> StoreResult<Object>;
    /// Objects of `kind`, optionally restricted to one namespace, ordered by key.
    async fn list(&self, kind: Kind, namespace: Option<&str>) -> StoreResult<Vec<Object>>;
    /// Like `list`, together with the store version the result reflects.
    async fn list_versioned(
        &self,
        kind: Kind,
        namespace: Option<&str>,
    ) -> StoreResult<(Vec<Object>, u64)>;
    async fn create(&self, object: Object) -> StoreResult<Object>;
    /// Write metadata and spec; the stored status is kept.
    async fn update(&self, object: Object) -> StoreResult<Object>;
    /// Write status only; metadata and spec are kept.
    async fn update_status(&self, object: Object) -> StoreResult<Object>;
    async fn delete(&self, key: &ObjectKey) -> StoreResult<()>;
    /// Stream changes matching `filter`, replaying retained events newer than
    /// `since` first.
    async fn watch(&self, filter: WatchFilter, since: Option<u64>) -> StoreResult<WatchStream>;

    async fn health_check(&self) -> StoreResult<()>;
    fn backend_name(&self) -> &'static str;
}

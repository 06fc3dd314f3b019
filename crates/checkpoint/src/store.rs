//! Checkpoint storage trait
//!
//! This module defines the CheckpointStore trait for backend-agnostic
//! checkpoint storage operations.

use anyhow::Result;
use async_trait::async_trait;

/// Trait for checkpoint storage operations.
///
/// A store is a flat mapping from checkpoint keys to optional string values.
/// Every `set` must be durable before it returns: the sync engine relies on
/// a completed `set` surviving a process restart.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// Returns None if the key doesn't exist or holds a null value.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: Option<String>) -> Result<()>;
}

#[async_trait]
impl<T: CheckpointStore + ?Sized> CheckpointStore for std::sync::Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: Option<String>) -> Result<()> {
        (**self).set(key, value).await
    }
}

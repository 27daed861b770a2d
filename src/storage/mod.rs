mod attachment;

pub mod content;
pub mod local;
pub mod s3;

#[cfg(test)]
pub(crate) mod memory;
#[cfg(test)]
mod tests;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use self::content::{Namespace, StorageKey};

/// How long an issued read grant stays valid.
pub const ACCESS_WINDOW: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub location: String,
    /// False when the key was already present and nothing was written.
    pub created: bool,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Creates the backing container for `namespace` unless it already exists.
    async fn ensure_container(&self, namespace: &Namespace) -> Result<()>;

    async fn upload_if_absent(&self, key: &StorageKey, content: &[u8]) -> Result<Upload>;

    /// Returns a URL granting read-only access to `key` for `ttl`.
    async fn issue_read_url(&self, key: &StorageKey, ttl: Duration) -> Result<String>;
}

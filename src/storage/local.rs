use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use base64::prelude::BASE64_URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use ring::hmac;
use thiserror::Error;
use tokio::fs;
use tracing::debug;
use ulid::Ulid;
use url::Url;

use crate::error::{PipelineError, Result};
use crate::storage::content::{Namespace, StorageKey};
use crate::storage::{ObjectStore, Upload};

const READ_PERMISSION: &str = "r";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Write,
    Delete,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AccessError {
    #[error("descriptor is not a grant issued by this store")]
    Unrecognized,
    #[error("descriptor signature does not match")]
    BadSignature,
    #[error("grant expired")]
    Expired,
    #[error("grant does not permit {0:?}")]
    NotPermitted(Operation),
}

/// Stores objects as files under `base_path`, one directory per key segment.
///
/// Read grants are `file://` URLs carrying the permission, the expiry as a
/// unix timestamp and an HMAC-SHA256 over both plus the key.
pub struct LocalFileStorage {
    pub base_path: PathBuf,
    base_url: Url,
    signing_key: hmac::Key,
}

impl LocalFileStorage {
    /// `base_path` is made absolute so locations stay valid from any
    /// working directory.
    pub fn new(base_path: PathBuf, signing_secret: &[u8]) -> Result<Self> {
        let base_path = std::path::absolute(&base_path).map_err(|e| {
            PipelineError::Config(format!("cannot resolve {}: {e}", base_path.display()))
        })?;
        let base_url = Url::from_directory_path(&base_path).map_err(|_| {
            PipelineError::Config(format!("{} is not a valid file URL", base_path.display()))
        })?;
        Ok(Self {
            base_path,
            base_url,
            signing_key: hmac::Key::new(hmac::HMAC_SHA256, signing_secret),
        })
    }

    pub fn path_for(&self, key: &StorageKey) -> Result<PathBuf> {
        self.path_under(key.segments())
            .ok_or_else(|| PipelineError::storage(key.as_str(), "key escapes the base directory"))
    }

    /// None unless every segment is one plain path component.
    fn path_under<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Option<PathBuf> {
        let mut path = self.base_path.clone();
        for segment in segments {
            let mut components = Path::new(segment).components();
            match (components.next(), components.next()) {
                (Some(Component::Normal(part)), None) if part == segment => path.push(part),
                _ => return None,
            }
        }
        Some(path)
    }

    fn location(&self, key: &StorageKey) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| PipelineError::storage(key.as_str(), "base URL cannot hold a path"))?
            .pop_if_empty()
            .extend(key.segments());
        Ok(url)
    }

    fn signature(&self, key: &str, permission: &str, expiry: i64) -> String {
        BASE64_URL_SAFE_NO_PAD.encode(hmac::sign(
            &self.signing_key,
            grant_payload(key, permission, expiry).as_bytes(),
        ))
    }

    /// Checks a descriptor issued by [`ObjectStore::issue_read_url`] and
    /// returns the file it grants access to.
    pub fn authorize(
        &self,
        descriptor: &str,
        operation: Operation,
        now: DateTime<Utc>,
    ) -> std::result::Result<PathBuf, AccessError> {
        let url = Url::parse(descriptor).map_err(|_| AccessError::Unrecognized)?;
        if url.scheme() != "file" {
            return Err(AccessError::Unrecognized);
        }
        let path = url.to_file_path().map_err(|_| AccessError::Unrecognized)?;
        let relative = path
            .strip_prefix(&self.base_path)
            .map_err(|_| AccessError::Unrecognized)?;
        let segments = relative
            .components()
            .map(|component| match component {
                Component::Normal(part) => part.to_str().ok_or(AccessError::Unrecognized),
                _ => Err(AccessError::Unrecognized),
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let key = segments.join("/");

        let mut permission = None;
        let mut expiry = None;
        let mut signature = None;
        for (name, value) in url.query_pairs() {
            match &*name {
                "sp" => permission = Some(value.into_owned()),
                "se" => expiry = value.parse::<i64>().ok(),
                "sig" => signature = Some(value.into_owned()),
                _ => {}
            }
        }
        let (Some(permission), Some(expiry), Some(signature)) = (permission, expiry, signature)
        else {
            return Err(AccessError::Unrecognized);
        };

        let signature = BASE64_URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AccessError::BadSignature)?;
        let payload = grant_payload(&key, &permission, expiry);
        hmac::verify(&self.signing_key, payload.as_bytes(), &signature)
            .map_err(|_| AccessError::BadSignature)?;

        if now.timestamp() >= expiry {
            return Err(AccessError::Expired);
        }
        if operation != Operation::Read || !permission.contains(READ_PERMISSION) {
            return Err(AccessError::NotPermitted(operation));
        }

        self.path_under(segments).ok_or(AccessError::Unrecognized)
    }
}

#[async_trait]
impl ObjectStore for LocalFileStorage {
    async fn ensure_container(&self, namespace: &Namespace) -> Result<()> {
        let folder = self
            .path_under([namespace.as_str()])
            .ok_or_else(|| PipelineError::storage(namespace.as_str(), "not a single path segment"))?;
        fs::create_dir_all(&folder)
            .await
            .map_err(|e| PipelineError::storage(folder.display().to_string(), e))
    }

    async fn upload_if_absent(&self, key: &StorageKey, content: &[u8]) -> Result<Upload> {
        let path = self.path_for(key)?;
        let location = self.location(key)?.to_string();

        let exists = fs::try_exists(&path)
            .await
            .map_err(|e| PipelineError::storage(key.as_str(), e))?;
        if exists {
            return Ok(Upload {
                location,
                created: false,
            });
        }

        write_atomically(&path, content)
            .await
            .map_err(|e| PipelineError::storage(key.as_str(), e))?;
        debug!(path = %path.display(), "Wrote attachment file");

        Ok(Upload {
            location,
            created: true,
        })
    }

    async fn issue_read_url(&self, key: &StorageKey, ttl: Duration) -> Result<String> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| PipelineError::storage(key.as_str(), e))?;
        let expiry = (Utc::now() + ttl).timestamp();
        let signature = self.signature(key.as_str(), READ_PERMISSION, expiry);

        let mut url = self.location(key)?;
        url.query_pairs_mut()
            .append_pair("sp", READ_PERMISSION)
            .append_pair("se", &expiry.to_string())
            .append_pair("sig", &signature);
        Ok(url.to_string())
    }
}

fn grant_payload(key: &str, permission: &str, expiry: i64) -> String {
    format!("{}\n{}\n{}", key, permission, expiry)
}

/// Concurrent writers of the same key race on the rename, and both leave
/// identical bytes behind.
async fn write_atomically(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(parent).await?;
    let staging = parent.join(format!(".{}.part", Ulid::new()));
    fs::write(&staging, content).await?;
    if let Err(e) = fs::rename(&staging, path).await {
        let _ = fs::remove_file(&staging).await;
        return Err(e);
    }
    Ok(())
}

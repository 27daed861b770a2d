use std::fmt;
use std::path::{Component, Path};
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::prelude::{BASE64_STANDARD, BASE64_URL_SAFE_NO_PAD};
use base64::Engine;
use opentelemetry::KeyValue;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use crate::error::{PipelineError, Result};
use crate::ews::extract::RawAttachment;
use crate::metrics::METRICS_INSTANCE;
use crate::pipeline::models::StoredAttachmentResult;
use crate::storage::attachment::storage_file_name;
use crate::storage::{ObjectStore, ACCESS_WINDOW};

/// SHA-256 of an attachment's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    pub fn of(content: &[u8]) -> Self {
        Self(Sha256::digest(content).into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        BASE64_STANDARD.encode(self.0)
    }

    pub fn to_url_safe(&self) -> String {
        BASE64_URL_SAFE_NO_PAD.encode(self.0)
    }
}

/// First storage key segment: exactly one relative path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace(String);

impl Namespace {
    /// Rejects empty names, `.`, `..`, absolute paths and anything
    /// containing a separator.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut components = Path::new(raw).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) if !raw.contains(['/', '\\']) => {
                Ok(Self(raw.to_string()))
            }
            _ => Err(PipelineError::InvalidRequest(format!(
                "namespace '{}' must be a single relative path segment",
                raw
            ))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `<namespace>/<digest>/<file name>`.
///
/// Only constructible from a [`ContentDigest`], so no key exists before
/// its content has been hashed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey(String);

impl StorageKey {
    pub fn new(namespace: &Namespace, digest: &ContentDigest, file_name: &str) -> Self {
        Self(format!("{}/{}/{}", namespace, digest.to_url_safe(), file_name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub struct ContentAddressedStore {
    store: Arc<dyn ObjectStore>,
    access_window: Duration,
}

impl ContentAddressedStore {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            access_window: ACCESS_WINDOW,
        }
    }

    pub async fn prepare(&self, namespace: &Namespace) -> Result<()> {
        self.store.ensure_container(namespace).await
    }

    /// Hashes the attachment and, when `upload` is set, writes it and
    /// issues a read grant. Without `upload` only the hash and key are
    /// filled in.
    #[instrument(
        name = "persist",
        skip(self, attachment),
        fields(
            attachment.name = %attachment.display_name,
            attachment.content_type = ?attachment.content_type
        )
    )]
    pub async fn persist(
        &self,
        namespace: &Namespace,
        attachment: RawAttachment,
        upload: bool,
    ) -> Result<StoredAttachmentResult> {
        let digest = ContentDigest::of(&attachment.content);
        let file_name = storage_file_name(&attachment.display_name);
        let key = StorageKey::new(namespace, &digest, &file_name);

        if !upload {
            debug!(storage.key = %key, "Upload disabled, returning hash only");
            METRICS_INSTANCE.attachments_hashed.add(1, &[]);
            return Ok(StoredAttachmentResult {
                display_name: attachment.display_name,
                content_hash: digest.to_base64(),
                storage_key: key.to_string(),
                location_uri: String::new(),
                access_descriptor: String::new(),
            });
        }

        let started = Instant::now();
        let uploaded = self.store.upload_if_absent(&key, &attachment.content).await?;
        METRICS_INSTANCE.storage_timing.record(
            started.elapsed().as_secs_f64(),
            &[KeyValue::new("created", uploaded.created)],
        );
        if uploaded.created {
            info!(storage.key = %key, bytes = attachment.content.len(), "Stored attachment");
        } else {
            info!(storage.key = %key, "Attachment already stored, skipping write");
        }

        let access_descriptor = self.store.issue_read_url(&key, self.access_window).await?;
        METRICS_INSTANCE.attachments_stored.add(1, &[]);

        Ok(StoredAttachmentResult {
            display_name: attachment.display_name,
            content_hash: digest.to_base64(),
            storage_key: key.to_string(),
            location_uri: uploaded.location,
            access_descriptor,
        })
    }
}

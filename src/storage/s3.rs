use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::{primitives::ByteStream, Client};
use tracing::{error, info};

use crate::error::{PipelineError, Result};
use crate::storage::content::{Namespace, StorageKey};
use crate::storage::{ObjectStore, Upload};

/// All namespaces share one bucket and are told apart by key prefix.
pub struct S3FileStorage {
    client: Client,
    bucket_name: String,
}

impl S3FileStorage {
    pub fn new(client: Client, bucket: String) -> Self {
        Self {
            client,
            bucket_name: bucket,
        }
    }

    fn location(&self, key: &StorageKey) -> String {
        format!("s3://{}/{}", self.bucket_name, key)
    }

    async fn object_exists(&self, key: &StorageKey) -> Result<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket_name)
            .key(key.as_str())
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err)
                if err
                    .as_service_error()
                    .map(|e| e.is_not_found())
                    .unwrap_or(false) =>
            {
                Ok(false)
            }
            Err(err) => Err(PipelineError::storage(
                key.as_str(),
                DisplayErrorContext(&err),
            )),
        }
    }
}

#[async_trait]
impl ObjectStore for S3FileStorage {
    async fn ensure_container(&self, namespace: &Namespace) -> Result<()> {
        let created = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await;

        match created {
            Ok(_) => {
                info!(bucket = %self.bucket_name, %namespace, "Created bucket");
                Ok(())
            }
            Err(err)
                if err
                    .as_service_error()
                    .map(|e| e.is_bucket_already_owned_by_you() || e.is_bucket_already_exists())
                    .unwrap_or(false) =>
            {
                Ok(())
            }
            Err(err) => {
                error!(bucket = %self.bucket_name, error.message = %DisplayErrorContext(&err), "Failed to create bucket");
                Err(PipelineError::storage(
                    self.bucket_name.clone(),
                    DisplayErrorContext(&err),
                ))
            }
        }
    }

    async fn upload_if_absent(&self, key: &StorageKey, content: &[u8]) -> Result<Upload> {
        if self.object_exists(key).await? {
            return Ok(Upload {
                location: self.location(key),
                created: false,
            });
        }

        info!("About to upload {} to bucket {}", key, self.bucket_name);
        let content_type = mime_guess::from_path(key.file_name()).first_or_octet_stream();
        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key.as_str())
            .content_type(content_type.essence_str())
            .body(ByteStream::from(content.to_vec()))
            .send()
            .await
            .map_err(|err| {
                error!(
                    "Failed to upload {}, error is {}",
                    key,
                    DisplayErrorContext(&err)
                );
                PipelineError::storage(key.as_str(), DisplayErrorContext(&err))
            })?;
        info!("{} uploaded successfully", key);

        Ok(Upload {
            location: self.location(key),
            created: true,
        })
    }

    async fn issue_read_url(&self, key: &StorageKey, ttl: Duration) -> Result<String> {
        let config =
            PresigningConfig::expires_in(ttl).map_err(|e| PipelineError::storage(key.as_str(), e))?;
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket_name)
            .key(key.as_str())
            .presigned(config)
            .await
            .map_err(|err| PipelineError::storage(key.as_str(), DisplayErrorContext(&err)))?;
        Ok(presigned.uri().to_string())
    }
}

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use serde::Deserialize;
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::storage::local::LocalFileStorage;
use crate::storage::s3::S3FileStorage;
use crate::storage::ObjectStore;

pub const SIGNING_SECRET_ENV: &str = "ATTACH2S_SIGNING_SECRET";

#[derive(Deserialize, Debug)]
#[serde(tag = "type")]
pub enum Strategy {
    Local {
        base_path: String,
        /// Falls back to `ATTACH2S_SIGNING_SECRET` when absent.
        #[serde(default)]
        signing_secret: Option<String>,
    },
    S3 {
        bucket_name: String,
        override_aws_endpoint: Option<String>,
    },
}

#[derive(Deserialize, Debug)]
pub struct Attach2sConfig {
    pub strategy: Strategy,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Attach2sConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        info!("About to read config file from {}", path.display());
        let file = File::open(path)
            .map_err(|e| PipelineError::Config(format!("cannot open {}: {e}", path.display())))?;
        let config: Self = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| PipelineError::Config(format!("cannot parse {}: {e}", path.display())))?;
        if config.request_timeout_secs == 0 {
            return Err(PipelineError::Config(
                "request_timeout_secs must be positive".into(),
            ));
        }
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

pub async fn build_storage(strategy: &Strategy) -> Result<Arc<dyn ObjectStore>> {
    match strategy {
        Strategy::Local {
            base_path,
            signing_secret,
        } => {
            let secret = match signing_secret {
                Some(secret) => secret.clone(),
                None => std::env::var(SIGNING_SECRET_ENV).map_err(|_| {
                    PipelineError::Config(format!(
                        "local storage needs signing_secret or {}",
                        SIGNING_SECRET_ENV
                    ))
                })?,
            };
            info!(base_path, "Using local file storage");
            Ok(Arc::new(LocalFileStorage::new(
                PathBuf::from(base_path),
                secret.as_bytes(),
            )?))
        }
        Strategy::S3 {
            bucket_name,
            override_aws_endpoint,
        } => {
            info!(bucket_name, "Using S3 storage");
            let client = build_s3_client(override_aws_endpoint.as_deref()).await;
            Ok(Arc::new(S3FileStorage::new(client, bucket_name.clone())))
        }
    }
}

async fn build_s3_client(override_aws_endpoint: Option<&str>) -> Client {
    let region_provider = RegionProviderChain::default_provider().or_else("us-east-1");
    // Gets the default AWS config from environment (~/.aws/config)
    let shared_config = aws_config::defaults(BehaviorVersion::v2025_08_07())
        .region(region_provider)
        .load()
        .await;
    match override_aws_endpoint {
        Some(endpoint) => {
            let config = aws_sdk_s3::config::Builder::from(&shared_config)
                .endpoint_url(endpoint)
                .force_path_style(true)
                .build();
            Client::from_conf(config)
        }
        None => Client::new(&shared_config),
    }
}

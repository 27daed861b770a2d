pub mod config;
pub mod error;
pub mod ews;
pub mod metrics;
pub mod pipeline;
pub mod storage;

use std::sync::Arc;

use tracing::info;

use crate::config::{build_storage, Attach2sConfig};
use crate::error::Result;
use crate::ews::client::HttpMailServer;
use crate::pipeline::Pipeline;

/// Wires the HTTP mail server client and the configured store into a pipeline.
pub async fn build_pipeline(config: &Attach2sConfig) -> Result<Pipeline> {
    info!("Building pipeline...");
    let mail_server = HttpMailServer::new(config.request_timeout(), config.accept_invalid_certs)?;
    let storage = build_storage(&config.strategy).await?;
    Ok(Pipeline::new(Arc::new(mail_server), storage))
}

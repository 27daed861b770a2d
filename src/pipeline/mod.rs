pub mod models;


use std::sync::Arc;

use opentelemetry::KeyValue;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use ulid::Ulid;

use crate::error::{PipelineError, Result};
use crate::ews::client::MailServer;
use crate::ews::envelope::Envelope;
use crate::ews::extract::extract;
use crate::ews::request::build_get_attachment;
use crate::metrics::METRICS_INSTANCE;
use crate::storage::content::{ContentAddressedStore, Namespace};
use crate::storage::ObjectStore;
use models::{AttachmentRef, BatchResult, FetchRequest, SkippedItem};

/// Fetches every requested attachment id in order and stores what it finds.
pub struct Pipeline {
    mail_server: Arc<dyn MailServer>,
    store: ContentAddressedStore,
}

impl Pipeline {
    pub fn new(mail_server: Arc<dyn MailServer>, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            mail_server,
            store: ContentAddressedStore::new(store),
        }
    }

    /// Always returns a result. When the batch is aborted, `results` holds
    /// everything stored before the failure and `error_flag` is set.
    #[instrument(
        name = "batch",
        skip_all,
        fields(batch.id = %Ulid::new(), namespace = %request.namespace, items = request.items.len())
    )]
    pub async fn run(&self, request: &FetchRequest, cancel: &CancellationToken) -> BatchResult {
        METRICS_INSTANCE.batches_started.add(1, &[]);
        let mut batch = BatchResult::default();

        match self.process(request, cancel, &mut batch).await {
            Ok(()) => info!(
                processed = batch.processed_count,
                skipped = batch.skipped.len(),
                "Batch complete"
            ),
            Err(e) => {
                error!(error.message = %e, processed = batch.processed_count, "Batch aborted");
                batch.error_flag = true;
                batch.error_message = Some(e.to_string());
            }
        }
        batch
    }

    async fn process(
        &self,
        request: &FetchRequest,
        cancel: &CancellationToken,
        batch: &mut BatchResult,
    ) -> Result<()> {
        let namespace = validate(request)?;

        if request.upload_enabled && !request.items.is_empty() {
            self.store.prepare(&namespace).await?;
        }

        for item in &request.items {
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }

            let envelope = match self.fetch(request, item, cancel).await {
                Ok(envelope) => envelope,
                Err(e) if e.is_item_scoped() => {
                    warn!(attachment.id = %item.external_id, error.message = %e, "Skipping attachment id");
                    METRICS_INSTANCE
                        .attachment_fetch_skipped
                        .add(1, &[KeyValue::new("reason", skip_reason(&e))]);
                    batch.skipped.push(SkippedItem {
                        id: item.external_id.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
                Err(e) => return Err(e),
            };

            for attachment in extract(&envelope) {
                let stored = self
                    .store
                    .persist(&namespace, attachment?, request.upload_enabled)
                    .await?;
                batch.results.push(stored);
                batch.processed_count += 1;
            }
        }
        Ok(())
    }

    async fn fetch(
        &self,
        request: &FetchRequest,
        item: &AttachmentRef,
        cancel: &CancellationToken,
    ) -> Result<Envelope> {
        let body = build_get_attachment(&item.external_id)?;
        tokio::select! {
            _ = cancel.cancelled() => Err(PipelineError::Cancelled),
            envelope = self.mail_server.fetch(
                &request.server_endpoint,
                &request.access_credential,
                body,
            ) => envelope,
        }
    }
}

fn validate(request: &FetchRequest) -> Result<Namespace> {
    if request.server_endpoint.trim().is_empty() {
        return Err(PipelineError::InvalidRequest("ewsUrl is required".into()));
    }
    if request.access_credential.trim().is_empty() {
        return Err(PipelineError::InvalidRequest(
            "attachmentToken is required".into(),
        ));
    }
    Namespace::parse(&request.namespace)
}

fn skip_reason(error: &PipelineError) -> &'static str {
    match error {
        PipelineError::Status(_) => "status",
        _ => "response_code",
    }
}

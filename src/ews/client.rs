use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::ews::envelope::Envelope;

pub const SOAP_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

#[async_trait]
pub trait MailServer: Send + Sync {
    /// Posts `body` to `endpoint` and returns the envelope once it is known
    /// to carry no error response codes.
    async fn fetch(&self, endpoint: &str, credential: &str, body: String) -> Result<Envelope>;
}

pub struct HttpMailServer {
    client: reqwest::Client,
}

impl HttpMailServer {
    pub fn new(timeout: Duration, accept_invalid_certs: bool) -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .timeout(timeout)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .map_err(|e| PipelineError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl MailServer for HttpMailServer {
    async fn fetch(&self, endpoint: &str, credential: &str, body: String) -> Result<Envelope> {
        debug!(endpoint, "Posting GetAttachment request");
        let response = self
            .client
            .post(endpoint)
            .bearer_auth(credential)
            .header(CONTENT_TYPE, SOAP_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| PipelineError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), endpoint, "Mail server rejected request");
            return Err(PipelineError::Status(status.as_u16()));
        }

        let payload = response
            .bytes()
            .await
            .map_err(|e| PipelineError::Transport(e.to_string()))?;
        debug!(bytes = payload.len(), "Received GetAttachment response");

        let envelope = Envelope::parse(&payload)?;
        envelope.check_response_codes()?;
        Ok(envelope)
    }
}

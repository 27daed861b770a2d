use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Connection, TLS or timeout failure while talking to the mail server.
    #[error("transport error talking to mail server: {0}")]
    Transport(String),

    /// The mail server answered with a non-success status (redirects included).
    #[error("mail server answered with status {0}")]
    Status(u16),

    /// An envelope carried a response code other than `NoError`.
    #[error("mail server reported response code {0}")]
    ResponseCode(String),

    #[error("malformed mail server response: {0}")]
    Malformed(String),

    #[error("failed to encode request: {0}")]
    RequestEncoding(String),

    #[error("storage error for '{key}': {reason}")]
    Storage { key: String, reason: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("batch cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn storage(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::Storage {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    /// Errors that void a single attachment id instead of the whole batch.
    pub fn is_item_scoped(&self) -> bool {
        matches!(self, Self::Status(_) | Self::ResponseCode(_))
    }
}

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP Error: {status}: {message}")]
    Status { status: u16, message: String },
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("process not found: {0}")]
    ProcessNotFound(String),
    #[error("json error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("{0}")]
    Other(String),
}

impl ApiError {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Whether the server rejected the request because of authentication.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Status { status: 401, .. } | Self::Auth(_))
    }
}

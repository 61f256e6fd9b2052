use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConsoleError>;

/// Failure of a single call against the stockroom API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{message}")]
    Server { status: StatusCode, message: String },
}

impl ApiError {
    /// The target is gone; the caller should refetch instead of retrying.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Text shown to the operator, one line.
    pub fn notice(&self) -> String {
        match self {
            Self::Network(_) => "server unreachable, showing cached data".to_string(),
            Self::NotFound(message) => format!("{message} no longer exists"),
            Self::Server { message, .. } => message.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("invalid base_url: {0}")]
    Url(String),
    #[error(transparent)]
    Api(#[from] ApiError),
}

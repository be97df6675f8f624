//! Monitor error types

/// Result type for monitor operations
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Failure of a single pull request against the status service.
///
/// Every fetch resolves to one of these three kinds; nothing escapes the
/// fetcher as a panic or an untyped error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Transport-level failure: unreachable host, timeout, broken body.
    #[error("network error: {0}")]
    Network(String),

    /// The service answered but signaled a failure (non-success status or
    /// an `error` marker in the payload).
    #[error("service error: {0}")]
    Service(String),

    /// The payload could not be decoded or lacks a required field.
    #[error("malformed data: {0}")]
    MalformedData(String),
}

impl FetchError {
    pub fn network<T: Into<String>>(msg: T) -> Self {
        Self::Network(msg.into())
    }

    pub fn service<T: Into<String>>(msg: T) -> Self {
        Self::Service(msg.into())
    }

    pub fn malformed<T: Into<String>>(msg: T) -> Self {
        Self::MalformedData(msg.into())
    }

    /// Short kind name used in logs and indicators
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Service(_) => "service",
            Self::MalformedData(_) => "malformed",
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::network(format!("request timed out: {}", err))
        } else {
            Self::network(err.to_string())
        }
    }
}

/// Monitor-level error types
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Push channel error: {0}")]
    PushChannel(String),

    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Dashboard is no longer running")]
    ShutDown,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl MonitorError {
    pub fn configuration<T: Into<String>>(msg: T) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn push_channel<T: Into<String>>(msg: T) -> Self {
        Self::PushChannel(msg.into())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for MonitorError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::push_channel(format!("WebSocket error: {}", err))
    }
}

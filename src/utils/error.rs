//! Error types for crawlview

use thiserror::Error;

/// Main error type for synchronous browser operations
#[derive(Debug, Error)]
pub enum BrowserError {
    /// The URL could not be parsed or uses an unsupported scheme
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    /// The driver asked for a method the transport cannot issue
    #[error("unsupported HTTP method: {0}")]
    UnsupportedMethod(String),
    /// A task is already running on this browser
    #[error("a task is already running")]
    TaskInProgress,
    /// Shutdown was requested, no further tasks are accepted
    #[error("browser has been shut down")]
    ShutDown,
    /// Invalid configuration value
    #[error("configuration error: {0}")]
    Config(String),
    /// The HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Malformed configuration file
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Terminal failure class reported by the transport for one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum NetworkErrorKind {
    /// Nothing listens on the remote port
    #[error("Connection refused")]
    ConnectionRefused,
    /// The server closed the connection mid-response
    #[error("Connection closed")]
    RemoteHostClosed,
    /// DNS resolution failed
    #[error("Host not found")]
    HostNotFound,
    /// Socket-level timeout
    #[error("Socket operation timed out")]
    Timeout,
    /// The operation was aborted locally
    #[error("Operation canceled")]
    OperationCanceled,
    /// Connection reset by the peer
    #[error("Temporary network failure")]
    TemporaryNetworkFailure,
    /// The server dropped the connection before answering, the request has to be resent
    #[error("Request content must be resent")]
    ContentReSend,
    /// 401 / 403
    #[error("Content access denied")]
    ContentAccessDenied,
    /// 404 / 410
    #[error("Content not found")]
    ContentNotFound,
    /// Any other 4xx status
    #[error("Client error response")]
    ClientError,
    /// 5xx status
    #[error("Server error response")]
    ServerError,
    /// Malformed response, redirect loop or undecodable body
    #[error("Protocol failure")]
    ProtocolFailure,
    /// Anything the transport could not classify
    #[error("Unknown network error")]
    UnknownNetwork,
}

impl NetworkErrorKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConnectionRefused => "ConnectionRefused",
            Self::RemoteHostClosed => "RemoteHostClosed",
            Self::HostNotFound => "HostNotFound",
            Self::Timeout => "Timeout",
            Self::OperationCanceled => "OperationCanceled",
            Self::TemporaryNetworkFailure => "TemporaryNetworkFailure",
            Self::ContentReSend => "ContentReSend",
            Self::ContentAccessDenied => "ContentAccessDenied",
            Self::ContentNotFound => "ContentNotFound",
            Self::ClientError => "ClientError",
            Self::ServerError => "ServerError",
            Self::ProtocolFailure => "ProtocolFailure",
            Self::UnknownNetwork => "UnknownNetwork",
        }
    }

    /// Whether a request failing this way may succeed when simply issued again
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TemporaryNetworkFailure | Self::ContentReSend)
    }

    /// Map an HTTP status code to an error class, `None` for non-error statuses
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            401 | 403 => Some(Self::ContentAccessDenied),
            404 | 410 => Some(Self::ContentNotFound),
            400..=499 => Some(Self::ClientError),
            500..=599 => Some(Self::ServerError),
            _ => None,
        }
    }

    /// Human-readable entry recorded in a task's error list
    pub fn describe(&self) -> String {
        format!("{}: {}", self.name(), self)
    }
}

/// Convenience Result type for crawlview operations
pub type Result<T> = std::result::Result<T, BrowserError>;

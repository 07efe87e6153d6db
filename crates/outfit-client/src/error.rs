use outfit_core::CoreError;
use thiserror::Error;

/// Every failure the client surfaces, normalized at the network boundary.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The backend rejected the bearer token. The session has already been
    /// cleared and the login route requested by the time this is returned.
    #[error("Unauthorized")]
    Unauthorized,

    /// Any other non-2xx response.
    #[error("{message}")]
    Api {
        message: String,
        status: u16,
        code: Option<String>,
        details: Option<serde_json::Map<String, serde_json::Value>>,
    },

    #[error("Request timeout")]
    Timeout,

    #[error("{message}")]
    Network { message: String },

    #[error("Invalid response format")]
    UploadFormat,

    #[error("Upload cancelled")]
    Cancelled,

    #[error("failed to decode response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("{0} sign-in is not configured")]
    ProviderNotConfigured(String),

    #[error("live channel error: {0}")]
    Realtime(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// HTTP-equivalent status: 401, the server status, 408 for timeouts and
    /// 0 for transport failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized => Some(401),
            ApiError::Api { status, .. } => Some(*status),
            ApiError::Timeout => Some(408),
            ApiError::Network { .. } => Some(0),
            _ => None,
        }
    }

    /// Machine-readable code, when the server or the client assigned one.
    pub fn code(&self) -> Option<&str> {
        match self {
            ApiError::Api { code, .. } => code.as_deref(),
            ApiError::Network { .. } => Some("NETWORK_ERROR"),
            _ => None,
        }
    }

    /// Worth another attempt: timeouts, transport failures and 5xx.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Timeout | ApiError::Network { .. } => true,
            ApiError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub(crate) fn network(message: impl Into<String>) -> Self {
        ApiError::Network {
            message: message.into(),
        }
    }
}

use thiserror::Error;

/// Failure of a single provider attempt. Always recovered by the orchestrator.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("symbol not found: {0}")]
    NotFound(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("no data available")]
    NoDataAvailable,
}

impl ProviderError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        ProviderError::MalformedResponse(msg.into())
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if err.is_decode() {
            ProviderError::MalformedResponse(err.to_string())
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::MalformedResponse(err.to_string())
    }
}

/// Startup configuration problems. These are fatal.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("no providers configured")]
    NoProviders,

    #[error("unknown provider `{0}`")]
    UnknownProvider(String),

    #[error("provider `{0}` listed more than once")]
    DuplicateProvider(String),

    #[error("invalid value for {key}: `{value}`")]
    InvalidValue { key: String, value: String },

    #[error("{0} must be greater than zero")]
    Zero(String),

    #[error("{0} is required when its provider is enabled")]
    MissingApiKey(String),

    #[error("{shorter} must not exceed {longer}")]
    TimeoutOrder {
        shorter: &'static str,
        longer: &'static str,
    },
}

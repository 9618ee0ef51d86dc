//! Domain error types.

/// Top-level error type for coinadvisor.
#[derive(Debug, thiserror::Error)]
pub enum AdvisorError {
    #[error("network error: {reason}")]
    Network { reason: String },

    #[error("request to {url} failed with HTTP {status}")]
    HttpStatus { status: u16, url: String },

    #[error("rate limit exceeded for {url} after retry")]
    RateLimitExceeded { url: String },

    #[error("failed to decode payload: {reason}")]
    Decode { reason: String },

    #[error("corrupt cache entry {key}: {reason}")]
    CacheCorruption { key: String, reason: String },

    #[error("insufficient data for {symbol}: have {rows} feature rows, need {minimum}")]
    InsufficientData {
        symbol: String,
        rows: usize,
        minimum: usize,
    },

    #[error("model error: {reason}")]
    Model { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AdvisorError {
    /// Transport failures and terminal (non-429) HTTP statuses.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            AdvisorError::Network { .. } | AdvisorError::HttpStatus { .. }
        )
    }

    pub(crate) fn decode(reason: impl Into<String>) -> Self {
        AdvisorError::Decode {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        AdvisorError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&AdvisorError> for std::process::ExitCode {
    fn from(err: &AdvisorError) -> Self {
        let code: u8 = match err {
            AdvisorError::Io(_) => 1,
            AdvisorError::ConfigParse { .. }
            | AdvisorError::ConfigMissing { .. }
            | AdvisorError::ConfigInvalid { .. } => 2,
            AdvisorError::Network { .. }
            | AdvisorError::HttpStatus { .. }
            | AdvisorError::RateLimitExceeded { .. } => 3,
            AdvisorError::Decode { .. } | AdvisorError::CacheCorruption { .. } => 4,
            AdvisorError::InsufficientData { .. } | AdvisorError::Model { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

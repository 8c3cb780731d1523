//! Error types for generation backends and the provider chain.
//!
//! Each [`ProviderError`] variant carries a stable code included in the
//! Display output as `[CODE] message`.

/// Stable error codes for provider failures.
pub mod error_codes {
    /// The backend answered with a non-success HTTP status.
    pub const HTTP_ERROR: &str = "HTTP_ERROR";
    /// The byte stream broke or carried an unparseable payload.
    pub const STREAM_ERROR: &str = "STREAM_ERROR";
    /// No fragment arrived within the allowed window.
    pub const TIMEOUT: &str = "TIMEOUT";
    /// The provider is misconfigured (missing key, bad URL).
    pub const CONFIG_ERROR: &str = "CONFIG_ERROR";
    /// The request could not be sent.
    pub const REQUEST_ERROR: &str = "REQUEST_ERROR";
}

/// A failure raised by a single generation backend.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    /// Non-success HTTP response.
    #[error("[{}] HTTP {status}: {message}", error_codes::HTTP_ERROR)]
    Http {
        /// HTTP status code.
        status: u16,
        /// Extracted error message or raw body.
        message: String,
    },

    /// Stream read or decode failure.
    #[error("[{}] {}", error_codes::STREAM_ERROR, .0)]
    Stream(String),

    /// First-fragment or inter-fragment timeout.
    #[error("[{}] {}", error_codes::TIMEOUT, .0)]
    Timeout(String),

    /// Invalid provider configuration.
    #[error("[{}] {}", error_codes::CONFIG_ERROR, .0)]
    Config(String),

    /// Transport-level request failure.
    #[error("[{}] {}", error_codes::REQUEST_ERROR, .0)]
    Request(String),
}

impl ProviderError {
    /// The stable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Http { .. } => error_codes::HTTP_ERROR,
            Self::Stream(_) => error_codes::STREAM_ERROR,
            Self::Timeout(_) => error_codes::TIMEOUT,
            Self::Config(_) => error_codes::CONFIG_ERROR,
            Self::Request(_) => error_codes::REQUEST_ERROR,
        }
    }

    /// Whether retrying the same backend later could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::Stream(_) | Self::Timeout(_) | Self::Request(_) => true,
            Self::Config(_) => false,
        }
    }
}

/// Failure of a whole chain pass.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChainError {
    /// Every eligible provider failed before producing a fragment.
    #[error("all {attempts} eligible providers failed before streaming")]
    Exhausted {
        /// Number of providers attempted.
        attempts: usize,
    },

    /// No provider satisfies the capability requirements.
    #[error("no provider is eligible (vision required: {require_vision})")]
    NoEligibleProvider {
        /// Whether the pass required vision support.
        require_vision: bool,
    },
}

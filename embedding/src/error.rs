use lotr_config::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Empty input for provider '{provider}'")]
    EmptyInput { provider: String },

    #[error("Input of {chars} chars exceeds the {max} char limit of provider '{provider}'")]
    InputTooLong {
        provider: String,
        chars: usize,
        max: usize,
    },

    #[error("HTTP request to provider '{provider}' failed: {source}")]
    Http {
        provider: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Provider '{provider}' returned status {status}: {message}")]
    Api {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Malformed response from provider '{provider}': {reason}")]
    MalformedResponse { provider: String, reason: String },

    #[error("Provider '{provider}' returned {actual}-dim vector, expected {expected}")]
    DimensionMismatch {
        provider: String,
        expected: usize,
        actual: usize,
    },

    #[error("Cannot compare vectors from '{left}' ({left_dim} dims) and '{right}' ({right_dim} dims)")]
    IncompatibleVectors {
        left: String,
        left_dim: usize,
        right: String,
        right_dim: usize,
    },

    #[error("Provider '{provider}' timed out after {timeout_ms}ms")]
    Timeout { provider: String, timeout_ms: u64 },

    #[error("Unknown embedding provider '{0}'")]
    UnknownProvider(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl EmbeddingError {
    pub fn malformed(provider: &str, reason: impl Into<String>) -> Self {
        EmbeddingError::MalformedResponse {
            provider: provider.to_string(),
            reason: reason.into(),
        }
    }

    pub fn http(provider: &str, source: reqwest::Error) -> Self {
        EmbeddingError::Http {
            provider: provider.to_string(),
            source,
        }
    }

    /// Failures caused by the caller's input rather than the provider
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            EmbeddingError::EmptyInput { .. } | EmbeddingError::InputTooLong { .. }
        )
    }
}

pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

use std::env;

use crate::error::ConfigError;
use crate::pipeline::ProviderKind;

pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const HUGGINGFACE_API_TOKEN: &str = "HUGGINGFACE_API_TOKEN";

/// API keys handed explicitly to provider and answerer constructors
#[derive(Clone, Default)]
pub struct ProviderCredentials {
    pub openai_api_key: Option<String>,
    pub huggingface_api_token: Option<String>,
}

impl ProviderCredentials {
    /// Load `.env` (if present) and read the known key variables once
    pub fn from_env() -> Self {
        if dotenv::dotenv().is_ok() {
            tracing::debug!("Loaded environment overrides from .env");
        }

        Self {
            openai_api_key: non_empty_var(OPENAI_API_KEY),
            huggingface_api_token: non_empty_var(HUGGINGFACE_API_TOKEN),
        }
    }

    pub fn with_openai_api_key(mut self, key: impl Into<String>) -> Self {
        self.openai_api_key = Some(key.into());
        self
    }

    pub fn with_huggingface_api_token(mut self, token: impl Into<String>) -> Self {
        self.huggingface_api_token = Some(token.into());
        self
    }

    /// Key required by `kind`; `Ok(None)` for providers that run locally
    pub fn secret_for(&self, provider_id: &str, kind: ProviderKind) -> Result<Option<String>, ConfigError> {
        let (value, variable) = match kind {
            ProviderKind::OpenAi => (&self.openai_api_key, OPENAI_API_KEY),
            ProviderKind::HuggingFace => (&self.huggingface_api_token, HUGGINGFACE_API_TOKEN),
            ProviderKind::Hashing => return Ok(None),
        };

        value
            .clone()
            .map(Some)
            .ok_or_else(|| ConfigError::MissingCredential {
                provider: provider_id.to_string(),
                variable: variable.to_string(),
            })
    }

    pub fn openai_api_key(&self, used_by: &str) -> Result<String, ConfigError> {
        self.openai_api_key.clone().ok_or_else(|| ConfigError::MissingCredential {
            provider: used_by.to_string(),
            variable: OPENAI_API_KEY.to_string(),
        })
    }
}

impl std::fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "<redacted>"))
            .field("huggingface_api_token", &self.huggingface_api_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

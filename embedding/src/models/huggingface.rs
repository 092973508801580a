use async_trait::async_trait;
use lotr_config::ProviderConfig;
use lotr_observability::log_external_call;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::error::{EmbeddingError, EmbeddingResult};
use crate::provider::{check_dimension, check_input, EmbeddingProvider};
use crate::vector::EmbeddingVector;

pub const HUGGINGFACE_API_BASE: &str = "https://api-inference.huggingface.co";

/// Request body for the HuggingFace feature-extraction pipeline
#[derive(Debug, Clone, Serialize)]
pub struct HuggingFaceEmbeddingRequest<'a> {
    pub inputs: &'a [String],
    pub options: HuggingFaceOptions,
}

#[derive(Debug, Clone, Serialize)]
pub struct HuggingFaceOptions {
    pub wait_for_model: bool,
    pub use_cache: bool,
}

/// Inference API and Inference Endpoints answer in several shapes
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum HuggingFaceEmbeddingResponse {
    /// One vector per input: [[f32, ...], ...]
    DirectArray(Vec<Vec<f32>>),
    /// Single input answered with a bare vector: [f32, ...]
    SingleEmbedding(Vec<f32>),
    Structured { embeddings: Vec<Vec<f32>> },
    Error { error: String },
}

/// Known sentence-transformer output sizes, with family fallbacks
pub fn huggingface_model_dimension(model: &str) -> usize {
    match model {
        "sentence-transformers/all-MiniLM-L6-v2" => 384,
        "sentence-transformers/multi-qa-MiniLM-L6-dot-v1" => 384,
        "sentence-transformers/all-mpnet-base-v2" => 768,
        "BAAI/bge-small-en-v1.5" => 384,
        "BAAI/bge-base-en-v1.5" => 768,
        "BAAI/bge-large-en-v1.5" => 1024,
        m if m.contains("MiniLM-L6") || m.contains("MiniLM-L12") => 384,
        m if m.contains("mpnet-base") => 768,
        m if m.contains("bge-small") || m.contains("e5-small") => 384,
        m if m.contains("bge-large") || m.contains("e5-large") => 1024,
        _ => 768,
    }
}

pub struct HuggingFaceEmbeddingProvider {
    id: String,
    client: Client,
    api_token: String,
    url: String,
    model: String,
    dimension: usize,
    max_input_chars: usize,
    timeout_ms: u64,
}

impl HuggingFaceEmbeddingProvider {
    pub fn new(config: &ProviderConfig, api_token: String) -> EmbeddingResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EmbeddingError::http(&config.id, e))?;

        Ok(Self {
            id: config.id.clone(),
            client,
            api_token,
            url: Self::model_url(config),
            model: config.model.clone(),
            dimension: config
                .dimension
                .unwrap_or_else(|| huggingface_model_dimension(&config.model)),
            max_input_chars: config.max_input_chars,
            timeout_ms: config.timeout_secs * 1000,
        })
    }

    /// A dedicated endpoint wins over the shared Inference API
    fn model_url(config: &ProviderConfig) -> String {
        if let Some(endpoint) = &config.endpoint_url {
            return endpoint.clone();
        }
        let base = config
            .base_url
            .as_deref()
            .unwrap_or(HUGGINGFACE_API_BASE)
            .trim_end_matches('/');
        format!("{}/models/{}", base, config.model)
    }

    async fn request(&self, texts: &[String]) -> EmbeddingResult<Vec<Vec<f32>>> {
        let body = HuggingFaceEmbeddingRequest {
            inputs: texts,
            options: HuggingFaceOptions {
                wait_for_model: true,
                use_cache: true,
            },
        };

        log_external_call!("huggingface", self.url.as_str());
        let start = Instant::now();

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EmbeddingError::Timeout {
                        provider: self.id.clone(),
                        timeout_ms: self.timeout_ms,
                    }
                } else {
                    EmbeddingError::http(&self.id, e)
                }
            })?;

        let status = response.status();
        log_external_call!("huggingface", self.url.as_str(), start.elapsed().as_millis() as u64, status.as_u16());

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Api {
                provider: self.id.clone(),
                status: status.as_u16(),
                message,
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| EmbeddingError::http(&self.id, e))?;
        let embeddings = self.parse_response(&text)?;

        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::malformed(
                &self.id,
                format!("expected {} embeddings, got {}", texts.len(), embeddings.len()),
            ));
        }
        Ok(embeddings)
    }

    fn parse_response(&self, text: &str) -> EmbeddingResult<Vec<Vec<f32>>> {
        match serde_json::from_str::<HuggingFaceEmbeddingResponse>(text) {
            Ok(HuggingFaceEmbeddingResponse::DirectArray(embeddings)) => Ok(embeddings),
            Ok(HuggingFaceEmbeddingResponse::SingleEmbedding(embedding)) => Ok(vec![embedding]),
            Ok(HuggingFaceEmbeddingResponse::Structured { embeddings }) => Ok(embeddings),
            Ok(HuggingFaceEmbeddingResponse::Error { error }) => Err(EmbeddingError::Api {
                provider: self.id.clone(),
                status: 200,
                message: error,
            }),
            Err(parse_error) => {
                // Some pipelines wrap each vector once more: [[[f32]]]
                if let Ok(nested) = serde_json::from_str::<Vec<Vec<Vec<f32>>>>(text) {
                    if nested.iter().all(|inner| inner.len() == 1) {
                        return Ok(nested.into_iter().flatten().collect());
                    }
                    return Err(EmbeddingError::malformed(
                        &self.id,
                        "token-level output; the model needs a pooling pipeline",
                    ));
                }
                let preview: String = text.chars().take(200).collect();
                Err(EmbeddingError::malformed(
                    &self.id,
                    format!("{} (body: {})", parse_error, preview),
                ))
            }
        }
    }
}

#[async_trait]
impl EmbeddingProvider for HuggingFaceEmbeddingProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> EmbeddingResult<EmbeddingVector> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| EmbeddingError::malformed(&self.id, "no embedding returned"))
    }

    async fn embed_batch(&self, texts: &[String]) -> EmbeddingResult<Vec<EmbeddingVector>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        for text in texts {
            check_input(&self.id, text, self.max_input_chars)?;
        }

        self.request(texts)
            .await?
            .into_iter()
            .map(|values| {
                check_dimension(&self.id, self.dimension, &values)?;
                Ok(EmbeddingVector::new(self.id.clone(), values))
            })
            .collect()
    }
}

use async_trait::async_trait;
use lotr_config::ProviderConfig;
use lotr_observability::log_external_call;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::error::{EmbeddingError, EmbeddingResult};
use crate::provider::{check_dimension, check_input, EmbeddingProvider};
use crate::vector::EmbeddingVector;

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "text-embedding-ada-002";

#[derive(Debug, Clone, Serialize)]
pub struct OpenAIEmbeddingRequest<'a> {
    pub model: &'a str,
    pub input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIEmbeddingResponse {
    pub data: Vec<OpenAIEmbeddingData>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIEmbeddingData {
    pub embedding: Vec<f32>,
    pub index: usize,
}

pub fn openai_model_dimension(model: &str) -> usize {
    match model {
        "text-embedding-3-large" => 3072,
        "text-embedding-3-small" => 1536,
        "text-embedding-ada-002" => 1536,
        _ => 1536,
    }
}

pub struct OpenAiEmbeddingProvider {
    id: String,
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    dimension: usize,
    /// Only the text-embedding-3 family accepts a requested output size
    request_dimensions: Option<usize>,
    max_input_chars: usize,
    timeout_ms: u64,
}

impl OpenAiEmbeddingProvider {
    pub fn new(config: &ProviderConfig, api_key: String) -> EmbeddingResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EmbeddingError::http(&config.id, e))?;

        let dimension = config
            .dimension
            .unwrap_or_else(|| openai_model_dimension(&config.model));
        let request_dimensions = if config.model.starts_with("text-embedding-3") {
            config.dimension
        } else {
            None
        };

        Ok(Self {
            id: config.id.clone(),
            client,
            api_key,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| OPENAI_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: config.model.clone(),
            dimension,
            request_dimensions,
            max_input_chars: config.max_input_chars,
            timeout_ms: config.timeout_secs * 1000,
        })
    }

    async fn request(&self, texts: &[String]) -> EmbeddingResult<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);
        let request = OpenAIEmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: self.request_dimensions,
        };

        log_external_call!("openai", url.as_str());
        let start = Instant::now();

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        log_external_call!("openai", url.as_str(), start.elapsed().as_millis() as u64, status.as_u16());

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Api {
                provider: self.id.clone(),
                status: status.as_u16(),
                message,
            });
        }

        let mut body: OpenAIEmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::malformed(&self.id, e.to_string()))?;

        if body.data.len() != texts.len() {
            return Err(EmbeddingError::malformed(
                &self.id,
                format!("expected {} embeddings, got {}", texts.len(), body.data.len()),
            ));
        }

        body.data.sort_by_key(|d| d.index);
        Ok(body.data.into_iter().map(|d| d.embedding).collect())
    }

    fn map_send_error(&self, error: reqwest::Error) -> EmbeddingError {
        if error.is_timeout() {
            EmbeddingError::Timeout {
                provider: self.id.clone(),
                timeout_ms: self.timeout_ms,
            }
        } else {
            EmbeddingError::http(&self.id, error)
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
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

        let embeddings = self.request(texts).await?;
        embeddings
            .into_iter()
            .map(|values| {
                check_dimension(&self.id, self.dimension, &values)?;
                Ok(EmbeddingVector::new(self.id.clone(), values))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lotr_config::ProviderKind;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str, dimension: usize) -> ProviderConfig {
        ProviderConfig {
            id: "openai".to_string(),
            kind: ProviderKind::OpenAi,
            model: DEFAULT_OPENAI_MODEL.to_string(),
            dimension: Some(dimension),
            base_url: Some(base_url.to_string()),
            endpoint_url: None,
            timeout_secs: 5,
            max_input_chars: 100,
            cache_capacity: 0,
        }
    }

    #[test]
    fn test_model_dimensions() {
        assert_eq!(openai_model_dimension("text-embedding-3-large"), 3072);
        assert_eq!(openai_model_dimension("text-embedding-ada-002"), 1536);
    }

    #[tokio::test]
    async fn test_batch_is_reordered_by_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "model": "text-embedding-ada-002",
                "data": [
                    { "object": "embedding", "index": 1, "embedding": [0.0, 1.0, 0.0] },
                    { "object": "embedding", "index": 0, "embedding": [1.0, 0.0, 0.0] }
                ],
                "usage": { "prompt_tokens": 2, "total_tokens": 2 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenAiEmbeddingProvider::new(&config(&server.uri(), 3), "sk-test".to_string()).unwrap();
        let vectors = provider
            .embed_batch(&["first".to_string(), "second".to_string()])
            .await
            .unwrap();

        assert_eq!(vectors[0].values(), &[1.0, 0.0, 0.0]);
        assert_eq!(vectors[1].values(), &[0.0, 1.0, 0.0]);
        assert_eq!(vectors[0].provider(), "openai");
    }

    #[tokio::test]
    async fn test_api_error_surfaces_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let provider = OpenAiEmbeddingProvider::new(&config(&server.uri(), 3), "sk-test".to_string()).unwrap();
        let err = provider.embed("hello").await.unwrap_err();

        assert!(matches!(err, EmbeddingError::Api { status: 429, ref message, .. } if message == "rate limited"));
    }

    #[tokio::test]
    async fn test_wrong_dimension_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "index": 0, "embedding": [1.0, 0.0] }]
            })))
            .mount(&server)
            .await;

        let provider = OpenAiEmbeddingProvider::new(&config(&server.uri(), 3), "sk-test".to_string()).unwrap();
        assert!(matches!(
            provider.embed("hello").await,
            Err(EmbeddingError::DimensionMismatch { expected: 3, actual: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_input_never_reaches_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let provider = OpenAiEmbeddingProvider::new(&config(&server.uri(), 3), "sk-test".to_string()).unwrap();
        assert!(matches!(
            provider.embed("   ").await,
            Err(EmbeddingError::EmptyInput { .. })
        ));
    }
}

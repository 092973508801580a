use async_trait::async_trait;
use lotr_config::AnswerConfig;
use lotr_models::Document;
use lotr_observability::log_external_call;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::errors::AnswerError;

pub const OPENAI_CHAT_BASE: &str = "https://api.openai.com/v1";

/// Turns a query plus context documents into answer text
#[async_trait]
pub trait Answerer: Send + Sync {
    async fn answer(&self, query: &str, documents: &[Arc<Document>]) -> Result<String, AnswerError>;
}

/// "Stuff" prompt: every document's text joined by blank lines
pub fn stuff_prompt(query: &str, documents: &[Arc<Document>]) -> String {
    let context = documents
        .iter()
        .map(|doc| doc.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Use the following pieces of context to answer the question at the end. \
         If you don't know the answer, just say that you don't know, \
         don't try to make up an answer.\n\n{}\n\nQuestion: {}\nHelpful Answer:",
        context, query
    )
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat completions client that answers with the stuff prompt
pub struct OpenAiChatAnswerer {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    timeout_ms: u64,
}

impl OpenAiChatAnswerer {
    pub fn new(config: &AnswerConfig, api_key: String) -> Result<Self, AnswerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: config
                .base_url
                .as_deref()
                .unwrap_or(OPENAI_CHAT_BASE)
                .trim_end_matches('/')
                .to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            timeout_ms: config.timeout_secs * 1000,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Answerer for OpenAiChatAnswerer {
    async fn answer(&self, query: &str, documents: &[Arc<Document>]) -> Result<String, AnswerError> {
        let url = format!("{}/chat/completions", self.base_url);
        let prompt = stuff_prompt(query, documents);
        let request = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: vec![ChatMessage {
                role: "user",
                content: &prompt,
            }],
        };

        log_external_call!("openai-chat", url.as_str());
        let start = Instant::now();

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AnswerError::Timeout {
                        timeout_ms: self.timeout_ms,
                    }
                } else {
                    AnswerError::Http(e)
                }
            })?;

        let status = response.status();
        log_external_call!("openai-chat", url.as_str(), start.elapsed().as_millis() as u64, status.as_u16());

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AnswerError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(AnswerError::EmptyResponse)
    }
}

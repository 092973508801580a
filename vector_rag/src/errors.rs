use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use embedding::EmbeddingError;
use lotr_config::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RetrieverError {
    #[error("Retriever '{retriever}' was asked for k={k}; k must be at least 1")]
    InvalidK { retriever: String, k: usize },

    #[error("No index for provider '{provider}' (retriever '{retriever}')")]
    MissingIndex { retriever: String, provider: String },

    #[error("Query embedding failed in retriever '{retriever}': {source}")]
    Embedding {
        retriever: String,
        #[source]
        source: EmbeddingError,
    },

    #[error("Query embedding with provider '{provider}' timed out after {timeout_ms}ms (retriever '{retriever}')")]
    Timeout {
        retriever: String,
        provider: String,
        timeout_ms: u64,
    },
}

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("No retrievers configured")]
    NoRetrievers,
}

#[derive(Error, Debug)]
pub enum ReductionError {
    #[error("Cluster count must be positive, got {0}")]
    InvalidClusterCount(usize),

    #[error("Representatives per cluster must be positive, got {0}")]
    InvalidClosestCount(usize),

    #[error("Similarity threshold must be finite and within [-1, 1], got {0}")]
    InvalidThreshold(f32),

    #[error("Document embedding with provider '{provider}' failed: {source}")]
    Embedding {
        provider: String,
        #[source]
        source: EmbeddingError,
    },
}

#[derive(Error, Debug)]
pub enum AnswerError {
    #[error("Answer request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Answer API returned status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Answer request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Answer API returned no content")]
    EmptyResponse,

    #[error("No answering stage configured")]
    NotConfigured,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse PDF {path}: {reason}")]
    Pdf { path: String, reason: String },

    #[error("Invalid chunking: chunk_overlap {overlap} must be smaller than chunk_size {size}")]
    InvalidChunking { size: usize, overlap: usize },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Indexing with provider '{provider}' failed: {source}")]
    Embedding {
        provider: String,
        #[source]
        source: EmbeddingError,
    },

    #[error("Duplicate document id '{0}'")]
    DuplicateId(String),
}

/// Any failure of a pipeline call, tagged with the stage that produced it
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Retriever '{retriever}' failed: {source}")]
    Retriever {
        retriever: String,
        #[source]
        source: RetrieverError,
    },

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Reduction(#[from] ReductionError),

    #[error(transparent)]
    Answer(#[from] AnswerError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Provider(#[from] EmbeddingError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl PipelineError {
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Retriever { .. } => "retrieve",
            PipelineError::Merge(_) => "merge",
            PipelineError::Reduction(_) => "reduce",
            PipelineError::Answer(_) => "answer",
            PipelineError::Ingest(_) => "ingest",
            PipelineError::Store(_) => "index",
            PipelineError::Provider(_) | PipelineError::Config(_) => "setup",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            PipelineError::Retriever { source, .. } => match source {
                RetrieverError::InvalidK { .. } => StatusCode::BAD_REQUEST,
                RetrieverError::Embedding { source, .. } if source.is_invalid_input() => StatusCode::BAD_REQUEST,
                RetrieverError::Embedding { .. } | RetrieverError::Timeout { .. } => StatusCode::BAD_GATEWAY,
                RetrieverError::MissingIndex { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            PipelineError::Reduction(ReductionError::Embedding { .. }) => StatusCode::BAD_GATEWAY,
            PipelineError::Store(StoreError::Embedding { .. }) => StatusCode::BAD_GATEWAY,
            PipelineError::Answer(AnswerError::NotConfigured) => StatusCode::INTERNAL_SERVER_ERROR,
            PipelineError::Answer(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ResponseError for PipelineError {
    fn status_code(&self) -> StatusCode {
        PipelineError::status_code(self)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(PipelineError::status_code(self)).json(serde_json::json!({
            "error": self.to_string(),
            "stage": self.stage()
        }))
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

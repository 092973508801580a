use lotr_models::{Document, SourceMetadata};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::services::pipeline::{PipelineOutput, RetrieverFailure, StageTimings};

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

#[derive(Debug, Serialize, Clone)]
pub struct DocumentResponse {
    pub id: String,
    pub text: String,
    pub metadata: SourceMetadata,
}

impl From<&Arc<Document>> for DocumentResponse {
    fn from(doc: &Arc<Document>) -> Self {
        Self {
            id: doc.id.clone(),
            text: doc.text.clone(),
            metadata: doc.source_metadata.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RetrieveResponse {
    pub documents: Vec<DocumentResponse>,
    pub merged_count: usize,
    pub failures: Vec<RetrieverFailure>,
    pub timings: StageTimings,
}

impl From<PipelineOutput> for RetrieveResponse {
    fn from(output: PipelineOutput) -> Self {
        Self {
            documents: output.documents.iter().map(DocumentResponse::from).collect(),
            merged_count: output.merged_count,
            failures: output.failures,
            timings: output.timings,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnswerResponse {
    pub answer: String,
    pub documents: Vec<DocumentResponse>,
    pub failures: Vec<RetrieverFailure>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub documents: usize,
    pub indexes: Vec<String>,
    pub index_version: u64,
}

#[derive(Debug, Serialize)]
pub struct ReindexResponse {
    pub documents: usize,
    pub indexes: Vec<String>,
    pub index_version: u64,
}

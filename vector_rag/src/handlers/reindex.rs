use actix_web::{web, HttpResponse};
use lotr_observability::info;
use std::sync::Arc;

use crate::errors::PipelineError;
use crate::models::ReindexResponse;
use crate::services::Pipeline;

/// Rebuild every index from the configured corpus files
pub async fn reindex_handler(pipeline: web::Data<Arc<Pipeline>>) -> Result<HttpResponse, PipelineError> {
    let snapshot = pipeline.reindex_corpus().await?;
    info!(documents = snapshot.len(), version = snapshot.version, "Reindexed corpus");

    Ok(HttpResponse::Ok().json(ReindexResponse {
        documents: snapshot.len(),
        indexes: snapshot.providers().into_iter().map(String::from).collect(),
        index_version: snapshot.version,
    }))
}

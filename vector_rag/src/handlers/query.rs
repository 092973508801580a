use actix_web::{web, HttpResponse};
use lotr_observability::info;
use std::sync::Arc;

use crate::errors::PipelineError;
use crate::models::{AnswerResponse, DocumentResponse, QueryRequest, RetrieveResponse};
use crate::services::Pipeline;

pub async fn retrieve_handler(
    req: web::Json<QueryRequest>,
    pipeline: web::Data<Arc<Pipeline>>,
) -> Result<HttpResponse, PipelineError> {
    info!(query_chars = req.query.chars().count(), "Retrieve request");
    let output = pipeline.run(&req.query).await?;
    Ok(HttpResponse::Ok().json(RetrieveResponse::from(output)))
}

pub async fn answer_handler(
    req: web::Json<QueryRequest>,
    pipeline: web::Data<Arc<Pipeline>>,
) -> Result<HttpResponse, PipelineError> {
    info!(query_chars = req.query.chars().count(), "Answer request");
    let result = pipeline.answer(&req.query).await?;
    Ok(HttpResponse::Ok().json(AnswerResponse {
        answer: result.answer,
        documents: result.output.documents.iter().map(DocumentResponse::from).collect(),
        failures: result.output.failures,
    }))
}

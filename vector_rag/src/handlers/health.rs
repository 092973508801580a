use actix_web::{web, HttpResponse};
use std::sync::Arc;

use crate::models::HealthResponse;
use crate::services::Pipeline;

pub async fn health_handler(pipeline: web::Data<Arc<Pipeline>>) -> HttpResponse {
    let snapshot = pipeline.store().snapshot();
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        documents: snapshot.len(),
        indexes: snapshot.providers().into_iter().map(String::from).collect(),
        index_version: snapshot.version,
    })
}

pub mod health;
pub mod query;
pub mod reindex;

pub use health::health_handler;
pub use query::{answer_handler, retrieve_handler};
pub use reindex::reindex_handler;

use actix_web::web;

/// Mount every pipeline route
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_handler))
        .route("/retrieve", web::post().to(retrieve_handler))
        .route("/answer", web::post().to(answer_handler))
        .route("/reindex", web::post().to(reindex_handler));
}

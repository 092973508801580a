use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use embedding::ProviderRegistry;
use lotr_config::{PipelineConfig, ProviderCredentials};
use lotr_observability::{init_tracing, observability, info, warn, TracingConfig};
use std::env;
use std::sync::Arc;

use vector_rag::handlers;
use vector_rag::services::{Answerer, DocumentStore, OpenAiChatAnswerer, Pipeline};

const DEFAULT_CONFIG_PATH: &str = "config/lotr.json";

fn build_answerer(config: &PipelineConfig, credentials: &ProviderCredentials) -> Result<Option<Arc<dyn Answerer>>> {
    let Some(answer_config) = &config.answer else {
        warn!("No answer section configured; /answer will be unavailable");
        return Ok(None);
    };

    let api_key = credentials
        .openai_api_key("answer")
        .context("answering stage needs an OpenAI API key")?;
    let answerer = OpenAiChatAnswerer::new(answer_config, api_key).context("failed to build answer client")?;
    info!(model = answerer.model(), "Answering stage ready");
    Ok(Some(Arc::new(answerer)))
}

#[actix_web::main]
async fn main() -> Result<()> {
    // Loads .env before anything reads the environment
    let credentials = ProviderCredentials::from_env();
    init_tracing(TracingConfig::for_service("lotr"));

    let port = env::var("LOTR_PORT")
        .unwrap_or_else(|_| "8090".to_string())
        .parse::<u16>()
        .context("LOTR_PORT must be a port number")?;
    let host = env::var("LOTR_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

    let config_path = env::var("LOTR_CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    info!("Loading pipeline config from: {}", config_path);
    let config = PipelineConfig::from_file(&config_path)
        .with_context(|| format!("failed to load pipeline config from {}", config_path))?;

    let registry = ProviderRegistry::from_config(&config.providers, &credentials)
        .context("failed to initialize embedding providers")?;
    let answerer = build_answerer(&config, &credentials)?;

    let store = Arc::new(DocumentStore::new());
    let pipeline = Arc::new(
        Pipeline::from_config(&config, &registry, store, answerer).context("invalid pipeline configuration")?,
    );

    if config.corpus.paths.is_empty() {
        warn!("No corpus paths configured; starting with an empty store");
    } else {
        let snapshot = pipeline.reindex_corpus().await.context("initial indexing failed")?;
        info!(documents = snapshot.len(), indexes = ?snapshot.providers(), "Initial index built");
    }

    info!("Starting LOTR service on {}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .wrap(observability("lotr"))
            .app_data(web::Data::new(Arc::clone(&pipeline)))
            .configure(handlers::configure)
    })
    .bind((host.as_str(), port))?
    .run()
    .await?;

    Ok(())
}

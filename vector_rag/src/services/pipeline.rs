use embedding::{EmbeddingProvider, ProviderRegistry};
use futures::future::{join_all, try_join_all};
use lotr_config::{CorpusConfig, PipelineConfig};
use lotr_models::{Document, RetrievalResult};
use lotr_observability::{log_retriever_completed, log_retriever_failed, Stage, StageEvent};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

use crate::errors::{AnswerError, PipelineError, PipelineResult, RetrieverError};
use crate::services::answer::Answerer;
use crate::services::ingest::load_corpus;
use crate::services::merger::merge;
use crate::services::reducer::Reducer;
use crate::services::reorder::reorder;
use crate::services::retriever::Retriever;
use crate::services::store::{DocumentStore, StoreSnapshot};

/// A retriever that failed while partial results were allowed
#[derive(Debug, Clone, Serialize)]
pub struct RetrieverFailure {
    pub retriever: String,
    pub provider: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StageTimings {
    pub retrieve_ms: u64,
    pub merge_ms: u64,
    pub reduce_ms: u64,
    pub reorder_ms: u64,
    pub total_ms: u64,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub documents: Vec<Arc<Document>>,
    /// Size of the merged sequence before reduction
    pub merged_count: usize,
    pub failures: Vec<RetrieverFailure>,
    pub timings: StageTimings,
}

#[derive(Debug, Clone)]
pub struct AnswerOutput {
    pub answer: String,
    pub output: PipelineOutput,
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Query-time orchestration: retrieve, merge, reduce, reorder and optionally answer
pub struct Pipeline {
    retrievers: Vec<Retriever>,
    reducer: Reducer,
    reorder: bool,
    partial_results: bool,
    store: Arc<DocumentStore>,
    index_providers: Vec<Arc<dyn EmbeddingProvider>>,
    corpus: CorpusConfig,
    answerer: Option<Arc<dyn Answerer>>,
}

impl Pipeline {
    pub fn from_config(
        config: &PipelineConfig,
        registry: &ProviderRegistry,
        store: Arc<DocumentStore>,
        answerer: Option<Arc<dyn Answerer>>,
    ) -> PipelineResult<Self> {
        config.validate()?;

        let embed_timeout = Duration::from_millis(config.embed_timeout_ms);
        let mut retrievers = Vec::with_capacity(config.retrievers.len());
        let mut index_providers: Vec<Arc<dyn EmbeddingProvider>> = Vec::new();

        for retriever_config in &config.retrievers {
            let provider = registry.require(&retriever_config.provider)?;
            if !index_providers.iter().any(|p| p.id() == provider.id()) {
                index_providers.push(Arc::clone(&provider));
            }
            retrievers.push(Retriever::new(
                retriever_config.clone(),
                provider,
                Arc::clone(&store),
                embed_timeout,
            ));
        }

        let reduction_provider = registry.require(&config.reduction_provider)?;
        let reducer = Reducer::from_config(&config.reduction, reduction_provider, embed_timeout)?;

        info!(
            retrievers = retrievers.len(),
            reduction = reducer.name(),
            reduction_provider = %config.reduction_provider,
            reorder = config.reorder,
            partial_results = config.partial_results,
            "Pipeline configured"
        );

        Ok(Self {
            retrievers,
            reducer,
            reorder: config.reorder,
            partial_results: config.partial_results,
            store,
            index_providers,
            corpus: config.corpus.clone(),
            answerer,
        })
    }

    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    pub fn retriever_ids(&self) -> Vec<&str> {
        self.retrievers.iter().map(Retriever::id).collect()
    }

    pub fn reducer_name(&self) -> &'static str {
        self.reducer.name()
    }

    pub fn has_answerer(&self) -> bool {
        self.answerer.is_some()
    }

    /// Run one retriever and report it
    async fn run_retriever(
        &self,
        retriever: &Retriever,
        query: &str,
    ) -> Result<RetrievalResult, RetrieverError> {
        let start = Instant::now();
        let result = retriever.retrieve(query, retriever.k()).await;
        match &result {
            Ok(hits) => log_retriever_completed(retriever.id(), retriever.provider_id(), hits.len(), elapsed_ms(start)),
            Err(e) => log_retriever_failed(retriever.id(), retriever.provider_id(), &e.to_string(), elapsed_ms(start)),
        }
        result
    }

    async fn retrieve_all(&self, query: &str) -> PipelineResult<(Vec<RetrievalResult>, Vec<RetrieverFailure>)> {
        if self.partial_results {
            let outcomes = join_all(self.retrievers.iter().map(|r| self.run_retriever(r, query))).await;

            let mut results = Vec::with_capacity(outcomes.len());
            let mut failures = Vec::new();
            for (retriever, outcome) in self.retrievers.iter().zip(outcomes) {
                match outcome {
                    Ok(result) => results.push(result),
                    Err(e) => {
                        failures.push(RetrieverFailure {
                            retriever: retriever.id().to_string(),
                            provider: retriever.provider_id().to_string(),
                            error: e.to_string(),
                        });
                        results.push(RetrievalResult::empty(retriever.id()));
                    }
                }
            }
            Ok((results, failures))
        } else {
            let results = try_join_all(self.retrievers.iter().map(|r| async move {
                self.run_retriever(r, query)
                    .await
                    .map_err(|source| PipelineError::Retriever {
                        retriever: r.id().to_string(),
                        source,
                    })
            }))
            .await?;
            Ok((results, Vec::new()))
        }
    }

    /// Retrieve, merge, reduce and reorder documents for `query`
    pub async fn run(&self, query: &str) -> PipelineResult<PipelineOutput> {
        let total = Instant::now();
        let mut timings = StageTimings::default();

        let start = Instant::now();
        let (results, failures) = self.retrieve_all(query).await?;
        timings.retrieve_ms = elapsed_ms(start);

        let start = Instant::now();
        let merged = merge(&results)?;
        let merged_count = merged.len();
        timings.merge_ms = elapsed_ms(start);
        StageEvent::new(Stage::Merge)
            .component("round-robin")
            .counts(results.iter().map(RetrievalResult::len).sum(), merged_count)
            .duration_ms(timings.merge_ms)
            .success()
            .emit();

        let start = Instant::now();
        let reduced = self.reducer.reduce(merged).await?;
        timings.reduce_ms = elapsed_ms(start);

        let documents = if self.reorder {
            let start = Instant::now();
            let count = reduced.len();
            let reordered = reorder(reduced);
            timings.reorder_ms = elapsed_ms(start);
            StageEvent::new(Stage::Reorder)
                .component("lost-in-the-middle")
                .counts(count, count)
                .duration_ms(timings.reorder_ms)
                .success()
                .emit();
            reordered
        } else {
            reduced
        };

        timings.total_ms = elapsed_ms(total);
        info!(
            retrievers = self.retrievers.len(),
            failed = failures.len(),
            merged = merged_count,
            returned = documents.len(),
            total_ms = timings.total_ms,
            "Pipeline query completed"
        );

        Ok(PipelineOutput {
            documents,
            merged_count,
            failures,
            timings,
        })
    }

    /// Run the pipeline and hand its documents to the answering stage
    pub async fn answer(&self, query: &str) -> PipelineResult<AnswerOutput> {
        let answerer = self.answerer.as_ref().ok_or(AnswerError::NotConfigured)?;
        let output = self.run(query).await?;

        let start = Instant::now();
        match answerer.answer(query, &output.documents).await {
            Ok(answer) => {
                StageEvent::new(Stage::Answer)
                    .counts(output.documents.len(), 1)
                    .duration_ms(elapsed_ms(start))
                    .success()
                    .emit();
                Ok(AnswerOutput { answer, output })
            }
            Err(e) => {
                StageEvent::new(Stage::Answer)
                    .duration_ms(elapsed_ms(start))
                    .failure(e.to_string())
                    .emit();
                Err(e.into())
            }
        }
    }

    /// Replace the corpus and rebuild every retriever index
    pub async fn rebuild_index(&self, documents: Vec<Document>) -> PipelineResult<Arc<StoreSnapshot>> {
        Ok(self.store.rebuild(documents, &self.index_providers).await?)
    }

    /// Re-read the configured corpus files and rebuild the indexes
    pub async fn reindex_corpus(&self) -> PipelineResult<Arc<StoreSnapshot>> {
        let documents = load_corpus(&self.corpus).await?;
        self.rebuild_index(documents).await
    }
}

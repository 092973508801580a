//! Pipeline stage events.
//!
//! Every stage of a query (and every index build) reports one structured event
//! with its outcome, duration and item counts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of a stage
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OperationResult {
    Success,
    Failure,
    Partial,
    Skipped,
}

impl std::fmt::Display for OperationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
            Self::Partial => write!(f, "partial"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Ingest,
    Index,
    Embed,
    Retrieve,
    Merge,
    Reduce,
    Reorder,
    Answer,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ingest => "ingest",
            Self::Index => "index",
            Self::Embed => "embed",
            Self::Retrieve => "retrieve",
            Self::Merge => "merge",
            Self::Reduce => "reduce",
            Self::Reorder => "reorder",
            Self::Answer => "answer",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageEvent {
    pub timestamp: DateTime<Utc>,
    pub stage: Stage,
    /// Retriever, provider or strategy the event refers to
    pub component: Option<String>,
    pub result: OperationResult,
    pub duration_ms: Option<u64>,
    pub input_count: Option<usize>,
    pub output_count: Option<usize>,
    pub error: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl StageEvent {
    pub fn new(stage: Stage) -> StageEventBuilder {
        StageEventBuilder {
            stage,
            component: None,
            result: OperationResult::Success,
            duration_ms: None,
            input_count: None,
            output_count: None,
            error: None,
            metadata: None,
        }
    }
}

pub struct StageEventBuilder {
    stage: Stage,
    component: Option<String>,
    result: OperationResult,
    duration_ms: Option<u64>,
    input_count: Option<usize>,
    output_count: Option<usize>,
    error: Option<String>,
    metadata: Option<serde_json::Value>,
}

impl StageEventBuilder {
    pub fn component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    pub fn result(mut self, result: OperationResult) -> Self {
        self.result = result;
        self
    }

    pub fn success(mut self) -> Self {
        self.result = OperationResult::Success;
        self
    }

    pub fn failure(mut self, error: impl Into<String>) -> Self {
        self.result = OperationResult::Failure;
        self.error = Some(error.into());
        self
    }

    pub fn duration_ms(mut self, ms: u64) -> Self {
        self.duration_ms = Some(ms);
        self
    }

    pub fn counts(mut self, input: usize, output: usize) -> Self {
        self.input_count = Some(input);
        self.output_count = Some(output);
        self
    }

    pub fn output_count(mut self, output: usize) -> Self {
        self.output_count = Some(output);
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Build and emit the event as a log
    pub fn emit(self) {
        let event = self.build();
        let json = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
        let component = event.component.as_deref().unwrap_or("-");

        match event.result {
            OperationResult::Success => tracing::info!(
                target: "stage_event",
                stage = %event.stage,
                component = component,
                duration_ms = ?event.duration_ms,
                result = "success",
                "StageEvent: {}", json
            ),
            OperationResult::Failure => tracing::error!(
                target: "stage_event",
                stage = %event.stage,
                component = component,
                result = "failure",
                error = ?event.error,
                "StageEvent: {}", json
            ),
            OperationResult::Partial => tracing::warn!(
                target: "stage_event",
                stage = %event.stage,
                component = component,
                result = "partial",
                "StageEvent: {}", json
            ),
            OperationResult::Skipped => tracing::debug!(
                target: "stage_event",
                stage = %event.stage,
                component = component,
                result = "skipped",
                "StageEvent: {}", json
            ),
        }
    }

    pub fn build(self) -> StageEvent {
        StageEvent {
            timestamp: Utc::now(),
            stage: self.stage,
            component: self.component,
            result: self.result,
            duration_ms: self.duration_ms,
            input_count: self.input_count,
            output_count: self.output_count,
            error: self.error,
            metadata: self.metadata,
        }
    }
}

// ============================================================================
// Convenience functions for common stage events
// ============================================================================

pub fn log_retriever_completed(retriever: &str, provider: &str, hits: usize, duration_ms: u64) {
    StageEvent::new(Stage::Retrieve)
        .component(retriever)
        .duration_ms(duration_ms)
        .output_count(hits)
        .metadata(serde_json::json!({ "provider": provider }))
        .success()
        .emit();
}

pub fn log_retriever_failed(retriever: &str, provider: &str, error: &str, duration_ms: u64) {
    StageEvent::new(Stage::Retrieve)
        .component(retriever)
        .duration_ms(duration_ms)
        .metadata(serde_json::json!({ "provider": provider }))
        .failure(error)
        .emit();
}

pub fn log_reduction_completed(strategy: &str, input: usize, output: usize, duration_ms: u64) {
    StageEvent::new(Stage::Reduce)
        .component(strategy)
        .duration_ms(duration_ms)
        .counts(input, output)
        .success()
        .emit();
}

pub fn log_index_built(provider: &str, documents: usize, duration_ms: u64) {
    StageEvent::new(Stage::Index)
        .component(provider)
        .duration_ms(duration_ms)
        .output_count(documents)
        .success()
        .emit();
}

pub fn log_source_ingested(source: &str, pages: usize, chunks: usize, duration_ms: u64) {
    StageEvent::new(Stage::Ingest)
        .component(source)
        .duration_ms(duration_ms)
        .output_count(chunks)
        .metadata(serde_json::json!({ "pages": pages }))
        .success()
        .emit();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_event_builder() {
        let event = StageEvent::new(Stage::Reduce)
            .component("clustering-filter")
            .duration_ms(12)
            .counts(10, 3)
            .success()
            .build();

        assert_eq!(event.stage, Stage::Reduce);
        assert_eq!(event.component.as_deref(), Some("clustering-filter"));
        assert_eq!(event.input_count, Some(10));
        assert_eq!(event.output_count, Some(3));
        assert_eq!(event.result, OperationResult::Success);
    }

    #[test]
    fn test_failure_records_error() {
        let event = StageEvent::new(Stage::Retrieve)
            .component("minilm-similarity")
            .failure("embedding timed out")
            .build();

        assert_eq!(event.result, OperationResult::Failure);
        assert_eq!(event.error.as_deref(), Some("embedding timed out"));
    }

    #[test]
    fn test_event_serializes_snake_case() {
        let event = StageEvent::new(Stage::Answer).result(OperationResult::Skipped).build();
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["stage"], "answer");
        assert_eq!(json["result"], "skipped");
    }
}

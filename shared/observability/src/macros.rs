//! Convenience macros for common logging patterns in the pipeline.

/// Log a timed operation (measures and logs duration)
#[macro_export]
macro_rules! log_timed {
    ($name:expr, $block:expr) => {{
        let start = std::time::Instant::now();
        let result = $block;
        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(target: "timing", operation = $name, duration_ms = duration_ms, "operation completed");
        result
    }};
}

/// Log an external service call
#[macro_export]
macro_rules! log_external_call {
    ($service:expr, $endpoint:expr) => {
        tracing::debug!(target: "external", service = $service, endpoint = $endpoint, "calling external service");
    };
    ($service:expr, $endpoint:expr, $duration_ms:expr, $status:expr) => {
        tracing::info!(target: "external", service = $service, endpoint = $endpoint, duration_ms = $duration_ms, status = $status, "external call completed");
    };
}

/// Log a cache operation
#[macro_export]
macro_rules! log_cache {
    (hit, $key:expr) => {
        tracing::trace!(target: "cache", operation = "hit", key = $key, "cache hit");
    };
    (miss, $key:expr) => {
        tracing::trace!(target: "cache", operation = "miss", key = $key, "cache miss");
    };
    (evict, $key:expr) => {
        tracing::debug!(target: "cache", operation = "evict", key = $key, "cache evict");
    };
}

/// Log a parameter that was adjusted to fit the input
#[macro_export]
macro_rules! log_clamped {
    ($param:expr, $requested:expr, $effective:expr) => {
        tracing::debug!(target: "params", param = $param, requested = $requested, effective = $effective, "parameter clamped");
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_macros_compile() {
        let value = log_timed!("sum", (1..=4).sum::<u32>());
        assert_eq!(value, 10);

        log_external_call!("openai", "/embeddings");
        log_external_call!("openai", "/embeddings", 12u64, 200u16);

        log_cache!(hit, "minilm:abc");
        log_cache!(miss, "minilm:def");
        log_cache!(evict, "minilm:abc");

        log_clamped!("num_clusters", 10usize, 4usize);
    }
}

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Trait for metrics backends. Implementations can forward to Prometheus,
/// StatsD, or simply log metrics.
pub trait MetricsBackend: Send + Sync {
    fn record_counter(&self, name: &str, value: u64);
    fn record_gauge(&self, name: &str, value: f64);
}

/// In-memory metrics collector with atomic counters, one per run. Thread
/// safe so a future concurrent-mapping orchestrator can share it.
pub struct RunMetrics {
    pub mappings_processed: AtomicU64,
    pub mappings_degraded: AtomicU64,
    pub mappings_failed: AtomicU64,
    pub llm_retries: AtomicU64,
    pub golden_captures_succeeded: AtomicU64,
    pub golden_captures_failed: AtomicU64,
    pub test_runs_succeeded: AtomicU64,
    pub test_runs_failed: AtomicU64,
    backend: Option<Arc<dyn MetricsBackend>>,
}

impl std::fmt::Debug for RunMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunMetrics")
            .field("mappings_processed", &self.mappings_processed)
            .field("mappings_degraded", &self.mappings_degraded)
            .field("mappings_failed", &self.mappings_failed)
            .field("llm_retries", &self.llm_retries)
            .finish()
    }
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RunMetrics {
    pub fn new() -> Self {
        Self {
            mappings_processed: AtomicU64::new(0),
            mappings_degraded: AtomicU64::new(0),
            mappings_failed: AtomicU64::new(0),
            llm_retries: AtomicU64::new(0),
            golden_captures_succeeded: AtomicU64::new(0),
            golden_captures_failed: AtomicU64::new(0),
            test_runs_succeeded: AtomicU64::new(0),
            test_runs_failed: AtomicU64::new(0),
            backend: None,
        }
    }

    pub fn with_backend(backend: Arc<dyn MetricsBackend>) -> Self {
        Self {
            backend: Some(backend),
            ..Self::new()
        }
    }

    pub fn record_mapping_processed(&self) {
        let val = self.mappings_processed.fetch_add(1, Ordering::Relaxed) + 1;
        self.emit("ctg.pipeline.mappings_processed", val);
    }

    pub fn record_mapping_degraded(&self) {
        let val = self.mappings_degraded.fetch_add(1, Ordering::Relaxed) + 1;
        self.emit("ctg.pipeline.mappings_degraded", val);
    }

    pub fn record_mapping_failed(&self) {
        let val = self.mappings_failed.fetch_add(1, Ordering::Relaxed) + 1;
        self.emit("ctg.pipeline.mappings_failed", val);
    }

    pub fn record_llm_retry(&self) {
        let val = self.llm_retries.fetch_add(1, Ordering::Relaxed) + 1;
        self.emit("ctg.pipeline.llm_retries", val);
    }

    pub fn record_golden_capture(&self, succeeded: bool) {
        if succeeded {
            let val = self.golden_captures_succeeded.fetch_add(1, Ordering::Relaxed) + 1;
            self.emit("ctg.pipeline.golden_captures_succeeded", val);
        } else {
            let val = self.golden_captures_failed.fetch_add(1, Ordering::Relaxed) + 1;
            self.emit("ctg.pipeline.golden_captures_failed", val);
        }
    }

    pub fn record_test_run(&self, succeeded: bool) {
        if succeeded {
            let val = self.test_runs_succeeded.fetch_add(1, Ordering::Relaxed) + 1;
            self.emit("ctg.pipeline.test_runs_succeeded", val);
        } else {
            let val = self.test_runs_failed.fetch_add(1, Ordering::Relaxed) + 1;
            self.emit("ctg.pipeline.test_runs_failed", val);
        }
    }

    fn emit(&self, name: &str, value: u64) {
        if let Some(backend) = &self.backend {
            backend.record_counter(name, value);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            mappings_processed: self.mappings_processed.load(Ordering::Relaxed),
            mappings_degraded: self.mappings_degraded.load(Ordering::Relaxed),
            mappings_failed: self.mappings_failed.load(Ordering::Relaxed),
            llm_retries: self.llm_retries.load(Ordering::Relaxed),
            golden_captures_succeeded: self.golden_captures_succeeded.load(Ordering::Relaxed),
            golden_captures_failed: self.golden_captures_failed.load(Ordering::Relaxed),
            test_runs_succeeded: self.test_runs_succeeded.load(Ordering::Relaxed),
            test_runs_failed: self.test_runs_failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MetricsSnapshot {
    pub mappings_processed: u64,
    pub mappings_degraded: u64,
    pub mappings_failed: u64,
    pub llm_retries: u64,
    pub golden_captures_succeeded: u64,
    pub golden_captures_failed: u64,
    pub test_runs_succeeded: u64,
    pub test_runs_failed: u64,
}

/// Logging-based metrics backend. Emits metrics as structured log events.
pub struct LoggingMetricsBackend;

impl MetricsBackend for LoggingMetricsBackend {
    fn record_counter(&self, name: &str, value: u64) {
        tracing::info!(metric = name, value = value, kind = "counter", "metric");
    }

    fn record_gauge(&self, name: &str, value: f64) {
        tracing::info!(metric = name, value = value, kind = "gauge", "metric");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics_start_at_zero() {
        let metrics = RunMetrics::new();
        let snap = metrics.snapshot();
        assert_eq!(snap.mappings_processed, 0);
        assert_eq!(snap.mappings_failed, 0);
    }

    #[test]
    fn counters_increment_correctly() {
        let metrics = RunMetrics::new();
        metrics.record_mapping_processed();
        metrics.record_mapping_processed();
        metrics.record_mapping_degraded();
        metrics.record_mapping_failed();
        metrics.record_llm_retry();

        let snap = metrics.snapshot();
        assert_eq!(snap.mappings_processed, 2);
        assert_eq!(snap.mappings_degraded, 1);
        assert_eq!(snap.mappings_failed, 1);
        assert_eq!(snap.llm_retries, 1);
    }

    #[test]
    fn with_logging_backend() {
        let backend = Arc::new(LoggingMetricsBackend);
        let metrics = RunMetrics::with_backend(backend);
        metrics.record_mapping_processed();
        assert_eq!(metrics.snapshot().mappings_processed, 1);
    }

    #[test]
    fn concurrent_increments() {
        let metrics = Arc::new(RunMetrics::new());
        let mut handles = vec![];
        for _ in 0..10 {
            let m = Arc::clone(&metrics);
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    m.record_mapping_processed();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(metrics.snapshot().mappings_processed, 1000);
    }
}

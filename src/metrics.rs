use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing analysis activity.
#[derive(Default)]
pub struct AnalysisMetrics {
    summaries_completed: AtomicU64,
    queries_completed: AtomicU64,
    analyses_failed: AtomicU64,
    pages_processed: AtomicU64,
    chunks_processed: AtomicU64,
    model_calls: AtomicU64,
}

impl AnalysisMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed summarize request.
    pub fn record_summary(&self, pages: u64, model_calls: u64) {
        self.summaries_completed.fetch_add(1, Ordering::Relaxed);
        self.pages_processed.fetch_add(pages, Ordering::Relaxed);
        self.model_calls.fetch_add(model_calls, Ordering::Relaxed);
    }

    /// Record a completed query request and the chunks it mapped over.
    pub fn record_query(&self, pages: u64, chunks: u64, model_calls: u64) {
        self.queries_completed.fetch_add(1, Ordering::Relaxed);
        self.pages_processed.fetch_add(pages, Ordering::Relaxed);
        self.chunks_processed.fetch_add(chunks, Ordering::Relaxed);
        self.model_calls.fetch_add(model_calls, Ordering::Relaxed);
    }

    /// Record a failed request; model calls issued before the failure still count.
    pub fn record_failure(&self, model_calls: u64) {
        self.analyses_failed.fetch_add(1, Ordering::Relaxed);
        self.model_calls.fetch_add(model_calls, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            summaries_completed: self.summaries_completed.load(Ordering::Relaxed),
            queries_completed: self.queries_completed.load(Ordering::Relaxed),
            analyses_failed: self.analyses_failed.load(Ordering::Relaxed),
            pages_processed: self.pages_processed.load(Ordering::Relaxed),
            chunks_processed: self.chunks_processed.load(Ordering::Relaxed),
            model_calls: self.model_calls.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of analysis counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Summarize requests completed since startup.
    pub summaries_completed: u64,
    /// Query requests completed since startup.
    pub queries_completed: u64,
    /// Requests that ended in an error.
    pub analyses_failed: u64,
    /// Pages extracted across completed requests.
    pub pages_processed: u64,
    /// Chunks mapped across completed query requests.
    pub chunks_processed: u64,
    /// Chat-model calls issued, including those of failed requests.
    pub model_calls: u64,
}

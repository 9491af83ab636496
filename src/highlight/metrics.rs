//! Metrics for the semantic highlighting phase.
//!
//! None of these values feed back into results; they exist for logs and
//! dashboards only. In particular the average inference time is a mean of
//! wall-clock durations of tasks that ran concurrently, not a latency.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use log::info;

use crate::highlight::result::HighlightResult;

/// Summary of one completed batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    /// Hits in the batch.
    pub documents: usize,

    /// (hit, field) results produced.
    pub tasks: usize,

    /// Results carrying usable text.
    pub success_count: usize,

    /// Results cut off by the batch deadline.
    pub timeout_count: usize,

    /// Mean task duration over all results.
    pub avg_inference_time: Duration,

    /// Wall-clock time of the batch.
    pub elapsed: Duration,
}

impl BatchSummary {
    /// Summarise `results` for a batch over `documents` hits.
    pub fn from_results(documents: usize, results: &[HighlightResult], elapsed: Duration) -> Self {
        let total_ms: u64 = results.iter().map(|r| r.duration_ms).sum();
        let avg_inference_time = if results.is_empty() {
            Duration::ZERO
        } else {
            Duration::from_millis(total_ms / results.len() as u64)
        };

        BatchSummary {
            documents,
            tasks: results.len(),
            success_count: results.iter().filter(|r| r.is_applicable()).count(),
            timeout_count: results.iter().filter(|r| r.timed_out).count(),
            avg_inference_time,
            elapsed,
        }
    }

    /// Emit the summary at info level.
    pub fn log(&self, batch_id: &str) {
        info!(
            "[semantic-hl] batch {batch_id}: documents={}, tasks={}, avgMLTime={}ms, SUCCESS_COUNT={}, timeouts={}, elapsed={}ms",
            self.documents,
            self.tasks,
            self.avg_inference_time.as_millis(),
            self.success_count,
            self.timeout_count,
            self.elapsed.as_millis()
        );
    }
}

/// Point-in-time view of [`HighlightMetricsCollector`].
#[derive(Debug, Clone)]
pub struct HighlightMetrics {
    /// Batches run to completion (including deadline expiry).
    pub total_batches: u64,

    /// Batches that failed as a whole.
    pub failed_batches: u64,

    /// Documents across all batches.
    pub total_documents: u64,

    /// Tasks across all batches.
    pub total_tasks: u64,

    /// Tasks that produced usable text.
    pub successful_tasks: u64,

    /// Tasks that failed, including timeouts.
    pub failed_tasks: u64,

    /// Tasks cut off by a batch deadline.
    pub timeout_count: u64,

    /// Mean task duration.
    pub avg_task_time: Duration,

    /// Longest batch.
    pub max_batch_time: Duration,

    /// Shortest batch.
    pub min_batch_time: Duration,
}

impl Default for HighlightMetrics {
    fn default() -> Self {
        Self {
            total_batches: 0,
            failed_batches: 0,
            total_documents: 0,
            total_tasks: 0,
            successful_tasks: 0,
            failed_tasks: 0,
            timeout_count: 0,
            avg_task_time: Duration::ZERO,
            max_batch_time: Duration::ZERO,
            min_batch_time: Duration::MAX,
        }
    }
}

/// Process-wide counters, updated without locking.
pub struct HighlightMetricsCollector {
    total_batches: Arc<AtomicU64>,
    failed_batches: Arc<AtomicU64>,
    total_documents: Arc<AtomicU64>,
    total_tasks: Arc<AtomicU64>,
    successful_tasks: Arc<AtomicU64>,
    failed_tasks: Arc<AtomicU64>,
    timeout_count: Arc<AtomicU64>,
    total_task_millis: Arc<AtomicU64>,
    max_batch_nanos: Arc<AtomicU64>,
    min_batch_nanos: Arc<AtomicU64>,

    /// Start time for the collector.
    start_time: Instant,
}

impl HighlightMetricsCollector {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self {
            total_batches: Arc::new(AtomicU64::new(0)),
            failed_batches: Arc::new(AtomicU64::new(0)),
            total_documents: Arc::new(AtomicU64::new(0)),
            total_tasks: Arc::new(AtomicU64::new(0)),
            successful_tasks: Arc::new(AtomicU64::new(0)),
            failed_tasks: Arc::new(AtomicU64::new(0)),
            timeout_count: Arc::new(AtomicU64::new(0)),
            total_task_millis: Arc::new(AtomicU64::new(0)),
            max_batch_nanos: Arc::new(AtomicU64::new(0)),
            min_batch_nanos: Arc::new(AtomicU64::new(u64::MAX)),
            start_time: Instant::now(),
        }
    }

    /// Record a completed batch.
    pub fn record_batch(&self, summary: &BatchSummary, results: &[HighlightResult]) {
        self.total_batches.fetch_add(1, Ordering::Relaxed);
        self.total_documents
            .fetch_add(summary.documents as u64, Ordering::Relaxed);
        self.total_tasks
            .fetch_add(summary.tasks as u64, Ordering::Relaxed);
        self.successful_tasks
            .fetch_add(summary.success_count as u64, Ordering::Relaxed);
        self.failed_tasks.fetch_add(
            (summary.tasks - summary.success_count) as u64,
            Ordering::Relaxed,
        );
        self.timeout_count
            .fetch_add(summary.timeout_count as u64, Ordering::Relaxed);
        self.total_task_millis.fetch_add(
            results.iter().map(|r| r.duration_ms).sum(),
            Ordering::Relaxed,
        );

        let nanos = summary.elapsed.as_nanos() as u64;

        // Update max batch time
        loop {
            let current_max = self.max_batch_nanos.load(Ordering::Relaxed);
            if nanos <= current_max {
                break;
            }
            if self
                .max_batch_nanos
                .compare_exchange_weak(current_max, nanos, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                break;
            }
        }

        // Update min batch time
        loop {
            let current_min = self.min_batch_nanos.load(Ordering::Relaxed);
            if nanos >= current_min {
                break;
            }
            if self
                .min_batch_nanos
                .compare_exchange_weak(current_min, nanos, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                break;
            }
        }
    }

    /// Record a batch that could not run.
    pub fn record_failed_batch(&self) {
        self.failed_batches.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current metrics snapshot.
    pub fn snapshot(&self) -> HighlightMetrics {
        let total_tasks = self.total_tasks.load(Ordering::Relaxed);
        let total_millis = self.total_task_millis.load(Ordering::Relaxed);
        let avg_millis = if total_tasks > 0 {
            total_millis / total_tasks
        } else {
            0
        };

        let min_nanos = self.min_batch_nanos.load(Ordering::Relaxed);
        let min_duration = if min_nanos == u64::MAX {
            Duration::ZERO
        } else {
            Duration::from_nanos(min_nanos)
        };

        HighlightMetrics {
            total_batches: self.total_batches.load(Ordering::Relaxed),
            failed_batches: self.failed_batches.load(Ordering::Relaxed),
            total_documents: self.total_documents.load(Ordering::Relaxed),
            total_tasks,
            successful_tasks: self.successful_tasks.load(Ordering::Relaxed),
            failed_tasks: self.failed_tasks.load(Ordering::Relaxed),
            timeout_count: self.timeout_count.load(Ordering::Relaxed),
            avg_task_time: Duration::from_millis(avg_millis),
            max_batch_time: Duration::from_nanos(self.max_batch_nanos.load(Ordering::Relaxed)),
            min_batch_time: min_duration,
        }
    }

    /// Reset all metrics.
    pub fn reset(&self) {
        self.total_batches.store(0, Ordering::Relaxed);
        self.failed_batches.store(0, Ordering::Relaxed);
        self.total_documents.store(0, Ordering::Relaxed);
        self.total_tasks.store(0, Ordering::Relaxed);
        self.successful_tasks.store(0, Ordering::Relaxed);
        self.failed_tasks.store(0, Ordering::Relaxed);
        self.timeout_count.store(0, Ordering::Relaxed);
        self.total_task_millis.store(0, Ordering::Relaxed);
        self.max_batch_nanos.store(0, Ordering::Relaxed);
        self.min_batch_nanos.store(u64::MAX, Ordering::Relaxed);
    }

    /// Get the uptime of this collector.
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}

impl Default for HighlightMetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper for timing operations.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed time.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return elapsed time.
    pub fn stop(self) -> Duration {
        self.start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results() -> Vec<HighlightResult> {
        vec![
            HighlightResult::success(0, "content", "<em>a</em>", Duration::from_millis(100)),
            HighlightResult::success(1, "content", "<em>b</em>", Duration::from_millis(50)),
            HighlightResult::failure(2, "content", "boom", Duration::from_millis(30)),
            HighlightResult::timeout(3, "content", Duration::from_millis(220)),
        ]
    }

    #[test]
    fn test_batch_summary() {
        let summary = BatchSummary::from_results(4, &results(), Duration::from_millis(230));

        assert_eq!(summary.documents, 4);
        assert_eq!(summary.tasks, 4);
        assert_eq!(summary.success_count, 2);
        assert_eq!(summary.timeout_count, 1);
        assert_eq!(summary.avg_inference_time, Duration::from_millis(100));

        let empty = BatchSummary::from_results(0, &[], Duration::ZERO);
        assert_eq!(empty.avg_inference_time, Duration::ZERO);
    }

    #[test]
    fn test_metrics_collection() {
        let collector = HighlightMetricsCollector::new();
        let results = results();

        collector.record_batch(
            &BatchSummary::from_results(4, &results, Duration::from_millis(230)),
            &results,
        );
        collector.record_batch(
            &BatchSummary::from_results(1, &results[..1], Duration::from_millis(100)),
            &results[..1],
        );
        collector.record_failed_batch();

        let metrics = collector.snapshot();
        assert_eq!(metrics.total_batches, 2);
        assert_eq!(metrics.failed_batches, 1);
        assert_eq!(metrics.total_documents, 5);
        assert_eq!(metrics.total_tasks, 5);
        assert_eq!(metrics.successful_tasks, 3);
        assert_eq!(metrics.failed_tasks, 2);
        assert_eq!(metrics.timeout_count, 1);
        assert_eq!(metrics.avg_task_time, Duration::from_millis(100));
        assert_eq!(metrics.max_batch_time, Duration::from_millis(230));
        assert_eq!(metrics.min_batch_time, Duration::from_millis(100));

        collector.reset();
        let metrics = collector.snapshot();
        assert_eq!(metrics.total_batches, 0);
        assert_eq!(metrics.min_batch_time, Duration::ZERO);
    }

    #[test]
    fn test_timer() {
        let timer = Timer::start();
        std::thread::sleep(Duration::from_millis(10));
        let elapsed = timer.stop();

        assert!(elapsed >= Duration::from_millis(10));
        assert!(elapsed < Duration::from_secs(5));
    }
}

//! Concurrent batch inference over the hits of a response.
//!
//! One task is fanned out per (hit, semantic field) pair onto the shared
//! [`HighlightExecutor`]. Results flow back over a channel into slots indexed
//! by submission order, and the caller blocks on that channel until every
//! slot is filled, the batch deadline expires, or the batch is cancelled.
//! Whatever is still missing at that point becomes an unsuccessful result, so
//! the output always holds exactly one result per pair.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, Sender};
use log::{debug, error, warn};
use uuid::Uuid;

use crate::error::{HighlightError, Result};
use crate::highlight::executor::HighlightExecutor;
use crate::highlight::inference::{InferenceBackend, InferenceRequest};
use crate::highlight::metrics::{BatchSummary, HighlightMetricsCollector, Timer};
use crate::highlight::resolver::SemanticHighlightConfig;
use crate::highlight::result::HighlightResult;
use crate::search::response::SearchHit;

/// How often the barrier re-checks cancellation while waiting.
const WAIT_SLICE: Duration = Duration::from_millis(25);

/// Upstream cancellation signal for a request.
///
/// Clones share the same flag. Cancelling never interrupts an inference call
/// that is already running; it stops new calls from starting and releases the
/// barrier.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel every holder of this token.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether the token has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Fans inference out over hits and waits for the whole batch.
pub struct BatchHighlightScheduler {
    executor: Arc<HighlightExecutor>,
    backend: Arc<dyn InferenceBackend>,
    batch_timeout: Duration,
    metrics: Arc<HighlightMetricsCollector>,
}

impl BatchHighlightScheduler {
    /// Create a scheduler submitting to `executor` and calling `backend`.
    pub fn new(
        executor: Arc<HighlightExecutor>,
        backend: Arc<dyn InferenceBackend>,
        batch_timeout: Duration,
    ) -> Self {
        BatchHighlightScheduler {
            executor,
            backend,
            batch_timeout,
            metrics: Arc::new(HighlightMetricsCollector::new()),
        }
    }

    /// Record into a shared metrics collector.
    pub fn with_metrics(mut self, metrics: Arc<HighlightMetricsCollector>) -> Self {
        self.metrics = metrics;
        self
    }

    /// The executor tasks are submitted to.
    pub fn executor(&self) -> &Arc<HighlightExecutor> {
        &self.executor
    }

    /// The metrics collector.
    pub fn metrics(&self) -> &Arc<HighlightMetricsCollector> {
        &self.metrics
    }

    /// Per-batch deadline.
    pub fn batch_timeout(&self) -> Duration {
        self.batch_timeout
    }

    /// Highlight every `configs` field of every hit.
    pub fn run(
        &self,
        hits: &[Arc<SearchHit>],
        configs: &[SemanticHighlightConfig],
    ) -> Result<Vec<HighlightResult>> {
        self.run_with_cancellation(hits, configs, &CancellationToken::new())
    }

    /// Highlight every `configs` field of every hit, observing `cancel`.
    ///
    /// Returns exactly one result per (hit, config) pair, ordered by hit and
    /// then by config. Per-document failures, deadline expiry and
    /// cancellation all surface as unsuccessful results. The deadline also
    /// bounds waiting for a worker slot, so a saturated pool cannot hold the
    /// caller past it. An `Err` means the batch could not be scheduled at all
    /// (executor shut down, submission rejected by backpressure).
    pub fn run_with_cancellation(
        &self,
        hits: &[Arc<SearchHit>],
        configs: &[SemanticHighlightConfig],
        cancel: &CancellationToken,
    ) -> Result<Vec<HighlightResult>> {
        if hits.is_empty() || configs.is_empty() {
            return Ok(Vec::new());
        }

        let batch_id = Uuid::new_v4().to_string();
        let timer = Timer::start();
        let deadline = Instant::now() + self.batch_timeout;
        let (tx, rx) = crossbeam_channel::unbounded::<(usize, HighlightResult)>();

        let mut slots: Vec<Slot<'_>> = Vec::with_capacity(hits.len() * configs.len());
        let abandoned = Arc::new(AtomicBool::new(false));
        let mut pending = 0usize;
        let mut expired = false;

        for (hit_index, hit) in hits.iter().enumerate() {
            for config in configs {
                let slot = slots.len();
                let context = hit
                    .source_text(&config.field_name)
                    .filter(|text| !text.trim().is_empty());

                let Some(context) = context else {
                    debug!(
                        "[semantic-hl] batch {batch_id}: hit {hit_index} has no text in '{}'",
                        config.field_name
                    );
                    slots.push(Slot {
                        hit_index,
                        config,
                        result: Some(HighlightResult::skipped(
                            hit_index,
                            config.field_name.as_str(),
                            "field text missing or empty",
                        )),
                    });
                    continue;
                };

                slots.push(Slot {
                    hit_index,
                    config,
                    result: None,
                });
                // Pairs left unsubmitted are filled in after the barrier.
                if expired || cancel.is_cancelled() {
                    continue;
                }

                let task = HighlightTask {
                    slot,
                    hit_index,
                    config: config.clone(),
                    context,
                    backend: Arc::clone(&self.backend),
                    cancel: cancel.clone(),
                    abandoned: Arc::clone(&abandoned),
                    tx: tx.clone(),
                };
                match self.executor.submit_until(move || task.run(), deadline) {
                    Ok(()) => pending += 1,
                    Err(HighlightError::Timeout(reason)) => {
                        warn!(
                            "[semantic-hl] batch {batch_id}: deadline reached while waiting for a worker slot: {reason}"
                        );
                        expired = true;
                    }
                    Err(e) => {
                        error!(
                            "[semantic-hl] batch {batch_id}: could not schedule highlight task: {e}"
                        );
                        abandoned.store(true, Ordering::SeqCst);
                        self.metrics.record_failed_batch();
                        return Err(e);
                    }
                }
            }
        }
        drop(tx);

        debug!(
            "[semantic-hl] batch {batch_id}: {pending} task(s) submitted for {} hit(s)",
            hits.len()
        );

        while pending > 0 {
            if cancel.is_cancelled() {
                warn!(
                    "[semantic-hl] batch {batch_id}: cancelled with {pending} task(s) outstanding"
                );
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                expired = true;
                warn!(
                    "[semantic-hl] batch {batch_id}: deadline of {}ms expired with {pending} task(s) outstanding",
                    self.batch_timeout.as_millis()
                );
                break;
            }

            match rx.recv_deadline(deadline.min(now + WAIT_SLICE)) {
                Ok((slot, result)) => {
                    if let Some(entry) = slots.get_mut(slot) {
                        entry.result = Some(result);
                        pending -= 1;
                    }
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    error!(
                        "[semantic-hl] batch {batch_id}: {pending} task(s) ended without reporting"
                    );
                    break;
                }
            }
        }

        // Keep whatever finished before the barrier gave up.
        while let Ok((slot, result)) = rx.try_recv() {
            if let Some(entry) = slots.get_mut(slot) {
                entry.result = Some(result);
            }
        }
        if slots.iter().any(|slot| slot.result.is_none()) {
            abandoned.store(true, Ordering::SeqCst);
        }

        let waited = timer.elapsed();
        let results: Vec<HighlightResult> = slots
            .into_iter()
            .map(|slot| match slot.result {
                Some(result) => result,
                None if expired => {
                    HighlightResult::timeout(slot.hit_index, slot.config.field_name.as_str(), waited)
                }
                None => HighlightResult::failure(
                    slot.hit_index,
                    slot.config.field_name.as_str(),
                    "highlight task abandoned",
                    waited,
                ),
            })
            .collect();

        let summary = BatchSummary::from_results(hits.len(), &results, timer.stop());
        summary.log(&batch_id);
        self.metrics.record_batch(&summary, &results);

        Ok(results)
    }
}

impl std::fmt::Debug for BatchHighlightScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchHighlightScheduler")
            .field("executor", &self.executor)
            .field("batch_timeout", &self.batch_timeout)
            .finish()
    }
}

struct Slot<'a> {
    hit_index: usize,
    config: &'a SemanticHighlightConfig,
    result: Option<HighlightResult>,
}

/// One inference call, owned by a worker thread.
struct HighlightTask {
    slot: usize,
    hit_index: usize,
    config: SemanticHighlightConfig,
    context: String,
    backend: Arc<dyn InferenceBackend>,
    cancel: CancellationToken,
    abandoned: Arc<AtomicBool>,
    tx: Sender<(usize, HighlightResult)>,
}

impl HighlightTask {
    fn run(self) {
        let timer = Timer::start();
        let field = self.config.field_name.as_str();

        let result = if self.cancel.is_cancelled() {
            HighlightResult::failure(
                self.hit_index,
                field,
                "cancelled before inference",
                timer.elapsed(),
            )
        } else if self.abandoned.load(Ordering::SeqCst) {
            debug!(
                "[semantic-hl] hit {}: batch abandoned, skipping inference for '{field}'",
                self.hit_index
            );
            HighlightResult::failure(
                self.hit_index,
                field,
                "batch abandoned before inference",
                timer.elapsed(),
            )
        } else {
            let request = InferenceRequest {
                model_id: &self.config.model_id,
                query_text: &self.config.query_text,
                context: &self.context,
                pre_tag: &self.config.pre_tag,
                post_tag: &self.config.post_tag,
            };
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.backend.infer(&request)));

            match outcome {
                Ok(Ok(text)) if !text.is_empty() => {
                    HighlightResult::success(self.hit_index, field, text, timer.elapsed())
                }
                Ok(Ok(_)) => {
                    debug!(
                        "[semantic-hl] hit {}: model returned no highlight for '{field}'",
                        self.hit_index
                    );
                    HighlightResult::failure(
                        self.hit_index,
                        field,
                        "model returned no highlighted text",
                        timer.elapsed(),
                    )
                }
                Ok(Err(e)) => {
                    error!(
                        "[semantic-hl] hit {}: inference failed for '{field}': {e:#}",
                        self.hit_index
                    );
                    HighlightResult::failure(self.hit_index, field, format!("{e:#}"), timer.elapsed())
                }
                Err(_) => {
                    error!(
                        "[semantic-hl] hit {}: inference panicked for '{field}'",
                        self.hit_index
                    );
                    HighlightResult::failure(
                        self.hit_index,
                        field,
                        "inference panicked",
                        timer.elapsed(),
                    )
                }
            }
        };

        // The receiver is gone once the batch has been abandoned.
        let _ = self.tx.send((self.slot, result));
    }
}

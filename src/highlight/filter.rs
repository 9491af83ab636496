//! Interception of search requests that ask for semantic highlighting.
//!
//! ```text
//! request ──► resolve configs ─┐
//!        └──► split ──► host search ──► batch inference ──► merge ──► response
//! ```
//!
//! Requests without a semantic directive (or every request, when the filter
//! is disabled) go straight to the host engine.

use std::sync::Arc;
use std::time::Instant;

use log::{debug, error};

use crate::error::{HighlightError, Result};
use crate::highlight::executor::HighlightExecutor;
use crate::highlight::extractor::QueryTextExtractorRegistry;
use crate::highlight::inference::InferenceBackend;
use crate::highlight::merger::ResponseMerger;
use crate::highlight::metrics::HighlightMetrics;
use crate::highlight::resolver::HighlightConfigResolver;
use crate::highlight::scheduler::{BatchHighlightScheduler, CancellationToken};
use crate::highlight::settings::HighlightSettings;
use crate::highlight::splitter::{RequestSplitter, has_semantic_highlight};
use crate::search::executor::SearchExecutor;
use crate::search::request::SearchRequest;
use crate::search::response::SearchResponse;

/// Wraps a search executor with the semantic highlighting phase.
#[derive(Debug)]
pub struct SemanticHighlightFilter {
    settings: HighlightSettings,
    resolver: HighlightConfigResolver,
    splitter: RequestSplitter,
    scheduler: BatchHighlightScheduler,
    merger: ResponseMerger,
}

impl SemanticHighlightFilter {
    /// Create a filter with its own worker pool sized from `settings`.
    pub fn new(
        settings: HighlightSettings,
        registry: Arc<QueryTextExtractorRegistry>,
        backend: Arc<dyn InferenceBackend>,
    ) -> Result<Self> {
        let executor = Arc::new(HighlightExecutor::new(&settings)?);
        Self::with_executor(settings, registry, backend, executor)
    }

    /// Create a filter submitting to an existing, shared worker pool.
    pub fn with_executor(
        settings: HighlightSettings,
        registry: Arc<QueryTextExtractorRegistry>,
        backend: Arc<dyn InferenceBackend>,
        executor: Arc<HighlightExecutor>,
    ) -> Result<Self> {
        settings.validate()?;
        let resolver = HighlightConfigResolver::from_settings(registry, &settings);
        let scheduler = BatchHighlightScheduler::new(executor, backend, settings.batch_timeout());

        Ok(SemanticHighlightFilter {
            settings,
            resolver,
            splitter: RequestSplitter::new(),
            scheduler,
            merger: ResponseMerger::new(),
        })
    }

    /// The filter's settings.
    pub fn settings(&self) -> &HighlightSettings {
        &self.settings
    }

    /// The worker pool inference runs on.
    pub fn executor(&self) -> &Arc<HighlightExecutor> {
        self.scheduler.executor()
    }

    /// Snapshot of the highlighting metrics.
    pub fn metrics(&self) -> HighlightMetrics {
        self.scheduler.metrics().snapshot()
    }

    /// Run `request` through `search`, adding semantic highlights.
    pub fn apply(
        &self,
        request: &SearchRequest,
        search: &dyn SearchExecutor,
    ) -> Result<SearchResponse> {
        self.apply_with_cancellation(request, search, &CancellationToken::new())
    }

    /// Run `request` through `search`, adding semantic highlights, until
    /// `cancel` fires.
    ///
    /// Errors from `search` are returned unchanged and the highlighting phase
    /// does not run. A batch that cannot be scheduled fails the whole request
    /// with [`HighlightError::Batch`]; per-document inference failures only
    /// leave that hit without a semantic highlight.
    pub fn apply_with_cancellation(
        &self,
        request: &SearchRequest,
        search: &dyn SearchExecutor,
        cancel: &CancellationToken,
    ) -> Result<SearchResponse> {
        if !self.settings.enabled || !has_semantic_highlight(request) {
            return search.execute(request);
        }

        let start = Instant::now();
        let configs = self.resolver.resolve(request);
        let plain = self.splitter.split(request);
        let base = search.execute(&plain)?;

        let Some(configs) = configs else {
            debug!("[semantic-hl] semantic directive without usable config, returning plain response");
            return Ok(base);
        };
        if base.hits.is_empty() {
            return Ok(base);
        }
        if cancel.is_cancelled() {
            return Err(HighlightError::cancelled(
                "search request cancelled before semantic highlighting",
            ));
        }

        let results = self
            .scheduler
            .run_with_cancellation(&base.hits.hits, &configs, cancel)
            .map_err(|e| {
                error!("[semantic-hl] semantic highlighting batch failed: {e}");
                HighlightError::batch("could not run the highlight batch", e)
            })?;

        if cancel.is_cancelled() {
            return Err(HighlightError::cancelled(
                "search request cancelled during semantic highlighting",
            ));
        }

        let elapsed_ms = start.elapsed().as_millis() as u64;
        Ok(self.merger.merge(&base, &results, elapsed_ms))
    }
}

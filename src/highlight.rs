//! Concurrent semantic highlighting.
//!
//! The pipeline intercepts a search request, removes its semantic highlight
//! directives, runs the plain search, fans one inference task out per
//! (hit, field) pair and splices the results back into the response.

pub mod executor;
pub mod extractor;
pub mod filter;
pub mod inference;
pub mod merger;
pub mod metrics;
pub mod resolver;
pub mod result;
pub mod scheduler;
pub mod settings;
pub mod splitter;

pub use self::executor::HighlightExecutor;
pub use self::extractor::{QueryTextExtractor, QueryTextExtractorRegistry};
pub use self::filter::SemanticHighlightFilter;
pub use self::inference::{
    InferenceBackend, InferenceRequest, SentenceLabelBackend, SentenceLabelModel,
};
pub use self::merger::ResponseMerger;
pub use self::metrics::{BatchSummary, HighlightMetrics, HighlightMetricsCollector};
pub use self::resolver::{HighlightConfigResolver, SemanticHighlightConfig};
pub use self::result::HighlightResult;
pub use self::scheduler::{BatchHighlightScheduler, CancellationToken};
pub use self::settings::{BackpressurePolicy, HighlightSettings};
pub use self::splitter::{RequestSplitter, has_semantic_highlight};

//! # neural-highlight
//!
//! Concurrent ML-driven semantic highlighting for search responses.
//!
//! ## Features
//!
//! - Transparent interception of requests carrying semantic highlight directives
//! - One inference task per hit and field on a shared, resizable worker pool
//! - Per-document failure isolation with a bounded batch deadline
//! - Order-preserving merge that leaves untouched hits shared with the plain response
//! - Pluggable query-text extraction for vector and compound query trees

pub mod cli;
pub mod error;
pub mod highlight;
pub mod query;
pub mod search;

pub mod prelude {
    pub use crate::error::{HighlightError, Result};
    pub use crate::highlight::{
        CancellationToken, HighlightResult, HighlightSettings, InferenceBackend,
        InferenceRequest, QueryTextExtractorRegistry, SemanticHighlightFilter,
    };
    pub use crate::query::{Query, QueryParser};
    pub use crate::search::{SearchExecutor, SearchHit, SearchRequest, SearchResponse};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Error types for the neural-highlight library.
//!
//! All fallible operations return [`HighlightError`]. Per-document inference
//! failures never surface here: the scheduler turns them into unsuccessful
//! [`HighlightResult`](crate::highlight::HighlightResult)s. What does surface
//! is everything at or above the batch level, plus failures of the wrapped
//! search itself.
//!
//! # Examples
//!
//! ```
//! use neural_highlight::error::{HighlightError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(HighlightError::config("parallelism must be positive"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for neural-highlight operations.
#[derive(Error, Debug)]
pub enum HighlightError {
    /// I/O errors (settings files, CLI input).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Query-related errors (DSL parsing, unsupported clauses).
    #[error("Query error: {0}")]
    Query(String),

    /// Invalid settings or highlight directives.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Inference backend errors.
    #[error("Inference error: {0}")]
    Inference(String),

    /// Deadline expiry.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Worker pool saturated under the reject policy.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Operation cancelled upstream.
    #[error("Operation cancelled: {0}")]
    OperationCancelled(String),

    /// Invalid operation (e.g. submitting to a shut down executor).
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Failure reported by the wrapped search executor.
    #[error("Search error: {0}")]
    Search(String),

    /// The highlighting phase as a whole could not run.
    #[error("Semantic highlighting enhancement failed: {message}")]
    Batch {
        message: String,
        #[source]
        source: Box<HighlightError>,
    },

    /// Generic anyhow error.
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with HighlightError.
pub type Result<T> = std::result::Result<T, HighlightError>;

impl HighlightError {
    /// Create a new query error.
    pub fn query<S: Into<String>>(msg: S) -> Self {
        HighlightError::Query(msg.into())
    }

    /// Create a new configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        HighlightError::Config(msg.into())
    }

    /// Create a new inference error.
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        HighlightError::Inference(msg.into())
    }

    /// Create a new timeout error.
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        HighlightError::Timeout(msg.into())
    }

    /// Create a new resource exhausted error.
    pub fn resource_exhausted<S: Into<String>>(msg: S) -> Self {
        HighlightError::ResourceExhausted(msg.into())
    }

    /// Create a new cancelled error.
    pub fn cancelled<S: Into<String>>(msg: S) -> Self {
        HighlightError::OperationCancelled(msg.into())
    }

    /// Create a new invalid operation error.
    pub fn invalid_operation<S: Into<String>>(msg: S) -> Self {
        HighlightError::InvalidOperation(msg.into())
    }

    /// Create a new search error.
    pub fn search<S: Into<String>>(msg: S) -> Self {
        HighlightError::Search(msg.into())
    }

    /// Wrap a cause as a batch-level failure.
    pub fn batch<S: Into<String>>(msg: S, cause: HighlightError) -> Self {
        HighlightError::Batch {
            message: msg.into(),
            source: Box::new(cause),
        }
    }

    /// Whether this error is a batch-level failure.
    pub fn is_batch(&self) -> bool {
        matches!(self, HighlightError::Batch { .. })
    }
}

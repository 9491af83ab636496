//! Outcome of highlighting one field of one hit.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Result of one (hit, field) highlight task.
///
/// Correlated with its hit purely by position: `hit_index` is the hit's index
/// in the plain response that was handed to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightResult {
    /// Position of the hit in the response's hit array.
    pub hit_index: usize,

    /// Highlighted field.
    pub field_name: String,

    /// Tagged text; empty unless `success`.
    #[serde(default)]
    pub text: String,

    /// Whether inference produced usable text.
    pub success: bool,

    /// Wall-clock duration of the task in milliseconds.
    #[serde(default)]
    pub duration_ms: u64,

    /// Whether the task was still pending when the batch deadline expired.
    #[serde(default)]
    pub timed_out: bool,

    /// Failure description, for logs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HighlightResult {
    /// Create a successful result.
    pub fn success<F: Into<String>, T: Into<String>>(
        hit_index: usize,
        field_name: F,
        text: T,
        duration: Duration,
    ) -> Self {
        HighlightResult {
            hit_index,
            field_name: field_name.into(),
            text: text.into(),
            success: true,
            duration_ms: duration.as_millis() as u64,
            timed_out: false,
            error: None,
        }
    }

    /// Create a failed result.
    pub fn failure<F: Into<String>, E: Into<String>>(
        hit_index: usize,
        field_name: F,
        error: E,
        duration: Duration,
    ) -> Self {
        HighlightResult {
            hit_index,
            field_name: field_name.into(),
            text: String::new(),
            success: false,
            duration_ms: duration.as_millis() as u64,
            timed_out: false,
            error: Some(error.into()),
        }
    }

    /// Create a zero-duration failure for a field that was never scheduled.
    pub fn skipped<F: Into<String>, E: Into<String>>(hit_index: usize, field_name: F, reason: E) -> Self {
        Self::failure(hit_index, field_name, reason, Duration::ZERO)
    }

    /// Create a result for a task the batch deadline left behind.
    pub fn timeout<F: Into<String>>(hit_index: usize, field_name: F, waited: Duration) -> Self {
        HighlightResult {
            timed_out: true,
            ..Self::failure(hit_index, field_name, "highlight task timed out", waited)
        }
    }

    /// Whether the result carries text the merger should apply.
    pub fn is_applicable(&self) -> bool {
        self.success && !self.text.is_empty()
    }
}

//! Settings for the semantic highlighting phase.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HighlightError, Result};

/// Default pending-task capacity beyond the running workers.
pub const DEFAULT_QUEUE_SIZE: usize = 1000;

/// Default per-batch deadline in milliseconds.
pub const DEFAULT_BATCH_TIMEOUT_MS: u64 = 30_000;

/// Default pre tag.
pub const DEFAULT_PRE_TAG: &str = "<em>";

/// Default post tag.
pub const DEFAULT_POST_TAG: &str = "</em>";

/// What a submitter experiences when the worker pool is saturated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackpressurePolicy {
    /// Wait until a slot frees up.
    #[default]
    Block,

    /// Fail the submission with a resource-exhausted error.
    Reject,
}

/// Configuration for semantic highlighting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightSettings {
    /// Master switch. When false every request passes through untouched.
    pub enabled: bool,

    /// Worker count of the highlight pool.
    /// If None, uses the number of CPU cores.
    pub parallelism: Option<usize>,

    /// Pending-task capacity beyond the running workers.
    pub queue_size: usize,

    /// Saturation policy.
    pub backpressure: BackpressurePolicy,

    /// Per-batch deadline of the barrier, in milliseconds.
    pub batch_timeout_ms: u64,

    /// Pre tag used when no directive supplies one.
    pub default_pre_tag: String,

    /// Post tag used when no directive supplies one.
    pub default_post_tag: String,
}

impl Default for HighlightSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            parallelism: None,
            queue_size: DEFAULT_QUEUE_SIZE,
            backpressure: BackpressurePolicy::Block,
            batch_timeout_ms: DEFAULT_BATCH_TIMEOUT_MS,
            default_pre_tag: DEFAULT_PRE_TAG.to_string(),
            default_post_tag: DEFAULT_POST_TAG.to_string(),
        }
    }
}

impl HighlightSettings {
    /// Load and validate settings from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Parse and validate settings from a JSON string.
    pub fn from_json_str(input: &str) -> Result<Self> {
        let settings: HighlightSettings = serde_json::from_str(input)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check the settings for values the executor cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.parallelism == Some(0) {
            return Err(HighlightError::config("parallelism must be positive"));
        }
        if self.queue_size == 0 {
            return Err(HighlightError::config("queue_size must be positive"));
        }
        if self.batch_timeout_ms == 0 {
            return Err(HighlightError::config("batch_timeout_ms must be positive"));
        }
        Ok(())
    }

    /// Worker count after applying the CPU-count default.
    pub fn effective_parallelism(&self) -> usize {
        self.parallelism.unwrap_or_else(num_cpus::get)
    }

    /// Per-batch deadline.
    pub fn batch_timeout(&self) -> Duration {
        Duration::from_millis(self.batch_timeout_ms)
    }

    /// Set the master switch.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the worker count.
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = Some(parallelism);
        self
    }

    /// Set the pending-task capacity.
    pub fn with_queue_size(mut self, queue_size: usize) -> Self {
        self.queue_size = queue_size;
        self
    }

    /// Set the saturation policy.
    pub fn with_backpressure(mut self, backpressure: BackpressurePolicy) -> Self {
        self.backpressure = backpressure;
        self
    }

    /// Set the per-batch deadline.
    pub fn with_batch_timeout(mut self, timeout: Duration) -> Self {
        self.batch_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the fallback tags.
    pub fn with_default_tags<P: Into<String>, S: Into<String>>(mut self, pre: P, post: S) -> Self {
        self.default_pre_tag = pre.into();
        self.default_post_tag = post.into();
        self
    }
}

//! Boundary to the model that produces highlighted text.
//!
//! The scheduler calls [`InferenceBackend::infer`] once per (hit, field) and
//! expects already-tagged text back. Backends are free to fail with any error
//! type; failures stay local to the document they were raised for.

use std::sync::LazyLock;

use anyhow::{Context, bail};
use regex::Regex;

/// Arguments of a single inference call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InferenceRequest<'a> {
    pub model_id: &'a str,
    pub query_text: &'a str,
    /// The field text to highlight.
    pub context: &'a str,
    pub pre_tag: &'a str,
    pub post_tag: &'a str,
}

/// A model that turns `(query, context)` into tagged context text.
pub trait InferenceBackend: Send + Sync {
    /// Highlight `request.context` for `request.query_text`.
    fn infer(&self, request: &InferenceRequest<'_>) -> anyhow::Result<String>;
}

impl<F> InferenceBackend for F
where
    F: Fn(&InferenceRequest<'_>) -> anyhow::Result<String> + Send + Sync,
{
    fn infer(&self, request: &InferenceRequest<'_>) -> anyhow::Result<String> {
        self(request)
    }
}

/// A question-answering style model that labels each sentence of a context
/// as relevant (`1`) or not (`0`).
pub trait SentenceLabelModel: Send + Sync {
    /// One label per entry of `sentences`, in order.
    fn label_sentences(
        &self,
        model_id: &str,
        query_text: &str,
        sentences: &[&str],
    ) -> anyhow::Result<Vec<i64>>;
}

static SENTENCE_BOUNDARY: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"([.!?]+)\s+").ok());

/// Split `text` into sentences at runs of `.`, `!` or `?` followed by
/// whitespace. Terminal punctuation stays with its sentence; the whitespace
/// between sentences is dropped.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    let Some(boundary_pattern) = SENTENCE_BOUNDARY.as_ref() else {
        return vec![text];
    };

    let mut sentences = Vec::new();
    let mut start = 0;
    for captures in boundary_pattern.captures_iter(text) {
        let (Some(boundary), Some(punctuation)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        sentences.push(&text[start..punctuation.end()]);
        start = boundary.end();
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences
}

/// Adapts a [`SentenceLabelModel`] to the tagged-text contract.
///
/// Sentences labelled `1` are wrapped in the request's tags and all sentences
/// are joined with single spaces. A context with no labelled sentence yields
/// an empty string.
#[derive(Debug)]
pub struct SentenceLabelBackend<M> {
    model: M,
}

impl<M: SentenceLabelModel> SentenceLabelBackend<M> {
    /// Wrap `model`.
    pub fn new(model: M) -> Self {
        SentenceLabelBackend { model }
    }

    /// The wrapped model.
    pub fn model(&self) -> &M {
        &self.model
    }
}

impl<M: SentenceLabelModel> InferenceBackend for SentenceLabelBackend<M> {
    fn infer(&self, request: &InferenceRequest<'_>) -> anyhow::Result<String> {
        let sentences = split_sentences(request.context);
        if sentences.is_empty() {
            bail!("context has no sentences");
        }

        let labels = self
            .model
            .label_sentences(request.model_id, request.query_text, &sentences)
            .with_context(|| format!("model {} failed to label sentences", request.model_id))?;
        if labels.len() != sentences.len() {
            bail!(
                "malformed model output: {} labels for {} sentences",
                labels.len(),
                sentences.len()
            );
        }

        let mut any_relevant = false;
        let mut parts = Vec::with_capacity(sentences.len());
        for (sentence, label) in sentences.iter().zip(&labels) {
            match label {
                0 => parts.push((*sentence).to_string()),
                1 => {
                    any_relevant = true;
                    parts.push(format!("{}{}{}", request.pre_tag, sentence, request.post_tag));
                }
                other => bail!("malformed model output: label {other} is not 0 or 1"),
            }
        }

        if !any_relevant {
            return Ok(String::new());
        }
        Ok(parts.join(" "))
    }
}

//! Derivation of the plain request the host engine actually runs.

use log::debug;

use crate::search::highlight::HighlightSpec;
use crate::search::request::SearchRequest;

/// Strips semantic directives out of a request.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestSplitter;

impl RequestSplitter {
    /// Create a new splitter.
    pub fn new() -> Self {
        RequestSplitter
    }

    /// Build the plain request for `request`.
    ///
    /// Every retrieval property is copied verbatim and the query tree is
    /// shared, not rebuilt. The highlight block keeps only lexical
    /// directives and is dropped altogether when none remain. `request` itself
    /// is never modified.
    pub fn split(&self, request: &SearchRequest) -> SearchRequest {
        let mut plain = request.clone();

        if let Some(source) = plain.source.as_mut() {
            source.highlight = source.highlight.take().and_then(|spec| lexical_only(&spec));
        }

        debug!(
            "[semantic-hl] split request on {:?}: highlight block {}",
            plain.indices,
            if plain.highlight().is_some() {
                "kept with lexical fields"
            } else {
                "removed"
            }
        );
        plain
    }
}

fn lexical_only(spec: &HighlightSpec) -> Option<HighlightSpec> {
    let fields: Vec<_> = spec.lexical_fields().cloned().collect();
    if fields.is_empty() {
        return None;
    }

    Some(HighlightSpec {
        fields,
        ..spec.clone()
    })
}

/// Whether `request` carries at least one semantic highlight directive.
pub fn has_semantic_highlight(request: &SearchRequest) -> bool {
    request
        .highlight()
        .is_some_and(HighlightSpec::has_semantic_fields)
}

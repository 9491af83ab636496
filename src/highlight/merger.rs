//! Splicing highlight results back into a response.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, warn};

use crate::highlight::result::HighlightResult;
use crate::search::response::{HighlightField, SearchHit, SearchHits, SearchResponse};

/// Builds the client-visible response from the plain one.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseMerger;

impl ResponseMerger {
    /// Create a new merger.
    pub fn new() -> Self {
        ResponseMerger
    }

    /// Apply `results` to `base`.
    ///
    /// Results are matched to hits by `hit_index` only; the hit array must not
    /// have been reordered since the batch was scheduled. A hit receives a
    /// copy with its highlight map updated for every successful, non-empty
    /// result; hits without one are shared with `base` as-is. Every other part
    /// of `base` is carried over except `took`, which becomes `elapsed_ms`.
    pub fn merge(
        &self,
        base: &SearchResponse,
        results: &[HighlightResult],
        elapsed_ms: u64,
    ) -> SearchResponse {
        let hit_count = base.hits.hits.len();
        let mut by_hit: BTreeMap<usize, Vec<&HighlightResult>> = BTreeMap::new();
        for result in results.iter().filter(|r| r.is_applicable()) {
            if result.hit_index >= hit_count {
                warn!(
                    "[semantic-hl] dropping highlight for '{}': hit index {} out of range ({} hits)",
                    result.field_name, result.hit_index, hit_count
                );
                continue;
            }
            by_hit.entry(result.hit_index).or_default().push(result);
        }

        let hits = base
            .hits
            .hits
            .iter()
            .enumerate()
            .map(|(index, hit)| match by_hit.get(&index) {
                Some(applied) => Arc::new(with_highlights(hit, applied)),
                None => Arc::clone(hit),
            })
            .collect();

        debug!(
            "[semantic-hl] merged highlights into {} of {} hit(s), took={}ms",
            by_hit.len(),
            hit_count,
            elapsed_ms
        );

        SearchResponse {
            took: elapsed_ms,
            hits: SearchHits {
                total: base.hits.total,
                max_score: base.hits.max_score,
                hits,
            },
            ..base.clone()
        }
    }
}

fn with_highlights(hit: &SearchHit, results: &[&HighlightResult]) -> SearchHit {
    let mut updated = hit.clone();
    for result in results {
        updated.highlight_fields.insert(
            result.field_name.clone(),
            HighlightField::single(result.text.as_str()),
        );
    }
    updated
}

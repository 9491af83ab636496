//! Search response model.
//!
//! Hits are held behind [`Arc`] so that a merged response can share every hit
//! it did not change with the response it was derived from.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Highlight fragments for one field of one hit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HighlightField {
    pub fragments: Vec<String>,
}

impl HighlightField {
    /// A field highlight made of a single fragment.
    pub fn single<S: Into<String>>(fragment: S) -> Self {
        HighlightField {
            fragments: vec![fragment.into()],
        }
    }

    /// Create a field highlight from fragments.
    pub fn new(fragments: Vec<String>) -> Self {
        HighlightField { fragments }
    }
}

/// A single search hit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(rename = "_index", default)]
    pub index: String,

    #[serde(rename = "_id", default)]
    pub id: String,

    #[serde(rename = "_score", default)]
    pub score: Option<f32>,

    /// Engine-internal document number.
    #[serde(skip)]
    pub doc_id: u64,

    #[serde(rename = "_version", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,

    #[serde(rename = "_seq_no", default, skip_serializing_if = "Option::is_none")]
    pub seq_no: Option<i64>,

    #[serde(rename = "_primary_term", default, skip_serializing_if = "Option::is_none")]
    pub primary_term: Option<i64>,

    #[serde(rename = "_source", default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Map<String, Value>>,

    /// Stored/doc-value fields.
    #[serde(rename = "fields", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub document_fields: BTreeMap<String, Vec<Value>>,

    /// Metadata fields (`_routing`, `_ignored`, ...).
    #[serde(flatten)]
    pub meta_fields: BTreeMap<String, Value>,

    #[serde(rename = "highlight", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub highlight_fields: BTreeMap<String, HighlightField>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched_queries: Vec<String>,

    #[serde(rename = "_explanation", default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<Value>,

    #[serde(rename = "_shard", default, skip_serializing_if = "Option::is_none")]
    pub shard: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inner_hits: BTreeMap<String, SearchHits>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<Value>,
}

impl SearchHit {
    /// Create a hit with an id and score.
    pub fn new<I: Into<String>, D: Into<String>>(index: I, id: D, score: f32) -> Self {
        SearchHit {
            index: index.into(),
            id: id.into(),
            score: Some(score),
            ..Default::default()
        }
    }

    /// Set the engine-internal document number.
    pub fn with_doc_id(mut self, doc_id: u64) -> Self {
        self.doc_id = doc_id;
        self
    }

    /// Set the source document. Non-object values are ignored.
    pub fn with_source(mut self, source: Value) -> Self {
        if let Value::Object(map) = source {
            self.source = Some(map);
        }
        self
    }

    /// Set a highlight field.
    pub fn with_highlight<S: Into<String>>(mut self, field: S, highlight: HighlightField) -> Self {
        self.highlight_fields.insert(field.into(), highlight);
        self
    }

    /// Textual value of a source field.
    ///
    /// `path` is looked up as a literal key first, then as a dotted path into
    /// nested objects. Strings are returned as-is; arrays of strings are
    /// joined with a single space. Anything else yields `None`.
    pub fn source_text(&self, path: &str) -> Option<String> {
        let source = self.source.as_ref()?;
        let value = match source.get(path) {
            Some(value) => value,
            None => lookup_path(source, path)?,
        };

        match value {
            Value::String(text) => Some(text.clone()),
            Value::Array(items) => {
                let parts: Option<Vec<&str>> = items.iter().map(Value::as_str).collect();
                let parts = parts?;
                if parts.is_empty() {
                    None
                } else {
                    Some(parts.join(" "))
                }
            }
            _ => None,
        }
    }
}

fn lookup_path<'a>(source: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = source.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Total hit count, possibly a lower bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalHits {
    pub value: u64,
    pub relation: TotalHitsRelation,
}

impl TotalHits {
    /// An exact hit count.
    pub fn exact(value: u64) -> Self {
        TotalHits {
            value,
            relation: TotalHitsRelation::Eq,
        }
    }
}

/// Whether [`TotalHits::value`] is exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TotalHitsRelation {
    Eq,
    Gte,
}

/// The hits section of a response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchHits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<TotalHits>,

    #[serde(default)]
    pub max_score: Option<f32>,

    #[serde(default)]
    pub hits: Vec<Arc<SearchHit>>,
}

impl SearchHits {
    /// Wrap hits with an exact total.
    pub fn new(hits: Vec<SearchHit>) -> Self {
        let max_score = hits
            .iter()
            .filter_map(|hit| hit.score)
            .fold(None, |max: Option<f32>, score| {
                Some(max.map_or(score, |m| m.max(score)))
            });
        SearchHits {
            total: Some(TotalHits::exact(hits.len() as u64)),
            max_score,
            hits: hits.into_iter().map(Arc::new).collect(),
        }
    }

    /// Number of hits in this page.
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Whether this page is empty.
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// Failure report for a single shard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShardFailure {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    #[serde(default)]
    pub reason: Value,
}

/// Shard accounting for a response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShardStats {
    pub total: u32,
    pub successful: u32,
    #[serde(default)]
    pub skipped: u32,
    #[serde(default)]
    pub failed: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ShardFailure>,
}

impl ShardStats {
    /// Stats for `total` shards that all succeeded.
    pub fn all_successful(total: u32) -> Self {
        ShardStats {
            total,
            successful: total,
            ..Default::default()
        }
    }
}

/// Cross-cluster accounting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Clusters {
    pub total: u32,
    pub successful: u32,
    pub skipped: u32,
}

/// A complete search response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(rename = "_scroll_id", default, skip_serializing_if = "Option::is_none")]
    pub scroll_id: Option<String>,

    /// Wall-clock time in milliseconds.
    pub took: u64,

    #[serde(default)]
    pub timed_out: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminated_early: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_reduce_phases: Option<u32>,

    #[serde(rename = "_shards", default)]
    pub shards: ShardStats,

    #[serde(rename = "_clusters", default, skip_serializing_if = "Option::is_none")]
    pub clusters: Option<Clusters>,

    #[serde(default)]
    pub hits: SearchHits,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregations: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggest: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Value>,
}

impl SearchResponse {
    /// A single-shard response wrapping `hits`.
    pub fn with_hits(hits: Vec<SearchHit>, took: u64) -> Self {
        SearchResponse {
            took,
            shards: ShardStats::all_successful(1),
            hits: SearchHits::new(hits),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_source_text_lookups() {
        let hit = SearchHit::new("docs", "1", 1.0).with_source(json!({
            "content": "The brain has regions.",
            "tags": ["neuro", "anatomy"],
            "meta": { "summary": "Nested text" },
            "meta.flat": "Literal dotted key",
            "count": 3,
            "mixed": ["a", 1]
        }));

        assert_eq!(hit.source_text("content").as_deref(), Some("The brain has regions."));
        assert_eq!(hit.source_text("tags").as_deref(), Some("neuro anatomy"));
        assert_eq!(hit.source_text("meta.summary").as_deref(), Some("Nested text"));
        assert_eq!(hit.source_text("meta.flat").as_deref(), Some("Literal dotted key"));
        assert_eq!(hit.source_text("count"), None);
        assert_eq!(hit.source_text("mixed"), None);
        assert_eq!(hit.source_text("missing"), None);
        assert_eq!(SearchHit::new("docs", "2", 1.0).source_text("content"), None);
    }

    #[test]
    fn test_response_json_shape() {
        let response = SearchResponse::with_hits(
            vec![
                SearchHit::new("docs", "1", 2.5)
                    .with_source(json!({ "content": "x" }))
                    .with_highlight("title", HighlightField::single("<em>x</em>")),
            ],
            7,
        );

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["took"], json!(7));
        assert_eq!(value["_shards"]["successful"], json!(1));
        assert_eq!(value["hits"]["total"], json!({ "value": 1, "relation": "eq" }));
        assert_eq!(value["hits"]["max_score"], json!(2.5));
        assert_eq!(value["hits"]["hits"][0]["_id"], json!("1"));
        assert_eq!(
            value["hits"]["hits"][0]["highlight"]["title"],
            json!(["<em>x</em>"])
        );

        let parsed: SearchResponse = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, response);
    }

    #[test]
    fn test_meta_fields_are_flattened() {
        let hit: SearchHit = serde_json::from_value(json!({
            "_index": "docs",
            "_id": "9",
            "_score": null,
            "_routing": "user-1"
        }))
        .unwrap();

        assert_eq!(hit.meta_fields.get("_routing"), Some(&json!("user-1")));
        assert_eq!(hit.score, None);
    }
}

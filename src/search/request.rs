//! Search request model.
//!
//! Only `source.query` and `source.highlight` are interpreted by this crate;
//! everything else is retrieval plumbing that is carried verbatim to the host
//! engine.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::query::{Query, QueryParser};
use crate::search::highlight::HighlightSpec;

/// How the host engine distributes scoring across shards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    /// Score with shard-local statistics.
    #[default]
    QueryThenFetch,
    /// Gather distributed term statistics before scoring.
    DfsQueryThenFetch,
}

/// Body of a search request.
#[derive(Debug, Clone)]
pub struct SearchSource {
    /// Query tree. Shared, never rewritten by this crate.
    pub query: Option<Arc<dyn Query>>,
    pub post_filter: Option<Value>,
    pub from: Option<usize>,
    pub size: Option<usize>,
    /// Search timeout in the host's time-value syntax (`"500ms"`, `"2s"`).
    pub timeout: Option<String>,
    pub min_score: Option<f32>,
    pub track_scores: bool,
    pub track_total_hits: Option<Value>,
    pub terminate_after: Option<u64>,
    pub sort: Vec<Value>,
    pub search_after: Vec<Value>,
    pub collapse: Option<Value>,
    pub suggest: Option<Value>,
    pub aggregations: Option<Value>,
    pub explain: Option<bool>,
    pub profile: bool,
    /// Source filtering (`_source`): boolean, pattern(s) or includes/excludes object.
    pub fetch_source: Option<Value>,
    pub version: Option<bool>,
    pub seq_no_primary_term: Option<bool>,
    pub highlight: Option<HighlightSpec>,
}

impl Default for SearchSource {
    fn default() -> Self {
        SearchSource {
            query: None,
            post_filter: None,
            from: None,
            size: None,
            timeout: None,
            min_score: None,
            track_scores: false,
            track_total_hits: None,
            terminate_after: None,
            sort: Vec::new(),
            search_after: Vec::new(),
            collapse: None,
            suggest: None,
            aggregations: None,
            explain: None,
            profile: false,
            fetch_source: None,
            version: None,
            seq_no_primary_term: None,
            highlight: None,
        }
    }
}

impl SearchSource {
    /// Create an empty search body.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the query tree.
    pub fn with_query(mut self, query: Box<dyn Query>) -> Self {
        self.query = Some(Arc::from(query));
        self
    }

    /// Set the pagination window.
    pub fn with_page(mut self, from: usize, size: usize) -> Self {
        self.from = Some(from);
        self.size = Some(size);
        self
    }

    /// Set the highlight specification.
    pub fn with_highlight(mut self, highlight: HighlightSpec) -> Self {
        self.highlight = Some(highlight);
        self
    }

    /// Parse a request body in the host's JSON shape.
    pub fn from_json(value: &Value, parser: &QueryParser) -> Result<Self> {
        let body: SourceBody = serde_json::from_value(value.clone())?;
        let query = match &body.query {
            Some(query) => Some(Arc::from(parser.parse(query)?)),
            None => None,
        };

        Ok(SearchSource {
            query,
            post_filter: body.post_filter,
            from: body.from,
            size: body.size,
            timeout: body.timeout,
            min_score: body.min_score,
            track_scores: body.track_scores,
            track_total_hits: body.track_total_hits,
            terminate_after: body.terminate_after,
            sort: body.sort,
            search_after: body.search_after,
            collapse: body.collapse,
            suggest: body.suggest,
            aggregations: body.aggregations,
            explain: body.explain,
            profile: body.profile,
            fetch_source: body.fetch_source,
            version: body.version,
            seq_no_primary_term: body.seq_no_primary_term,
            highlight: body.highlight,
        })
    }

    /// Render this body in the host's JSON shape.
    pub fn to_json(&self) -> Result<Value> {
        let body = SourceBody {
            query: self.query.as_ref().map(|q| q.to_dsl()),
            post_filter: self.post_filter.clone(),
            from: self.from,
            size: self.size,
            timeout: self.timeout.clone(),
            min_score: self.min_score,
            track_scores: self.track_scores,
            track_total_hits: self.track_total_hits.clone(),
            terminate_after: self.terminate_after,
            sort: self.sort.clone(),
            search_after: self.search_after.clone(),
            collapse: self.collapse.clone(),
            suggest: self.suggest.clone(),
            aggregations: self.aggregations.clone(),
            explain: self.explain,
            profile: self.profile,
            fetch_source: self.fetch_source.clone(),
            version: self.version,
            seq_no_primary_term: self.seq_no_primary_term,
            highlight: self.highlight.clone(),
        };
        Ok(serde_json::to_value(body)?)
    }
}

/// A search request addressed to one or more indices.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub indices: Vec<String>,
    pub routing: Option<String>,
    pub preference: Option<String>,
    pub search_type: SearchType,
    /// Scroll keep-alive in the host's time-value syntax.
    pub scroll: Option<String>,
    pub source: Option<SearchSource>,
}

impl SearchRequest {
    /// Create a request against `indices`.
    pub fn new<I, S>(indices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SearchRequest {
            indices: indices.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Set the request body.
    pub fn with_source(mut self, source: SearchSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the routing value.
    pub fn with_routing<S: Into<String>>(mut self, routing: S) -> Self {
        self.routing = Some(routing.into());
        self
    }

    /// Set the shard preference.
    pub fn with_preference<S: Into<String>>(mut self, preference: S) -> Self {
        self.preference = Some(preference.into());
        self
    }

    /// Set the scroll keep-alive.
    pub fn with_scroll<S: Into<String>>(mut self, scroll: S) -> Self {
        self.scroll = Some(scroll.into());
        self
    }

    /// The query tree, if the request has one.
    pub fn query(&self) -> Option<&dyn Query> {
        self.source.as_ref()?.query.as_deref()
    }

    /// The highlight specification, if the request has one.
    pub fn highlight(&self) -> Option<&HighlightSpec> {
        self.source.as_ref()?.highlight.as_ref()
    }

    /// Parse a request in the JSON shape produced by [`SearchRequest::to_json`].
    pub fn from_json(value: &Value, parser: &QueryParser) -> Result<Self> {
        let envelope: RequestEnvelope = serde_json::from_value(value.clone())?;
        let source = match &envelope.source {
            Some(source) => Some(SearchSource::from_json(source, parser)?),
            None => None,
        };

        Ok(SearchRequest {
            indices: envelope.indices,
            routing: envelope.routing,
            preference: envelope.preference,
            search_type: envelope.search_type,
            scroll: envelope.scroll,
            source,
        })
    }

    /// Render this request as JSON.
    pub fn to_json(&self) -> Result<Value> {
        let envelope = RequestEnvelope {
            indices: self.indices.clone(),
            routing: self.routing.clone(),
            preference: self.preference.clone(),
            search_type: self.search_type,
            scroll: self.scroll.clone(),
            source: self.source.as_ref().map(SearchSource::to_json).transpose()?,
        };
        Ok(serde_json::to_value(envelope)?)
    }
}

#[derive(Serialize, Deserialize)]
struct RequestEnvelope {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    indices: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    routing: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    preference: Option<String>,
    #[serde(default)]
    search_type: SearchType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scroll: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<Value>,
}

#[derive(Serialize, Deserialize)]
struct SourceBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    query: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    post_filter: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    from: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timeout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    min_score: Option<f32>,
    #[serde(default, skip_serializing_if = "is_false")]
    track_scores: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    track_total_hits: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    terminate_after: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    sort: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    search_after: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    collapse: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    suggest: Option<Value>,
    #[serde(default, alias = "aggs", skip_serializing_if = "Option::is_none")]
    aggregations: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    explain: Option<bool>,
    #[serde(default, skip_serializing_if = "is_false")]
    profile: bool,
    #[serde(rename = "_source", default, skip_serializing_if = "Option::is_none")]
    fetch_source: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    seq_no_primary_term: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    highlight: Option<HighlightSpec>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::query::{TermQuery, downcast};
    use crate::search::highlight::HighlightFieldSpec;

    #[test]
    fn test_accessors() {
        let request = SearchRequest::new(["docs"]).with_source(
            SearchSource::new()
                .with_query(Box::new(TermQuery::new("content", "brain")))
                .with_highlight(HighlightSpec::new().field(HighlightFieldSpec::new("content"))),
        );

        assert_eq!(request.indices, vec!["docs".to_string()]);
        let term = downcast::<TermQuery>(request.query().unwrap()).unwrap();
        assert_eq!(term.term(), "brain");
        assert_eq!(request.highlight().unwrap().fields.len(), 1);

        assert!(SearchRequest::new(["docs"]).query().is_none());
        assert!(SearchRequest::new(["docs"]).highlight().is_none());
    }

    #[test]
    fn test_json_round_trip() {
        let input = json!({
            "indices": ["docs"],
            "routing": "user-1",
            "search_type": "dfs_query_then_fetch",
            "scroll": "1m",
            "source": {
                "query": { "term": { "content": "brain" } },
                "from": 10,
                "size": 5,
                "sort": [{ "date": "desc" }],
                "search_after": [1700000000, "doc-9"],
                "aggs": { "by_year": { "terms": { "field": "year" } } },
                "_source": { "includes": ["content"] },
                "explain": true,
                "highlight": { "fields": { "content": { "type": "semantic" } } }
            }
        });

        let request = SearchRequest::from_json(&input, &QueryParser::new()).unwrap();
        assert_eq!(request.search_type, SearchType::DfsQueryThenFetch);
        let source = request.source.as_ref().unwrap();
        assert_eq!(source.size, Some(5));
        assert_eq!(source.search_after.len(), 2);
        assert!(source.aggregations.is_some());

        let output = request.to_json().unwrap();
        assert_eq!(output["source"]["aggregations"], input["source"]["aggs"]);
        assert_eq!(output["source"]["query"], input["source"]["query"]);
        assert_eq!(output["source"]["_source"], input["source"]["_source"]);
        assert_eq!(output["scroll"], json!("1m"));
    }
}

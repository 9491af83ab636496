//! JSON query DSL parser.
//!
//! Supported clauses (each a single-key object):
//! - `{"term": {"field": "value"}}` or `{"term": {"field": {"value": "v", "boost": 2.0}}}`
//! - `{"bool": {"must": [...], "should": [...], "filter": [...], "must_not": [...],
//!   "minimum_should_match": 1, "boost": 1.0}}` (a single clause object is accepted in place of an array)
//! - `{"knn": {"field": {"vector": [..], "k": 10}}}`
//! - `{"neural": {"field": {"query_text": "..", "model_id": "..", "k": 10}}}`
//! - `{"hybrid": {"queries": [...]}}`
//!
//! [`Query::to_dsl`] renders the same shapes, so a parsed tree can be printed back.

use serde_json::{Map, Value};

use crate::error::{HighlightError, Result};
use crate::query::boolean::{BooleanClause, BooleanQuery, Occur};
use crate::query::hybrid::HybridQuery;
use crate::query::knn::KnnVectorQuery;
use crate::query::neural::NeuralKnnQuery;
use crate::query::query::Query;
use crate::query::term::TermQuery;

/// Default number of neighbours for `knn`/`neural` clauses without `k`.
pub const DEFAULT_K: usize = 10;

/// Parser from the JSON query DSL into a query tree.
#[derive(Debug, Default)]
pub struct QueryParser;

impl QueryParser {
    /// Create a new query parser.
    pub fn new() -> Self {
        QueryParser
    }

    /// Parse a JSON string.
    pub fn parse_str(&self, input: &str) -> Result<Box<dyn Query>> {
        let value: Value = serde_json::from_str(input)?;
        self.parse(&value)
    }

    /// Parse a JSON value.
    pub fn parse(&self, value: &Value) -> Result<Box<dyn Query>> {
        let (kind, body) = single_entry(value, "query")?;
        match kind {
            "term" => self.parse_term(body),
            "bool" => self.parse_bool(body),
            "knn" => self.parse_knn(body),
            "neural" => self.parse_neural(body),
            "hybrid" => self.parse_hybrid(body),
            other => Err(HighlightError::query(format!(
                "Unsupported query type: {other}"
            ))),
        }
    }

    fn parse_term(&self, body: &Value) -> Result<Box<dyn Query>> {
        let (field, spec) = single_entry(body, "term")?;
        let query = match spec {
            Value::Object(options) => {
                let value = options
                    .get("value")
                    .ok_or_else(|| HighlightError::query("term query requires a value"))?;
                TermQuery::new(field, scalar_to_string(value)?)
                    .with_boost(boost_of(options)?.unwrap_or(1.0))
            }
            scalar => TermQuery::new(field, scalar_to_string(scalar)?),
        };
        Ok(Box::new(query))
    }

    fn parse_bool(&self, body: &Value) -> Result<Box<dyn Query>> {
        let options = as_object(body, "bool")?;
        let mut query = BooleanQuery::new();

        for (key, value) in options {
            let occur = match key.as_str() {
                "must" => Occur::Must,
                "should" => Occur::Should,
                "filter" => Occur::Filter,
                "must_not" => Occur::MustNot,
                "minimum_should_match" | "boost" => continue,
                other => {
                    return Err(HighlightError::query(format!(
                        "Unsupported bool parameter: {other}"
                    )));
                }
            };
            match value {
                Value::Array(clauses) => {
                    for clause in clauses {
                        query.add_clause(BooleanClause::new(self.parse(clause)?, occur));
                    }
                }
                clause => query.add_clause(BooleanClause::new(self.parse(clause)?, occur)),
            }
        }

        if let Some(minimum) = options.get("minimum_should_match") {
            let minimum = minimum.as_u64().ok_or_else(|| {
                HighlightError::query("minimum_should_match must be a non-negative integer")
            })?;
            query = query.with_minimum_should_match(minimum as usize);
        }
        if let Some(boost) = boost_of(options)? {
            query = query.with_boost(boost);
        }

        Ok(Box::new(query))
    }

    fn parse_knn(&self, body: &Value) -> Result<Box<dyn Query>> {
        let (field, spec) = single_entry(body, "knn")?;
        let options = as_object(spec, "knn")?;
        let vector = match options.get("vector") {
            Some(vector) => parse_vector(vector)?,
            None => return Err(HighlightError::query("knn query requires a vector")),
        };
        let query = KnnVectorQuery::new(field, vector, k_of(options)?)
            .with_boost(boost_of(options)?.unwrap_or(1.0));
        Ok(Box::new(query))
    }

    fn parse_neural(&self, body: &Value) -> Result<Box<dyn Query>> {
        let (field, spec) = single_entry(body, "neural")?;
        let options = as_object(spec, "neural")?;

        let query_text = options
            .get("query_text")
            .and_then(Value::as_str)
            .ok_or_else(|| HighlightError::query("neural query requires a string query_text"))?;
        let vector = match options.get("vector") {
            Some(vector) => parse_vector(vector)?,
            None => Vec::new(),
        };

        let knn = KnnVectorQuery::new(field, vector, k_of(options)?)
            .with_boost(boost_of(options)?.unwrap_or(1.0));
        let mut query = NeuralKnnQuery::new(Box::new(knn), query_text);
        if let Some(model_id) = options.get("model_id").and_then(Value::as_str) {
            query = query.with_model_id(model_id);
        }
        Ok(Box::new(query))
    }

    fn parse_hybrid(&self, body: &Value) -> Result<Box<dyn Query>> {
        let options = as_object(body, "hybrid")?;
        let queries = options
            .get("queries")
            .and_then(Value::as_array)
            .ok_or_else(|| HighlightError::query("hybrid query requires a queries array"))?;

        let mut query = HybridQuery::new(
            queries
                .iter()
                .map(|q| self.parse(q))
                .collect::<Result<Vec<_>>>()?,
        );
        if let Some(boost) = boost_of(options)? {
            query.set_boost(boost);
        }
        Ok(Box::new(query))
    }
}

fn as_object<'a>(value: &'a Value, context: &str) -> Result<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| HighlightError::query(format!("{context} clause must be an object")))
}

fn single_entry<'a>(value: &'a Value, context: &str) -> Result<(&'a str, &'a Value)> {
    let object = as_object(value, context)?;
    let mut entries = object.iter();
    match (entries.next(), entries.next()) {
        (Some((key, body)), None) => Ok((key.as_str(), body)),
        _ => Err(HighlightError::query(format!(
            "{context} clause must have exactly one key, found {}",
            object.len()
        ))),
    }
}

fn scalar_to_string(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(HighlightError::query("term value must be a scalar")),
    }
}

fn boost_of(options: &Map<String, Value>) -> Result<Option<f32>> {
    match options.get("boost") {
        None => Ok(None),
        Some(boost) => boost
            .as_f64()
            .map(|b| Some(b as f32))
            .ok_or_else(|| HighlightError::query("boost must be a number")),
    }
}

fn k_of(options: &Map<String, Value>) -> Result<usize> {
    match options.get("k") {
        None => Ok(DEFAULT_K),
        Some(k) => k
            .as_u64()
            .map(|k| k as usize)
            .ok_or_else(|| HighlightError::query("k must be a non-negative integer")),
    }
}

fn parse_vector(value: &Value) -> Result<Vec<f32>> {
    value
        .as_array()
        .ok_or_else(|| HighlightError::query("vector must be an array of numbers"))?
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| HighlightError::query("vector must be an array of numbers"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::query::query::downcast;

    #[test]
    fn test_parse_term() {
        let parser = QueryParser::new();
        let query = parser.parse(&json!({ "term": { "title": "brain" } })).unwrap();

        let term = downcast::<TermQuery>(query.as_ref()).unwrap();
        assert_eq!(term.field(), "title");
        assert_eq!(term.term(), "brain");
    }

    #[test]
    fn test_parse_bool_with_neural_clause() {
        let parser = QueryParser::new();
        let query = parser
            .parse(&json!({
                "bool": {
                    "must": [
                        { "neural": { "embedding": { "query_text": "find regions", "model_id": "m-embed", "k": 5 } } },
                        { "term": { "content": "brain" } }
                    ],
                    "must_not": { "term": { "content": "spam" } }
                }
            }))
            .unwrap();

        let boolean = downcast::<BooleanQuery>(query.as_ref()).unwrap();
        assert_eq!(boolean.clauses().len(), 3);

        let first = boolean.clauses_by_occur(Occur::Must).next().unwrap();
        let neural = downcast::<NeuralKnnQuery>(first.query.as_ref()).unwrap();
        assert_eq!(neural.original_query_text(), "find regions");
        assert_eq!(neural.model_id(), Some("m-embed"));
        assert_eq!(Query::field(neural), Some("embedding"));
    }

    #[test]
    fn test_printed_tree_parses_back() {
        let parser = QueryParser::new();
        let dsl = json!({
            "hybrid": {
                "queries": [
                    { "term": { "content": "brain" } },
                    { "neural": { "embedding": { "query_text": "brain regions", "k": 3 } } }
                ]
            }
        });

        let query = parser.parse(&dsl).unwrap();
        assert_eq!(query.to_dsl(), dsl);
    }

    #[test]
    fn test_rejects_malformed_clauses() {
        let parser = QueryParser::new();

        assert!(parser.parse(&json!({ "match_all": {} })).is_err());
        assert!(parser.parse(&json!({ "term": {}, "bool": {} })).is_err());
        assert!(parser.parse(&json!({ "neural": { "embedding": { "k": 3 } } })).is_err());
        assert!(parser.parse(&json!({ "knn": { "embedding": { "vector": ["x"] } } })).is_err());
        assert!(parser.parse_str("not json").is_err());
    }
}

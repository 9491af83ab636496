//! Hybrid query: a union of independently scored sub-queries.

use serde_json::{Map, Value};

use crate::query::query::Query;

/// A query whose sub-queries are executed and scored separately, with their
/// results combined afterwards (lexical + vector retrieval, typically).
#[derive(Debug, Clone)]
pub struct HybridQuery {
    queries: Vec<Box<dyn Query>>,
    boost: f32,
}

impl HybridQuery {
    /// Create a hybrid query from its sub-queries.
    pub fn new(queries: Vec<Box<dyn Query>>) -> Self {
        HybridQuery {
            queries,
            boost: 1.0,
        }
    }

    /// Add a sub-query.
    pub fn add(&mut self, query: Box<dyn Query>) {
        self.queries.push(query);
    }

    /// The sub-queries, in declaration order.
    pub fn queries(&self) -> &[Box<dyn Query>] {
        &self.queries
    }
}

impl Default for HybridQuery {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Query for HybridQuery {
    fn boost(&self) -> f32 {
        self.boost
    }

    fn set_boost(&mut self, boost: f32) {
        self.boost = boost;
    }

    fn description(&self) -> String {
        let parts: Vec<String> = self.queries.iter().map(|q| q.description()).collect();
        format!("hybrid({})", parts.join(" | "))
    }

    fn clone_box(&self) -> Box<dyn Query> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn to_dsl(&self) -> Value {
        let mut body = Map::new();
        body.insert(
            "queries".to_string(),
            Value::Array(self.queries.iter().map(|q| q.to_dsl()).collect()),
        );
        if self.boost != 1.0 {
            body.insert("boost".to_string(), Value::from(self.boost));
        }

        let mut root = Map::new();
        root.insert("hybrid".to_string(), Value::Object(body));
        Value::Object(root)
    }
}

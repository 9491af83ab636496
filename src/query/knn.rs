//! k-nearest-neighbour vector query.

use serde_json::{Map, Value, json};

use crate::query::query::Query;

/// A query that retrieves the `k` documents whose vectors are closest to a
/// query vector.
///
/// The vector may be empty when it has not been computed yet; the host engine
/// fills it in during rewrite.
#[derive(Debug, Clone)]
pub struct KnnVectorQuery {
    field: String,
    vector: Vec<f32>,
    k: usize,
    boost: f32,
}

impl KnnVectorQuery {
    /// Create a new k-NN query.
    pub fn new<F: Into<String>>(field: F, vector: Vec<f32>, k: usize) -> Self {
        KnnVectorQuery {
            field: field.into(),
            vector,
            k,
            boost: 1.0,
        }
    }

    /// Get the field name.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Get the query vector.
    pub fn vector(&self) -> &[f32] {
        &self.vector
    }

    /// Number of neighbours to retrieve.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Set the boost factor.
    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }
}

impl Query for KnnVectorQuery {
    fn boost(&self) -> f32 {
        self.boost
    }

    fn set_boost(&mut self, boost: f32) {
        self.boost = boost;
    }

    fn description(&self) -> String {
        format!("knn({}, dim={}, k={})", self.field, self.vector.len(), self.k)
    }

    fn clone_box(&self) -> Box<dyn Query> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn to_dsl(&self) -> Value {
        let mut body = Map::new();
        body.insert("vector".to_string(), json!(self.vector));
        body.insert("k".to_string(), Value::from(self.k));
        if self.boost != 1.0 {
            body.insert("boost".to_string(), Value::from(self.boost));
        }
        json!({ "knn": { self.field.as_str(): body } })
    }

    fn field(&self) -> Option<&str> {
        Some(&self.field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_knn_query_description() {
        let query = KnnVectorQuery::new("embedding", vec![0.1, 0.2, 0.3], 10);

        assert_eq!(query.description(), "knn(embedding, dim=3, k=10)");
        assert_eq!(Query::field(&query), Some("embedding"));
    }
}

//! Neural query: a vector query that remembers the text it was embedded from.
//!
//! When a natural-language query is turned into a vector, the text itself is
//! lost to anything downstream of the rewrite. [`NeuralKnnQuery`] carries it
//! alongside the wrapped vector query so highlighting can ask the model about
//! the user's actual words.

use serde_json::{Map, Value, json};

use crate::query::knn::KnnVectorQuery;
use crate::query::query::Query;

/// Wraps a vector query together with its original query text.
#[derive(Debug, Clone)]
pub struct NeuralKnnQuery {
    knn_query: Box<dyn Query>,
    original_query_text: String,
    model_id: Option<String>,
}

impl NeuralKnnQuery {
    /// Wrap `knn_query`, recording the text that produced its vector.
    pub fn new<T: Into<String>>(knn_query: Box<dyn Query>, original_query_text: T) -> Self {
        NeuralKnnQuery {
            knn_query,
            original_query_text: original_query_text.into(),
            model_id: None,
        }
    }

    /// Record the embedding model used for the vector.
    pub fn with_model_id<M: Into<String>>(mut self, model_id: M) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    /// The wrapped vector query.
    pub fn knn_query(&self) -> &dyn Query {
        self.knn_query.as_ref()
    }

    /// The text the vector was computed from.
    pub fn original_query_text(&self) -> &str {
        &self.original_query_text
    }

    /// The embedding model, if known.
    pub fn model_id(&self) -> Option<&str> {
        self.model_id.as_deref()
    }
}

impl Query for NeuralKnnQuery {
    fn boost(&self) -> f32 {
        self.knn_query.boost()
    }

    fn set_boost(&mut self, boost: f32) {
        self.knn_query.set_boost(boost);
    }

    fn description(&self) -> String {
        self.knn_query.description()
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
            "query_text".to_string(),
            Value::String(self.original_query_text.clone()),
        );
        if let Some(model_id) = &self.model_id {
            body.insert("model_id".to_string(), Value::String(model_id.clone()));
        }
        if let Some(knn) = self.knn_query.as_any().downcast_ref::<KnnVectorQuery>() {
            body.insert("k".to_string(), Value::from(knn.k()));
            if !knn.vector().is_empty() {
                body.insert("vector".to_string(), json!(knn.vector()));
            }
        }
        if self.boost() != 1.0 {
            body.insert("boost".to_string(), Value::from(self.boost()));
        }

        let field = self.knn_query.field().unwrap_or_default();
        json!({ "neural": { field: body } })
    }

    fn field(&self) -> Option<&str> {
        self.knn_query.field()
    }
}

//! Base query trait shared by every query-tree node kind.

use std::any::Any;
use std::fmt::Debug;

use serde_json::Value;

/// Trait for query-tree nodes.
///
/// Retrieval itself happens in the host engine; the tree is kept here so the
/// highlighting phase can recover the natural-language text a query was built
/// from. Node kinds are told apart by their concrete type via [`Query::as_any`].
pub trait Query: Send + Sync + Debug {
    /// Get the boost factor for this query.
    fn boost(&self) -> f32;

    /// Set the boost factor for this query.
    fn set_boost(&mut self, boost: f32);

    /// Get a human-readable description of this query.
    fn description(&self) -> String;

    /// Clone this query.
    fn clone_box(&self) -> Box<dyn Query>;

    /// Get this query as Any for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Render this query back into the JSON query DSL.
    fn to_dsl(&self) -> Value;

    /// Get the field name this query searches in, if applicable.
    /// Returns None for queries that don't target a specific field (e.g., BooleanQuery).
    fn field(&self) -> Option<&str> {
        None
    }
}

impl Clone for Box<dyn Query> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Downcast a query node to a concrete kind.
pub fn downcast<Q: Query + 'static>(query: &dyn Query) -> Option<&Q> {
    query.as_any().downcast_ref::<Q>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::boolean::BooleanQuery;
    use crate::query::term::TermQuery;

    #[test]
    fn test_downcast_matches_exact_kind() {
        let query: Box<dyn Query> = Box::new(TermQuery::new("title", "hello"));

        assert!(downcast::<TermQuery>(query.as_ref()).is_some());
        assert!(downcast::<BooleanQuery>(query.as_ref()).is_none());
    }

    #[test]
    fn test_boxed_clone() {
        let query: Box<dyn Query> = Box::new(TermQuery::new("title", "hello").with_boost(2.0));
        let cloned = query.clone();

        assert_eq!(cloned.description(), query.description());
        assert_eq!(cloned.boost(), 2.0);
    }
}

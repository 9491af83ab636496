//! Recovery of the natural-language text behind a query tree.
//!
//! Dispatch is a table keyed by the exact concrete node type. A node whose
//! type is not in the table yields no text; supertypes and wrappers are not
//! consulted. Compound extractors recurse through the registry they are
//! handed, so a kind registered later is picked up inside booleans and hybrids
//! without touching them.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::query::{BooleanQuery, HybridQuery, NeuralKnnQuery, Occur, Query, TermQuery, downcast};

/// Strategy for pulling query text out of one node kind.
pub trait QueryTextExtractor: Send + Sync {
    /// Extract the text of `query` for highlighting `field`.
    ///
    /// `registry` is the table this extractor was found in; compound kinds use
    /// it to recurse into their children.
    fn extract(
        &self,
        query: &dyn Query,
        field: &str,
        registry: &QueryTextExtractorRegistry,
    ) -> Option<String>;
}

impl<F> QueryTextExtractor for F
where
    F: Fn(&dyn Query, &str, &QueryTextExtractorRegistry) -> Option<String> + Send + Sync,
{
    fn extract(
        &self,
        query: &dyn Query,
        field: &str,
        registry: &QueryTextExtractorRegistry,
    ) -> Option<String> {
        self(query, field, registry)
    }
}

/// Returns the text a neural query was embedded from.
#[derive(Debug, Default)]
pub struct NeuralTextExtractor;

impl QueryTextExtractor for NeuralTextExtractor {
    fn extract(
        &self,
        query: &dyn Query,
        _field: &str,
        _registry: &QueryTextExtractorRegistry,
    ) -> Option<String> {
        let neural = downcast::<NeuralKnnQuery>(query)?;
        debug!(
            "[semantic-hl] extracted neural query text '{}' (inner: {})",
            neural.original_query_text(),
            neural.knn_query().description()
        );
        Some(neural.original_query_text().to_string())
    }
}

/// Returns the literal term.
#[derive(Debug, Default)]
pub struct TermTextExtractor;

impl QueryTextExtractor for TermTextExtractor {
    fn extract(
        &self,
        query: &dyn Query,
        _field: &str,
        _registry: &QueryTextExtractorRegistry,
    ) -> Option<String> {
        downcast::<TermQuery>(query).map(|term| term.term().to_string())
    }
}

/// Recurses into must, then should, then filter clauses and returns the first
/// non-empty text. Must-not clauses never contribute.
#[derive(Debug, Default)]
pub struct BooleanTextExtractor;

const BOOLEAN_PRECEDENCE: [Occur; 3] = [Occur::Must, Occur::Should, Occur::Filter];

impl QueryTextExtractor for BooleanTextExtractor {
    fn extract(
        &self,
        query: &dyn Query,
        field: &str,
        registry: &QueryTextExtractorRegistry,
    ) -> Option<String> {
        let boolean = downcast::<BooleanQuery>(query)?;
        BOOLEAN_PRECEDENCE.iter().find_map(|occur| {
            boolean
                .clauses_by_occur(*occur)
                .find_map(|clause| non_empty(registry.extract(clause.query.as_ref(), field)))
        })
    }
}

/// Returns the first non-empty text among the sub-queries.
#[derive(Debug, Default)]
pub struct HybridTextExtractor;

impl QueryTextExtractor for HybridTextExtractor {
    fn extract(
        &self,
        query: &dyn Query,
        field: &str,
        registry: &QueryTextExtractorRegistry,
    ) -> Option<String> {
        let hybrid = downcast::<HybridQuery>(query)?;
        hybrid
            .queries()
            .iter()
            .find_map(|sub| non_empty(registry.extract(sub.as_ref(), field)))
    }
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.is_empty())
}

struct Entry {
    type_name: &'static str,
    extractor: Arc<dyn QueryTextExtractor>,
}

/// Table of extractors keyed by concrete query type.
///
/// Mutated only while being set up; afterwards it is shared read-only
/// (typically behind an [`Arc`]) and looked up without locking.
pub struct QueryTextExtractorRegistry {
    extractors: HashMap<TypeId, Entry>,
}

impl QueryTextExtractorRegistry {
    /// Create a registry with the built-in extractors for neural, term,
    /// boolean and hybrid queries.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register::<NeuralKnnQuery, _>(NeuralTextExtractor);
        registry.register::<TermQuery, _>(TermTextExtractor);
        registry.register::<HybridQuery, _>(HybridTextExtractor);
        registry.register::<BooleanQuery, _>(BooleanTextExtractor);
        registry
    }

    /// Create a registry with no extractors.
    pub fn empty() -> Self {
        QueryTextExtractorRegistry {
            extractors: HashMap::new(),
        }
    }

    /// Register `extractor` for queries of exactly type `Q`, replacing any
    /// previous entry.
    pub fn register<Q, E>(&mut self, extractor: E)
    where
        Q: Query + 'static,
        E: QueryTextExtractor + 'static,
    {
        self.extractors.insert(
            TypeId::of::<Q>(),
            Entry {
                type_name: std::any::type_name::<Q>(),
                extractor: Arc::new(extractor),
            },
        );
    }

    /// Whether an extractor is registered for exactly type `Q`.
    pub fn is_registered<Q: Query + 'static>(&self) -> bool {
        self.extractors.contains_key(&TypeId::of::<Q>())
    }

    /// Number of registered kinds.
    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    /// Whether no kinds are registered.
    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }

    /// Extract the query text of `query` for `field`.
    ///
    /// Returns `None` when the node's kind is not registered or its extractor
    /// finds nothing.
    pub fn extract(&self, query: &dyn Query, field: &str) -> Option<String> {
        let type_id = Any::type_id(query.as_any());
        match self.extractors.get(&type_id) {
            Some(entry) => entry.extractor.extract(query, field, self),
            None => {
                debug!(
                    "[semantic-hl] no query text extractor for {}",
                    query.description()
                );
                None
            }
        }
    }
}

impl Default for QueryTextExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for QueryTextExtractorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&str> = self.extractors.values().map(|e| e.type_name).collect();
        kinds.sort_unstable();
        f.debug_struct("QueryTextExtractorRegistry")
            .field("kinds", &kinds)
            .finish()
    }
}

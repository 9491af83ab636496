//! Boundary to the host search engine.

use crate::error::Result;
use crate::search::request::SearchRequest;
use crate::search::response::SearchResponse;

/// Executes a plain (non-semantic) search request.
///
/// Implemented by the host engine. Errors are propagated to the caller of the
/// highlighting filter unchanged.
pub trait SearchExecutor: Send + Sync {
    /// Run `request` and return its response.
    fn execute(&self, request: &SearchRequest) -> Result<SearchResponse>;
}

impl<F> SearchExecutor for F
where
    F: Fn(&SearchRequest) -> Result<SearchResponse> + Send + Sync,
{
    fn execute(&self, request: &SearchRequest) -> Result<SearchResponse> {
        self(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HighlightError;
    use crate::search::response::SearchHit;

    #[test]
    fn test_closure_executor() {
        let executor = |request: &SearchRequest| -> Result<SearchResponse> {
            if request.indices.is_empty() {
                return Err(HighlightError::search("no index"));
            }
            Ok(SearchResponse::with_hits(vec![SearchHit::new("docs", "1", 1.0)], 3))
        };

        let response = executor.execute(&SearchRequest::new(["docs"])).unwrap();
        assert_eq!(response.hits.len(), 1);
        assert!(executor.execute(&SearchRequest::default()).is_err());
    }
}

//! Request and response model shared with the host search engine.

pub mod executor;
pub mod highlight;
pub mod request;
pub mod response;

pub use self::executor::SearchExecutor;
pub use self::highlight::{HighlightFieldSpec, HighlightSpec};
pub use self::request::{SearchRequest, SearchSource, SearchType};
pub use self::response::{
    Clusters, HighlightField, SearchHit, SearchHits, SearchResponse, ShardFailure, ShardStats,
    TotalHits, TotalHitsRelation,
};

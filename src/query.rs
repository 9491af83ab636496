//! Query-tree node kinds.
//!
//! The host engine executes queries; this crate only needs to walk the tree
//! to find the text a user actually typed.

pub mod boolean;
pub mod hybrid;
pub mod knn;
pub mod neural;
pub mod parser;
#[allow(clippy::module_inception)]
pub mod query;
pub mod term;

pub use self::boolean::{BooleanClause, BooleanQuery, BooleanQueryBuilder, Occur};
pub use self::hybrid::HybridQuery;
pub use self::knn::KnnVectorQuery;
pub use self::neural::NeuralKnnQuery;
pub use self::parser::QueryParser;
pub use self::query::{Query, downcast};
pub use self::term::TermQuery;

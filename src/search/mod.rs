//! Search layer facade.
//!
//! - **[`compiler`]**: free-text boolean syntax to FTS5 `MATCH` expressions.
//! - **[`query`]**: filter, match, sort and paginate records.
//! - **[`facets`]**: facet counts behind a TTL cache.

pub mod compiler;
pub mod facets;
pub mod query;

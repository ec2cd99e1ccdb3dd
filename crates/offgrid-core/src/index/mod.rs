//! Local search index.
//!
//! This module provides:
//! - Search text normalization shared by indexing and querying
//! - Search entry and option types
//! - A SQLite-backed index with tiered ranking and region liveness filtering

mod normalize;
mod search_index;
mod types;

pub use normalize::normalize_search_text;
pub use search_index::{RegionLiveness, SearchIndex};
pub use types::{EntryKind, SearchEntry, SearchOptions};

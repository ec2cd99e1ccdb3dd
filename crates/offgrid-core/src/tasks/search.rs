//! Query-box search.

use crate::config::SearchConfig;
use crate::error::Result;
use crate::index::SearchOptions;
use crate::search::{OfflineSearchOrchestrator, SearchResults};
use std::sync::Arc;

/// Runs searches for a search box, optionally scoped to one region.
#[derive(Clone)]
pub struct SearchTask {
    search: Arc<OfflineSearchOrchestrator>,
    region_id: Option<String>,
    limit: usize,
}

impl SearchTask {
    pub fn new(search: Arc<OfflineSearchOrchestrator>) -> Self {
        Self {
            search,
            region_id: None,
            limit: SearchConfig::DEFAULT_LIMIT,
        }
    }

    pub fn in_region(mut self, region_id: impl Into<String>) -> Self {
        self.region_id = Some(region_id.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Search for `query`; blank input yields no results.
    pub async fn run(&self, query: &str) -> Result<SearchResults> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(SearchResults::default());
        }

        let mut options = SearchOptions::default().with_limit(self.limit);
        options.region_id = self.region_id.clone();
        self.search.search(query, &options).await
    }
}

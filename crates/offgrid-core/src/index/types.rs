//! Search entry types.

use crate::config::SearchConfig;
use crate::geo::Coordinate;
use serde::{Deserialize, Serialize};

use super::normalize::normalize_search_text;

/// Source family of a search entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Address,
    PointOfInterest,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Address => "address",
            EntryKind::PointOfInterest => "point_of_interest",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "address" => Some(EntryKind::Address),
            "point_of_interest" => Some(EntryKind::PointOfInterest),
            _ => None,
        }
    }
}

/// A searchable place owned by exactly one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchEntry {
    pub id: String,
    pub region_id: String,
    pub name: String,
    pub kind: EntryKind,
    pub latitude: f64,
    pub longitude: f64,
    pub search_text: String,
}

impl SearchEntry {
    /// Address entry; searchable by its formatted address.
    pub fn address(
        source_id: &str,
        region_id: impl Into<String>,
        formatted_address: impl Into<String>,
        position: Coordinate,
    ) -> Self {
        let name = formatted_address.into();
        Self {
            id: format!("{}{}", SearchConfig::ADDRESS_ID_PREFIX, source_id),
            region_id: region_id.into(),
            search_text: normalize_search_text(&name),
            name,
            kind: EntryKind::Address,
            latitude: position.latitude,
            longitude: position.longitude,
        }
    }

    /// Point-of-interest entry; searchable by name and category.
    pub fn point_of_interest(
        source_id: &str,
        region_id: impl Into<String>,
        name: impl Into<String>,
        category: &str,
        position: Coordinate,
    ) -> Self {
        let name = name.into();
        Self {
            id: format!("{}{}", SearchConfig::POI_ID_PREFIX, source_id),
            region_id: region_id.into(),
            search_text: normalize_search_text(&format!("{} {}", name, category)),
            name,
            kind: EntryKind::PointOfInterest,
            latitude: position.latitude,
            longitude: position.longitude,
        }
    }

    pub fn position(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// Filters and limit for a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    pub region_id: Option<String>,
    pub kind: Option<EntryKind>,
    pub limit: usize,
}

impl SearchOptions {
    pub fn in_region(mut self, region_id: impl Into<String>) -> Self {
        self.region_id = Some(region_id.into());
        self
    }

    pub fn of_kind(mut self, kind: EntryKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            region_id: None,
            kind: None,
            limit: SearchConfig::DEFAULT_LIMIT,
        }
    }
}

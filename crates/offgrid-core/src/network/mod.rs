//! Network implementations of the collaborators.
//!
//! This module provides:
//! - An HTTP client wrapper with timeouts and status mapping
//! - HTTP geocoder, POI and remote-search collaborators
//! - An XYZ tile source over a URL template
//! - A probing connectivity monitor

mod client;
mod monitor;
mod sources;
mod tiles;

pub use client::{endpoint_url, HttpClient};
pub use monitor::{ConnectivityState, NetworkMonitor};
pub use sources::{HttpGeocoder, HttpPoiSource, HttpRemoteSearch, REMOTE_REGION_ID};
pub use tiles::HttpTileSource;

//! Offline search orchestration and its collaborators.

mod orchestrator;
mod sources;

pub use orchestrator::{
    BuildSummary, OfflineSearchOrchestrator, SearchResults, GEOCODING_SOURCE, POI_SOURCE,
};
pub use sources::{
    ConnectivitySignal, GeocodedAddress, Geocoder, PoiSource, PointOfInterest, RemoteSearch,
    StaticConnectivity,
};

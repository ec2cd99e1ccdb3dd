//! Offgrid Core - offline region cache and local address/POI search.
//!
//! This crate downloads map tiles for geographic regions (usually the
//! buffered area around a planned route), keeps them with an expiry time,
//! and builds a local search index of addresses and points of interest for
//! each downloaded region so searching works without connectivity.
//!
//! # Example
//!
//! ```rust,ignore
//! use offgrid_core::{CancellationToken, OfflineSession, Route};
//!
//! #[tokio::main]
//! async fn main() -> offgrid_core::Result<()> {
//!     let session = OfflineSession::builder("/path/to/data")
//!         .auto_create_dirs(true)
//!         .load_config_file()?
//!         .build()
//!         .await?;
//!
//!     let route = Route::new("commute", coordinates);
//!     let area = session
//!         .route_area_task()?
//!         .run(&route, CancellationToken::new(), |phase| println!("{:?}", phase))
//!         .await?;
//!     println!("Indexed {} entries", area.index.total());
//!
//!     let results = session.search_task().run("main st").await?;
//!     println!("Found {} results", results.len());
//!
//!     session.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod clock;
pub mod config;
pub mod error;
pub mod geo;
pub mod index;
pub mod network;
pub mod region;
pub mod search;
pub mod session;
pub mod tasks;

// Re-export commonly used types
pub use cancel::{CancellationToken, CancelledError};
pub use clock::{Clock, DynClock, ManualClock, SystemClock};
pub use config::{EndpointConfig, SessionConfig};
pub use error::{OffgridError, Result};
pub use geo::{compute_bounding_box, BoundingBox, Coordinate, ZoomRange};
pub use index::{EntryKind, SearchEntry, SearchIndex, SearchOptions};
pub use region::{
    DownloadTask, RegionCache, RegionDescriptor, RegionKind, RegionRequest, RegionStatus,
    RegionStore, TileArtifactStore, TileSource,
};
pub use search::{
    BuildSummary, ConnectivitySignal, Geocoder, OfflineSearchOrchestrator, PoiSource,
    RemoteSearch, SearchResults,
};
pub use session::{OfflineSession, OfflineSessionBuilder};
pub use tasks::{Route, RouteArea, RouteAreaTask, RoutePhase, SearchTask};

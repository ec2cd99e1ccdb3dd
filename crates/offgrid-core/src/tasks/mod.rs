//! Client-facing tasks: preparing a route area and running searches.

mod route_area;
mod search;

pub use route_area::{Route, RouteArea, RouteAreaTask, RoutePhase};
pub use search::SearchTask;

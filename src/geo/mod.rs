//! Region lookup for connecting clients.

mod client;
mod types;

pub use client::{is_routable, GeoConfig, GeoLocator, UNKNOWN_REGION};

//! Address search used to jump the map to a place.

mod client;
mod error;
mod types;

pub use client::{GeocodeClient, MIN_QUERY_CHARS};
pub use error::GeocodeError;
pub use types::GeocodeResult;

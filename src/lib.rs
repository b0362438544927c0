//! Select an area on a map, detect paved surfaces inside it, and turn the
//! detected polygons into area totals and paving material estimates.

pub mod area;
pub mod config;
pub mod detection;
pub mod events;
pub mod geocode;
pub mod geometry;
pub mod materials;
pub mod report;
pub mod settings;
pub mod tracking;
pub mod units;

use std::future::Future;
use std::pin::Pin;

/// Type alias for a boxed future that can be sent between threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

mod error;
mod proximity;
mod service;
mod sink;
mod source;
mod types;

pub use error::{SinkError, TrackingError};
pub use proximity::{ProximityTracker, MAX_DISTANCE_THRESHOLD_M, MIN_DISTANCE_THRESHOLD_M};
pub use service::{flush_queue, TrackingService, MIN_FLUSH_INTERVAL};
pub use sink::{FixSink, HttpFixSink, LogSink};
pub use source::{ChannelLocationSource, LocationSource};
pub use types::{LastCommittedFix, TrackedFix, TrackedRecord};

use tokio::sync::mpsc;

use super::error::TrackingError;
use super::types::TrackedFix;

/// Something that can stream position fixes.
///
/// Dropping the returned receiver releases the watch.
pub trait LocationSource: Send {
    fn watch(&mut self) -> Result<mpsc::Receiver<TrackedFix>, TrackingError>;
}

/// Location source fed through an mpsc channel. Can be watched once.
pub struct ChannelLocationSource {
    receiver: Option<mpsc::Receiver<TrackedFix>>,
}

impl ChannelLocationSource {
    pub fn new(capacity: usize) -> (mpsc::Sender<TrackedFix>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { receiver: Some(rx) })
    }

    /// A source on a device without location capability.
    pub fn unavailable() -> Self {
        Self { receiver: None }
    }
}

impl LocationSource for ChannelLocationSource {
    fn watch(&mut self) -> Result<mpsc::Receiver<TrackedFix>, TrackingError> {
        self.receiver
            .take()
            .ok_or(TrackingError::GeolocationUnavailable)
    }
}

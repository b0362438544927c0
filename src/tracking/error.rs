use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackingError {
    #[error("Location tracking is disabled")]
    Disabled,
    #[error("Geolocation is not available")]
    GeolocationUnavailable,
    #[error("Tracking is already running")]
    AlreadyRunning,
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Sink rejected batch with status {0}")]
    Status(u16),
}

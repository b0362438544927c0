mod client;
mod error;
mod session;
mod types;

pub use client::{DetectionClient, DetectionService};
pub use error::DetectionError;
pub use session::DetectionSession;
pub use types::{DetectOptions, DetectionResult};

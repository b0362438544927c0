//! User-editable state persisted between runs.

mod store;
mod types;

pub use store::{SettingsError, SettingsStore};
pub use types::{MapSettings, TrackingSettings};

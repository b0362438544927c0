use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::types::{MapSettings, TrackingSettings};
use crate::config::SettingsConfig;
use crate::events::{AppEvent, EventBus};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// JSON files in one directory, one per application key.
pub struct SettingsStore {
    dir: PathBuf,
    events: Option<EventBus>,
}

impl SettingsStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            events: None,
        }
    }

    pub fn from_config(config: &SettingsConfig) -> Self {
        Self::new(config.dir.clone())
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `aiMapSettings:v1` is stored as `aiMapSettings_v1.json`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", name))
    }

    /// Missing files and unparseable content both yield the default value;
    /// only I/O failures on an existing file are errors.
    pub fn load<T>(&self, key: &str) -> Result<T, SettingsError>
    where
        T: DeserializeOwned + Default,
    {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(T::default());
        }

        let content = std::fs::read_to_string(&path)?;
        match serde_json::from_str(&content) {
            Ok(value) => Ok(value),
            Err(e) => {
                log::warn!(
                    "Ignoring unreadable settings {} ({}), using defaults",
                    path.display(),
                    e
                );
                Ok(T::default())
            }
        }
    }

    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), SettingsError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let content = serde_json::to_string_pretty(value)?;
        std::fs::write(&path, content)?;
        log::debug!("Saved {} to {}", key, path.display());
        Ok(())
    }

    pub fn map_settings(&self) -> Result<MapSettings, SettingsError> {
        self.load(MapSettings::KEY)
    }

    /// Persists map settings and announces a unit-system change, if any.
    pub fn save_map_settings(&self, settings: &MapSettings) -> Result<(), SettingsError> {
        let previous = self.map_settings()?.units;
        self.save(MapSettings::KEY, settings)?;

        if previous != settings.units {
            log::info!("Unit system changed to {}", settings.units.name());
            if let Some(events) = &self.events {
                events.publish(AppEvent::UnitSystemChanged(settings.units));
            }
        }
        Ok(())
    }

    pub fn tracking_settings(&self) -> Result<TrackingSettings, SettingsError> {
        self.load(TrackingSettings::KEY)
    }

    pub fn save_tracking_settings(&self, settings: &TrackingSettings) -> Result<(), SettingsError> {
        self.save(TrackingSettings::KEY, settings)
    }
}

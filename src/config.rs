use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::detection::DetectOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Deployment configuration: collaborator endpoints, timeouts and where user
/// settings live. Loaded once and handed to each component's constructor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub geocoding: GeocodingConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectionConfig {
    #[serde(default = "default_api_url")]
    pub base_url: String,
    #[serde(default = "default_detect_timeout", deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
    #[serde(default = "default_true")]
    pub include_parking: bool,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    #[serde(default = "default_true")]
    pub enhance_results: bool,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_url(),
            timeout: default_detect_timeout(),
            include_parking: true,
            min_confidence: default_min_confidence(),
            enhance_results: true,
            user_agent: default_user_agent(),
        }
    }
}

impl DetectionConfig {
    pub fn options(&self) -> DetectOptions {
        DetectOptions {
            include_parking: self.include_parking,
            timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            min_confidence: self.min_confidence,
            enhance_results: self.enhance_results,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeocodingConfig {
    #[serde(default = "default_api_url")]
    pub proxy_url: String,
    #[serde(default = "default_fallback_url")]
    pub fallback_url: String,
    #[serde(default = "default_geocode_limit")]
    pub limit: u32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            proxy_url: default_api_url(),
            fallback_url: default_fallback_url(),
            limit: default_geocode_limit(),
            user_agent: default_user_agent(),
            email: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackingConfig {
    /// Batch endpoint for committed fixes. Without it batches are only logged.
    #[serde(default)]
    pub sink_url: Option<String>,
    #[serde(default = "default_flush_interval", deserialize_with = "deserialize_duration")]
    pub flush_interval: Duration,
    /// Upper bound on a single batch write.
    #[serde(default = "default_sink_timeout", deserialize_with = "deserialize_duration")]
    pub sink_timeout: Duration,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            sink_url: None,
            flush_interval: default_flush_interval(),
            sink_timeout: default_sink_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettingsConfig {
    #[serde(default = "default_settings_dir")]
    pub dir: PathBuf,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            dir: default_settings_dir(),
        }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Durations that drive timers or bound requests must be at least 1 ms.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let durations = [
            ("detection.timeout", self.detection.timeout),
            ("tracking.flush_interval", self.tracking.flush_interval),
            ("tracking.sink_timeout", self.tracking.sink_timeout),
        ];
        for (name, value) in durations {
            if value < Duration::from_millis(1) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be at least 1ms, got {:?}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

fn default_api_url() -> String {
    "http://localhost:3001".to_string()
}

fn default_fallback_url() -> String {
    "https://nominatim.openstreetmap.org".to_string()
}

fn default_user_agent() -> String {
    concat!("asphalt-survey/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_detect_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_flush_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_sink_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_min_confidence() -> f64 {
    0.8
}

fn default_geocode_limit() -> u32 {
    5
}

fn default_settings_dir() -> PathBuf {
    PathBuf::from(".asphalt-survey")
}

fn default_true() -> bool {
    true
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(s.trim()).map_err(serde::de::Error::custom)
}

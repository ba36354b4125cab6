use serde::{Deserialize, Deserializer};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::predict::QualifierKind;
use crate::tle::{
    NameRetryPolicy, DEFAULT_BASE_URL, DEFAULT_BATCH_SIZE, DEFAULT_REFRESH_INTERVAL,
    DEFAULT_TIMEOUT,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub web: WebConfig,
    pub space_track: SpaceTrackConfig,
    pub tle: TleConfig,
    #[serde(default)]
    pub names: NamesConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub predict: PredictConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

#[derive(Clone, Deserialize)]
pub struct SpaceTrackConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub identity: String,
    pub password: String,
    #[serde(default = "default_timeout", deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
}

impl std::fmt::Debug for SpaceTrackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpaceTrackConfig")
            .field("base_url", &self.base_url)
            .field("identity", &self.identity)
            .field("password", &"***")
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

#[derive(Debug, Clone, Deserialize)]
pub struct TleConfig {
    #[serde(default = "default_cache_file")]
    pub cache_file: PathBuf,
    pub satellites: Vec<u32>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(
        default = "default_refresh_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub refresh_interval: Duration,
}

fn default_cache_file() -> PathBuf {
    PathBuf::from("tle_cache.txt")
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_refresh_interval() -> Duration {
    DEFAULT_REFRESH_INTERVAL
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamesConfig {
    #[serde(default = "default_map_file")]
    pub map_file: PathBuf,
    #[serde(default)]
    pub retry_failed: NameRetryPolicy,
}

impl Default for NamesConfig {
    fn default() -> Self {
        Self {
            map_file: default_map_file(),
            retry_failed: NameRetryPolicy::default(),
        }
    }
}

fn default_map_file() -> PathBuf {
    PathBuf::from("sat_names.json")
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_api_key_file")]
    pub api_key_file: PathBuf,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key_file: default_api_key_file(),
        }
    }
}

fn default_api_key_file() -> PathBuf {
    PathBuf::from("api_keys.txt")
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictConfig {
    /// Meaning of the trailing qualifier path parameter for this deployment
    #[serde(default)]
    pub qualifier: QualifierKind,
    #[serde(default)]
    pub horizon_deg: f64,
    #[serde(default = "default_max_days")]
    pub max_days: u32,
}

impl Default for PredictConfig {
    fn default() -> Self {
        Self {
            qualifier: QualifierKind::default(),
            horizon_deg: 0.0,
            max_days: default_max_days(),
        }
    }
}

fn default_max_days() -> u32 {
    30
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    pub fn from_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tle.batch_size == 0 {
            return Err(ConfigError::Invalid("tle.batch_size must be positive".into()));
        }
        if self.tle.refresh_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "tle.refresh_interval must be positive".into(),
            ));
        }
        if self.predict.max_days == 0 {
            return Err(ConfigError::Invalid("predict.max_days must be positive".into()));
        }
        Ok(())
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(s.trim()).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
space_track:
  identity: user@example.org
  password: hunter2
tle:
  satellites: [25544, 43017]
"#;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = Config::from_str(MINIMAL).unwrap();

        assert_eq!(config.web.bind, "0.0.0.0:8080");
        assert_eq!(config.space_track.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.space_track.timeout, Duration::from_secs(30));
        assert_eq!(config.tle.satellites, vec![25544, 43017]);
        assert_eq!(config.tle.batch_size, 50);
        assert_eq!(config.tle.refresh_interval, Duration::from_secs(7200));
        assert_eq!(config.names.retry_failed, NameRetryPolicy::OnReload);
        assert!(!config.auth.enabled);
        assert_eq!(config.predict.qualifier, QualifierKind::DurationMinutes);
    }

    #[test]
    fn full_config() {
        let yaml = r#"
web:
  bind: 127.0.0.1:9000
space_track:
  base_url: http://localhost:8081
  identity: u
  password: p
  timeout: 5s
tle:
  cache_file: /var/lib/satpass/tle.txt
  satellites: [1]
  batch_size: 10
  refresh_interval: 30m
names:
  map_file: names.json
  retry_failed: on_restart
auth:
  enabled: true
  api_key_file: keys.txt
predict:
  qualifier: max_elevation_degrees
  horizon_deg: 10
  max_days: 7
"#;
        let config = Config::from_str(yaml).unwrap();

        assert_eq!(config.space_track.timeout, Duration::from_secs(5));
        assert_eq!(config.tle.refresh_interval, Duration::from_secs(1800));
        assert_eq!(config.names.retry_failed, NameRetryPolicy::OnRestart);
        assert!(config.auth.enabled);
        assert_eq!(config.predict.qualifier, QualifierKind::MaxElevationDegrees);
        assert_eq!(config.predict.horizon_deg, 10.0);
    }

    #[test]
    fn password_is_not_debug_printed() {
        let config = Config::from_str(MINIMAL).unwrap();
        assert!(!format!("{:?}", config).contains("hunter2"));
    }

    #[test]
    fn rejects_zero_batch_size() {
        let yaml = MINIMAL.replace("satellites: [25544, 43017]", "satellites: []\n  batch_size: 0");
        assert!(matches!(Config::from_str(&yaml), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_bad_duration() {
        let yaml = format!("{}  refresh_interval: often\n", MINIMAL);
        assert!(matches!(Config::from_str(&yaml), Err(ConfigError::Yaml(_))));
    }
}

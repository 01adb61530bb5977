use crate::app_dirs::AppDirs;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const SESSION_MINUTES: RangeInclusive<u32> = 1..=180;
pub const TICK_RATE_MS: RangeInclusive<u64> = 10..=1000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: u64,
        max: u64,
        value: u64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Technique id practiced when none is given on the command line
    pub technique: String,
    pub session_minutes: u32,
    /// How often the screen refreshes and the session clock is sampled
    pub tick_rate_ms: u64,
    /// Extra techniques, a JSON array merged over the built-ins
    pub techniques_file: Option<PathBuf>,
    /// Keep stats in this JSON file instead of the SQLite database
    pub stats_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            technique: "box".to_string(),
            session_minutes: 5,
            tick_rate_ms: 100,
            techniques_file: None,
            stats_file: None,
        }
    }
}

/// Per-run replacements for stored settings, usually from the command line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub technique: Option<String>,
    pub session_minutes: Option<u32>,
    pub techniques_file: Option<PathBuf>,
    pub stats_file: Option<PathBuf>,
}

fn check_range<T: Into<u64> + Copy + PartialOrd>(
    field: &'static str,
    value: T,
    range: &RangeInclusive<T>,
) -> Result<(), ConfigError> {
    if range.contains(&value) {
        return Ok(());
    }
    Err(ConfigError::OutOfRange {
        field,
        min: (*range.start()).into(),
        max: (*range.end()).into(),
        value: value.into(),
    })
}

impl Config {
    pub fn session_target_ms(&self) -> u64 {
        self.session_minutes as u64 * 60_000
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_rate_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("session_minutes", self.session_minutes, &SESSION_MINUTES)?;
        check_range("tick_rate_ms", self.tick_rate_ms, &TICK_RATE_MS)
    }

    pub fn apply(mut self, overrides: &Overrides) -> Self {
        if let Some(t) = &overrides.technique {
            self.technique = t.clone();
        }
        if let Some(m) = overrides.session_minutes {
            self.session_minutes = m;
        }
        if let Some(p) = &overrides.techniques_file {
            self.techniques_file = Some(p.clone());
        }
        if let Some(p) = &overrides.stats_file {
            self.stats_file = Some(p.clone());
        }
        self
    }
}

pub trait ConfigStore {
    /// Never fails: a missing, unreadable or out-of-range config yields defaults
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> Result<(), ConfigError>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        let path = AppDirs::config_path().unwrap_or_else(|| PathBuf::from("exhale_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    fn read(&self) -> Result<Option<Config>, ConfigError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let cfg: Config = serde_json::from_slice(&bytes)?;
        cfg.validate()?;
        Ok(Some(cfg))
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        self.read()
            .unwrap_or_else(|e| {
                warn!("ignoring config {}: {e}", self.path.display());
                None
            })
            .unwrap_or_default()
    }

    fn save(&self, cfg: &Config) -> Result<(), ConfigError> {
        cfg.validate()?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(cfg)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::tempdir;

    #[test]
    fn save_creates_directories_and_reloads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config {
            technique: "478".into(),
            session_minutes: 12,
            tick_rate_ms: 250,
            techniques_file: Some(PathBuf::from("/tmp/techniques.json")),
            stats_file: Some(PathBuf::from("/tmp/stats.json")),
        };
        store.save(&cfg).unwrap();
        assert_eq!(store.load(), cfg);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"technique":"coherent"}"#).unwrap();

        let loaded = FileConfigStore::with_path(&path).load();
        assert_eq!(loaded.technique, "coherent");
        assert_eq!(loaded.session_minutes, 5);
        assert_eq!(loaded.session_target_ms(), 300_000);
        assert_eq!(loaded.tick_interval(), Duration::from_millis(100));
    }

    #[test]
    fn corrupt_missing_or_out_of_range_config_is_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        assert_eq!(FileConfigStore::with_path(&path).load(), Config::default());

        std::fs::write(&path, "{{{").unwrap();
        assert_eq!(FileConfigStore::with_path(&path).load(), Config::default());

        std::fs::write(&path, r#"{"session_minutes":0}"#).unwrap();
        assert_eq!(FileConfigStore::with_path(&path).load(), Config::default());
    }

    #[test]
    fn save_rejects_invalid_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let cfg = Config {
            tick_rate_ms: 5,
            ..Config::default()
        };

        assert_matches!(
            FileConfigStore::with_path(&path).save(&cfg),
            Err(ConfigError::OutOfRange {
                field: "tick_rate_ms",
                value: 5,
                ..
            })
        );
        assert!(!path.exists());
    }

    #[test]
    fn validate_bounds() {
        let long = Config {
            session_minutes: 181,
            ..Config::default()
        };
        assert_matches!(long.validate(), Err(ConfigError::OutOfRange { max: 180, .. }));
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn overrides_replace_only_given_fields() {
        let overrides = Overrides {
            technique: Some("power".into()),
            stats_file: Some(PathBuf::from("stats.json")),
            ..Overrides::default()
        };
        let cfg = Config::default().apply(&overrides);

        assert_eq!(cfg.technique, "power");
        assert_eq!(cfg.session_minutes, 5);
        assert_eq!(cfg.stats_file, Some(PathBuf::from("stats.json")));
        assert_eq!(cfg.techniques_file, None);
    }
}

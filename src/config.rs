use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;
use crate::error::ConfigError;
use crate::session::Mode;

pub const DEFAULT_DURATION_SECS: u32 = 60;
pub const DEFAULT_LIVES: u32 = 3;
pub const MAX_LIVES: u32 = 99;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }
}

/// Validated challenge parameters handed to the session at start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChallengeSettings {
    pub duration_secs: u32,
    pub lives: u32,
}

impl Default for ChallengeSettings {
    fn default() -> Self {
        Self {
            duration_secs: DEFAULT_DURATION_SECS,
            lives: DEFAULT_LIVES,
        }
    }
}

impl ChallengeSettings {
    /// Settings from stored numbers. Each invalid field falls back to its
    /// default on its own.
    pub fn validate(duration_secs: i64, lives: i64) -> Self {
        Self::or_defaults(check_duration(duration_secs), check_lives(lives))
    }

    /// Apply free-text overrides, e.g. from the command line. A missing
    /// field keeps the current value; an invalid one falls back to the
    /// default.
    pub fn with_overrides(self, duration: Option<&str>, lives: Option<&str>) -> Self {
        Self::or_defaults(
            duration.map_or(Ok(self.duration_secs), parse_duration),
            lives.map_or(Ok(self.lives), parse_lives),
        )
    }

    fn or_defaults(duration: Result<u32, ConfigError>, lives: Result<u32, ConfigError>) -> Self {
        let duration_secs = duration.unwrap_or_else(|err| {
            tracing::warn!("{err}; using {DEFAULT_DURATION_SECS}s");
            DEFAULT_DURATION_SECS
        });
        let lives = lives.unwrap_or_else(|err| {
            tracing::warn!("{err}; using {DEFAULT_LIVES} lives");
            DEFAULT_LIVES
        });
        Self {
            duration_secs,
            lives,
        }
    }
}

fn parse_duration(raw: &str) -> Result<u32, ConfigError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ConfigError::InvalidDuration(raw.to_string()))
        .and_then(check_duration)
}

fn parse_lives(raw: &str) -> Result<u32, ConfigError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ConfigError::InvalidLives(raw.to_string()))
        .and_then(check_lives)
}

fn check_duration(secs: i64) -> Result<u32, ConfigError> {
    u32::try_from(secs)
        .ok()
        .filter(|secs| *secs > 0)
        .ok_or_else(|| ConfigError::InvalidDuration(secs.to_string()))
}

fn check_lives(lives: i64) -> Result<u32, ConfigError> {
    u32::try_from(lives)
        .ok()
        .filter(|lives| (1..=MAX_LIVES).contains(lives))
        .ok_or_else(|| ConfigError::InvalidLives(lives.to_string()))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub mode: Mode,
    pub challenge_duration_secs: i64,
    pub challenge_lives: i64,
    pub theme: Theme,
    pub sound: bool,
    pub last_user: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: Mode::Beginner,
            challenge_duration_secs: DEFAULT_DURATION_SECS as i64,
            challenge_lives: DEFAULT_LIVES as i64,
            theme: Theme::Dark,
            sound: true,
            last_user: None,
        }
    }
}

impl Config {
    pub fn challenge_settings(&self) -> ChallengeSettings {
        ChallengeSettings::validate(self.challenge_duration_secs, self.challenge_lives)
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            path: AppDirs::config_path(),
        }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        match fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice::<Config>(&bytes).unwrap_or_else(|err| {
                tracing::warn!("ignoring unreadable config {}: {err}", self.path.display());
                Config::default()
            }),
            Err(_) => Config::default(),
        }
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::tempdir;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config::default();
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn save_and_load_custom_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config {
            mode: Mode::Challenge,
            challenge_duration_secs: 90,
            challenge_lives: 5,
            theme: Theme::Light,
            sound: false,
            last_user: Some("ana".into()),
        };
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn missing_or_garbled_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = FileConfigStore::with_path(&path);
        assert_eq!(store.load(), Config::default());

        fs::write(&path, b"{ not json").unwrap();
        assert_eq!(store.load(), Config::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, br#"{ "theme": "light" }"#).unwrap();

        let cfg = FileConfigStore::with_path(&path).load();
        assert_eq!(cfg.theme, Theme::Light);
        assert!(cfg.sound);
        assert_eq!(cfg.challenge_lives, 3);
    }

    #[test]
    fn check_rejects_out_of_range() {
        assert_matches!(check_duration(0), Err(ConfigError::InvalidDuration(_)));
        assert_matches!(check_duration(-5), Err(ConfigError::InvalidDuration(_)));
        assert_matches!(check_lives(-1), Err(ConfigError::InvalidLives(_)));
        assert_matches!(check_lives(0), Err(ConfigError::InvalidLives(_)));
        assert_matches!(check_lives(100), Err(ConfigError::InvalidLives(_)));
        assert_eq!(check_lives(99), Ok(99));
        assert_eq!(check_duration(30), Ok(30));
    }

    #[test]
    fn parse_rejects_non_numeric() {
        assert_matches!(parse_duration("soon"), Err(ConfigError::InvalidDuration(_)));
        assert_matches!(parse_lives("many"), Err(ConfigError::InvalidLives(_)));
        assert_eq!(parse_duration(" 45 "), Ok(45));
    }

    #[test]
    fn validate_falls_back_per_field() {
        assert_eq!(
            ChallengeSettings::validate(30, 1),
            ChallengeSettings {
                duration_secs: 30,
                lives: 1
            }
        );
        assert_eq!(
            ChallengeSettings::validate(0, 5),
            ChallengeSettings {
                duration_secs: 60,
                lives: 5
            }
        );
        assert_eq!(
            ChallengeSettings::validate(i64::MAX, i64::MIN),
            ChallengeSettings::default()
        );
    }

    #[test]
    fn lives_above_cap_fall_back() {
        assert_eq!(
            ChallengeSettings::default().with_overrides(None, Some("4000000000")),
            ChallengeSettings::default()
        );
        assert_eq!(ChallengeSettings::validate(60, 4_000_000_000).lives, 3);
        assert_eq!(
            ChallengeSettings::default()
                .with_overrides(None, Some("99"))
                .lives,
            MAX_LIVES
        );
    }

    #[test]
    fn overrides_fall_back_per_field() {
        let current = ChallengeSettings {
            duration_secs: 45,
            lives: 7,
        };
        assert_eq!(
            current.with_overrides(Some("abc"), Some("5")),
            ChallengeSettings {
                duration_secs: 60,
                lives: 5
            }
        );
        assert_eq!(
            current.with_overrides(Some("30"), Some("0")),
            ChallengeSettings {
                duration_secs: 30,
                lives: 3
            }
        );
        assert_eq!(current.with_overrides(None, None), current);
        assert_eq!(
            current.with_overrides(Some(""), Some("")),
            ChallengeSettings::default()
        );
    }

    #[test]
    fn config_challenge_settings_sanitizes_stored_values() {
        let cfg = Config {
            challenge_duration_secs: -10,
            challenge_lives: 7,
            ..Config::default()
        };
        assert_eq!(
            cfg.challenge_settings(),
            ChallengeSettings {
                duration_secs: 60,
                lives: 7
            }
        );
    }

    #[test]
    fn theme_toggles() {
        assert_eq!(Theme::Dark.toggled(), Theme::Light);
        assert_eq!(Theme::Light.toggled(), Theme::Dark);
    }
}

//! Application-level configuration loading: client timings, room limits and the theme list.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use rand::{Rng, seq::IndexedRandom};
use serde::Deserialize;
use serde_with::{DurationMilliSeconds, serde_as};
use tracing::{info, warn};

use crate::state::transitions::DEFAULT_THEME;

/// Default location on disk where the configuration is looked up.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "KANA_CLASH_CONFIG_PATH";

const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
const DEFAULT_ROOM_CODE_ATTEMPTS: u32 = 5;
const DEFAULT_LEAVE_ATTEMPTS: u32 = 5;
const DEFAULT_MAX_PLAYERS: usize = 4;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared by the client and the store host.
pub struct AppConfig {
    poll_interval: Duration,
    room_code_attempts: u32,
    leave_attempts: u32,
    max_players: usize,
    themes: Vec<String>,
}

impl AppConfig {
    /// Load the configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        themes = app_config.themes.len(),
                        poll_interval_ms = app_config.poll_interval.as_millis() as u64,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Override the reconciliation poll interval.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Interval of the reconciliation poll timer.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// How many random room codes are tried before giving up on creation.
    pub fn room_code_attempts(&self) -> u32 {
        self.room_code_attempts
    }

    /// How many times a leaving player retries the room repair after losing a race.
    pub fn leave_attempts(&self) -> u32 {
        self.leave_attempts
    }

    /// Seats per room.
    pub fn max_players(&self) -> usize {
        self.max_players
    }

    /// Suggested themes.
    pub fn themes(&self) -> &[String] {
        &self.themes
    }

    /// Pick a suggested theme at random; an empty list yields [`DEFAULT_THEME`].
    pub fn random_theme(&self, rng: &mut impl Rng) -> String {
        self.themes
            .choose(rng)
            .cloned()
            .unwrap_or_else(|| DEFAULT_THEME.to_string())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            room_code_attempts: DEFAULT_ROOM_CODE_ATTEMPTS,
            leave_attempts: DEFAULT_LEAVE_ATTEMPTS,
            max_players: DEFAULT_MAX_PLAYERS,
            themes: default_themes(),
        }
    }
}

#[serde_as]
#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
/// Every key is optional.
struct RawConfig {
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    poll_interval_ms: Option<Duration>,
    room_code_attempts: Option<u32>,
    leave_attempts: Option<u32>,
    max_players: Option<usize>,
    themes: Option<Vec<String>>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();
        Self {
            poll_interval: value
                .poll_interval_ms
                .filter(|interval| !interval.is_zero())
                .unwrap_or(defaults.poll_interval),
            room_code_attempts: value
                .room_code_attempts
                .filter(|attempts| *attempts > 0)
                .unwrap_or(defaults.room_code_attempts),
            leave_attempts: value
                .leave_attempts
                .filter(|attempts| *attempts > 0)
                .unwrap_or(defaults.leave_attempts),
            max_players: value
                .max_players
                .map(|max| max.clamp(2, DEFAULT_MAX_PLAYERS))
                .unwrap_or(defaults.max_players),
            themes: value
                .themes
                .map(|themes| {
                    themes
                        .into_iter()
                        .map(|theme| theme.trim().to_string())
                        .filter(|theme| !theme.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.themes),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in theme suggestions shipped with the binary.
fn default_themes() -> Vec<String> {
    [
        "動物",
        "食べ物",
        "国名",
        "スポーツ",
        "職業",
        "学校にあるもの",
        "キッチンにあるもの",
        "赤いもの",
        "4文字の言葉",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let raw: RawConfig = serde_json::from_str(r#"{ "poll_interval_ms": 500 }"#).unwrap();
        let config = AppConfig::from(raw);
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.room_code_attempts(), DEFAULT_ROOM_CODE_ATTEMPTS);
        assert_eq!(config.leave_attempts(), DEFAULT_LEAVE_ATTEMPTS);
        assert_eq!(config.max_players(), DEFAULT_MAX_PLAYERS);
        assert_eq!(config.themes().len(), default_themes().len());
    }

    #[test]
    fn max_players_cannot_exceed_four() {
        let raw: RawConfig = serde_json::from_str(r#"{ "max_players": 12 }"#).unwrap();
        assert_eq!(AppConfig::from(raw).max_players(), 4);
    }

    #[test]
    fn random_theme_comes_from_the_list() {
        let config = AppConfig::default();
        let mut rng = rand::rng();
        let theme = config.random_theme(&mut rng);
        assert!(config.themes().contains(&theme));

        let raw: RawConfig = serde_json::from_str(r#"{ "themes": ["  "] }"#).unwrap();
        let empty = AppConfig::from(raw);
        assert_eq!(empty.random_theme(&mut rng), DEFAULT_THEME);
    }
}

//! Environment-backed engine settings.
//!
//! | Variable | Default |
//! |---|---|
//! | `FIVETOOLS_DATA_PATH` | unset |
//! | `CHARBLDR_ALLOWED_SOURCES` | `PHB` |
//! | `CHARBLDR_DEFAULT_LANGUAGES` | `Common` |
//! | `CHARBLDR_REFRESH_WINDOW_MS` | `50` |
//! | `CHARBLDR_APPLY_OVERRIDES` | `true` |

use std::path::PathBuf;
use std::time::Duration;

use charbldr_domain::Character;
use thiserror::Error;

pub const FIVETOOLS_DATA_PATH: &str = "FIVETOOLS_DATA_PATH";
pub const ALLOWED_SOURCES: &str = "CHARBLDR_ALLOWED_SOURCES";
pub const DEFAULT_LANGUAGES: &str = "CHARBLDR_DEFAULT_LANGUAGES";
pub const REFRESH_WINDOW_MS: &str = "CHARBLDR_REFRESH_WINDOW_MS";
pub const APPLY_OVERRIDES: &str = "CHARBLDR_APPLY_OVERRIDES";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("{variable} must be a non-negative integer, got {value:?}")]
    InvalidNumber { variable: &'static str, value: String },
    #[error("{variable} must be true or false, got {value:?}")]
    InvalidBool { variable: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub fivetools_data_path: Option<PathBuf>,
    pub allowed_sources: Vec<String>,
    pub default_languages: Vec<String>,
    pub refresh_window: Duration,
    pub apply_overrides: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            fivetools_data_path: None,
            allowed_sources: vec!["PHB".to_string()],
            default_languages: vec!["Common".to_string()],
            refresh_window: Duration::from_millis(50),
            apply_overrides: true,
        }
    }
}

impl EngineSettings {
    /// Reads settings from the process environment.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`; missing or blank values take defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let refresh_window = match get(REFRESH_WINDOW_MS) {
            Some(raw) => Duration::from_millis(raw.parse::<u64>().map_err(|_| {
                SettingsError::InvalidNumber {
                    variable: REFRESH_WINDOW_MS,
                    value: raw.clone(),
                }
            })?),
            None => defaults.refresh_window,
        };

        let apply_overrides = match get(APPLY_OVERRIDES) {
            Some(raw) => parse_bool(&raw).ok_or(SettingsError::InvalidBool {
                variable: APPLY_OVERRIDES,
                value: raw,
            })?,
            None => defaults.apply_overrides,
        };

        Ok(Self {
            fivetools_data_path: get(FIVETOOLS_DATA_PATH).map(PathBuf::from),
            allowed_sources: get(ALLOWED_SOURCES)
                .map(|raw| split_list(&raw))
                .unwrap_or(defaults.allowed_sources),
            default_languages: get(DEFAULT_LANGUAGES)
                .map(|raw| split_list(&raw))
                .unwrap_or(defaults.default_languages),
            refresh_window,
            apply_overrides,
        })
    }

    /// A fresh character carrying the configured defaults.
    pub fn new_character(&self) -> Character {
        Character::with_defaults(&self.default_languages, &self.allowed_sources)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

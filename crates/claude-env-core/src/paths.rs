//! Locations of the profile store and the settings file.
//!
//! Each path is resolved independently, first match wins:
//!
//! 1. an explicit path passed by the caller
//! 2. the override environment variable ([`CONFIG_PATH_ENV`], [`SETTINGS_PATH_ENV`])
//! 3. the default under `~/.claude/`

use std::env;
use std::path::PathBuf;

use thiserror::Error;

/// Overrides the profile store location.
pub const CONFIG_PATH_ENV: &str = "CLAUDE_ENV_MANAGER_CONFIG";
/// Overrides the settings file location.
pub const SETTINGS_PATH_ENV: &str = "CLAUDE_ENV_MANAGER_SETTINGS";

pub const CLAUDE_DIR_NAME: &str = ".claude";
pub const DEFAULT_CONFIG_FILE: &str = "claude-profiles.yml";
pub const DEFAULT_SETTINGS_FILE: &str = "settings.json";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Home directory not set (checked HOME and USERPROFILE)")]
pub struct HomeDirError;

/// Return the user's home directory path.
///
/// Uses HOME on Unix-like systems and USERPROFILE on Windows.
pub fn get_home_dir() -> Result<PathBuf, HomeDirError> {
    home_dir_with(|key| env::var(key).ok())
}

/// Return `~/.claude`.
pub fn claude_dir() -> Result<PathBuf, HomeDirError> {
    Ok(get_home_dir()?.join(CLAUDE_DIR_NAME))
}

fn home_dir_with(lookup: impl Fn(&str) -> Option<String>) -> Result<PathBuf, HomeDirError> {
    ["HOME", "USERPROFILE"]
        .into_iter()
        .filter_map(|key| lookup(key))
        .find(|value| !value.is_empty())
        .map(PathBuf::from)
        .ok_or(HomeDirError)
}

/// The pair of files the engine operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    /// Profile store (YAML).
    pub config_file: PathBuf,
    /// Settings file consumed by the Claude CLI (JSON).
    pub settings_file: PathBuf,
}

impl StorePaths {
    /// Both paths given explicitly; no environment lookup happens.
    pub fn new(config_file: impl Into<PathBuf>, settings_file: impl Into<PathBuf>) -> Self {
        Self {
            config_file: config_file.into(),
            settings_file: settings_file.into(),
        }
    }

    /// Resolve both paths against the process environment.
    pub fn resolve(
        explicit_config: Option<PathBuf>,
        explicit_settings: Option<PathBuf>,
    ) -> Result<Self, HomeDirError> {
        Self::resolve_with(explicit_config, explicit_settings, |key| env::var(key).ok())
    }

    /// Resolve both paths using `lookup` in place of the process environment.
    ///
    /// The home directory is only required when at least one path falls
    /// through to its default.
    pub fn resolve_with(
        explicit_config: Option<PathBuf>,
        explicit_settings: Option<PathBuf>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, HomeDirError> {
        let from_env = |key: &str| lookup(key).filter(|v| !v.is_empty()).map(PathBuf::from);

        let config_file = explicit_config.or_else(|| from_env(CONFIG_PATH_ENV));
        let settings_file = explicit_settings.or_else(|| from_env(SETTINGS_PATH_ENV));

        let default_in_claude_dir = |file: &str| -> Result<PathBuf, HomeDirError> {
            Ok(home_dir_with(&lookup)?.join(CLAUDE_DIR_NAME).join(file))
        };

        let config_file = match config_file {
            Some(path) => path,
            None => default_in_claude_dir(DEFAULT_CONFIG_FILE)?,
        };
        let settings_file = match settings_file {
            Some(path) => path,
            None => default_in_claude_dir(DEFAULT_SETTINGS_FILE)?,
        };

        Ok(Self {
            config_file,
            settings_file,
        })
    }
}

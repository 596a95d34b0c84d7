//! Typed load/save of the profile store and the settings file.
//!
//! [`ConfigStore`] owns the resolved [`StorePaths`] and a cache of the last
//! document loaded or saved through it. The cache is write-through: after a
//! successful save it holds exactly the value that was written. It is only
//! dropped by [`ConfigStore::clear_cache`] or when a file is replaced behind
//! its back (settings restore).
//!
//! Load methods hand out clones, so callers mutate their own copy and the
//! cache only changes when a save succeeds.
//!
//! # Backup retention
//!
//! Every save first backs up the file it replaces, then prunes backups down
//! to [`StoreOptions::backup_retention`]. Backup and write failures fail the
//! save. Pruning is the one I/O step that does not: it runs after the new
//! content is on disk, so a failed prune is logged with `log::warn!` and the
//! save still reports success. The only effect is extra backups left behind
//! until the next successful prune.

use std::path::{Path, PathBuf};

use thiserror::Error;

use super::io::{self, FileError};
use super::types::{ClaudeSettings, ProfileConfig};
use crate::paths::StorePaths;

/// Number of backups kept per file unless configured otherwise.
pub const DEFAULT_BACKUP_RETENTION: usize = 5;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    File(#[from] FileError),

    #[error("Invalid {format} in {}: {message}", .path.display())]
    Parse {
        path: PathBuf,
        format: &'static str,
        message: String,
    },

    #[error("Failed to serialize {what}: {message}")]
    Serialize { what: &'static str, message: String },

    #[error("Settings file not found: {}", .0.display())]
    SettingsMissing(PathBuf),
}

/// Tunables for the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// How many backups to keep per file. `None` keeps every backup.
    pub backup_retention: Option<usize>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            backup_retention: Some(DEFAULT_BACKUP_RETENTION),
        }
    }
}

#[derive(Debug, Default)]
struct StoreCache {
    config: Option<ProfileConfig>,
    settings: Option<ClaudeSettings>,
}

/// File-backed store for profiles and settings with an in-memory cache.
#[derive(Debug)]
pub struct ConfigStore {
    paths: StorePaths,
    options: StoreOptions,
    cache: StoreCache,
}

impl ConfigStore {
    pub fn new(paths: StorePaths) -> Self {
        Self::with_options(paths, StoreOptions::default())
    }

    pub fn with_options(paths: StorePaths, options: StoreOptions) -> Self {
        Self {
            paths,
            options,
            cache: StoreCache::default(),
        }
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Drop both cached documents; the next load reads from disk.
    pub fn clear_cache(&mut self) {
        self.cache = StoreCache::default();
    }

    // ========================================================================
    // Profile store
    // ========================================================================

    /// Load the profile store.
    ///
    /// A missing or empty file is an empty [`ProfileConfig`], not an error.
    pub fn load_config(&mut self) -> Result<ProfileConfig, StoreError> {
        if let Some(config) = &self.cache.config {
            return Ok(config.clone());
        }

        let path = &self.paths.config_file;
        let config = match io::read_file(path)? {
            None => {
                log::debug!("No profile store at {}, starting empty", path.display());
                ProfileConfig::default()
            }
            Some(contents) if contents.trim().is_empty() => ProfileConfig::default(),
            Some(contents) => parse_config(path, &contents)?,
        };

        log::info!(
            "Loaded {} profile(s) from {}",
            config.profiles.len(),
            path.display()
        );
        self.cache.config = Some(config.clone());
        Ok(config)
    }

    /// Back up, write, and cache the profile store.
    ///
    /// On failure the cache keeps its previous value.
    pub fn save_config(&mut self, config: &ProfileConfig) -> Result<(), StoreError> {
        let contents = serde_yaml_ng::to_string(config).map_err(|e| StoreError::Serialize {
            what: "profile store",
            message: e.to_string(),
        })?;

        let path = self.paths.config_file.clone();
        self.write_with_backup(&path, &contents)?;

        log::info!(
            "Saved {} profile(s) to {}",
            config.profiles.len(),
            path.display()
        );
        self.cache.config = Some(config.clone());
        Ok(())
    }

    // ========================================================================
    // Settings file
    // ========================================================================

    /// Whether the settings file exists on disk.
    pub fn settings_exist(&self) -> bool {
        self.paths.settings_file.is_file()
    }

    /// Load the settings file.
    ///
    /// The settings file is owned by the Claude CLI, so unlike the profile
    /// store a missing file is an error.
    pub fn load_settings(&mut self) -> Result<ClaudeSettings, StoreError> {
        if let Some(settings) = &self.cache.settings {
            return Ok(settings.clone());
        }

        let path = &self.paths.settings_file;
        let contents =
            io::read_file(path)?.ok_or_else(|| StoreError::SettingsMissing(path.clone()))?;

        let settings: ClaudeSettings =
            serde_json::from_str(&contents).map_err(|e| StoreError::Parse {
                path: path.clone(),
                format: "JSON",
                message: e.to_string(),
            })?;

        log::debug!("Loaded settings from {}", path.display());
        self.cache.settings = Some(settings.clone());
        Ok(settings)
    }

    /// Back up, write, and cache the settings file.
    pub fn save_settings(&mut self, settings: &ClaudeSettings) -> Result<(), StoreError> {
        let mut contents =
            serde_json::to_string_pretty(settings).map_err(|e| StoreError::Serialize {
                what: "settings",
                message: e.to_string(),
            })?;
        contents.push('\n');

        let path = self.paths.settings_file.clone();
        self.write_with_backup(&path, &contents)?;

        log::info!("Saved settings to {}", path.display());
        self.cache.settings = Some(settings.clone());
        Ok(())
    }

    /// Replace the settings file with its newest backup.
    ///
    /// Returns `false` if there was no backup to restore.
    pub fn restore_settings_backup(&mut self) -> Result<bool, StoreError> {
        let restored = io::restore_latest_backup(&self.paths.settings_file)?;
        if restored.is_some() {
            self.cache.settings = None;
        }
        Ok(restored.is_some())
    }

    /// Backup, write, then prune. See the module docs for why a failed prune
    /// does not fail the save.
    fn write_with_backup(&self, path: &Path, contents: &str) -> Result<(), StoreError> {
        io::backup(path)?;
        io::write_atomic(path, contents)?;

        if let Some(keep) = self.options.backup_retention {
            if let Err(e) = io::prune_backups(path, keep) {
                log::warn!("Failed to prune backups of {}: {}", path.display(), e);
            }
        }

        Ok(())
    }
}

fn parse_config(path: &Path, contents: &str) -> Result<ProfileConfig, StoreError> {
    let parse_error = |message: String| StoreError::Parse {
        path: path.to_path_buf(),
        format: "YAML",
        message,
    };

    let config: ProfileConfig =
        serde_yaml_ng::from_str(contents).map_err(|e| parse_error(e.to_string()))?;
    config.check_integrity().map_err(parse_error)?;

    Ok(config)
}

// ============================================================================
// TESTS
// ============================================================================

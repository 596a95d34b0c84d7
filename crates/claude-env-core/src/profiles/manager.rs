//! ProfileManager - every profile operation the frontends are allowed to call.
//!
//! Each write follows the same sequence: load a copy of the profile store,
//! validate, mutate the copy, save. The store only updates its cache when
//! the save succeeds, so a failed write never leaves the cache ahead of the
//! file on disk.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::paths::{HomeDirError, StorePaths};
use crate::persistence::io::FileError;
use crate::persistence::store::{ConfigStore, StoreError};
use crate::persistence::types::{ClaudeSettings, EnvMap, EnvironmentProfile};
use crate::validation::{
    validate_description, validate_environment_vars, validate_profile_name, ValidationError,
    ValidationMode,
};

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Profile '{0}' not found")]
    NotFound(String),

    #[error("Profile '{0}' already exists")]
    AlreadyExists(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A store or settings file that could not be parsed.
    #[error("Invalid {format} in {}: {message}", .path.display())]
    InvalidFile {
        path: PathBuf,
        format: &'static str,
        message: String,
    },

    #[error(transparent)]
    FileOperation(#[from] FileError),

    #[error("Settings file not found: {}", .0.display())]
    SettingsMissing(PathBuf),
}

/// Coarse classification of a [`ProfileError`], one per distinct outcome a
/// frontend should report (e.g. one exit code each).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    ValidationFailed,
    Configuration,
    FileOperation,
}

impl ProfileError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProfileError::NotFound(_) => ErrorKind::NotFound,
            ProfileError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            ProfileError::Validation(_) => ErrorKind::ValidationFailed,
            ProfileError::Configuration(_) | ProfileError::InvalidFile { .. } => {
                ErrorKind::Configuration
            }
            ProfileError::FileOperation(_) | ProfileError::SettingsMissing(_) => {
                ErrorKind::FileOperation
            }
        }
    }
}

impl From<StoreError> for ProfileError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::File(e) => ProfileError::FileOperation(e),
            StoreError::SettingsMissing(path) => ProfileError::SettingsMissing(path),
            StoreError::Parse {
                path,
                format,
                message,
            } => ProfileError::InvalidFile {
                path,
                format,
                message,
            },
            e @ StoreError::Serialize { .. } => ProfileError::Configuration(e.to_string()),
        }
    }
}

impl From<HomeDirError> for ProfileError {
    fn from(e: HomeDirError) -> Self {
        ProfileError::Configuration(e.to_string())
    }
}

/// Source of "now" for profile timestamps.
pub type Clock = fn() -> DateTime<Utc>;

/// Manages the profile collection and applies profiles to the settings file.
///
/// Frontends (CLI, TUI) create one ProfileManager per process and call
/// into it; it holds the only cache of the on-disk documents.
pub struct ProfileManager {
    store: ConfigStore,
    clock: Clock,
}

impl ProfileManager {
    pub fn new(store: ConfigStore) -> Self {
        Self {
            store,
            clock: Utc::now,
        }
    }

    /// Manager over paths resolved from explicit overrides, the environment,
    /// and the `~/.claude` defaults.
    pub fn from_env(
        config_file: Option<PathBuf>,
        settings_file: Option<PathBuf>,
    ) -> Result<Self, ProfileError> {
        let paths = StorePaths::resolve(config_file, settings_file)?;
        log::debug!(
            "Using profile store {} and settings {}",
            paths.config_file.display(),
            paths.settings_file.display()
        );
        Ok(Self::new(ConfigStore::new(paths)))
    }

    /// Replace the timestamp source.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn config_path(&self) -> &Path {
        &self.store.paths().config_file
    }

    pub fn settings_path(&self) -> &Path {
        &self.store.paths().settings_file
    }

    /// Forget cached documents, e.g. after the files were edited externally.
    pub fn clear_cache(&mut self) {
        self.store.clear_cache();
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// All profiles in store order.
    pub fn list(&mut self) -> Result<Vec<EnvironmentProfile>, ProfileError> {
        Ok(self.store.load_config()?.profiles)
    }

    /// Look up a profile by name.
    pub fn get(&mut self, name: &str) -> Result<EnvironmentProfile, ProfileError> {
        self.store
            .load_config()?
            .find(name)
            .cloned()
            .ok_or_else(|| ProfileError::NotFound(name.to_string()))
    }

    pub fn default_profile_name(&mut self) -> Result<Option<String>, ProfileError> {
        Ok(self.store.load_config()?.default_profile)
    }

    /// Name of the first profile whose env is exactly the settings env.
    ///
    /// A settings env holding non-string values matches no profile.
    pub fn current_profile_name(&mut self) -> Result<Option<String>, ProfileError> {
        let settings = self.store.load_settings()?;
        let Some(env) = settings.env() else {
            log::debug!("Settings env has non-string values, no profile matches");
            return Ok(None);
        };
        let config = self.store.load_config()?;

        Ok(config
            .profiles
            .into_iter()
            .find(|p| p.env == env)
            .map(|p| p.name))
    }

    /// The settings document as currently stored.
    pub fn current_settings(&mut self) -> Result<ClaudeSettings, ProfileError> {
        Ok(self.store.load_settings()?)
    }

    pub fn settings_exist(&self) -> bool {
        self.store.settings_exist()
    }

    /// Re-run full validation on a stored profile.
    ///
    /// Returns `Ok(false)` when the profile exists but fails validation; use
    /// [`ProfileManager::check`] to get the failing rule.
    pub fn validate(&mut self, name: &str) -> Result<bool, ProfileError> {
        match self.check(name) {
            Ok(()) => Ok(true),
            Err(ProfileError::Validation(e)) => {
                log::warn!("Profile '{}' failed validation: {}", name, e);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Like [`ProfileManager::validate`], but reports the failing rule as a
    /// [`ProfileError::Validation`].
    pub fn check(&mut self, name: &str) -> Result<(), ProfileError> {
        let profile = self.get(name)?;
        validate_environment_vars(&profile.env, ValidationMode::Full)?;
        Ok(())
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Create a profile from a complete env map.
    ///
    /// The first profile in an empty store also becomes the default.
    pub fn create(
        &mut self,
        name: &str,
        env: EnvMap,
        description: Option<String>,
    ) -> Result<EnvironmentProfile, ProfileError> {
        validate_profile_name(name)?;

        let mut config = self.store.load_config()?;
        if config.contains(name) {
            return Err(ProfileError::AlreadyExists(name.to_string()));
        }

        validate_environment_vars(&env, ValidationMode::Full)?;
        let description = normalize_description(description)?;

        let profile = EnvironmentProfile::new(name.to_string(), env, description, (self.clock)());
        config.profiles.push(profile.clone());
        if config.default_profile.is_none() && config.profiles.len() == 1 {
            config.default_profile = Some(name.to_string());
        }

        self.store.save_config(&config)?;
        log::info!("Created profile '{}'", name);
        Ok(profile)
    }

    /// Merge `env` into a profile and/or replace its description.
    ///
    /// Only the supplied keys are validated; keys not mentioned keep their
    /// values. `modified` always moves forward, even when nothing else
    /// changes.
    pub fn update(
        &mut self,
        name: &str,
        env: Option<EnvMap>,
        description: Option<String>,
    ) -> Result<EnvironmentProfile, ProfileError> {
        let mut config = self.store.load_config()?;
        let now = (self.clock)();

        let profile = config
            .find_mut(name)
            .ok_or_else(|| ProfileError::NotFound(name.to_string()))?;

        if let Some(env) = &env {
            validate_environment_vars(env, ValidationMode::Partial)?;
        }
        let description_changed = description.is_some();
        let description = normalize_description(description)?;

        if let Some(env) = env {
            profile.merge_env(env);
        }
        if description_changed {
            profile.description = description;
        }
        profile.touch(now);

        let updated = profile.clone();
        self.store.save_config(&config)?;
        log::info!("Updated profile '{}'", name);
        Ok(updated)
    }

    /// Delete a profile, clearing the default if it pointed at it.
    pub fn delete(&mut self, name: &str) -> Result<bool, ProfileError> {
        let mut config = self.store.load_config()?;
        config
            .remove(name)
            .ok_or_else(|| ProfileError::NotFound(name.to_string()))?;

        self.store.save_config(&config)?;
        log::info!("Deleted profile '{}'", name);
        Ok(true)
    }

    pub fn set_default_profile_name(&mut self, name: &str) -> Result<(), ProfileError> {
        let mut config = self.store.load_config()?;
        if !config.contains(name) {
            return Err(ProfileError::NotFound(name.to_string()));
        }

        config.default_profile = Some(name.to_string());
        self.store.save_config(&config)?;
        log::info!("Default profile set to '{}'", name);
        Ok(())
    }

    /// Replace the settings `env` with the profile's env.
    ///
    /// Whatever the old `env` held (including non-string values) is dropped.
    /// Every other key is written back unchanged and in its original order,
    /// and the previous file is backed up first.
    pub fn apply(&mut self, name: &str) -> Result<bool, ProfileError> {
        let profile = self.get(name)?;
        let mut settings = self.store.load_settings()?;

        settings.set_env(&profile.env);
        self.store.save_settings(&settings)?;

        log::info!(
            "Applied profile '{}' to {}",
            name,
            self.settings_path().display()
        );
        Ok(true)
    }

    /// Put the newest settings backup back in place.
    ///
    /// Returns `false` if no backup exists.
    pub fn restore_settings_backup(&mut self) -> Result<bool, ProfileError> {
        Ok(self.store.restore_settings_backup()?)
    }
}

/// Blank descriptions are stored as absent.
fn normalize_description(description: Option<String>) -> Result<Option<String>, ProfileError> {
    match description {
        Some(d) if d.trim().is_empty() => Ok(None),
        Some(d) => {
            validate_description(&d)?;
            Ok(Some(d))
        }
        None => Ok(None),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::io;
    use crate::validation::{
        ValidationRule, API_KEY_VAR, BASE_URL_VAR, FAST_MODEL_VAR, MODEL_VAR,
    };
    use chrono::TimeZone;
    use serde_json::json;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn make_manager(dir: &TempDir) -> ProfileManager {
        ProfileManager::new(ConfigStore::new(StorePaths::new(
            dir.path().join("claude-profiles.yml"),
            dir.path().join("settings.json"),
        )))
    }

    fn dev_env() -> EnvMap {
        [
            (BASE_URL_VAR, "https://api.x.com"),
            (API_KEY_VAR, "sk-abc123456789012345"),
            (MODEL_VAR, "m-1"),
            (FAST_MODEL_VAR, "m-2"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn env_of(pairs: &[(&str, &str)]) -> EnvMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn write_settings(dir: &TempDir, value: serde_json::Value) {
        fs::write(
            dir.path().join("settings.json"),
            serde_json::to_string_pretty(&value).unwrap(),
        )
        .unwrap();
    }

    fn read_settings(dir: &TempDir) -> serde_json::Value {
        serde_json::from_str(&fs::read_to_string(dir.path().join("settings.json")).unwrap())
            .unwrap()
    }

    fn frozen_clock() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    mod create_and_get {
        use super::*;

        #[test]
        fn create_then_get_returns_input() {
            let dir = tempdir().unwrap();
            let mut manager = make_manager(&dir);

            let created = manager
                .create("dev", dev_env(), Some("Development".to_string()))
                .unwrap();
            let fetched = manager.get("dev").unwrap();

            assert_eq!(fetched, created);
            assert_eq!(fetched.name, "dev");
            assert_eq!(fetched.env, dev_env());
            assert_eq!(fetched.description.as_deref(), Some("Development"));
            assert_eq!(fetched.created, fetched.modified);
        }

        #[test]
        fn created_profile_survives_reload() {
            let dir = tempdir().unwrap();
            let mut manager = make_manager(&dir);
            let created = manager.create("dev", dev_env(), None).unwrap();

            let mut fresh = make_manager(&dir);
            assert_eq!(fresh.get("dev").unwrap(), created);
        }

        #[test]
        fn duplicate_name_is_already_exists() {
            let dir = tempdir().unwrap();
            let mut manager = make_manager(&dir);
            manager.create("dev", dev_env(), None).unwrap();

            let err = manager.create("dev", dev_env(), None).unwrap_err();
            assert!(matches!(err, ProfileError::AlreadyExists(ref n) if n == "dev"));
            assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        }

        #[test]
        fn create_requires_full_env() {
            let dir = tempdir().unwrap();
            let mut manager = make_manager(&dir);
            let mut env = dev_env();
            env.remove(FAST_MODEL_VAR);

            let err = manager.create("dev", env, None).unwrap_err();
            match err {
                ProfileError::Validation(e) => {
                    assert_eq!(e.rule, ValidationRule::MissingKey);
                    assert_eq!(e.field, FAST_MODEL_VAR);
                }
                other => panic!("Expected validation error, got {other:?}"),
            }
            assert!(manager.list().unwrap().is_empty());
        }

        #[test]
        fn create_rejects_bad_name() {
            let dir = tempdir().unwrap();
            let mut manager = make_manager(&dir);

            let err = manager.create("dev@home", dev_env(), None).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ValidationFailed);
        }

        #[test]
        fn create_rejects_bad_model_name() {
            let dir = tempdir().unwrap();
            let mut manager = make_manager(&dir);
            let mut env = dev_env();
            env.insert(MODEL_VAR.to_string(), "claude@3".to_string());

            let err = manager.create("dev", env, None).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ValidationFailed);
        }

        #[test]
        fn blank_description_is_stored_as_none() {
            let dir = tempdir().unwrap();
            let mut manager = make_manager(&dir);

            let created = manager.create("dev", dev_env(), Some("  ".to_string())).unwrap();
            assert_eq!(created.description, None);
        }

        #[test]
        fn get_missing_is_not_found() {
            let dir = tempdir().unwrap();
            let mut manager = make_manager(&dir);

            let err = manager.get("ghost").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotFound);
            assert!(err.to_string().contains("ghost"));
        }

        #[test]
        fn list_keeps_insertion_order() {
            let dir = tempdir().unwrap();
            let mut manager = make_manager(&dir);
            for name in ["zeta", "alpha", "mid"] {
                manager.create(name, dev_env(), None).unwrap();
            }

            let names: Vec<String> = manager.list().unwrap().into_iter().map(|p| p.name).collect();
            assert_eq!(names, ["zeta", "alpha", "mid"]);
        }

        #[test]
        fn first_profile_becomes_default() {
            let dir = tempdir().unwrap();
            let mut manager = make_manager(&dir);
            manager.create("dev", dev_env(), None).unwrap();
            manager.create("prod", dev_env(), None).unwrap();

            assert_eq!(manager.default_profile_name().unwrap().as_deref(), Some("dev"));
        }
    }

    mod update {
        use super::*;

        #[test]
        fn partial_env_keeps_other_keys() {
            let dir = tempdir().unwrap();
            let mut manager = make_manager(&dir);
            manager.create("dev", dev_env(), None).unwrap();

            let updated = manager
                .update("dev", Some(env_of(&[(MODEL_VAR, "m-3")])), None)
                .unwrap();

            assert_eq!(updated.env[MODEL_VAR], "m-3");
            assert_eq!(updated.env[FAST_MODEL_VAR], "m-2");
            assert_eq!(updated.env[API_KEY_VAR], "sk-abc123456789012345");
            assert_eq!(updated.env[BASE_URL_VAR], "https://api.x.com");
            assert_eq!(manager.get("dev").unwrap(), updated);
        }

        #[test]
        fn partial_env_is_still_validated() {
            let dir = tempdir().unwrap();
            let mut manager = make_manager(&dir);
            manager.create("dev", dev_env(), None).unwrap();

            let err = manager
                .update("dev", Some(env_of(&[(BASE_URL_VAR, "ftp://nope")])), None)
                .unwrap_err();

            assert_eq!(err.kind(), ErrorKind::ValidationFailed);
            assert_eq!(manager.get("dev").unwrap().env, dev_env());
        }

        #[test]
        fn extra_keys_can_be_added() {
            let dir = tempdir().unwrap();
            let mut manager = make_manager(&dir);
            manager.create("dev", dev_env(), None).unwrap();

            let updated = manager
                .update("dev", Some(env_of(&[("API_TIMEOUT_MS", "600000")])), None)
                .unwrap();

            assert_eq!(updated.env.len(), 5);
        }

        #[test]
        fn description_only_replaced_when_supplied() {
            let dir = tempdir().unwrap();
            let mut manager = make_manager(&dir);
            manager
                .create("dev", dev_env(), Some("first".to_string()))
                .unwrap();

            let kept = manager.update("dev", None, None).unwrap();
            assert_eq!(kept.description.as_deref(), Some("first"));

            let replaced = manager
                .update("dev", None, Some("second".to_string()))
                .unwrap();
            assert_eq!(replaced.description.as_deref(), Some("second"));

            let cleared = manager.update("dev", None, Some(String::new())).unwrap();
            assert_eq!(cleared.description, None);
        }

        #[test]
        fn modified_strictly_increases_in_quick_succession() {
            let dir = tempdir().unwrap();
            let mut manager = make_manager(&dir);
            let created = manager.create("dev", dev_env(), None).unwrap();

            let first = manager.update("dev", None, None).unwrap();
            let second = manager.update("dev", None, None).unwrap();

            assert!(first.modified > created.modified);
            assert!(second.modified > first.modified);
            assert_eq!(second.created, created.created);
        }

        #[test]
        fn modified_increases_with_a_frozen_clock() {
            let dir = tempdir().unwrap();
            let mut manager = make_manager(&dir).with_clock(frozen_clock);
            let created = manager.create("dev", dev_env(), None).unwrap();

            let first = manager.update("dev", None, None).unwrap();
            let second = manager.update("dev", None, None).unwrap();

            assert_eq!(created.modified, frozen_clock());
            assert!(first.modified > created.modified);
            assert!(second.modified > first.modified);

            // Survives a round trip through the YAML file.
            manager.clear_cache();
            assert_eq!(manager.get("dev").unwrap().modified, second.modified);
        }

        #[test]
        fn update_missing_is_not_found() {
            let dir = tempdir().unwrap();
            let mut manager = make_manager(&dir);

            let err = manager
                .update("ghost", Some(env_of(&[(MODEL_VAR, "m-3")])), None)
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotFound);
        }
    }

    mod delete {
        use super::*;

        #[test]
        fn delete_removes_profile() {
            let dir = tempdir().unwrap();
            let mut manager = make_manager(&dir);
            manager.create("dev", dev_env(), None).unwrap();

            assert!(manager.delete("dev").unwrap());
            assert_eq!(manager.get("dev").unwrap_err().kind(), ErrorKind::NotFound);
        }

        #[test]
        fn delete_missing_is_not_found() {
            let dir = tempdir().unwrap();
            let mut manager = make_manager(&dir);

            let err = manager.delete("ghost").unwrap_err();
            assert!(matches!(err, ProfileError::NotFound(_)));
        }

        #[test]
        fn deleting_default_clears_it() {
            let dir = tempdir().unwrap();
            let mut manager = make_manager(&dir);
            manager.create("dev", dev_env(), None).unwrap();
            manager.create("prod", dev_env(), None).unwrap();
            manager.set_default_profile_name("prod").unwrap();

            manager.delete("prod").unwrap();

            assert_eq!(manager.default_profile_name().unwrap(), None);
            manager.clear_cache();
            assert_eq!(manager.default_profile_name().unwrap(), None);
        }

        #[test]
        fn deleting_other_profile_keeps_default() {
            let dir = tempdir().unwrap();
            let mut manager = make_manager(&dir);
            manager.create("dev", dev_env(), None).unwrap();
            manager.create("prod", dev_env(), None).unwrap();

            manager.delete("prod").unwrap();
            assert_eq!(manager.default_profile_name().unwrap().as_deref(), Some("dev"));
        }
    }

    mod default_profile {
        use super::*;

        #[test]
        fn set_and_get_default() {
            let dir = tempdir().unwrap();
            let mut manager = make_manager(&dir);
            manager.create("dev", dev_env(), None).unwrap();
            manager.create("prod", dev_env(), None).unwrap();

            manager.set_default_profile_name("prod").unwrap();

            assert_eq!(manager.default_profile_name().unwrap().as_deref(), Some("prod"));
        }

        #[test]
        fn set_unknown_default_is_not_found() {
            let dir = tempdir().unwrap();
            let mut manager = make_manager(&dir);

            let err = manager.set_default_profile_name("ghost").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotFound);
            assert_eq!(manager.default_profile_name().unwrap(), None);
        }
    }

    mod apply {
        use super::*;

        fn base_settings() -> serde_json::Value {
            json!({
                "env": { "ANTHROPIC_MODEL": "old", "OTHER_VAR": "x" },
                "permissions": { "allow": ["Read"], "deny": [] },
                "statusLine": { "type": "command", "command": "ccline", "padding": 0 },
                "$schema": "https://json.schemastore.org/claude-code-settings.json",
                "alwaysThinkingEnabled": true
            })
        }

        #[test]
        fn apply_then_current_returns_name() {
            let dir = tempdir().unwrap();
            write_settings(&dir, base_settings());
            let mut manager = make_manager(&dir);
            manager.create("dev", dev_env(), None).unwrap();
            manager
                .create("prod", env_of(&[
                    (BASE_URL_VAR, "https://api.y.com"),
                    (API_KEY_VAR, "sk-xyz123456789012345"),
                    (MODEL_VAR, "m-1"),
                    (FAST_MODEL_VAR, "m-2"),
                ]), None)
                .unwrap();

            assert_eq!(manager.current_profile_name().unwrap(), None);

            assert!(manager.apply("prod").unwrap());
            assert_eq!(manager.current_profile_name().unwrap().as_deref(), Some("prod"));

            manager.clear_cache();
            assert_eq!(manager.current_profile_name().unwrap().as_deref(), Some("prod"));
        }

        #[test]
        fn apply_replaces_env_and_keeps_everything_else() {
            let dir = tempdir().unwrap();
            write_settings(&dir, base_settings());
            let mut manager = make_manager(&dir);
            manager.create("dev", dev_env(), None).unwrap();

            manager.apply("dev").unwrap();

            let mut expected = base_settings();
            expected["env"] = serde_json::to_value(dev_env()).unwrap();
            assert_eq!(read_settings(&dir), expected);
        }

        #[test]
        fn apply_backs_up_previous_settings() {
            let dir = tempdir().unwrap();
            write_settings(&dir, base_settings());
            let mut manager = make_manager(&dir);
            manager.create("dev", dev_env(), None).unwrap();

            manager.apply("dev").unwrap();

            let backups = io::list_backups(&dir.path().join("settings.json")).unwrap();
            assert_eq!(backups.len(), 1);
            let backed_up: serde_json::Value =
                serde_json::from_str(&fs::read_to_string(&backups[0]).unwrap()).unwrap();
            assert_eq!(backed_up, base_settings());
        }

        #[test]
        fn restore_undoes_apply() {
            let dir = tempdir().unwrap();
            write_settings(&dir, base_settings());
            let mut manager = make_manager(&dir);
            manager.create("dev", dev_env(), None).unwrap();
            manager.apply("dev").unwrap();

            assert!(manager.restore_settings_backup().unwrap());

            assert_eq!(read_settings(&dir), base_settings());
            assert_eq!(manager.current_profile_name().unwrap(), None);
        }

        #[test]
        fn apply_missing_profile_is_not_found() {
            let dir = tempdir().unwrap();
            write_settings(&dir, base_settings());
            let mut manager = make_manager(&dir);

            assert_eq!(manager.apply("ghost").unwrap_err().kind(), ErrorKind::NotFound);
            assert_eq!(read_settings(&dir), base_settings());
        }

        #[test]
        fn apply_without_settings_file_is_file_error() {
            let dir = tempdir().unwrap();
            let mut manager = make_manager(&dir);
            manager.create("dev", dev_env(), None).unwrap();

            assert!(!manager.settings_exist());
            let err = manager.apply("dev").unwrap_err();
            assert!(matches!(err, ProfileError::SettingsMissing(_)));
            assert_eq!(err.kind(), ErrorKind::FileOperation);
        }

        #[test]
        fn current_profile_needs_exact_env_match() {
            let dir = tempdir().unwrap();
            let mut settings = base_settings();
            let mut env = serde_json::to_value(dev_env()).unwrap();
            env["EXTRA"] = json!("1");
            settings["env"] = env;
            write_settings(&dir, settings);

            let mut manager = make_manager(&dir);
            manager.create("dev", dev_env(), None).unwrap();

            assert_eq!(manager.current_profile_name().unwrap(), None);
        }

        #[test]
        fn apply_keeps_key_order() {
            let dir = tempdir().unwrap();
            let source = json!({
                "$schema": "https://json.schemastore.org/claude-code-settings.json",
                "model": "opus",
                "env": {},
                "permissions": { "defaultMode": "plan", "allow": [] }
            });
            write_settings(&dir, source);
            let mut manager = make_manager(&dir);
            manager.create("dev", dev_env(), None).unwrap();

            manager.apply("dev").unwrap();

            let written = read_settings(&dir);
            let keys = |v: &serde_json::Value| -> Vec<String> {
                v.as_object().unwrap().keys().cloned().collect()
            };
            assert_eq!(keys(&written), ["$schema", "model", "env", "permissions"]);
            assert_eq!(keys(&written["permissions"]), ["defaultMode", "allow"]);
            assert_eq!(written["env"], serde_json::to_value(dev_env()).unwrap());
        }

        #[test]
        fn apply_over_non_string_env_values() {
            let dir = tempdir().unwrap();
            write_settings(
                &dir,
                json!({ "env": { "MAX_THINKING_TOKENS": 31999 }, "model": "opus" }),
            );
            let mut manager = make_manager(&dir);
            manager.create("dev", dev_env(), None).unwrap();

            assert_eq!(manager.current_profile_name().unwrap(), None);
            assert!(manager.current_settings().is_ok());

            assert!(manager.apply("dev").unwrap());

            assert_eq!(manager.current_profile_name().unwrap().as_deref(), Some("dev"));
            let written = read_settings(&dir);
            assert_eq!(written["env"], serde_json::to_value(dev_env()).unwrap());
            assert_eq!(written["model"], "opus");
        }

        #[test]
        fn current_settings_reflects_apply() {
            let dir = tempdir().unwrap();
            write_settings(&dir, base_settings());
            let mut manager = make_manager(&dir);
            manager.create("dev", dev_env(), None).unwrap();
            manager.apply("dev").unwrap();

            let settings = manager.current_settings().unwrap();
            assert_eq!(settings.env(), Some(dev_env()));
            assert_eq!(settings.get("alwaysThinkingEnabled"), Some(&json!(true)));
        }
    }

    mod validate {
        use super::*;

        #[test]
        fn stored_profile_validates() {
            let dir = tempdir().unwrap();
            let mut manager = make_manager(&dir);
            manager.create("dev", dev_env(), None).unwrap();

            assert!(manager.validate("dev").unwrap());
            assert!(manager.check("dev").is_ok());
        }

        #[test]
        fn externally_broken_profile_fails_without_mutation() {
            let dir = tempdir().unwrap();
            let path = dir.path().join("claude-profiles.yml");
            fs::write(
                &path,
                "profiles:\n  - name: dev\n    env:\n      ANTHROPIC_MODEL: m-1\n",
            )
            .unwrap();
            let before = fs::read_to_string(&path).unwrap();
            let mut manager = make_manager(&dir);

            assert!(!manager.validate("dev").unwrap());
            let err = manager.check("dev").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ValidationFailed);
            assert_eq!(fs::read_to_string(&path).unwrap(), before);
        }

        #[test]
        fn validate_missing_is_not_found() {
            let dir = tempdir().unwrap();
            let mut manager = make_manager(&dir);

            assert_eq!(manager.validate("ghost").unwrap_err().kind(), ErrorKind::NotFound);
        }
    }

    mod failures {
        use super::*;

        #[test]
        fn malformed_store_is_configuration_error() {
            let dir = tempdir().unwrap();
            fs::write(dir.path().join("claude-profiles.yml"), "profiles: {{{").unwrap();
            let mut manager = make_manager(&dir);

            let err = manager.list().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Configuration);
            match err {
                ProfileError::InvalidFile { path, format, .. } => {
                    assert_eq!(path, dir.path().join("claude-profiles.yml"));
                    assert_eq!(format, "YAML");
                }
                other => panic!("Expected InvalidFile, got {other:?}"),
            }
        }

        #[test]
        fn malformed_settings_names_the_file() {
            let dir = tempdir().unwrap();
            fs::write(dir.path().join("settings.json"), "{ not json").unwrap();
            let mut manager = make_manager(&dir);
            manager.create("dev", dev_env(), None).unwrap();

            match manager.apply("dev").unwrap_err() {
                ProfileError::InvalidFile { path, format, .. } => {
                    assert_eq!(path, dir.path().join("settings.json"));
                    assert_eq!(format, "JSON");
                }
                other => panic!("Expected InvalidFile, got {other:?}"),
            }
        }

        #[test]
        fn failed_save_leaves_cache_untouched() {
            let dir = tempdir().unwrap();
            let path = dir.path().join("claude-profiles.yml");
            let mut manager = make_manager(&dir);
            manager.create("dev", dev_env(), None).unwrap();

            fs::remove_file(&path).unwrap();
            fs::create_dir(&path).unwrap();

            let err = manager.create("prod", dev_env(), None).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::FileOperation);

            let names: Vec<String> = manager.list().unwrap().into_iter().map(|p| p.name).collect();
            assert_eq!(names, ["dev"]);
        }

        #[test]
        fn from_env_uses_explicit_paths() {
            let dir = tempdir().unwrap();
            let config = dir.path().join("nested").join("profiles.yml");
            let settings = dir.path().join("settings.json");

            let mut manager =
                ProfileManager::from_env(Some(config.clone()), Some(settings.clone())).unwrap();

            assert_eq!(manager.config_path(), config);
            assert_eq!(manager.settings_path(), settings);
            manager.create("dev", dev_env(), None).unwrap();
            assert!(config.exists());
        }

        #[test]
        fn paths_are_reported() {
            let dir = tempdir().unwrap();
            let manager = make_manager(&dir);

            assert_eq!(manager.config_path(), dir.path().join("claude-profiles.yml"));
            assert_eq!(manager.settings_path(), dir.path().join("settings.json"));
        }
    }
}

//! Persistence data types.
//!
//! # Data Model Overview
//!
//! Two documents are persisted:
//!
//! ```text
//! ~/.claude/
//! ├── claude-profiles.yml   # ProfileConfig: all profiles + default pointer
//! └── settings.json         # ClaudeSettings: read by the Claude CLI
//! ```
//!
//! The profile store is owned by this crate. The settings file belongs to
//! the CLI, so [`ClaudeSettings`] keeps the whole JSON object in source
//! order and only ever swaps its `env` entry.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::validation::{
    mask_secret, API_KEY_VAR, BASE_URL_VAR, FAST_MODEL_VAR, MODEL_VAR,
};

/// Schema identifier written into freshly created settings documents.
pub const SETTINGS_SCHEMA_URL: &str = "https://json.schemastore.org/claude-code-settings.json";

/// Environment variables as stored in a profile or in the settings file.
pub type EnvMap = BTreeMap<String, String>;

// ============================================================================
// Profile Store Types
// ============================================================================

/// A named, validated set of environment variables.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentProfile {
    /// Unique profile name, also used as the lookup key.
    pub name: String,

    /// Environment variables applied to the settings file.
    pub env: EnvMap,

    /// Free-form description shown next to the name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// When this profile was created. Never changes afterwards.
    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,

    /// When this profile was last changed.
    #[serde(default = "Utc::now")]
    pub modified: DateTime<Utc>,
}

impl EnvironmentProfile {
    /// Build a profile whose `created` and `modified` are both `now`.
    pub fn new(name: String, env: EnvMap, description: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            name,
            env,
            description,
            created: now,
            modified: now,
        }
    }

    /// Merge `vars` into the existing env; keys not mentioned are kept.
    pub fn merge_env(&mut self, vars: EnvMap) {
        self.env.extend(vars);
    }

    /// Advance `modified` to `now`, or by one microsecond past its current
    /// value when the clock has not moved far enough.
    ///
    /// Successive calls always yield strictly increasing timestamps.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.modified = if now > self.modified {
            now
        } else {
            self.modified + Duration::microseconds(1)
        };
    }

    /// The env with the API key masked, for display and logging.
    pub fn redacted_env(&self) -> EnvMap {
        self.env
            .iter()
            .map(|(k, v)| {
                let value = if k == API_KEY_VAR { mask_secret(v) } else { v.clone() };
                (k.clone(), value)
            })
            .collect()
    }
}

// Hand-written so API keys never end up in logs or panic messages.
impl fmt::Debug for EnvironmentProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvironmentProfile")
            .field("name", &self.name)
            .field("env", &self.redacted_env())
            .field("description", &self.description)
            .field("created", &self.created)
            .field("modified", &self.modified)
            .finish()
    }
}

/// The profile store document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Profiles in insertion order, unique by name.
    #[serde(default)]
    pub profiles: Vec<EnvironmentProfile>,

    /// Name of the default profile, if any.
    #[serde(default)]
    pub default_profile: Option<String>,
}

impl ProfileConfig {
    /// Find a profile by name.
    pub fn find(&self, name: &str) -> Option<&EnvironmentProfile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// Find a profile by name for in-place mutation.
    pub fn find_mut(&mut self, name: &str) -> Option<&mut EnvironmentProfile> {
        self.profiles.iter_mut().find(|p| p.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Remove a profile by name, clearing the default pointer if it
    /// referenced the removed profile.
    pub fn remove(&mut self, name: &str) -> Option<EnvironmentProfile> {
        let index = self.profiles.iter().position(|p| p.name == name)?;
        let removed = self.profiles.remove(index);

        if self.default_profile.as_deref() == Some(name) {
            self.default_profile = None;
        }

        Some(removed)
    }

    /// Check the collection invariants: unique names and a default that
    /// points at an existing profile.
    ///
    /// Returns a description of the first violation found.
    pub fn check_integrity(&self) -> Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        for profile in &self.profiles {
            if !seen.insert(profile.name.as_str()) {
                return Err(format!("duplicate profile name '{}'", profile.name));
            }
        }

        if let Some(default) = &self.default_profile {
            if !seen.contains(default.as_str()) {
                return Err(format!("default profile '{default}' does not exist"));
            }
        }

        Ok(())
    }
}

// ============================================================================
// Settings Types
// ============================================================================

/// Read-only view of the `permissions` block of the settings file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deny: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ask: Option<Vec<String>>,

    /// Any other permission keys (e.g. `defaultMode`).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Key of the block a profile is applied into.
pub const SETTINGS_ENV_KEY: &str = "env";

/// The settings document read by the Claude CLI.
///
/// Held as the parsed JSON object in source order. Only the `env` entry is
/// ever replaced, in place, so every other key (modelled or not) is written
/// back unchanged and in its original position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaudeSettings {
    document: Map<String, Value>,
}

impl ClaudeSettings {
    /// The `env` block as a profile env.
    ///
    /// A missing block is an empty env. Returns `None` when the block is not
    /// an object or holds a non-string value (e.g. `"MAX_THINKING_TOKENS": 31999`),
    /// since no profile can match such an env.
    pub fn env(&self) -> Option<EnvMap> {
        let Some(block) = self.document.get(SETTINGS_ENV_KEY) else {
            return Some(EnvMap::new());
        };

        block
            .as_object()?
            .iter()
            .map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
            .collect()
    }

    /// The raw `env` block, whatever its shape.
    pub fn env_value(&self) -> Option<&Value> {
        self.document.get(SETTINGS_ENV_KEY)
    }

    /// Replace the `env` block wholesale, keeping its position in the
    /// document. A document without one gets it appended.
    pub fn set_env(&mut self, env: &EnvMap) {
        let block = env
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        self.document
            .insert(SETTINGS_ENV_KEY.to_string(), Value::Object(block));
    }

    /// Typed view of the `permissions` block; `None` if absent or malformed.
    pub fn permissions(&self) -> Option<Permissions> {
        let block = self.document.get("permissions")?;
        serde_json::from_value(block.clone()).ok()
    }

    /// Status line configuration; opaque to this crate.
    pub fn status_line(&self) -> Option<&Value> {
        self.document.get("statusLine")
    }

    pub fn schema(&self) -> Option<&str> {
        self.document.get("$schema").and_then(Value::as_str)
    }

    /// Any top-level key, modelled or not.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.document.get(key)
    }

    /// The whole document in source order.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.document
    }
}

impl Default for ClaudeSettings {
    fn default() -> Self {
        let mut document = Map::new();
        document.insert("$schema".to_string(), Value::from(SETTINGS_SCHEMA_URL));
        document.insert(SETTINGS_ENV_KEY.to_string(), Value::Object(Map::new()));
        document.insert(
            "permissions".to_string(),
            json!({ "allow": [], "deny": [] }),
        );
        Self { document }
    }
}

/// Starting values for a new profile's env. The API key is left empty and
/// must be filled in before the profile passes validation.
pub fn default_env_template() -> EnvMap {
    [
        (BASE_URL_VAR, "https://api.anthropic.com"),
        (API_KEY_VAR, ""),
        (MODEL_VAR, "claude-3-5-sonnet-20241022"),
        (FAST_MODEL_VAR, "claude-3-haiku-20240307"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

// ============================================================================
// TESTS
// ============================================================================

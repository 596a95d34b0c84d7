//! # claude-env-core
//!
//! Core logic for managing Claude environment profiles.
//!
//! A profile is a named set of `ANTHROPIC_*` environment variables (endpoint,
//! API key, model names). Profiles live in a YAML store; applying one copies
//! its variables into the `env` block of the Claude CLI's `settings.json`.
//!
//! This crate is frontend-agnostic and can be used by:
//! - a CLI (one command per operation)
//! - an interactive TUI
//!
//! ## Key Concepts
//!
//! - **Profile**: A named env map with description and timestamps
//! - **Default profile**: The profile a frontend picks when none is given
//! - **Current profile**: The profile whose env matches the settings file exactly

pub mod paths;
pub mod persistence;
pub mod profiles;
pub mod validation;

// Re-export commonly used types
pub use paths::StorePaths;
pub use persistence::{ClaudeSettings, EnvMap, EnvironmentProfile, ProfileConfig};
pub use profiles::{ErrorKind, ProfileError, ProfileManager};
pub use validation::{ValidationError, ValidationMode};

//! Persistence layer for the profile store and the Claude settings file.
//!
//! # Overview
//!
//! Two documents live on disk:
//!
//! - **Profile store** - every named profile plus the default profile name (YAML)
//! - **Settings** - the Claude CLI's `settings.json`; only its `env` block is ours
//!
//! # File Locations
//!
//! Paths come from [`crate::paths::StorePaths`]. By default:
//!
//! ```text
//! ~/.claude/
//! ├── claude-profiles.yml                      # Profile store
//! ├── claude-profiles.yml.backup.<timestamp>   # Previous versions
//! ├── settings.json                            # Claude CLI settings
//! └── settings.json.backup.<timestamp>
//! ```
//!
//! # Design Principles
//!
//! ## Atomic Writes
//!
//! All save operations use write-then-rename to prevent corruption:
//!
//! 1. Copy the current file to a timestamped backup
//! 2. Write to `file.tmp`
//! 3. Rename to `file` (atomic on Unix)
//!
//! ## Write-Through Cache
//!
//! [`store::ConfigStore`] keeps the last document it loaded or saved. The
//! cache is replaced only after a save succeeds.
//!
//! # Usage
//!
//! ```ignore
//! use claude_env_core::paths::StorePaths;
//! use claude_env_core::persistence::ConfigStore;
//!
//! let mut store = ConfigStore::new(StorePaths::resolve(None, None)?);
//! let config = store.load_config()?;
//! ```

pub mod io;
pub mod store;
pub mod types;

// Re-export commonly used items for convenience
pub use io::{FileError, FileOp};
pub use store::{ConfigStore, StoreError, StoreOptions, DEFAULT_BACKUP_RETENTION};
pub use types::*;

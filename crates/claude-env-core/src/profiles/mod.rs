//! Profile management: CRUD over the profile store, plus applying a profile
//! to the Claude settings file.

mod manager;

pub use manager::{Clock, ErrorKind, ProfileError, ProfileManager};

//! File primitives shared by the store: read, atomic write, and backups.
//!
//! # Atomic Writes
//!
//! [`write_atomic`] writes to `<file>.tmp` next to the target and renames it
//! into place, so a crash mid-write leaves either the old file or the new
//! one, never a truncated mix.
//!
//! # Backups
//!
//! [`backup`] copies the current file to `<file>.backup.<UTC timestamp>` in
//! the same directory before it gets overwritten. Timestamps sort
//! lexicographically, so the newest backup is always the last one in
//! [`list_backups`]. Retention is handled by [`prune_backups`].
//!
//! Nothing in here knows about profiles or settings; every function deals in
//! paths and strings and surfaces I/O failures as a [`FileError`].

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use thiserror::Error;

const BACKUP_MARKER: &str = ".backup.";

/// The file operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOp {
    Read,
    Write,
    Rename,
    CreateDir,
    Backup,
    ListDir,
    Remove,
}

impl fmt::Display for FileOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            FileOp::Read => "read",
            FileOp::Write => "write",
            FileOp::Rename => "rename into",
            FileOp::CreateDir => "create directory",
            FileOp::Backup => "back up",
            FileOp::ListDir => "list directory",
            FileOp::Remove => "remove",
        };
        f.write_str(verb)
    }
}

/// An I/O failure on a specific path.
#[derive(Error, Debug)]
#[error("Failed to {op} {}: {source}", .path.display())]
pub struct FileError {
    pub op: FileOp,
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl FileError {
    fn new(op: FileOp, path: &Path, source: io::Error) -> Self {
        Self {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    /// The underlying OS error kind (permission denied, disk full, ...).
    pub fn kind(&self) -> io::ErrorKind {
        self.source.kind()
    }
}

/// Read a UTF-8 file.
///
/// Returns `Ok(None)` if the file does not exist. Any other failure
/// (permissions, invalid UTF-8, ...) is an error.
pub fn read_file(path: &Path) -> Result<Option<String>, FileError> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(FileError::new(FileOp::Read, path, e)),
    }
}

/// Write `contents` to `path` via write-then-rename.
///
/// Parent directories are created as needed.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), FileError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| FileError::new(FileOp::CreateDir, dir, e))?;
    }

    let temp_path = sibling_with_suffix(path, ".tmp");

    fs::write(&temp_path, contents).map_err(|e| FileError::new(FileOp::Write, &temp_path, e))?;

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(FileError::new(FileOp::Rename, path, e));
    }

    Ok(())
}

/// Copy `path` to a timestamped sibling before it is overwritten.
///
/// Returns the backup path, or `None` when there is nothing to back up yet.
pub fn backup(path: &Path) -> Result<Option<PathBuf>, FileError> {
    if !path.exists() {
        return Ok(None);
    }

    let stamp = Utc::now().format("%Y%m%dT%H%M%S%6fZ").to_string();
    let backup_path = free_backup_path(path, &stamp);

    fs::copy(path, &backup_path).map_err(|e| FileError::new(FileOp::Backup, path, e))?;
    log::debug!("Backed up {} to {}", path.display(), backup_path.display());

    Ok(Some(backup_path))
}

/// All backups of `path`, oldest first.
pub fn list_backups(path: &Path) -> Result<Vec<PathBuf>, FileError> {
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        return Ok(Vec::new());
    };
    let prefix = format!("{file_name}{BACKUP_MARKER}");

    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(FileError::new(FileOp::ListDir, dir, e)),
    };

    let mut backups = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| FileError::new(FileOp::ListDir, dir, e))?;
        let name = entry.file_name();
        if name.to_str().is_some_and(|n| n.starts_with(&prefix)) {
            backups.push(entry.path());
        }
    }

    backups.sort();
    Ok(backups)
}

/// Delete all but the newest `keep` backups of `path`.
///
/// Returns the paths that were removed.
pub fn prune_backups(path: &Path, keep: usize) -> Result<Vec<PathBuf>, FileError> {
    let backups = list_backups(path)?;
    let excess = backups.len().saturating_sub(keep);

    let mut removed = Vec::with_capacity(excess);
    for old in backups.into_iter().take(excess) {
        fs::remove_file(&old).map_err(|e| FileError::new(FileOp::Remove, &old, e))?;
        removed.push(old);
    }

    if !removed.is_empty() {
        log::debug!(
            "Pruned {} old backup(s) of {}",
            removed.len(),
            path.display()
        );
    }

    Ok(removed)
}

/// Restore `path` from its newest backup and remove that backup.
///
/// Returns the backup that was restored, or `None` if there was none.
pub fn restore_latest_backup(path: &Path) -> Result<Option<PathBuf>, FileError> {
    let Some(latest) = list_backups(path)?.pop() else {
        return Ok(None);
    };

    let contents = fs::read_to_string(&latest).map_err(|e| FileError::new(FileOp::Read, &latest, e))?;
    write_atomic(path, &contents)?;
    fs::remove_file(&latest).map_err(|e| FileError::new(FileOp::Remove, &latest, e))?;

    log::info!("Restored {} from {}", path.display(), latest.display());
    Ok(Some(latest))
}

/// `<file>.backup.<stamp>`, or `<file>.backup.<stamp>-NNNN` for further
/// backups inside the same microsecond. The counter is zero-padded so the
/// names still sort in creation order.
fn free_backup_path(path: &Path, stamp: &str) -> PathBuf {
    let base = sibling_with_suffix(path, &format!("{BACKUP_MARKER}{stamp}"));

    let mut candidate = base.clone();
    let mut n = 1;
    while candidate.exists() {
        candidate = sibling_with_suffix(&base, &format!("-{n:04}"));
        n += 1;
    }
    candidate
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

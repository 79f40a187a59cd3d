use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

use crate::{Result, TidyError};

/// Type of filesystem entry as seen by the traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Directory,
}

impl EntryKind {
    pub fn is_directory(&self) -> bool {
        matches!(self, EntryKind::Directory)
    }
}

/// Per-entry attributes collected during expansion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMetadata {
    /// Apparent size in bytes
    pub size: u64,
    pub created_at: SystemTime,
    pub modified_at: SystemTime,
    pub kind: EntryKind,
}

impl EntryMetadata {
    pub fn from_fs(metadata: &Metadata) -> Self {
        let kind = if metadata.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        };

        let modified_at = metadata.modified().unwrap_or(UNIX_EPOCH);

        Self {
            size: metadata.len(),
            created_at: creation_time(metadata).unwrap_or(modified_at),
            modified_at,
            kind,
        }
    }
}

/// A discovered entry together with the path it was found at.
///
/// This is the unit handed to whatever consumes the traversal output
/// (classification, moving, reporting).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredEntry {
    pub path: PathBuf,
    pub metadata: EntryMetadata,
}

impl DiscoveredEntry {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.to_string_lossy().to_string())
    }
}

/// Stat an entry, following symlinks only when asked to.
pub fn stat(path: &Path, follow_symlinks: bool) -> Result<Metadata> {
    let result = if follow_symlinks {
        fs::metadata(path)
    } else {
        fs::symlink_metadata(path)
    };

    result.map_err(|source| TidyError::MetadataUnavailable {
        path: path.to_path_buf(),
        source,
    })
}

/// Collect metadata for a single entry
pub fn extract(path: &Path, follow_symlinks: bool) -> Result<EntryMetadata> {
    stat(path, follow_symlinks).map(|m| EntryMetadata::from_fs(&m))
}

/// Birth time where the platform records one, inode change time otherwise
#[cfg(unix)]
fn creation_time(metadata: &Metadata) -> Option<SystemTime> {
    if let Ok(created) = metadata.created() {
        return Some(created);
    }

    let secs = u64::try_from(metadata.ctime()).ok()?;
    let nanos = u32::try_from(metadata.ctime_nsec()).unwrap_or(0);
    UNIX_EPOCH.checked_add(std::time::Duration::new(secs, nanos))
}

#[cfg(not(unix))]
fn creation_time(metadata: &Metadata) -> Option<SystemTime> {
    metadata.created().ok()
}

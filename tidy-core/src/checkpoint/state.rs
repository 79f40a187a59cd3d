use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::{Result, TidyError};

/// Current checkpoint format version - increment when format changes
pub const CHECKPOINT_VERSION: u32 = 1;

/// Magic bytes identifying a tidy checkpoint file
pub const CHECKPOINT_MAGIC: [u8; 4] = *b"TDYQ";

/// Persisted form of the work queue
#[derive(Debug, Clone, PartialEq)]
pub struct TraversalState {
    /// Root the traversal was started from
    pub root: PathBuf,
    /// Directories still awaiting expansion, head first
    pub pending: Vec<PathBuf>,
    /// Rounds finished when the state was captured
    pub rounds_completed: u64,
    pub saved_at: SystemTime,
}

impl TraversalState {
    pub fn new(root: PathBuf, pending: Vec<PathBuf>, rounds_completed: u64) -> Self {
        Self {
            root,
            pending,
            rounds_completed,
            saved_at: SystemTime::now(),
        }
    }

    /// Nothing left to expand
    pub fn is_finished(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Header section of the checkpoint file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct CheckpointHeader {
    pub version: u32,
    pub root: Vec<u8>,
    pub saved_at: SystemTime,
    pub rounds_completed: u64,
    pub pending_count: u64,
}

/// Body section: pending paths in queue order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct CheckpointBody {
    pub pending: Vec<Vec<u8>>,
}

/// Raw OS bytes, so non-UTF-8 names survive a round trip
#[cfg(unix)]
pub(crate) fn path_to_bytes(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(unix)]
pub(crate) fn path_from_bytes(bytes: Vec<u8>) -> Result<PathBuf> {
    use std::os::unix::ffi::OsStringExt;
    Ok(PathBuf::from(std::ffi::OsString::from_vec(bytes)))
}

#[cfg(not(unix))]
pub(crate) fn path_to_bytes(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

#[cfg(not(unix))]
pub(crate) fn path_from_bytes(bytes: Vec<u8>) -> Result<PathBuf> {
    String::from_utf8(bytes)
        .map(PathBuf::from)
        .map_err(|e| TidyError::CheckpointCorrupt(format!("Path is not valid UTF-8: {}", e)))
}

impl CheckpointBody {
    pub fn into_paths(self) -> Result<Vec<PathBuf>> {
        self.pending.into_iter().map(path_from_bytes).collect()
    }
}

impl From<&TraversalState> for CheckpointHeader {
    fn from(state: &TraversalState) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            root: path_to_bytes(&state.root),
            saved_at: state.saved_at,
            rounds_completed: state.rounds_completed,
            pending_count: state.pending.len() as u64,
        }
    }
}

impl From<&TraversalState> for CheckpointBody {
    fn from(state: &TraversalState) -> Self {
        Self {
            pending: state.pending.iter().map(|p| path_to_bytes(p)).collect(),
        }
    }
}

pub(crate) fn corrupt(message: impl Into<String>) -> TidyError {
    TidyError::CheckpointCorrupt(message.into())
}

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TidyError {
    #[error("Path does not exist: {0}")]
    PathNotFound(PathBuf),

    #[error("Path is not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The entry vanished or became inaccessible between listing and stat
    #[error("Metadata unavailable for {path}: {source}")]
    MetadataUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Listing a directory failed (permission denied or other I/O fault)
    #[error("Directory unreadable: {path}: {source}")]
    DirectoryUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write checkpoint {path}: {source}")]
    CheckpointWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Corrupt checkpoint: {0}")]
    CheckpointCorrupt(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl TidyError {
    pub fn is_permission_denied(&self) -> bool {
        match self {
            TidyError::MetadataUnavailable { source, .. }
            | TidyError::DirectoryUnreadable { source, .. }
            | TidyError::CheckpointWrite { source, .. }
            | TidyError::Io(source) => source.kind() == io::ErrorKind::PermissionDenied,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, TidyError>;

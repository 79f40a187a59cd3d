use std::path::PathBuf;

use crate::scheduler::BatchStrategy;
use crate::{Result, TidyError};

/// Traversal configuration
#[derive(Debug, Clone)]
pub struct TraversalConfig {
    /// Directory to traverse
    pub root: PathBuf,
    /// Where to persist the pending queue (None = not resumable)
    pub checkpoint: Option<PathBuf>,
    /// Pick up an existing checkpoint instead of starting from the root
    pub resume: bool,
    /// Number of parallel workers (0 = auto)
    pub workers: usize,
    /// How many directories to expand per round
    pub batch: BatchStrategy,
    /// Follow symbolic links
    pub follow_symlinks: bool,
    /// Stay on same filesystem (don't cross mount points)
    pub same_filesystem: bool,
    /// Stop after this many rounds in this run (None = run to completion)
    pub round_limit: Option<u64>,
}

impl TraversalConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            checkpoint: None,
            resume: true,
            workers: 0, // auto
            batch: BatchStrategy::default(),
            follow_symlinks: false,
            same_filesystem: true,
            round_limit: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.root.exists() {
            return Err(TidyError::PathNotFound(self.root.clone()));
        }
        if !self.root.is_dir() {
            return Err(TidyError::NotADirectory(self.root.clone()));
        }
        if self.batch == BatchStrategy::Fixed(0) {
            return Err(TidyError::InvalidConfig(
                "batch size must be at least 1".to_string(),
            ));
        }
        if self.round_limit == Some(0) {
            return Err(TidyError::InvalidConfig(
                "round limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self::new(".")
    }
}

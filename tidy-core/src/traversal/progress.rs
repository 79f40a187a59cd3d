use std::path::PathBuf;
use std::time::Duration;

use crate::entry::DiscoveredEntry;

/// Events emitted while a traversal runs
#[derive(Debug, Clone)]
pub enum TraversalMessage {
    /// Traversal started; `resumed` holds the restored queue length
    Started {
        root: PathBuf,
        resumed: Option<usize>,
    },
    /// A file was discovered
    Entry(DiscoveredEntry),
    /// A round finished and its results were merged
    RoundCompleted(RoundSummary),
    /// Persisting the queue failed; reported once per run
    CheckpointFailed(String),
    /// Queue drained
    Completed(TraversalProgress),
    /// Stopped by the round limit; the checkpoint holds the remaining work
    Paused(TraversalProgress),
    /// Traversal was cancelled
    Cancelled(TraversalProgress),
}

/// One Scheduling -> Expanding -> Merging -> Checkpointing cycle
#[derive(Debug, Clone, PartialEq)]
pub struct RoundSummary {
    /// 1-based, counted across resumed runs
    pub round: u64,
    /// Directories expanded this round, in dispatch order
    pub batch: Vec<PathBuf>,
    pub files_found: u64,
    pub subdirectories_found: u64,
    /// Queue length after merging
    pub queue_depth: usize,
    pub duration: Duration,
}

/// Running totals
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraversalProgress {
    pub rounds: u64,
    pub files_found: u64,
    pub dirs_found: u64,
    pub bytes_found: u64,
    /// Entries skipped because their metadata could not be read
    pub metadata_errors: u64,
    /// Directories that could not be listed
    pub unreadable_dirs: u64,
    pub queue_depth: usize,
}

impl TraversalProgress {
    pub fn errors(&self) -> u64 {
        self.metadata_errors + self.unreadable_dirs
    }
}

/// How a traversal run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalOutcome {
    Completed,
    Paused,
    Cancelled,
}

/// Result of a traversal run
#[derive(Debug, Clone)]
pub struct TraversalReport {
    pub root: PathBuf,
    pub outcome: TraversalOutcome,
    pub progress: TraversalProgress,
    /// Rounds executed by this run (excludes rounds before a resume)
    pub rounds_this_run: u64,
    pub resumed: bool,
    /// First checkpoint failure during the run
    pub checkpoint_error: Option<String>,
}

impl TraversalReport {
    pub fn is_complete(&self) -> bool {
        self.outcome == TraversalOutcome::Completed
    }
}

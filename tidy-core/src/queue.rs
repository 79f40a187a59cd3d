use std::collections::VecDeque;
use std::path::PathBuf;

/// FIFO of directories awaiting expansion.
///
/// Children discovered in a round are appended together at the tail, so the
/// traversal is breadth-first across rounds. The queue performs no
/// deduplication; loop avoidance is the caller's job.
#[derive(Debug, Clone, Default)]
pub struct WorkQueue {
    pending: VecDeque<PathBuf>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a directory at the tail
    pub fn push(&mut self, path: PathBuf) {
        self.pending.push_back(path);
    }

    pub fn extend<I: IntoIterator<Item = PathBuf>>(&mut self, paths: I) {
        self.pending.extend(paths);
    }

    /// Remove up to `n` paths from the head, in head order
    pub fn pop_batch(&mut self, n: usize) -> Vec<PathBuf> {
        let n = n.min(self.pending.len());
        self.pending.drain(..n).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Ordered copy of the pending paths, head first
    pub fn snapshot(&self) -> Vec<PathBuf> {
        self.pending.iter().cloned().collect()
    }

    /// Replace the queue contents wholesale
    pub fn restore(&mut self, paths: Vec<PathBuf>) {
        self.pending = paths.into();
    }
}

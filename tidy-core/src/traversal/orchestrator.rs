use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, error, info, warn};

use super::config::TraversalConfig;
use super::progress::{
    RoundSummary, TraversalMessage, TraversalOutcome, TraversalProgress, TraversalReport,
};
use crate::Result;
use crate::checkpoint::{CheckpointStore, TraversalState};
use crate::entry::{DirIdentity, VisitedDirs, device_id};
use crate::pool::{ExpandOptions, Expansion, WorkerPool};
use crate::queue::WorkQueue;
use crate::scheduler::BatchPolicy;

/// Cancellation token for stopping traversals
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Orchestrator states. Data owned by a round travels with the state.
enum Phase {
    Idle,
    Seeding,
    Scheduling,
    Expanding {
        batch: Vec<PathBuf>,
    },
    Merging {
        batch: Vec<PathBuf>,
        expansions: Vec<Expansion>,
        started: Instant,
    },
    Checkpointing,
    Done(TraversalOutcome),
}

/// Mutable state of a single run
struct RunState {
    root: PathBuf,
    queue: WorkQueue,
    visited: VisitedDirs,
    progress: TraversalProgress,
    batch_size: usize,
    rounds_this_run: u64,
    resumed: bool,
    checkpoint_error: Option<String>,
}

/// Resumable breadth-first traversal driven in rounds
pub struct Traversal {
    config: TraversalConfig,
    policy: Box<dyn BatchPolicy>,
    cancel_token: CancellationToken,
}

impl Traversal {
    pub fn new(config: TraversalConfig) -> Self {
        let policy = config.batch.into_policy();
        Self {
            config,
            policy,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Replace the batch policy chosen by the configuration
    pub fn with_policy(mut self, policy: Box<dyn BatchPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    /// Run the traversal in a background thread.
    /// Returns a receiver for entries and progress, and the handle yielding the report.
    pub fn run(
        self,
    ) -> (
        Receiver<TraversalMessage>,
        std::thread::JoinHandle<Result<TraversalReport>>,
    ) {
        let (tx, rx) = crossbeam_channel::unbounded();

        let handle = std::thread::spawn(move || self.run_sync(&tx));

        (rx, handle)
    }

    /// Run the traversal on the current thread
    pub fn run_sync(mut self, tx: &Sender<TraversalMessage>) -> Result<TraversalReport> {
        self.config.validate()?;

        let root = self
            .config
            .root
            .canonicalize()
            .unwrap_or_else(|_| self.config.root.clone());
        let pool = WorkerPool::new(self.config.workers)?;
        let store = self.config.checkpoint.as_ref().map(|p| CheckpointStore::new(p.clone()));

        let root_device = if self.config.same_filesystem {
            fs::metadata(&root).map(|m| device_id(&m)).ok()
        } else {
            None
        };
        let options = ExpandOptions {
            follow_symlinks: self.config.follow_symlinks,
            root_device,
        };

        let mut run = RunState {
            root,
            queue: WorkQueue::new(),
            visited: VisitedDirs::new(),
            progress: TraversalProgress::default(),
            batch_size: self.config.batch.initial_size(pool.capacity()),
            rounds_this_run: 0,
            resumed: false,
            checkpoint_error: None,
        };

        let mut phase = Phase::Idle;
        let outcome = loop {
            phase = match phase {
                Phase::Idle => self.idle(&mut run, store.as_ref(), tx),
                Phase::Seeding => {
                    let root = run.root.clone();
                    self.remember(&mut run.visited, &root);
                    run.queue.push(root);
                    Phase::Scheduling
                }
                Phase::Scheduling => self.schedule(&mut run, pool.capacity()),
                Phase::Expanding { batch } => {
                    let started = Instant::now();
                    let expansions = pool.expand_batch(&batch, &options);
                    Phase::Merging {
                        batch,
                        expansions,
                        started,
                    }
                }
                Phase::Merging {
                    batch,
                    expansions,
                    started,
                } => {
                    let summary = self.merge(&mut run, batch, expansions, started, tx);
                    self.policy.observe(&summary);
                    let _ = tx.send(TraversalMessage::RoundCompleted(summary));
                    Phase::Checkpointing
                }
                Phase::Checkpointing => {
                    if let Some(store) = &store {
                        Self::checkpoint(&mut run, store, tx);
                    }
                    Phase::Scheduling
                }
                Phase::Done(outcome) => break outcome,
            };
        };

        let progress = run.progress.clone();
        let message = match outcome {
            TraversalOutcome::Completed => {
                info!(
                    rounds = progress.rounds,
                    files = progress.files_found,
                    dirs = progress.dirs_found,
                    errors = progress.errors(),
                    "Traversal complete"
                );
                TraversalMessage::Completed(progress.clone())
            }
            TraversalOutcome::Paused => {
                info!(pending = progress.queue_depth, "Round limit reached, pausing");
                TraversalMessage::Paused(progress.clone())
            }
            TraversalOutcome::Cancelled => {
                info!(pending = progress.queue_depth, "Traversal cancelled");
                TraversalMessage::Cancelled(progress.clone())
            }
        };
        let _ = tx.send(message);

        Ok(TraversalReport {
            root: run.root,
            outcome,
            progress,
            rounds_this_run: run.rounds_this_run,
            resumed: run.resumed,
            checkpoint_error: run.checkpoint_error,
        })
    }

    /// Restore from a checkpoint if one applies, otherwise seed from the root
    fn idle(
        &self,
        run: &mut RunState,
        store: Option<&CheckpointStore>,
        tx: &Sender<TraversalMessage>,
    ) -> Phase {
        let restored = match store {
            Some(store) if self.config.resume => load_checkpoint(store, &run.root),
            _ => None,
        };

        match restored {
            Some(state) => {
                info!(
                    pending = state.pending.len(),
                    rounds = state.rounds_completed,
                    "Resuming traversal from checkpoint"
                );
                for path in &state.pending {
                    self.remember(&mut run.visited, path);
                }
                run.progress.rounds = state.rounds_completed;
                run.progress.queue_depth = state.pending.len();
                run.resumed = true;
                let _ = tx.send(TraversalMessage::Started {
                    root: run.root.clone(),
                    resumed: Some(state.pending.len()),
                });
                run.queue.restore(state.pending);
                Phase::Scheduling
            }
            None => {
                let _ = tx.send(TraversalMessage::Started {
                    root: run.root.clone(),
                    resumed: None,
                });
                Phase::Seeding
            }
        }
    }

    fn schedule(&self, run: &mut RunState, capacity: usize) -> Phase {
        if run.queue.is_empty() {
            return Phase::Done(TraversalOutcome::Completed);
        }
        if self.cancel_token.is_cancelled() {
            return Phase::Done(TraversalOutcome::Cancelled);
        }
        if let Some(limit) = self.config.round_limit
            && run.rounds_this_run >= limit
        {
            return Phase::Done(TraversalOutcome::Paused);
        }

        run.batch_size = self
            .policy
            .next_batch_size(run.batch_size, run.queue.len(), capacity);
        let batch = run.queue.pop_batch(run.batch_size);
        Phase::Expanding { batch }
    }

    /// Fold a finished batch back into the queue, in dispatch order
    fn merge(
        &self,
        run: &mut RunState,
        batch: Vec<PathBuf>,
        expansions: Vec<Expansion>,
        started: Instant,
        tx: &Sender<TraversalMessage>,
    ) -> RoundSummary {
        let mut files_found = 0u64;
        let mut subdirectories_found = 0u64;

        for expansion in expansions {
            if expansion.is_unreadable() {
                run.progress.unreadable_dirs += 1;
            }
            run.progress.metadata_errors += expansion.metadata_errors;
            run.progress.bytes_found += expansion.bytes();

            for subdir in expansion.subdirectories {
                if let Some(identity) = subdir.identity
                    && !run.visited.insert(identity)
                {
                    debug!(path = %subdir.path.display(), "Directory already visited, skipping");
                    continue;
                }
                run.queue.push(subdir.path);
                subdirectories_found += 1;
            }

            for file in expansion.files {
                files_found += 1;
                let _ = tx.send(TraversalMessage::Entry(file));
            }
        }

        run.rounds_this_run += 1;
        run.progress.rounds += 1;
        run.progress.files_found += files_found;
        run.progress.dirs_found += subdirectories_found;
        run.progress.queue_depth = run.queue.len();

        let summary = RoundSummary {
            round: run.progress.rounds,
            batch,
            files_found,
            subdirectories_found,
            queue_depth: run.queue.len(),
            duration: started.elapsed(),
        };

        debug!(
            round = summary.round,
            batch = summary.batch.len(),
            files = summary.files_found,
            subdirs = summary.subdirectories_found,
            queue = summary.queue_depth,
            "Round complete"
        );

        summary
    }

    /// Persist the queue. A failure does not stop the traversal; only the
    /// first one is reported.
    fn checkpoint(run: &mut RunState, store: &CheckpointStore, tx: &Sender<TraversalMessage>) {
        let state = TraversalState::new(run.root.clone(), run.queue.snapshot(), run.progress.rounds);

        match store.save(&state) {
            Ok(()) => {}
            Err(e) if run.checkpoint_error.is_none() => {
                error!(error = %e, "Checkpoint write failed, traversal is no longer resumable");
                let _ = tx.send(TraversalMessage::CheckpointFailed(e.to_string()));
                run.checkpoint_error = Some(e.to_string());
            }
            Err(e) => {
                debug!(error = %e, "Checkpoint write failed again");
            }
        }
    }

    /// Track a directory identity when following symlinks
    fn remember(&self, visited: &mut VisitedDirs, path: &Path) {
        if !self.config.follow_symlinks {
            return;
        }
        if let Ok(meta) = fs::metadata(path)
            && let Some(identity) = DirIdentity::of(path, &meta)
        {
            visited.insert(identity);
        }
    }
}

/// Load a checkpoint for `root`. Anything unusable means a fresh start, and
/// is logged loudly because already-emitted entries will be emitted again.
fn load_checkpoint(store: &CheckpointStore, root: &Path) -> Option<TraversalState> {
    match store.load() {
        Ok(Some(state)) if state.root == root => Some(state),
        Ok(Some(state)) => {
            warn!(
                checkpoint = %store.path().display(),
                saved_root = %state.root.display(),
                root = %root.display(),
                "Checkpoint belongs to a different root, starting a fresh traversal"
            );
            None
        }
        Ok(None) => {
            info!("No saved state found, starting fresh");
            None
        }
        Err(e) => {
            warn!(
                checkpoint = %store.path().display(),
                error = %e,
                "Failed to load checkpoint, starting a fresh traversal from the root; \
                 entries from the interrupted run will be reported again"
            );
            None
        }
    }
}

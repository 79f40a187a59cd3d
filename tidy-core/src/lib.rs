pub mod checkpoint;
pub mod entry;
pub mod error;
pub mod format;
pub mod pool;
pub mod queue;
pub mod scheduler;
pub mod traversal;

pub use checkpoint::{
    CHECKPOINT_MAGIC, CHECKPOINT_VERSION, CheckpointStore, TraversalState, checkpoint_path_for,
};
pub use entry::{DiscoveredEntry, EntryKind, EntryMetadata, extract};
pub use error::{Result, TidyError};
pub use format::{format_count, format_duration, format_size};
pub use pool::{ExpandOptions, Expansion, WorkerPool, expand};
pub use queue::WorkQueue;
pub use scheduler::{BatchPolicy, BatchStrategy, clamp_batch};
pub use traversal::{
    CancellationToken, RoundSummary, Traversal, TraversalConfig, TraversalMessage,
    TraversalOutcome, TraversalProgress, TraversalReport,
};

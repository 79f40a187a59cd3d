mod config;
mod orchestrator;
mod progress;

pub use config::TraversalConfig;
pub use orchestrator::{CancellationToken, Traversal};
pub use progress::{
    RoundSummary, TraversalMessage, TraversalOutcome, TraversalProgress, TraversalReport,
};

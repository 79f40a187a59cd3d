// Run with: cargo run --example debug_traversal -- /path/to/walk [batch-size]
// Registered in tidy-core/Cargo.toml: [[example]] name = "debug_traversal" path = "../debug_traversal.rs"

use std::path::PathBuf;
use std::time::Instant;

use tidy_core::{BatchStrategy, Traversal, TraversalConfig, TraversalMessage};

fn main() {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let batch = std::env::args()
        .nth(2)
        .and_then(|s| s.parse().ok())
        .map(BatchStrategy::Fixed)
        .unwrap_or(BatchStrategy::Saturate);

    println!("Walking: {:?} with {:?}", path, batch);

    let config = TraversalConfig {
        batch,
        ..TraversalConfig::new(path)
    };
    let (rx, handle) = Traversal::new(config).run();

    let start = Instant::now();
    let mut slowest: Option<(u64, f64)> = None;

    for msg in rx {
        match msg {
            TraversalMessage::Started { root, resumed } => {
                println!("[{:>6.1}s] STARTED {:?} resumed={:?}", start.elapsed().as_secs_f64(), root, resumed);
            }
            TraversalMessage::RoundCompleted(round) => {
                let secs = round.duration.as_secs_f64();
                if slowest.is_none_or(|(_, s)| secs > s) {
                    slowest = Some((round.round, secs));
                }
                println!(
                    "[{:>6.1}s] round={:<6} batch={:<4} files={:<6} subdirs={:<6} queue={:<8} took={:.3}s first={:?}",
                    start.elapsed().as_secs_f64(),
                    round.round,
                    round.batch.len(),
                    round.files_found,
                    round.subdirectories_found,
                    round.queue_depth,
                    secs,
                    round.batch.first().map(|p| p.to_string_lossy().to_string()).unwrap_or_default()
                );
            }
            TraversalMessage::CheckpointFailed(e) => {
                println!("[{:>6.1}s] CHECKPOINT FAILED: {}", start.elapsed().as_secs_f64(), e);
            }
            TraversalMessage::Completed(_) => {
                println!("[{:>6.1}s] COMPLETED", start.elapsed().as_secs_f64());
            }
            TraversalMessage::Paused(_) | TraversalMessage::Cancelled(_) => {
                println!("[{:>6.1}s] STOPPED EARLY", start.elapsed().as_secs_f64());
            }
            TraversalMessage::Entry(_) => {}
        }
    }

    match handle.join() {
        Ok(Ok(report)) => {
            println!(
                "\nFinal: {} files, {} dirs, {} errors, {} in {} rounds",
                tidy_core::format_count(report.progress.files_found),
                tidy_core::format_count(report.progress.dirs_found),
                report.progress.errors(),
                tidy_core::format_size(report.progress.bytes_found),
                report.progress.rounds
            );
            if let Some((round, secs)) = slowest {
                println!("Slowest round: #{} ({:.3}s)", round, secs);
            }
        }
        Ok(Err(e)) => println!("\nTraversal failed: {}", e),
        Err(_) => println!("\nTraversal thread panicked"),
    }
}

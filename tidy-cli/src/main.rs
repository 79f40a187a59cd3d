use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;
use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use tidy_core::{
    BatchStrategy, CancellationToken, DiscoveredEntry, Traversal, TraversalConfig, TraversalMessage,
    TraversalOutcome, TraversalReport, checkpoint_path_for, format_count, format_duration,
    format_size,
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// TIDY - Resumable parallel directory traversal
#[derive(Parser, Debug)]
#[command(name = "tidy")]
#[command(about = "Walk a directory tree in resumable rounds and list every file found")]
#[command(version)]
struct Args {
    /// Directory to walk (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Checkpoint file (defaults to a per-root file in the cache directory)
    #[arg(long, value_name = "FILE")]
    state: Option<PathBuf>,

    /// Do not persist progress (traversal cannot be resumed)
    #[arg(long, conflicts_with = "state")]
    no_state: bool,

    /// Ignore any existing checkpoint and start from the root
    #[arg(long)]
    fresh: bool,

    /// Number of worker threads (0 = one per core)
    #[arg(short = 'j', long, default_value_t = 0)]
    workers: usize,

    /// Directories expanded per round
    #[arg(short, long, default_value_t = tidy_core::scheduler::DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Always expand one directory per worker
    #[arg(long, conflicts_with_all = ["batch_size", "adaptive"])]
    saturate: bool,

    /// Resize batches to keep each round near --target-ms
    #[arg(long, conflicts_with = "batch_size")]
    adaptive: bool,

    /// Target round duration for --adaptive, in milliseconds
    #[arg(long, default_value_t = 250, requires = "adaptive")]
    target_ms: u64,

    /// Follow symbolic links
    #[arg(short = 'L', long)]
    follow_symlinks: bool,

    /// Cross filesystem boundaries
    #[arg(short = 'x', long)]
    cross_filesystems: bool,

    /// Stop after this many rounds (resume later from the checkpoint)
    #[arg(long, value_name = "N")]
    max_rounds: Option<u64>,

    /// Only print the summary
    #[arg(short, long)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn batch_strategy(&self) -> BatchStrategy {
        if self.saturate {
            BatchStrategy::Saturate
        } else if self.adaptive {
            BatchStrategy::Adaptive {
                target_round: Duration::from_millis(self.target_ms),
            }
        } else {
            BatchStrategy::Fixed(self.batch_size)
        }
    }

    fn checkpoint_path(&self, root: &std::path::Path) -> Option<PathBuf> {
        if self.no_state {
            return None;
        }
        if let Some(path) = &self.state {
            return Some(path.clone());
        }
        let path = dirs::cache_dir().map(|d| checkpoint_path_for(root, &d.join("tidy")));
        if path.is_none() {
            warn!("No cache directory available, progress will not be saved");
        }
        path
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    setup_logging(args.verbose);

    // Resolve path
    let path = args
        .path
        .clone()
        .canonicalize()
        .unwrap_or(args.path.clone());

    // Validate path
    if !path.exists() {
        eprintln!("Error: Path does not exist: {}", path.display());
        std::process::exit(1);
    }
    if !path.is_dir() {
        eprintln!("Error: Path is not a directory: {}", path.display());
        std::process::exit(1);
    }

    let config = TraversalConfig {
        checkpoint: args.checkpoint_path(&path),
        resume: !args.fresh,
        workers: args.workers,
        batch: args.batch_strategy(),
        follow_symlinks: args.follow_symlinks,
        same_filesystem: !args.cross_filesystems,
        round_limit: args.max_rounds,
        ..TraversalConfig::new(path)
    };
    let checkpoint = config.checkpoint.clone();

    // Finish the current round on Ctrl-C so the checkpoint stays usable
    let cancel_token = CancellationToken::new();
    let token_for_signal = cancel_token.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, stopping after the current round...");
        token_for_signal.cancel();
    })
    .wrap_err("Failed to set signal handler")?;

    let start = Instant::now();
    let (rx, handle) = Traversal::new(config)
        .with_cancellation(cancel_token)
        .run();

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    for msg in rx {
        match msg {
            TraversalMessage::Started {
                resumed: Some(pending),
                ..
            } => {
                eprintln!("Resuming with {} pending directories", format_count(pending as u64));
            }
            TraversalMessage::Entry(entry) if !args.quiet => {
                // Downstream may close early (piped into head); keep draining
                let _ = print_entry(&mut out, &entry);
            }
            TraversalMessage::CheckpointFailed(e) => {
                eprintln!("Warning: progress is no longer being saved: {}", e);
            }
            _ => {}
        }
    }
    let _ = out.flush();

    let report = handle
        .join()
        .map_err(|_| eyre!("traversal thread panicked"))??;

    print_summary(&report, start.elapsed(), checkpoint.as_deref());

    Ok(())
}

fn print_entry(out: &mut impl Write, entry: &DiscoveredEntry) -> io::Result<()> {
    writeln!(
        out,
        "{:>10}  {}",
        format_size(entry.metadata.size),
        entry.path.display()
    )
}

fn print_summary(report: &TraversalReport, elapsed: Duration, checkpoint: Option<&std::path::Path>) {
    let progress = &report.progress;
    let status = match report.outcome {
        TraversalOutcome::Completed => "Completed",
        TraversalOutcome::Paused => "Paused",
        TraversalOutcome::Cancelled => "Cancelled",
    };

    eprintln!(
        "{}: {} files ({}) in {} directories, {} rounds, {}",
        status,
        format_count(progress.files_found),
        format_size(progress.bytes_found),
        format_count(progress.dirs_found),
        format_count(report.rounds_this_run),
        format_duration(elapsed)
    );

    if progress.errors() > 0 {
        eprintln!(
            "Skipped: {} unreadable directories, {} entries without metadata",
            format_count(progress.unreadable_dirs),
            format_count(progress.metadata_errors)
        );
    }

    if !report.is_complete()
        && let Some(path) = checkpoint
    {
        eprintln!(
            "{} directories still pending; run again to resume ({})",
            format_count(progress.queue_depth as u64),
            path.display()
        );
    }
}

fn setup_logging(verbose: bool) {
    let default = if verbose {
        "tidy_core=debug,tidy=debug,warn"
    } else {
        "tidy_core=info,tidy=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

//! Directory expansion and the worker pool that runs it.

use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, error, info, warn};

use crate::entry::{self, DirIdentity, DiscoveredEntry, EntryKind, EntryMetadata, device_id};
use crate::{Result, TidyError};

/// Settings shared by every expansion in a traversal
#[derive(Debug, Clone, Default)]
pub struct ExpandOptions {
    /// Expand symlinked directories instead of skipping them
    pub follow_symlinks: bool,
    /// Device of the traversal root; subdirectories elsewhere are skipped
    pub root_device: Option<u64>,
}

/// A child directory found while expanding a path
#[derive(Debug, Clone)]
pub struct Subdirectory {
    pub path: PathBuf,
    /// None when the directory could be listed but not stat'ed
    pub metadata: Option<EntryMetadata>,
    /// Set only when symlinks are followed
    pub identity: Option<DirIdentity>,
}

/// Result of expanding one directory
#[derive(Debug)]
pub struct Expansion {
    pub path: PathBuf,
    /// Files found directly inside `path`, sorted by path
    pub files: Vec<DiscoveredEntry>,
    /// Directories found directly inside `path`, sorted by path
    pub subdirectories: Vec<Subdirectory>,
    /// Children skipped because their metadata could not be read
    pub metadata_errors: u64,
    /// Set when `path` itself could not be listed
    pub error: Option<TidyError>,
}

impl Expansion {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            files: Vec::new(),
            subdirectories: Vec::new(),
            metadata_errors: 0,
            error: None,
        }
    }

    /// Sort one listed child into files or subdirectories
    fn admit(
        &mut self,
        child: PathBuf,
        listed_as_dir: bool,
        is_link: bool,
        stat: Result<Metadata>,
        options: &ExpandOptions,
    ) {
        let fs_meta = match stat {
            Ok(m) => m,
            Err(e) => {
                warn!("{}", e);
                self.metadata_errors += 1;
                // Keep directories we know about so their subtree is not lost
                if listed_as_dir {
                    self.subdirectories.push(Subdirectory {
                        path: child,
                        metadata: None,
                        identity: None,
                    });
                }
                return;
            }
        };

        let metadata = EntryMetadata::from_fs(&fs_meta);
        match metadata.kind {
            EntryKind::File => self.files.push(DiscoveredEntry {
                path: child,
                metadata,
            }),
            EntryKind::Directory => {
                if is_link && !options.follow_symlinks {
                    debug!(path = %child.display(), "Skipping symlinked directory");
                    return;
                }
                if let Some(root_dev) = options.root_device
                    && device_id(&fs_meta) != root_dev
                {
                    info!(path = %child.display(), "Skipping directory on another filesystem");
                    return;
                }

                let identity = if options.follow_symlinks {
                    DirIdentity::of(&child, &fs_meta)
                } else {
                    None
                };

                self.subdirectories.push(Subdirectory {
                    path: child,
                    metadata: Some(metadata),
                    identity,
                });
            }
        }
    }

    pub fn is_unreadable(&self) -> bool {
        self.error.is_some()
    }

    pub fn bytes(&self) -> u64 {
        self.files.iter().map(|f| f.metadata.size).sum()
    }
}

/// List the immediate children of `path`.
///
/// Never fails as a whole: a listing failure is recorded in
/// [`Expansion::error`] with empty results, and children whose metadata
/// cannot be read are skipped.
pub fn expand(path: &Path, options: &ExpandOptions) -> Expansion {
    let mut expansion = Expansion::new(path.to_path_buf());

    let read_dir = match fs::read_dir(path) {
        Ok(rd) => rd,
        Err(source) => {
            let err = TidyError::DirectoryUnreadable {
                path: path.to_path_buf(),
                source,
            };
            if err.is_permission_denied() {
                error!(path = %path.display(), "Permission denied");
            } else {
                error!("{}", err);
            }
            expansion.error = Some(err);
            return expansion;
        }
    };

    for entry_result in read_dir {
        let dir_entry = match entry_result {
            Ok(e) => e,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read directory entry");
                expansion.metadata_errors += 1;
                continue;
            }
        };

        let child = dir_entry.path();

        let file_type = match dir_entry.file_type() {
            Ok(ft) => ft,
            Err(e) => {
                warn!(path = %child.display(), error = %e, "Failed to determine entry type");
                expansion.metadata_errors += 1;
                continue;
            }
        };

        // Links are resolved for their metadata even when they are not followed
        let is_link = file_type.is_symlink();
        let stat = entry::stat(&child, options.follow_symlinks || is_link);
        expansion.admit(child, file_type.is_dir(), is_link, stat, options);
    }

    // Listing order is filesystem-defined; sort so reruns see the same order
    expansion.files.sort_by(|a, b| a.path.cmp(&b.path));
    expansion.subdirectories.sort_by(|a, b| a.path.cmp(&b.path));

    expansion
}

/// Number of workers to use when none is configured
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Bounded pool that expands a batch of directories concurrently
pub struct WorkerPool {
    pool: ThreadPool,
    capacity: usize,
}

impl WorkerPool {
    /// Create a pool with `workers` threads (0 = one per available core)
    pub fn new(workers: usize) -> Result<Self> {
        let capacity = if workers == 0 {
            default_worker_count()
        } else {
            workers
        };

        let pool = ThreadPoolBuilder::new()
            .num_threads(capacity)
            .thread_name(|i| format!("tidy-worker-{i}"))
            .build()
            .map_err(|e| TidyError::Io(io::Error::other(e)))?;

        Ok(Self { pool, capacity })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Expand every path in `batch`, one task per path, and wait for all of
    /// them. Results come back in dispatch order regardless of which task
    /// finished first.
    pub fn expand_batch(&self, batch: &[PathBuf], options: &ExpandOptions) -> Vec<Expansion> {
        self.pool
            .install(|| batch.par_iter().map(|path| expand(path, options)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        fs::create_dir(root.join("beta")).unwrap();
        fs::create_dir(root.join("alpha")).unwrap();
        fs::write(root.join("b.txt"), "bbbb").unwrap();
        fs::write(root.join("a.txt"), "aa").unwrap();
        fs::write(root.join("alpha/inner.txt"), "inner").unwrap();

        temp
    }

    #[test]
    fn test_expand_splits_files_and_directories() {
        let temp = create_test_tree();
        let expansion = expand(temp.path(), &ExpandOptions::default());

        assert!(expansion.error.is_none());
        let files: Vec<_> = expansion.files.iter().map(|f| f.file_name()).collect();
        assert_eq!(files, vec!["a.txt", "b.txt"]);
        let dirs: Vec<_> = expansion
            .subdirectories
            .iter()
            .map(|d| d.path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(dirs, vec!["alpha", "beta"]);
        assert_eq!(expansion.bytes(), 6);
    }

    #[test]
    fn test_expand_is_not_recursive() {
        let temp = create_test_tree();
        let expansion = expand(temp.path(), &ExpandOptions::default());
        assert!(!expansion.files.iter().any(|f| f.file_name() == "inner.txt"));
    }

    #[test]
    fn test_expand_empty_directory() {
        let temp = TempDir::new().unwrap();
        let expansion = expand(temp.path(), &ExpandOptions::default());

        assert!(expansion.files.is_empty());
        assert!(expansion.subdirectories.is_empty());
        assert!(!expansion.is_unreadable());
    }

    #[test]
    fn test_expand_missing_directory_is_isolated() {
        let temp = TempDir::new().unwrap();
        let expansion = expand(&temp.path().join("gone"), &ExpandOptions::default());

        assert!(matches!(
            expansion.error,
            Some(TidyError::DirectoryUnreadable { .. })
        ));
        assert!(expansion.files.is_empty());
        assert!(expansion.subdirectories.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directories_skipped_when_not_followed() {
        let temp = create_test_tree();
        std::os::unix::fs::symlink(temp.path().join("alpha"), temp.path().join("zlink")).unwrap();

        let expansion = expand(temp.path(), &ExpandOptions::default());
        assert!(!expansion.files.iter().any(|f| f.file_name() == "zlink"));
        assert_eq!(expansion.subdirectories.len(), 2);
        assert_eq!(expansion.metadata_errors, 0);

        let followed = expand(
            temp.path(),
            &ExpandOptions {
                follow_symlinks: true,
                root_device: None,
            },
        );
        assert_eq!(followed.subdirectories.len(), 3);
        assert!(followed.subdirectories.iter().all(|d| d.identity.is_some()));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_file_reports_target_metadata() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("big.bin"), vec![0u8; 4096]).unwrap();
        std::os::unix::fs::symlink(temp.path().join("big.bin"), temp.path().join("link.bin"))
            .unwrap();

        let expansion = expand(temp.path(), &ExpandOptions::default());
        let link = expansion
            .files
            .iter()
            .find(|f| f.file_name() == "link.bin")
            .unwrap();
        assert_eq!(link.metadata.kind, EntryKind::File);
        assert_eq!(link.metadata.size, 4096);
        assert_eq!(expansion.bytes(), 8192);
    }

    #[test]
    fn test_listed_directory_without_metadata_is_kept() {
        let mut expansion = Expansion::new(PathBuf::from("/data"));
        let unavailable = |path: &str| {
            Err(TidyError::MetadataUnavailable {
                path: PathBuf::from(path),
                source: io::Error::from(io::ErrorKind::PermissionDenied),
            })
        };
        let options = ExpandOptions::default();

        let sub = PathBuf::from("/data/sub");
        expansion.admit(sub.clone(), true, false, unavailable("/data/sub"), &options);
        let file = PathBuf::from("/data/f.txt");
        expansion.admit(file, false, false, unavailable("/data/f.txt"), &options);

        assert_eq!(expansion.metadata_errors, 2);
        assert!(expansion.files.is_empty());
        assert_eq!(expansion.subdirectories.len(), 1);
        assert_eq!(expansion.subdirectories[0].path, sub);
        assert!(expansion.subdirectories[0].metadata.is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_broken_symlink_skipped_when_followed() {
        let temp = TempDir::new().unwrap();
        std::os::unix::fs::symlink(temp.path().join("nowhere"), temp.path().join("dangling"))
            .unwrap();
        fs::write(temp.path().join("ok.txt"), "ok").unwrap();

        let expansion = expand(
            temp.path(),
            &ExpandOptions {
                follow_symlinks: true,
                root_device: None,
            },
        );
        assert_eq!(expansion.files.len(), 1);
        assert_eq!(expansion.metadata_errors, 1);
    }

    #[test]
    fn test_pool_preserves_dispatch_order() {
        let temp = create_test_tree();
        let pool = WorkerPool::new(4).unwrap();
        assert_eq!(pool.capacity(), 4);

        let batch = vec![
            temp.path().join("beta"),
            temp.path().join("missing"),
            temp.path().join("alpha"),
        ];
        let results = pool.expand_batch(&batch, &ExpandOptions::default());

        let order: Vec<_> = results.iter().map(|e| e.path.clone()).collect();
        assert_eq!(order, batch);
        assert!(results[1].is_unreadable());
        assert_eq!(results[2].files.len(), 1);
    }

    #[test]
    fn test_pool_default_capacity() {
        let pool = WorkerPool::new(0).unwrap();
        assert_eq!(pool.capacity(), default_worker_count());
        assert!(pool.capacity() >= 1);
    }
}

use std::collections::HashSet;
use std::fs::Metadata;
use std::path::Path;

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

/// Identity of a directory independent of the path it was reached through
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DirIdentity {
    /// Device and inode number
    Inode { dev: u64, ino: u64 },
    /// Canonical path, on platforms without inode numbers
    Canonical(std::path::PathBuf),
}

impl DirIdentity {
    #[cfg(unix)]
    pub fn of(_path: &Path, metadata: &Metadata) -> Option<Self> {
        Some(DirIdentity::Inode {
            dev: metadata.dev(),
            ino: metadata.ino(),
        })
    }

    #[cfg(not(unix))]
    pub fn of(path: &Path, _metadata: &Metadata) -> Option<Self> {
        path.canonicalize().ok().map(DirIdentity::Canonical)
    }
}

/// Set of directories already handed to the queue.
///
/// Only consulted when symlinks are followed; without following, the
/// directory graph is a tree and cannot loop.
#[derive(Debug, Default)]
pub struct VisitedDirs {
    seen: HashSet<DirIdentity>,
}

impl VisitedDirs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a directory; returns false if it was already recorded
    pub fn insert(&mut self, identity: DirIdentity) -> bool {
        self.seen.insert(identity)
    }
}

/// Get device ID for same-filesystem checks
#[cfg(unix)]
pub(crate) fn device_id(metadata: &Metadata) -> u64 {
    metadata.dev()
}

/// Get device ID (non-unix - not supported, return 0)
#[cfg(not(unix))]
pub(crate) fn device_id(_metadata: &Metadata) -> u64 {
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_same_directory_same_identity() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("a");
        fs::create_dir(&dir).unwrap();

        let first = DirIdentity::of(&dir, &fs::metadata(&dir).unwrap()).unwrap();
        let second = DirIdentity::of(&dir, &fs::metadata(&dir).unwrap()).unwrap();

        let mut visited = VisitedDirs::new();
        assert!(visited.insert(first));
        assert!(!visited.insert(second));
    }

    #[test]
    fn test_distinct_directories_distinct_identity() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a");
        let b = temp.path().join("b");
        fs::create_dir(&a).unwrap();
        fs::create_dir(&b).unwrap();

        let mut visited = VisitedDirs::new();
        assert!(visited.insert(DirIdentity::of(&a, &fs::metadata(&a).unwrap()).unwrap()));
        assert!(visited.insert(DirIdentity::of(&b, &fs::metadata(&b).unwrap()).unwrap()));
    }
}

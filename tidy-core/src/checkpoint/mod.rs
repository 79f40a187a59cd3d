mod state;

pub use state::{CHECKPOINT_MAGIC, CHECKPOINT_VERSION, TraversalState};

use std::collections::hash_map::DefaultHasher;
use std::fs::{self, File};
use std::hash::{Hash, Hasher};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use state::{CheckpointBody, CheckpointHeader, corrupt, path_from_bytes};

use crate::{Result, TidyError};

/// Get the checkpoint file path for a given root directory
pub fn checkpoint_path_for(root: &Path, state_dir: &Path) -> PathBuf {
    let hash = hash_path(root);
    state_dir.join(format!("{:016x}.tq", hash))
}

/// Hash a path to a u64 for the checkpoint filename
fn hash_path(path: &Path) -> u64 {
    let mut hasher = DefaultHasher::new();
    path.hash(&mut hasher);
    hasher.finish()
}

/// Durable storage for the pending-work queue
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist a traversal state
    ///
    /// File format:
    /// [4B] Magic "TDYQ"
    /// [4B] Version (u32 LE)
    /// [4B] Header length (u32 LE)
    /// [NB] Header (postcard)
    /// [4B] Body length (u32 LE)
    /// [MB] Body (postcard)
    /// [4B] CRC32 checksum of all preceding bytes
    ///
    /// The file is replaced by rename, so a reader sees either the previous
    /// checkpoint or the new one, never a partial write.
    pub fn save(&self, state: &TraversalState) -> Result<()> {
        let data = encode(state).map_err(|source| self.write_error(source))?;
        self.write_atomic(&data)
            .map_err(|source| self.write_error(source))
    }

    /// Load the last saved state. `Ok(None)` means no checkpoint exists.
    pub fn load(&self) -> Result<Option<TraversalState>> {
        let mut file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(TidyError::Io(e)),
        };

        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        decode(&data).map(Some)
    }

    fn write_atomic(&self, data: &[u8]) -> io::Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        // Write to temp file then rename
        let temp_path = self.temp_path();
        let result = write_synced(&temp_path, data).and_then(|_| fs::rename(&temp_path, &self.path));

        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
        }
        result
    }

    /// Sibling of the checkpoint; appended so it never equals the target
    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_error(&self, source: io::Error) -> TidyError {
        TidyError::CheckpointWrite {
            path: self.path.clone(),
            source,
        }
    }
}

fn write_synced(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(data)?;
    file.sync_all()
}

fn encode(state: &TraversalState) -> io::Result<Vec<u8>> {
    let mut data = Vec::new();

    data.extend_from_slice(&CHECKPOINT_MAGIC);
    data.extend_from_slice(&CHECKPOINT_VERSION.to_le_bytes());

    let header_bytes = postcard::to_allocvec(&CheckpointHeader::from(state))
        .map_err(|e| io::Error::other(format!("Failed to serialize header: {}", e)))?;
    data.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
    data.extend_from_slice(&header_bytes);

    let body_bytes = postcard::to_allocvec(&CheckpointBody::from(state))
        .map_err(|e| io::Error::other(format!("Failed to serialize queue: {}", e)))?;
    data.extend_from_slice(&(body_bytes.len() as u32).to_le_bytes());
    data.extend_from_slice(&body_bytes);

    let checksum = crc32fast::hash(&data);
    data.extend_from_slice(&checksum.to_le_bytes());

    Ok(data)
}

fn read_u32(data: &[u8], offset: usize) -> Result<u32> {
    data.get(offset..offset + 4)
        .and_then(|b| <[u8; 4]>::try_from(b).ok())
        .map(u32::from_le_bytes)
        .ok_or_else(|| corrupt("Unexpected end of checkpoint"))
}

fn decode(data: &[u8]) -> Result<TraversalState> {
    // magic(4) + version(4) + header_len(4) + body_len(4) + checksum(4)
    if data.len() < 20 {
        return Err(corrupt("Checkpoint file too small"));
    }

    let checksum_offset = data.len() - 4;
    let stored_checksum = read_u32(data, checksum_offset)?;
    let computed_checksum = crc32fast::hash(&data[..checksum_offset]);
    if stored_checksum != computed_checksum {
        return Err(corrupt("Checkpoint checksum mismatch"));
    }

    let mut offset = 0;

    if data[offset..offset + 4] != CHECKPOINT_MAGIC {
        return Err(corrupt("Invalid checkpoint magic"));
    }
    offset += 4;

    let version = read_u32(data, offset)?;
    if version != CHECKPOINT_VERSION {
        return Err(corrupt(format!(
            "Checkpoint version mismatch: expected {}, got {}",
            CHECKPOINT_VERSION, version
        )));
    }
    offset += 4;

    let header_len = read_u32(data, offset)? as usize;
    offset += 4;
    if offset + header_len > checksum_offset {
        return Err(corrupt("Invalid header length"));
    }
    let header: CheckpointHeader = postcard::from_bytes(&data[offset..offset + header_len])
        .map_err(|e| corrupt(format!("Failed to deserialize header: {}", e)))?;
    offset += header_len;

    let body_len = read_u32(data, offset)? as usize;
    offset += 4;
    if offset + body_len > checksum_offset {
        return Err(corrupt("Invalid body length"));
    }
    let body: CheckpointBody = postcard::from_bytes(&data[offset..offset + body_len])
        .map_err(|e| corrupt(format!("Failed to deserialize queue: {}", e)))?;

    if body.pending.len() as u64 != header.pending_count {
        return Err(corrupt(format!(
            "Queue length mismatch: header says {}, body has {}",
            header.pending_count,
            body.pending.len()
        )));
    }

    Ok(TraversalState {
        root: path_from_bytes(header.root)?,
        pending: body.into_paths()?,
        rounds_completed: header.rounds_completed,
        saved_at: header.saved_at,
    })
}

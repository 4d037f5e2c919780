//! On-disk persistence for published snapshots.
//!
//! # Storage Format
//!
//! A persisted snapshot is three files in the index directory:
//! - `vectors.bin`: header (24 bytes: magic, version, dimension, count,
//!   generation) followed by contiguous little-endian f32 rows
//! - `entries.json`: generation plus metadata rows in the same order as the
//!   vector rows
//! - `metadata.json`: model id, dimension, counts, generation and timestamps
//!
//! Each file is written to a `.tmp` sibling and renamed into place.
//! `metadata.json` is renamed last, so a snapshot without it is ignored.
//! Every save stamps all three files with a fresh generation id, and `load`
//! refuses files whose generations disagree, which is what a crash between
//! two renames leaves behind.

use chrono::{DateTime, Utc};
use memmap2::{Mmap, MmapOptions};
use serde::{Deserialize, Serialize};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use super::{EmbeddingEntry, EventMetadata, IndexSnapshot, VectorDimension, VectorError};

/// Current storage format version.
const STORAGE_VERSION: u32 = 2;

/// Size of the vector file header in bytes.
const HEADER_SIZE: usize = 24;

/// Magic bytes to identify vector storage files.
const MAGIC_BYTES: &[u8; 4] = b"EVEC";

/// Number of bytes per f32 value.
const BYTES_PER_F32: usize = 4;

const VECTORS_FILE: &str = "vectors.bin";
const ENTRIES_FILE: &str = "entries.json";
const METADATA_FILE: &str = "metadata.json";

/// Distinguishes saves made within the same clock tick.
static SAVE_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_generation(saved_at: DateTime<Utc>) -> u64 {
    let nanos = saved_at.timestamp_nanos_opt().unwrap_or_default() as u64;
    nanos.wrapping_add(SAVE_COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// Layout of `entries.json`.
#[derive(Serialize, Deserialize)]
struct EntriesFile<T> {
    generation: u64,
    entries: Vec<T>,
}

/// Describes a persisted snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// Identifier of the encoder that produced the vectors
    pub model_id: String,

    pub dimension: usize,

    pub entry_count: usize,

    /// When the snapshot was built
    pub built_at: DateTime<Utc>,

    /// When the snapshot was written to disk
    pub saved_at: DateTime<Utc>,

    /// Version of the storage format
    pub version: u32,

    /// Id shared by the three files written by one save
    pub generation: u64,
}

/// Reads and writes snapshots under one index directory.
///
/// Clones share one write lock, so a save abandoned by a timeout finishes
/// before the next one starts writing the same files.
#[derive(Debug, Clone)]
pub struct SnapshotPersistence {
    base_path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl SnapshotPersistence {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Check if a complete snapshot exists on disk
    pub fn exists(&self) -> bool {
        self.base_path.join(METADATA_FILE).exists()
    }

    /// Writes `snapshot`, replacing whatever was persisted before.
    pub fn save(&self, snapshot: &IndexSnapshot) -> Result<SnapshotMetadata, VectorError> {
        let _writing = self.write_lock.lock();
        std::fs::create_dir_all(&self.base_path)?;

        let saved_at = Utc::now();
        let metadata = SnapshotMetadata {
            model_id: snapshot.model_id().to_string(),
            dimension: snapshot.dimension().get(),
            entry_count: snapshot.len(),
            built_at: snapshot.built_at(),
            saved_at,
            version: STORAGE_VERSION,
            generation: next_generation(saved_at),
        };

        self.write_atomic(VECTORS_FILE, |w| {
            write_vectors(w, snapshot, metadata.generation)
        })?;

        let rows = EntriesFile {
            generation: metadata.generation,
            entries: snapshot.entries().iter().map(|e| &e.metadata).collect(),
        };
        self.write_atomic(ENTRIES_FILE, |w| {
            serde_json::to_writer(w, &rows).map_err(|e| VectorError::Serialization(e.to_string()))
        })?;

        self.write_atomic(METADATA_FILE, |w| {
            serde_json::to_writer_pretty(w, &metadata)
                .map_err(|e| VectorError::Serialization(e.to_string()))
        })?;

        debug!(
            path = %self.base_path.display(),
            entries = metadata.entry_count,
            "persisted snapshot"
        );
        Ok(metadata)
    }

    /// Reads only the metadata file.
    pub fn load_metadata(&self) -> Result<SnapshotMetadata, VectorError> {
        let json = std::fs::read_to_string(self.base_path.join(METADATA_FILE))?;
        let metadata: SnapshotMetadata =
            serde_json::from_str(&json).map_err(|e| VectorError::Serialization(e.to_string()))?;

        if metadata.version != STORAGE_VERSION {
            return Err(VectorError::VersionMismatch {
                expected: STORAGE_VERSION,
                actual: metadata.version,
            });
        }
        Ok(metadata)
    }

    /// Loads the persisted snapshot.
    pub fn load(&self) -> Result<IndexSnapshot, VectorError> {
        let metadata = self.load_metadata()?;
        let dimension = VectorDimension::new(metadata.dimension)?;

        let file = File::open(self.base_path.join(VECTORS_FILE))?;
        // SAFETY: the file is only ever replaced by rename, never written in place.
        let mmap = unsafe { MmapOptions::new().map(&file)? };
        let (vectors_generation, vectors) = read_vectors(&mmap, dimension)?;

        let entries_json = std::fs::read_to_string(self.base_path.join(ENTRIES_FILE))?;
        let EntriesFile {
            generation: entries_generation,
            entries: rows,
        } = serde_json::from_str::<EntriesFile<EventMetadata>>(&entries_json)
            .map_err(|e| VectorError::Serialization(e.to_string()))?;

        if vectors_generation != metadata.generation || entries_generation != metadata.generation
        {
            return Err(VectorError::InvalidFormat(format!(
                "snapshot files from different saves: metadata {}, vectors {vectors_generation}, entries {entries_generation}",
                metadata.generation
            )));
        }

        if rows.len() != vectors.len() || rows.len() != metadata.entry_count {
            return Err(VectorError::InvalidFormat(format!(
                "entry count mismatch: metadata {}, vectors {}, entries {}",
                metadata.entry_count,
                vectors.len(),
                rows.len()
            )));
        }

        let entries = vectors
            .into_iter()
            .zip(rows)
            .map(|(vector, meta)| EmbeddingEntry::new(vector, meta))
            .collect();

        IndexSnapshot::build_at(entries, dimension, metadata.model_id, metadata.built_at)
    }

    fn write_atomic<F>(&self, name: &str, write: F) -> Result<(), VectorError>
    where
        F: FnOnce(&mut BufWriter<File>) -> Result<(), VectorError>,
    {
        let final_path = self.base_path.join(name);
        let tmp_path = self.base_path.join(format!("{name}.tmp"));

        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        write(&mut writer)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        drop(writer);

        std::fs::rename(&tmp_path, &final_path)?;
        Ok(())
    }
}

fn write_vectors<W: Write>(
    w: &mut W,
    snapshot: &IndexSnapshot,
    generation: u64,
) -> Result<(), VectorError> {
    w.write_all(MAGIC_BYTES)?;
    w.write_all(&STORAGE_VERSION.to_le_bytes())?;
    w.write_all(&(snapshot.dimension().get() as u32).to_le_bytes())?;
    w.write_all(&(snapshot.len() as u32).to_le_bytes())?;
    w.write_all(&generation.to_le_bytes())?;

    for entry in snapshot.entries() {
        for &value in &entry.vector {
            w.write_all(&value.to_le_bytes())?;
        }
    }
    Ok(())
}

fn read_vectors(
    mmap: &Mmap,
    expected: VectorDimension,
) -> Result<(u64, Vec<Vec<f32>>), VectorError> {
    if mmap.len() < HEADER_SIZE {
        return Err(VectorError::InvalidFormat(
            "File too small to contain header".to_string(),
        ));
    }

    if &mmap[0..4] != MAGIC_BYTES {
        return Err(VectorError::InvalidFormat("Invalid magic bytes".to_string()));
    }

    let read_u32 = |at: usize| u32::from_le_bytes([mmap[at], mmap[at + 1], mmap[at + 2], mmap[at + 3]]);

    let version = read_u32(4);
    if version != STORAGE_VERSION {
        return Err(VectorError::VersionMismatch {
            expected: STORAGE_VERSION,
            actual: version,
        });
    }

    let dimension = read_u32(8) as usize;
    if dimension != expected.get() {
        return Err(VectorError::DimensionMismatch {
            expected: expected.get(),
            actual: dimension,
        });
    }

    let count = read_u32(12) as usize;
    let mut generation = [0u8; 8];
    generation.copy_from_slice(&mmap[16..24]);
    let generation = u64::from_le_bytes(generation);
    let row_size = dimension * BYTES_PER_F32;
    if mmap.len() != HEADER_SIZE + count * row_size {
        return Err(VectorError::InvalidFormat(format!(
            "expected {count} rows of {dimension} floats, file is {} bytes",
            mmap.len()
        )));
    }

    let vectors = mmap[HEADER_SIZE..]
        .chunks_exact(row_size)
        .map(|row| {
            row.chunks_exact(BYTES_PER_F32)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect()
        })
        .collect();

    Ok((generation, vectors))
}

//! File-backed document store
//!
//! One file per record, laid out as a directory tree mirroring the key path.
//!
//! ## Layout
//! ```text
//! {root}/
//!   ├── Guild_Name.d/
//!   │     ├── record.bin
//!   │     └── Commands.d/
//!   │           └── record.bin
//!   └── Misery.d/ ...
//! ```
//! Segment directories carry a `.d` suffix so no segment can collide with
//! the record file name.
//!
//! ## Record File Format
//! ```text
//! ┌─────────┬─────────┬──────────────────────┐
//! │ CRC (4) │ Len (4) │ bincode(Record)      │
//! └─────────┴─────────┴──────────────────────┘
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::{MiseryError, Result};
use crate::value::Record;

use super::DocumentStore;

/// Name of the file holding a record inside its directory
pub const RECORD_FILENAME: &str = "record.bin";

const SEGMENT_SUFFIX: &str = ".d";
const HEADER_SIZE: usize = 8;

/// Durable document store rooted at a directory
///
/// ## Concurrency:
/// - Writes (set/delete) are serialized by `write_lock`
/// - Reads go straight to the filesystem; writes replace files atomically
///   via rename, so a reader sees either the old or the new record
pub struct FileStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open or create a store at `root`
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| unavailable(&root, e))?;
        tracing::debug!("File store opened at {}", root.display());
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    /// Root directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory that holds the record at `path` and its children
    pub fn record_dir(&self, path: &[String]) -> Result<PathBuf> {
        let mut dir = self.root.clone();
        for segment in path {
            if segment.is_empty() || segment.contains(['/', '\\', '\0']) {
                return Err(MiseryError::invalid_key(
                    &path.join("/"),
                    format!("segment {:?} cannot be stored on disk", segment),
                ));
            }
            dir.push(format!("{}{}", segment, SEGMENT_SUFFIX));
        }
        Ok(dir)
    }

    fn read_record(&self, file_path: &Path) -> Result<Option<Record>> {
        let mut file = match File::open(file_path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(unavailable(file_path, e)),
        };

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .map_err(|e| unavailable(file_path, e))?;

        decode_record(&bytes)
            .map(Some)
            .map_err(|e| match e {
                MiseryError::Corruption(msg) => {
                    MiseryError::Corruption(format!("{}: {}", file_path.display(), msg))
                }
                other => other,
            })
    }

    fn write_record(&self, dir: &Path, record: &Record) -> Result<()> {
        fs::create_dir_all(dir).map_err(|e| unavailable(dir, e))?;

        let bytes = encode_record(record)?;
        let tmp_path = dir.join(format!("{}.tmp", RECORD_FILENAME));
        let final_path = dir.join(RECORD_FILENAME);

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)
            .map_err(|e| unavailable(&tmp_path, e))?;
        file.write_all(&bytes)
            .and_then(|_| file.sync_all())
            .map_err(|e| unavailable(&tmp_path, e))?;

        fs::rename(&tmp_path, &final_path).map_err(|e| unavailable(&final_path, e))?;
        Ok(())
    }
}

impl DocumentStore for FileStore {
    fn get(&self, path: &[String]) -> Result<Option<Record>> {
        let dir = self.record_dir(path)?;
        self.read_record(&dir.join(RECORD_FILENAME))
    }

    fn set(&self, path: &[String], record: Record, merge: bool) -> Result<()> {
        let dir = self.record_dir(path)?;
        let _guard = self.write_lock.lock();

        let record = if merge {
            match self.read_record(&dir.join(RECORD_FILENAME))? {
                Some(mut existing) => {
                    existing.extend(record);
                    existing
                }
                None => record,
            }
        } else {
            record
        };

        self.write_record(&dir, &record)
    }

    fn delete(&self, path: &[String]) -> Result<bool> {
        let file_path = self.record_dir(path)?.join(RECORD_FILENAME);
        let _guard = self.write_lock.lock();

        match fs::remove_file(&file_path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(unavailable(&file_path, e)),
        }
    }

    fn children(&self, path: &[String]) -> Result<Vec<String>> {
        let dir = self.record_dir(path)?;
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(unavailable(&dir, e)),
        };

        let mut children = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| unavailable(&dir, e))?;
            let child_dir = entry.path();
            if !child_dir.join(RECORD_FILENAME).is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(segment) = name.strip_suffix(SEGMENT_SUFFIX) {
                children.push(segment.to_string());
            }
        }
        children.sort();
        Ok(children)
    }
}

/// Encode a record as `CRC (4) | Len (4) | bincode`
pub(crate) fn encode_record(record: &Record) -> Result<Vec<u8>> {
    let data = bincode::serialize(record)?;
    let len = u32::try_from(data.len())
        .map_err(|_| MiseryError::Serialization("record exceeds 4 GiB".to_string()))?;

    let mut out = Vec::with_capacity(HEADER_SIZE + data.len());
    out.extend_from_slice(&crc32fast::hash(&data).to_be_bytes());
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(&data);
    Ok(out)
}

/// Decode a record file, verifying length and checksum
pub(crate) fn decode_record(bytes: &[u8]) -> Result<Record> {
    if bytes.len() < HEADER_SIZE {
        return Err(MiseryError::Corruption(format!(
            "Incomplete header: expected {} bytes, got {}",
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let crc = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let len = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    let data = &bytes[HEADER_SIZE..];

    if data.len() != len {
        return Err(MiseryError::Corruption(format!(
            "Length mismatch: header says {} bytes, file has {}",
            len,
            data.len()
        )));
    }
    if crc32fast::hash(data) != crc {
        return Err(MiseryError::Corruption("CRC mismatch".to_string()));
    }

    Ok(bincode::deserialize(data)?)
}

fn unavailable(path: &Path, err: io::Error) -> MiseryError {
    MiseryError::StoreUnavailable(format!("{}: {}", path.display(), err))
}

//! Blob partitioning
//!
//! Splits a byte sequence into bounded chunks so values larger than a record's
//! size ceiling can be striped across several records, and joins them back.
//!
//! ## Partition Map
//! ```text
//! data:  ┌──────────── limit ───────────┬──────────── limit ───────────┬── rest ──┐
//!        └──────────────────────────────┴──────────────────────────────┴──────────┘
//! map:   "0" → chunk 0                   "1" → chunk 1                  "2" → rest
//! ```
//!
//! ## Ordering
//! `assemble` joins chunks in lexicographic key order, which only agrees with
//! index order while there are at most ten partitions (`"10"` sorts before
//! `"2"`). `assemble_numeric` joins in index order and validates the keys; the
//! datastore uses it.

use std::collections::BTreeMap;

use bytes::{Bytes, BytesMut};

use crate::error::{MiseryError, Result};

/// Default chunk ceiling, kept under the document store's 1 MiB record limit
pub const DEFAULT_PARTITION_LIMIT: usize = 900_000;

/// Partition index (stringified) → chunk
pub type PartitionMap = BTreeMap<String, Bytes>;

/// Splits and joins byte blobs around a fixed chunk size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobPartitioner {
    limit: usize,
}

impl BlobPartitioner {
    /// Create a partitioner with the given chunk ceiling
    pub fn new(limit: usize) -> Result<Self> {
        validate_limit(limit)?;
        Ok(Self { limit })
    }

    /// Chunk ceiling in bytes
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Whether a blob of `len` bytes needs more than one partition
    pub fn needs_partitioning(&self, len: usize) -> bool {
        len > self.limit
    }

    /// Number of partitions `disassemble` produces for a blob of `len` bytes
    pub fn partition_count(&self, len: usize) -> usize {
        len.div_ceil(self.limit)
    }

    pub fn disassemble(&self, data: impl AsRef<[u8]>) -> PartitionMap {
        split(data.as_ref(), self.limit)
    }

    pub fn assemble(&self, partitions: &PartitionMap) -> Bytes {
        assemble(partitions)
    }

    pub fn assemble_numeric(&self, partitions: &PartitionMap) -> Result<Bytes> {
        assemble_numeric(partitions)
    }
}

impl Default for BlobPartitioner {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PARTITION_LIMIT,
        }
    }
}

/// Split `data` into chunks of at most `partition_limit` bytes
///
/// Returns an empty map for empty input. Fails with `InvalidArgument` when the
/// limit is zero.
pub fn disassemble(data: impl AsRef<[u8]>, partition_limit: usize) -> Result<PartitionMap> {
    validate_limit(partition_limit)?;
    Ok(split(data.as_ref(), partition_limit))
}

/// Concatenate chunks in lexicographic key order
pub fn assemble(partitions: &PartitionMap) -> Bytes {
    let total = partitions.values().map(Bytes::len).sum();
    let mut out = BytesMut::with_capacity(total);
    // BTreeMap<String, _> iterates in lexicographic key order
    for chunk in partitions.values() {
        out.extend_from_slice(chunk);
    }
    out.freeze()
}

/// Concatenate chunks in ascending numeric index order
///
/// Keys must be canonical decimal indices forming the range `0..n`.
pub fn assemble_numeric(partitions: &PartitionMap) -> Result<Bytes> {
    let mut indexed = Vec::with_capacity(partitions.len());
    for (key, chunk) in partitions {
        let index = parse_index(key)?;
        indexed.push((index, chunk));
    }
    indexed.sort_by_key(|(index, _)| *index);

    let total = indexed.iter().map(|(_, chunk)| chunk.len()).sum();
    let mut out = BytesMut::with_capacity(total);
    for (expected, (index, chunk)) in indexed.into_iter().enumerate() {
        if index != expected {
            return Err(MiseryError::InvalidArgument(format!(
                "partition {} missing (next present index is {})",
                expected, index
            )));
        }
        out.extend_from_slice(chunk);
    }
    Ok(out.freeze())
}

/// Parse a canonical partition index ("0", "1", ...)
pub fn parse_index(key: &str) -> Result<usize> {
    let index: usize = key.parse().map_err(|_| {
        MiseryError::InvalidArgument(format!("partition key {:?} is not an index", key))
    })?;
    if index.to_string() != key {
        return Err(MiseryError::InvalidArgument(format!(
            "partition key {:?} is not in canonical form",
            key
        )));
    }
    Ok(index)
}

fn validate_limit(limit: usize) -> Result<()> {
    if limit == 0 {
        return Err(MiseryError::InvalidArgument(
            "partition limit must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Walk the input by offset; a chunk is sealed when the next offset lands on
/// a nonzero multiple of the limit, and whatever remains after the last
/// boundary is sealed at the end. An exact multiple therefore never produces
/// a trailing empty chunk.
fn split(data: &[u8], limit: usize) -> PartitionMap {
    let mut partitions = PartitionMap::new();
    let mut counter = 0usize;
    let mut current = BytesMut::with_capacity(limit.min(data.len()));

    let mut offset = 0;
    while offset < data.len() {
        if offset != 0 && offset % limit == 0 {
            partitions.insert(counter.to_string(), current.split().freeze());
            counter += 1;
        }
        // copy up to the next boundary in one step
        let end = (offset / limit + 1).saturating_mul(limit).min(data.len());
        current.extend_from_slice(&data[offset..end]);
        offset = end;
    }

    if !current.is_empty() {
        partitions.insert(counter.to_string(), current.freeze());
    }
    partitions
}

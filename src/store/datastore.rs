//! Keyed datastore facade
//!
//! Implements read/write by composite key on top of a `DocumentStore`.
//!
//! ## Blob Striping
//! A byte value larger than the partition limit is not written into its
//! record. Instead each chunk is written as the same field of a child record
//! and the parent field keeps a marker with the part count:
//!
//! ```text
//! Guild/Commands/Sticker          { image: Partitioned { parts: 3 } }
//! Guild/Commands/Sticker/%0       { image: Bytes(chunk 0) }
//! Guild/Commands/Sticker/%1       { image: Bytes(chunk 1) }
//! Guild/Commands/Sticker/%2       { image: Bytes(chunk 2) }
//! ```
//!
//! Stripe segments start with the field separator, which no parsed key can
//! carry in a segment, so user records and stripes never share a path.
//!
//! Chunks are written before the marker and stale chunks are cleared after
//! it, so a reader following a marker finds every part it names.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::{MiseryError, Result};
use crate::key::{CompositeKey, FIELD_SEPARATOR};
use crate::partition::{BlobPartitioner, PartitionMap};
use crate::value::{Record, Value};

use super::DocumentStore;

/// Read/write by composite key, with transparent blob partitioning
#[derive(Clone)]
pub struct Datastore {
    backend: Arc<dyn DocumentStore>,
    partitioner: BlobPartitioner,
}

impl Datastore {
    /// Create a datastore over `backend`
    pub fn new(backend: Arc<dyn DocumentStore>, partitioner: BlobPartitioner) -> Self {
        Self {
            backend,
            partitioner,
        }
    }

    /// The underlying document store
    pub fn backend(&self) -> &Arc<dyn DocumentStore> {
        &self.backend
    }

    pub fn partitioner(&self) -> BlobPartitioner {
        self.partitioner
    }

    /// Path segment holding partition `index` of a striped field
    pub fn stripe_segment(index: impl fmt::Display) -> String {
        format!("{}{}", FIELD_SEPARATOR, index)
    }

    /// Whether a child name returned by the backend is a stripe
    pub fn is_stripe_segment(segment: &str) -> bool {
        segment.starts_with(FIELD_SEPARATOR)
    }

    /// Read by key string
    ///
    /// - `path%field` → the field's value (reassembled if it was striped)
    /// - `path` → the whole record as a `Value::Map`, striped fields
    ///   reassembled
    ///
    /// Missing records and missing fields both read as `None`.
    pub fn read(&self, key: &str) -> Result<Option<Value>> {
        self.read_key(&CompositeKey::parse(key)?)
    }

    pub fn read_key(&self, key: &CompositeKey) -> Result<Option<Value>> {
        let path = key.segments();
        let record = match self.backend.get(path)? {
            Some(record) => record,
            None => return Ok(None),
        };

        match key.field() {
            None => {
                let mut map = Record::new();
                for (field, value) in record {
                    let value = match value {
                        Value::Partitioned { parts } => {
                            Value::Bytes(self.gather(path, &field, parts)?.to_vec())
                        }
                        other => other,
                    };
                    map.insert(field, value);
                }
                Ok(Some(Value::Map(map)))
            }
            Some(field) => match record.get(field) {
                None => Ok(None),
                Some(Value::Partitioned { parts }) => {
                    let data = self.gather(path, field, *parts)?;
                    Ok(Some(Value::Bytes(data.to_vec())))
                }
                Some(value) => Ok(Some(value.clone())),
            },
        }
    }

    /// Read a byte field, failing if the field holds another kind of value
    pub fn read_bytes(&self, key: &str) -> Result<Option<Bytes>> {
        match self.read(key)? {
            None => Ok(None),
            Some(Value::Bytes(b)) => Ok(Some(Bytes::from(b))),
            Some(other) => Err(MiseryError::InvalidArgument(format!(
                "{} holds {}, not bytes",
                key,
                other.kind()
            ))),
        }
    }

    /// Write by key string
    ///
    /// - `path%field` → `{field: value}` written into the record
    /// - `path` → `value` must be a map and is written as the record
    ///
    /// `merge` keeps fields not named by the write; without it the record is
    /// replaced. Partition markers are store-internal and rejected.
    pub fn write(&self, key: &str, value: Value, merge: bool) -> Result<()> {
        self.write_key(&CompositeKey::parse(key)?, value, merge)
    }

    pub fn write_key(&self, key: &CompositeKey, value: Value, merge: bool) -> Result<()> {
        let record = match key.field() {
            Some(field) => {
                let mut record = Record::new();
                record.insert(field.to_string(), value);
                record
            }
            None => match value {
                Value::Map(map) => map,
                other => {
                    return Err(MiseryError::InvalidArgument(format!(
                        "writing a whole record at {} needs a map, got {}",
                        key,
                        other.kind()
                    )))
                }
            },
        };

        if let Some(field) = record
            .iter()
            .find(|(_, value)| matches!(value, Value::Partitioned { .. }))
            .map(|(field, _)| field)
        {
            return Err(MiseryError::InvalidArgument(format!(
                "{}: field {:?} holds a partition marker, which only the store may write",
                key, field
            )));
        }
        self.write_record(key.segments(), record, merge)
    }

    /// Delete by key string
    ///
    /// - `path%field` → removes the field (and its stripes); a record left
    ///   with no fields is removed too
    /// - `path` → removes the record (and the stripes of all its fields)
    ///
    /// Returns `true` if something was removed.
    pub fn delete(&self, key: &str) -> Result<bool> {
        let key = CompositeKey::parse(key)?;
        let path = key.segments();
        let mut record = match self.backend.get(path)? {
            Some(record) => record,
            None => return Ok(false),
        };

        match key.field() {
            None => {
                for (field, parts) in striped_fields(&record) {
                    self.clear_stripes(path, &field, 0, parts)?;
                }
                self.backend.delete(path)
            }
            Some(field) => {
                let removed = match record.remove(field) {
                    Some(removed) => removed,
                    None => return Ok(false),
                };
                if record.is_empty() {
                    self.backend.delete(path)?;
                } else {
                    self.backend.set(path, record, false)?;
                }
                if let Value::Partitioned { parts } = removed {
                    self.clear_stripes(path, field, 0, parts)?;
                }
                Ok(true)
            }
        }
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn write_record(&self, path: &[String], record: Record, merge: bool) -> Result<()> {
        let previous = striped_fields(&self.backend.get(path)?.unwrap_or_default());

        let mut stored = Record::new();
        let mut new_parts = BTreeMap::new();
        for (field, value) in record {
            let value = self.stripe(path, &field, value)?;
            if let Value::Partitioned { parts } = value {
                new_parts.insert(field.clone(), parts);
            }
            stored.insert(field, value);
        }

        // Without merge, fields absent from the new record are dropped too
        let touched: Vec<String> = if merge {
            stored.keys().cloned().collect()
        } else {
            previous.keys().cloned().collect()
        };

        self.backend.set(path, stored, merge)?;

        for field in touched {
            let old = previous.get(&field).copied().unwrap_or(0);
            let new = new_parts.get(&field).copied().unwrap_or(0);
            if old > new {
                self.clear_stripes(path, &field, new, old)?;
            }
        }
        Ok(())
    }

    /// Write the chunks of an oversized byte value and return its marker;
    /// any other value passes through unchanged
    fn stripe(&self, path: &[String], field: &str, value: Value) -> Result<Value> {
        let data = match value {
            Value::Bytes(data) if self.partitioner.needs_partitioning(data.len()) => data,
            other => return Ok(other),
        };

        let partitions = self.partitioner.disassemble(&data);
        let parts = u32::try_from(partitions.len()).map_err(|_| {
            MiseryError::InvalidArgument(format!(
                "{} partitions exceed the addressable range",
                partitions.len()
            ))
        })?;

        for (index, chunk) in partitions {
            let mut child = Record::new();
            child.insert(field.to_string(), Value::Bytes(chunk.to_vec()));
            self.backend.set(&child_path(path, &index), child, true)?;
        }

        tracing::debug!(
            "Striped {} bytes of {}%{} across {} partitions",
            data.len(),
            path.join("/"),
            field,
            parts
        );
        Ok(Value::Partitioned { parts })
    }

    fn gather(&self, path: &[String], field: &str, parts: u32) -> Result<Bytes> {
        let mut partitions = PartitionMap::new();
        for index in 0..parts {
            let chunk = self
                .backend
                .get(&child_path(path, index))?
                .and_then(|mut record| record.remove(field));
            match chunk {
                Some(Value::Bytes(chunk)) => {
                    partitions.insert(index.to_string(), Bytes::from(chunk));
                }
                _ => {
                    return Err(MiseryError::Corruption(format!(
                        "{}%{} is missing partition {} of {}",
                        path.join("/"),
                        field,
                        index,
                        parts
                    )))
                }
            }
        }
        self.partitioner.assemble_numeric(&partitions)
    }

    /// Remove `field` from child records `from..to`, deleting children that
    /// end up empty
    fn clear_stripes(&self, path: &[String], field: &str, from: u32, to: u32) -> Result<()> {
        for index in from..to {
            let child = child_path(path, index);
            if let Some(mut record) = self.backend.get(&child)? {
                record.remove(field);
                if record.is_empty() {
                    self.backend.delete(&child)?;
                } else {
                    self.backend.set(&child, record, false)?;
                }
            }
        }
        Ok(())
    }
}

fn child_path(path: &[String], index: impl fmt::Display) -> Vec<String> {
    let mut child = path.to_vec();
    child.push(Datastore::stripe_segment(index));
    child
}

fn striped_fields(record: &Record) -> BTreeMap<String, u32> {
    record
        .iter()
        .filter_map(|(field, value)| match value {
            Value::Partitioned { parts } => Some((field.clone(), *parts)),
            _ => None,
        })
        .collect()
}

//! In-memory document store
//!
//! BTreeMap keyed by path, behind a RwLock.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::error::Result;
use crate::value::Record;

use super::DocumentStore;

/// Volatile document store
///
/// ## Concurrency:
/// - Reads take the read lock (many concurrent readers)
/// - `set` holds the write lock across the merge, so merges are atomic
pub struct MemoryStore {
    records: RwLock<BTreeMap<Vec<String>, Record>>,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of records held
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Check if the store holds no records
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, path: &[String]) -> Result<Option<Record>> {
        Ok(self.records.read().get(path).cloned())
    }

    fn set(&self, path: &[String], record: Record, merge: bool) -> Result<()> {
        let mut records = self.records.write();
        match records.get_mut(path) {
            Some(existing) if merge => existing.extend(record),
            _ => {
                records.insert(path.to_vec(), record);
            }
        }
        Ok(())
    }

    fn delete(&self, path: &[String]) -> Result<bool> {
        Ok(self.records.write().remove(path).is_some())
    }

    fn children(&self, path: &[String]) -> Result<Vec<String>> {
        let records = self.records.read();
        // Keys sharing a prefix are contiguous in a BTreeMap<Vec<String>, _>
        let children = records
            .range(path.to_vec()..)
            .take_while(|(key, _)| key.starts_with(path))
            .filter(|(key, _)| key.len() == path.len() + 1)
            .map(|(key, _)| key[path.len()].clone())
            .collect();
        Ok(children)
    }
}

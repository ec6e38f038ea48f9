//! Store Module
//!
//! Document-oriented persistence addressed by composite-key paths.
//!
//! ## Layers
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Datastore                               │
//! │  key parsing, field addressing,         │
//! │  blob striping across child records     │
//! └───────────────────┬─────────────────────┘
//!                     │ DocumentStore
//!          ┌──────────┴──────────┐
//!          ▼                     ▼
//!   ┌─────────────┐       ┌─────────────┐
//!   │ MemoryStore │       │  FileStore  │
//!   │  (RwLock)   │       │ (CRC files) │
//!   └─────────────┘       └─────────────┘
//! ```

mod datastore;
mod file;
mod memory;

pub use datastore::Datastore;
pub use file::{FileStore, RECORD_FILENAME};
pub use memory::MemoryStore;

use crate::error::Result;
use crate::value::Record;

/// Backing document store
///
/// Paths are normalized key segments. Implementations must be safe to share
/// between threads; every method takes `&self`.
pub trait DocumentStore: Send + Sync {
    /// Read the record at `path`
    ///
    /// Returns `Ok(None)` if no record exists there.
    fn get(&self, path: &[String]) -> Result<Option<Record>>;

    /// Write a record
    ///
    /// With `merge`, fields are unioned into any existing record (new values
    /// win); without it the record is replaced.
    fn set(&self, path: &[String], record: Record, merge: bool) -> Result<()>;

    /// Delete the record at `path`. Returns `true` if it existed.
    fn delete(&self, path: &[String]) -> Result<bool>;

    /// Names of the records directly below `path`, sorted
    fn children(&self, path: &[String]) -> Result<Vec<String>>;
}

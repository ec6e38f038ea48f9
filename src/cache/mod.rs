//! Cache Module
//!
//! Simple key/value cache in front of the document store.
//!
//! ## Backends
//! - `MemoryCache`: process-local map, used when no cache endpoint is configured
//! - `MemcachedCache`: memcached binary protocol with SASL PLAIN authentication

mod codec;
mod memcached;
mod memory;

pub use codec::{
    decode_packet, encode_packet, read_packet, write_packet, Magic, Opcode, Packet, Status,
    HEADER_SIZE, MAX_BODY_SIZE,
};
pub use memcached::{MemcachedCache, MAX_KEY_LEN};
pub use memory::MemoryCache;

use crate::error::Result;

/// Key/value cache
pub trait Cache: Send + Sync {
    /// Read a value. Returns `Ok(None)` on a miss.
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write a value, replacing any previous one
    fn write(&self, key: &str, value: &[u8]) -> Result<()>;
}

//! # Misery
//!
//! A chat bot that answers a few literal commands and keeps small keyed
//! values in a document store and a cache:
//! - Composite keys (`guild/command/name/id%field`) address records and fields
//! - Byte values larger than a record's ceiling are striped across records
//! - A memcached client (binary protocol, SASL PLAIN) for the cache
//! - A framed TCP gateway session driving the command loop
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Gateway (TCP)                            │
//! │              IDENTIFY / READY / MESSAGE / REPLY              │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                  Bot + Command Table                         │
//! │          (one event at a time, authorized set)               │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ Services
//!          ┌────────────┼─────────────────┐
//!          │            │                 │
//!          ▼            ▼                 ▼
//!   ┌─────────────┐ ┌─────────┐   ┌──────────────┐
//!   │  Datastore  │ │  Cache  │   │   Webhook    │
//!   │ key + parts │ │memcached│   │  HTTP POST   │
//!   └──────┬──────┘ └─────────┘   └──────────────┘
//!          │
//!          ▼
//!   ┌─────────────┐
//!   │DocumentStore│
//!   │ memory/file │
//!   └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod credentials;

pub mod key;
pub mod partition;
pub mod value;

pub mod store;
pub mod cache;
pub mod webhook;
pub mod services;

pub mod protocol;
pub mod network;
pub mod bot;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{MiseryError, Result};
pub use config::Config;
pub use key::CompositeKey;
pub use partition::{assemble, assemble_numeric, disassemble, BlobPartitioner, PartitionMap};
pub use value::{Record, Value};
pub use store::Datastore;
pub use services::Services;
pub use bot::Bot;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of Misery
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

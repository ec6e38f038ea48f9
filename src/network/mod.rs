//! Network Module
//!
//! Gateway sessions over TCP.
//!
//! ## Architecture
//! - `GatewayClient`: the bot's side; one event handled at a time
//! - `Relay`: a local stand-in for the gateway, used by the CLI and tests
//! - `Connection`: framed stream both sides share

mod client;
mod connection;
mod relay;

pub use client::{Exit, GatewayClient};
pub use connection::{Connection, Received};
pub use relay::{Relay, RelayEvent, RelaySession};

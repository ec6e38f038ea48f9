//! Protocol Module
//!
//! Defines the wire protocol spoken between the bot and its gateway.
//!
//! ## Protocol Format (V1 - Simple Binary)
//!
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Type (1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Frames
//! - 0x01: IDENTIFY - bot → gateway, token
//! - 0x02: READY    - gateway → bot, bot's own user id
//! - 0x03: MESSAGE  - gateway → bot, author + channel + content
//! - 0x04: REPLY    - bot → gateway, channel + content
//! - 0x05: CLOSE    - either side, empty
//!
//! ### Session
//! ```text
//! bot                      gateway
//!  │── IDENTIFY(token) ──────▶│
//!  │◀───────── READY(id) ─────│
//!  │◀──────── MESSAGE ────────│
//!  │── REPLY ────────────────▶│
//!  │            ...           │
//!  │── CLOSE ────────────────▶│
//! ```

mod codec;
mod frame;

pub use codec::{
    decode_frame, encode_frame, read_frame, write_frame, HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
pub use frame::{Frame, FrameType, Message};

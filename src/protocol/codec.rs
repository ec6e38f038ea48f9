//! Protocol codec
//!
//! Encoding and decoding functions for the gateway wire protocol.
//!
//! ## Wire Format
//!
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Type (1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Payload by Frame Type
//! - IDENTIFY: str(token)
//! - READY:    user_id (8)
//! - MESSAGE:  author_id (8) + channel_id (8) + str(content)
//! - REPLY:    channel_id (8) + str(content)
//! - CLOSE:    empty
//!
//! where `str(s)` is `len (4) + utf-8 bytes`. All integers are big-endian.

use std::io::{Read, Write};

use crate::error::{MiseryError, Result};
use super::{Frame, Message};

/// Header size: 1 byte frame type + 4 bytes length
pub const HEADER_SIZE: usize = 5;

/// Maximum payload size (16 MB)
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

// =============================================================================
// Frame Encoding/Decoding
// =============================================================================

/// Encode a frame to bytes
///
/// Format: frame_type (1) + payload_len (4) + payload
pub fn encode_frame(frame: &Frame) -> Vec<u8> {
    let mut payload = Vec::new();
    match frame {
        Frame::Identify { token } => put_str(&mut payload, token),
        Frame::Ready { user_id } => payload.extend_from_slice(&user_id.to_be_bytes()),
        Frame::Message(message) => {
            payload.extend_from_slice(&message.author_id.to_be_bytes());
            payload.extend_from_slice(&message.channel_id.to_be_bytes());
            put_str(&mut payload, &message.content);
        }
        Frame::Reply { channel_id, content } => {
            payload.extend_from_slice(&channel_id.to_be_bytes());
            put_str(&mut payload, content);
        }
        Frame::Close => {}
    }

    let mut message = Vec::with_capacity(HEADER_SIZE + payload.len());
    message.push(frame.frame_type() as u8);
    message.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    message.extend_from_slice(&payload);
    message
}

/// Decode a frame from bytes
pub fn decode_frame(bytes: &[u8]) -> Result<Frame> {
    if bytes.len() < HEADER_SIZE {
        return Err(MiseryError::Protocol(format!(
            "Incomplete header: expected {} bytes, got {}",
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let frame_type = bytes[0];
    let payload_len = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) as usize;

    if payload_len > MAX_PAYLOAD_SIZE as usize {
        return Err(MiseryError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            payload_len, MAX_PAYLOAD_SIZE
        )));
    }

    let total_len = HEADER_SIZE + payload_len;
    if bytes.len() < total_len {
        return Err(MiseryError::Protocol(format!(
            "Incomplete payload: expected {} bytes, got {}",
            total_len,
            bytes.len()
        )));
    }

    let mut payload = PayloadReader {
        bytes: &bytes[HEADER_SIZE..total_len],
        what: "",
    };

    let frame = match frame_type {
        0x01 => {
            payload.what = "IDENTIFY";
            Frame::Identify {
                token: payload.string()?,
            }
        }
        0x02 => {
            payload.what = "READY";
            Frame::Ready {
                user_id: payload.u64()?,
            }
        }
        0x03 => {
            payload.what = "MESSAGE";
            Frame::Message(Message {
                author_id: payload.u64()?,
                channel_id: payload.u64()?,
                content: payload.string()?,
            })
        }
        0x04 => {
            payload.what = "REPLY";
            Frame::Reply {
                channel_id: payload.u64()?,
                content: payload.string()?,
            }
        }
        0x05 => {
            payload.what = "CLOSE";
            Frame::Close
        }
        _ => {
            return Err(MiseryError::Protocol(format!(
                "Unknown frame type: 0x{:02x}",
                frame_type
            )))
        }
    };

    payload.finish()?;
    Ok(frame)
}

fn put_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u32).to_be_bytes());
    buf.extend_from_slice(s.as_bytes());
}

/// Cursor over a frame payload
struct PayloadReader<'a> {
    bytes: &'a [u8],
    what: &'static str,
}

impl<'a> PayloadReader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.bytes.len() < n {
            return Err(MiseryError::Protocol(format!(
                "{} frame: truncated payload (needed {} more bytes, had {})",
                self.what,
                n,
                self.bytes.len()
            )));
        }
        let (head, rest) = self.bytes.split_at(n);
        self.bytes = rest;
        Ok(head)
    }

    fn u64(&mut self) -> Result<u64> {
        let raw = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(raw);
        Ok(u64::from_be_bytes(buf))
    }

    fn string(&mut self) -> Result<String> {
        let raw = self.take(4)?;
        let len = u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize;
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec()).map_err(|e| {
            MiseryError::Protocol(format!("{} frame: invalid utf-8: {}", self.what, e))
        })
    }

    fn finish(self) -> Result<()> {
        if !self.bytes.is_empty() {
            return Err(MiseryError::Protocol(format!(
                "{} frame: unexpected {} trailing bytes",
                self.what,
                self.bytes.len()
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read a complete frame from a stream
///
/// Blocks until a complete frame is received or an error occurs
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Frame> {
    // Read header first
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let payload_len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;
    if payload_len > MAX_PAYLOAD_SIZE as usize {
        return Err(MiseryError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            payload_len, MAX_PAYLOAD_SIZE
        )));
    }

    let mut full_message = vec![0u8; HEADER_SIZE + payload_len];
    full_message[..HEADER_SIZE].copy_from_slice(&header);
    if payload_len > 0 {
        reader.read_exact(&mut full_message[HEADER_SIZE..])?;
    }

    decode_frame(&full_message)
}

/// Write a frame to a stream
pub fn write_frame<W: Write>(writer: &mut W, frame: &Frame) -> Result<()> {
    let bytes = encode_frame(frame);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

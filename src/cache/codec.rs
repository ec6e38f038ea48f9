//! Memcached binary protocol codec
//!
//! ## Packet Format
//! ```text
//! ┌──────────┬──────────┬───────────┬───────────┬───────────┬──────────────┐
//! │Magic (1) │Opcode (1)│KeyLen (2) │ExtLen (1) │DataTyp (1)│VBucket/Stat 2│
//! ├──────────┴──────────┴───────────┴───────────┴───────────┴──────────────┤
//! │ Total body length (4)                                                  │
//! ├────────────────────────────────────────────────────────────────────────┤
//! │ Opaque (4)                                                             │
//! ├────────────────────────────────────────────────────────────────────────┤
//! │ CAS (8)                                                                │
//! ├────────────────────────────────────────────────────────────────────────┤
//! │ Extras │ Key │ Value                                                   │
//! └────────────────────────────────────────────────────────────────────────┘
//! ```
//! All integers are big-endian. The body length covers extras, key and value.

use std::io::{Read, Write};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{MiseryError, Result};

/// Fixed header size
pub const HEADER_SIZE: usize = 24;

/// Largest body accepted from a peer (memcached's default item limit plus slack)
pub const MAX_BODY_SIZE: u32 = 2 * 1024 * 1024;

/// Packet direction marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Magic {
    Request = 0x80,
    Response = 0x81,
}

/// Operations used by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Get = 0x00,
    Set = 0x01,
    SaslAuth = 0x21,
}

impl Opcode {
    fn from_u8(byte: u8) -> Result<Self> {
        match byte {
            0x00 => Ok(Opcode::Get),
            0x01 => Ok(Opcode::Set),
            0x21 => Ok(Opcode::SaslAuth),
            _ => Err(MiseryError::Protocol(format!(
                "Unknown memcached opcode: 0x{:02x}",
                byte
            ))),
        }
    }
}

/// Response status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    NoError,
    KeyNotFound,
    KeyExists,
    ValueTooLarge,
    InvalidArguments,
    AuthError,
    AuthContinue,
    UnknownCommand,
    OutOfMemory,
    Other(u16),
}

impl Status {
    pub fn from_u16(code: u16) -> Self {
        match code {
            0x0000 => Status::NoError,
            0x0001 => Status::KeyNotFound,
            0x0002 => Status::KeyExists,
            0x0003 => Status::ValueTooLarge,
            0x0004 => Status::InvalidArguments,
            0x0020 => Status::AuthError,
            0x0021 => Status::AuthContinue,
            0x0081 => Status::UnknownCommand,
            0x0082 => Status::OutOfMemory,
            other => Status::Other(other),
        }
    }

    pub fn code(self) -> u16 {
        match self {
            Status::NoError => 0x0000,
            Status::KeyNotFound => 0x0001,
            Status::KeyExists => 0x0002,
            Status::ValueTooLarge => 0x0003,
            Status::InvalidArguments => 0x0004,
            Status::AuthError => 0x0020,
            Status::AuthContinue => 0x0021,
            Status::UnknownCommand => 0x0081,
            Status::OutOfMemory => 0x0082,
            Status::Other(code) => code,
        }
    }
}

/// A request or response packet
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub magic: Magic,
    pub opcode: Opcode,

    /// vbucket id in requests, status in responses
    pub status: Status,

    pub opaque: u32,
    pub cas: u64,
    pub extras: Bytes,
    pub key: Bytes,
    pub value: Bytes,
}

impl Packet {
    /// A request with no extras
    pub fn request(opcode: Opcode, key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            magic: Magic::Request,
            opcode,
            status: Status::NoError,
            opaque: 0,
            cas: 0,
            extras: Bytes::new(),
            key: key.into(),
            value: value.into(),
        }
    }

    /// A GET request
    pub fn get(key: &str) -> Self {
        Self::request(Opcode::Get, Bytes::copy_from_slice(key.as_bytes()), Bytes::new())
    }

    /// A SET request with zero flags and the given expiry in seconds
    pub fn set(key: &str, value: &[u8], expiry: u32) -> Self {
        let mut extras = BytesMut::with_capacity(8);
        extras.put_u32(0);
        extras.put_u32(expiry);
        Self {
            extras: extras.freeze(),
            ..Self::request(
                Opcode::Set,
                Bytes::copy_from_slice(key.as_bytes()),
                Bytes::copy_from_slice(value),
            )
        }
    }

    /// A SASL PLAIN authentication request
    pub fn sasl_plain(username: &str, password: &str) -> Self {
        let mut token = BytesMut::with_capacity(2 + username.len() + password.len());
        token.put_u8(0);
        token.put_slice(username.as_bytes());
        token.put_u8(0);
        token.put_slice(password.as_bytes());
        Self::request(Opcode::SaslAuth, Bytes::from_static(b"PLAIN"), token.freeze())
    }

    /// A response to `request` with the given status and value
    pub fn response_to(request: &Packet, status: Status, value: impl Into<Bytes>) -> Self {
        Self {
            magic: Magic::Response,
            opcode: request.opcode,
            status,
            opaque: request.opaque,
            cas: 0,
            extras: Bytes::new(),
            key: Bytes::new(),
            value: value.into(),
        }
    }

    fn body_len(&self) -> usize {
        self.extras.len() + self.key.len() + self.value.len()
    }
}

/// Encode a packet to bytes
pub fn encode_packet(packet: &Packet) -> Result<Bytes> {
    let key_len = u16::try_from(packet.key.len())
        .map_err(|_| MiseryError::Protocol(format!("Key too long: {} bytes", packet.key.len())))?;
    let extras_len = u8::try_from(packet.extras.len()).map_err(|_| {
        MiseryError::Protocol(format!("Extras too long: {} bytes", packet.extras.len()))
    })?;
    let body_len = u32::try_from(packet.body_len())
        .map_err(|_| MiseryError::Protocol("Body exceeds 4 GiB".to_string()))?;

    let mut out = BytesMut::with_capacity(HEADER_SIZE + packet.body_len());
    out.put_u8(packet.magic as u8);
    out.put_u8(packet.opcode as u8);
    out.put_u16(key_len);
    out.put_u8(extras_len);
    out.put_u8(0); // raw bytes data type
    out.put_u16(match packet.magic {
        Magic::Request => 0, // vbucket
        Magic::Response => packet.status.code(),
    });
    out.put_u32(body_len);
    out.put_u32(packet.opaque);
    out.put_u64(packet.cas);
    out.put_slice(&packet.extras);
    out.put_slice(&packet.key);
    out.put_slice(&packet.value);
    Ok(out.freeze())
}

/// Decode a complete packet from bytes
pub fn decode_packet(bytes: &[u8]) -> Result<Packet> {
    if bytes.len() < HEADER_SIZE {
        return Err(MiseryError::Protocol(format!(
            "Incomplete header: expected {} bytes, got {}",
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let mut header = &bytes[..HEADER_SIZE];
    let magic = match header.get_u8() {
        0x80 => Magic::Request,
        0x81 => Magic::Response,
        other => {
            return Err(MiseryError::Protocol(format!(
                "Bad magic byte: 0x{:02x}",
                other
            )))
        }
    };
    let opcode = Opcode::from_u8(header.get_u8())?;
    let key_len = header.get_u16() as usize;
    let extras_len = header.get_u8() as usize;
    let _data_type = header.get_u8();
    let status = Status::from_u16(header.get_u16());
    let body_len = header.get_u32();
    let opaque = header.get_u32();
    let cas = header.get_u64();

    if body_len > MAX_BODY_SIZE {
        return Err(MiseryError::Protocol(format!(
            "Body too large: {} bytes (max {})",
            body_len, MAX_BODY_SIZE
        )));
    }
    let body_len = body_len as usize;
    if extras_len + key_len > body_len {
        return Err(MiseryError::Protocol(format!(
            "Extras ({}) and key ({}) exceed body length {}",
            extras_len, key_len, body_len
        )));
    }
    if bytes.len() < HEADER_SIZE + body_len {
        return Err(MiseryError::Protocol(format!(
            "Incomplete body: expected {} bytes, got {}",
            body_len,
            bytes.len() - HEADER_SIZE
        )));
    }

    let body = &bytes[HEADER_SIZE..HEADER_SIZE + body_len];
    Ok(Packet {
        magic,
        opcode,
        status,
        opaque,
        cas,
        extras: Bytes::copy_from_slice(&body[..extras_len]),
        key: Bytes::copy_from_slice(&body[extras_len..extras_len + key_len]),
        value: Bytes::copy_from_slice(&body[extras_len + key_len..]),
    })
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read a complete packet from a stream
pub fn read_packet<R: Read>(reader: &mut R) -> Result<Packet> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let body_len = u32::from_be_bytes([header[8], header[9], header[10], header[11]]);
    if body_len > MAX_BODY_SIZE {
        return Err(MiseryError::Protocol(format!(
            "Body too large: {} bytes (max {})",
            body_len, MAX_BODY_SIZE
        )));
    }

    let mut message = vec![0u8; HEADER_SIZE + body_len as usize];
    message[..HEADER_SIZE].copy_from_slice(&header);
    reader.read_exact(&mut message[HEADER_SIZE..])?;

    decode_packet(&message)
}

/// Write a packet to a stream
pub fn write_packet<W: Write>(writer: &mut W, packet: &Packet) -> Result<()> {
    let bytes = encode_packet(packet)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

//! Protocol Codec Tests
//!
//! Tests verify:
//! - Every frame type survives the wire format
//! - Byte layout of headers and payloads
//! - Error handling for malformed input
//! - Stream-based I/O helpers

use std::io::Cursor;

use misery::protocol::{
    decode_frame, encode_frame, read_frame, write_frame, Frame, FrameType, HEADER_SIZE,
    MAX_PAYLOAD_SIZE,
};

// =============================================================================
// Frame Encoding Tests
// =============================================================================

#[test]
fn test_identify_layout() {
    let bytes = encode_frame(&Frame::Identify {
        token: "abc".to_string(),
    });

    assert_eq!(bytes[0], FrameType::Identify as u8);
    // payload = 4-byte length + "abc"
    assert_eq!(&bytes[1..5], &7u32.to_be_bytes());
    assert_eq!(&bytes[5..9], &3u32.to_be_bytes());
    assert_eq!(&bytes[9..], b"abc");
}

#[test]
fn test_close_is_header_only() {
    let bytes = encode_frame(&Frame::Close);
    assert_eq!(bytes.len(), HEADER_SIZE);
    assert_eq!(bytes, vec![0x05, 0, 0, 0, 0]);
}

#[test]
fn test_ready_carries_user_id() {
    let bytes = encode_frame(&Frame::Ready { user_id: 42 });
    assert_eq!(bytes.len(), HEADER_SIZE + 8);
    assert_eq!(&bytes[5..], &42u64.to_be_bytes());
}

#[test]
fn test_every_frame_decodes_to_itself() {
    let frames = vec![
        Frame::Identify {
            token: "secret-token".to_string(),
        },
        Frame::Ready { user_id: u64::MAX },
        Frame::message(7, 11, "misery dispatch deploy"),
        Frame::Reply {
            channel_id: 11,
            content: "Deploy request sent".to_string(),
        },
        Frame::Close,
    ];

    for frame in frames {
        let decoded = decode_frame(&encode_frame(&frame)).unwrap();
        assert_eq!(decoded, frame);
    }
}

#[test]
fn test_unicode_and_empty_content() {
    for content in ["", "pong 🏓", "ünïcödé\nmulti-line"] {
        let frame = Frame::message(1, 2, content);
        assert_eq!(decode_frame(&encode_frame(&frame)).unwrap(), frame);
    }
}

// =============================================================================
// Error Handling Tests
// =============================================================================

#[test]
fn test_decode_incomplete_header() {
    let result = decode_frame(&[0x01, 0x00]);
    assert!(result.is_err());
    assert!(result
        .unwrap_err()
        .to_string()
        .contains("Incomplete header"));
}

#[test]
fn test_decode_incomplete_payload() {
    let mut bytes = encode_frame(&Frame::Ready { user_id: 1 });
    bytes.truncate(bytes.len() - 2);

    let result = decode_frame(&bytes);
    assert!(result
        .unwrap_err()
        .to_string()
        .contains("Incomplete payload"));
}

#[test]
fn test_decode_unknown_frame_type() {
    let result = decode_frame(&[0xFF, 0, 0, 0, 0]);
    assert!(result
        .unwrap_err()
        .to_string()
        .contains("Unknown frame type"));
}

#[test]
fn test_decode_payload_too_large() {
    let mut bytes = vec![0x03];
    bytes.extend_from_slice(&(MAX_PAYLOAD_SIZE + 1).to_be_bytes());

    let result = decode_frame(&bytes);
    assert!(result.unwrap_err().to_string().contains("Payload too large"));
}

#[test]
fn test_decode_trailing_bytes() {
    // CLOSE with a one-byte payload
    let result = decode_frame(&[0x05, 0, 0, 0, 1, 0xAA]);
    assert!(result.unwrap_err().to_string().contains("trailing"));
}

#[test]
fn test_decode_truncated_string() {
    // IDENTIFY whose string claims 10 bytes but carries 2
    let mut bytes = vec![0x01, 0, 0, 0, 6];
    bytes.extend_from_slice(&10u32.to_be_bytes());
    bytes.extend_from_slice(b"ab");

    let result = decode_frame(&bytes);
    assert!(result.unwrap_err().to_string().contains("truncated"));
}

#[test]
fn test_decode_invalid_utf8() {
    let mut bytes = vec![0x01, 0, 0, 0, 6];
    bytes.extend_from_slice(&2u32.to_be_bytes());
    bytes.extend_from_slice(&[0xC3, 0x28]);

    let result = decode_frame(&bytes);
    assert!(result.unwrap_err().to_string().contains("utf-8"));
}

// =============================================================================
// Stream I/O Tests
// =============================================================================

#[test]
fn test_stream_read_write_sequence() {
    let mut buffer = Vec::new();
    write_frame(&mut buffer, &Frame::Identify { token: "t".into() }).unwrap();
    write_frame(&mut buffer, &Frame::message(1, 2, "ping")).unwrap();
    write_frame(&mut buffer, &Frame::Close).unwrap();

    let mut cursor = Cursor::new(buffer);
    assert_eq!(
        read_frame(&mut cursor).unwrap(),
        Frame::Identify { token: "t".into() }
    );
    assert_eq!(read_frame(&mut cursor).unwrap(), Frame::message(1, 2, "ping"));
    assert_eq!(read_frame(&mut cursor).unwrap(), Frame::Close);

    // stream exhausted
    assert!(read_frame(&mut cursor).is_err());
}

#[test]
fn test_stream_read_truncated_frame() {
    let mut bytes = encode_frame(&Frame::message(1, 2, "hello"));
    bytes.truncate(bytes.len() - 1);

    let mut cursor = Cursor::new(bytes);
    assert!(read_frame(&mut cursor).is_err());
}

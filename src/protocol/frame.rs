//! Frame definitions
//!
//! Represents events and replies exchanged with the gateway.

/// Frame types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    Identify = 0x01,
    Ready = 0x02,
    Message = 0x03,
    Reply = 0x04,
    Close = 0x05,
}

/// A message posted in a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Numeric identity of the sender
    pub author_id: u64,

    /// Channel the message was posted in
    pub channel_id: u64,

    /// Raw message body
    pub content: String,
}

/// A parsed frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Bot → gateway: authenticate with a token
    Identify { token: String },

    /// Gateway → bot: session established, carries the bot's own identity
    Ready { user_id: u64 },

    /// Gateway → bot: a message event
    Message(Message),

    /// Bot → gateway: post `content` to a channel
    Reply { channel_id: u64, content: String },

    /// Either side: end the session
    Close,
}

impl Frame {
    /// Get the frame type
    pub fn frame_type(&self) -> FrameType {
        match self {
            Frame::Identify { .. } => FrameType::Identify,
            Frame::Ready { .. } => FrameType::Ready,
            Frame::Message(_) => FrameType::Message,
            Frame::Reply { .. } => FrameType::Reply,
            Frame::Close => FrameType::Close,
        }
    }

    /// Convenience constructor for a message event
    pub fn message(author_id: u64, channel_id: u64, content: impl Into<String>) -> Self {
        Frame::Message(Message {
            author_id,
            channel_id,
            content: content.into(),
        })
    }
}

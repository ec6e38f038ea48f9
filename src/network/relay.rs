//! Gateway Relay
//!
//! Plays the gateway's role locally: accepts a bot, checks its token, feeds
//! it message events and collects its replies.

use std::net::{Shutdown, SocketAddr, TcpListener};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError};

use crate::error::{MiseryError, Result};
use crate::protocol::Frame;

use super::{Connection, Received};

/// Something the bot sent back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    Reply { channel_id: u64, content: String },

    /// The bot closed the session or disconnected
    Closed,
}

/// Listening side of the gateway protocol
pub struct Relay {
    listener: TcpListener,
    token: String,
    bot_user_id: u64,
}

impl Relay {
    /// Bind to `addr`; bots must identify with `token` and are told they are
    /// `bot_user_id`
    pub fn bind(addr: &str, token: impl Into<String>, bot_user_id: u64) -> Result<Self> {
        let listener = TcpListener::bind(addr)?;
        tracing::info!("Relay listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            token: token.into(),
            bot_user_id,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Wait for one bot to connect and identify
    ///
    /// A wrong token gets CLOSE and an `Unauthorized` error.
    pub fn accept(&self) -> Result<RelaySession> {
        let (stream, _) = self.listener.accept()?;
        let mut connection = Connection::new(stream)?;

        let token = loop {
            match connection.recv()? {
                Received::Frame(Frame::Identify { token }) => break token,
                Received::Idle => continue,
                Received::Closed => {
                    return Err(MiseryError::Protocol(
                        "bot disconnected before IDENTIFY".to_string(),
                    ))
                }
                Received::Frame(other) => {
                    return Err(MiseryError::Protocol(format!(
                        "expected IDENTIFY, got {:?}",
                        other.frame_type()
                    )))
                }
            }
        };

        if token != self.token {
            tracing::warn!("Rejecting bot at {}: bad token", connection.peer_addr());
            connection.close()?;
            return Err(MiseryError::Unauthorized("bad gateway token".to_string()));
        }

        connection.send(&Frame::Ready {
            user_id: self.bot_user_id,
        })?;
        tracing::info!("Bot identified from {}", connection.peer_addr());

        RelaySession::start(connection)
    }
}

/// An identified bot session
///
/// A reader thread forwards replies into a channel so callers can inject
/// messages and wait for replies independently.
pub struct RelaySession {
    connection: Connection,
    events: Receiver<RelayEvent>,
    reader: Option<JoinHandle<()>>,
}

impl RelaySession {
    fn start(connection: Connection) -> Result<Self> {
        let mut reader = Connection::new(connection.try_clone_stream()?)?;
        let (tx, rx) = channel::unbounded();

        let handle = thread::spawn(move || loop {
            let event = match reader.recv() {
                Ok(Received::Frame(Frame::Reply {
                    channel_id,
                    content,
                })) => RelayEvent::Reply {
                    channel_id,
                    content,
                },
                Ok(Received::Idle) => continue,
                Ok(Received::Frame(Frame::Close)) | Ok(Received::Closed) => {
                    let _ = tx.send(RelayEvent::Closed);
                    return;
                }
                Ok(Received::Frame(other)) => {
                    tracing::warn!("Relay ignoring {:?} from bot", other.frame_type());
                    continue;
                }
                Err(e) => {
                    tracing::warn!("Relay read failed: {}", e);
                    let _ = tx.send(RelayEvent::Closed);
                    return;
                }
            };
            if tx.send(event).is_err() {
                return;
            }
        });

        Ok(Self {
            connection,
            events: rx,
            reader: Some(handle),
        })
    }

    /// Deliver a message event to the bot
    pub fn send_message(&mut self, author_id: u64, channel_id: u64, content: &str) -> Result<()> {
        self.connection
            .send(&Frame::message(author_id, channel_id, content))
    }

    /// Wait up to `timeout` for the bot's next reply or close
    pub fn next_event(&self, timeout: Duration) -> Option<RelayEvent> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// The raw event channel
    pub fn events(&self) -> &Receiver<RelayEvent> {
        &self.events
    }

    /// Close the session and wait for the reader thread
    pub fn close(mut self) -> Result<()> {
        self.connection.close()?;
        // unblocks the reader thread even if the bot keeps its end open
        let _ = self.connection.try_clone_stream()?.shutdown(Shutdown::Both);
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
        Ok(())
    }
}

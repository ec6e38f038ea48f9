//! Gateway Connection
//!
//! A framed, buffered TCP stream shared by the bot-side client and the relay.

use std::io::{self, BufRead, BufReader, BufWriter};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::bot::ReplySink;
use crate::error::{MiseryError, Result};
use crate::protocol::{read_frame, write_frame, Frame};

/// Outcome of waiting for a frame
#[derive(Debug)]
pub enum Received {
    /// A complete frame arrived
    Frame(Frame),

    /// The read timeout elapsed before any byte arrived
    Idle,

    /// The peer went away
    Closed,
}

/// A single framed connection
pub struct Connection {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    /// Wrap an established stream
    pub fn new(stream: TcpStream) -> Result<Self> {
        // Get peer address for logging before we split the stream
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        // Clone stream for separate read/write handles
        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(write_stream),
            peer_addr,
        })
    }

    /// Connect to `addr`
    pub fn connect(addr: &str, timeout: Duration) -> Result<Self> {
        let socket = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| MiseryError::Config(format!("{} resolved to no address", addr)))?;
        let stream = TcpStream::connect_timeout(&socket, timeout)?;
        Self::new(stream)
    }

    /// Configure connection timeouts
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        let read_stream = self.reader.get_ref();
        let write_stream = self.writer.get_ref();

        if read_ms > 0 {
            read_stream.set_read_timeout(Some(Duration::from_millis(read_ms)))?;
        }
        if write_ms > 0 {
            write_stream.set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }

        Ok(())
    }

    /// Wait for the next frame
    ///
    /// A timeout is only reported as `Idle` when no byte of a frame has been
    /// consumed; a frame that stalls halfway is an error.
    pub fn recv(&mut self) -> Result<Received> {
        match self.reader.fill_buf() {
            Ok(buf) if buf.is_empty() => {
                tracing::debug!("Peer {} disconnected", self.peer_addr);
                return Ok(Received::Closed);
            }
            Ok(_) => {}
            Err(ref e) if is_timeout(e) => return Ok(Received::Idle),
            Err(ref e) if is_disconnect(e) => {
                tracing::debug!("Connection to {} lost: {}", self.peer_addr, e);
                return Ok(Received::Closed);
            }
            Err(e) => return Err(e.into()),
        }

        match read_frame(&mut self.reader) {
            Ok(frame) => {
                tracing::trace!("Received from {}: {:?}", self.peer_addr, frame);
                Ok(Received::Frame(frame))
            }
            Err(MiseryError::Io(ref e))
                if e.kind() == io::ErrorKind::UnexpectedEof || is_disconnect(e) =>
            {
                tracing::debug!("Peer {} disconnected mid-frame", self.peer_addr);
                Ok(Received::Closed)
            }
            Err(MiseryError::Io(ref e)) if is_timeout(e) => Err(MiseryError::Protocol(format!(
                "frame from {} stalled",
                self.peer_addr
            ))),
            Err(e) => Err(e),
        }
    }

    /// Send a frame
    pub fn send(&mut self, frame: &Frame) -> Result<()> {
        write_frame(&mut self.writer, frame)
    }

    /// Send CLOSE, ignoring a peer that is already gone
    pub fn close(&mut self) -> Result<()> {
        match self.send(&Frame::Close) {
            Err(MiseryError::Io(ref e)) if is_disconnect(e) => Ok(()),
            other => other,
        }
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }

    /// Split off an independent handle to the underlying stream
    pub fn try_clone_stream(&self) -> Result<TcpStream> {
        Ok(self.reader.get_ref().try_clone()?)
    }
}

impl ReplySink for Connection {
    fn say(&mut self, channel_id: u64, content: &str) -> Result<()> {
        self.send(&Frame::Reply {
            channel_id,
            content: content.to_string(),
        })
    }
}

fn is_timeout(e: &io::Error) -> bool {
    // Windows reports TimedOut where Unix reports WouldBlock
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}

fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
    )
}

//! Memcached client
//!
//! Talks the binary protocol to a single endpoint and authenticates with
//! SASL PLAIN when credentials are configured.

use std::io::{BufReader, BufWriter};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{MiseryError, Result};

use super::codec::{read_packet, write_packet, Packet, Status};
use super::Cache;

/// Longest key memcached accepts
pub const MAX_KEY_LEN: usize = 250;

/// An open, authenticated connection
struct Session {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl Session {
    fn call(&mut self, request: &Packet) -> Result<Packet> {
        write_packet(&mut self.writer, request)?;
        let response = read_packet(&mut self.reader)?;
        if response.opcode != request.opcode {
            return Err(MiseryError::Protocol(format!(
                "Response opcode {:?} does not match request {:?}",
                response.opcode, request.opcode
            )));
        }
        Ok(response)
    }
}

/// Cache backed by a memcached server
///
/// The connection is opened by `connect` and reused. After a transport error
/// the connection is dropped and the next call opens a fresh one; the failing
/// call itself is not retried.
pub struct MemcachedCache {
    endpoint: String,
    credentials: Option<(String, String)>,
    timeout: Duration,
    session: Mutex<Option<Session>>,
}

impl MemcachedCache {
    /// Connect (and authenticate, if credentials are given) to `endpoint`
    pub fn connect(
        endpoint: impl Into<String>,
        credentials: Option<(String, String)>,
        timeout: Duration,
    ) -> Result<Self> {
        let cache = Self {
            endpoint: endpoint.into(),
            credentials,
            timeout,
            session: Mutex::new(None),
        };
        let session = cache.open_session()?;
        *cache.session.lock() = Some(session);
        tracing::info!("Memcached cache connected to {}", cache.endpoint);
        Ok(cache)
    }

    /// Endpoint this cache talks to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn open_session(&self) -> Result<Session> {
        let addr = self
            .endpoint
            .to_socket_addrs()
            .map_err(|e| self.unavailable(e))?
            .next()
            .ok_or_else(|| {
                MiseryError::CacheUnavailable(format!("{} resolved to no address", self.endpoint))
            })?;

        let stream =
            TcpStream::connect_timeout(&addr, self.timeout).map_err(|e| self.unavailable(e))?;
        stream.set_nodelay(true).map_err(|e| self.unavailable(e))?;
        stream
            .set_read_timeout(Some(self.timeout))
            .map_err(|e| self.unavailable(e))?;
        stream
            .set_write_timeout(Some(self.timeout))
            .map_err(|e| self.unavailable(e))?;
        let read_stream = stream.try_clone().map_err(|e| self.unavailable(e))?;

        let mut session = Session {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
        };

        if let Some((username, password)) = &self.credentials {
            let response = session
                .call(&Packet::sasl_plain(username, password))
                .map_err(|e| self.unavailable(e))?;
            if response.status != Status::NoError {
                return Err(MiseryError::CacheUnavailable(format!(
                    "SASL authentication to {} failed: {:?}",
                    self.endpoint, response.status
                )));
            }
            tracing::debug!("Authenticated to {} as {}", self.endpoint, username);
        }

        Ok(session)
    }

    /// Run one request, reconnecting first if the previous call broke the
    /// connection
    fn call(&self, request: &Packet) -> Result<Packet> {
        let mut guard = self.session.lock();
        let mut session = match guard.take() {
            Some(session) => session,
            None => self.open_session()?,
        };

        match session.call(request) {
            Ok(response) => {
                *guard = Some(session);
                Ok(response)
            }
            Err(e) => Err(self.unavailable(e)),
        }
    }

    fn unavailable(&self, err: impl std::fmt::Display) -> MiseryError {
        MiseryError::CacheUnavailable(format!("{}: {}", self.endpoint, err))
    }
}

impl Cache for MemcachedCache {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        let response = self.call(&Packet::get(key))?;
        match response.status {
            Status::NoError => Ok(Some(response.value.to_vec())),
            Status::KeyNotFound => Ok(None),
            other => Err(MiseryError::CacheUnavailable(format!(
                "GET {} failed: {:?}",
                key, other
            ))),
        }
    }

    fn write(&self, key: &str, value: &[u8]) -> Result<()> {
        validate_key(key)?;
        let response = self.call(&Packet::set(key, value, 0))?;
        match response.status {
            Status::NoError => Ok(()),
            other => Err(MiseryError::CacheUnavailable(format!(
                "SET {} failed: {:?}",
                key, other
            ))),
        }
    }
}

/// Keys are at most 250 bytes with no whitespace or control characters
fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.len() > MAX_KEY_LEN {
        return Err(MiseryError::invalid_key(
            key,
            format!("cache keys must be 1..={} bytes", MAX_KEY_LEN),
        ));
    }
    if key.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(MiseryError::invalid_key(
            key,
            "cache keys cannot contain whitespace or control characters",
        ));
    }
    Ok(())
}

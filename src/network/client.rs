//! Gateway Client
//!
//! The bot's side of the gateway session: identify, then process message
//! events one at a time until closed or asked to shut down.

use std::time::{Duration, Instant};

use crate::bot::Bot;
use crate::config::Config;
use crate::error::{MiseryError, Result};
use crate::protocol::Frame;

use super::{Connection, Received};

/// How long to wait for READY after IDENTIFY
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Why the event loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// The shutdown flag was raised (signal or shutdown command)
    Shutdown,

    /// The gateway closed the session
    GatewayClosed,
}

/// An identified gateway session
pub struct GatewayClient {
    connection: Connection,
    user_id: u64,
}

impl GatewayClient {
    /// Connect to the configured gateway and identify
    pub fn connect(config: &Config) -> Result<Self> {
        let mut connection = Connection::connect(
            &config.gateway_addr,
            Duration::from_millis(config.write_timeout_ms),
        )?;
        connection.set_timeouts(config.read_timeout_ms, config.write_timeout_ms)?;

        connection.send(&Frame::Identify {
            token: config.gateway_token.clone(),
        })?;

        let deadline = Instant::now() + HANDSHAKE_TIMEOUT;
        let user_id = loop {
            match connection.recv()? {
                Received::Frame(Frame::Ready { user_id }) => break user_id,
                Received::Frame(Frame::Close) | Received::Closed => {
                    return Err(MiseryError::Unauthorized(format!(
                        "gateway {} rejected the token",
                        config.gateway_addr
                    )))
                }
                Received::Frame(other) => {
                    return Err(MiseryError::Protocol(format!(
                        "expected READY, got {:?}",
                        other.frame_type()
                    )))
                }
                Received::Idle if Instant::now() >= deadline => {
                    return Err(MiseryError::Protocol(
                        "timed out waiting for READY".to_string(),
                    ))
                }
                Received::Idle => continue,
            }
        };

        tracing::info!(
            "We have logged in as {} via {}",
            user_id,
            connection.peer_addr()
        );
        Ok(Self {
            connection,
            user_id,
        })
    }

    /// Our own identity as reported by the gateway
    pub fn user_id(&self) -> u64 {
        self.user_id
    }

    /// Run the event loop
    ///
    /// Each event is handled to completion before the next is read. The
    /// shutdown flag is checked between events and on every read timeout.
    pub fn run(mut self, bot: &Bot) -> Result<Exit> {
        bot.set_self_id(self.user_id);

        loop {
            if bot.is_shutting_down() {
                tracing::info!("Closing gateway connection");
                self.connection.close()?;
                return Ok(Exit::Shutdown);
            }

            match self.connection.recv()? {
                Received::Idle => continue,
                Received::Closed | Received::Frame(Frame::Close) => {
                    tracing::info!("Gateway closed the session");
                    return Ok(Exit::GatewayClosed);
                }
                Received::Frame(Frame::Message(message)) => {
                    bot.handle_message(&message, &mut self.connection)?;
                }
                Received::Frame(other) => {
                    tracing::warn!("Ignoring unexpected {:?} frame", other.frame_type());
                }
            }
        }
    }
}

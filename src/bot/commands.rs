//! Command table
//!
//! Maps literal message bodies to handlers. Matching is exact and
//! case-sensitive against the raw body.

use std::collections::HashMap;

use crate::config::DEPLOY_ENDPOINT_KEY;
use crate::error::{MiseryError, Result};
use crate::protocol::Message;
use crate::value::Value;
use crate::webhook::deploy_body;

use super::{Bot, ReplySink};

pub const PING: &str = "ping";
pub const SHUTDOWN: &str = "misery shutdown";
pub const DISPATCH_DEPLOY: &str = "misery dispatch deploy";

/// Who may run a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Anyone,

    /// Only identities in the configured authorized set
    Authorized,
}

/// Handler signature: replies go to the sink as they are produced
pub type Handler = fn(&Bot, &Message, &mut dyn ReplySink) -> Result<()>;

/// A registered command
#[derive(Clone, Copy)]
pub struct Command {
    pub name: &'static str,
    pub access: Access,
    pub handler: Handler,
}

/// Finite set of recognized commands
pub struct CommandTable {
    commands: HashMap<&'static str, Command>,
}

impl CommandTable {
    /// An empty table
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    /// The bot's built-in commands
    pub fn builtin() -> Self {
        let mut table = Self::new();
        table.register(PING, Access::Anyone, ping);
        table.register(SHUTDOWN, Access::Authorized, shutdown);
        table.register(DISPATCH_DEPLOY, Access::Anyone, dispatch_deploy);
        table
    }

    /// Add or replace a command
    pub fn register(&mut self, name: &'static str, access: Access, handler: Handler) {
        self.commands.insert(
            name,
            Command {
                name,
                access,
                handler,
            },
        );
    }

    /// Find the command whose text is exactly `content`
    pub fn lookup(&self, content: &str) -> Option<&Command> {
        self.commands.get(content)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::builtin()
    }
}

// =============================================================================
// Handlers
// =============================================================================

fn ping(_bot: &Bot, message: &Message, sink: &mut dyn ReplySink) -> Result<()> {
    sink.say(message.channel_id, "pong")
}

fn shutdown(bot: &Bot, message: &Message, sink: &mut dyn ReplySink) -> Result<()> {
    tracing::info!("Shutdown requested by {}", message.author_id);
    sink.say(message.channel_id, "Shutting down")?;
    bot.request_shutdown();
    Ok(())
}

fn dispatch_deploy(bot: &Bot, message: &Message, sink: &mut dyn ReplySink) -> Result<()> {
    sink.say(message.channel_id, "Deploy request sent")?;

    let token = bot.dispatch_token().ok_or_else(|| {
        MiseryError::Config("no webhook token configured for deploy dispatch".to_string())
    })?;
    let endpoint = deploy_endpoint(bot)?;

    let status = bot
        .services()
        .webhook
        .dispatch(&endpoint, token, &deploy_body())?;
    tracing::info!(
        "Deploy dispatched to {} for {} (status {})",
        endpoint,
        message.author_id,
        status
    );
    Ok(())
}

/// Resolve the webhook endpoint from the store
///
/// Read on every dispatch; the endpoint is never cached.
fn deploy_endpoint(bot: &Bot) -> Result<String> {
    match bot.services().store.read(DEPLOY_ENDPOINT_KEY)? {
        Some(Value::String(endpoint)) => Ok(endpoint),
        Some(other) => Err(MiseryError::Config(format!(
            "{} holds {}, expected a string",
            DEPLOY_ENDPOINT_KEY,
            other.kind()
        ))),
        None => Err(MiseryError::Config(format!(
            "{} is not set",
            DEPLOY_ENDPOINT_KEY
        ))),
    }
}

//! Bot Module
//!
//! Turns message events into command invocations.
//!
//! ## Event Handling
//! 1. Ignore messages the bot itself sent
//! 2. Look the raw body up in the command table
//! 3. Drop privileged commands from unauthorized senders silently
//! 4. Run the handler; report any failure back into the channel

mod commands;

pub use commands::{Access, Command, CommandTable, Handler, DISPATCH_DEPLOY, PING, SHUTDOWN};

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::Config;
use crate::error::Result;
use crate::protocol::Message;
use crate::services::Services;

/// Destination for replies produced by a handler
pub trait ReplySink {
    fn say(&mut self, channel_id: u64, content: &str) -> Result<()>;
}

/// Collects replies in memory
impl ReplySink for Vec<(u64, String)> {
    fn say(&mut self, channel_id: u64, content: &str) -> Result<()> {
        self.push((channel_id, content.to_string()));
        Ok(())
    }
}

/// The command-handling context
pub struct Bot {
    services: Services,
    commands: CommandTable,
    authorized_ids: BTreeSet<u64>,
    dispatch_token: Option<String>,

    /// Our own identity, learned from READY
    self_id: RwLock<Option<u64>>,

    /// Process-wide shutdown flag, shared with the signal handler
    shutdown: Arc<AtomicBool>,
}

impl Bot {
    /// Create a bot with the built-in command table
    pub fn new(config: &Config, services: Services, shutdown: Arc<AtomicBool>) -> Self {
        Self::with_commands(config, services, shutdown, CommandTable::builtin())
    }

    pub fn with_commands(
        config: &Config,
        services: Services,
        shutdown: Arc<AtomicBool>,
        commands: CommandTable,
    ) -> Self {
        Self {
            services,
            commands,
            authorized_ids: config.authorized_ids.clone(),
            dispatch_token: config.dispatch_token.clone(),
            self_id: RwLock::new(None),
            shutdown,
        }
    }

    /// Handle one message event
    ///
    /// Handler failures are logged and reported to the channel; only a
    /// failure to deliver that report is returned.
    pub fn handle_message(&self, message: &Message, sink: &mut dyn ReplySink) -> Result<()> {
        if Some(message.author_id) == *self.self_id.read() {
            return Ok(());
        }

        let command = match self.commands.lookup(&message.content) {
            Some(command) => command,
            None => return Ok(()),
        };

        if command.access == Access::Authorized && !self.is_authorized(message.author_id) {
            tracing::debug!(
                "Ignoring {:?} from unauthorized sender {}",
                command.name,
                message.author_id
            );
            return Ok(());
        }

        tracing::debug!(
            "Running {:?} for {} in {}",
            command.name,
            message.author_id,
            message.channel_id
        );
        if let Err(e) = (command.handler)(self, message, sink) {
            tracing::warn!("Command {:?} failed: {}", command.name, e);
            sink.say(
                message.channel_id,
                &format!("Command `{}` failed: {}", command.name, e),
            )?;
        }
        Ok(())
    }

    /// Whether `id` may run privileged commands
    pub fn is_authorized(&self, id: u64) -> bool {
        self.authorized_ids.contains(&id)
    }

    /// Record our own identity so our messages are skipped
    pub fn set_self_id(&self, id: u64) {
        *self.self_id.write() = Some(id);
    }

    pub fn self_id(&self) -> Option<u64> {
        *self.self_id.read()
    }

    /// Ask the event loop (and the process) to stop
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn dispatch_token(&self) -> Option<&str> {
        self.dispatch_token.as_deref()
    }

    pub fn commands(&self) -> &CommandTable {
        &self.commands
    }
}

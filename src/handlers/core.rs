//! Handler trait, per-command context and the dispatch table.
//!
//! Every client line ends up in [`Registry::dispatch`]. It looks the command
//! word up, enforces the handler's registration phase, runs the handler
//! inside a `debug` span and turns whatever comes back into replies. Only
//! errors that end the connection ([`HandlerError::Quit`] and
//! [`HandlerError::AccessDenied`]) travel back to the connection task.

use super::channel::{JoinHandler, ListHandler, NamesHandler, PartHandler, TopicHandler};
use super::connection::{NickHandler, PassHandler, PingHandler, PongHandler, QuitHandler, UserHandler};
use super::messaging::PrivmsgHandler;
use super::mode::ModeHandler;
use super::oper::{KillHandler, OperHandler, StopHandler};
use crate::error::{HandlerError, HandlerResult};
use crate::state::{Client, Connection, Hub};
use async_trait::async_trait;
use futures_util::FutureExt;
use lantern_proto::{Message, Response};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{Instrument, Level, debug, error, span};

/// Everything a handler may touch for one command.
pub struct Context<'a> {
    /// Shared server state.
    pub hub: &'a Arc<Hub>,
    /// The client that sent the command.
    pub client: &'a Arc<Client>,
}

impl<'a> Context<'a> {
    pub fn new(hub: &'a Arc<Hub>, client: &'a Arc<Client>) -> Self {
        Self { hub, client }
    }

    #[inline]
    pub fn server_name(&self) -> &str {
        self.hub.server_name()
    }

    /// The name replies are addressed to: the nickname, or `*`.
    #[inline]
    pub fn nick(&self) -> String {
        self.client.reply_target()
    }

    /// Queue a message for this client.
    #[inline]
    pub fn send(&self, msg: Message) -> bool {
        self.client.send(msg)
    }

    /// Send a numeric to this client. The reply target is filled in as the
    /// first argument.
    pub fn numeric(&self, response: Response, args: &[&str]) {
        let nick = self.nick();
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push(nick.as_str());
        full.extend_from_slice(args);
        self.send(self.hub.reply(response, &full));
    }
}

/// When a handler may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Only before registration completes (PASS).
    PreRegistration,
    /// Only once registered.
    Registered,
    /// Either way.
    Any,
}

/// A command handler.
#[async_trait]
pub trait Handler: Send + Sync {
    fn phase(&self) -> Phase {
        Phase::Registered
    }

    async fn handle(&self, ctx: &Context<'_>, msg: &Message) -> HandlerResult;
}

/// Registry of command handlers.
pub struct Registry {
    handlers: HashMap<&'static str, Box<dyn Handler>>,
}

impl Registry {
    /// Create a registry with every client command registered.
    pub fn new() -> Self {
        let mut handlers: HashMap<&'static str, Box<dyn Handler>> = HashMap::new();

        // Connection/registration
        handlers.insert("NICK", Box::new(NickHandler));
        handlers.insert("USER", Box::new(UserHandler));
        handlers.insert("PASS", Box::new(PassHandler));
        handlers.insert("PING", Box::new(PingHandler));
        handlers.insert("PONG", Box::new(PongHandler));
        handlers.insert("QUIT", Box::new(QuitHandler));

        // Channels
        handlers.insert("JOIN", Box::new(JoinHandler));
        handlers.insert("PART", Box::new(PartHandler));
        handlers.insert("TOPIC", Box::new(TopicHandler));
        handlers.insert("NAMES", Box::new(NamesHandler));
        handlers.insert("LIST", Box::new(ListHandler));
        handlers.insert("MODE", Box::new(ModeHandler));

        // Messaging
        handlers.insert("PRIVMSG", Box::new(PrivmsgHandler));

        // Operators
        handlers.insert("OPER", Box::new(OperHandler));
        handlers.insert("KILL", Box::new(KillHandler));
        handlers.insert("STOP", Box::new(StopHandler));

        Self { handlers }
    }

    /// Dispatch one parsed line from a client.
    ///
    /// Handler failures are answered here and never reach the caller, except
    /// the ones that close the connection.
    pub async fn dispatch(&self, ctx: &Context<'_>, msg: &Message) -> HandlerResult {
        let command = msg.command.as_str();

        let Some(handler) = self.handlers.get(command) else {
            ctx.numeric(Response::ERR_UNKNOWNCOMMAND, &[command]);
            return Ok(());
        };

        let registered = ctx.client.is_registered();
        match handler.phase() {
            Phase::PreRegistration if registered => {
                ctx.numeric(Response::ERR_ALREADYREGISTRED, &[]);
                return Ok(());
            }
            Phase::Registered if !registered => {
                ctx.numeric(Response::ERR_NOTREGISTERED, &[]);
                return Ok(());
            }
            _ => {}
        }

        let uid = ctx.client.id();
        let irc_span = span!(
            Level::DEBUG,
            "irc.command",
            command = %command,
            %uid,
            nick = ctx.client.nick().as_deref(),
            channel = msg.arg(0).filter(|a| a.starts_with('#') || a.starts_with('&')),
        );

        let result = AssertUnwindSafe(handler.handle(ctx, msg))
            .catch_unwind()
            .instrument(irc_span)
            .await;

        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err @ (HandlerError::Quit(_) | HandlerError::AccessDenied(_)))) => Err(err),
            Ok(Err(HandlerError::Internal(detail))) => {
                error!(%uid, command = %command, args = ?msg.args(), %detail, "Handler failed");
                ctx.numeric(Response::ERR_UNKNOWNERROR, &[command, "Internal server error"]);
                Ok(())
            }
            Ok(Err(err)) => {
                debug!(command = %command, error = %err, code = err.error_code(), "Command error");
                if let Some(reply) = err.to_irc_reply(ctx.server_name(), &ctx.nick(), command) {
                    ctx.send(reply);
                }
                Ok(())
            }
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<String>()
                    .map(String::as_str)
                    .or_else(|| panic.downcast_ref::<&'static str>().copied())
                    .unwrap_or("unknown panic");
                error!(%uid, command = %command, args = ?msg.args(), %detail, "Handler panicked");
                ctx.numeric(Response::ERR_UNKNOWNERROR, &[command, "Internal server error"]);
                Ok(())
            }
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

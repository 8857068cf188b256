//! Registration and liveness commands: NICK, USER, PASS, PING, PONG, QUIT.

use super::core::{Context, Handler, Phase};
use super::welcome::complete_registration;
use crate::error::{HandlerError, HandlerResult};
use crate::state::{Client, ConnId, Connection};
use async_trait::async_trait;
use lantern_proto::{Message, match_glob};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Cut `s` to at most `max` characters.
fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Handler for NICK command.
pub struct NickHandler;

#[async_trait]
impl Handler for NickHandler {
    fn phase(&self) -> Phase {
        Phase::Any
    }

    async fn handle(&self, ctx: &Context<'_>, msg: &Message) -> HandlerResult {
        // NICK <nickname>
        let requested = msg
            .arg(0)
            .filter(|n| !n.is_empty())
            .ok_or(HandlerError::NoNicknameGiven)?;

        let rules = &ctx.hub.config.nick;
        // The whole argument must be legal; only a legal one is cut down.
        if requested.chars().count() < rules.min_length || !rules.pattern.is_match(requested) {
            return Err(HandlerError::ErroneousNickname(requested.to_string()));
        }
        if rules.blacklist.iter().any(|mask| match_glob(mask, requested)) {
            debug!(nick = %requested, "Nickname matches blacklist");
            return Err(HandlerError::ErroneousNickname(requested.to_string()));
        }
        let nick = truncate_chars(requested, rules.max_length);

        let old_prefix = ctx.client.prefix();
        let old = ctx
            .hub
            .connections
            .commit_nick(ctx.client, nick)
            .map_err(|_| HandlerError::NicknameInUse(nick.to_string()))?;

        if let Some(old) = old {
            if old != nick {
                let notice = Message::new("NICK", Vec::<String>::new())
                    .with_trailing(nick)
                    .with_prefix(old_prefix);
                for peer in nick_audience(ctx).values() {
                    peer.send(notice.clone());
                }
                info!(uid = %ctx.client.id(), old = %old, new = %nick, "Nick changed");
            }
        }

        complete_registration(ctx);
        Ok(())
    }
}

/// The client itself plus everyone sharing a channel with it, once each.
fn nick_audience(ctx: &Context<'_>) -> HashMap<ConnId, Arc<Client>> {
    let mut audience = HashMap::new();
    audience.insert(ctx.client.id(), Arc::clone(ctx.client));
    for key in ctx.client.channels() {
        if let Some(channel) = ctx.hub.channels.get(&key) {
            audience.extend(channel.members().into_iter().map(|m| (m.id(), m)));
        }
    }
    audience
}

/// Usernames end up in `nick!user@host`, so the separators are out.
fn is_valid_username(user: &str) -> bool {
    !user.is_empty() && user.chars().all(|c| c.is_ascii_graphic() && c != '@' && c != '!')
}

/// Handler for USER command.
pub struct UserHandler;

#[async_trait]
impl Handler for UserHandler {
    fn phase(&self) -> Phase {
        Phase::Any
    }

    async fn handle(&self, ctx: &Context<'_>, msg: &Message) -> HandlerResult {
        // USER <username> <mode> <unused> :<realname>
        if msg.args().len() < 4 {
            return Err(HandlerError::NeedMoreParams);
        }
        if ctx.client.info().username.is_some() && ctx.client.is_welcomed() {
            return Err(HandlerError::AlreadyRegistered);
        }

        let requested = msg.arg(0).unwrap_or_default();
        if !is_valid_username(requested) {
            info!(uid = %ctx.client.id(), username = %requested, "Rejecting invalid username");
            return Err(HandlerError::AccessDenied("Invalid username".to_string()));
        }
        let username = truncate_chars(requested, ctx.hub.config.limits.username_length);

        // A verified ident answer wins over what the client claims.
        if !ctx.client.info().ident_verified {
            ctx.client.set_username(username);
        }
        ctx.client.set_realname(msg.arg(3).unwrap_or_default());

        complete_registration(ctx);
        Ok(())
    }
}

/// Handler for PASS command.
pub struct PassHandler;

#[async_trait]
impl Handler for PassHandler {
    fn phase(&self) -> Phase {
        Phase::PreRegistration
    }

    async fn handle(&self, ctx: &Context<'_>, msg: &Message) -> HandlerResult {
        // PASS <password>
        let password = msg.arg(0).ok_or(HandlerError::NeedMoreParams)?;

        match ctx.hub.config.server.password.as_deref() {
            Some(expected) if expected != password => {
                debug!(uid = %ctx.client.id(), "Connection password mismatch");
                return Err(HandlerError::PasswordMismatch);
            }
            _ => ctx.client.accept_password(),
        }

        complete_registration(ctx);
        Ok(())
    }
}

/// Handler for PING command.
pub struct PingHandler;

#[async_trait]
impl Handler for PingHandler {
    fn phase(&self) -> Phase {
        Phase::Any
    }

    async fn handle(&self, ctx: &Context<'_>, msg: &Message) -> HandlerResult {
        // PING <token>
        let token = msg.arg(0).ok_or(HandlerError::NeedMoreParams)?;
        ctx.send(pong(ctx.server_name(), token));
        Ok(())
    }
}

/// `:server PONG server :token`
pub fn pong(server: &str, token: &str) -> Message {
    Message::new("PONG", [server])
        .with_trailing(token)
        .with_prefix(lantern_proto::Prefix::ServerName(server.to_string()))
}

/// Handler for PONG command.
pub struct PongHandler;

#[async_trait]
impl Handler for PongHandler {
    fn phase(&self) -> Phase {
        Phase::Any
    }

    async fn handle(&self, ctx: &Context<'_>, msg: &Message) -> HandlerResult {
        // PONG [server] :<token>; only the last argument matters
        if let Some(token) = msg.args().last() {
            let accepted = ctx
                .client
                .core()
                .liveness()
                .lock()
                .accept_pong(token, Instant::now());
            if !accepted {
                debug!(uid = %ctx.client.id(), token = %token, "Ignoring stale PONG");
            }
        }
        Ok(())
    }
}

/// Handler for QUIT command.
pub struct QuitHandler;

#[async_trait]
impl Handler for QuitHandler {
    fn phase(&self) -> Phase {
        Phase::Any
    }

    async fn handle(&self, ctx: &Context<'_>, msg: &Message) -> HandlerResult {
        let reason = msg.arg(0).map(str::to_string);
        debug!(uid = %ctx.client.id(), reason = ?reason, "Client quit");
        Err(HandlerError::Quit(reason))
    }
}

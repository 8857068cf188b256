//! Operator commands: OPER, KILL, STOP.

use super::core::{Context, Handler};
use crate::error::{HandlerError, HandlerResult};
use crate::state::{Connection, ConnectionKind, Flagable};
use async_trait::async_trait;
use lantern_proto::{Message, Prefix, Response};
use tracing::{info, warn};

fn require_oper(ctx: &Context<'_>) -> HandlerResult {
    if ctx.client.is_oper() {
        Ok(())
    } else {
        Err(HandlerError::NoPrivileges)
    }
}

/// Handler for OPER command.
pub struct OperHandler;

#[async_trait]
impl Handler for OperHandler {
    async fn handle(&self, ctx: &Context<'_>, msg: &Message) -> HandlerResult {
        // OPER <name> <password>
        let (Some(name), Some(password)) = (msg.arg(0), msg.arg(1)) else {
            return Err(HandlerError::NeedMoreParams);
        };

        let user_host = ctx.client.user_host();
        let block = ctx
            .hub
            .config
            .opers
            .iter()
            .find(|block| block.name == name && block.allows(&user_host))
            .ok_or_else(|| {
                warn!(uid = %ctx.client.id(), oper = %name, %user_host, "OPER with no matching block");
                HandlerError::NoOperHost
            })?;

        if !block.verify_password(password) {
            warn!(uid = %ctx.client.id(), oper = %name, "OPER password mismatch");
            return Err(HandlerError::PasswordMismatch);
        }

        ctx.client.set_flag('o', None);
        ctx.client.set_oper_name(Some(block.name.clone()));
        ctx.numeric(Response::RPL_YOUREOPER, &[]);
        ctx.send(
            Message::new("MODE", [ctx.nick()])
                .with_trailing("+o")
                .with_prefix(Prefix::ServerName(ctx.server_name().to_string())),
        );
        info!(uid = %ctx.client.id(), nick = %ctx.nick(), oper = %block.name, "Client opered up");
        Ok(())
    }
}

/// Handler for KILL command.
pub struct KillHandler;

#[async_trait]
impl Handler for KillHandler {
    async fn handle(&self, ctx: &Context<'_>, msg: &Message) -> HandlerResult {
        // KILL <nick> [:<reason>]
        require_oper(ctx)?;
        let nick = msg.arg(0).ok_or(HandlerError::NeedMoreParams)?;
        let reason = msg.arg(1).unwrap_or("No reason given");

        let victim = ctx
            .hub
            .connections
            .find_by_common_name(nick)
            .filter(|conn| conn.kind() == ConnectionKind::Client)
            .ok_or_else(|| HandlerError::NoSuchNick(nick.to_string()))?;

        let killer = ctx.nick();
        info!(uid = %ctx.client.id(), killer = %killer, victim = %nick, %reason, "KILL");
        ctx.hub
            .disconnect(&*victim, &format!("Killed ({killer} ({reason}))"));
        Ok(())
    }
}

/// Handler for STOP command.
pub struct StopHandler;

#[async_trait]
impl Handler for StopHandler {
    async fn handle(&self, ctx: &Context<'_>, _msg: &Message) -> HandlerResult {
        require_oper(ctx)?;
        info!(uid = %ctx.client.id(), nick = %ctx.nick(), "STOP requested");
        ctx.hub.stop("Server shutting down");
        Ok(())
    }
}

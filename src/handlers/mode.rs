//! MODE command handler.
//!
//! Parses the target and hands the change string to the mode engine, then
//! announces whatever was applied.

use super::core::{Context, Handler};
use crate::error::{HandlerError, HandlerResult};
use crate::modes::{self, ModeOutcome, ModeTarget};
use crate::state::{Connection, Flagable};
use async_trait::async_trait;
use lantern_proto::{Message, Response};
use tracing::info;

/// Handler for MODE command.
pub struct ModeHandler;

#[async_trait]
impl Handler for ModeHandler {
    async fn handle(&self, ctx: &Context<'_>, msg: &Message) -> HandlerResult {
        // MODE <target> [<modestring> [<args>...]]
        let target = msg.arg(0).ok_or(HandlerError::NeedMoreParams)?;
        let changes = msg.arg(1);
        let params = msg.args().get(2..).unwrap_or_default();

        if target.starts_with('#') || target.starts_with('&') {
            channel_mode(ctx, target, changes, params)
        } else {
            user_mode(ctx, target, changes, params)
        }
    }
}

fn channel_mode(
    ctx: &Context<'_>,
    name: &str,
    changes: Option<&str>,
    params: &[String],
) -> HandlerResult {
    let channel = ctx
        .hub
        .channels
        .get(name)
        .ok_or_else(|| HandlerError::NoSuchChannel(name.to_string()))?;

    let Some(changes) = changes else {
        // The key is for members only.
        let hidden: &[char] = if channel.is_member(ctx.client.id()) { &[] } else { &['k'] };
        let nick = ctx.nick();
        let reply = ctx
            .hub
            .reply(Response::RPL_CHANNELMODEIS, &[nick.as_str(), channel.name()])
            .with_args(channel.flags().mode_args(hidden));
        ctx.send(reply);
        return Ok(());
    };

    let outcome = modes::apply(ctx.hub, ctx.client, ModeTarget::Channel(&channel), changes, params)?;
    report_errors(ctx, &outcome);
    if outcome.applied.is_empty() {
        return Ok(());
    }

    let announce = Message::new("MODE", std::iter::once(channel.name().to_string()).chain(outcome.to_args()))
        .with_prefix(ctx.client.prefix());
    channel.broadcast_to_all(&announce);
    info!(
        uid = %ctx.client.id(),
        channel = %channel.name(),
        modes = %outcome.to_args().join(" "),
        "Channel modes changed"
    );
    Ok(())
}

fn user_mode(
    ctx: &Context<'_>,
    nick: &str,
    changes: Option<&str>,
    params: &[String],
) -> HandlerResult {
    let conn = ctx
        .hub
        .connections
        .find_by_common_name(nick)
        .ok_or_else(|| HandlerError::NoSuchNick(nick.to_string()))?;
    let target = conn
        .as_client()
        .ok_or_else(|| HandlerError::NoSuchNick(nick.to_string()))?;

    let Some(changes) = changes else {
        if target.id() != ctx.client.id() {
            return Err(HandlerError::UsersDontMatch);
        }
        let modes = target.mode_string();
        ctx.numeric(Response::RPL_UMODEIS, &[modes.as_str()]);
        return Ok(());
    };

    let outcome = modes::apply(ctx.hub, ctx.client, ModeTarget::User(target), changes, params)?;
    report_errors(ctx, &outcome);
    if outcome.applied.is_empty() {
        return Ok(());
    }

    let mut args = outcome.to_args();
    let letters = args.remove(0);
    let confirm = Message::new("MODE", [target.reply_target()])
        .with_trailing(letters)
        .with_prefix(ctx.client.prefix());
    target.send(confirm.clone());
    if target.id() != ctx.client.id() {
        ctx.send(confirm);
        info!(
            uid = %ctx.client.id(),
            target = %target.reply_target(),
            "Operator changed another user's modes"
        );
    }
    Ok(())
}

fn report_errors(ctx: &Context<'_>, outcome: &ModeOutcome) {
    for reply in &outcome.errors {
        ctx.send(reply.clone());
    }
}

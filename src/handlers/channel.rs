//! Channel commands: JOIN, PART, TOPIC, NAMES, LIST.

use super::core::{Context, Handler};
use crate::error::{ChannelError, HandlerError, HandlerResult};
use crate::state::{Channel, Connection, JoinOutcome, Topic, is_valid_channel_name};
use async_trait::async_trait;
use lantern_proto::{MAX_LINE_LEN, Message, Response, match_glob};
use tracing::debug;

/// Send 332/333 for a set topic.
fn send_topic(ctx: &Context<'_>, channel: &Channel, topic: &Topic) {
    let set_at = topic.set_at.timestamp().to_string();
    ctx.numeric(Response::RPL_TOPIC, &[channel.name(), topic.text.as_str()]);
    ctx.numeric(
        Response::RPL_TOPICWHOTIME,
        &[channel.name(), topic.set_by.as_str(), set_at.as_str()],
    );
}

/// Send 353 for one channel, if the viewer may see it, split over as many
/// lines as the names need. 366 is left to the caller.
fn send_names(ctx: &Context<'_>, channel: &Channel) {
    let member = channel.is_member(ctx.client.id());
    if channel.is_secret() && !member {
        return;
    }
    let symbol = if channel.is_secret() { "@" } else { "=" };
    // ":server 353 nick = #chan :" plus CRLF
    let overhead = ctx.server_name().len() + ctx.nick().len() + channel.name().len() + 13;
    let budget = MAX_LINE_LEN.saturating_sub(overhead).max(1);
    for names in pack_names(&channel.visible_names(ctx.client), budget) {
        ctx.numeric(Response::RPL_NAMREPLY, &[symbol, channel.name(), names.as_str()]);
    }
}

/// Group space-separated names into runs of at most `budget` bytes. Always
/// yields at least one (possibly empty) run.
fn pack_names(names: &str, budget: usize) -> Vec<String> {
    let mut runs = Vec::new();
    let mut current = String::new();
    for name in names.split(' ').filter(|n| !n.is_empty()) {
        if !current.is_empty() && current.len() + 1 + name.len() > budget {
            runs.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(name);
    }
    if !current.is_empty() || runs.is_empty() {
        runs.push(current);
    }
    runs
}

/// Reply to a per-channel failure without aborting the rest of the list.
fn channel_error(ctx: &Context<'_>, channel: &str, error: ChannelError) {
    ctx.send(error.to_irc_reply(ctx.server_name(), &ctx.nick(), channel));
}

/// Part every channel the client is on (`JOIN 0`).
fn part_all(ctx: &Context<'_>) {
    for key in ctx.client.channels() {
        if let Some(channel) = ctx.hub.channels.get(&key) {
            if let Ok(true) = channel.part(ctx.client, None) {
                ctx.hub.channels.unlink_if_dead(&key);
            }
        }
    }
}

/// Handler for JOIN command.
pub struct JoinHandler;

#[async_trait]
impl Handler for JoinHandler {
    async fn handle(&self, ctx: &Context<'_>, msg: &Message) -> HandlerResult {
        // JOIN <channel>{,<channel>} [<key>{,<key>}]
        let targets = msg.arg(0).ok_or(HandlerError::NeedMoreParams)?;
        if targets == "0" {
            part_all(ctx);
            return Ok(());
        }

        let mut keys = msg.arg(1).unwrap_or_default().split(',');
        let max_len = ctx.hub.config.limits.channel_length;

        for name in targets.split(',').filter(|n| !n.is_empty()) {
            let key = keys.next().filter(|k| !k.is_empty());
            if !is_valid_channel_name(name, max_len) {
                ctx.numeric(Response::ERR_BADCHANMASK, &[name]);
                continue;
            }

            let (channel, outcome) = ctx.hub.channels.join(name, ctx.client, key);
            match outcome {
                Ok(JoinOutcome::Joined { topic }) => {
                    debug!(uid = %ctx.client.id(), channel = %channel.name(), "Joined channel");
                    if let Some(topic) = topic {
                        send_topic(ctx, &channel, &topic);
                    }
                    send_names(ctx, &channel);
                    ctx.numeric(Response::RPL_ENDOFNAMES, &[channel.name()]);
                }
                Ok(JoinOutcome::AlreadyMember) => {}
                Ok(JoinOutcome::Departing) => return Ok(()),
                Err(error) => channel_error(ctx, channel.name(), error),
            }
        }
        Ok(())
    }
}

/// Handler for PART command.
pub struct PartHandler;

#[async_trait]
impl Handler for PartHandler {
    async fn handle(&self, ctx: &Context<'_>, msg: &Message) -> HandlerResult {
        // PART <channel>{,<channel>} [:<reason>]
        let targets = msg.arg(0).ok_or(HandlerError::NeedMoreParams)?;
        let reason = msg.arg(1);

        for name in targets.split(',').filter(|n| !n.is_empty()) {
            let Some(channel) = ctx.hub.channels.get(name) else {
                ctx.numeric(Response::ERR_NOSUCHCHANNEL, &[name]);
                continue;
            };
            match channel.part(ctx.client, reason) {
                Ok(empty) => {
                    debug!(uid = %ctx.client.id(), channel = %channel.name(), "Parted channel");
                    if empty {
                        ctx.hub.channels.unlink_if_dead(channel.key());
                    }
                }
                Err(error) => channel_error(ctx, channel.name(), error),
            }
        }
        Ok(())
    }
}

/// Handler for TOPIC command.
pub struct TopicHandler;

#[async_trait]
impl Handler for TopicHandler {
    async fn handle(&self, ctx: &Context<'_>, msg: &Message) -> HandlerResult {
        // TOPIC <channel> [:<topic>]
        let name = msg.arg(0).ok_or(HandlerError::NeedMoreParams)?;
        let channel = ctx
            .hub
            .channels
            .get(name)
            .ok_or_else(|| HandlerError::NoSuchChannel(name.to_string()))?;

        match msg.arg(1) {
            Some(text) => channel
                .set_topic(ctx.client, text)
                .map_err(|error| HandlerError::channel(channel.name(), error)),
            None => {
                if channel.is_secret() && !channel.is_member(ctx.client.id()) {
                    return Err(HandlerError::channel(channel.name(), ChannelError::NotOnChannel));
                }
                match channel.topic() {
                    Some(topic) => send_topic(ctx, &channel, &topic),
                    None => ctx.numeric(Response::RPL_NOTOPIC, &[channel.name()]),
                }
                Ok(())
            }
        }
    }
}

/// Handler for NAMES command.
pub struct NamesHandler;

#[async_trait]
impl Handler for NamesHandler {
    async fn handle(&self, ctx: &Context<'_>, msg: &Message) -> HandlerResult {
        // NAMES [<channel>{,<channel>}]
        match msg.arg(0) {
            Some(targets) => {
                for name in targets.split(',').filter(|n| !n.is_empty()) {
                    if let Some(channel) = ctx.hub.channels.get(name) {
                        send_names(ctx, &channel);
                    }
                    ctx.numeric(Response::RPL_ENDOFNAMES, &[name]);
                }
            }
            None => {
                for channel in ctx.hub.channels.list() {
                    send_names(ctx, &channel);
                }
                ctx.numeric(Response::RPL_ENDOFNAMES, &["*"]);
            }
        }
        Ok(())
    }
}

/// Handler for LIST command.
pub struct ListHandler;

#[async_trait]
impl Handler for ListHandler {
    async fn handle(&self, ctx: &Context<'_>, msg: &Message) -> HandlerResult {
        // LIST [<mask>{,<mask>}]
        let masks: Vec<&str> = msg
            .arg(0)
            .map(|m| m.split(',').filter(|m| !m.is_empty()).collect())
            .unwrap_or_default();

        let mut channels = ctx.hub.channels.list();
        channels.sort_by(|a, b| a.key().cmp(b.key()));

        for channel in channels {
            if channel.is_secret() && !channel.is_member(ctx.client.id()) {
                continue;
            }
            if !masks.is_empty() && !masks.iter().any(|mask| match_glob(mask, channel.name())) {
                continue;
            }
            let count = channel.member_count().to_string();
            let topic = channel.topic().map(|t| t.text).unwrap_or_default();
            ctx.numeric(
                Response::RPL_LIST,
                &[channel.name(), count.as_str(), topic.as_str()],
            );
        }
        ctx.numeric(Response::RPL_LISTEND, &[]);
        Ok(())
    }
}

//! Mode engine for users and channels.
//!
//! Both target kinds implement [`Flagable`]; what a letter means is decided
//! here, by one rule table per kind. A change string such as `+ov-k` is
//! walked left to right and parameters are consumed in the same order.
//! A bad letter is reported and skipped; the rest of the string still
//! applies.

use crate::error::{ChannelError, HandlerError};
use crate::state::{Channel, Client, Connection, Flagable, Hub};
use lantern_proto::{Message, Response};

/// What a mode string is applied to.
#[derive(Clone, Copy)]
pub enum ModeTarget<'a> {
    User(&'a Client),
    Channel(&'a Channel),
}

impl<'a> ModeTarget<'a> {
    fn flagable(&self) -> &'a dyn Flagable {
        match *self {
            ModeTarget::User(client) => client,
            ModeTarget::Channel(channel) => channel,
        }
    }

    fn rules(&self) -> &'static [ModeRule] {
        match self {
            ModeTarget::User(_) => USER_MODES,
            ModeTarget::Channel(_) => CHANNEL_MODES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParamRule {
    Never,
    Always,
    OnSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MemberMode {
    Op,
    Voice,
    Mute,
    Ban,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Effect {
    /// Stored in the target's flag set.
    Flag,
    /// Moves a member in or out of a channel subset.
    Member(MemberMode),
}

#[derive(Debug)]
struct ModeRule {
    letter: char,
    /// Clients may remove it but only the server sets it.
    server_only: bool,
    param: ParamRule,
    effect: Effect,
}

const fn rule(letter: char, server_only: bool, param: ParamRule, effect: Effect) -> ModeRule {
    ModeRule {
        letter,
        server_only,
        param,
        effect,
    }
}

const USER_MODES: &[ModeRule] = &[
    rule('i', false, ParamRule::Never, Effect::Flag),
    rule('w', false, ParamRule::Never, Effect::Flag),
    rule('o', true, ParamRule::Never, Effect::Flag),
    rule('r', true, ParamRule::Never, Effect::Flag),
];

const CHANNEL_MODES: &[ModeRule] = &[
    rule('n', false, ParamRule::Never, Effect::Flag),
    rule('s', false, ParamRule::Never, Effect::Flag),
    rule('t', false, ParamRule::Never, Effect::Flag),
    rule('k', false, ParamRule::Always, Effect::Flag),
    rule('l', false, ParamRule::OnSet, Effect::Flag),
    rule('r', true, ParamRule::Never, Effect::Flag),
    rule('o', false, ParamRule::Always, Effect::Member(MemberMode::Op)),
    rule('v', false, ParamRule::Always, Effect::Member(MemberMode::Voice)),
    rule('q', false, ParamRule::Always, Effect::Member(MemberMode::Mute)),
    rule('b', false, ParamRule::Always, Effect::Member(MemberMode::Ban)),
];

/// Letters advertised in 004.
pub const USER_MODE_LETTERS: &str = "iorw";
pub const CHANNEL_MODE_LETTERS: &str = "bklnoqrstv";

/// One applied change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeChange {
    pub adding: bool,
    pub letter: char,
    pub param: Option<String>,
}

/// Result of applying a change string.
#[derive(Debug, Default)]
pub struct ModeOutcome {
    pub applied: Vec<ModeChange>,
    /// Per-letter error replies for the actor.
    pub errors: Vec<Message>,
}

impl ModeOutcome {
    /// Render the applied changes as MODE arguments: `["+o-k", "bob", "key"]`.
    pub fn to_args(&self) -> Vec<String> {
        let mut letters = String::new();
        let mut params = Vec::new();
        let mut sign = None;
        for change in &self.applied {
            if sign != Some(change.adding) {
                letters.push(if change.adding { '+' } else { '-' });
                sign = Some(change.adding);
            }
            letters.push(change.letter);
            if let Some(param) = &change.param {
                params.push(param.clone());
            }
        }
        let mut args = vec![letters];
        args.extend(params);
        args
    }
}

/// Check whether `actor` may change modes on `target` at all.
pub fn authorize(hub: &Hub, actor: &Client, target: ModeTarget<'_>) -> Result<(), HandlerError> {
    let policy = hub.config.policy;
    match target {
        ModeTarget::User(user) => {
            if user.id() == actor.id() || (actor.is_oper() && policy.opers_set_user_modes) {
                Ok(())
            } else {
                Err(HandlerError::UsersDontMatch)
            }
        }
        ModeTarget::Channel(channel) => {
            if actor.is_oper() && policy.opers_set_channel_modes {
                return Ok(());
            }
            let error = if !channel.is_member(actor.id()) {
                ChannelError::NotOnChannel
            } else if !channel.is_op(actor.id()) {
                ChannelError::ChanOpPrivsNeeded
            } else {
                return Ok(());
            };
            Err(HandlerError::channel(channel.name(), error))
        }
    }
}

/// Apply `modes` to `target`. Privilege is checked first with
/// [`authorize`]; after that every letter is resolved independently.
pub fn apply(
    hub: &Hub,
    actor: &Client,
    target: ModeTarget<'_>,
    modes: &str,
    params: &[String],
) -> Result<ModeOutcome, HandlerError> {
    authorize(hub, actor, target)?;

    let actor_nick = actor.reply_target();
    let mut outcome = ModeOutcome::default();
    let mut params = params.iter();
    let mut adding = true;

    for letter in modes.chars() {
        match letter {
            '+' => adding = true,
            '-' => adding = false,
            _ => {
                let Some(rule) = target.rules().iter().find(|r| r.letter == letter) else {
                    outcome.errors.push(unknown_mode(hub, actor_nick.as_str(), target, letter));
                    continue;
                };

                let wants_param = match rule.param {
                    ParamRule::Never => false,
                    ParamRule::Always => true,
                    ParamRule::OnSet => adding,
                };
                let param = if wants_param {
                    match params.next() {
                        Some(param) => Some(param.clone()),
                        None => {
                            outcome
                                .errors
                                .push(hub.reply(Response::ERR_NEEDMOREPARAMS, &[actor_nick.as_str(), "MODE"]));
                            continue;
                        }
                    }
                } else {
                    None
                };

                if rule.server_only && adding {
                    let letter = letter.to_string();
                    outcome
                        .errors
                        .push(hub.reply(Response::ERR_CANNOTCHANGEUMODE, &[actor_nick.as_str(), letter.as_str()]));
                    continue;
                }

                let applied = match rule.effect {
                    Effect::Flag => apply_flag(target, letter, adding, param),
                    Effect::Member(member_mode) => {
                        let ModeTarget::Channel(channel) = target else {
                            continue;
                        };
                        match apply_member(hub, channel, member_mode, adding, param.as_deref()) {
                            Ok(applied) => applied,
                            Err(reply) => {
                                outcome.errors.push(reply(hub.server_name(), actor_nick.as_str()));
                                continue;
                            }
                        }
                    }
                };
                if let Some(change) = applied {
                    outcome.applied.push(change);
                }
            }
        }
    }

    if let ModeTarget::User(user) = target {
        if outcome.applied.iter().any(|c| c.letter == 'o' && !c.adding) {
            user.set_oper_name(None);
        }
    }

    Ok(outcome)
}

fn apply_flag(target: ModeTarget<'_>, letter: char, adding: bool, param: Option<String>) -> Option<ModeChange> {
    let flags = target.flagable();
    let changed = if adding {
        if letter == 'l' && !param.as_deref().is_some_and(|p| p.parse::<usize>().is_ok_and(|n| n > 0)) {
            return None;
        }
        flags.set_flag(letter, param.clone())
    } else {
        flags.clear_flag(letter)
    };
    changed.then_some(ModeChange {
        adding,
        letter,
        param,
    })
}

type DeferredReply = Box<dyn FnOnce(&str, &str) -> Message>;

fn apply_member(
    hub: &Hub,
    channel: &Channel,
    mode: MemberMode,
    adding: bool,
    nick: Option<&str>,
) -> Result<Option<ModeChange>, DeferredReply> {
    let nick = nick.unwrap_or_default().to_string();
    let Some(member) = hub.connections.find_by_common_name(&nick) else {
        return Err(Box::new(move |server: &str, actor: &str| {
            Message::reply(server, Response::ERR_NOSUCHNICK, &[actor, nick.as_str()])
        }));
    };
    let id = member.id();
    let changed = match (mode, adding) {
        (MemberMode::Op, true) => channel.op(id),
        (MemberMode::Op, false) => channel.deop(id),
        (MemberMode::Voice, true) => channel.voice(id),
        (MemberMode::Voice, false) => channel.devoice(id),
        (MemberMode::Mute, true) => channel.mute(id),
        (MemberMode::Mute, false) => channel.unmute(id),
        (MemberMode::Ban, true) => channel.ban(id),
        (MemberMode::Ban, false) => channel.unban(id),
    };
    let letter = match mode {
        MemberMode::Op => 'o',
        MemberMode::Voice => 'v',
        MemberMode::Mute => 'q',
        MemberMode::Ban => 'b',
    };
    match changed {
        None => {
            let name = channel.name().to_string();
            let shown = member.reply_target();
            Err(Box::new(move |server: &str, actor: &str| {
                ChannelError::UserNotInChannel(shown).to_irc_reply(server, actor, &name)
            }))
        }
        Some(changed) => Ok(changed.then(|| ModeChange {
            adding,
            letter,
            param: Some(member.reply_target()),
        })),
    }
}

fn unknown_mode(hub: &Hub, actor_nick: &str, target: ModeTarget<'_>, letter: char) -> Message {
    let letter = letter.to_string();
    match target {
        ModeTarget::User(_) => hub.reply(Response::ERR_UMODEUNKNOWNFLAG, &[actor_nick, letter.as_str()]),
        ModeTarget::Channel(channel) => {
            hub.reply(Response::ERR_UNKNOWNMODE, &[actor_nick, letter.as_str(), channel.name()])
        }
    }
}

//! Channel membership, topic and flags.
//!
//! All of a channel's state lives behind one mutex. Membership changes and
//! the broadcasts that announce them happen under that lock, so every member
//! observes joins, parts and messages in the same order. Sends are
//! non-blocking queue pushes; nothing here awaits.

use super::client::Client;
use super::connection::{ConnId, Connection};
use super::flags::{FlagSet, Flagable};
use crate::error::ChannelError;
use chrono::{DateTime, Utc};
use lantern_proto::{Message, irc_to_lower};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Channel topic with attribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub text: String,
    pub set_by: String,
    pub set_at: DateTime<Utc>,
}

/// Result of a successful [`Channel::join`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined { topic: Option<Topic> },
    AlreadyMember,
    /// The joiner is being disconnected; nothing changed.
    Departing,
}

#[derive(Default)]
struct ChannelState {
    members: BTreeMap<ConnId, Arc<Client>>,
    operators: HashSet<ConnId>,
    voiced: HashSet<ConnId>,
    muted: HashSet<ConnId>,
    banned: HashSet<ConnId>,
    topic: Option<Topic>,
    flags: FlagSet,
    /// Set when the last member leaves. A dead channel accepts no joins; the
    /// registry replaces it.
    dead: bool,
}

impl ChannelState {
    fn forget(&mut self, id: ConnId) -> Option<Arc<Client>> {
        self.operators.remove(&id);
        self.voiced.remove(&id);
        self.muted.remove(&id);
        self.banned.remove(&id);
        self.members.remove(&id)
    }

    fn deliver<F>(&self, msg: &Message, filter: F) -> usize
    where
        F: Fn(&Client) -> bool,
    {
        self.members
            .values()
            .filter(|member| filter(member))
            .filter(|member| member.send(msg.clone()))
            .count()
    }

    fn names(&self, include: impl Fn(&Client) -> bool) -> String {
        self.members
            .iter()
            .filter(|(_, member)| include(member))
            .filter_map(|(id, member)| {
                let nick = member.nick()?;
                let sigil = if self.operators.contains(id) {
                    "@"
                } else if self.voiced.contains(id) {
                    "+"
                } else {
                    ""
                };
                Some(format!("{sigil}{nick}"))
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn subset(&mut self, which: Subset) -> &mut HashSet<ConnId> {
        match which {
            Subset::Operators => &mut self.operators,
            Subset::Voiced => &mut self.voiced,
            Subset::Muted => &mut self.muted,
            Subset::Banned => &mut self.banned,
        }
    }
}

#[derive(Clone, Copy)]
enum Subset {
    Operators,
    Voiced,
    Muted,
    Banned,
}

pub struct Channel {
    name: String,
    key: String,
    created_at: DateTime<Utc>,
    state: Mutex<ChannelState>,
}

impl Channel {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            key: irc_to_lower(name),
            created_at: Utc::now(),
            state: Mutex::new(ChannelState::default()),
        }
    }

    /// Display name, as first joined.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Case-folded registry key.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Add `client`, announcing the JOIN to every member including the
    /// joiner. The first member of a channel becomes its operator.
    pub fn join(&self, client: &Arc<Client>, key: Option<&str>) -> Result<JoinOutcome, ChannelError> {
        let mut state = self.state.lock();
        if state.dead {
            return Err(ChannelError::Tombstone);
        }
        let id = client.id();
        if state.members.contains_key(&id) {
            return Ok(JoinOutcome::AlreadyMember);
        }

        if let Some(required) = state.flags.param('k') {
            if key != Some(required) {
                return Err(ChannelError::BadChannelKey);
            }
        }
        if let Some(limit) = state.flags.param('l').and_then(|l| l.parse::<usize>().ok()) {
            if state.members.len() >= limit {
                return Err(ChannelError::ChannelIsFull);
            }
        }

        if state.members.is_empty() {
            state.operators.insert(id);
        }
        state.members.insert(id, Arc::clone(client));
        client.add_channel(&self.key);

        // A disconnect latches before it reads the channel list, so it has
        // either seen this channel or is visible here.
        if client.core().is_closing() {
            state.forget(id);
            client.remove_channel(&self.key);
            state.dead = state.members.is_empty();
            return Ok(JoinOutcome::Departing);
        }

        let join = Message::new("JOIN", [self.name.as_str()]).with_prefix(client.prefix());
        state.deliver(&join, |_| true);

        Ok(JoinOutcome::Joined {
            topic: state.topic.clone(),
        })
    }

    /// Announce the PART to every member, the departing one included, then
    /// remove it. Returns `true` if the channel is now empty (and dead).
    pub fn part(&self, client: &Client, reason: Option<&str>) -> Result<bool, ChannelError> {
        let mut state = self.state.lock();
        let id = client.id();
        if !state.members.contains_key(&id) {
            return Err(ChannelError::NotOnChannel);
        }

        let mut part = Message::new("PART", [self.name.as_str()]).with_prefix(client.prefix());
        if let Some(reason) = reason {
            part = part.with_trailing(reason);
        }
        state.deliver(&part, |_| true);

        state.forget(id);
        client.remove_channel(&self.key);
        state.dead = state.members.is_empty();
        Ok(state.dead)
    }

    /// Remove a member without announcing anything.
    ///
    /// Returns the members that remain and whether the channel is now
    /// empty, or `None` if `id` was not a member.
    pub fn remove_member(&self, id: ConnId) -> Option<(Vec<Arc<Client>>, bool)> {
        let mut state = self.state.lock();
        let client = state.forget(id)?;
        client.remove_channel(&self.key);
        state.dead = state.members.is_empty();
        Some((state.members.values().cloned().collect(), state.dead))
    }

    /// Send `msg` to every member except `sender` that passes `filter`.
    pub fn broadcast_from<F>(&self, sender: &Client, msg: &Message, filter: F) -> usize
    where
        F: Fn(&Client) -> bool,
    {
        let sender_id = sender.id();
        self.state
            .lock()
            .deliver(msg, |member| member.id() != sender_id && filter(member))
    }

    pub fn broadcast_to_all(&self, msg: &Message) -> usize {
        self.state.lock().deliver(msg, |_| true)
    }

    /// Check speaking rights and relay in one step.
    ///
    /// Muted and banned members may not speak; with `n` set, neither may
    /// outsiders.
    pub fn speak(&self, sender: &Client, msg: &Message) -> Result<usize, ChannelError> {
        let state = self.state.lock();
        let id = sender.id();
        let allowed = if state.members.contains_key(&id) {
            !state.muted.contains(&id) && !state.banned.contains(&id)
        } else {
            !state.flags.contains('n')
        };
        if !allowed {
            return Err(ChannelError::CannotSendToChan);
        }
        Ok(state.deliver(msg, |member| member.id() != id))
    }

    /// Space-separated nicknames, `@` for operators and `+` for voiced.
    pub fn names(&self) -> String {
        self.state.lock().names(|_| true)
    }

    /// Names as `viewer` may see them: invisible users are hidden from
    /// anyone who is not on the channel.
    pub fn visible_names(&self, viewer: &Client) -> String {
        let state = self.state.lock();
        if state.members.contains_key(&viewer.id()) {
            state.names(|_| true)
        } else {
            state.names(|member| !member.is_invisible())
        }
    }

    pub fn members(&self) -> Vec<Arc<Client>> {
        self.state.lock().members.values().cloned().collect()
    }

    pub fn member_count(&self) -> usize {
        self.state.lock().members.len()
    }

    pub fn is_member(&self, id: ConnId) -> bool {
        self.state.lock().members.contains_key(&id)
    }

    pub fn is_dead(&self) -> bool {
        self.state.lock().dead
    }

    pub fn is_secret(&self) -> bool {
        self.state.lock().flags.contains('s')
    }

    pub fn is_op(&self, id: ConnId) -> bool {
        self.state.lock().operators.contains(&id)
    }

    pub fn is_voiced(&self, id: ConnId) -> bool {
        self.state.lock().voiced.contains(&id)
    }

    pub fn is_muted(&self, id: ConnId) -> bool {
        self.state.lock().muted.contains(&id)
    }

    pub fn is_banned(&self, id: ConnId) -> bool {
        self.state.lock().banned.contains(&id)
    }

    // Subset setters return `None` when `id` is not a member, otherwise
    // whether anything changed.

    pub fn op(&self, id: ConnId) -> Option<bool> {
        self.mark(Subset::Operators, id, true)
    }

    pub fn deop(&self, id: ConnId) -> Option<bool> {
        self.mark(Subset::Operators, id, false)
    }

    pub fn voice(&self, id: ConnId) -> Option<bool> {
        self.mark(Subset::Voiced, id, true)
    }

    pub fn devoice(&self, id: ConnId) -> Option<bool> {
        self.mark(Subset::Voiced, id, false)
    }

    pub fn mute(&self, id: ConnId) -> Option<bool> {
        self.mark(Subset::Muted, id, true)
    }

    pub fn unmute(&self, id: ConnId) -> Option<bool> {
        self.mark(Subset::Muted, id, false)
    }

    pub fn ban(&self, id: ConnId) -> Option<bool> {
        self.mark(Subset::Banned, id, true)
    }

    pub fn unban(&self, id: ConnId) -> Option<bool> {
        self.mark(Subset::Banned, id, false)
    }

    fn mark(&self, which: Subset, id: ConnId, on: bool) -> Option<bool> {
        let mut state = self.state.lock();
        if !state.members.contains_key(&id) {
            return None;
        }
        let set = state.subset(which);
        Some(if on { set.insert(id) } else { set.remove(&id) })
    }

    pub fn topic(&self) -> Option<Topic> {
        self.state.lock().topic.clone()
    }

    /// Set (or, with empty text, clear) the topic and announce it.
    ///
    /// The setter must be a member; with `t` set it must be an operator.
    pub fn set_topic(&self, setter: &Client, text: &str) -> Result<(), ChannelError> {
        let mut state = self.state.lock();
        let id = setter.id();
        if !state.members.contains_key(&id) {
            return Err(ChannelError::NotOnChannel);
        }
        if state.flags.contains('t') && !state.operators.contains(&id) {
            return Err(ChannelError::ChanOpPrivsNeeded);
        }

        state.topic = (!text.is_empty()).then(|| Topic {
            text: text.to_string(),
            set_by: setter.nick().unwrap_or_default(),
            set_at: Utc::now(),
        });
        let msg = Message::new("TOPIC", [self.name.as_str()])
            .with_trailing(text)
            .with_prefix(setter.prefix());
        state.deliver(&msg, |_| true);
        Ok(())
    }
}

impl Flagable for Channel {
    fn flags(&self) -> FlagSet {
        self.state.lock().flags.clone()
    }

    fn set_flag(&self, letter: char, param: Option<String>) -> bool {
        self.state.lock().flags.set(letter, param)
    }

    fn clear_flag(&self, letter: char) -> bool {
        self.state.lock().flags.clear(letter)
    }

    fn has_flag(&self, letter: char) -> bool {
        self.state.lock().flags.contains(letter)
    }
}

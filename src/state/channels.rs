//! The channel registry: every channel by case-folded name.
//!
//! Channels are created by the first JOIN and deleted when their last
//! member leaves. A channel that empties is marked dead under its own lock
//! before it is unlinked here, so a racing JOIN either lands before the
//! last PART (and keeps the channel alive) or sees the tombstone and retries
//! against a fresh channel.

use super::channel::{Channel, JoinOutcome};
use super::client::Client;
use crate::error::ChannelError;
use dashmap::DashMap;
use lantern_proto::irc_to_lower;
use std::sync::Arc;
use tracing::debug;

#[derive(Default)]
pub struct ChannelRegistry {
    channels: DashMap<String, Arc<Channel>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<Channel>> {
        self.channels
            .get(&irc_to_lower(name))
            .map(|entry| Arc::clone(entry.value()))
            .filter(|channel| !channel.is_dead())
    }

    /// Join `client` to `name`, creating the channel if needed.
    pub fn join(
        &self,
        name: &str,
        client: &Arc<Client>,
        key: Option<&str>,
    ) -> (Arc<Channel>, Result<JoinOutcome, ChannelError>) {
        let folded = irc_to_lower(name);
        loop {
            let channel = Arc::clone(
                self.channels
                    .entry(folded.clone())
                    .or_insert_with(|| {
                        debug!(channel = %name, "Creating channel");
                        Arc::new(Channel::new(name))
                    })
                    .value(),
            );
            match channel.join(client, key) {
                Err(ChannelError::Tombstone) => {
                    self.unlink_if_dead(&folded);
                }
                Ok(JoinOutcome::Departing) => {
                    self.unlink_if_dead(&folded);
                    return (channel, Ok(JoinOutcome::Departing));
                }
                result => return (channel, result),
            }
        }
    }

    /// Drop the entry for `name` if its channel has emptied.
    pub fn unlink_if_dead(&self, name: &str) -> bool {
        let removed = self
            .channels
            .remove_if(&irc_to_lower(name), |_, channel| channel.is_dead())
            .is_some();
        if removed {
            debug!(channel = %name, "Deleted empty channel");
        }
        removed
    }

    /// Live channels, in no particular order.
    pub fn list(&self) -> Vec<Arc<Channel>> {
        self.channels
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .filter(|channel| !channel.is_dead())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// Whether `name` is acceptable as a channel name.
pub fn is_valid_channel_name(name: &str, max_len: usize) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some('#' | '&'))
        && name.len() > 1
        && name.len() <= max_len
        && chars.all(|c| !matches!(c, ' ' | ',' | '\x07' | '\r' | '\n' | '\0'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Connection, ConnectionCore, ConnectionRegistry};

    fn client(reg: &ConnectionRegistry, nick: &str) -> Arc<Client> {
        let client = Arc::new(Client::new(
            ConnectionCore::detached(reg.next_id()),
            "127.0.0.1",
            false,
        ));
        client.set_nick(nick);
        client.set_username(nick);
        client
    }

    #[test]
    fn lookup_is_case_folded() {
        let reg = ConnectionRegistry::new();
        let channels = ChannelRegistry::new();
        let alice = client(&reg, "alice");

        let (chan, result) = channels.join("#Lantern[dev]", &alice, None);
        assert!(matches!(result, Ok(JoinOutcome::Joined { topic: None })));
        assert_eq!(chan.name(), "#Lantern[dev]");
        assert!(channels.get("#lantern{DEV}").is_some());
    }

    #[test]
    fn empty_channels_are_deleted() {
        let reg = ConnectionRegistry::new();
        let channels = ChannelRegistry::new();
        let alice = client(&reg, "alice");

        let (chan, _) = channels.join("#x", &alice, None);
        assert!(chan.part(&alice, None).unwrap());
        assert!(channels.get("#x").is_none());
        assert!(channels.unlink_if_dead("#x"));
        assert!(channels.is_empty());
    }

    #[test]
    fn join_after_death_gets_a_fresh_channel() {
        let reg = ConnectionRegistry::new();
        let channels = ChannelRegistry::new();
        let alice = client(&reg, "alice");
        let bob = client(&reg, "bob");

        let (old, _) = channels.join("#x", &alice, None);
        old.set_topic(&alice, "stale").unwrap();
        old.part(&alice, None).unwrap();

        // The dead entry is still linked; join must replace it.
        let (fresh, result) = channels.join("#x", &bob, None);
        assert!(matches!(result, Ok(JoinOutcome::Joined { topic: None })));
        assert!(!Arc::ptr_eq(&old, &fresh));
        assert!(fresh.is_op(bob.id()));
        assert_eq!(channels.len(), 1);
    }

    #[test]
    fn channel_name_rules() {
        assert!(is_valid_channel_name("#rust", 50));
        assert!(is_valid_channel_name("&local", 50));
        assert!(!is_valid_channel_name("rust", 50));
        assert!(!is_valid_channel_name("#", 50));
        assert!(!is_valid_channel_name("#a,b", 50));
        assert!(!is_valid_channel_name("#toolong", 4));
    }
}

//! The connection registry: every live connection by id.
//!
//! This is the single source of truth for "does this peer exist" and for
//! server-wide broadcast targeting. Nickname lookup is a linear scan over
//! case-folded common names; there is no separate nick index to drift out of
//! sync.

use super::client::Client;
use super::connection::{ConnId, Connection};
use dashmap::DashMap;
use lantern_proto::{Message, irc_eq};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Another connection already holds the requested nickname.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NickCollision {
    pub holder: ConnId,
}

pub struct ConnectionRegistry {
    conns: DashMap<ConnId, Arc<dyn Connection>>,
    next_id: AtomicU64,
    /// Serializes nickname scan-and-commit.
    nick_lock: Mutex<()>,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            conns: DashMap::new(),
            next_id: AtomicU64::new(1),
            nick_lock: Mutex::new(()),
        }
    }

    /// Allocate a fresh id.
    pub fn next_id(&self) -> ConnId {
        ConnId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn add(&self, conn: Arc<dyn Connection>) {
        self.conns.insert(conn.id(), conn);
    }

    /// Remove a connection. Removing twice is harmless.
    pub fn remove(&self, id: ConnId) -> Option<Arc<dyn Connection>> {
        self.conns.remove(&id).map(|(_, conn)| conn)
    }

    pub fn get(&self, id: ConnId) -> Option<Arc<dyn Connection>> {
        self.conns.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.conns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }

    /// Every connection matching `pred`. Shard locks are released before
    /// the caller sees the result.
    pub fn for_each<F>(&self, pred: F) -> Vec<Arc<dyn Connection>>
    where
        F: Fn(&dyn Connection) -> bool,
    {
        self.conns
            .iter()
            .filter(|entry| pred(entry.value().as_ref()))
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Send to every connection except `excluding`. Returns the number of
    /// recipients whose queue accepted the line.
    pub fn broadcast(&self, msg: &Message, excluding: Option<ConnId>) -> usize {
        self.broadcast_filtered(msg, |conn| Some(conn.id()) != excluding)
    }

    pub fn broadcast_filtered<F>(&self, msg: &Message, pred: F) -> usize
    where
        F: Fn(&dyn Connection) -> bool,
    {
        self.for_each(pred)
            .into_iter()
            .filter(|conn| conn.send(msg.clone()))
            .count()
    }

    /// Find a connection by common name under rfc1459 casemapping.
    pub fn find_by_common_name(&self, name: &str) -> Option<Arc<dyn Connection>> {
        self.conns
            .iter()
            .find(|entry| {
                entry
                    .value()
                    .common_name()
                    .is_some_and(|common| irc_eq(&common, name))
            })
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Give `client` the nickname `nick` unless another connection holds it.
    ///
    /// The scan and the write happen under one lock, so two racing callers
    /// can never both succeed with names that fold to the same key. Returns
    /// the previous nickname.
    pub fn commit_nick(&self, client: &Client, nick: &str) -> Result<Option<String>, NickCollision> {
        let _guard = self.nick_lock.lock();
        if let Some(holder) = self.find_by_common_name(nick) {
            if holder.id() != client.id() {
                return Err(NickCollision {
                    holder: holder.id(),
                });
            }
        }
        Ok(client.set_nick(nick))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ConnectionCore, Service};
    use tokio::sync::mpsc;

    fn socket_client(reg: &ConnectionRegistry) -> (Arc<Client>, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(8);
        let core = ConnectionCore::new(reg.next_id(), "127.0.0.1:5000".parse().unwrap(), tx);
        let client = Arc::new(Client::new(core, "127.0.0.1", false));
        reg.add(client.clone());
        (client, rx)
    }

    #[test]
    fn ids_are_unique() {
        let reg = ConnectionRegistry::new();
        let a = reg.next_id();
        let b = reg.next_id();
        assert_ne!(a, b);
    }

    #[test]
    fn remove_is_idempotent() {
        let reg = ConnectionRegistry::new();
        let (client, _rx) = socket_client(&reg);
        assert!(reg.remove(client.id()).is_some());
        assert!(reg.remove(client.id()).is_none());
        assert!(reg.get(client.id()).is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn nick_lookup_is_case_folded() {
        let reg = ConnectionRegistry::new();
        let (client, _rx) = socket_client(&reg);
        reg.commit_nick(&client, "Bob[away]").unwrap();
        let found = reg.find_by_common_name("bob{AWAY}").unwrap();
        assert_eq!(found.id(), client.id());
    }

    #[test]
    fn commit_rejects_names_held_by_others() {
        let reg = ConnectionRegistry::new();
        let (first, _a) = socket_client(&reg);
        let (second, _b) = socket_client(&reg);
        reg.commit_nick(&first, "bob").unwrap();

        let err = reg.commit_nick(&second, "BOB").unwrap_err();
        assert_eq!(err.holder, first.id());
        assert_eq!(second.nick(), None);

        // Re-casing your own nick is fine.
        assert_eq!(reg.commit_nick(&first, "Bob").unwrap().as_deref(), Some("bob"));
    }

    #[test]
    fn services_take_part_in_uniqueness() {
        let reg = ConnectionRegistry::new();
        reg.add(Arc::new(Service::new(
            ConnectionCore::detached(reg.next_id()),
            "NickServ",
        )));
        let (client, _rx) = socket_client(&reg);
        assert!(reg.commit_nick(&client, "nickserv").is_err());
    }

    #[test]
    fn concurrent_commits_pick_one_winner() {
        let reg = Arc::new(ConnectionRegistry::new());
        let clients: Vec<_> = (0..8).map(|_| socket_client(&reg)).collect();

        let handles: Vec<_> = clients
            .iter()
            .map(|(client, _)| {
                let reg = Arc::clone(&reg);
                let client = Arc::clone(client);
                std::thread::spawn(move || reg.commit_nick(&client, "bob").is_ok())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(winners, 1);
        assert_eq!(reg.for_each(|c| c.common_name().is_some()).len(), 1);
    }

    #[tokio::test]
    async fn broadcast_skips_the_excluded_connection() {
        let reg = ConnectionRegistry::new();
        let (a, mut rx_a) = socket_client(&reg);
        let (_b, mut rx_b) = socket_client(&reg);

        let sent = reg.broadcast(&Message::new("NOTICE", ["*", "hi"]), Some(a.id()));
        assert_eq!(sent, 1);
        assert_eq!(rx_b.recv().await.unwrap().command, "NOTICE");
        assert!(rx_a.try_recv().is_err());
    }
}

//! The Hub - process-lifetime shared state.
//!
//! Built once in `main` (or by a test harness) and passed around as
//! `Arc<Hub>`. It owns both registries and the configuration snapshot, and
//! is where connections are created and torn down.

use super::channels::ChannelRegistry;
use super::client::Client;
use super::connection::{ConnId, Connection, ConnectionCore};
use super::link::ServerLink;
use super::registry::ConnectionRegistry;
use super::service::Service;
use crate::config::Config;
use chrono::{DateTime, Utc};
use lantern_proto::{Message, Response};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Version string shown in 002/004.
pub const VERSION: &str = concat!("lanternd-", env!("CARGO_PKG_VERSION"));

pub struct Hub {
    pub config: Config,
    pub connections: ConnectionRegistry,
    pub channels: ChannelRegistry,
    pub started_at: DateTime<Utc>,
    /// Fired by STOP: listeners stop accepting.
    shutdown: CancellationToken,
    /// Fired once STOP has disconnected everyone: listeners may be released.
    drained: CancellationToken,
}

impl Hub {
    pub fn new(config: Config) -> Arc<Self> {
        let hub = Self {
            connections: ConnectionRegistry::new(),
            channels: ChannelRegistry::new(),
            started_at: Utc::now(),
            shutdown: CancellationToken::new(),
            drained: CancellationToken::new(),
            config,
        };
        for nick in &hub.config.services {
            let id = hub.connections.next_id();
            hub.connections
                .add(Arc::new(Service::new(ConnectionCore::detached(id), nick.as_str())));
            debug!(service = %nick, "Service registered");
        }
        Arc::new(hub)
    }

    #[inline]
    pub fn server_name(&self) -> &str {
        &self.config.server.name
    }

    /// Numeric reply from this server.
    pub fn reply(&self, response: Response, args: &[&str]) -> Message {
        Message::reply(self.server_name(), response, args)
    }

    /// Create and register a client for a freshly accepted socket. The
    /// hostname starts out as the peer IP.
    pub fn add_client(&self, addr: SocketAddr, outbound: mpsc::Sender<Message>) -> Arc<Client> {
        let id = self.connections.next_id();
        let client = Arc::new(Client::new(
            ConnectionCore::new(id, addr, outbound),
            addr.ip().to_string(),
            self.config.server.password_required,
        ));
        self.connections.add(client.clone());
        client
    }

    /// Create and register a server link for a socket on a link port.
    pub fn add_link(&self, addr: SocketAddr, outbound: mpsc::Sender<Message>) -> Arc<ServerLink> {
        let id = self.connections.next_id();
        let link = Arc::new(ServerLink::new(
            ConnectionCore::new(id, addr, outbound),
            addr.ip().to_string(),
        ));
        self.connections.add(link.clone());
        link
    }

    /// Tear a connection down. Safe to call any number of times from any
    /// task; only the first call has an effect.
    ///
    /// The peer gets a final `ERROR :Closing Link`, every channel it was on
    /// loses it (remaining members see one QUIT each, however many
    /// channels they shared), and it leaves the registry. The connection's
    /// task is then cancelled, flushes what is queued and closes the socket.
    pub fn disconnect(&self, conn: &dyn Connection, reason: &str) {
        let core = conn.core();
        if !core.begin_disconnect() {
            return;
        }
        let id = conn.id();

        let host = match conn.as_client() {
            Some(client) => client.info().hostname,
            None => conn.reply_target(),
        };
        conn.send(
            Message::new("ERROR", Vec::<String>::new())
                .with_trailing(format!("Closing Link: {host} ({reason})")),
        );

        if let Some(client) = conn.as_client() {
            let quit = Message::new("QUIT", Vec::<String>::new())
                .with_trailing(reason)
                .with_prefix(client.prefix());

            let mut recipients: HashMap<ConnId, Arc<Client>> = HashMap::new();
            for key in client.channels() {
                let Some(channel) = self.channels.get(&key) else {
                    continue;
                };
                if let Some((remaining, empty)) = channel.remove_member(id) {
                    recipients.extend(remaining.into_iter().map(|m| (m.id(), m)));
                    if empty {
                        self.channels.unlink_if_dead(&key);
                    }
                }
            }
            for member in recipients.values() {
                member.send(quit.clone());
            }

            if client.is_welcomed() {
                info!(uid = %id, nick = ?client.nick(), %reason, "Client disconnected");
            }
        } else {
            info!(uid = %id, peer = ?conn.common_name(), %reason, "Connection closed");
        }

        self.connections.remove(id);
        core.cancel_token().cancel();
    }

    /// Shut the server down: stop accepting, disconnect everyone, then let
    /// listeners go. Calling it again does nothing.
    pub fn stop(&self, reason: &str) {
        if self.shutdown.is_cancelled() {
            return;
        }
        info!(%reason, "Server stopping");
        self.shutdown.cancel();
        for conn in self.connections.for_each(|_| true) {
            self.disconnect(&*conn, reason);
        }
        self.drained.cancel();
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub fn drained_token(&self) -> &CancellationToken {
        &self.drained
    }

    pub fn is_stopping(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

//! Server-link connections.
//!
//! Federation is not implemented: a link registers with `SERVER <name>` and
//! is then only kept alive. Its common name is the peer host, not the
//! advertised server name.

use super::connection::{Connection, ConnectionCore, ConnectionKind};
use parking_lot::RwLock;

pub struct ServerLink {
    core: ConnectionCore,
    hostname: String,
    server_name: RwLock<Option<String>>,
}

impl ServerLink {
    pub fn new(core: ConnectionCore, hostname: impl Into<String>) -> Self {
        Self {
            core,
            hostname: hostname.into(),
            server_name: RwLock::new(None),
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Name the peer announced with SERVER.
    pub fn server_name(&self) -> Option<String> {
        self.server_name.read().clone()
    }

    /// Record the SERVER announcement. Returns `false` if one was already
    /// accepted; the first name sticks.
    pub fn register(&self, name: &str) -> bool {
        let mut slot = self.server_name.write();
        if slot.is_some() {
            return false;
        }
        *slot = Some(name.to_string());
        true
    }
}

impl Connection for ServerLink {
    fn core(&self) -> &ConnectionCore {
        &self.core
    }

    fn kind(&self) -> ConnectionKind {
        ConnectionKind::ServerLink
    }

    fn common_name(&self) -> Option<String> {
        Some(self.hostname.clone())
    }

    fn is_registered(&self) -> bool {
        self.server_name.read().is_some()
    }

    fn as_link(&self) -> Option<&ServerLink> {
        Some(self)
    }
}

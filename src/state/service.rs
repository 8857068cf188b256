//! In-process pseudo-users.
//!
//! A service holds a nickname from configuration so no client can take it.
//! It owns no socket; whatever is delivered to it is logged.

use super::connection::{Connection, ConnectionCore, ConnectionKind};
use lantern_proto::Message;
use tracing::info;

pub struct Service {
    core: ConnectionCore,
    nick: String,
}

impl Service {
    pub fn new(core: ConnectionCore, nick: impl Into<String>) -> Self {
        Self {
            core,
            nick: nick.into(),
        }
    }

    pub fn nick(&self) -> &str {
        &self.nick
    }
}

impl Connection for Service {
    fn core(&self) -> &ConnectionCore {
        &self.core
    }

    fn kind(&self) -> ConnectionKind {
        ConnectionKind::Service
    }

    fn common_name(&self) -> Option<String> {
        Some(self.nick.clone())
    }

    fn is_registered(&self) -> bool {
        true
    }

    fn send(&self, msg: Message) -> bool {
        info!(service = %self.nick, line = %msg, "Service received message");
        true
    }
}

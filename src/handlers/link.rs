//! Server-link lines.
//!
//! Links only register and keep themselves alive; nothing they send is
//! propagated. Anything beyond SERVER, PING, PONG, SQUIT, QUIT and ERROR is
//! logged and dropped.

use super::connection::pong;
use crate::state::{Connection, Hub, ServerLink};
use lantern_proto::Message;
use std::time::Instant;
use tracing::{debug, info};

/// What the connection task should do after a link line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkAction {
    Continue,
    Close(String),
}

/// Process one line from a server link.
pub fn handle_link_line(hub: &Hub, link: &ServerLink, msg: &Message) -> LinkAction {
    match msg.command.as_str() {
        "SERVER" => {
            let Some(name) = msg.arg(0) else {
                return LinkAction::Close("SERVER without a name".to_string());
            };
            if link.register(name) {
                info!(uid = %link.id(), host = %link.hostname(), server = %name, "Server link registered");
            } else {
                debug!(uid = %link.id(), server = %name, "Duplicate SERVER ignored");
            }
            LinkAction::Continue
        }
        "PING" => {
            if let Some(token) = msg.arg(0) {
                link.send(pong(hub.server_name(), token));
            }
            LinkAction::Continue
        }
        "PONG" => {
            if let Some(token) = msg.args().last() {
                link.core().liveness().lock().accept_pong(token, Instant::now());
            }
            LinkAction::Continue
        }
        "SQUIT" | "QUIT" => {
            let reason = msg.args().last().map(String::as_str).unwrap_or("Link closed");
            LinkAction::Close(reason.to_string())
        }
        "ERROR" => {
            let text = msg.arg(0).unwrap_or_default();
            info!(uid = %link.id(), host = %link.hostname(), error = %text, "Link reported error");
            LinkAction::Close(format!("Remote error: {text}"))
        }
        other => {
            debug!(uid = %link.id(), command = %other, "Ignoring link command");
            LinkAction::Continue
        }
    }
}

//! The connection capability shared by clients, server links and services.
//!
//! Every variant embeds a [`ConnectionCore`]: identity, the bounded outbound
//! queue, liveness bookkeeping and the one-shot disconnect latch. The
//! registry stores variants as `Arc<dyn Connection>`.

use super::client::Client;
use super::link::ServerLink;
use crate::config::PingConfig;
use lantern_proto::Message;
use parking_lot::Mutex;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Process-unique connection identifier. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnId(pub(crate) u64);

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which variant a connection is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    Client,
    ServerLink,
    Service,
}

/// What the ping supervisor should do with a connection this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessAction {
    Idle,
    SendPing,
    TimedOut,
}

/// Ping/pong bookkeeping.
#[derive(Debug)]
pub struct Liveness {
    token: Option<String>,
    ping_sent_at: Option<Instant>,
    last_seen: Instant,
}

impl Liveness {
    pub fn new(now: Instant) -> Self {
        Self {
            token: None,
            ping_sent_at: None,
            last_seen: now,
        }
    }

    /// Decide the next step. A ping in flight is never followed by another.
    pub fn check(&self, now: Instant, ping: &PingConfig) -> LivenessAction {
        match self.ping_sent_at {
            Some(sent) if now.saturating_duration_since(sent) >= ping.timeout => {
                LivenessAction::TimedOut
            }
            Some(_) => LivenessAction::Idle,
            None if now.saturating_duration_since(self.last_seen) >= ping.frequency => {
                LivenessAction::SendPing
            }
            None => LivenessAction::Idle,
        }
    }

    pub fn record_ping(&mut self, token: String, now: Instant) {
        self.token = Some(token);
        self.ping_sent_at = Some(now);
    }

    /// Accept a PONG. Only the outstanding token counts.
    pub fn accept_pong(&mut self, token: &str, now: Instant) -> bool {
        if self.token.as_deref() != Some(token) {
            return false;
        }
        self.token = None;
        self.ping_sent_at = None;
        self.last_seen = now;
        true
    }

    pub fn outstanding(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

/// State every connection variant carries.
pub struct ConnectionCore {
    id: ConnId,
    addr: Option<SocketAddr>,
    outbound: Option<mpsc::Sender<Message>>,
    liveness: Mutex<Liveness>,
    /// Lines held back while the connection's own command runs.
    held: Mutex<Option<Vec<Message>>>,
    closing: AtomicBool,
    cancel: CancellationToken,
}

impl ConnectionCore {
    /// Core for a socket-backed connection.
    pub fn new(id: ConnId, addr: SocketAddr, outbound: mpsc::Sender<Message>) -> Self {
        Self::build(id, Some(addr), Some(outbound))
    }

    /// Core for an in-process connection with no socket.
    pub fn detached(id: ConnId) -> Self {
        Self::build(id, None, None)
    }

    fn build(id: ConnId, addr: Option<SocketAddr>, outbound: Option<mpsc::Sender<Message>>) -> Self {
        Self {
            id,
            addr,
            outbound,
            liveness: Mutex::new(Liveness::new(Instant::now())),
            held: Mutex::new(None),
            closing: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> ConnId {
        self.id
    }

    pub fn addr(&self) -> Option<SocketAddr> {
        self.addr
    }

    pub fn liveness(&self) -> &Mutex<Liveness> {
        &self.liveness
    }

    /// Fired once the connection has been torn down.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Queue a message without waiting. A full queue drops this message for
    /// this recipient only. While lines are held they are kept in order and
    /// never dropped.
    pub fn deliver(&self, msg: Message) -> bool {
        let Some(tx) = &self.outbound else {
            return false;
        };
        if let Some(held) = self.held.lock().as_mut() {
            held.push(msg);
            return true;
        }
        match tx.try_send(msg) {
            Ok(()) => true,
            Err(TrySendError::Full(msg)) => {
                warn!(uid = %self.id, command = %msg.command, "Send queue full, dropping message");
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(uid = %self.id, "Send queue closed");
                false
            }
        }
    }

    /// Start holding delivered lines instead of queueing them.
    ///
    /// The connection task holds around each of its own commands and writes
    /// the result with [`release`](Self::release), so a long reply cannot
    /// overflow the queue it is not draining meanwhile.
    pub fn hold(&self) {
        let mut held = self.held.lock();
        if held.is_none() {
            *held = Some(Vec::new());
        }
    }

    /// Stop holding and hand back everything held so far.
    pub fn release(&self) -> Vec<Message> {
        self.held.lock().take().unwrap_or_default()
    }

    /// Latch the disconnect. Only the first caller gets `true`.
    pub fn begin_disconnect(&self) -> bool {
        !self.closing.swap(true, Ordering::AcqRel)
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }
}

/// A peer known to the server.
pub trait Connection: Send + Sync {
    fn core(&self) -> &ConnectionCore;

    fn kind(&self) -> ConnectionKind;

    /// Display identity: nickname for clients and services, hostname for links.
    fn common_name(&self) -> Option<String>;

    fn is_registered(&self) -> bool;

    fn id(&self) -> ConnId {
        self.core().id()
    }

    /// Queue a line for this peer. Never blocks.
    fn send(&self, msg: Message) -> bool {
        self.core().deliver(msg)
    }

    /// Name used as the first argument of numeric replies.
    fn reply_target(&self) -> String {
        self.common_name().unwrap_or_else(|| "*".to_string())
    }

    fn as_client(&self) -> Option<&Client> {
        None
    }

    fn as_link(&self) -> Option<&ServerLink> {
        None
    }
}

//! Per-connection task.
//!
//! One task per accepted socket. It waits on three things at once: the next
//! line from the peer, the connection's outbound queue, and its cancellation
//! token. Lines are handled strictly in arrival order, one at a time, and
//! everything a client command produces for its own client is written in
//! full before the next line is read. When
//! the token fires (the connection was disconnected from anywhere) the task
//! writes out whatever is still queued, including the final `ERROR` line,
//! and closes the socket.

use crate::error::HandlerError;
use crate::handlers::{Context, LinkAction, Registry, handle_link_line};
use crate::state::{Client, Connection, Hub, ServerLink};
use futures_util::{SinkExt, StreamExt};
use lantern_proto::{LineCodec, Message};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{debug, info, instrument};

/// Who is on the other end.
enum Peer {
    Client {
        client: Arc<Client>,
        registry: Arc<Registry>,
    },
    Link(Arc<ServerLink>),
}

impl Peer {
    fn conn(&self) -> Arc<dyn Connection> {
        match self {
            Peer::Client { client, .. } => Arc::clone(client) as Arc<dyn Connection>,
            Peer::Link(link) => Arc::clone(link) as Arc<dyn Connection>,
        }
    }
}

/// A connection's I/O task.
pub struct ConnectionTask<S> {
    framed: Framed<S, LineCodec>,
    outbound: mpsc::Receiver<Message>,
    addr: SocketAddr,
    hub: Arc<Hub>,
    peer: Peer,
}

impl<S> ConnectionTask<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Register a new client and build its task.
    pub fn client(stream: S, addr: SocketAddr, hub: Arc<Hub>, registry: Arc<Registry>) -> Self {
        let (tx, outbound) = mpsc::channel(hub.config.limits.send_queue);
        let client = hub.add_client(addr, tx);
        Self {
            framed: Framed::new(stream, LineCodec::new()),
            outbound,
            addr,
            hub,
            peer: Peer::Client { client, registry },
        }
    }

    /// Register a new server link and build its task.
    pub fn link(stream: S, addr: SocketAddr, hub: Arc<Hub>) -> Self {
        let (tx, outbound) = mpsc::channel(hub.config.limits.send_queue);
        let link = hub.add_link(addr, tx);
        Self {
            framed: Framed::new(stream, LineCodec::new()),
            outbound,
            addr,
            hub,
            peer: Peer::Link(link),
        }
    }

    /// Run until the connection is disconnected.
    #[instrument(skip(self), name = "connection", fields(uid = %self.peer.conn().id(), addr = %self.addr))]
    pub async fn run(mut self) {
        let conn = self.peer.conn();
        let cancel = conn.core().cancel_token().clone();

        // STOP may have swept the registry between accept and registration.
        if self.hub.is_stopping() {
            self.hub.disconnect(&*conn, "Server shutting down");
        }

        self.spawn_registration_timeout(Arc::clone(&conn));

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                Some(out) = self.outbound.recv() => {
                    if let Err(e) = self.framed.send(out).await {
                        debug!(error = %e, "Write failed");
                        self.hub.disconnect(&*conn, "Write error");
                    }
                }

                line = self.framed.next() => match line {
                    Some(Ok(line)) => self.process_line(&conn, &line).await,
                    Some(Err(e)) => {
                        debug!(error = %e, "Read failed");
                        self.hub.disconnect(&*conn, &format!("Read error: {e}"));
                    }
                    None => {
                        debug!("Peer closed the stream");
                        self.hub.disconnect(&*conn, "Connection closed");
                    }
                },
            }
        }

        // Flush what was queued before the disconnect, then let go.
        while let Ok(out) = self.outbound.try_recv() {
            if self.framed.send(out).await.is_err() {
                break;
            }
        }
        let _ = self.framed.close().await;
        debug!("Connection task finished");
    }

    async fn process_line(&mut self, conn: &Arc<dyn Connection>, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        let msg = match Message::parse(line) {
            Ok(msg) => msg,
            Err(e) => {
                debug!(error = %e, line = %line, "Unparseable line");
                return;
            }
        };

        let (client, registry) = match &self.peer {
            Peer::Client { client, registry } => (Arc::clone(client), Arc::clone(registry)),
            Peer::Link(link) => {
                if let LinkAction::Close(reason) = handle_link_line(&self.hub, link, &msg) {
                    self.hub.disconnect(&**conn, &reason);
                }
                return;
            }
        };

        client.core().hold();
        let ctx = Context::new(&self.hub, &client);
        let result = registry.dispatch(&ctx, &msg).await;
        let held = client.core().release();
        self.write_held(conn, held).await;

        match result {
            Ok(()) => {}
            Err(HandlerError::Quit(reason)) => {
                let reason = match reason {
                    Some(text) => format!("Quit: {text}"),
                    None => "Client Quit".to_string(),
                };
                self.hub.disconnect(&**conn, &reason);
            }
            Err(HandlerError::AccessDenied(reason)) => {
                info!(%reason, "Access denied");
                self.hub.disconnect(&**conn, &reason);
            }
            Err(other) => {
                debug!(error = %other, "Unexpected handler result");
            }
        }
    }

    /// Write what a command produced for its own client. Lines queued before
    /// the command started go out first.
    async fn write_held(&mut self, conn: &Arc<dyn Connection>, held: Vec<Message>) {
        let mut pending = Vec::new();
        while let Ok(out) = self.outbound.try_recv() {
            pending.push(out);
        }
        for out in pending.into_iter().chain(held) {
            if let Err(e) = self.framed.send(out).await {
                debug!(error = %e, "Write failed");
                self.hub.disconnect(&**conn, "Write error");
                return;
            }
        }
    }

    /// One-shot check: disconnect if still unregistered when the timeout
    /// elapses. Exits early if the connection goes away first.
    fn spawn_registration_timeout(&self, conn: Arc<dyn Connection>) {
        let hub = Arc::clone(&self.hub);
        let timeout = hub.config.registration_timeout;
        let cancel = conn.core().cancel_token().clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    if !conn.is_registered() {
                        info!(uid = %conn.id(), "Registration timed out");
                        hub.disconnect(&*conn, "Registration timeout");
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, duplex};

    fn hub(extra: &str) -> Arc<Hub> {
        Hub::new(Config::parse(&format!("[server]\nname = \"irc.test\"\n{extra}")).unwrap())
    }

    fn addr() -> SocketAddr {
        "127.0.0.1:6000".parse().unwrap()
    }

    #[tokio::test]
    async fn quit_flushes_error_then_closes() {
        let hub = hub("");
        let (server_side, client_side) = duplex(4096);
        let task = ConnectionTask::client(server_side, addr(), Arc::clone(&hub), Arc::new(Registry::new()));
        let handle = tokio::spawn(task.run());

        let (read, mut write) = tokio::io::split(client_side);
        let mut lines = BufReader::new(read).lines();
        write.write_all(b"NICK alice\r\nUSER a 0 * :A\r\n").await.unwrap();
        let first = lines.next_line().await.unwrap().unwrap();
        assert!(first.starts_with(":irc.test 001 alice "));

        write.write_all(b"QUIT :done\r\n").await.unwrap();
        let mut last = String::new();
        while let Some(line) = lines.next_line().await.unwrap() {
            last = line;
        }
        assert_eq!(last, "ERROR :Closing Link: 127.0.0.1 (Quit: done)");
        handle.await.unwrap();
        assert!(hub.connections.is_empty());
    }

    #[tokio::test]
    async fn eof_disconnects() {
        let hub = hub("");
        let (server_side, client_side) = duplex(1024);
        let task = ConnectionTask::client(server_side, addr(), Arc::clone(&hub), Arc::new(Registry::new()));
        assert_eq!(hub.connections.len(), 1);
        drop(client_side);
        task.run().await;
        assert!(hub.connections.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unregistered_connections_time_out() {
        let hub = hub("[registration]\ntimeout = 5");
        let (server_side, client_side) = duplex(1024);
        let task = ConnectionTask::client(server_side, addr(), Arc::clone(&hub), Arc::new(Registry::new()));
        let handle = tokio::spawn(task.run());

        let mut lines = BufReader::new(client_side).lines();
        let line = lines.next_line().await.unwrap().unwrap();
        assert_eq!(line, "ERROR :Closing Link: 127.0.0.1 (Registration timeout)");
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn long_replies_outlast_a_small_queue() {
        let hub = hub("[limits]\nsend_queue = 4");
        let (server_side, client_side) = duplex(4096);
        let task = ConnectionTask::client(server_side, addr(), Arc::clone(&hub), Arc::new(Registry::new()));
        let handle = tokio::spawn(task.run());

        let (read, mut write) = tokio::io::split(client_side);
        let mut lines = BufReader::new(read).lines();
        let channels: Vec<String> = (0..20).map(|n| format!("#room{n}")).collect();
        let script = format!("NICK alice\r\nUSER a 0 * :A\r\nJOIN {}\r\nLIST\r\n", channels.join(","));
        write.write_all(script.as_bytes()).await.unwrap();

        let mut listed = Vec::new();
        let mut seen = Vec::new();
        loop {
            let line = lines.next_line().await.unwrap().unwrap();
            let code = line.split(' ').nth(1).unwrap_or_default().to_string();
            if code == "322" {
                listed.push(line.split(' ').nth(3).unwrap_or_default().to_string());
            }
            seen.push(code.clone());
            if code == "323" {
                break;
            }
        }
        assert!(seen.starts_with(&["001".to_string()]));
        assert_eq!(seen.iter().filter(|c| *c == "366").count(), 20);
        listed.sort();
        let mut expected = channels.clone();
        expected.sort();
        assert_eq!(listed, expected);

        write.write_all(b"QUIT\r\n").await.unwrap();
        while lines.next_line().await.unwrap().is_some() {}
        handle.await.unwrap();
    }
}

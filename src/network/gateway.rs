//! Gateway - TCP listeners that accept incoming connections.
//!
//! Every configured port gets its own accept loop. Client ports spawn client
//! connection tasks; link ports spawn server-link tasks. All loops stop
//! accepting when the hub begins shutting down, and drop their sockets once
//! every connection has been disconnected.

use crate::handlers::Registry;
use crate::network::ConnectionTask;
use crate::state::Hub;
use anyhow::Context as _;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListenerKind {
    Client,
    Link,
}

/// The Gateway accepts incoming TCP connections and spawns their tasks.
pub struct Gateway {
    listeners: Vec<(TcpListener, ListenerKind)>,
    hub: Arc<Hub>,
    registry: Arc<Registry>,
}

impl Gateway {
    /// Bind every client and link port from the configuration.
    pub async fn bind(hub: Arc<Hub>) -> anyhow::Result<Self> {
        let listen = &hub.config.listen;
        let ports = listen
            .ports
            .iter()
            .map(|port| (*port, ListenerKind::Client))
            .chain(listen.link_ports.iter().map(|port| (*port, ListenerKind::Link)));

        let mut listeners = Vec::new();
        for (port, kind) in ports {
            let addr = format!("{}:{}", listen.address, port);
            let listener = TcpListener::bind(&addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;
            info!(address = %listener.local_addr()?, kind = ?kind, "Listener bound");
            listeners.push((listener, kind));
        }

        Ok(Self {
            listeners,
            hub,
            registry: Arc::new(Registry::new()),
        })
    }

    /// Bound addresses of the client listeners.
    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.addrs(ListenerKind::Client)
    }

    /// Bound addresses of the server-link listeners.
    pub fn link_addrs(&self) -> Vec<SocketAddr> {
        self.addrs(ListenerKind::Link)
    }

    fn addrs(&self, wanted: ListenerKind) -> Vec<SocketAddr> {
        self.listeners
            .iter()
            .filter(|(_, kind)| *kind == wanted)
            .filter_map(|(listener, _)| listener.local_addr().ok())
            .collect()
    }

    /// Accept connections until the server is stopped.
    pub async fn run(self) -> anyhow::Result<()> {
        let handles: Vec<JoinHandle<()>> = self
            .listeners
            .into_iter()
            .map(|(listener, kind)| {
                let hub = Arc::clone(&self.hub);
                let registry = Arc::clone(&self.registry);
                tokio::spawn(accept_loop(listener, kind, hub, registry))
            })
            .collect();

        for handle in handles {
            handle.await.context("listener task failed")?;
        }
        info!("All listeners closed");
        Ok(())
    }
}

async fn accept_loop(listener: TcpListener, kind: ListenerKind, hub: Arc<Hub>, registry: Arc<Registry>) {
    let shutdown = hub.shutdown_token().clone();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => spawn_connection(stream, addr, kind, &hub, &registry),
                Err(e) => error!(error = %e, "Failed to accept connection"),
            },
        }
    }

    // Hold the port until everyone has been told goodbye.
    hub.drained_token().cancelled().await;
    if let Ok(addr) = listener.local_addr() {
        info!(address = %addr, "Listener closed");
    }
}

fn spawn_connection(
    stream: tokio::net::TcpStream,
    addr: SocketAddr,
    kind: ListenerKind,
    hub: &Arc<Hub>,
    registry: &Arc<Registry>,
) {
    let _ = stream.set_nodelay(true);
    info!(%addr, kind = ?kind, "Connection accepted");
    let hub = Arc::clone(hub);
    match kind {
        ListenerKind::Client => {
            let task = ConnectionTask::client(stream, addr, hub, Arc::clone(registry));
            tokio::spawn(task.run());
        }
        ListenerKind::Link => {
            let task = ConnectionTask::link(stream, addr, hub);
            tokio::spawn(task.run());
        }
    }
}

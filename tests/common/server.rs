//! In-process test server.
//!
//! Builds a hub from TOML text, binds client port 0 on loopback and runs the
//! gateway and ping supervisor on the test's runtime.

use anyhow::Context;
use lanternd::config::Config;
use lanternd::network::Gateway;
use lanternd::state::Hub;
use lanternd::supervisor::PingSupervisor;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub struct TestServer {
    pub hub: Arc<Hub>,
    address: SocketAddr,
    gateway: Option<JoinHandle<anyhow::Result<()>>>,
}

impl TestServer {
    /// Server with default settings.
    pub async fn spawn() -> anyhow::Result<Self> {
        Self::spawn_with("", "").await
    }

    /// `server_keys` land inside `[server]`; `sections` are appended as
    /// whole tables (`[ping]`, `[policy]`, `[[oper]]`, ...).
    pub async fn spawn_with(server_keys: &str, sections: &str) -> anyhow::Result<Self> {
        let text = format!(
            "[server]\nname = \"irc.test\"\n{server_keys}\n\n[listen]\naddress = \"127.0.0.1\"\nports = [0]\n\n{sections}"
        );
        let hub = Hub::new(Config::parse(&text)?);
        let gateway = Gateway::bind(Arc::clone(&hub)).await?;
        let address = gateway
            .local_addrs()
            .first()
            .copied()
            .context("no client listener bound")?;

        PingSupervisor::new(Arc::clone(&hub)).spawn();
        let gateway = tokio::spawn(gateway.run());

        Ok(Self {
            hub,
            address,
            gateway: Some(gateway),
        })
    }

    pub fn address(&self) -> String {
        self.address.to_string()
    }

    /// Wait for the gateway to finish after a STOP.
    #[allow(dead_code)]
    pub async fn wait_stopped(mut self) -> anyhow::Result<()> {
        let handle = self.gateway.take().context("already stopped")?;
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .context("gateway did not stop")??
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if !self.hub.is_stopping() {
            self.hub.stop("Test finished");
        }
    }
}

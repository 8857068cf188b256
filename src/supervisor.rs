//! Ping supervisor background task.
//!
//! Wakes up periodically, pings registered connections that have been quiet
//! for `ping.frequency`, and disconnects any whose ping has gone unanswered
//! for `ping.timeout`.

use crate::state::{ConnectionKind, Hub, LivenessAction};
use lantern_proto::Message;
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Sweeps per `min(frequency, timeout)`.
const SWEEPS_PER_PERIOD: u32 = 4;

pub struct PingSupervisor {
    hub: Arc<Hub>,
}

impl PingSupervisor {
    pub fn new(hub: Arc<Hub>) -> Self {
        Self { hub }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run until the server stops.
    pub async fn run(self) {
        let ping = self.hub.config.ping;
        let period = ping.frequency.min(ping.timeout) / SWEEPS_PER_PERIOD;
        let mut interval = tokio::time::interval(period.max(Duration::from_millis(100)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let shutdown = self.hub.shutdown_token().clone();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let (pinged, timed_out) = self.sweep(Instant::now());
                    if pinged + timed_out > 0 {
                        debug!(pinged, timed_out, "Ping sweep");
                    }
                }
            }
        }
        debug!("Ping supervisor stopped");
    }

    /// One pass over the registry. Returns (pinged, timed out).
    pub fn sweep(&self, now: Instant) -> (usize, usize) {
        let ping = self.hub.config.ping;
        let watched = self
            .hub
            .connections
            .for_each(|conn| conn.kind() != ConnectionKind::Service && conn.is_registered());

        let mut pinged = 0;
        let mut timed_out = 0;
        for conn in watched {
            let action = {
                let mut liveness = conn.core().liveness().lock();
                let action = liveness.check(now, &ping);
                if action == LivenessAction::SendPing {
                    let token = format!("{:016x}", rand::thread_rng().r#gen::<u64>());
                    liveness.record_ping(token.clone(), now);
                    Some(token)
                } else if action == LivenessAction::TimedOut {
                    None
                } else {
                    continue;
                }
            };

            match action {
                Some(token) => {
                    conn.send(Message::new("PING", Vec::<String>::new()).with_trailing(token));
                    pinged += 1;
                }
                None => {
                    info!(uid = %conn.id(), peer = ?conn.common_name(), "Ping timeout");
                    self.hub.disconnect(&*conn, "Ping timeout");
                    timed_out += 1;
                }
            }
        }
        (pinged, timed_out)
    }
}

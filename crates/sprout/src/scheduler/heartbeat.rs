//! Link liveness: periodic heartbeat and stall detection.

use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::GameClient;
use crate::config::HeartbeatConfig;

/// Counts consecutive heartbeat ticks that found the link silent for too
/// long.
#[derive(Debug, Clone)]
pub struct MissTracker {
    stall_after: Duration,
    max_misses: u32,
    last_success: Instant,
    misses: u32,
}

impl MissTracker {
    pub fn new(stall_after: Duration, max_misses: u32, now: Instant) -> Self {
        Self {
            stall_after,
            max_misses: max_misses.max(1),
            last_success: now,
            misses: 0,
        }
    }

    /// Observes one tick. Returns `true` when pending requests should be
    /// abandoned; the counter restarts in that case.
    pub fn observe(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last_success) <= self.stall_after {
            return false;
        }
        self.misses += 1;
        if self.misses >= self.max_misses {
            self.misses = 0;
            return true;
        }
        false
    }

    pub fn record_success(&mut self, now: Instant) {
        self.last_success = now;
        self.misses = 0;
    }

    pub fn misses(&self) -> u32 {
        self.misses
    }

    pub fn silent_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_success)
    }
}

/// Periodic liveness check.
///
/// Stops by itself once the session is disconnected or the account
/// identity is gone.
pub struct HeartbeatWatchdog {
    client: GameClient,
    config: HeartbeatConfig,
}

impl HeartbeatWatchdog {
    pub fn new(client: GameClient, config: HeartbeatConfig) -> Self {
        Self { client, config }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        let session = self.client.session().clone();
        let user = self.client.user().clone();
        let mut tracker = MissTracker::new(
            self.config.stall_after,
            self.config.max_misses,
            Instant::now(),
        );

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately.
        ticker.tick().await;

        info!(target: "sprout::heartbeat", interval = ?self.config.interval, "heartbeat started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let gid = user.gid();
            if !session.is_connected() || gid == 0 {
                info!(target: "sprout::heartbeat", "session gone, heartbeat stopped");
                break;
            }

            let now = Instant::now();
            if tracker.silent_for(now) > self.config.stall_after {
                warn!(
                    target: "sprout::heartbeat",
                    silent = ?tracker.silent_for(now),
                    pending = session.pending_count(),
                    "connection looks stalled"
                );
            }
            if tracker.observe(now) {
                let failed = session.abandon_pending();
                info!(target: "sprout::heartbeat", failed, "abandoned pending requests");
            }

            match self.client.heartbeat(gid).await {
                Ok(server_time) => {
                    tracker.record_success(Instant::now());
                    debug!(target: "sprout::heartbeat", server_time, "heartbeat ok");
                }
                Err(err) => warn!(target: "sprout::heartbeat", error = %err, "heartbeat failed"),
            }
        }
    }
}

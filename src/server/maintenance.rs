use std::sync::Arc;

use crate::protocol::TeardownReason;

use super::ChatServer;

impl ChatServer {
    /// Inactivity sweep. Peers with no inbound event past the threshold are
    /// force-disconnected; their partner (if any) hears
    /// `partnerDisconnected{inactive}` through the normal teardown path.
    pub async fn cleanup_task(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.cleanup_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            self.run_cleanup_sweep().await;
        }
    }

    /// One pass of the inactivity sweep. Public so tests can drive the loop
    /// deterministically.
    pub async fn run_cleanup_sweep(&self) {
        let stale = self
            .connection_manager
            .collect_idle_clients(self.config.inactive_threshold);

        for peer_id in stale {
            tracing::info!(%peer_id, "Disconnecting inactive peer");
            self.metrics.increment_inactive_disconnects();
            self.disconnect_peer(&peer_id, TeardownReason::Inactive).await;
        }
    }
}

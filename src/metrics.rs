use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

const MILLIS_PER_SEC: f64 = 1_000.0;
const DEFAULT_LOWEST_DISCERNIBLE_MS: u64 = 1;
const DEFAULT_HIGHEST_TRACKABLE_MS: u64 = 300_000; // 5 minutes
const DEFAULT_SIGNIFICANT_FIGURES: u8 = 3;

/// Metrics collection for the in-memory pairing server
#[derive(Debug)]
pub struct ServerMetrics {
    // Connection metrics
    pub total_connections: AtomicU64,
    pub active_connections: AtomicU64,
    pub disconnections: AtomicU64,
    pub websocket_messages_dropped: AtomicU64,

    // Session metrics
    pub registrations: AtomicU64,
    pub inactive_disconnects: AtomicU64,

    // Matching metrics
    pub searches_started: AtomicU64,
    pub searches_cancelled: AtomicU64,
    pub search_timeouts: AtomicU64,
    pub matches_committed: AtomicU64,
    pub match_commit_conflicts: AtomicU64,
    pub pairs_torn_down: AtomicU64,

    // Relay metrics
    pub messages_relayed: AtomicU64,
    pub messages_rejected: AtomicU64,
    pub typing_events: AtomicU64,
    pub webrtc_offers: AtomicU64,
    pub webrtc_answers: AtomicU64,
    pub ice_candidates_forwarded: AtomicU64,
    pub calls_ended: AtomicU64,
    pub calls_rejected: AtomicU64,
    pub call_requests_expired: AtomicU64,

    // Error tracking
    pub validation_errors: AtomicU64,
    pub internal_errors: AtomicU64,

    // Search → match latency
    pub wait_times: Arc<RwLock<WaitTimeTracker>>,
    pub wait_histogram_clamped_samples: AtomicU64,
}

/// HDR histogram over the time peers spend in the waiting pool before a
/// match commits.
#[derive(Debug, Clone)]
pub struct WaitTimeTracker {
    /// None if all creation attempts failed (should be rare)
    histogram: Option<Histogram<u64>>,
    highest_trackable_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MetricsSnapshot {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub connections: ConnectionMetrics,
    pub sessions: SessionMetrics,
    pub matching: MatchingMetrics,
    pub relay: RelayMetrics,
    pub errors: ErrorMetrics,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConnectionMetrics {
    pub total_connections: u64,
    pub active_connections: u64,
    pub disconnections: u64,
    pub websocket_messages_dropped: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionMetrics {
    pub registrations: u64,
    pub inactive_disconnects: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MatchingMetrics {
    pub searches_started: u64,
    pub searches_cancelled: u64,
    pub search_timeouts: u64,
    pub matches_committed: u64,
    pub match_commit_conflicts: u64,
    pub pairs_torn_down: u64,
    pub wait_time: WaitTimeMetrics,
    pub wait_histogram_clamped_samples: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default)]
pub struct WaitTimeMetrics {
    pub average_secs: Option<f64>,
    pub p50_secs: Option<f64>,
    pub p95_secs: Option<f64>,
    pub p99_secs: Option<f64>,
    pub sample_count: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RelayMetrics {
    pub messages_relayed: u64,
    pub messages_rejected: u64,
    pub typing_events: u64,
    pub webrtc_offers: u64,
    pub webrtc_answers: u64,
    pub ice_candidates_forwarded: u64,
    pub calls_ended: u64,
    pub calls_rejected: u64,
    pub call_requests_expired: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ErrorMetrics {
    pub validation_errors: u64,
    pub internal_errors: u64,
    pub total_errors: u64,
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self {
            total_connections: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            disconnections: AtomicU64::new(0),
            websocket_messages_dropped: AtomicU64::new(0),
            registrations: AtomicU64::new(0),
            inactive_disconnects: AtomicU64::new(0),
            searches_started: AtomicU64::new(0),
            searches_cancelled: AtomicU64::new(0),
            search_timeouts: AtomicU64::new(0),
            matches_committed: AtomicU64::new(0),
            match_commit_conflicts: AtomicU64::new(0),
            pairs_torn_down: AtomicU64::new(0),
            messages_relayed: AtomicU64::new(0),
            messages_rejected: AtomicU64::new(0),
            typing_events: AtomicU64::new(0),
            webrtc_offers: AtomicU64::new(0),
            webrtc_answers: AtomicU64::new(0),
            ice_candidates_forwarded: AtomicU64::new(0),
            calls_ended: AtomicU64::new(0),
            calls_rejected: AtomicU64::new(0),
            call_requests_expired: AtomicU64::new(0),
            validation_errors: AtomicU64::new(0),
            internal_errors: AtomicU64::new(0),
            wait_times: Arc::new(RwLock::new(WaitTimeTracker::new())),
            wait_histogram_clamped_samples: AtomicU64::new(0),
        }
    }

    // Connection metrics
    pub fn increment_connections(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement_active_connections(&self) {
        // Atomic check-then-decrement to prevent underflow
        let _ =
            self.active_connections
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                    if current > 0 {
                        Some(current - 1)
                    } else {
                        None
                    }
                });
        self.disconnections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_websocket_messages_dropped(&self) {
        self.websocket_messages_dropped
            .fetch_add(1, Ordering::Relaxed);
    }

    // Session metrics
    pub fn increment_registrations(&self) {
        self.registrations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_inactive_disconnects(&self) {
        self.inactive_disconnects.fetch_add(1, Ordering::Relaxed);
    }

    // Matching metrics
    pub fn increment_searches_started(&self) {
        self.searches_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_searches_cancelled(&self) {
        self.searches_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_search_timeouts(&self) {
        self.search_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_matches_committed(&self) {
        self.matches_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_match_commit_conflicts(&self) {
        self.match_commit_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_pairs_torn_down(&self) {
        self.pairs_torn_down.fetch_add(1, Ordering::Relaxed);
    }

    // Relay metrics
    pub fn increment_messages_relayed(&self) {
        self.messages_relayed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_messages_rejected(&self) {
        self.messages_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_typing_events(&self) {
        self.typing_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_webrtc_offers(&self) {
        self.webrtc_offers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_webrtc_answers(&self) {
        self.webrtc_answers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_ice_candidates_forwarded(&self) {
        self.ice_candidates_forwarded
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_calls_ended(&self) {
        self.calls_ended.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_calls_rejected(&self) {
        self.calls_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_call_requests_expired(&self) {
        self.call_requests_expired.fetch_add(1, Ordering::Relaxed);
    }

    // Error metrics
    pub fn increment_validation_errors(&self) {
        self.validation_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_internal_errors(&self) {
        self.internal_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record how long a peer waited in the pool before its match committed.
    pub async fn record_wait_time(&self, duration: Duration) {
        let mut tracker = self.wait_times.write().await;
        let clamped = tracker.add_sample(duration);
        drop(tracker);
        if clamped {
            self.wait_histogram_clamped_samples
                .fetch_add(1, Ordering::Relaxed);
        }
    }

    pub async fn snapshot(&self) -> MetricsSnapshot {
        let wait_time = self.wait_times.read().await.metrics();
        let validation_errors = self.validation_errors.load(Ordering::Relaxed);
        let internal_errors = self.internal_errors.load(Ordering::Relaxed);

        MetricsSnapshot {
            timestamp: chrono::Utc::now(),
            connections: ConnectionMetrics {
                total_connections: self.total_connections.load(Ordering::Relaxed),
                active_connections: self.active_connections.load(Ordering::Relaxed),
                disconnections: self.disconnections.load(Ordering::Relaxed),
                websocket_messages_dropped: self
                    .websocket_messages_dropped
                    .load(Ordering::Relaxed),
            },
            sessions: SessionMetrics {
                registrations: self.registrations.load(Ordering::Relaxed),
                inactive_disconnects: self.inactive_disconnects.load(Ordering::Relaxed),
            },
            matching: MatchingMetrics {
                searches_started: self.searches_started.load(Ordering::Relaxed),
                searches_cancelled: self.searches_cancelled.load(Ordering::Relaxed),
                search_timeouts: self.search_timeouts.load(Ordering::Relaxed),
                matches_committed: self.matches_committed.load(Ordering::Relaxed),
                match_commit_conflicts: self.match_commit_conflicts.load(Ordering::Relaxed),
                pairs_torn_down: self.pairs_torn_down.load(Ordering::Relaxed),
                wait_time,
                wait_histogram_clamped_samples: self
                    .wait_histogram_clamped_samples
                    .load(Ordering::Relaxed),
            },
            relay: RelayMetrics {
                messages_relayed: self.messages_relayed.load(Ordering::Relaxed),
                messages_rejected: self.messages_rejected.load(Ordering::Relaxed),
                typing_events: self.typing_events.load(Ordering::Relaxed),
                webrtc_offers: self.webrtc_offers.load(Ordering::Relaxed),
                webrtc_answers: self.webrtc_answers.load(Ordering::Relaxed),
                ice_candidates_forwarded: self.ice_candidates_forwarded.load(Ordering::Relaxed),
                calls_ended: self.calls_ended.load(Ordering::Relaxed),
                calls_rejected: self.calls_rejected.load(Ordering::Relaxed),
                call_requests_expired: self.call_requests_expired.load(Ordering::Relaxed),
            },
            errors: ErrorMetrics {
                validation_errors,
                internal_errors,
                total_errors: validation_errors + internal_errors,
            },
        }
    }

    /// Mean wait before a match, in seconds, if any sample was recorded.
    pub async fn average_wait_secs(&self) -> Option<f64> {
        self.wait_times.read().await.metrics().average_secs
    }
}

impl Default for WaitTimeTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitTimeTracker {
    pub fn new() -> Self {
        Self::with_bounds(
            DEFAULT_LOWEST_DISCERNIBLE_MS,
            DEFAULT_HIGHEST_TRACKABLE_MS,
            DEFAULT_SIGNIFICANT_FIGURES,
        )
    }

    pub fn with_bounds(
        lowest_discernible_ms: u64,
        highest_trackable_ms: u64,
        significant_figures: u8,
    ) -> Self {
        let lowest = lowest_discernible_ms.max(1);
        let highest = highest_trackable_ms.max(lowest);
        let sig_figs = significant_figures.clamp(1, 5);

        // Fall back to an unbounded auto-resizing histogram if the bounded
        // constructor rejects the parameters.
        let histogram = Histogram::new_with_bounds(lowest, highest, sig_figs)
            .or_else(|e| {
                tracing::warn!(
                    target: "metrics",
                    error = %e,
                    lowest,
                    highest,
                    sig_figs,
                    "Failed to create histogram with requested bounds, using unbounded fallback"
                );
                Histogram::new(2)
            })
            .ok();

        if histogram.is_none() {
            tracing::error!(
                target: "metrics",
                "All histogram creation attempts failed - wait times will not be recorded"
            );
        }

        Self {
            histogram,
            highest_trackable_ms: highest,
        }
    }

    /// Record a sample; returns true when the value was clamped to the
    /// trackable ceiling.
    pub fn add_sample(&mut self, duration: Duration) -> bool {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        let was_clamped = millis > self.highest_trackable_ms;
        let value = if was_clamped {
            self.highest_trackable_ms
        } else {
            millis
        };
        if let Some(ref mut histogram) = self.histogram {
            if let Err(error) = histogram.record(value) {
                tracing::warn!(
                    target: "metrics",
                    %error,
                    clamped_value = value,
                    "failed to record wait time sample"
                );
            }
        }
        was_clamped
    }

    pub fn metrics(&self) -> WaitTimeMetrics {
        let Some(histogram) = self.histogram.as_ref() else {
            return WaitTimeMetrics::default();
        };
        if histogram.is_empty() {
            return WaitTimeMetrics::default();
        }

        WaitTimeMetrics {
            average_secs: Some(histogram.mean() / MILLIS_PER_SEC),
            p50_secs: Some(histogram.value_at_quantile(0.50) as f64 / MILLIS_PER_SEC),
            p95_secs: Some(histogram.value_at_quantile(0.95) as f64 / MILLIS_PER_SEC),
            p99_secs: Some(histogram.value_at_quantile(0.99) as f64 / MILLIS_PER_SEC),
            sample_count: histogram.len(),
        }
    }
}

//! Call records and pending video-call requests.
//!
//! One logical [`CallRecord`] per pair, indexed under both peer ids so
//! either side's events can resolve it. The server never inspects the SDP
//! payloads it stores.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::protocol::{CallId, CallStatus, PeerId, RoomId};

#[derive(Debug)]
pub(crate) struct CallRecord {
    pub call_id: CallId,
    pub room_id: RoomId,
    pub caller: PeerId,
    pub callee: PeerId,
    pub status: CallStatus,
    pub created_at: DateTime<Utc>,
    pub answered_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub sdp: Option<String>,
    pub answer_sdp: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl CallRecord {
    pub fn new(call_id: CallId, room_id: RoomId, caller: PeerId, callee: PeerId) -> Self {
        Self {
            call_id,
            room_id,
            caller,
            callee,
            status: CallStatus::Pending,
            created_at: Utc::now(),
            answered_at: None,
            ended_at: None,
            sdp: None,
            answer_sdp: None,
            metadata: None,
        }
    }
}

/// Out-of-band video-call request, expired after a TTL.
#[derive(Debug, Clone)]
pub(crate) struct PendingCallRequest {
    pub call_id: CallId,
    pub from: PeerId,
    pub created_at: Instant,
}

pub(crate) struct CallRegistry {
    /// Two index entries per logical record, one per peer.
    records: DashMap<PeerId, Arc<Mutex<CallRecord>>>,
    pending_requests: DashMap<PeerId, PendingCallRequest>,
}

impl CallRegistry {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            pending_requests: DashMap::new(),
        }
    }

    /// Install a record under both peers, replacing any previous one.
    pub fn insert(&self, record: CallRecord) -> Arc<Mutex<CallRecord>> {
        let caller = record.caller;
        let callee = record.callee;
        let shared = Arc::new(Mutex::new(record));
        self.records.insert(caller, shared.clone());
        self.records.insert(callee, shared.clone());
        shared
    }

    pub fn get(&self, peer_id: &PeerId) -> Option<Arc<Mutex<CallRecord>>> {
        self.records.get(peer_id).map(|entry| entry.value().clone())
    }

    /// Drop the record referenced by this peer, from both index entries.
    pub async fn clear_for(&self, peer_id: &PeerId) {
        let Some((_, record)) = self.records.remove(peer_id) else {
            return;
        };
        let (caller, callee) = {
            let record = record.lock().await;
            (record.caller, record.callee)
        };
        self.records.remove(&caller);
        self.records.remove(&callee);
    }

    /// Number of distinct calls currently `offered` or `answered`.
    pub async fn active_call_count(&self) -> usize {
        let mut seen = std::collections::HashSet::new();
        let records: Vec<_> = self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        for record in records {
            let record = record.lock().await;
            if record.status.is_active() {
                seen.insert(record.call_id);
            }
        }
        seen.len()
    }

    // Pending video-call requests

    pub fn insert_pending(&self, target: PeerId, request: PendingCallRequest) {
        self.pending_requests.insert(target, request);
    }

    pub fn pending_for(&self, target: &PeerId) -> Option<PendingCallRequest> {
        self.pending_requests.get(target).map(|r| r.clone())
    }

    /// Remove a pending request if it still carries the given call id.
    /// Returns true when something was removed.
    pub fn expire_pending(&self, target: &PeerId, call_id: CallId) -> bool {
        self.pending_requests
            .remove_if(target, |_, request| request.call_id == call_id)
            .is_some()
    }

    /// Drop every pending request mentioning the peer, as target or origin.
    pub fn clear_pending_for(&self, peer_id: &PeerId) {
        self.pending_requests.remove(peer_id);
        self.pending_requests
            .retain(|_, request| request.from != *peer_id);
    }

    pub fn pending_count(&self) -> usize {
        self.pending_requests.len()
    }
}

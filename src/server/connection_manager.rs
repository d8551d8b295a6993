use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{info, warn};

use crate::metrics::ServerMetrics;
use crate::protocol::{PeerId, ServerMessage};

use super::RegisterClientError;

#[derive(Debug, Clone)]
pub(crate) struct ClientConnection {
    pub sender: mpsc::Sender<Arc<ServerMessage>>,
    pub client_addr: SocketAddr,
    /// Refreshed on every inbound event; the inactivity sweep reads it.
    pub last_activity: Instant,
}

pub(crate) struct ConnectionManager {
    clients: DashMap<PeerId, ClientConnection>,
    connections_per_ip: DashMap<IpAddr, usize>,
    metrics: Arc<ServerMetrics>,
    max_connections_per_ip: usize,
}

impl ConnectionManager {
    pub fn new(max_connections_per_ip: usize, metrics: Arc<ServerMetrics>) -> Self {
        Self {
            clients: DashMap::new(),
            connections_per_ip: DashMap::new(),
            metrics,
            max_connections_per_ip,
        }
    }

    pub fn register_client(
        &self,
        sender: mpsc::Sender<Arc<ServerMessage>>,
        client_addr: SocketAddr,
    ) -> Result<PeerId, RegisterClientError> {
        let ip = client_addr.ip();
        if let Err(current) = self.try_reserve_ip_slot(ip) {
            warn!(
                %ip,
                current,
                max = self.max_connections_per_ip,
                "IP connection limit exceeded"
            );
            return Err(RegisterClientError::IpLimitExceeded {
                current,
                limit: self.max_connections_per_ip,
            });
        }

        let peer_id = PeerId::new_v4();
        self.clients.insert(
            peer_id,
            ClientConnection {
                sender,
                client_addr,
                last_activity: Instant::now(),
            },
        );
        self.metrics.increment_connections();

        info!(%peer_id, client_addr = %client_addr, "Client registered");
        Ok(peer_id)
    }

    pub fn connect_test_client(
        &self,
        peer_id: PeerId,
        sender: mpsc::Sender<Arc<ServerMessage>>,
        client_addr: SocketAddr,
    ) {
        self.increment_ip_slot_unbounded(client_addr.ip());
        self.clients.insert(
            peer_id,
            ClientConnection {
                sender,
                client_addr,
                last_activity: Instant::now(),
            },
        );
        self.metrics.increment_connections();
    }

    /// Refresh the activity timestamp for a peer.
    pub fn touch(&self, peer_id: &PeerId) {
        if let Some(mut client) = self.clients.get_mut(peer_id) {
            client.last_activity = Instant::now();
        }
    }

    /// Enqueue a message for a peer. Returns false when the peer is unknown
    /// or its outbound queue is full (the message is dropped and counted).
    pub fn send_to_peer(&self, peer_id: &PeerId, message: Arc<ServerMessage>) -> bool {
        let Some(client) = self.clients.get(peer_id) else {
            return false;
        };
        match client.sender.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.metrics.increment_websocket_messages_dropped();
                warn!(%peer_id, "Outbound queue full, dropping message");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Enqueue a message for every connected peer.
    pub fn broadcast(&self, message: &Arc<ServerMessage>) {
        for entry in self.clients.iter() {
            if let Err(TrySendError::Full(_)) = entry.sender.try_send(Arc::clone(message)) {
                self.metrics.increment_websocket_messages_dropped();
            }
        }
    }

    pub fn has_client(&self, peer_id: &PeerId) -> bool {
        self.clients.contains_key(peer_id)
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn remove_client(&self, peer_id: &PeerId) -> Option<ClientConnection> {
        self.clients.remove(peer_id).map(|(_, connection)| {
            self.release_ip_slot(connection.client_addr.ip());
            connection
        })
    }

    /// Peers with no inbound event for longer than `threshold`.
    pub fn collect_idle_clients(&self, threshold: std::time::Duration) -> Vec<PeerId> {
        let now = Instant::now();
        self.clients
            .iter()
            .filter_map(|entry| {
                if now.duration_since(entry.last_activity) > threshold {
                    Some(*entry.key())
                } else {
                    None
                }
            })
            .collect()
    }

    fn try_reserve_ip_slot(&self, ip: IpAddr) -> Result<usize, usize> {
        match self.connections_per_ip.entry(ip) {
            dashmap::mapref::entry::Entry::Occupied(mut entry) => {
                let current = *entry.get();
                if current >= self.max_connections_per_ip {
                    Err(current)
                } else {
                    let count = entry.get_mut();
                    *count += 1;
                    Ok(*count)
                }
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                if self.max_connections_per_ip == 0 {
                    Err(0)
                } else {
                    entry.insert(1);
                    Ok(1)
                }
            }
        }
    }

    fn increment_ip_slot_unbounded(&self, ip: IpAddr) {
        if let Some(mut entry) = self.connections_per_ip.get_mut(&ip) {
            *entry += 1;
        } else {
            self.connections_per_ip.insert(ip, 1);
        }
    }

    fn release_ip_slot(&self, ip: IpAddr) {
        if let Some(mut entry) = self.connections_per_ip.get_mut(&ip) {
            if *entry > 1 {
                *entry -= 1;
                return;
            }
        }
        self.connections_per_ip.remove(&ip);
    }
}

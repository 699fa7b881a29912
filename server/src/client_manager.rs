//! Connection tracking for the arena server
//!
//! This module maps transport addresses to player identities:
//! - Client connection lifecycle (connect, disconnect, timeout)
//! - Liveness tracking from any inbound packet
//! - Client capacity management and address lookup for fan-out
//!
//! A client id doubles as the player id inside rooms, so a reconnect from the
//! same address always yields a fresh identity.

use log::info;
use shared::PlayerId;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A connected client
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier assigned by the server
    pub id: PlayerId,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
}

impl Client {
    pub fn new(id: PlayerId, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Returns true if no packets have been received from this client
    /// within `timeout`, indicating a likely disconnect.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected clients
///
/// Enforces the server-wide capacity limit and hands out monotonically
/// increasing ids starting from 1.
pub struct ClientManager {
    clients: HashMap<PlayerId, Client>,
    next_client_id: PlayerId,
    max_clients: usize,
    timeout: Duration,
}

impl ClientManager {
    pub fn new(max_clients: usize, timeout: Duration) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
            timeout,
        }
    }

    /// Attempts to add a new client connection
    ///
    /// Returns Some(client_id) if successful, None if server is at capacity.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<PlayerId> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients.insert(client_id, Client::new(client_id, addr));

        Some(client_id)
    }

    /// Removes a client. Returns true if the client was found and removed.
    pub fn remove_client(&mut self, client_id: &PlayerId) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!("Client {} disconnected", client.id);
            true
        } else {
            false
        }
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<PlayerId> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    /// Refreshes liveness for the client at `addr` and returns its id.
    pub fn touch_addr(&mut self, addr: SocketAddr) -> Option<PlayerId> {
        let client = self.clients.values_mut().find(|c| c.addr == addr)?;
        client.touch();
        Some(client.id)
    }

    /// Checks for and removes timed-out clients
    ///
    /// Returns the removed ids so their rooms can be cleaned up.
    pub fn check_timeouts(&mut self) -> Vec<PlayerId> {
        let timeout = self.timeout;
        let timed_out: Vec<PlayerId> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        for client_id in &timed_out {
            self.remove_client(client_id);
        }

        timed_out
    }

    /// Resolves player ids to addresses, skipping ids that are gone.
    pub fn addrs_for(&self, ids: &[PlayerId]) -> Vec<(PlayerId, SocketAddr)> {
        ids.iter()
            .filter_map(|id| self.clients.get(id).map(|client| (*id, client.addr)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

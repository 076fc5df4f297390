use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::atomic::{AtomicU64, Ordering},
};

use tokio::sync::{broadcast, watch, Mutex};
use tracing::debug;

use crate::message::Event;

pub type ClientId = u64;

/// Broadcast buffer before slow clients start lagging.
pub const DEFAULT_CAPACITY: usize = 128;

/// Server context shared by the input relay and every WebSocket session.
pub struct Hub {
    clients: Mutex<HashMap<ClientId, SocketAddr>>,
    broadcaster: broadcast::Sender<Event>,
    next_id: AtomicU64,
    shutdown: watch::Sender<bool>,
}

impl Hub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (broadcaster, _) = broadcast::channel(capacity);
        let (shutdown, _) = watch::channel(false);
        Self {
            clients: Mutex::new(HashMap::new()),
            broadcaster,
            next_id: AtomicU64::new(1),
            shutdown,
        }
    }

    pub async fn register(&self, peer: SocketAddr) -> ClientId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.clients.lock().await.insert(id, peer);
        id
    }

    pub async fn remove(&self, id: ClientId) -> Option<SocketAddr> {
        self.clients.lock().await.remove(&id)
    }

    pub async fn client_count(&self) -> usize {
        self.clients.lock().await.len()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.broadcaster.subscribe()
    }

    /// Sends `event` to every current subscriber and returns how many there were.
    pub fn broadcast(&self, event: Event) -> usize {
        match self.broadcaster.send(event) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(event)) => {
                debug!(event = %event.event, "no connected clients, event dropped");
                0
            }
        }
    }

    /// Latches the shutdown signal; sessions close once they observe it.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    pub fn is_shut_down(&self) -> bool {
        *self.shutdown.borrow()
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

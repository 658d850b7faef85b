//! Connected clients
//!
//! The broadcaster reaches every client on its own; the registry only keeps
//! track of who is connected and replays speaker state to newcomers.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::dispatch::Relay;

#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub connected_at: DateTime<Utc>,
    pub origin: Option<String>,
}

pub struct ConnectionRegistry {
    relay: Arc<Relay>,
    clients: DashMap<Uuid, ClientInfo>,
}

impl ConnectionRegistry {
    pub fn new(relay: Arc<Relay>) -> Self {
        Self {
            relay,
            clients: DashMap::new(),
        }
    }

    pub fn relay(&self) -> &Arc<Relay> {
        &self.relay
    }

    /// Register a client and replay speaker state in the background.
    ///
    /// The caller should subscribe to the broadcaster before calling this,
    /// or the replay may be missed.
    pub fn connect(&self, origin: Option<String>) -> Uuid {
        let id = Uuid::new_v4();
        info!(client = %id, origin = origin.as_deref().unwrap_or("-"), "client connected");
        self.clients.insert(
            id,
            ClientInfo {
                connected_at: Utc::now(),
                origin,
            },
        );

        if let Some(speaker) = self.relay.speaker().cloned() {
            tokio::spawn(async move { speaker.replay().await });
        }
        id
    }

    pub fn disconnect(&self, id: &Uuid) {
        if let Some((_, client)) = self.clients.remove(id) {
            let seconds = (Utc::now() - client.connected_at).num_seconds();
            info!(client = %id, seconds, "client disconnected");
        } else {
            debug!(client = %id, "disconnect for unknown client");
        }
    }

    pub fn count(&self) -> usize {
        self.clients.len()
    }

    pub fn get(&self, id: &Uuid) -> Option<ClientInfo> {
        self.clients.get(id).map(|client| client.clone())
    }
}

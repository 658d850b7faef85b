//! Fan-out to every connected client

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::event::{BroadcastEvent, EventTag};

/// Buffered events per receiver before a slow client starts missing them
pub const DEFAULT_CAPACITY: usize = 256;

/// Publishes [`BroadcastEvent`]s to all subscribers.
///
/// Delivery is at most once: a receiver that falls more than the channel
/// capacity behind loses the oldest events, and events published while
/// nobody listens are dropped.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    sender: broadcast::Sender<BroadcastEvent>,
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Serialize `payload` and publish it under `tag`.
    ///
    /// Returns the number of receivers the event reached.
    pub fn publish<T: Serialize + ?Sized>(&self, tag: EventTag, payload: &T) -> usize {
        match serde_json::to_value(payload) {
            Ok(value) => self.send(BroadcastEvent::new(tag, value)),
            Err(e) => {
                warn!(tag = %tag, error = %e, "dropping unserializable broadcast");
                0
            }
        }
    }

    pub fn send(&self, event: BroadcastEvent) -> usize {
        let tag = event.tag;
        match self.sender.send(event) {
            Ok(receivers) => {
                debug!(tag = %tag, receivers, "broadcast");
                receivers
            }
            Err(_) => {
                debug!(tag = %tag, "broadcast with no connected clients");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

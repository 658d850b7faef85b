//! Event routing for HTTP callback notifications.
//!
//! The router maintains the set of active subscription IDs and forwards
//! notifications for those IDs to a channel. Notifications for anything else
//! are dropped, which covers late events from subscriptions that were already
//! cancelled.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::trace;

/// An undecoded event notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPayload {
    /// The subscription ID from the `SID` header
    pub subscription_id: String,
    /// The raw XML event body
    pub event_xml: String,
}

/// Routes events from HTTP callbacks to a channel.
#[derive(Clone)]
pub struct EventRouter {
    subscriptions: Arc<RwLock<HashSet<String>>>,
    event_sender: mpsc::UnboundedSender<NotificationPayload>,
}

impl EventRouter {
    /// Create a router forwarding to `event_sender`.
    ///
    /// # Example
    ///
    /// ```
    /// use tokio::sync::mpsc;
    /// use callback_server::router::{EventRouter, NotificationPayload};
    ///
    /// let (tx, _rx) = mpsc::unbounded_channel::<NotificationPayload>();
    /// let router = EventRouter::new(tx);
    /// ```
    pub fn new(event_sender: mpsc::UnboundedSender<NotificationPayload>) -> Self {
        Self {
            subscriptions: Arc::new(RwLock::new(HashSet::new())),
            event_sender,
        }
    }

    /// Start accepting events for `subscription_id`.
    pub async fn register(&self, subscription_id: String) {
        self.subscriptions.write().await.insert(subscription_id);
    }

    /// Stop accepting events for `subscription_id`.
    pub async fn unregister(&self, subscription_id: &str) {
        self.subscriptions.write().await.remove(subscription_id);
    }

    /// Number of registered subscriptions
    pub async fn len(&self) -> usize {
        self.subscriptions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.subscriptions.read().await.is_empty()
    }

    /// Forward an event to the channel.
    ///
    /// Returns `false` when the subscription is unknown. A closed channel is
    /// not an error here; the event is simply lost.
    ///
    /// # Example
    ///
    /// ```
    /// # use tokio::sync::mpsc;
    /// # use callback_server::router::{EventRouter, NotificationPayload};
    /// # #[tokio::main]
    /// # async fn main() {
    /// # let (tx, mut rx) = mpsc::unbounded_channel::<NotificationPayload>();
    /// # let router = EventRouter::new(tx);
    /// router.register("uuid:sub-1".to_string()).await;
    /// let routed = router
    ///     .route_event("uuid:sub-1".to_string(), "<e:propertyset/>".to_string())
    ///     .await;
    /// assert!(routed);
    /// # }
    /// ```
    pub async fn route_event(&self, subscription_id: String, event_xml: String) -> bool {
        let subs = self.subscriptions.read().await;
        if !subs.contains(&subscription_id) {
            trace!(sid = %subscription_id, "no route for subscription");
            return false;
        }

        let payload = NotificationPayload {
            subscription_id,
            event_xml,
        };
        let _ = self.event_sender.send(payload);
        true
    }
}

//! Speakers on the local network
//!
//! Implements the [`crate::speaker`] seams with the blocking `sonos-api` and
//! `sonos-discovery` crates. Every blocking call runs on the blocking pool.
//!
//! Push events arrive at one shared callback server. A dispatcher task looks
//! up the SID of each notification to find which service and speaker it came
//! from, decodes it and forwards the result to that subscription's channel.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use callback_server::{CallbackServer, EventRouter, NotificationPayload};
use sonos_api::events::parse_event;
use sonos_api::{PlayMode, PlayState, Service, SonosClient, SpeakerEvent, Subscription, Track, ZoneGroup};

use crate::config::SonosConfig;
use crate::error::{RelayError, Result};
use crate::speaker::{PushSubscription, SpeakerControl, SpeakerNetwork, SubscriptionGuard};

/// Requested GENA lifetime; speakers usually grant it unchanged
const SUBSCRIPTION_TIMEOUT_SECS: u32 = 3600;

/// Number of ports tried for the callback server
const CALLBACK_PORT_SPAN: u16 = 100;

const PUSH_SERVICES: [Service; 2] = [Service::AVTransport, Service::RenderingControl];

async fn blocking<T, F>(op: F) -> Result<T>
where
    F: FnOnce() -> sonos_api::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| RelayError::Task(e.to_string()))?
        .map_err(RelayError::from)
}

/// Control of one group through its coordinator
#[derive(Debug, Clone)]
pub struct SonosSpeaker {
    client: SonosClient,
    host: String,
}

impl SonosSpeaker {
    pub fn new(client: SonosClient, host: impl Into<String>) -> Self {
        Self {
            client,
            host: host.into(),
        }
    }

    async fn call<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&SonosClient, &str) -> sonos_api::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let client = self.client.clone();
        let host = self.host.clone();
        blocking(move || op(&client, &host)).await
    }
}

#[async_trait]
impl SpeakerControl for SonosSpeaker {
    async fn current_track(&self) -> Result<Track> {
        self.call(|c, h| c.current_track(h)).await
    }

    async fn play_state(&self) -> Result<PlayState> {
        self.call(|c, h| c.play_state(h)).await
    }

    async fn volume(&self) -> Result<u8> {
        self.call(|c, h| c.volume(h)).await
    }

    async fn play(&self) -> Result<()> {
        self.call(|c, h| c.play(h)).await
    }

    async fn pause(&self) -> Result<()> {
        self.call(|c, h| c.pause(h)).await
    }

    async fn next(&self) -> Result<()> {
        self.call(|c, h| c.next(h)).await
    }

    async fn set_play_mode(&self, mode: PlayMode) -> Result<()> {
        self.call(move |c, h| c.set_play_mode(h, mode)).await
    }

    async fn adjust_volume(&self, delta: i32) -> Result<u8> {
        self.call(move |c, h| c.adjust_volume(h, delta)).await
    }

    async fn set_av_transport_uri(&self, uri: &str, metadata: &str) -> Result<()> {
        let (uri, metadata) = (uri.to_string(), metadata.to_string());
        self.call(move |c, h| c.set_av_transport_uri(h, &uri, &metadata))
            .await
    }

    async fn flush_queue(&self) -> Result<()> {
        self.call(|c, h| c.flush_queue(h)).await
    }

    async fn add_uri_to_queue(&self, uri: &str, metadata: &str) -> Result<u32> {
        let (uri, metadata) = (uri.to_string(), metadata.to_string());
        self.call(move |c, h| c.add_uri_to_queue(h, &uri, &metadata))
            .await
    }

    async fn select_track(&self, position: u32) -> Result<()> {
        self.call(move |c, h| c.select_track(h, position)).await
    }
}

#[derive(Clone)]
struct Route {
    service: Service,
    host: String,
    events: mpsc::UnboundedSender<SpeakerEvent>,
}

/// Everything a subscription needs to (re)subscribe and clean up
#[derive(Clone)]
struct Subscriber {
    client: SonosClient,
    router: Arc<EventRouter>,
    routes: Arc<DashMap<String, Route>>,
    callback_url: String,
}

impl Subscriber {
    async fn subscribe(
        &self,
        host: &str,
        service: Service,
        events: &mpsc::UnboundedSender<SpeakerEvent>,
    ) -> Result<Subscription> {
        let client = self.client.clone();
        let (owned_host, url) = (host.to_string(), self.callback_url.clone());
        let subscription = blocking(move || {
            client.subscribe(&owned_host, service, &url, SUBSCRIPTION_TIMEOUT_SECS)
        })
        .await?;

        self.routes.insert(
            subscription.sid().to_string(),
            Route {
                service,
                host: host.to_string(),
                events: events.clone(),
            },
        );
        self.router.register(subscription.sid().to_string()).await;
        debug!(sid = subscription.sid(), service = service.name(), host, "subscribed");
        Ok(subscription)
    }

    async fn forget(&self, subscription: &Subscription) {
        self.routes.remove(subscription.sid());
        self.router.unregister(subscription.sid()).await;
    }

    async fn unsubscribe(&self, subscription: Subscription) {
        self.forget(&subscription).await;
        let sid = subscription.sid().to_string();
        if let Err(e) = blocking(move || subscription.unsubscribe()).await {
            debug!(%sid, error = %e, "unsubscribe failed");
        }
    }

    /// Renew `subscription`, replacing it with a fresh one if the speaker
    /// no longer knows it.
    async fn refresh(
        &self,
        subscription: Subscription,
        events: &mpsc::UnboundedSender<SpeakerEvent>,
    ) -> Subscription {
        let mut renewing = subscription.clone();
        match blocking(move || renewing.renew().map(|_| renewing)).await {
            Ok(renewed) => return renewed,
            Err(e) => warn!(sid = subscription.sid(), error = %e, "renewal failed, resubscribing"),
        }

        match self
            .subscribe(subscription.host(), subscription.service(), events)
            .await
        {
            Ok(fresh) => {
                self.forget(&subscription).await;
                fresh
            }
            Err(e) => {
                warn!(host = subscription.host(), error = %e, "resubscribe failed, retrying later");
                subscription
            }
        }
    }

    /// Keep `subscriptions` alive until `cancel` fires, then unsubscribe.
    async fn maintain(
        self,
        mut subscriptions: Vec<Subscription>,
        events: mpsc::UnboundedSender<SpeakerEvent>,
        mut cancel: oneshot::Receiver<()>,
    ) {
        loop {
            let interval = subscriptions
                .iter()
                .map(Subscription::renewal_interval)
                .min()
                .unwrap_or(Duration::from_secs(60));

            tokio::select! {
                _ = &mut cancel => break,
                _ = tokio::time::sleep(interval) => {}
            }

            let mut refreshed = Vec::with_capacity(subscriptions.len());
            for subscription in subscriptions {
                refreshed.push(self.refresh(subscription, &events).await);
            }
            subscriptions = refreshed;
        }

        for subscription in subscriptions {
            self.unsubscribe(subscription).await;
        }
    }
}

/// The household as reachable from this host
pub struct SonosNetwork {
    client: SonosClient,
    discovery_timeout: Duration,
    subscriber: Option<Subscriber>,
    callback: Mutex<Option<CallbackServer>>,
    dispatcher: JoinHandle<()>,
}

impl SonosNetwork {
    /// Start the callback server and notification dispatcher.
    ///
    /// Never fails: without a callback server the speaker is still
    /// controllable, it just pushes nothing.
    pub async fn start(config: &SonosConfig) -> Self {
        let client = SonosClient::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let range = (
            config.callback_port,
            config.callback_port.saturating_add(CALLBACK_PORT_SPAN - 1),
        );

        let server = match config.callback_ip {
            Some(ip) => CallbackServer::with_advertised_ip(ip, range, tx).await,
            None => CallbackServer::new(range, tx).await,
        };
        let server = match server {
            Ok(server) => Some(server),
            Err(e) => {
                warn!(error = %e, "callback server unavailable, speaker push events disabled");
                None
            }
        };

        let routes = Arc::new(DashMap::new());
        let subscriber = server.as_ref().map(|server| Subscriber {
            client: client.clone(),
            router: server.router().clone(),
            routes: routes.clone(),
            callback_url: server.callback_url(),
        });
        let dispatcher = tokio::spawn(dispatch_notifications(rx, routes));

        Self {
            client,
            discovery_timeout: config.discovery_timeout(),
            subscriber,
            callback: Mutex::new(server),
            dispatcher,
        }
    }

    /// Stop the callback server. Subscriptions should be cancelled first.
    pub async fn shutdown(&self) {
        let server = self.callback.lock().take();
        if let Some(server) = server {
            server.shutdown().await;
        }
        self.dispatcher.abort();
    }
}

#[async_trait]
impl SpeakerNetwork for SonosNetwork {
    async fn discover(&self) -> Result<Option<String>> {
        let timeout = self.discovery_timeout;
        let speaker = tokio::task::spawn_blocking(move || sonos_discovery::first(timeout))
            .await
            .map_err(|e| RelayError::Task(e.to_string()))?;

        Ok(speaker.map(|speaker| {
            info!(room = %speaker.room_name, model = %speaker.model_name, host = %speaker.host(), "speaker discovered");
            speaker.host()
        }))
    }

    async fn zone_groups(&self, host: &str) -> Result<Vec<ZoneGroup>> {
        let client = self.client.clone();
        let host = host.to_string();
        blocking(move || client.zone_groups(&host)).await
    }

    fn control(&self, group: &ZoneGroup) -> Arc<dyn SpeakerControl> {
        Arc::new(SonosSpeaker::new(self.client.clone(), group.host.clone()))
    }

    async fn subscribe(&self, group: &ZoneGroup) -> Result<PushSubscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        let Some(subscriber) = self.subscriber.clone() else {
            debug!(group = %group.name, "no callback server, group will not push events");
            return Ok(PushSubscription::detached(rx));
        };

        let mut subscriptions = Vec::with_capacity(PUSH_SERVICES.len());
        for service in PUSH_SERVICES {
            match subscriber.subscribe(&group.host, service, &tx).await {
                Ok(subscription) => subscriptions.push(subscription),
                Err(e) => {
                    for subscription in subscriptions {
                        subscriber.unsubscribe(subscription).await;
                    }
                    return Err(e);
                }
            }
        }

        let (cancel_tx, cancel_rx) = oneshot::channel();
        let task = tokio::spawn(subscriber.maintain(subscriptions, tx, cancel_rx));
        Ok(PushSubscription {
            events: rx,
            guard: SubscriptionGuard::new(cancel_tx, task),
        })
    }
}

async fn dispatch_notifications(
    mut notifications: mpsc::UnboundedReceiver<NotificationPayload>,
    routes: Arc<DashMap<String, Route>>,
) {
    while let Some(notification) = notifications.recv().await {
        let Some(route) = routes
            .get(&notification.subscription_id)
            .map(|route| route.clone())
        else {
            debug!(sid = %notification.subscription_id, "notification for a retired subscription");
            continue;
        };

        match parse_event(route.service, &notification.event_xml, &route.host) {
            Ok(events) => {
                for event in events {
                    let _ = route.events.send(event);
                }
            }
            Err(e) => warn!(
                sid = %notification.subscription_id,
                service = route.service.name(),
                error = %e,
                "undecodable speaker event"
            ),
        }
    }
}

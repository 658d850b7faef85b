//! Speaker session
//!
//! At most one group is bound at a time. Binding swaps the session under a
//! write lock: push forwarding of the previous session is stopped before the
//! new one becomes visible, and its GENA subscriptions are cancelled after.
//! Commands take a snapshot of the current session, so a rebind never
//! changes the host under an operation already in flight.
//!
//! Every command is a silent no-op while nothing is bound.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use sonos_api::{uri, PlayMode, SpeakerEvent, ZoneGroup};

use crate::broadcast::Broadcaster;
use crate::error::Result;
use crate::event::EventTag;
use crate::speaker::{SpeakerControl, SpeakerNetwork, SpeakerState, SubscriptionGuard};

/// A bound group
pub struct BoundSession {
    group: ZoneGroup,
    control: Arc<dyn SpeakerControl>,
    state: Arc<RwLock<SpeakerState>>,
    forwarder: Mutex<Option<JoinHandle<()>>>,
    guard: Mutex<Option<SubscriptionGuard>>,
}

impl BoundSession {
    pub fn group(&self) -> &ZoneGroup {
        &self.group
    }

    pub fn host(&self) -> &str {
        &self.group.host
    }

    /// Cached state, updated by push events and fetches
    pub fn state(&self) -> SpeakerState {
        self.state.read().clone()
    }

    fn stop_forwarding(&self) {
        if let Some(forwarder) = self.forwarder.lock().take() {
            forwarder.abort();
        }
    }

    async fn release(&self) {
        self.stop_forwarding();
        let guard = self.guard.lock().take();
        if let Some(guard) = guard {
            guard.cancel().await;
        }
    }

    fn record(&self, event: SpeakerEvent, broadcaster: &Broadcaster) {
        self.state.write().apply(&event);
        publish(broadcaster, &event);
    }
}

fn publish(broadcaster: &Broadcaster, event: &SpeakerEvent) {
    match event {
        SpeakerEvent::Track(track) => broadcaster.publish(EventTag::SonosTrack, track),
        SpeakerEvent::State(state) => broadcaster.publish(EventTag::SonosState, state),
        SpeakerEvent::Volume(volume) => broadcaster.publish(EventTag::SonosVolume, volume),
    };
}

pub struct SessionManager {
    network: Arc<dyn SpeakerNetwork>,
    group_prefix: String,
    region: String,
    broadcaster: Broadcaster,
    current: RwLock<Option<Arc<BoundSession>>>,
}

impl SessionManager {
    pub fn new(
        network: Arc<dyn SpeakerNetwork>,
        group_prefix: impl Into<String>,
        region: impl Into<String>,
        broadcaster: Broadcaster,
    ) -> Self {
        Self {
            network,
            group_prefix: group_prefix.into(),
            region: region.into(),
            broadcaster,
            current: RwLock::new(None),
        }
    }

    pub fn current(&self) -> Option<Arc<BoundSession>> {
        self.current.read().clone()
    }

    pub fn is_bound(&self) -> bool {
        self.current.read().is_some()
    }

    /// One discovery pass. Returns whether a group is bound afterwards.
    pub async fn discover_once(&self) -> Result<bool> {
        let Some(host) = self.network.discover().await? else {
            info!("no speaker answered discovery");
            return Ok(self.is_bound());
        };

        let groups = self.network.zone_groups(&host).await?;
        let Some(group) = groups
            .into_iter()
            .find(|group| group.name.starts_with(&self.group_prefix))
        else {
            warn!(prefix = %self.group_prefix, %host, "no speaker group matches");
            return Ok(self.is_bound());
        };

        self.bind(group).await?;
        Ok(true)
    }

    /// Discover once, then again every `rediscover` if set.
    pub async fn run(self: Arc<Self>, rediscover: Option<Duration>) {
        loop {
            if let Err(e) = self.discover_once().await {
                warn!(error = %e, "speaker discovery failed");
            }
            let Some(interval) = rediscover else {
                return;
            };
            tokio::time::sleep(interval).await;
        }
    }

    /// Bind `group`, replacing any current session.
    ///
    /// Rebinding the group that is already bound at the same coordinator is
    /// a no-op.
    pub async fn bind(&self, group: ZoneGroup) -> Result<()> {
        if let Some(current) = self.current() {
            if current.group.id == group.id && current.group.host == group.host {
                debug!(group = %group.name, "speaker group already bound");
                return Ok(());
            }
        }

        let control = self.network.control(&group);
        let (events, guard) = match self.network.subscribe(&group).await {
            Ok(subscription) => (Some(subscription.events), Some(subscription.guard)),
            Err(e) => {
                warn!(group = %group.name, error = %e, "speaker push events unavailable");
                (None, None)
            }
        };

        let session = Arc::new(BoundSession {
            group,
            control,
            state: Arc::new(RwLock::new(SpeakerState::default())),
            forwarder: Mutex::new(None),
            guard: Mutex::new(guard),
        });

        let previous = {
            let mut current = self.current.write();
            if let Some(previous) = current.as_ref() {
                previous.stop_forwarding();
            }
            current.replace(session.clone())
        };

        if let Some(events) = events {
            let forwarder = tokio::spawn(forward(events, session.clone(), self.broadcaster.clone()));
            *session.forwarder.lock() = Some(forwarder);
        }
        info!(group = %session.group.name, host = %session.group.host, "speaker session bound");

        if let Some(previous) = previous {
            previous.release().await;
            debug!(group = %previous.group.name, "previous speaker session released");
        }
        Ok(())
    }

    /// Unbind and cancel push subscriptions
    pub async fn shutdown(&self) {
        let previous = self.current.write().take();
        if let Some(previous) = previous {
            previous.release().await;
        }
    }

    fn bound(&self, operation: &'static str) -> Option<Arc<BoundSession>> {
        let session = self.current();
        if session.is_none() {
            debug!(operation, "no speaker session bound, ignoring");
        }
        session
    }

    pub async fn toggle_playback(&self) -> Result<()> {
        let Some(session) = self.bound("playpause") else {
            return Ok(());
        };
        if session.control.play_state().await?.is_playing() {
            session.control.pause().await
        } else {
            session.control.play().await
        }
    }

    pub async fn next(&self) -> Result<()> {
        let Some(session) = self.bound("playnext") else {
            return Ok(());
        };
        session.control.next().await
    }

    pub async fn shuffle(&self) -> Result<()> {
        self.set_play_mode(PlayMode::Shuffle).await
    }

    pub async fn set_play_mode(&self, mode: PlayMode) -> Result<()> {
        let Some(session) = self.bound("setplaymode") else {
            return Ok(());
        };
        session.control.set_play_mode(mode).await?;
        info!(%mode, "play mode changed");
        Ok(())
    }

    /// Change volume by `delta`. The new level arrives as a push event.
    pub async fn adjust_volume(&self, delta: i32) -> Result<()> {
        let Some(session) = self.bound("volume") else {
            return Ok(());
        };
        let volume = session.control.adjust_volume(delta).await?;
        debug!(delta, volume, "volume adjusted");
        Ok(())
    }

    /// Fetch the current track and broadcast it
    pub async fn publish_track(&self) -> Result<()> {
        let Some(session) = self.bound("gettrack") else {
            return Ok(());
        };
        let track = session.control.current_track().await?;
        session.record(SpeakerEvent::Track(track), &self.broadcaster);
        Ok(())
    }

    /// Replace the queue with `uri` and play it shuffled.
    pub async fn play_uri(&self, stream: &str) -> Result<()> {
        let Some(session) = self.bound("playURI") else {
            return Ok(());
        };
        let control = &session.control;
        let queue = uri::queue_uri(&session.group.coordinator_uuid);

        control.set_av_transport_uri(&queue, "").await?;
        control.flush_queue().await?;
        control.set_play_mode(PlayMode::Shuffle).await?;

        let resolved = uri::resolve(stream, &self.region);
        let first = control
            .add_uri_to_queue(&resolved.uri, &resolved.metadata)
            .await?;
        control.select_track(first.max(1)).await?;
        control.play().await?;
        info!(uri = stream, "playing");
        Ok(())
    }

    pub async fn play_radio(&self, station_id: &str, title: &str) -> Result<()> {
        let Some(session) = self.bound("playRadio") else {
            return Ok(());
        };
        let station = uri::tunein_radio(station_id, title);
        session
            .control
            .set_av_transport_uri(&station.uri, &station.metadata)
            .await?;
        session.control.play().await?;
        info!(station_id, title, "playing radio");
        Ok(())
    }

    /// Broadcast track, play state and volume for a newly connected client.
    ///
    /// The three fetches run concurrently and independently. A failed fetch
    /// falls back to the cached value; with no cached value that part is
    /// skipped.
    pub async fn replay(&self) {
        let Some(session) = self.current() else {
            return;
        };
        let control = &session.control;
        let (track, state, volume) =
            futures::join!(control.current_track(), control.play_state(), control.volume());
        let cached = session.state();

        let fetched = [
            ("track", track.map(SpeakerEvent::Track), cached.track.map(SpeakerEvent::Track)),
            ("state", state.map(SpeakerEvent::State), cached.state.map(SpeakerEvent::State)),
            ("volume", volume.map(SpeakerEvent::Volume), cached.volume.map(SpeakerEvent::Volume)),
        ];
        for (part, result, fallback) in fetched {
            match result {
                Ok(event) => session.record(event, &self.broadcaster),
                Err(e) => {
                    warn!(part, error = %e, "speaker replay fetch failed");
                    if let Some(event) = fallback {
                        publish(&self.broadcaster, &event);
                    }
                }
            }
        }
    }
}

async fn forward(
    mut events: mpsc::UnboundedReceiver<SpeakerEvent>,
    session: Arc<BoundSession>,
    broadcaster: Broadcaster,
) {
    while let Some(event) = events.recv().await {
        session.record(event, &broadcaster);
    }
    debug!(group = %session.group.name, "speaker event stream ended");
}

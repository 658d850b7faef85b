//! Speaker seams
//!
//! The session manager talks to speakers only through these traits, so it
//! can be driven by fakes in tests. [`crate::sonos`] provides the real
//! implementation.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use sonos_api::{PlayMode, PlayState, SpeakerEvent, Track, ZoneGroup};

use crate::error::Result;

/// Playback control of one group, addressed at its coordinator
#[async_trait]
pub trait SpeakerControl: Send + Sync {
    async fn current_track(&self) -> Result<Track>;
    async fn play_state(&self) -> Result<PlayState>;
    async fn volume(&self) -> Result<u8>;
    async fn play(&self) -> Result<()>;
    async fn pause(&self) -> Result<()>;
    async fn next(&self) -> Result<()>;
    async fn set_play_mode(&self, mode: PlayMode) -> Result<()>;
    /// Returns the new volume
    async fn adjust_volume(&self, delta: i32) -> Result<u8>;
    async fn set_av_transport_uri(&self, uri: &str, metadata: &str) -> Result<()>;
    async fn flush_queue(&self) -> Result<()>;
    /// Returns the first queue position used
    async fn add_uri_to_queue(&self, uri: &str, metadata: &str) -> Result<u32>;
    async fn select_track(&self, position: u32) -> Result<()>;
}

/// Discovery, topology and push events for the household
#[async_trait]
pub trait SpeakerNetwork: Send + Sync {
    /// Address (`ip:port`) of the first speaker that answers, if any
    async fn discover(&self) -> Result<Option<String>>;
    async fn zone_groups(&self, host: &str) -> Result<Vec<ZoneGroup>>;
    fn control(&self, group: &ZoneGroup) -> Arc<dyn SpeakerControl>;
    async fn subscribe(&self, group: &ZoneGroup) -> Result<PushSubscription>;
}

/// Decoded push events for one group, alive until cancelled
pub struct PushSubscription {
    pub events: mpsc::UnboundedReceiver<SpeakerEvent>,
    pub guard: SubscriptionGuard,
}

impl PushSubscription {
    /// A subscription with nothing to tear down
    pub fn detached(events: mpsc::UnboundedReceiver<SpeakerEvent>) -> Self {
        Self {
            events,
            guard: SubscriptionGuard::default(),
        }
    }
}

/// Stops the background work behind a [`PushSubscription`]
#[derive(Default)]
pub struct SubscriptionGuard {
    cancel: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SubscriptionGuard {
    pub fn new(cancel: oneshot::Sender<()>, task: JoinHandle<()>) -> Self {
        Self {
            cancel: Some(cancel),
            task: Some(task),
        }
    }

    /// Signal the task and wait for it to finish its cleanup.
    pub async fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Last known state of the bound group
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpeakerState {
    pub track: Option<Track>,
    pub state: Option<PlayState>,
    pub volume: Option<u8>,
}

impl SpeakerState {
    pub fn apply(&mut self, event: &SpeakerEvent) {
        match event {
            SpeakerEvent::Track(track) => self.track = Some(track.clone()),
            SpeakerEvent::State(state) => self.state = Some(*state),
            SpeakerEvent::Volume(volume) => self.volume = Some(*volume),
        }
    }
}

//! Fakes for driving the relay without a network

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

use homeboard_relay::speaker::{PushSubscription, SpeakerControl, SpeakerNetwork};
use homeboard_relay::{BroadcastEvent, Broadcaster, Config, EventTag, Relay, RelayError, SessionManager, Sources};
use homeboard_sources::calendar::CalendarFeed;
use homeboard_sources::lights::{LightController, Scene};
use homeboard_sources::news::NewsSource;
use homeboard_sources::quotes::QuoteSource;
use homeboard_sources::system::{CommandOutput, CommandRunner};
use homeboard_sources::tibber::EnergySource;
use homeboard_sources::weather::{TokenPage, WeatherStation};
use homeboard_sources::SourceError;
use sonos_api::{PlayMode, PlayState, SpeakerEvent, Track, ZoneGroup};

pub type Calls = Arc<Mutex<Vec<String>>>;

fn unavailable(what: &str) -> RelayError {
    RelayError::Speaker(sonos_api::ApiError::NetworkError(format!("{what} unavailable")))
}

pub fn track(title: &str) -> Track {
    Track {
        title: Some(title.to_string()),
        artist: Some("Röyksopp".to_string()),
        ..Track::default()
    }
}

/// A speaker answering from fixed state
pub struct FakeSpeaker {
    pub calls: Calls,
    pub track: Mutex<Track>,
    pub state: Mutex<PlayState>,
    pub volume: Mutex<u8>,
    pub failing: bool,
}

impl FakeSpeaker {
    pub fn new() -> Self {
        Self {
            calls: Calls::default(),
            track: Mutex::new(track("Eple")),
            state: Mutex::new(PlayState::Playing),
            volume: Mutex::new(20),
            failing: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::new()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, call: impl Into<String>) -> Result<(), RelayError> {
        let call = call.into();
        self.calls.lock().push(call.clone());
        if self.failing {
            return Err(unavailable(&call));
        }
        Ok(())
    }
}

#[async_trait]
impl SpeakerControl for FakeSpeaker {
    async fn current_track(&self) -> homeboard_relay::Result<Track> {
        self.record("current_track")?;
        Ok(self.track.lock().clone())
    }

    async fn play_state(&self) -> homeboard_relay::Result<PlayState> {
        self.record("play_state")?;
        Ok(*self.state.lock())
    }

    async fn volume(&self) -> homeboard_relay::Result<u8> {
        self.record("volume")?;
        Ok(*self.volume.lock())
    }

    async fn play(&self) -> homeboard_relay::Result<()> {
        self.record("play")
    }

    async fn pause(&self) -> homeboard_relay::Result<()> {
        self.record("pause")
    }

    async fn next(&self) -> homeboard_relay::Result<()> {
        self.record("next")
    }

    async fn set_play_mode(&self, mode: PlayMode) -> homeboard_relay::Result<()> {
        self.record(format!("set_play_mode {mode}"))
    }

    async fn adjust_volume(&self, delta: i32) -> homeboard_relay::Result<u8> {
        self.record(format!("adjust_volume {delta}"))?;
        let mut volume = self.volume.lock();
        *volume = (i32::from(*volume) + delta).clamp(0, 100) as u8;
        Ok(*volume)
    }

    async fn set_av_transport_uri(&self, uri: &str, _metadata: &str) -> homeboard_relay::Result<()> {
        self.record(format!("set_av_transport_uri {uri}"))
    }

    async fn flush_queue(&self) -> homeboard_relay::Result<()> {
        self.record("flush_queue")
    }

    async fn add_uri_to_queue(&self, uri: &str, _metadata: &str) -> homeboard_relay::Result<u32> {
        self.record(format!("add_uri_to_queue {uri}"))?;
        Ok(1)
    }

    async fn select_track(&self, position: u32) -> homeboard_relay::Result<()> {
        self.record(format!("select_track {position}"))
    }
}

pub fn group(id: &str, name: &str, host: &str) -> ZoneGroup {
    ZoneGroup {
        id: format!("{id}:1"),
        name: name.to_string(),
        coordinator_uuid: id.to_string(),
        host: host.to_string(),
        members: vec![name.to_string()],
    }
}

/// A household of fixed groups; each group gets its own [`FakeSpeaker`]
pub struct FakeNetwork {
    pub answer: Mutex<Option<String>>,
    pub groups: Mutex<Vec<ZoneGroup>>,
    pub speakers: Mutex<Vec<(String, Arc<FakeSpeaker>)>>,
    pub pushers: Mutex<Vec<(String, mpsc::UnboundedSender<SpeakerEvent>)>>,
}

impl FakeNetwork {
    pub fn new(groups: Vec<ZoneGroup>) -> Self {
        Self {
            answer: Mutex::new(Some("10.0.0.2:1400".to_string())),
            groups: Mutex::new(groups),
            speakers: Mutex::new(Vec::new()),
            pushers: Mutex::new(Vec::new()),
        }
    }

    pub fn silent() -> Self {
        let network = Self::new(Vec::new());
        *network.answer.lock() = None;
        network
    }

    pub fn speaker(&self, host: &str) -> Option<Arc<FakeSpeaker>> {
        self.speakers
            .lock()
            .iter()
            .find(|(h, _)| h == host)
            .map(|(_, speaker)| speaker.clone())
    }

    /// Push an event from the group bound at `host`
    pub fn push(&self, host: &str, event: SpeakerEvent) -> bool {
        self.pushers
            .lock()
            .iter()
            .filter(|(h, _)| h == host)
            .any(|(_, tx)| tx.send(event.clone()).is_ok())
    }
}

#[async_trait]
impl SpeakerNetwork for FakeNetwork {
    async fn discover(&self) -> homeboard_relay::Result<Option<String>> {
        Ok(self.answer.lock().clone())
    }

    async fn zone_groups(&self, _host: &str) -> homeboard_relay::Result<Vec<ZoneGroup>> {
        Ok(self.groups.lock().clone())
    }

    fn control(&self, group: &ZoneGroup) -> Arc<dyn SpeakerControl> {
        if let Some(existing) = self.speaker(&group.host) {
            return existing;
        }
        let speaker = Arc::new(FakeSpeaker::new());
        self.speakers
            .lock()
            .push((group.host.clone(), speaker.clone()));
        speaker
    }

    async fn subscribe(&self, group: &ZoneGroup) -> homeboard_relay::Result<PushSubscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.pushers.lock().push((group.host.clone(), tx));
        Ok(PushSubscription::detached(rx))
    }
}

pub struct FakeQuotes;

#[async_trait]
impl QuoteSource for FakeQuotes {
    async fn quotes(&self, symbols: &[String]) -> homeboard_sources::Result<Map<String, Value>> {
        Ok(symbols
            .iter()
            .map(|s| (s.clone(), json!({ "price": { "regularMarketPrice": { "raw": 1.5 } } })))
            .collect())
    }
}

pub struct FakeNews(pub Vec<Value>);

#[async_trait]
impl NewsSource for FakeNews {
    async fn top_headlines(&self) -> homeboard_sources::Result<Vec<Value>> {
        Ok(self.0.clone())
    }
}

pub struct FakeStation(pub Vec<Value>);

#[async_trait]
impl WeatherStation for FakeStation {
    async fn stations_data(&self) -> homeboard_sources::Result<Vec<Value>> {
        Ok(self.0.clone())
    }
}

pub struct FakePage(pub Option<String>);

#[async_trait]
impl TokenPage for FakePage {
    async fn fetch_page(&self) -> homeboard_sources::Result<String> {
        self.0.clone().ok_or(SourceError::Status {
            source_name: "weathermap",
            status: 503,
        })
    }
}

pub struct EmptyCalendar;

#[async_trait]
impl CalendarFeed for EmptyCalendar {
    async fn fetch(&self, _url: &str) -> homeboard_sources::Result<String> {
        Ok("BEGIN:VCALENDAR\r\nVERSION:2.0\r\nEND:VCALENDAR\r\n".to_string())
    }
}

/// Records every query and answers with a fixed `data` document
pub struct FakeEnergy {
    pub data: Value,
    pub queries: Mutex<Vec<(String, Value)>>,
}

impl FakeEnergy {
    pub fn new(data: Value) -> Self {
        Self {
            data,
            queries: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl EnergySource for FakeEnergy {
    async fn query(&self, document: &str, variables: Value) -> homeboard_sources::Result<Value> {
        self.queries.lock().push((document.to_string(), variables));
        Ok(self.data.clone())
    }
}

#[derive(Default)]
pub struct FakeLights(pub Mutex<Vec<Scene>>);

#[async_trait]
impl LightController for FakeLights {
    async fn apply_scene(&self, scene: Scene) -> homeboard_sources::Result<()> {
        self.0.lock().push(scene);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeRunner(pub Mutex<Vec<String>>);

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, command: &str) -> homeboard_sources::Result<CommandOutput> {
        self.0.lock().push(command.to_string());
        Ok(CommandOutput {
            status: Some(0),
            ..CommandOutput::default()
        })
    }
}

/// Sources with nothing configured beyond the always-on ones
pub fn bare_sources() -> Sources {
    Sources {
        weather: None,
        weather_map: Arc::new(FakePage(None)),
        quotes: Arc::new(FakeQuotes),
        news: None,
        calendar: Arc::new(EmptyCalendar),
        tibber: None,
        tibber2: None,
        lights: None,
        commands: Arc::new(FakeRunner::default()),
    }
}

pub fn relay(
    config: Config,
    sources: Sources,
    broadcaster: &Broadcaster,
    speaker: Option<Arc<SessionManager>>,
) -> Arc<Relay> {
    Arc::new(Relay::new(Arc::new(config), sources, broadcaster.clone(), speaker))
}

/// Every event published within `wait`
pub async fn drain(rx: &mut broadcast::Receiver<BroadcastEvent>, wait: Duration) -> Vec<BroadcastEvent> {
    let mut events = Vec::new();
    while let Ok(Ok(event)) = tokio::time::timeout(wait, rx.recv()).await {
        events.push(event);
    }
    events
}

pub fn tags(events: &[BroadcastEvent]) -> Vec<EventTag> {
    events.iter().map(|event| event.tag).collect()
}

/// A relay bound to the "Living" group of a two-group household
pub async fn household_relay(broadcaster: &Broadcaster) -> (Arc<Relay>, Arc<FakeNetwork>) {
    let network = Arc::new(FakeNetwork::new(vec![
        group("RINCON_A", "Kitchen", "10.0.0.10:1400"),
        group("RINCON_B", "Living Room + 1", "10.0.0.11:1400"),
    ]));
    let sessions = Arc::new(SessionManager::new(
        network.clone(),
        "Living",
        "2311",
        broadcaster.clone(),
    ));
    sessions
        .discover_once()
        .await
        .expect("fake discovery never fails");
    (
        relay(Config::default(), bare_sources(), broadcaster, Some(sessions)),
        network,
    )
}

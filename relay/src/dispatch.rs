//! Client request dispatch
//!
//! Every inbound request maps to one handler. Handlers run on their own task
//! and never report back to the client: a missing integration is skipped
//! quietly, anything else that goes wrong is logged and dropped.

use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use homeboard_sources::calendar::{CalendarFeed, HttpCalendarFeed};
use homeboard_sources::lights::{HueBridge, LightController, Scene};
use homeboard_sources::news::{filter_excluded, NewsApi, NewsSource};
use homeboard_sources::quotes::{self, QuoteSource, YahooQuotes};
use homeboard_sources::system::{CommandRunner, ShellRunner};
use homeboard_sources::tibber::{self, EnergySource, TibberClient};
use homeboard_sources::weather::{
    NetatmoClient, NetatmoCredentials, StationOptions, TokenPage, WeatherMapPage, WeatherStation,
};
use homeboard_sources::SourceId;

use crate::broadcast::Broadcaster;
use crate::calendar::CalendarEngine;
use crate::config::Config;
use crate::error::Result;
use crate::event::{ClientRequest, EventTag};
use crate::host::{HostCommand, HostCommands};
use crate::session::SessionManager;
use crate::token::WeatherTokenCache;
use crate::weather::parse_station_data;

/// The adapters a relay works with. `None` means not configured.
pub struct Sources {
    pub weather: Option<Arc<dyn WeatherStation>>,
    pub weather_map: Arc<dyn TokenPage>,
    pub quotes: Arc<dyn QuoteSource>,
    pub news: Option<Arc<dyn NewsSource>>,
    pub calendar: Arc<dyn CalendarFeed>,
    pub tibber: Option<Arc<dyn EnergySource>>,
    pub tibber2: Option<Arc<dyn EnergySource>>,
    pub lights: Option<Arc<dyn LightController>>,
    pub commands: Arc<dyn CommandRunner>,
}

impl Sources {
    /// Real adapters for every integration `config` has credentials for
    pub fn from_config(config: &Config) -> Self {
        let weather = config.weather_enabled().then(|| {
            let netatmo = &config.netatmo;
            Arc::new(NetatmoClient::new(
                NetatmoCredentials {
                    client_id: netatmo.client_id.clone().unwrap_or_default(),
                    client_secret: netatmo.client_secret.clone().unwrap_or_default(),
                    username: netatmo.username.clone(),
                    password: netatmo.password.clone(),
                    refresh_token: netatmo.refresh_token.clone(),
                },
                StationOptions {
                    device_id: netatmo.options.device_id.clone(),
                    get_favorites: netatmo.options.get_favorites,
                },
            )) as Arc<dyn WeatherStation>
        });

        let news = config
            .newsapi
            .key
            .as_deref()
            .filter(|_| config.news_enabled())
            .map(|key| Arc::new(NewsApi::new(key, &config.newsapi.headlines)) as Arc<dyn NewsSource>);

        let tibber = config
            .tibber
            .token
            .as_deref()
            .filter(|_| config.tibber_enabled())
            .map(|token| {
                Arc::new(TibberClient::new(&config.tibber.endpoint, token)) as Arc<dyn EnergySource>
            });

        let tibber2 = config
            .tibber2
            .token
            .as_deref()
            .filter(|_| config.tibber2_enabled())
            .map(|token| {
                Arc::new(TibberClient::new(&config.tibber2.endpoint, token)) as Arc<dyn EnergySource>
            });

        let lights = match (&config.hue.bridge, &config.hue.username) {
            (Some(bridge), Some(username)) if config.lights_enabled() => Some(Arc::new(
                HueBridge::new(bridge, username, config.hue.group.clone()),
            ) as Arc<dyn LightController>),
            _ => None,
        };

        let quotes_endpoint = config
            .quotes
            .endpoint
            .as_deref()
            .unwrap_or(quotes::DEFAULT_ENDPOINT);

        Self {
            weather,
            weather_map: Arc::new(WeatherMapPage::default()),
            quotes: Arc::new(YahooQuotes::new(quotes_endpoint)),
            news,
            calendar: Arc::new(HttpCalendarFeed::new()),
            tibber,
            tibber2,
            lights,
            commands: Arc::new(ShellRunner::new()),
        }
    }
}

/// Orchestrates every integration and publishes results to all clients
pub struct Relay {
    config: Arc<Config>,
    broadcaster: Broadcaster,
    sources: Sources,
    calendar: CalendarEngine,
    weather_token: Option<WeatherTokenCache>,
    host: HostCommands,
    speaker: Option<Arc<SessionManager>>,
}

impl Relay {
    pub fn new(
        config: Arc<Config>,
        sources: Sources,
        broadcaster: Broadcaster,
        speaker: Option<Arc<SessionManager>>,
    ) -> Self {
        let calendar = CalendarEngine::new(sources.calendar.clone(), config.calendar.clone());
        let weather_token = config
            .forecast_enabled()
            .then(|| WeatherTokenCache::new(sources.weather_map.clone()));
        let host = HostCommands::new(sources.commands.clone(), config.system.clone());

        Self {
            config,
            broadcaster,
            sources,
            calendar,
            weather_token,
            host,
            speaker,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    pub fn speaker(&self) -> Option<&Arc<SessionManager>> {
        self.speaker.as_ref()
    }

    pub fn host_commands(&self) -> &HostCommands {
        &self.host
    }

    pub fn weather_token(&self) -> Option<&WeatherTokenCache> {
        self.weather_token.as_ref()
    }

    /// Integrations that are configured and usable
    pub fn enabled(&self) -> Vec<SourceId> {
        SourceId::ALL
            .into_iter()
            .filter(|id| match id {
                SourceId::Speaker => self.speaker.is_some(),
                SourceId::Weather => self.sources.weather.is_some(),
                SourceId::Quotes | SourceId::System => true,
                SourceId::News => self.sources.news.is_some(),
                SourceId::Calendar => self.calendar.enabled(),
                SourceId::Tibber => self.sources.tibber.is_some(),
                SourceId::Tibber2 => self.sources.tibber2.is_some(),
                SourceId::Lights => self.sources.lights.is_some(),
                SourceId::Motion => self.config.motion.pin.is_some(),
            })
            .collect()
    }

    /// Parse a named client message and handle it in the background.
    pub fn dispatch(self: &Arc<Self>, name: &str, data: Value) {
        let request = match ClientRequest::parse(name, data) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "ignoring client request");
                return;
            }
        };

        let relay = self.clone();
        tokio::spawn(async move { relay.run(request).await });
    }

    /// Handle `request`, logging any failure.
    pub async fn run(&self, request: ClientRequest) {
        let name = request.name();
        if let Err(e) = self.handle(request).await {
            warn!(request = name, error = %e, "request failed");
        }
    }

    pub async fn handle(&self, request: ClientRequest) -> Result<()> {
        debug!(request = request.name(), "handling client request");
        match request {
            ClientRequest::Quotes(symbols) => self.quotes(&symbols).await,
            ClientRequest::News => self.news().await,
            ClientRequest::Config => {
                self.send_config().await;
                Ok(())
            }
            ClientRequest::Weather => self.weather().await,
            ClientRequest::Calendar => self.calendar().await,
            ClientRequest::Tibber => self.tibber().await,
            ClientRequest::Tibber2 => self.tibber_home().await,
            ClientRequest::Tibber3 => self.tibber_vehicles().await,
            ClientRequest::SetThermo(temperature) => self.set_thermostat(&temperature).await,
            ClientRequest::SetLights(mode) => self.set_lights(&mode).await,
            ClientRequest::Restart => self.host(HostCommand::Restart).await,
            ClientRequest::Reboot => self.host(HostCommand::Reboot).await,
            ClientRequest::Sleep => self.host(HostCommand::Sleep).await,
            ClientRequest::Wakeup => self.host(HostCommand::Wakeup).await,
            ClientRequest::PlayPause => self.with_speaker(|s| async move { s.toggle_playback().await }).await,
            ClientRequest::PlayNext => self.with_speaker(|s| async move { s.next().await }).await,
            ClientRequest::PlayShuffle => self.with_speaker(|s| async move { s.shuffle().await }).await,
            ClientRequest::VolumeDown => self.with_speaker(|s| async move { s.adjust_volume(-1).await }).await,
            ClientRequest::VolumeUp => self.with_speaker(|s| async move { s.adjust_volume(1).await }).await,
            ClientRequest::GetTrack => self.with_speaker(|s| async move { s.publish_track().await }).await,
            ClientRequest::PlayUri(uri) => {
                self.with_speaker(|s| async move { s.play_uri(&uri).await }).await
            }
            ClientRequest::PlayRadio { station_id, title } => {
                self.with_speaker(|s| async move { s.play_radio(&station_id, &title).await })
                    .await
            }
        }
    }

    async fn with_speaker<F, Fut>(&self, op: F) -> Result<()>
    where
        F: FnOnce(Arc<SessionManager>) -> Fut,
        Fut: std::future::Future<Output = Result<()>>,
    {
        match &self.speaker {
            Some(speaker) => op(speaker.clone()).await,
            None => {
                debug!("speaker not configured");
                Ok(())
            }
        }
    }

    async fn host(&self, command: HostCommand) -> Result<()> {
        info!(command = command.as_str(), "running host command");
        self.host.run(command).await;
        Ok(())
    }

    async fn quotes(&self, symbols: &[String]) -> Result<()> {
        if symbols.is_empty() {
            debug!("quote request without symbols");
            return Ok(());
        }
        let quotes = self.sources.quotes.quotes(symbols).await?;
        self.broadcaster.publish(EventTag::Quotes, &quotes);
        Ok(())
    }

    async fn news(&self) -> Result<()> {
        let Some(news) = &self.sources.news else {
            return Ok(());
        };
        let articles = filter_excluded(news.top_headlines().await?, &self.config.newsapi.exclude);
        self.broadcaster.publish(EventTag::News, &articles);
        Ok(())
    }

    /// Publish the client-safe config, scraping the forecast bearer first
    /// when a forecast device is configured.
    pub async fn send_config(&self) {
        let bearer = match &self.weather_token {
            Some(cache) => cache.ensure_token().await,
            None => None,
        };
        let view = self.config.client_view(bearer.as_deref());
        self.broadcaster.publish(EventTag::Config, &view);
    }

    async fn weather(&self) -> Result<()> {
        let Some(weather) = &self.sources.weather else {
            return Ok(());
        };
        for device in weather.stations_data().await? {
            match parse_station_data(&device) {
                Some(parsed) => {
                    self.broadcaster.publish(EventTag::Weather, &parsed);
                }
                None => warn!(
                    source = "weather",
                    device = %device.get("_id").and_then(serde_json::Value::as_str).unwrap_or("unknown"),
                    "station record without time_utc, skipped"
                ),
            }
        }
        Ok(())
    }

    async fn calendar(&self) -> Result<()> {
        if let Some(events) = self.calendar.merge(Utc::now()).await? {
            info!(events = events.len(), "calendar update");
            self.broadcaster.publish(EventTag::Calendar, &events);
        }
        Ok(())
    }

    async fn tibber(&self) -> Result<()> {
        let Some(tibber) = &self.sources.tibber else {
            return Ok(());
        };
        let data = tibber.query(tibber::PRICE_QUERY, json!({})).await?;
        match data.pointer("/viewer/homes/0") {
            Some(home) => {
                self.broadcaster.publish(EventTag::Tibber, home);
            }
            None => debug!(source = "tibber", "no homes in price response"),
        }
        Ok(())
    }

    async fn tibber_home(&self) -> Result<()> {
        let Some(tibber) = &self.sources.tibber2 else {
            return Ok(());
        };
        let settings = &self.config.tibber2;
        let variables = json!({
            "homeId": settings.home_id.as_deref().unwrap_or_default(),
            "inverterId": settings.inverter.as_deref().unwrap_or_default(),
            "productionId": settings.production.as_deref().unwrap_or_default(),
        });
        let data = tibber.query(tibber::HOME_QUERY, variables).await?;
        self.publish_home(EventTag::Tibber2, &data);
        Ok(())
    }

    async fn tibber_vehicles(&self) -> Result<()> {
        let Some(tibber) = &self.sources.tibber2 else {
            return Ok(());
        };
        let variables = json!({
            "homeId": self.config.tibber2.home_id.as_deref().unwrap_or_default(),
        });
        let data = tibber.query(tibber::VEHICLE_QUERY, variables).await?;
        self.publish_home(EventTag::Tibber3, &data);
        Ok(())
    }

    fn publish_home(&self, tag: EventTag, data: &Value) {
        match data.get("me") {
            Some(me) if !me.is_null() => {
                self.broadcaster.publish(tag, &me["home"]);
            }
            _ => debug!(source = "tibber2", %tag, "no home in response"),
        }
    }

    /// Validated temperature travels as a GraphQL variable; nothing is
    /// broadcast.
    async fn set_thermostat(&self, temperature: &Value) -> Result<()> {
        let Some(tibber) = &self.sources.tibber2 else {
            return Ok(());
        };
        let Some(thermostat) = self.config.tibber2.thermostat.as_deref() else {
            debug!(source = "tibber2", "no thermostat configured");
            return Ok(());
        };
        let temperature = tibber::validate_temperature(temperature)?;
        let variables = json!({
            "homeId": self.config.tibber2.home_id.as_deref().unwrap_or_default(),
            "thermostatId": thermostat,
            "temperature": temperature,
        });
        tibber.query(tibber::SET_THERMOSTAT_MUTATION, variables).await?;
        info!(temperature, "thermostat set");
        Ok(())
    }

    async fn set_lights(&self, mode: &str) -> Result<()> {
        let Some(lights) = &self.sources.lights else {
            return Ok(());
        };
        let scene: Scene = mode.parse()?;
        lights.apply_scene(scene).await?;
        info!(%scene, "light scene applied");
        Ok(())
    }
}

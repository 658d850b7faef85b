//! Relay configuration
//!
//! One JSON document, read once at startup. Every section defaults, and an
//! integration whose credentials are absent is simply disabled. Credentials
//! are never serialized, so the document sent to clients as `CONFIG` is the
//! serialized config itself.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{RelayError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub web: WebConfig,
    pub sonos: SonosConfig,
    pub netatmo: NetatmoConfig,
    pub newsapi: NewsConfig,
    pub quotes: QuotesConfig,
    pub calendar: CalendarConfig,
    pub tibber: TibberConfig,
    pub tibber2: Tibber2Config,
    pub hue: HueConfig,
    #[serde(skip_serializing)]
    pub system: SystemConfig,
    pub motion: MotionConfig,
    /// Opaque client-side settings, forwarded untouched
    pub dashboard: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Listen port for the websocket and static files
    pub socket: u16,
    /// Allowed websocket origins; empty allows all
    pub origins: Vec<String>,
    /// Static file directory
    pub root: Option<PathBuf>,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            socket: 8080,
            origins: Vec::new(),
            root: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SonosConfig {
    /// Name prefix of the group to control; absent disables the speaker
    pub group: Option<String>,
    /// Streaming service region used for Spotify URIs
    pub region: String,
    pub callback_port: u16,
    pub callback_ip: Option<IpAddr>,
    pub discovery_timeout_secs: u64,
    pub rediscover_secs: Option<u64>,
}

impl Default for SonosConfig {
    fn default() -> Self {
        Self {
            group: None,
            region: sonos_api::uri::DEFAULT_SPOTIFY_REGION.to_string(),
            callback_port: 3500,
            callback_ip: None,
            discovery_timeout_secs: 5,
            rediscover_secs: None,
        }
    }
}

impl SonosConfig {
    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery_timeout_secs.max(1))
    }

    pub fn rediscover_interval(&self) -> Option<Duration> {
        self.rediscover_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetatmoConfig {
    pub client_id: Option<String>,
    #[serde(skip_serializing)]
    pub client_secret: Option<String>,
    #[serde(skip_serializing)]
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub options: NetatmoOptions,
    pub forecast: ForecastConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetatmoOptions {
    pub device_id: Option<String>,
    pub get_favorites: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub device_id: Option<String>,
    /// Scraped at runtime, never read from the file
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub bearer: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsConfig {
    #[serde(skip_serializing)]
    pub key: Option<String>,
    /// Query parameters for top-headlines
    pub headlines: Map<String, Value>,
    /// Title keywords that drop an article
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotesConfig {
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    pub shared: FeedConfig,
    pub holiday: FeedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Private feed links are credentials in all but name
    #[serde(skip_serializing)]
    pub url: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    /// Window in days; entries starting `0..days` days from now are kept
    pub days: i64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: None,
            kind: homeboard_sources::calendar::DEFAULT_COMPONENT.to_string(),
            days: 7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TibberConfig {
    #[serde(skip_serializing)]
    pub token: Option<String>,
    pub endpoint: String,
}

impl Default for TibberConfig {
    fn default() -> Self {
        Self {
            token: None,
            endpoint: homeboard_sources::tibber::DEFAULT_ENDPOINT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Tibber2Config {
    #[serde(skip_serializing)]
    pub token: Option<String>,
    pub endpoint: String,
    pub home_id: Option<String>,
    pub inverter: Option<String>,
    pub production: Option<String>,
    pub thermostat: Option<String>,
}

impl Default for Tibber2Config {
    fn default() -> Self {
        Self {
            token: None,
            endpoint: homeboard_sources::tibber::DEFAULT_ENDPOINT.to_string(),
            home_id: None,
            inverter: None,
            production: None,
            thermostat: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HueConfig {
    #[serde(skip_serializing)]
    pub bridge: Option<String>,
    #[serde(skip_serializing)]
    pub username: Option<String>,
    pub group: String,
}

impl Default for HueConfig {
    fn default() -> Self {
        Self {
            bridge: None,
            username: None,
            group: homeboard_sources::lights::DEFAULT_GROUP.to_string(),
        }
    }
}

/// Shell commands run for the host-level requests
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub restart: String,
    pub reboot: String,
    pub sleep: String,
    pub wakeup: String,
    pub nudge: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            restart: "pm2 restart server".to_string(),
            reboot: "sudo reboot".to_string(),
            sleep: "export DISPLAY=:0; sleep 1; xset -display :0.0 s activate; /usr/bin/tvservice -p"
                .to_string(),
            wakeup: "export DISPLAY=:0; xset -display :0.0 s off; xset -display :0.0 dpms force on; xset -display :0.0 -dpms"
                .to_string(),
            nudge: "export DISPLAY=:0 && xdotool mousemove 1 2".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MotionConfig {
    /// sysfs GPIO number; absent disables the sensor
    pub pin: Option<u32>,
    pub threshold: u32,
    pub poll_ms: u64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            pin: None,
            threshold: 10,
            poll_ms: 50,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| RelayError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| RelayError::Config(format!("invalid config: {e}")))
    }

    pub fn speaker_enabled(&self) -> bool {
        self.sonos.group.as_deref().is_some_and(|g| !g.is_empty())
    }

    pub fn weather_enabled(&self) -> bool {
        present(&self.netatmo.client_id) && present(&self.netatmo.client_secret)
    }

    pub fn forecast_enabled(&self) -> bool {
        present(&self.netatmo.forecast.device_id)
    }

    pub fn news_enabled(&self) -> bool {
        present(&self.newsapi.key)
    }

    pub fn tibber_enabled(&self) -> bool {
        present(&self.tibber.token)
    }

    pub fn tibber2_enabled(&self) -> bool {
        present(&self.tibber2.token) && present(&self.tibber2.home_id)
    }

    pub fn lights_enabled(&self) -> bool {
        present(&self.hue.bridge) && present(&self.hue.username)
    }

    /// The document sent to clients as `CONFIG`
    pub fn client_view(&self, forecast_bearer: Option<&str>) -> Value {
        let mut view = self.clone();
        view.netatmo.forecast.bearer = forecast_bearer.map(str::to_string);
        serde_json::to_value(&view).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "config could not be serialized");
            Value::Null
        })
    }
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

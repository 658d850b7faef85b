//! Messages in and out of the relay
//!
//! Clients send `(name, data)` pairs; the relay answers by broadcasting
//! tagged payloads to every connected client.

use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;

use crate::error::{RelayError, Result};

/// Tag of an outbound broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventTag {
    SonosTrack,
    SonosState,
    SonosVolume,
    Quotes,
    News,
    Config,
    Weather,
    Calendar,
    Tibber,
    Tibber2,
    Tibber3,
}

impl EventTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventTag::SonosTrack => "SONOS_TRACK",
            EventTag::SonosState => "SONOS_STATE",
            EventTag::SonosVolume => "SONOS_VOLUME",
            EventTag::Quotes => "QUOTES",
            EventTag::News => "NEWS",
            EventTag::Config => "CONFIG",
            EventTag::Weather => "WEATHER",
            EventTag::Calendar => "CALENDAR",
            EventTag::Tibber => "TIBBER",
            EventTag::Tibber2 => "TIBBER2",
            EventTag::Tibber3 => "TIBBER3",
        }
    }
}

impl fmt::Display for EventTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tagged payload sent to every connected client
#[derive(Debug, Clone, PartialEq)]
pub struct BroadcastEvent {
    pub tag: EventTag,
    pub payload: Value,
}

impl BroadcastEvent {
    pub fn new(tag: EventTag, payload: Value) -> Self {
        Self { tag, payload }
    }

    /// Wire form: `{"event": "<TAG>", "data": <payload>}`
    pub fn to_message(&self) -> Value {
        json!({ "event": self.tag.as_str(), "data": self.payload })
    }
}

/// A request received from a client
#[derive(Debug, Clone, PartialEq)]
pub enum ClientRequest {
    Quotes(Vec<String>),
    News,
    Config,
    Weather,
    Restart,
    Reboot,
    Sleep,
    Wakeup,
    PlayPause,
    PlayNext,
    PlayShuffle,
    VolumeDown,
    VolumeUp,
    GetTrack,
    PlayUri(String),
    PlayRadio { station_id: String, title: String },
    SetLights(String),
    Calendar,
    Tibber,
    Tibber2,
    Tibber3,
    /// Raw temperature; validated by the handler
    SetThermo(Value),
}

impl ClientRequest {
    /// Decode a named request. Data is ignored by requests that take none.
    pub fn parse(name: &str, data: Value) -> Result<Self> {
        let request = match name {
            "quotes" => ClientRequest::Quotes(symbols(&data)),
            "news" => ClientRequest::News,
            "config" => ClientRequest::Config,
            "weather" => ClientRequest::Weather,
            "restart" => ClientRequest::Restart,
            "reboot" => ClientRequest::Reboot,
            "sleep" => ClientRequest::Sleep,
            "wakeup" => ClientRequest::Wakeup,
            "playpause" => ClientRequest::PlayPause,
            "playnext" => ClientRequest::PlayNext,
            "playshuffle" => ClientRequest::PlayShuffle,
            "volumedown" => ClientRequest::VolumeDown,
            "volumeup" => ClientRequest::VolumeUp,
            "gettrack" => ClientRequest::GetTrack,
            "playURI" => match data {
                Value::String(uri) if !uri.trim().is_empty() => ClientRequest::PlayUri(uri),
                other => return Err(invalid(name, format!("expected a URI string, got {other}"))),
            },
            "playRadio" => {
                let (station_id, title) = station(&data)
                    .ok_or_else(|| invalid(name, format!("expected [id, title], got {data}")))?;
                ClientRequest::PlayRadio { station_id, title }
            }
            "setLights" => match data {
                Value::String(mode) => ClientRequest::SetLights(mode),
                other => return Err(invalid(name, format!("expected a scene name, got {other}"))),
            },
            "calendar" => ClientRequest::Calendar,
            "tibber" => ClientRequest::Tibber,
            "tibber2" => ClientRequest::Tibber2,
            "tibber3" => ClientRequest::Tibber3,
            "setthermo" => ClientRequest::SetThermo(data),
            other => return Err(invalid(other, "unknown request".to_string())),
        };
        Ok(request)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClientRequest::Quotes(_) => "quotes",
            ClientRequest::News => "news",
            ClientRequest::Config => "config",
            ClientRequest::Weather => "weather",
            ClientRequest::Restart => "restart",
            ClientRequest::Reboot => "reboot",
            ClientRequest::Sleep => "sleep",
            ClientRequest::Wakeup => "wakeup",
            ClientRequest::PlayPause => "playpause",
            ClientRequest::PlayNext => "playnext",
            ClientRequest::PlayShuffle => "playshuffle",
            ClientRequest::VolumeDown => "volumedown",
            ClientRequest::VolumeUp => "volumeup",
            ClientRequest::GetTrack => "gettrack",
            ClientRequest::PlayUri(_) => "playURI",
            ClientRequest::PlayRadio { .. } => "playRadio",
            ClientRequest::SetLights(_) => "setLights",
            ClientRequest::Calendar => "calendar",
            ClientRequest::Tibber => "tibber",
            ClientRequest::Tibber2 => "tibber2",
            ClientRequest::Tibber3 => "tibber3",
            ClientRequest::SetThermo(_) => "setthermo",
        }
    }
}

fn invalid(name: &str, reason: String) -> RelayError {
    RelayError::InvalidRequest {
        name: name.to_string(),
        reason,
    }
}

/// Symbols arrive as `"AAPL"`, `"AAPL,MSFT"` or `["AAPL", "MSFT"]`
fn symbols(data: &Value) -> Vec<String> {
    let raw: Vec<&str> = match data {
        Value::String(s) => s.split(',').collect(),
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    };
    raw.into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// `[id, title]`, where the id may be a number
fn station(data: &Value) -> Option<(String, String)> {
    let items = data.as_array()?;
    let id = match items.first()? {
        Value::String(s) if !s.is_empty() => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let title = items.get(1).and_then(Value::as_str).unwrap_or_default().to_string();
    Some((id, title))
}

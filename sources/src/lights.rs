//! Philips Hue bridge (v1 REST API)

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::error::{Result, SourceError};
use crate::http::{self, check_status};

pub const DEFAULT_GROUP: &str = "Kitchen";

/// A named lighting preset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scene {
    Tv,
    Dinner,
    Evening,
    Off,
}

impl Scene {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scene::Tv => "tv",
            Scene::Dinner => "dinner",
            Scene::Evening => "evening",
            Scene::Off => "off",
        }
    }

    /// Group action body for this scene
    pub fn group_action(&self) -> Value {
        match self {
            Scene::Tv => json!({ "on": true, "bri": 51, "ct": 454 }),
            Scene::Dinner => json!({ "on": true, "bri": 178, "sat": 203, "ct": 400 }),
            Scene::Evening => json!({ "on": true, "bri": 115, "ct": 447 }),
            Scene::Off => json!({ "on": false }),
        }
    }
}

impl fmt::Display for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scene {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tv" => Ok(Scene::Tv),
            "dinner" => Ok(Scene::Dinner),
            "evening" => Ok(Scene::Evening),
            "off" => Ok(Scene::Off),
            other => Err(SourceError::InvalidInput(format!("unknown light scene: {other}"))),
        }
    }
}

#[async_trait]
pub trait LightController: Send + Sync {
    async fn apply_scene(&self, scene: Scene) -> Result<()>;
}

pub struct HueBridge {
    http: reqwest::Client,
    base: String,
    group: String,
}

impl HueBridge {
    /// `bridge` is a host or base URL; a bare host gets `http://`.
    pub fn new(bridge: &str, username: &str, group: impl Into<String>) -> Self {
        let bridge = bridge.trim_end_matches('/');
        let origin = if bridge.starts_with("http://") || bridge.starts_with("https://") {
            bridge.to_string()
        } else {
            format!("http://{bridge}")
        };
        Self {
            http: http::client(),
            base: format!("{origin}/api/{username}"),
            group: group.into(),
        }
    }

    async fn group_id(&self) -> Result<String> {
        let response = self.http.get(format!("{}/groups", self.base)).send().await?;
        let body: Value = check_status("hue", response)?.json().await?;
        if let Some(message) = first_error(&body) {
            return Err(SourceError::Api {
                source_name: "hue",
                message,
            });
        }

        let groups: Map<String, Value> = match body {
            Value::Object(groups) => groups,
            _ => return Err(SourceError::Parse("groups is not an object".to_string())),
        };
        groups
            .into_iter()
            .find(|(_, group)| group.get("name").and_then(Value::as_str) == Some(self.group.as_str()))
            .map(|(id, _)| id)
            .ok_or_else(|| SourceError::InvalidInput(format!("no light group named {}", self.group)))
    }
}

/// The v1 API answers `200` with `[{"error": {...}}]` on failure
fn first_error(body: &Value) -> Option<String> {
    body.as_array()?.iter().find_map(|entry| {
        entry
            .get("error")?
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string)
    })
}

#[async_trait]
impl LightController for HueBridge {
    async fn apply_scene(&self, scene: Scene) -> Result<()> {
        let id = self.group_id().await?;
        debug!(group = %self.group, id = %id, scene = %scene, "applying light scene");

        let response = self
            .http
            .put(format!("{}/groups/{}/action", self.base, id))
            .json(&scene.group_action())
            .send()
            .await?;
        let body: Value = check_status("hue", response)?.json().await?;
        match first_error(&body) {
            Some(message) => Err(SourceError::Api {
                source_name: "hue",
                message,
            }),
            None => Ok(()),
        }
    }
}

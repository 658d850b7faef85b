//! Netatmo weather station
//!
//! Two unrelated endpoints live here. The station API is regular OAuth2: a
//! token is obtained with the refresh token (or the password grant when no
//! refresh token is configured), cached until shortly before it expires, and
//! used for `getstationsdata`. The public weather map page is fetched as raw
//! text; the forecast bearer is scraped out of it elsewhere.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Result, SourceError};
use crate::http::{self, check_status};

pub const DEFAULT_API_BASE: &str = "https://api.netatmo.com";
pub const DEFAULT_MAP_PAGE: &str = "https://weathermap.netatmo.com/";

/// Tokens are refreshed this long before Netatmo says they expire
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Station data: the raw device records of `getstationsdata`
#[async_trait]
pub trait WeatherStation: Send + Sync {
    async fn stations_data(&self) -> Result<Vec<Value>>;
}

/// The page the forecast bearer is scraped from
#[async_trait]
pub trait TokenPage: Send + Sync {
    async fn fetch_page(&self) -> Result<String>;
}

#[derive(Debug, Clone, Default)]
pub struct NetatmoCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub refresh_token: Option<String>,
}

/// Query options for `getstationsdata`
#[derive(Debug, Clone, Default)]
pub struct StationOptions {
    pub device_id: Option<String>,
    pub get_favorites: Option<bool>,
}

#[derive(Debug)]
struct CachedToken {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    10_800
}

#[derive(Debug, Deserialize)]
struct StationsResponse {
    body: StationsBody,
}

#[derive(Debug, Deserialize)]
struct StationsBody {
    #[serde(default)]
    devices: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiErrorDetail {
    Structured { message: String },
    Plain(String),
}

/// Netatmo station API client
pub struct NetatmoClient {
    http: reqwest::Client,
    api_base: String,
    credentials: NetatmoCredentials,
    options: StationOptions,
    token: Mutex<Option<CachedToken>>,
}

impl NetatmoClient {
    pub fn new(credentials: NetatmoCredentials, options: StationOptions) -> Self {
        Self::with_api_base(DEFAULT_API_BASE, credentials, options)
    }

    pub fn with_api_base(
        api_base: impl Into<String>,
        credentials: NetatmoCredentials,
        options: StationOptions,
    ) -> Self {
        Self {
            http: http::client(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            credentials,
            options,
            token: Mutex::new(None),
        }
    }

    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() + EXPIRY_MARGIN < token.expires_at {
                return Ok(token.access_token.clone());
            }
        }

        let refresh_token = cached
            .as_ref()
            .and_then(|t| t.refresh_token.clone())
            .or_else(|| self.credentials.refresh_token.clone());

        let mut form = vec![
            ("client_id", self.credentials.client_id.clone()),
            ("client_secret", self.credentials.client_secret.clone()),
        ];
        match (
            refresh_token,
            &self.credentials.username,
            &self.credentials.password,
        ) {
            (Some(refresh), _, _) => {
                form.push(("grant_type", "refresh_token".to_string()));
                form.push(("refresh_token", refresh));
            }
            (None, Some(username), Some(password)) => {
                form.push(("grant_type", "password".to_string()));
                form.push(("username", username.clone()));
                form.push(("password", password.clone()));
                form.push(("scope", "read_station".to_string()));
            }
            _ => {
                return Err(SourceError::InvalidInput(
                    "netatmo needs a refresh token or username and password".to_string(),
                ))
            }
        }

        debug!(api_base = %self.api_base, "requesting netatmo token");
        let response = self
            .http
            .post(format!("{}/oauth2/token", self.api_base))
            .form(&form)
            .send()
            .await?;
        let token: TokenResponse = check_status("netatmo", response)?.json().await?;
        info!(expires_in = token.expires_in, "netatmo token acquired");

        let access_token = token.access_token.clone();
        *cached = Some(CachedToken {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(access_token)
    }
}

#[async_trait]
impl WeatherStation for NetatmoClient {
    async fn stations_data(&self) -> Result<Vec<Value>> {
        let token = self.access_token().await?;

        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(device_id) = &self.options.device_id {
            query.push(("device_id", device_id.clone()));
        }
        if let Some(favorites) = self.options.get_favorites {
            query.push(("get_favorites", favorites.to_string()));
        }

        let response = self
            .http
            .get(format!("{}/api/getstationsdata", self.api_base))
            .bearer_auth(token)
            .query(&query)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            return match response.json::<ApiErrorBody>().await {
                Ok(body) => Err(SourceError::Api {
                    source_name: "netatmo",
                    message: match body.error {
                        ApiErrorDetail::Structured { message } => message,
                        ApiErrorDetail::Plain(message) => message,
                    },
                }),
                Err(_) => Err(SourceError::Status {
                    source_name: "netatmo",
                    status,
                }),
            };
        }

        let stations: StationsResponse = response.json().await?;
        Ok(stations.body.devices)
    }
}

/// Plain GET of the public weather map page
pub struct WeatherMapPage {
    http: reqwest::Client,
    url: String,
}

impl WeatherMapPage {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: http::client(),
            url: url.into(),
        }
    }
}

impl Default for WeatherMapPage {
    fn default() -> Self {
        Self::new(DEFAULT_MAP_PAGE)
    }
}

#[async_trait]
impl TokenPage for WeatherMapPage {
    async fn fetch_page(&self) -> Result<String> {
        let response = self.http.get(&self.url).send().await?;
        Ok(check_status("weathermap", response)?.text().await?)
    }
}

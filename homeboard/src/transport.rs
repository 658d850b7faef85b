//! HTTP surface: the client websocket, a health check and the dashboard's
//! static files.
//!
//! Every websocket frame in either direction is a JSON object
//! `{"event": <name>, "data": <payload>}`. Inbound frames become relay
//! requests; every broadcast is written to every open socket.

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{debug, info, warn};
use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::ws::{Message, WebSocket, Ws};
use warp::{Filter, Reply};

use homeboard_relay::ConnectionRegistry;

/// Shared state handed to every route
#[derive(Clone)]
pub struct AppState {
    registry: Arc<ConnectionRegistry>,
    origins: Arc<Vec<String>>,
}

impl AppState {
    pub fn new(registry: Arc<ConnectionRegistry>, origins: Vec<String>) -> Self {
        Self {
            registry,
            origins: Arc::new(origins),
        }
    }

    /// An empty allow-list accepts every origin. Requests without an
    /// `Origin` header come from non-browser clients and are accepted.
    fn origin_allowed(&self, origin: Option<&str>) -> bool {
        match origin {
            _ if self.origins.is_empty() => true,
            None => true,
            Some(origin) => self
                .origins
                .iter()
                .any(|allowed| allowed.trim_end_matches('/') == origin.trim_end_matches('/')),
        }
    }
}

#[derive(Debug, Deserialize)]
struct InboundFrame {
    event: String,
    #[serde(default)]
    data: Value,
}

fn parse_frame(text: &str) -> Option<InboundFrame> {
    match serde_json::from_str(text) {
        Ok(frame) => Some(frame),
        Err(e) => {
            debug!(error = %e, "ignoring malformed frame");
            None
        }
    }
}

/// All routes, with static files served from `root` when set.
pub fn routes(state: AppState, root: Option<PathBuf>) -> BoxedFilter<(Box<dyn Reply>,)> {
    let api = socket(state.clone()).or(health(state));

    match root {
        Some(root) => api
            .or(warp::fs::dir(root))
            .map(|reply| Box::new(reply) as Box<dyn Reply>)
            .boxed(),
        None => api
            .map(|reply| Box::new(reply) as Box<dyn Reply>)
            .boxed(),
    }
}

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn socket(state: AppState) -> BoxedFilter<(Box<dyn Reply>,)> {
    warp::path("socket")
        .and(warp::path::end())
        .and(warp::header::optional::<String>("origin"))
        .and(warp::ws())
        .and(with_state(state))
        .map(|origin: Option<String>, ws: Ws, state: AppState| {
            if !state.origin_allowed(origin.as_deref()) {
                warn!(?origin, "rejected websocket from unlisted origin");
                return Box::new(warp::reply::with_status(
                    "origin not allowed",
                    StatusCode::FORBIDDEN,
                )) as Box<dyn Reply>;
            }
            Box::new(ws.on_upgrade(move |socket| client_session(socket, state.registry, origin)))
                as Box<dyn Reply>
        })
        .boxed()
}

fn health(state: AppState) -> BoxedFilter<(Box<dyn Reply>,)> {
    warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state(state))
        .map(|state: AppState| {
            let relay = state.registry.relay();
            let sources: Map<String, Value> = relay
                .enabled()
                .iter()
                .map(|id| (id.name().to_string(), Value::from(id.capability().as_str())))
                .collect();
            let body = json!({
                "status": "ok",
                "clients": state.registry.count(),
                "speakerBound": relay.speaker().is_some_and(|s| s.is_bound()),
                "sources": sources,
            });
            Box::new(warp::reply::json(&body)) as Box<dyn Reply>
        })
        .boxed()
}

async fn client_session(socket: WebSocket, registry: Arc<ConnectionRegistry>, origin: Option<String>) {
    let (mut sink, mut stream) = socket.split();

    // Subscribe before registering so the connect replay is not missed.
    let mut events = BroadcastStream::new(registry.relay().broadcaster().subscribe());
    let id = registry.connect(origin);
    let relay = registry.relay().clone();

    let outbound = tokio::spawn(async move {
        while let Some(item) = events.next().await {
            match item {
                Ok(event) => {
                    let text = event.to_message().to_string();
                    if sink.send(Message::text(text)).await.is_err() {
                        break;
                    }
                }
                Err(BroadcastStreamRecvError::Lagged(missed)) => {
                    warn!(client = %id, missed, "client fell behind, events dropped");
                }
            }
        }
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(message) if message.is_close() => break,
            Ok(message) => {
                let Ok(text) = message.to_str() else {
                    continue;
                };
                if let Some(frame) = parse_frame(text) {
                    relay.dispatch(&frame.event, frame.data);
                }
            }
            Err(e) => {
                debug!(client = %id, error = %e, "websocket error");
                break;
            }
        }
    }

    outbound.abort();
    registry.disconnect(&id);
    info!(client = %id, "client disconnected");
}

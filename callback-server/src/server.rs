//! HTTP server for receiving UPnP event notifications.

use bytes::Bytes;
use std::convert::Infallible;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use warp::http::{Method, StatusCode};
use warp::Filter;

use crate::router::{EventRouter, NotificationPayload};

/// Largest NOTIFY body accepted. Queue-heavy LastChange documents stay well below this.
const MAX_BODY_BYTES: u64 = 512 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    #[error("no available port in range {start}-{end}")]
    NoAvailablePort { start: u16, end: u16 },
    #[error("could not detect a local IP address for callbacks")]
    LocalIpUnavailable,
    #[error("failed to bind callback server on port {port}: {reason}")]
    Bind { port: u16, reason: String },
}

/// HTTP callback server for receiving UPnP event notifications.
///
/// Accepts `NOTIFY` on any path, validates the GENA headers and hands the
/// body to an [`EventRouter`]. Replies are `200` for a routed event, `400` for
/// malformed headers, `404` for an unknown SID and `405` for other methods.
pub struct CallbackServer {
    port: u16,
    base_url: String,
    event_router: Arc<EventRouter>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server_handle: Option<tokio::task::JoinHandle<()>>,
}

impl CallbackServer {
    /// Start a server on the first free port in `port_range`, advertising the
    /// address this host uses for outbound traffic.
    pub async fn new(
        port_range: (u16, u16),
        event_sender: mpsc::UnboundedSender<NotificationPayload>,
    ) -> Result<Self, CallbackError> {
        let local_ip = Self::detect_local_ip().ok_or(CallbackError::LocalIpUnavailable)?;
        Self::with_advertised_ip(local_ip, port_range, event_sender).await
    }

    /// Start a server that tells speakers to call back on `advertised_ip`.
    ///
    /// The listener itself binds all interfaces.
    pub async fn with_advertised_ip(
        advertised_ip: IpAddr,
        port_range: (u16, u16),
        event_sender: mpsc::UnboundedSender<NotificationPayload>,
    ) -> Result<Self, CallbackError> {
        let (start, end) = port_range;
        let port = Self::find_available_port(start, end)
            .ok_or(CallbackError::NoAvailablePort { start, end })?;

        let event_router = Arc::new(EventRouter::new(event_sender));
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let routes = notify_route(event_router.clone()).recover(handle_rejection);
        let (addr, server) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(
                SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port),
                async move {
                    let _ = shutdown_rx.await;
                },
            )
            .map_err(|e| CallbackError::Bind {
                port,
                reason: e.to_string(),
            })?;

        let base_url = format!("http://{advertised_ip}:{}", addr.port());
        info!(%addr, %base_url, "callback server listening");
        let server_handle = tokio::spawn(server);

        Ok(Self {
            port: addr.port(),
            base_url,
            event_router,
            shutdown_tx: Some(shutdown_tx),
            server_handle: Some(server_handle),
        })
    }

    /// `http://<ip>:<port>` as reachable from speakers
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The URL to hand to SUBSCRIBE. Every subscription shares it; the SID
    /// header tells notifications apart.
    pub fn callback_url(&self) -> String {
        format!("{}/notify", self.base_url)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// The router deciding which SIDs are accepted.
    pub fn router(&self) -> &Arc<EventRouter> {
        &self.event_router
    }

    /// Stop accepting connections and wait for in-flight requests to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.server_handle.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "callback server task ended abnormally");
            }
        }
        info!(port = self.port, "callback server stopped");
    }

    fn find_available_port(start: u16, end: u16) -> Option<u16> {
        (start..=end).find(|&port| Self::is_port_available(port))
    }

    fn is_port_available(port: u16) -> bool {
        TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port)).is_ok()
    }

    /// The local address used for outbound traffic.
    ///
    /// Connecting a UDP socket only selects a route; nothing is sent.
    pub fn detect_local_ip() -> Option<IpAddr> {
        let socket = std::net::UdpSocket::bind("0.0.0.0:0").ok()?;
        socket.connect("8.8.8.8:80").ok()?;
        Some(socket.local_addr().ok()?.ip())
    }

    /// The SID header is mandatory. NT and NTS are optional, but when both
    /// are present they must carry the GENA event values.
    fn validate_upnp_headers(sid: &Option<String>, nt: &Option<String>, nts: &Option<String>) -> bool {
        if sid.as_deref().map_or(true, str::is_empty) {
            return false;
        }
        if let (Some(nt), Some(nts)) = (nt, nts) {
            if nt != "upnp:event" || nts != "upnp:propchange" {
                return false;
            }
        }
        true
    }
}

fn notify_route(
    router: Arc<EventRouter>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::method()
        .and(warp::header::optional::<String>("sid"))
        .and(warp::header::optional::<String>("nt"))
        .and(warp::header::optional::<String>("nts"))
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::bytes())
        .and(warp::any().map(move || router.clone()))
        .and_then(handle_notify)
}

async fn handle_notify(
    method: Method,
    sid: Option<String>,
    nt: Option<String>,
    nts: Option<String>,
    body: Bytes,
    router: Arc<EventRouter>,
) -> Result<impl warp::Reply, warp::Rejection> {
    if method.as_str() != "NOTIFY" {
        return Err(warp::reject::custom(NotNotify));
    }

    if !CallbackServer::validate_upnp_headers(&sid, &nt, &nts) {
        debug!(?sid, ?nt, ?nts, "rejecting notification with invalid headers");
        return Err(warp::reject::custom(InvalidUpnpHeaders));
    }
    let sid = sid.ok_or_else(|| warp::reject::custom(InvalidUpnpHeaders))?;

    let event_xml = String::from_utf8_lossy(&body).into_owned();
    debug!(sid = %sid, bytes = body.len(), "notification received");

    if router.route_event(sid, event_xml).await {
        Ok(warp::reply::with_status("", StatusCode::OK))
    } else {
        Err(warp::reject::custom(UnknownSubscription))
    }
}

#[derive(Debug)]
struct InvalidUpnpHeaders;

impl warp::reject::Reject for InvalidUpnpHeaders {}

#[derive(Debug)]
struct UnknownSubscription;

impl warp::reject::Reject for UnknownSubscription {}

#[derive(Debug)]
struct NotNotify;

impl warp::reject::Reject for NotNotify {}

async fn handle_rejection(err: warp::Rejection) -> Result<impl warp::Reply, Infallible> {
    let (code, message) = if err.find::<UnknownSubscription>().is_some() || err.is_not_found() {
        (StatusCode::NOT_FOUND, "Subscription not found")
    } else if err.find::<InvalidUpnpHeaders>().is_some() {
        (StatusCode::BAD_REQUEST, "Invalid UPnP headers")
    } else if err.find::<NotNotify>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Only NOTIFY is accepted")
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Notification too large")
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    };

    Ok(warp::reply::with_status(message, code))
}

//! Homeboard relay
//!
//! Aggregates the household's integrations and fans their results out to
//! every connected dashboard:
//!
//! - [`dispatch::Relay`] maps named client requests to adapters and
//!   publishes one tagged [`event::BroadcastEvent`] per result.
//! - [`session::SessionManager`] discovers the speaker group, keeps it bound
//!   and forwards its push events.
//! - [`calendar::CalendarEngine`] merges the shared and holiday feeds.
//! - [`motion::MotionGate`] turns a chattering PIR sensor into wake triggers.
//! - [`registry::ConnectionRegistry`] tracks clients and replays speaker
//!   state to each new one.
//!
//! Nothing here reports errors to clients. Missing credentials disable an
//! integration; failures are logged and dropped.
//!
//! ```no_run
//! use homeboard_relay::{Config, Homeboard};
//!
//! # async fn run() -> homeboard_relay::Result<()> {
//! let config = Config::load("config.json".as_ref())?;
//! let homeboard = Homeboard::start(config).await;
//! let mut events = homeboard.relay().broadcaster().subscribe();
//! homeboard.relay().dispatch("calendar", serde_json::Value::Null);
//! if let Ok(event) = events.recv().await {
//!     println!("{}", event.to_message());
//! }
//! homeboard.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod broadcast;
pub mod calendar;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod host;
pub mod motion;
pub mod registry;
pub mod session;
pub mod sonos;
pub mod speaker;
pub mod token;
pub mod weather;

pub use broadcast::Broadcaster;
pub use config::Config;
pub use dispatch::{Relay, Sources};
pub use error::{RelayError, Result};
pub use event::{BroadcastEvent, ClientRequest, EventTag};
pub use registry::ConnectionRegistry;
pub use session::SessionManager;

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use homeboard_sources::sensor::GpioSensor;

use crate::sonos::SonosNetwork;

/// A running relay with its background tasks
pub struct Homeboard {
    relay: Arc<Relay>,
    registry: Arc<ConnectionRegistry>,
    network: Option<Arc<SonosNetwork>>,
    tasks: Vec<JoinHandle<()>>,
}

impl Homeboard {
    /// Build every configured integration and start speaker discovery and
    /// the motion sensor.
    pub async fn start(config: Config) -> Self {
        let config = Arc::new(config);
        let broadcaster = Broadcaster::new(broadcast::DEFAULT_CAPACITY);
        let mut tasks = Vec::new();

        let (network, speaker) = match config.sonos.group.as_deref() {
            Some(prefix) if config.speaker_enabled() => {
                let network = Arc::new(SonosNetwork::start(&config.sonos).await);
                let speaker = Arc::new(SessionManager::new(
                    network.clone(),
                    prefix,
                    config.sonos.region.clone(),
                    broadcaster.clone(),
                ));
                tasks.push(tokio::spawn(
                    speaker.clone().run(config.sonos.rediscover_interval()),
                ));
                (Some(network), Some(speaker))
            }
            _ => (None, None),
        };

        let relay = Arc::new(Relay::new(
            config.clone(),
            Sources::from_config(&config),
            broadcaster,
            speaker,
        ));

        if let Some(pin) = config.motion.pin {
            let sensor = GpioSensor::new(pin, Duration::from_millis(config.motion.poll_ms.max(1)));
            match sensor.prepare().await {
                Ok(()) => {
                    let (levels, poller) = sensor.spawn();
                    let waker = Arc::new(relay.host_commands().clone());
                    tasks.push(poller);
                    tasks.push(motion::spawn_gate(levels, config.motion.threshold, waker));
                }
                Err(e) => warn!(pin, error = %e, "motion sensor unavailable"),
            }
        }

        let enabled: Vec<&str> = relay.enabled().iter().map(|id| id.name()).collect();
        info!(?enabled, "relay started");

        Self {
            registry: Arc::new(ConnectionRegistry::new(relay.clone())),
            relay,
            network,
            tasks,
        }
    }

    pub fn relay(&self) -> &Arc<Relay> {
        &self.relay
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Stop background tasks and cancel speaker subscriptions.
    pub async fn shutdown(self) {
        for task in &self.tasks {
            task.abort();
        }
        if let Some(speaker) = self.relay.speaker() {
            speaker.shutdown().await;
        }
        if let Some(network) = &self.network {
            network.shutdown().await;
        }
        info!("relay stopped");
    }
}

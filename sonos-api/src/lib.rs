//! Sonos speaker control
//!
//! Typed UPnP operations on top of the `soap-client` crate, plus the decoders
//! the dashboard needs around them: zone group topology, DIDL-Lite track
//! metadata, `LastChange` event bodies and the streaming-service URI formats.
//!
//! ```no_run
//! use sonos_api::{PlayMode, SonosClient};
//!
//! let client = SonosClient::new();
//! let host = "192.168.1.20:1400";
//! let track = client.current_track(host)?;
//! println!("{:?} by {:?}", track.title, track.artist);
//! client.set_play_mode(host, PlayMode::Shuffle)?;
//! # Ok::<(), sonos_api::ApiError>(())
//! ```

#[macro_use]
mod macros;

pub mod client;
pub mod didl;
pub mod error;
pub mod events;
pub mod operation;
pub mod operations;
pub mod service;
pub mod subscription;
pub mod topology;
pub mod types;
pub mod uri;
mod xml;

pub use client::SonosClient;
pub use error::{ApiError, Result};
pub use events::SpeakerEvent;
pub use operation::SonosOperation;
pub use service::{Service, ServiceInfo};
pub use subscription::Subscription;
pub use topology::ZoneGroup;
pub use types::{PlayMode, PlayState, Track};

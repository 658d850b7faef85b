//! Sonos speaker discovery
//!
//! Finds speakers on the local network with an SSDP M-SEARCH for
//! `urn:schemas-upnp-org:device:ZonePlayer:1`, then confirms each responder by
//! fetching its UPnP device description.
//!
//! All functions block for up to the given timeout. Call them from
//! `tokio::task::spawn_blocking` inside async code.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! if let Some(speaker) = sonos_discovery::first(Duration::from_secs(5)) {
//!     println!("{} answers at {}", speaker.room_name, speaker.host());
//! }
//! ```

mod device;
mod discovery;
mod error;
mod ssdp;

pub use device::{fetch_description, DeviceDescription};
pub use discovery::Discovery;
pub use error::{DiscoveryError, Result};

use std::time::Duration;

/// A speaker that answered discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Speaker {
    /// Unique device name, e.g. `uuid:RINCON_000E58A0123456`
    pub id: String,
    /// Friendly name from the device description
    pub name: String,
    /// Room the speaker is assigned to
    pub room_name: String,
    /// IP address taken from the SSDP `LOCATION` URL
    pub ip_address: String,
    /// UPnP port (1400 on every current firmware)
    pub port: u16,
    /// Model name, e.g. `Sonos One`
    pub model_name: String,
}

impl Speaker {
    /// Address in the `ip:port` form the SOAP client expects
    pub fn host(&self) -> String {
        format!("{}:{}", self.ip_address, self.port)
    }
}

/// Run one discovery pass and collect every speaker found before `timeout`.
pub fn discover(timeout: Duration) -> Vec<Speaker> {
    match Discovery::new(timeout) {
        Ok(discovery) => discovery.collect(),
        Err(e) => {
            tracing::warn!(error = %e, "discovery could not start");
            Vec::new()
        }
    }
}

/// Run one discovery pass and stop at the first speaker that answers.
pub fn first(timeout: Duration) -> Option<Speaker> {
    match Discovery::new(timeout) {
        Ok(mut discovery) => discovery.next(),
        Err(e) => {
            tracing::warn!(error = %e, "discovery could not start");
            None
        }
    }
}

//! Device description parsing and validation.

use crate::error::{DiscoveryError, Result};
use crate::Speaker;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Root {
    device: DeviceDescription,
}

/// The parts of a UPnP device description used to identify a speaker.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescription {
    pub device_type: String,
    pub friendly_name: String,
    pub manufacturer: String,
    pub model_name: String,
    #[serde(rename = "UDN")]
    pub udn: String,
    pub room_name: Option<String>,
}

impl DeviceDescription {
    /// Parse a `<root><device>…</device></root>` description document.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let root: Root = quick_xml::de::from_str(xml)
            .map_err(|e| DiscoveryError::Parse(format!("failed to parse device XML: {e}")))?;
        Ok(root.device)
    }

    pub fn is_sonos_device(&self) -> bool {
        self.manufacturer.to_lowercase().contains("sonos")
            || self.device_type.contains("ZonePlayer")
    }

    /// Combine the description with the address it was fetched from.
    pub fn into_speaker(self, ip_address: String, port: u16) -> Speaker {
        let room_name = self
            .room_name
            .clone()
            .unwrap_or_else(|| self.friendly_name.clone());
        Speaker {
            id: self.udn,
            name: self.friendly_name,
            room_name,
            ip_address,
            port,
            model_name: self.model_name,
        }
    }
}

/// Fetch a description document and turn it into a [`Speaker`].
///
/// Fails with [`DiscoveryError::InvalidDevice`] when the responder is not a
/// Sonos product.
pub fn fetch_description(
    client: &reqwest::blocking::Client,
    location: &str,
) -> Result<Speaker> {
    let (ip_address, port) = split_location(location)
        .ok_or_else(|| DiscoveryError::Parse(format!("unusable location URL {location}")))?;

    let xml = client
        .get(location)
        .send()
        .and_then(|r| r.error_for_status())
        .and_then(|r| r.text())
        .map_err(|e| DiscoveryError::Network(format!("failed to fetch {location}: {e}")))?;

    let description = DeviceDescription::from_xml(&xml)?;
    if !description.is_sonos_device() {
        return Err(DiscoveryError::InvalidDevice(description.friendly_name));
    }
    Ok(description.into_speaker(ip_address, port))
}

/// Pull `(ip, port)` out of a `LOCATION` URL, defaulting the port to 1400.
pub(crate) fn split_location(url: &str) -> Option<(String, u16)> {
    let authority = url.split("//").nth(1)?.split('/').next()?;
    if authority.is_empty() {
        return None;
    }
    match authority.split_once(':') {
        Some((ip, port)) => Some((ip.to_string(), port.parse().ok()?)),
        None => Some((authority.to_string(), 1400)),
    }
}

//! SSDP M-SEARCH client
//!
//! Internal to the crate; the public surface is [`crate::Discovery`].

use crate::error::{DiscoveryError, Result};
use std::net::UdpSocket;
use std::time::Duration;

const MULTICAST_ADDR: &str = "239.255.255.250:1900";

pub(crate) const ZONE_PLAYER_TARGET: &str = "urn:schemas-upnp-org:device:ZonePlayer:1";

/// The headers of one SSDP response that discovery cares about
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SsdpResponse {
    pub location: String,
    pub urn: String,
    pub usn: String,
    pub server: Option<String>,
}

impl SsdpResponse {
    /// Cheap pre-filter before paying for a description fetch
    pub fn looks_like_sonos(&self) -> bool {
        self.urn.contains("ZonePlayer")
            || self.usn.contains("RINCON")
            || self
                .server
                .as_deref()
                .map(|s| s.to_ascii_lowercase().contains("sonos"))
                .unwrap_or(false)
    }
}

pub(crate) struct SsdpClient {
    socket: UdpSocket,
}

impl SsdpClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .map_err(|e| DiscoveryError::Network(format!("failed to bind UDP socket: {e}")))?;
        socket
            .set_read_timeout(Some(timeout))
            .map_err(|e| DiscoveryError::Network(format!("failed to set read timeout: {e}")))?;
        socket
            .set_multicast_loop_v4(true)
            .map_err(|e| DiscoveryError::Network(format!("failed to set multicast loop: {e}")))?;

        Ok(Self { socket })
    }

    /// Send one M-SEARCH and read responses until the socket times out
    pub fn search(&self, search_target: &str) -> Result<Vec<SsdpResponse>> {
        self.socket
            .send_to(search_request(search_target).as_bytes(), MULTICAST_ADDR)
            .map_err(|e| DiscoveryError::Network(format!("failed to send M-SEARCH: {e}")))?;

        let mut responses = Vec::new();
        let mut buffer = [0u8; 2048];
        loop {
            match self.socket.recv_from(&mut buffer) {
                Ok((size, from)) => {
                    let parsed = std::str::from_utf8(&buffer[..size])
                        .ok()
                        .and_then(parse_ssdp_response);
                    match parsed {
                        Some(response) => responses.push(response),
                        None => tracing::trace!(%from, "ignoring unparseable SSDP datagram"),
                    }
                }
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    break
                }
                Err(e) => return Err(DiscoveryError::Network(format!("socket error: {e}"))),
            }
        }
        Ok(responses)
    }
}

fn search_request(search_target: &str) -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: {MULTICAST_ADDR}\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: 2\r\n\
         ST: {search_target}\r\n\
         USER-AGENT: homeboard/0.3 UPnP/1.0\r\n\
         \r\n"
    )
}

/// Parse the LOCATION, ST, USN and SERVER headers out of a response datagram
pub(crate) fn parse_ssdp_response(response: &str) -> Option<SsdpResponse> {
    let mut location = None;
    let mut urn = None;
    let mut usn = None;
    let mut server = None;

    for line in response.lines() {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim().to_string();
        match name.trim().to_ascii_uppercase().as_str() {
            "LOCATION" => location = Some(value),
            "ST" => urn = Some(value),
            "USN" => usn = Some(value),
            "SERVER" => server = Some(value),
            _ => {}
        }
    }

    Some(SsdpResponse {
        location: location.filter(|l| !l.is_empty())?,
        urn: urn?,
        usn: usn?,
        server,
    })
}

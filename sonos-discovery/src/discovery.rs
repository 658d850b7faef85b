//! Discovery pass as an iterator.
//!
//! The pass sends one M-SEARCH, buffers every response until the socket times
//! out, then lazily fetches descriptions so that callers only interested in
//! the first speaker stop paying for the network after one success.

use crate::device::fetch_description;
use crate::error::{DiscoveryError, Result};
use crate::ssdp::{SsdpClient, SsdpResponse, ZONE_PLAYER_TARGET};
use crate::Speaker;
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

/// Iterator over the speakers found by one discovery pass.
///
/// Responses are deduplicated by `LOCATION`, and responders that are not Sonos
/// products or whose description cannot be fetched are skipped.
pub struct Discovery {
    pending: std::vec::IntoIter<SsdpResponse>,
    seen_locations: HashSet<String>,
    http_client: reqwest::blocking::Client,
}

impl Discovery {
    /// Send the M-SEARCH and collect responses for up to `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let responses = SsdpClient::new(timeout)?.search(ZONE_PLAYER_TARGET)?;
        debug!(count = responses.len(), "SSDP responses received");
        Self::from_responses(responses, timeout)
    }

    pub(crate) fn from_responses(responses: Vec<SsdpResponse>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DiscoveryError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            pending: responses.into_iter(),
            seen_locations: HashSet::new(),
            http_client,
        })
    }
}

impl Iterator for Discovery {
    type Item = Speaker;

    fn next(&mut self) -> Option<Self::Item> {
        for response in self.pending.by_ref() {
            if !self.seen_locations.insert(response.location.clone()) {
                continue;
            }
            if !response.looks_like_sonos() {
                continue;
            }
            match fetch_description(&self.http_client, &response.location) {
                Ok(speaker) => return Some(speaker),
                Err(e) => debug!(location = %response.location, error = %e, "skipping responder"),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn description(room: &str) -> String {
        format!(
            "<root><device><deviceType>urn:schemas-upnp-org:device:ZonePlayer:1</deviceType>\
             <friendlyName>{room}</friendlyName><manufacturer>Sonos, Inc.</manufacturer>\
             <modelName>Sonos One</modelName><UDN>uuid:RINCON_{room}</UDN>\
             <roomName>{room}</roomName></device></root>"
        )
    }

    fn response(location: String) -> SsdpResponse {
        SsdpResponse {
            location,
            urn: ZONE_PLAYER_TARGET.to_string(),
            usn: "uuid:RINCON_X::urn:schemas-upnp-org:device:ZonePlayer:1".to_string(),
            server: None,
        }
    }

    #[test]
    fn test_duplicates_and_dead_responders_are_skipped() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/dead.xml")
            .with_status(404)
            .create();
        let office = server
            .mock("GET", "/office.xml")
            .with_status(200)
            .with_body(description("Office"))
            .expect(1)
            .create();

        let base = server.url();
        let responses = vec![
            response(format!("{base}/dead.xml")),
            response(format!("{base}/office.xml")),
            response(format!("{base}/office.xml")),
        ];

        let speakers: Vec<Speaker> = Discovery::from_responses(responses, Duration::from_secs(2))
            .unwrap()
            .collect();

        assert_eq!(speakers.len(), 1);
        assert_eq!(speakers[0].room_name, "Office");
        office.assert();
    }

    #[test]
    fn test_first_result_stops_fetching() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/a.xml")
            .with_status(200)
            .with_body(description("Kitchen"))
            .create();
        let untouched = server.mock("GET", "/b.xml").expect(0).create();

        let base = server.url();
        let mut discovery = Discovery::from_responses(
            vec![response(format!("{base}/a.xml")), response(format!("{base}/b.xml"))],
            Duration::from_secs(2),
        )
        .unwrap();

        assert_eq!(discovery.next().unwrap().room_name, "Kitchen");
        untouched.assert();
    }
}

//! Decoding of GENA NOTIFY bodies
//!
//! AVTransport and RenderingControl both publish a single `LastChange`
//! property whose text is itself an escaped XML document:
//!
//! ```xml
//! <e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0">
//!   <e:property>
//!     <LastChange>&lt;Event ...&gt;&lt;InstanceID val="0"&gt;...</LastChange>
//!   </e:property>
//! </e:propertyset>
//! ```
//!
//! Inside, every state variable is an element carrying its value in `val`.

use xmltree::Element;

use crate::didl::DidlLite;
use crate::error::{ApiError, Result};
use crate::service::Service;
use crate::types::{parse_hms, PlayState, Track};

/// A state change pushed by the speaker
#[derive(Debug, Clone, PartialEq)]
pub enum SpeakerEvent {
    Track(Track),
    State(PlayState),
    Volume(u8),
}

/// Decode a NOTIFY body from `service` into zero or more events.
///
/// `host` (`ip:port`) is used to resolve relative album art.
pub fn parse_event(service: Service, body: &str, host: &str) -> Result<Vec<SpeakerEvent>> {
    let Some(instance) = last_change_instance(body)? else {
        return Ok(Vec::new());
    };

    let events = match service {
        Service::AVTransport => av_transport_events(&instance, host),
        Service::RenderingControl => rendering_control_events(&instance),
        Service::ZoneGroupTopology => Vec::new(),
    };
    Ok(events)
}

fn last_change_instance(body: &str) -> Result<Option<Element>> {
    let propertyset = Element::parse(body.as_bytes())
        .map_err(|e| ApiError::ParseError(format!("invalid NOTIFY body: {e}")))?;

    let last_change = propertyset
        .children
        .iter()
        .filter_map(|node| node.as_element())
        .filter_map(|property| property.get_child("LastChange"))
        .find_map(|lc| lc.get_text());

    let Some(last_change) = last_change else {
        return Ok(None);
    };

    let event = Element::parse(last_change.as_bytes())
        .map_err(|e| ApiError::ParseError(format!("invalid LastChange: {e}")))?;
    Ok(event.get_child("InstanceID").cloned())
}

fn val<'a>(instance: &'a Element, name: &str) -> Option<&'a str> {
    instance
        .get_child(name)
        .and_then(|e| e.attributes.get("val"))
        .map(String::as_str)
}

fn av_transport_events(instance: &Element, host: &str) -> Vec<SpeakerEvent> {
    let mut events = Vec::new();

    if let Some(state) = val(instance, "TransportState").and_then(PlayState::from_transport_state) {
        events.push(SpeakerEvent::State(state));
    }

    let metadata = val(instance, "CurrentTrackMetaData")
        .filter(|m| !m.is_empty() && *m != "NOT_IMPLEMENTED");
    if let Some(metadata) = metadata {
        match DidlLite::from_xml(metadata) {
            Ok(didl) => {
                let mut track = didl.into_track();
                if track.uri.is_none() {
                    track.uri = val(instance, "CurrentTrackURI").map(str::to_string);
                }
                if track.duration == 0 {
                    track.duration = val(instance, "CurrentTrackDuration").map(parse_hms).unwrap_or(0);
                }
                track.queue_position = val(instance, "CurrentTrack")
                    .and_then(|n| n.parse().ok())
                    .unwrap_or(0);
                track.resolve_album_art(host);
                events.push(SpeakerEvent::Track(track));
            }
            Err(e) => tracing::debug!(error = %e, "ignoring undecodable track metadata"),
        }
    }

    events
}

fn rendering_control_events(instance: &Element) -> Vec<SpeakerEvent> {
    instance
        .children
        .iter()
        .filter_map(|node| node.as_element())
        .filter(|e| e.name == "Volume")
        .filter(|e| e.attributes.get("channel").map(String::as_str) == Some("Master"))
        .filter_map(|e| e.attributes.get("val")?.parse::<u8>().ok())
        .map(SpeakerEvent::Volume)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notify(last_change: &str) -> String {
        let escaped = quick_xml::escape::escape(last_change);
        format!(
            r#"<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0"><e:property><LastChange>{escaped}</LastChange></e:property></e:propertyset>"#
        )
    }

    const DIDL: &str = r#"<DIDL-Lite xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/"><item id="-1" parentID="-1"><res duration="0:03:20">x-sonos-spotify:abc</res><upnp:albumArtURI>/getaa?u=abc</upnp:albumArtURI><dc:title>Harder</dc:title><dc:creator>Daft Punk</dc:creator></item></DIDL-Lite>"#;

    #[test]
    fn test_av_transport_event_yields_state_and_track() {
        let last_change = format!(
            r#"<Event xmlns="urn:schemas-upnp-org:metadata-1-0/AVT/"><InstanceID val="0"><TransportState val="PLAYING"/><CurrentTrack val="4"/><CurrentTrackMetaData val="{}"/></InstanceID></Event>"#,
            quick_xml::escape::escape(DIDL)
        );

        let events = parse_event(Service::AVTransport, &notify(&last_change), "10.0.0.9:1400").unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], SpeakerEvent::State(PlayState::Playing));
        match &events[1] {
            SpeakerEvent::Track(track) => {
                assert_eq!(track.title.as_deref(), Some("Harder"));
                assert_eq!(track.duration, 200);
                assert_eq!(track.queue_position, 4);
                assert_eq!(
                    track.album_art_url.as_deref(),
                    Some("http://10.0.0.9:1400/getaa?u=abc")
                );
            }
            other => panic!("expected track, got {other:?}"),
        }
    }

    #[test]
    fn test_state_only_event() {
        let last_change = r#"<Event><InstanceID val="0"><TransportState val="PAUSED_PLAYBACK"/><CurrentTrackMetaData val=""/></InstanceID></Event>"#;
        let events = parse_event(Service::AVTransport, &notify(last_change), "h:1400").unwrap();
        assert_eq!(events, vec![SpeakerEvent::State(PlayState::Paused)]);
    }

    #[test]
    fn test_rendering_control_master_volume_only() {
        let last_change = r#"<Event xmlns="urn:schemas-upnp-org:metadata-1-0/RCS/"><InstanceID val="0"><Volume channel="Master" val="31"/><Volume channel="LF" val="100"/><Mute channel="Master" val="0"/></InstanceID></Event>"#;
        let events =
            parse_event(Service::RenderingControl, &notify(last_change), "h:1400").unwrap();
        assert_eq!(events, vec![SpeakerEvent::Volume(31)]);
    }

    #[test]
    fn test_body_without_last_change_is_empty() {
        let body = r#"<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0"><e:property><ZoneGroupState>x</ZoneGroupState></e:property></e:propertyset>"#;
        assert!(parse_event(Service::AVTransport, body, "h:1400").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_body_is_an_error() {
        assert!(parse_event(Service::AVTransport, "<nope", "h:1400").is_err());
    }
}

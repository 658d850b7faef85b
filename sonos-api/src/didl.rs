//! DIDL-Lite track metadata
//!
//! Speakers describe tracks in DIDL-Lite, both in `GetPositionInfo` responses
//! and in `CurrentTrackMetaData` inside AVTransport events. The same format is
//! sent back when queueing a URI or tuning a radio station.

use serde::Deserialize;

use crate::error::Result;
use crate::types::{parse_hms, Track};
use crate::xml;

/// DIDL-Lite document with a single item.
///
/// ```xml
/// <DIDL-Lite xmlns:dc="http://purl.org/dc/elements/1.1/" ...>
///   <item id="-1" parentID="-1">
///     <dc:title>Song Title</dc:title>
///     <dc:creator>Artist Name</dc:creator>
///     <upnp:album>Album Name</upnp:album>
///     <res duration="0:03:58">uri</res>
///   </item>
/// </DIDL-Lite>
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename = "DIDL-Lite")]
pub struct DidlLite {
    #[serde(rename = "item")]
    pub item: DidlItem,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DidlItem {
    #[serde(rename = "@id", default)]
    pub id: String,
    #[serde(rename = "res", default)]
    pub res: Option<DidlResource>,
    #[serde(rename = "albumArtURI", default)]
    pub album_art_uri: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    /// Now-playing text on radio streams, e.g. `ARTIST - TITLE`
    #[serde(rename = "streamContent", default)]
    pub stream_content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct DidlResource {
    #[serde(rename = "@duration", default)]
    pub duration: Option<String>,
    #[serde(rename = "$value", default)]
    pub uri: Option<String>,
}

impl DidlLite {
    pub fn from_xml(xml_text: &str) -> Result<Self> {
        xml::parse(xml_text)
    }

    /// Fold the item into a [`Track`]. Position fields are left at 0.
    ///
    /// Radio streams carry `ARTIST - TITLE` in `streamContent` and the station
    /// name as title; when present, the stream content wins.
    pub fn into_track(self) -> Track {
        let item = self.item;
        let (mut title, mut artist) = (item.title, item.creator);

        if let Some((stream_artist, stream_title)) = item
            .stream_content
            .as_deref()
            .and_then(|s| s.split_once(" - "))
        {
            artist = Some(stream_artist.trim().to_string());
            title = Some(stream_title.trim().to_string());
        }

        let res = item.res.unwrap_or_default();
        Track {
            title,
            artist,
            album: item.album,
            album_art_uri: item.album_art_uri,
            duration: res.duration.as_deref().map(parse_hms).unwrap_or(0),
            uri: res.uri,
            ..Default::default()
        }
    }
}

/// Metadata for a queue or transport URI.
///
/// `desc` is the service descriptor (`SA_RINCON…`) the speaker uses to find
/// the account that owns the content.
pub fn metadata(item_id: &str, parent_id: &str, title: &str, class: &str, desc: &str) -> String {
    format!(
        concat!(
            r#"<DIDL-Lite xmlns:dc="http://purl.org/dc/elements/1.1/" "#,
            r#"xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/" "#,
            r#"xmlns:r="urn:schemas-rinconnetworks-com:metadata-1-0/" "#,
            r#"xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/">"#,
            r#"<item id="{id}" parentID="{parent}" restricted="true">"#,
            r#"<dc:title>{title}</dc:title>"#,
            r#"<upnp:class>{class}</upnp:class>"#,
            r#"<desc id="cdudn" nameSpace="urn:schemas-rinconnetworks-com:metadata-1-0/">{desc}</desc>"#,
            r#"</item></DIDL-Lite>"#
        ),
        id = quick_xml::escape::escape(item_id),
        parent = quick_xml::escape::escape(parent_id),
        title = quick_xml::escape::escape(title),
        class = class,
        desc = quick_xml::escape::escape(desc),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPOTIFY_TRACK: &str = r#"<DIDL-Lite xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/" xmlns:r="urn:schemas-rinconnetworks-com:metadata-1-0/" xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/"><item id="-1" parentID="-1" restricted="true"><res protocolInfo="sonos.com-spotify:*:audio/x-spotify:*" duration="0:03:58">x-sonos-spotify:spotify%3atrack%3a4uLU6hMCjMI75M1A2tKUQC?sid=9&amp;flags=8224&amp;sn=7</res><upnp:albumArtURI>/getaa?s=1&amp;u=x-sonos-spotify%3aspotify%253atrack</upnp:albumArtURI><dc:title>Never Gonna Give You Up</dc:title><upnp:class>object.item.audioItem.musicTrack</upnp:class><dc:creator>Rick Astley</dc:creator><upnp:album>Whenever You Need Somebody</upnp:album></item></DIDL-Lite>"#;

    #[test]
    fn test_music_track_into_track() {
        let track = DidlLite::from_xml(SPOTIFY_TRACK).unwrap().into_track();

        assert_eq!(track.title.as_deref(), Some("Never Gonna Give You Up"));
        assert_eq!(track.artist.as_deref(), Some("Rick Astley"));
        assert_eq!(track.album.as_deref(), Some("Whenever You Need Somebody"));
        assert_eq!(track.duration, 238);
        assert_eq!(
            track.uri.as_deref(),
            Some("x-sonos-spotify:spotify%3atrack%3a4uLU6hMCjMI75M1A2tKUQC?sid=9&flags=8224&sn=7")
        );
        assert_eq!(
            track.album_art_uri.as_deref(),
            Some("/getaa?s=1&u=x-sonos-spotify%3aspotify%253atrack")
        );
    }

    #[test]
    fn test_radio_stream_content_splits_artist_and_title() {
        let xml = r#"<DIDL-Lite xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:r="urn:schemas-rinconnetworks-com:metadata-1-0/"><item id="-1" parentID="-1"><res>x-rincon-mp3radio://stream</res><r:streamContent>Daft Punk - One More Time</r:streamContent><dc:title>NRK P3</dc:title></item></DIDL-Lite>"#;
        let track = DidlLite::from_xml(xml).unwrap().into_track();
        assert_eq!(track.artist.as_deref(), Some("Daft Punk"));
        assert_eq!(track.title.as_deref(), Some("One More Time"));
        assert_eq!(track.duration, 0);
    }

    #[test]
    fn test_metadata_is_parseable_and_escaped() {
        let didl = metadata(
            "F00092020s24861",
            "L",
            "Rock & Roll",
            "object.item.audioItem.audioBroadcast",
            "SA_RINCON65031_",
        );
        assert!(didl.contains("<dc:title>Rock &amp; Roll</dc:title>"));
        let parsed = DidlLite::from_xml(&didl).unwrap();
        assert_eq!(parsed.item.id, "F00092020s24861");
        assert_eq!(parsed.item.title.as_deref(), Some("Rock & Roll"));
    }

    #[test]
    fn test_invalid_didl_is_an_error() {
        assert!(DidlLite::from_xml("<DIDL-Lite><item>").is_err());
    }
}

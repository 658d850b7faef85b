//! Transport and queue URI formats
//!
//! Clients send either plain URIs or Spotify share URIs (`spotify:track:…`).
//! Spotify content has to be addressed through the speaker's linked account,
//! which is identified by a region-specific service descriptor.

use crate::didl;

/// Default Spotify region descriptor (Europe)
pub const DEFAULT_SPOTIFY_REGION: &str = "2311";

/// A URI plus the DIDL-Lite metadata the speaker needs to play it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamUri {
    pub uri: String,
    pub metadata: String,
}

/// The queue of a coordinator, for use as transport URI
pub fn queue_uri(coordinator_uuid: &str) -> String {
    let uuid = coordinator_uuid.trim_start_matches("uuid:");
    format!("x-rincon-queue:{uuid}#0")
}

/// A TuneIn station, e.g. `tunein_radio("24861", "NRK P3")`
pub fn tunein_radio(station_id: &str, title: &str) -> StreamUri {
    StreamUri {
        uri: format!("x-sonosapi-stream:s{station_id}?sid=254&flags=8224&sn=0"),
        metadata: didl::metadata(
            &format!("F00092020s{station_id}"),
            "L",
            title,
            "object.item.audioItem.audioBroadcast",
            "SA_RINCON65031_",
        ),
    }
}

/// Translate a client URI into something a speaker can queue.
///
/// `spotify:track:`, `spotify:album:` and `spotify:playlist:` URIs are mapped
/// to Sonos container/track URIs with account metadata for `region`. Anything
/// else passes through with empty metadata.
pub fn resolve(uri: &str, region: &str) -> StreamUri {
    let Some(rest) = uri.strip_prefix("spotify:") else {
        return StreamUri {
            uri: uri.to_string(),
            metadata: String::new(),
        };
    };

    let encoded = uri.replace(':', "%3a");
    let desc = format!("SA_RINCON{region}_X_#Svc{region}-0-Token");
    let kind = rest.split(':').next().unwrap_or_default();

    let (stream_uri, item_id, class) = match kind {
        "track" => (
            format!("x-sonos-spotify:{encoded}?sid=9&flags=8224&sn=7"),
            format!("00032020{encoded}"),
            "object.item.audioItem.musicTrack",
        ),
        "album" => (
            format!("x-rincon-cpcontainer:1004206c{encoded}"),
            format!("1004206c{encoded}"),
            "object.container.album.musicAlbum",
        ),
        "playlist" => (
            format!("x-rincon-cpcontainer:1006206c{encoded}"),
            format!("1006206c{encoded}"),
            "object.container.playlistContainer",
        ),
        _ => {
            return StreamUri {
                uri: uri.to_string(),
                metadata: String::new(),
            }
        }
    };

    StreamUri {
        uri: stream_uri,
        metadata: didl::metadata(&item_id, "", "", class, &desc),
    }
}

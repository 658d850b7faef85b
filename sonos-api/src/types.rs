//! Value types shared by operations and events

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::ApiError;

/// The track a speaker is currently playing.
///
/// Serialized in the camelCase shape dashboard clients consume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// Album art exactly as the speaker reported it, often a relative path
    #[serde(rename = "albumArtURI")]
    pub album_art_uri: Option<String>,
    /// Album art resolved against the speaker's address
    #[serde(rename = "albumArtURL")]
    pub album_art_url: Option<String>,
    /// Elapsed seconds
    pub position: u32,
    /// Track length in seconds (0 for radio streams)
    pub duration: u32,
    pub uri: Option<String>,
    /// 1-based position in the queue, 0 when not playing from the queue
    pub queue_position: u32,
}

impl Track {
    /// Fill `album_art_url` from `album_art_uri` for a speaker at `host` (`ip:port`).
    pub fn resolve_album_art(&mut self, host: &str) {
        self.album_art_url = self.album_art_uri.as_deref().map(|uri| {
            if uri.starts_with("http://") || uri.starts_with("https://") {
                uri.to_string()
            } else {
                format!("http://{}/{}", host, uri.trim_start_matches('/'))
            }
        });
    }
}

/// Transport state as reported to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayState {
    Playing,
    Paused,
    Stopped,
    Transitioning,
    NoMedia,
}

impl PlayState {
    /// Map a UPnP `TransportState` value
    pub fn from_transport_state(value: &str) -> Option<Self> {
        match value {
            "PLAYING" => Some(PlayState::Playing),
            "PAUSED_PLAYBACK" => Some(PlayState::Paused),
            "STOPPED" => Some(PlayState::Stopped),
            "TRANSITIONING" => Some(PlayState::Transitioning),
            "NO_MEDIA_PRESENT" => Some(PlayState::NoMedia),
            _ => None,
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, PlayState::Playing | PlayState::Transitioning)
    }
}

/// AVTransport play modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayMode {
    Normal,
    RepeatAll,
    RepeatOne,
    Shuffle,
    ShuffleNoRepeat,
    ShuffleRepeatOne,
}

impl PlayMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayMode::Normal => "NORMAL",
            PlayMode::RepeatAll => "REPEAT_ALL",
            PlayMode::RepeatOne => "REPEAT_ONE",
            PlayMode::Shuffle => "SHUFFLE",
            PlayMode::ShuffleNoRepeat => "SHUFFLE_NOREPEAT",
            PlayMode::ShuffleRepeatOne => "SHUFFLE_REPEAT_ONE",
        }
    }
}

impl fmt::Display for PlayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlayMode {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NORMAL" => Ok(PlayMode::Normal),
            "REPEAT_ALL" => Ok(PlayMode::RepeatAll),
            "REPEAT_ONE" => Ok(PlayMode::RepeatOne),
            "SHUFFLE" => Ok(PlayMode::Shuffle),
            "SHUFFLE_NOREPEAT" => Ok(PlayMode::ShuffleNoRepeat),
            "SHUFFLE_REPEAT_ONE" => Ok(PlayMode::ShuffleRepeatOne),
            other => Err(ApiError::InvalidParameter(format!("unknown play mode {other}"))),
        }
    }
}

/// Parse `H:MM:SS` into seconds. `NOT_IMPLEMENTED` and empty values are 0.
pub fn parse_hms(value: &str) -> u32 {
    let mut seconds = 0u32;
    for part in value.trim().split(':') {
        match part.split('.').next().unwrap_or("").parse::<u32>() {
            Ok(n) => seconds = seconds.saturating_mul(60).saturating_add(n),
            Err(_) => return 0,
        }
    }
    seconds
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("PLAYING", PlayState::Playing, "\"playing\"")]
    #[case("PAUSED_PLAYBACK", PlayState::Paused, "\"paused\"")]
    #[case("STOPPED", PlayState::Stopped, "\"stopped\"")]
    #[case("TRANSITIONING", PlayState::Transitioning, "\"transitioning\"")]
    #[case("NO_MEDIA_PRESENT", PlayState::NoMedia, "\"no_media\"")]
    fn test_transport_state_mapping(
        #[case] raw: &str,
        #[case] expected: PlayState,
        #[case] json: &str,
    ) {
        let state = PlayState::from_transport_state(raw).unwrap();
        assert_eq!(state, expected);
        assert_eq!(serde_json::to_string(&state).unwrap(), json);
    }

    #[test]
    fn test_unknown_transport_state() {
        assert_eq!(PlayState::from_transport_state("BUFFERING"), None);
    }

    #[rstest]
    #[case("0:03:58", 238)]
    #[case("1:00:00", 3600)]
    #[case("0:00:07.250", 7)]
    #[case("NOT_IMPLEMENTED", 0)]
    #[case("", 0)]
    fn test_parse_hms(#[case] raw: &str, #[case] seconds: u32) {
        assert_eq!(parse_hms(raw), seconds);
    }

    #[test]
    fn test_play_mode_round_trips_through_wire_name() {
        for mode in [
            PlayMode::Normal,
            PlayMode::RepeatAll,
            PlayMode::RepeatOne,
            PlayMode::Shuffle,
            PlayMode::ShuffleNoRepeat,
            PlayMode::ShuffleRepeatOne,
        ] {
            assert_eq!(mode.as_str().parse::<PlayMode>().unwrap(), mode);
        }
        assert_eq!("shuffle".parse::<PlayMode>().unwrap(), PlayMode::Shuffle);
        assert!("SIDEWAYS".parse::<PlayMode>().is_err());
    }

    #[test]
    fn test_album_art_is_resolved_against_host() {
        let mut track = Track {
            album_art_uri: Some("/getaa?s=1&u=x-sonos-spotify%3a".to_string()),
            ..Default::default()
        };
        track.resolve_album_art("192.168.1.20:1400");
        assert_eq!(
            track.album_art_url.as_deref(),
            Some("http://192.168.1.20:1400/getaa?s=1&u=x-sonos-spotify%3a")
        );

        let mut absolute = Track {
            album_art_uri: Some("https://i.scdn.co/image/abc".to_string()),
            ..Default::default()
        };
        absolute.resolve_album_art("192.168.1.20:1400");
        assert_eq!(absolute.album_art_url.as_deref(), Some("https://i.scdn.co/image/abc"));
    }

    #[test]
    fn test_track_serializes_camel_case() {
        let track = Track {
            title: Some("Song".to_string()),
            queue_position: 3,
            ..Default::default()
        };
        let json = serde_json::to_value(&track).unwrap();
        assert_eq!(json["title"], "Song");
        assert_eq!(json["queuePosition"], 3);
        assert!(json.get("albumArtURI").is_some());
    }
}

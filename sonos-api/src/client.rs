use soap_client::SoapClient;
use tracing::debug;

use crate::didl::DidlLite;
use crate::error::Result;
use crate::operation::SonosOperation;
use crate::operations::av_transport::*;
use crate::operations::rendering_control::*;
use crate::operations::zone_group_topology::GetZoneGroupState;
use crate::service::Service;
use crate::subscription::Subscription;
use crate::topology::{parse_zone_groups, ZoneGroup};
use crate::types::{parse_hms, PlayMode, PlayState, Track};

const MASTER: &str = "Master";

/// Executes operations against speakers.
///
/// All methods block. `host` is always the speaker address as `ip:port`.
///
/// # Example
/// ```no_run
/// use sonos_api::SonosClient;
///
/// let client = SonosClient::new();
/// let volume = client.adjust_volume("192.168.1.20:1400", -2)?;
/// println!("volume is now {volume}");
/// # Ok::<(), sonos_api::ApiError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct SonosClient {
    soap_client: SoapClient,
}

impl SonosClient {
    pub fn new() -> Self {
        Self {
            soap_client: SoapClient::new(),
        }
    }

    pub fn with_soap_client(soap_client: SoapClient) -> Self {
        Self { soap_client }
    }

    /// Execute any operation
    pub fn execute<Op: SonosOperation>(&self, host: &str, request: &Op::Request) -> Result<Op::Response> {
        let info = Op::SERVICE.info();
        debug!(host, action = Op::ACTION, "executing operation");
        let xml = self.soap_client.call(
            host,
            info.endpoint,
            info.service_uri,
            Op::ACTION,
            &Op::build_payload(request),
        )?;
        Op::parse_response(&xml)
    }

    /// Current track, with position and album art resolved
    pub fn current_track(&self, host: &str) -> Result<Track> {
        let info = self.execute::<GetPositionInfo>(host, &GetPositionInfoRequest::new())?;

        let mut track = match info.track_meta_data.as_str() {
            "" | "NOT_IMPLEMENTED" => Track::default(),
            metadata => DidlLite::from_xml(metadata)?.into_track(),
        };
        if track.uri.is_none() && !info.track_uri.is_empty() {
            track.uri = Some(info.track_uri);
        }
        if track.duration == 0 {
            track.duration = parse_hms(&info.track_duration);
        }
        track.position = parse_hms(&info.rel_time);
        track.queue_position = info.track;
        track.resolve_album_art(host);
        Ok(track)
    }

    pub fn play_state(&self, host: &str) -> Result<PlayState> {
        self.execute::<GetTransportInfo>(host, &GetTransportInfoRequest::new())
    }

    pub fn volume(&self, host: &str) -> Result<u8> {
        self.execute::<GetVolume>(host, &GetVolumeRequest::new(MASTER.to_string()))
    }

    pub fn play(&self, host: &str) -> Result<()> {
        self.execute::<Play>(host, &PlayRequest::new("1".to_string()))
    }

    pub fn pause(&self, host: &str) -> Result<()> {
        self.execute::<Pause>(host, &PauseRequest::new())
    }

    pub fn next(&self, host: &str) -> Result<()> {
        self.execute::<Next>(host, &NextRequest::new())
    }

    pub fn set_play_mode(&self, host: &str, mode: PlayMode) -> Result<()> {
        self.execute::<SetPlayMode>(host, &SetPlayModeRequest::new(mode))
    }

    /// Change volume by `delta` steps, returning the new volume
    pub fn adjust_volume(&self, host: &str, delta: i32) -> Result<u8> {
        self.execute::<SetRelativeVolume>(
            host,
            &SetRelativeVolumeRequest::new(MASTER.to_string(), delta),
        )
    }

    pub fn set_av_transport_uri(&self, host: &str, uri: &str, metadata: &str) -> Result<()> {
        self.execute::<SetAVTransportURI>(
            host,
            &SetAVTransportURIRequest::new(uri.to_string(), metadata.to_string()),
        )
    }

    pub fn flush_queue(&self, host: &str) -> Result<()> {
        self.execute::<RemoveAllTracksFromQueue>(host, &RemoveAllTracksFromQueueRequest::new())
    }

    /// Append to the end of the queue, returning the first queue position used
    pub fn add_uri_to_queue(&self, host: &str, uri: &str, metadata: &str) -> Result<u32> {
        let queued = self.execute::<AddURIToQueue>(
            host,
            &AddURIToQueueRequest::new(uri.to_string(), metadata.to_string(), 0, false),
        )?;
        Ok(queued.first_track_number_enqueued)
    }

    /// Jump to a 1-based queue position
    pub fn select_track(&self, host: &str, position: u32) -> Result<()> {
        self.execute::<Seek>(
            host,
            &SeekRequest::new("TRACK_NR".to_string(), position.to_string()),
        )
    }

    /// Every group in the household, as seen by `host`
    pub fn zone_groups(&self, host: &str) -> Result<Vec<ZoneGroup>> {
        let state = self.execute::<GetZoneGroupState>(host, &())?;
        parse_zone_groups(&state)
    }

    pub fn subscribe(
        &self,
        host: &str,
        service: Service,
        callback_url: &str,
        timeout_seconds: u32,
    ) -> Result<Subscription> {
        Subscription::create(
            self.soap_client.clone(),
            host,
            service,
            callback_url,
            timeout_seconds,
        )
    }
}

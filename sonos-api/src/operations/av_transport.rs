//! AVTransport operations: playback, queue and transport settings

use soap_client::argument;

use crate::error::ApiError;
use crate::operation::{child_number, child_text};
use crate::types::{PlayMode, PlayState};

/// Raw `GetPositionInfo` result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionInfo {
    /// 1-based queue index, 0 when nothing is queued
    pub track: u32,
    pub track_duration: String,
    /// DIDL-Lite document, empty or `NOT_IMPLEMENTED` when unknown
    pub track_meta_data: String,
    pub track_uri: String,
    pub rel_time: String,
}

/// Result of `AddURIToQueue`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuedTracks {
    pub first_track_number_enqueued: u32,
    pub num_tracks_added: u32,
    pub new_queue_length: u32,
}

define_operation! {
    /// Read the current track position and metadata
    operation: GetPositionInfo,
    action: "GetPositionInfo",
    service: AVTransport,
    request: {},
    response: PositionInfo,
    payload: |_req| String::new(),
    parse: |xml| Ok(PositionInfo {
        track: child_number(xml, "Track")?,
        track_duration: child_text(xml, "TrackDuration")?,
        track_meta_data: child_text(xml, "TrackMetaData")?,
        track_uri: child_text(xml, "TrackURI")?,
        rel_time: child_text(xml, "RelTime")?,
    }),
}

define_operation! {
    /// Read the transport state
    operation: GetTransportInfo,
    action: "GetTransportInfo",
    service: AVTransport,
    request: {},
    response: PlayState,
    payload: |_req| String::new(),
    parse: |xml| {
        let raw = child_text(xml, "CurrentTransportState")?;
        PlayState::from_transport_state(&raw)
            .ok_or_else(|| ApiError::ParseError(format!("Unknown transport state: {raw}")))
    },
}

define_operation! {
    operation: Play,
    action: "Play",
    service: AVTransport,
    request: { speed: String },
    response: (),
    payload: |req| argument("Speed", &req.speed),
    parse: |_xml| Ok(()),
}

define_operation! {
    operation: Pause,
    action: "Pause",
    service: AVTransport,
    request: {},
    response: (),
    payload: |_req| String::new(),
    parse: |_xml| Ok(()),
}

define_operation! {
    operation: Next,
    action: "Next",
    service: AVTransport,
    request: {},
    response: (),
    payload: |_req| String::new(),
    parse: |_xml| Ok(()),
}

define_operation! {
    operation: SetPlayMode,
    action: "SetPlayMode",
    service: AVTransport,
    request: { mode: PlayMode },
    response: (),
    payload: |req| argument("NewPlayMode", req.mode.as_str()),
    parse: |_xml| Ok(()),
}

define_operation! {
    /// Replace the transport source, e.g. with a radio stream or the queue
    operation: SetAVTransportURI,
    action: "SetAVTransportURI",
    service: AVTransport,
    request: { uri: String, metadata: String },
    response: (),
    payload: |req| format!(
        "{}{}",
        argument("CurrentURI", &req.uri),
        argument("CurrentURIMetaData", &req.metadata)
    ),
    parse: |_xml| Ok(()),
}

define_operation! {
    operation: RemoveAllTracksFromQueue,
    action: "RemoveAllTracksFromQueue",
    service: AVTransport,
    request: {},
    response: (),
    payload: |_req| String::new(),
    parse: |_xml| Ok(()),
}

define_operation! {
    /// Append a track or container to the queue
    operation: AddURIToQueue,
    action: "AddURIToQueue",
    service: AVTransport,
    request: {
        uri: String,
        metadata: String,
        desired_first_track_number_enqueued: u32,
        enqueue_as_next: bool,
    },
    response: QueuedTracks,
    payload: |req| format!(
        "{}{}{}{}",
        argument("EnqueuedURI", &req.uri),
        argument("EnqueuedURIMetaData", &req.metadata),
        argument(
            "DesiredFirstTrackNumberEnqueued",
            &req.desired_first_track_number_enqueued.to_string()
        ),
        argument("EnqueueAsNext", if req.enqueue_as_next { "1" } else { "0" })
    ),
    parse: |xml| Ok(QueuedTracks {
        first_track_number_enqueued: child_number(xml, "FirstTrackNumberEnqueued")?,
        num_tracks_added: child_number(xml, "NumTracksAdded")?,
        new_queue_length: child_number(xml, "NewQueueLength")?,
    }),
}

define_operation! {
    /// Seek within the queue (`TRACK_NR`) or the current track (`REL_TIME`)
    operation: Seek,
    action: "Seek",
    service: AVTransport,
    request: { unit: String, target: String },
    response: (),
    payload: |req| format!("{}{}", argument("Unit", &req.unit), argument("Target", &req.target)),
    parse: |_xml| Ok(()),
}

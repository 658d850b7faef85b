//! RenderingControl operations

use soap_client::argument;

use crate::operation::child_number;

define_operation! {
    operation: GetVolume,
    action: "GetVolume",
    service: RenderingControl,
    request: { channel: String },
    response: u8,
    payload: |req| argument("Channel", &req.channel),
    parse: |xml| child_number(xml, "CurrentVolume"),
}

define_operation! {
    /// Nudge volume by a signed step; the speaker clamps to 0..=100
    operation: SetRelativeVolume,
    action: "SetRelativeVolume",
    service: RenderingControl,
    request: { channel: String, adjustment: i32 },
    response: u8,
    payload: |req| format!(
        "{}{}",
        argument("Channel", &req.channel),
        argument("Adjustment", &req.adjustment.to_string())
    ),
    parse: |xml| child_number(xml, "NewVolume"),
}

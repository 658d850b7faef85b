//! ZoneGroupTopology operations

use xmltree::Element;

use crate::error::Result;
use crate::operation::{child_text, SonosOperation};
use crate::service::Service;

/// Fetch the household topology as an escaped `ZoneGroupState` document.
///
/// Unlike the media renderer actions this one takes no `InstanceID`.
pub struct GetZoneGroupState;

impl SonosOperation for GetZoneGroupState {
    type Request = ();
    type Response = String;

    const SERVICE: Service = Service::ZoneGroupTopology;
    const ACTION: &'static str = "GetZoneGroupState";

    fn build_payload(_request: &Self::Request) -> String {
        String::new()
    }

    fn parse_response(xml: &Element) -> Result<Self::Response> {
        child_text(xml, "ZoneGroupState")
    }
}

use xmltree::Element;

use crate::error::{ApiError, Result};
use crate::service::Service;

/// Base trait for all Sonos UPnP operations
///
/// An operation is a zero-sized marker type that ties a typed request and
/// response to a SOAP action on one service. [`crate::SonosClient::execute`]
/// does the transport; implementors only render arguments and read results.
pub trait SonosOperation {
    /// The request type for this operation
    type Request;

    /// The response type for this operation
    type Response;

    /// The UPnP service this operation belongs to
    const SERVICE: Service;

    /// The SOAP action name for this operation
    const ACTION: &'static str;

    /// Render the argument elements that go inside the action element
    fn build_payload(request: &Self::Request) -> String;

    /// Read the typed response out of the `{Action}Response` element
    fn parse_response(xml: &Element) -> Result<Self::Response>;
}

/// Text of a required child element.
pub(crate) fn child_text(xml: &Element, name: &str) -> Result<String> {
    xml.get_child(name)
        .map(|e| e.get_text().map(|t| t.into_owned()).unwrap_or_default())
        .ok_or_else(|| ApiError::ParseError(format!("Missing {name} element")))
}

/// Text of a required child element parsed into a number.
pub(crate) fn child_number<T: std::str::FromStr>(xml: &Element, name: &str) -> Result<T> {
    let text = child_text(xml, name)?;
    text.trim()
        .parse::<T>()
        .map_err(|_| ApiError::ParseError(format!("{name} is not a number: {text}")))
}

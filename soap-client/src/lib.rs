//! SOAP and GENA transport for UPnP speakers
//!
//! This crate is the wire layer underneath the speaker adapter. It knows how to
//! wrap an action in a SOAP envelope, unwrap the `{Action}Response` element (or
//! turn a `Fault` into an error code), and drive the three GENA verbs used for
//! push notifications: SUBSCRIBE, SUBSCRIBE-with-SID (renewal) and UNSUBSCRIBE.
//!
//! Calls are blocking. Async callers are expected to hop onto a blocking thread
//! (`tokio::task::spawn_blocking`) before using the client.
//!
//! Every method takes a `host` in `ip:port` form, e.g. `192.168.1.20:1400`.

mod error;

pub use error::{Result, SoapError};

use quick_xml::escape::escape;
use std::time::Duration;
use tracing::debug;
use xmltree::Element;

/// Response from a UPnP subscription request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionResponse {
    /// Subscription ID returned by the device
    pub sid: String,
    /// Timeout granted by the device, in seconds
    pub timeout_seconds: u32,
}

/// Render one SOAP argument element with its value XML-escaped.
///
/// # Example
///
/// ```
/// assert_eq!(
///     soap_client::argument("CurrentURI", "a&b"),
///     "<CurrentURI>a&amp;b</CurrentURI>"
/// );
/// ```
pub fn argument(name: &str, value: &str) -> String {
    format!("<{name}>{}</{name}>", escape(value))
}

/// A small blocking SOAP client for UPnP control and eventing
#[derive(Debug, Clone)]
pub struct SoapClient {
    agent: ureq::Agent,
}

impl SoapClient {
    /// Create a client with a 5 second connect and 10 second read timeout
    pub fn new() -> Self {
        Self::with_timeouts(Duration::from_secs(5), Duration::from_secs(10))
    }

    pub fn with_timeouts(connect: Duration, read: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout_connect(connect)
                .timeout_read(read)
                .build(),
        }
    }

    /// Invoke a SOAP action and return the `{action}Response` element.
    ///
    /// # Arguments
    /// * `host` - Device address as `ip:port`
    /// * `endpoint` - Control path, e.g. `MediaRenderer/AVTransport/Control`
    /// * `service_uri` - Service type URN used for the `SOAPACTION` header
    /// * `action` - Action name, e.g. `GetTransportInfo`
    /// * `payload` - Pre-rendered argument elements (see [`argument`])
    pub fn call(
        &self,
        host: &str,
        endpoint: &str,
        service_uri: &str,
        action: &str,
        payload: &str,
    ) -> Result<Element> {
        let body = envelope(service_uri, action, payload);
        let url = format!("http://{host}/{endpoint}");
        let soap_action = format!("\"{service_uri}#{action}\"");

        debug!(%url, action, "sending SOAP request");

        let xml_text = match self
            .agent
            .post(&url)
            .set("Content-Type", "text/xml; charset=\"utf-8\"")
            .set("SOAPACTION", &soap_action)
            .send_string(&body)
        {
            Ok(response) => response
                .into_string()
                .map_err(|e| SoapError::Network(e.to_string()))?,
            // Devices report faults with HTTP 500 and a fault envelope
            Err(ureq::Error::Status(500, response)) => response
                .into_string()
                .map_err(|e| SoapError::Network(e.to_string()))?,
            Err(e) => return Err(SoapError::Network(e.to_string())),
        };

        let xml = Element::parse(xml_text.as_bytes())
            .map_err(|e| SoapError::Parse(e.to_string()))?;

        extract_response(&xml, action)
    }

    /// Subscribe to GENA events for an event endpoint.
    ///
    /// # Arguments
    /// * `host` - Device address as `ip:port`
    /// * `event_endpoint` - Event path, e.g. `MediaRenderer/AVTransport/Event`
    /// * `callback_url` - URL the device should NOTIFY
    /// * `timeout_seconds` - Requested subscription lifetime
    ///
    /// # Returns
    /// The SID and the timeout actually granted by the device
    pub fn subscribe(
        &self,
        host: &str,
        event_endpoint: &str,
        callback_url: &str,
        timeout_seconds: u32,
    ) -> Result<SubscriptionResponse> {
        let url = format!("http://{host}/{event_endpoint}");

        let response = self
            .agent
            .request("SUBSCRIBE", &url)
            .set("HOST", host)
            .set("CALLBACK", &format!("<{callback_url}>"))
            .set("NT", "upnp:event")
            .set("TIMEOUT", &format!("Second-{timeout_seconds}"))
            .call()
            .map_err(|e| gena_error("SUBSCRIBE", &url, e))?;

        let sid = response
            .header("SID")
            .ok_or_else(|| SoapError::Gena {
                method: "SUBSCRIBE",
                url: url.clone(),
                reason: "missing SID header".to_string(),
            })?
            .to_string();

        let granted = response
            .header("TIMEOUT")
            .and_then(parse_timeout)
            .unwrap_or(timeout_seconds);

        debug!(%url, %sid, granted, "subscribed");

        Ok(SubscriptionResponse {
            sid,
            timeout_seconds: granted,
        })
    }

    /// Renew an existing subscription, returning the newly granted timeout
    pub fn renew(
        &self,
        host: &str,
        event_endpoint: &str,
        sid: &str,
        timeout_seconds: u32,
    ) -> Result<u32> {
        let url = format!("http://{host}/{event_endpoint}");

        let response = self
            .agent
            .request("SUBSCRIBE", &url)
            .set("HOST", host)
            .set("SID", sid)
            .set("TIMEOUT", &format!("Second-{timeout_seconds}"))
            .call()
            .map_err(|e| gena_error("SUBSCRIBE", &url, e))?;

        Ok(response
            .header("TIMEOUT")
            .and_then(parse_timeout)
            .unwrap_or(timeout_seconds))
    }

    /// Cancel a subscription
    pub fn unsubscribe(&self, host: &str, event_endpoint: &str, sid: &str) -> Result<()> {
        let url = format!("http://{host}/{event_endpoint}");

        self.agent
            .request("UNSUBSCRIBE", &url)
            .set("HOST", host)
            .set("SID", sid)
            .call()
            .map_err(|e| gena_error("UNSUBSCRIBE", &url, e))?;

        debug!(%url, sid, "unsubscribed");
        Ok(())
    }
}

impl Default for SoapClient {
    fn default() -> Self {
        Self::new()
    }
}

fn envelope(service_uri: &str, action: &str, payload: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?><s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/"><s:Body><u:{action} xmlns:u="{service_uri}">{payload}</u:{action}></s:Body></s:Envelope>"#
    )
}

fn gena_error(method: &'static str, url: &str, error: ureq::Error) -> SoapError {
    match error {
        ureq::Error::Status(code, _) => SoapError::Gena {
            method,
            url: url.to_string(),
            reason: format!("HTTP {code}"),
        },
        other => SoapError::Network(other.to_string()),
    }
}

/// Parse a GENA `TIMEOUT` header value such as `Second-1800`.
///
/// `infinite` is not honoured by Sonos firmware and maps to `None`.
pub fn parse_timeout(value: &str) -> Option<u32> {
    value
        .trim()
        .strip_prefix("Second-")
        .and_then(|secs| secs.parse::<u32>().ok())
}

fn extract_response(xml: &Element, action: &str) -> Result<Element> {
    let body = xml
        .get_child("Body")
        .ok_or_else(|| SoapError::Parse("Missing SOAP Body".to_string()))?;

    if let Some(fault) = body.get_child("Fault") {
        let error_code = fault
            .get_child("detail")
            .and_then(|d| d.get_child("UPnPError"))
            .and_then(|e| e.get_child("errorCode"))
            .and_then(|c| c.get_text())
            .and_then(|t| t.trim().parse::<u16>().ok())
            .unwrap_or(500);
        return Err(SoapError::Fault(error_code));
    }

    let response_name = format!("{action}Response");
    body.get_child(response_name.as_str())
        .cloned()
        .ok_or_else(|| SoapError::Parse(format!("Missing {response_name} element")))
}

//! Error types for the SOAP client

use thiserror::Error;

/// Errors that can occur while talking to a UPnP device
#[derive(Debug, Error)]
pub enum SoapError {
    /// Connection refused, timed out, or a non-success HTTP status
    #[error("network error: {0}")]
    Network(String),

    /// The device answered with something that is not the expected XML
    #[error("XML parsing error: {0}")]
    Parse(String),

    /// SOAP fault returned by the device, carrying the UPnP error code
    #[error("SOAP fault: error code {0}")]
    Fault(u16),

    /// A GENA request was answered without the headers the protocol requires
    #[error("GENA {method} to {url} rejected: {reason}")]
    Gena {
        method: &'static str,
        url: String,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, SoapError>;

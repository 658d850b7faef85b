use soap_client::SoapError;
use thiserror::Error;

/// Errors from speaker operations
#[derive(Debug, Error)]
pub enum ApiError {
    /// The speaker could not be reached or returned a non-success status
    #[error("network error: {0}")]
    NetworkError(String),

    /// The speaker answered, but the body was not what the operation expects
    #[error("parse error: {0}")]
    ParseError(String),

    /// SOAP fault returned by the speaker
    ///
    /// Common codes: 701 (transition not available, e.g. `Next` at the end of
    /// the queue), 714 (illegal seek target), 800 (not a group coordinator).
    #[error("SOAP fault: error code {0}")]
    SoapFault(u16),

    /// A caller-supplied value is outside what the speaker accepts
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// GENA subscribe, renew or unsubscribe failed
    #[error("subscription error: {0}")]
    SubscriptionError(String),
}

/// Type alias for results that can return an ApiError
pub type Result<T> = std::result::Result<T, ApiError>;

impl From<SoapError> for ApiError {
    fn from(error: SoapError) -> Self {
        match error {
            SoapError::Network(msg) => ApiError::NetworkError(msg),
            SoapError::Parse(msg) => ApiError::ParseError(msg),
            SoapError::Fault(code) => ApiError::SoapFault(code),
            gena @ SoapError::Gena { .. } => ApiError::SubscriptionError(gena.to_string()),
        }
    }
}

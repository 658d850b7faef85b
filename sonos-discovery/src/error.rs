//! Error types for the discovery system.

use thiserror::Error;

/// Failure modes of a discovery pass.
///
/// A discovery pass swallows per-device failures (unreachable description URL,
/// non-Sonos responder) and only surfaces errors that stop the whole search.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Socket creation, multicast send, or description fetch failed
    #[error("network error: {0}")]
    Network(String),

    /// SSDP response or device description could not be parsed
    #[error("parse error: {0}")]
    Parse(String),

    /// The responder is reachable but is not a Sonos speaker
    #[error("not a Sonos device: {0}")]
    InvalidDevice(String),
}

/// Convenience Result type alias for discovery operations.
pub type Result<T> = std::result::Result<T, DiscoveryError>;

//! Shared HTTP plumbing

use std::time::Duration;

use crate::error::{Result, SourceError};

const USER_AGENT: &str = concat!("homeboard/", env!("CARGO_PKG_VERSION"));

/// A client with the timeouts every adapter uses
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(5))
        .timeout(Duration::from_secs(20))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to default HTTP client");
            reqwest::Client::new()
        })
}

/// Turn a non-2xx response into [`SourceError::Status`]
pub(crate) fn check_status(
    source_name: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(SourceError::Status {
            source_name,
            status: status.as_u16(),
        })
    }
}

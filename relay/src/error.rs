use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Source error: {0}")]
    Source(#[from] homeboard_sources::SourceError),

    #[error("Speaker error: {0}")]
    Speaker(#[from] sonos_api::ApiError),

    #[error("Invalid request {name}: {reason}")]
    InvalidRequest { name: String, reason: String },

    #[error("Background task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, RelayError>;

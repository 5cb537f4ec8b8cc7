use thiserror::Error;

// Custom Result type alias for convenient use across the project
pub type Result<T> = std::result::Result<T, TransitError>;

#[derive(Error, Debug)]
pub enum TransitError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid route: {0}")]
    InvalidRoute(String),

    #[error("Routing API error: {0}")]
    Routing(String),

    #[error("Location permission denied")]
    LocationPermissionDenied,

    #[error("Location request timed out")]
    LocationTimeout,

    #[error("Map page unavailable: {0}")]
    PageUnavailable(String),

    #[error("Unknown map event: {0}")]
    UnknownEvent(String),

    #[error("Malformed map event: {0}")]
    MalformedEvent(String),
}

//! Error types for Plate

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// User input rejected before any network call
    #[error("{0}")]
    InvalidInput(String),

    /// A third-party credential could not be obtained
    #[error("{0}")]
    CredentialUnavailable(String),

    #[error("Geocoding error: {0}")]
    Geocode(String),

    #[error("Business directory error: {0}")]
    Directory(String),

    /// The generation backend rejected or failed the request
    #[error("Failed to get recommendations: {0}")]
    Generation(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    /// A request is already in flight for this session
    #[error("{0}")]
    Busy(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Whether this error should be shown to the user verbatim
    ///
    /// Everything else is an internal failure and is reported generically.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::InvalidInput(_)
                | Error::CredentialUnavailable(_)
                | Error::Generation(_)
                | Error::Busy(_)
                | Error::NotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

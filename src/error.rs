use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum SightingsError {
    #[error("invalid region code: {0}")]
    InvalidRegionCode(String),

    #[error("invalid coordinates: {0}")]
    InvalidCoordinates(String),

    #[error("invalid days back: {0} (expected 1-30)")]
    InvalidDaysBack(String),

    #[error("missing config file at {0}")]
    MissingConfig(PathBuf),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("eBird request failed: {0}")]
    EbirdHttp(String),

    #[error("eBird returned status {status}: {message}")]
    EbirdStatus { status: u16, message: String },

    #[error("eBird returned malformed data: {0}")]
    EbirdParse(String),

    #[error("rare species list request failed: {0}")]
    RareListHttp(String),

    #[error("rare species list returned status {status}: {message}")]
    RareListStatus { status: u16, message: String },

    #[error("device location unavailable: {0}")]
    GeolocationUnavailable(String),

    #[error("reference data not available: {0}")]
    CacheMiss(String),
}

impl SightingsError {
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            SightingsError::EbirdHttp(_)
                | SightingsError::EbirdStatus { .. }
                | SightingsError::EbirdParse(_)
                | SightingsError::RareListHttp(_)
                | SightingsError::RareListStatus { .. }
                | SightingsError::CacheMiss(_)
        )
    }
}

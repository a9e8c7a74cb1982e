//! Error types for Disha

use thiserror::Error;

/// Disha error type
#[derive(Error, Debug)]
pub enum DishaError {
    /// Hardware could not be reached after the configured number of attempts
    #[error("Connection failed: {0}")]
    Connection(String),

    /// A single hardware call failed (transient, callers usually skip the tick)
    #[error("Hardware error: {0}")]
    Hardware(String),

    /// The frame source returned no frame
    #[error("Frame grab failed: {0}")]
    FrameGrab(String),

    #[error("Calibration failed: {0}")]
    Calibration(String),

    /// Strict localization failed (markers missing or implausible)
    #[error("Tracking failed: {0}")]
    Tracking(String),

    #[error("Invalid path file: {0}")]
    PathFile(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Run parameters contradict each other
    #[error("Precondition violated: {0}")]
    Precondition(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl From<toml::de::Error> for DishaError {
    fn from(e: toml::de::Error) -> Self {
        DishaError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DishaError>;

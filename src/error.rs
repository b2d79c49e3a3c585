use thiserror::Error;

pub type Result<T> = std::result::Result<T, CaptureError>;

#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    #[error("Browser launch failed: {0}")]
    BrowserLaunchFailed(String),

    #[error("Page error: {0}")]
    PageError(String),

    #[error("Script evaluation failed: {0}")]
    ScriptError(String),

    #[error("Scroll target resolution failed: {0}")]
    ResolveFailed(String),

    #[error("Scroll to offset {offset} failed: {reason}")]
    ScrollFailed { offset: u32, reason: String },

    #[error("Visible-area capture failed: {0}")]
    CaptureFailed(String),

    #[error("Capture returned no image")]
    EmptyCapture,

    #[error("Tile decode failed: {0}")]
    DecodeFailed(String),

    #[error("Encoding the composite image failed: {0}")]
    EncodeFailed(String),

    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("Overlay update failed: {0}")]
    OverlayFailed(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl CaptureError {
    /// Whether the error ends a session. Everything else is absorbed per tile.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CaptureError::BrowserLaunchFailed(_)
                | CaptureError::PageError(_)
                | CaptureError::ResolveFailed(_)
                | CaptureError::EncodeFailed(_)
                | CaptureError::DeliveryFailed(_)
                | CaptureError::InvalidUrl(_)
                | CaptureError::ConfigurationError(_)
        )
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            CaptureError::EmptyCapture => ErrorSeverity::Low,
            CaptureError::OverlayFailed(_) => ErrorSeverity::Low,
            CaptureError::CaptureFailed(_)
            | CaptureError::DecodeFailed(_)
            | CaptureError::ScrollFailed { .. } => ErrorSeverity::Medium,
            CaptureError::ConfigurationError(_) => ErrorSeverity::High,
            CaptureError::BrowserLaunchFailed(_) => ErrorSeverity::High,
            CaptureError::EncodeFailed(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Medium,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for CaptureError {
    fn from(err: serde_json::Error) -> Self {
        CaptureError::SerializationError(err.to_string())
    }
}

impl From<image::ImageError> for CaptureError {
    fn from(err: image::ImageError) -> Self {
        CaptureError::DecodeFailed(err.to_string())
    }
}

impl From<chromiumoxide::error::CdpError> for CaptureError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        CaptureError::PageError(err.to_string())
    }
}

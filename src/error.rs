use thiserror::Error;

/// Failures of the host positioning capability.
///
/// Every variant renders a distinct message so the UI can show it verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("Geolocation is not supported on this device")]
    Unavailable,
    #[error("Location permission denied. Please enable location access and try again")]
    PermissionDenied,
    #[error("Location information is unavailable: {0}")]
    PositionUnavailable(String),
    #[error("Location request timed out. Move to an open area and try again")]
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    #[error("Camera unavailable: {0}")]
    DeviceUnavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    /// Capture was invoked without an active stream or without a raster target.
    #[error("capture unavailable: {0}")]
    Unavailable(&'static str),
    #[error("failed to produce annotated image: {0}")]
    EncodingFailed(String),
    #[error("invalid capture options: {0}")]
    InvalidOptions(String),
    #[error("capture requires a location fix; acquisition has not completed")]
    LocationPending,
}

/// Low-level rasterization failures raised by a [`crate::capture::Surface`].
#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("no font available for text rendering")]
    MissingFont,
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

impl From<SurfaceError> for CaptureError {
    fn from(err: SurfaceError) -> Self {
        CaptureError::EncodingFailed(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid configuration: {field} {reason}")]
pub struct ConfigError {
    pub field: &'static str,
    pub reason: String,
}

impl ConfigError {
    pub(crate) fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

impl From<ConfigError> for CaptureError {
    fn from(err: ConfigError) -> Self {
        CaptureError::InvalidOptions(err.to_string())
    }
}

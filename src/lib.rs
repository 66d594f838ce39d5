pub mod auth;
pub mod camera;
pub mod capture;
pub mod config;
pub mod error;
pub mod location;
pub mod pipeline;
mod utils;

pub use auth::{AuthContext, Credential};
pub use camera::{CameraConfig, CameraDevice, CameraSession, Facing, SessionState, StillImageDevice};
pub use capture::{AnnotatedImage, CaptureOptions, Compositor, ImageSurface, Surface};
pub use config::{ConfigStore, PipelineConfig};
pub use error::{CameraError, CaptureError, ConfigError, LocationError, SurfaceError};
pub use location::{LocationFix, LocationService, NominatimGeocoder, StaticPositionProvider};
pub use pipeline::CapturePipeline;
pub use utils::init_logging;

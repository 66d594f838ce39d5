use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::capture::FrameSource;
use crate::error::CameraError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Facing {
    User,
    Environment,
}

impl Default for Facing {
    fn default() -> Self {
        Facing::Environment
    }
}

/// Ideal stream parameters; devices pick the closest mode they support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamConstraints {
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub facing: Facing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CameraConfig {
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub facing: Facing,
    /// Refuse captures until a location fix exists.
    pub require_location_fix: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            ideal_width: 1280,
            ideal_height: 720,
            facing: Facing::Environment,
            require_location_fix: true,
        }
    }
}

impl CameraConfig {
    pub fn constraints(&self) -> StreamConstraints {
        StreamConstraints {
            ideal_width: self.ideal_width,
            ideal_height: self.ideal_height,
            facing: self.facing,
        }
    }
}

/// A live video stream holding the device lock until closed.
pub trait VideoStream: FrameSource + Send + Sync + 'static {
    fn id(&self) -> Uuid;

    /// Release the device. Called at most once per stream.
    fn close(&mut self) -> impl Future<Output = ()> + Send;

    /// Release the device without an async runtime, used when a streaming
    /// session is dropped outside tokio. Streams whose handle frees itself
    /// on drop can keep the default.
    fn release_blocking(&mut self) {}
}

/// Host camera capability.
pub trait CameraDevice: Send + Sync {
    type Stream: VideoStream;

    fn open(
        &self,
        constraints: &StreamConstraints,
    ) -> impl Future<Output = Result<Self::Stream, CameraError>> + Send;
}

/// Device that streams a single still image, for annotating photos taken
/// elsewhere and for running the pipeline without camera hardware.
#[derive(Debug, Clone)]
pub struct StillImageDevice {
    frame: Arc<RgbaImage>,
}

impl StillImageDevice {
    pub fn new(frame: RgbaImage) -> Self {
        Self {
            frame: Arc::new(frame),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CameraError> {
        let path = path.as_ref();
        let decoded = image::open(path).map_err(|err| {
            CameraError::DeviceUnavailable(format!("cannot read {}: {err}", path.display()))
        })?;
        Ok(Self::new(decoded.to_rgba8()))
    }
}

impl CameraDevice for StillImageDevice {
    type Stream = StillImageStream;

    async fn open(&self, _constraints: &StreamConstraints) -> Result<StillImageStream, CameraError> {
        Ok(StillImageStream {
            id: Uuid::new_v4(),
            frame: Some(Arc::clone(&self.frame)),
        })
    }
}

#[derive(Debug)]
pub struct StillImageStream {
    id: Uuid,
    frame: Option<Arc<RgbaImage>>,
}

impl FrameSource for StillImageStream {
    fn current_frame(&self) -> Option<Arc<RgbaImage>> {
        self.frame.clone()
    }
}

impl VideoStream for StillImageStream {
    fn id(&self) -> Uuid {
        self.id
    }

    async fn close(&mut self) {
        self.frame = None;
    }

    fn release_blocking(&mut self) {
        self.frame = None;
    }
}

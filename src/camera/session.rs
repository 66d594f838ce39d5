use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::capture::{AnnotatedImage, CaptureOptions, Compositor, FrameSource, Surface};
use crate::error::{CameraError, CaptureError};
use crate::location::LocationFix;

use super::device::{CameraDevice, Facing, StreamConstraints, VideoStream};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Idle,
    Streaming,
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::Idle
    }
}

/// Owns at most one open video stream from `device`.
///
/// Dropping a streaming session releases its stream, on the current tokio
/// runtime when there is one and through [`VideoStream::release_blocking`]
/// otherwise.
pub struct CameraSession<D: CameraDevice> {
    device: D,
    stream: Option<D::Stream>,
    constraints: Option<StreamConstraints>,
    require_location_fix: bool,
}

impl<D: CameraDevice> CameraSession<D> {
    pub fn new(device: D) -> Self {
        Self {
            device,
            stream: None,
            constraints: None,
            require_location_fix: true,
        }
    }

    pub fn require_location_fix(mut self, required: bool) -> Self {
        self.require_location_fix = required;
        self
    }

    pub fn state(&self) -> SessionState {
        if self.stream.is_some() {
            SessionState::Streaming
        } else {
            SessionState::Idle
        }
    }

    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Streaming
    }

    /// Constraints of the active stream.
    pub fn constraints(&self) -> Option<&StreamConstraints> {
        self.constraints.as_ref()
    }

    pub fn stream_id(&self) -> Option<Uuid> {
        self.stream.as_ref().map(VideoStream::id)
    }

    pub fn frame_source(&self) -> Option<&dyn FrameSource> {
        self.stream.as_ref().map(|stream| stream as &dyn FrameSource)
    }

    pub async fn start(
        &mut self,
        requested_width: u32,
        requested_height: u32,
        facing: Facing,
    ) -> Result<(), CameraError> {
        self.start_with(StreamConstraints {
            ideal_width: requested_width,
            ideal_height: requested_height,
            facing,
        })
        .await
    }

    /// Open a stream. A running stream is stopped first, so a failed restart
    /// leaves the session idle.
    pub async fn start_with(&mut self, constraints: StreamConstraints) -> Result<(), CameraError> {
        if self.is_active() {
            log_info!("camera restart requested; stopping current stream first");
            self.stop().await;
        }

        let stream = self.device.open(&constraints).await?;
        log_info!(
            "camera stream {} started ({}x{}, {:?})",
            stream.id(),
            constraints.ideal_width,
            constraints.ideal_height,
            constraints.facing
        );
        self.stream = Some(stream);
        self.constraints = Some(constraints);
        Ok(())
    }

    /// Release the stream if one is open. Safe to call repeatedly.
    pub async fn stop(&mut self) {
        let Some(mut stream) = self.stream.take() else {
            return;
        };
        self.constraints = None;
        let id = stream.id();
        stream.close().await;
        log_info!("camera stream {} stopped", id);
    }

    /// Composite the current frame, enforcing the location-fix requirement.
    pub fn capture(
        &self,
        compositor: &Compositor,
        raster_target: Option<&mut dyn Surface>,
        location: Option<&LocationFix>,
        options: &CaptureOptions,
    ) -> Result<AnnotatedImage, CaptureError> {
        if self.require_location_fix && location.is_none() {
            return Err(CaptureError::LocationPending);
        }
        compositor.capture(self.frame_source(), raster_target, location, options)
    }
}

impl<D: CameraDevice> Drop for CameraSession<D> {
    fn drop(&mut self) {
        let Some(mut stream) = self.stream.take() else {
            return;
        };
        log_warn!("camera session dropped while streaming; releasing {}", stream.id());
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    stream.close().await;
                });
            }
            Err(_) => stream.release_blocking(),
        }
    }
}

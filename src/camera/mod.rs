pub mod device;
pub mod session;

pub use device::{
    CameraConfig, CameraDevice, Facing, StillImageDevice, StillImageStream, StreamConstraints,
    VideoStream,
};
pub use session::{CameraSession, SessionState};

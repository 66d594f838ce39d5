pub mod annotated;
pub mod compositor;
pub mod fingerprint;
pub mod fonts;
pub mod image_surface;
pub mod options;
pub mod overlay;
pub mod surface;

pub use annotated::{AnnotatedImage, CaptureMetadata};
pub use compositor::{Compositor, WatermarkConfig};
pub use fonts::{FontConfig, FontSet};
pub use image_surface::ImageSurface;
pub use options::CaptureOptions;
pub use surface::{
    rgba, DrawOp, FrameSource, Rect, RecordingSurface, Stroke, Surface, TextAlign, TextStyle,
};

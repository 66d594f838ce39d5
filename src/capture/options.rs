use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for a single compositing operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureOptions {
    pub output_width: u32,
    pub output_height: u32,
    /// JPEG quality in (0, 1].
    pub jpeg_quality: f32,
    pub show_grid_lines: bool,
    /// Alpha of the top and bottom information bands, in [0, 1].
    pub overlay_opacity: f32,
    pub compute_fingerprint: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            output_width: 800,
            output_height: 600,
            jpeg_quality: 0.95,
            show_grid_lines: true,
            overlay_opacity: 0.6,
            compute_fingerprint: true,
        }
    }
}

impl CaptureOptions {
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.output_width = width;
        self.output_height = height;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output_width == 0 || self.output_height == 0 {
            return Err(ConfigError::new(
                "capture.outputWidth/outputHeight",
                format!("must be positive, got {}x{}", self.output_width, self.output_height),
            ));
        }
        if !(self.jpeg_quality > 0.0 && self.jpeg_quality <= 1.0) {
            return Err(ConfigError::new(
                "capture.jpegQuality",
                format!("must be in (0, 1], got {}", self.jpeg_quality),
            ));
        }
        if !(0.0..=1.0).contains(&self.overlay_opacity) {
            return Err(ConfigError::new(
                "capture.overlayOpacity",
                format!("must be in [0, 1], got {}", self.overlay_opacity),
            ));
        }
        Ok(())
    }

    /// Quality on the 1..=100 scale used by JPEG encoders.
    pub fn jpeg_quality_percent(&self) -> u8 {
        (self.jpeg_quality * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

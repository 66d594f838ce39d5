use std::sync::Arc;

use image::{Rgba, RgbaImage};

use crate::error::SurfaceError;

/// Build a colour from 8-bit channels and a 0..1 alpha.
pub fn rgba(r: u8, g: u8, b: u8, alpha: f32) -> Rgba<u8> {
    Rgba([r, g, b, (alpha.clamp(0.0, 1.0) * 255.0).round() as u8])
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub color: Rgba<u8>,
    pub width: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub size: f32,
    pub bold: bool,
    pub monospace: bool,
    pub fill: Rgba<u8>,
    /// Outline drawn underneath the fill.
    pub stroke: Option<Stroke>,
    pub align: TextAlign,
}

impl TextStyle {
    pub fn new(size: f32, fill: Rgba<u8>) -> Self {
        Self {
            size,
            bold: false,
            monospace: false,
            fill,
            stroke: None,
            align: TextAlign::Left,
        }
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn monospace(mut self) -> Self {
        self.monospace = true;
        self
    }

    pub fn outlined(mut self, color: Rgba<u8>, width: f32) -> Self {
        self.stroke = Some(Stroke { color, width });
        self
    }

    pub fn aligned(mut self, align: TextAlign) -> Self {
        self.align = align;
        self
    }
}

/// Something that can hand out the most recent video frame.
pub trait FrameSource {
    /// `None` while the source is not streaming.
    fn current_frame(&self) -> Option<Arc<RgbaImage>>;
}

/// 2-D drawable raster target.
///
/// Text is positioned by its alphabetic baseline, matching canvas semantics.
pub trait Surface: Send {
    /// Resize to `width x height` and clear to opaque black.
    fn reset(&mut self, width: u32, height: u32);

    fn dimensions(&self) -> (u32, u32);

    /// Blit `frame` at the origin; the caller has already scaled it.
    fn draw_image(&mut self, frame: &RgbaImage) -> Result<(), SurfaceError>;

    fn fill_rect(&mut self, rect: Rect, color: Rgba<u8>) -> Result<(), SurfaceError>;

    fn stroke_line(&mut self, from: (f32, f32), to: (f32, f32), stroke: Stroke)
        -> Result<(), SurfaceError>;

    fn fill_rounded_rect(&mut self, rect: Rect, radius: f32, color: Rgba<u8>)
        -> Result<(), SurfaceError>;

    fn stroke_rounded_rect(&mut self, rect: Rect, radius: f32, stroke: Stroke)
        -> Result<(), SurfaceError>;

    fn fill_circle(&mut self, center: (f32, f32), radius: f32, color: Rgba<u8>)
        -> Result<(), SurfaceError>;

    fn measure_text(&self, text: &str, style: &TextStyle) -> Result<f32, SurfaceError>;

    fn draw_text(&mut self, text: &str, x: f32, baseline: f32, style: &TextStyle)
        -> Result<(), SurfaceError>;

    /// Export the raster as JPEG with quality on the 1..=100 scale.
    fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>, SurfaceError>;
}

/// One call recorded by [`RecordingSurface`].
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Reset { width: u32, height: u32 },
    Image { width: u32, height: u32 },
    FillRect { rect: Rect, color: Rgba<u8> },
    Line { from: (f32, f32), to: (f32, f32), stroke: Stroke },
    FillRoundedRect { rect: Rect, radius: f32, color: Rgba<u8> },
    StrokeRoundedRect { rect: Rect, radius: f32, stroke: Stroke },
    Circle { center: (f32, f32), radius: f32, color: Rgba<u8> },
    Text { text: String, x: f32, baseline: f32, style: TextStyle },
}

/// Surface that records draw calls instead of rasterizing them.
///
/// Text metrics use a fixed advance of `0.6 * size` per character, so layouts
/// can be inspected without any font installed.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    width: u32,
    height: u32,
    ops: Vec<DrawOp>,
    fail_after: Option<usize>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `ops` draw calls after the last reset, then fail every following one.
    pub fn failing_after(ops: usize) -> Self {
        Self {
            fail_after: Some(ops),
            ..Self::default()
        }
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    pub fn texts(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn text_op(&self, needle: &str) -> Option<&DrawOp> {
        self.ops
            .iter()
            .find(|op| matches!(op, DrawOp::Text { text, .. } if text.contains(needle)))
    }

    fn record(&mut self, op: DrawOp) -> Result<(), SurfaceError> {
        if let Some(limit) = self.fail_after {
            // The reset entry does not count against the budget.
            if self.ops.len() > limit {
                return Err(SurfaceError::InvalidGeometry("injected draw failure".into()));
            }
        }
        self.ops.push(op);
        Ok(())
    }
}

impl Surface for RecordingSurface {
    fn reset(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.ops.clear();
        self.ops.push(DrawOp::Reset { width, height });
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn draw_image(&mut self, frame: &RgbaImage) -> Result<(), SurfaceError> {
        self.record(DrawOp::Image {
            width: frame.width(),
            height: frame.height(),
        })
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba<u8>) -> Result<(), SurfaceError> {
        self.record(DrawOp::FillRect { rect, color })
    }

    fn stroke_line(
        &mut self,
        from: (f32, f32),
        to: (f32, f32),
        stroke: Stroke,
    ) -> Result<(), SurfaceError> {
        self.record(DrawOp::Line { from, to, stroke })
    }

    fn fill_rounded_rect(
        &mut self,
        rect: Rect,
        radius: f32,
        color: Rgba<u8>,
    ) -> Result<(), SurfaceError> {
        self.record(DrawOp::FillRoundedRect {
            rect,
            radius,
            color,
        })
    }

    fn stroke_rounded_rect(
        &mut self,
        rect: Rect,
        radius: f32,
        stroke: Stroke,
    ) -> Result<(), SurfaceError> {
        self.record(DrawOp::StrokeRoundedRect {
            rect,
            radius,
            stroke,
        })
    }

    fn fill_circle(
        &mut self,
        center: (f32, f32),
        radius: f32,
        color: Rgba<u8>,
    ) -> Result<(), SurfaceError> {
        self.record(DrawOp::Circle {
            center,
            radius,
            color,
        })
    }

    fn measure_text(&self, text: &str, style: &TextStyle) -> Result<f32, SurfaceError> {
        Ok(text.chars().count() as f32 * style.size * 0.6)
    }

    fn draw_text(
        &mut self,
        text: &str,
        x: f32,
        baseline: f32,
        style: &TextStyle,
    ) -> Result<(), SurfaceError> {
        self.record(DrawOp::Text {
            text: text.to_string(),
            x,
            baseline,
            style: *style,
        })
    }

    fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>, SurfaceError> {
        let blank = image::RgbImage::new(self.width.max(1), self.height.max(1));
        let mut bytes = Vec::new();
        let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut bytes, quality);
        blank.write_with_encoder(encoder)?;
        Ok(bytes)
    }
}

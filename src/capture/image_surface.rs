use ab_glyph::{Font, PxScale, ScaleFont};
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, DynamicImage, Pixel, Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_line_segment_mut, draw_polygon_mut, draw_text_mut, text_size,
    Blend,
};
use imageproc::point::Point;

use crate::error::SurfaceError;

use super::fonts::FontSet;
use super::surface::{Rect, Stroke, Surface, TextAlign, TextStyle};

/// Raster surface backed by an in-memory RGBA buffer.
///
/// Every primitive alpha-blends onto the existing pixels.
pub struct ImageSurface {
    canvas: Blend<RgbaImage>,
    fonts: Option<FontSet>,
}

impl ImageSurface {
    pub fn new(fonts: FontSet) -> Self {
        Self {
            canvas: Blend(RgbaImage::new(0, 0)),
            fonts: Some(fonts),
        }
    }

    /// A surface that can draw shapes but fails on any text operation.
    pub fn without_fonts() -> Self {
        Self {
            canvas: Blend(RgbaImage::new(0, 0)),
            fonts: None,
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.canvas.0
    }

    fn blend_where(&mut self, bounds: Rect, color: Rgba<u8>, inside: impl Fn(f32, f32) -> bool) {
        let (width, height) = self.canvas.0.dimensions();
        let x0 = bounds.x.floor().max(0.0) as u32;
        let y0 = bounds.y.floor().max(0.0) as u32;
        let x1 = (bounds.right().ceil().max(0.0) as u32).min(width);
        let y1 = (bounds.bottom().ceil().max(0.0) as u32).min(height);

        for y in y0..y1 {
            for x in x0..x1 {
                if inside(x as f32 + 0.5, y as f32 + 0.5) {
                    self.canvas.0.get_pixel_mut(x, y).blend(&color);
                }
            }
        }
    }
}

impl Surface for ImageSurface {
    fn reset(&mut self, width: u32, height: u32) {
        self.canvas = Blend(RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255])));
    }

    fn dimensions(&self) -> (u32, u32) {
        self.canvas.0.dimensions()
    }

    fn draw_image(&mut self, frame: &RgbaImage) -> Result<(), SurfaceError> {
        imageops::replace(&mut self.canvas.0, frame, 0, 0);
        Ok(())
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba<u8>) -> Result<(), SurfaceError> {
        self.blend_where(rect, color, |x, y| rect.contains(x, y));
        Ok(())
    }

    fn stroke_line(
        &mut self,
        from: (f32, f32),
        to: (f32, f32),
        stroke: Stroke,
    ) -> Result<(), SurfaceError> {
        let (dx, dy) = (to.0 - from.0, to.1 - from.1);
        let length = (dx * dx + dy * dy).sqrt();
        if !length.is_finite() {
            return Err(SurfaceError::InvalidGeometry(format!(
                "line {from:?} -> {to:?}"
            )));
        }
        if length == 0.0 {
            return Ok(());
        }

        if stroke.width <= 1.0 {
            draw_line_segment_mut(&mut self.canvas, from, to, stroke.color);
            return Ok(());
        }

        // Thick lines become a quad so translucent strokes blend once per pixel.
        let half = stroke.width / 2.0;
        let (nx, ny) = (-dy / length * half, dx / length * half);
        let corner = |x: f32, y: f32| Point::new(x.round() as i32, y.round() as i32);
        let quad = [
            corner(from.0 + nx, from.1 + ny),
            corner(to.0 + nx, to.1 + ny),
            corner(to.0 - nx, to.1 - ny),
            corner(from.0 - nx, from.1 - ny),
        ];
        if quad[0] == quad[3] || quad[0] == quad[1] {
            draw_line_segment_mut(&mut self.canvas, from, to, stroke.color);
        } else {
            draw_polygon_mut(&mut self.canvas, &quad, stroke.color);
        }
        Ok(())
    }

    fn fill_rounded_rect(
        &mut self,
        rect: Rect,
        radius: f32,
        color: Rgba<u8>,
    ) -> Result<(), SurfaceError> {
        self.blend_where(rect, color, |x, y| rounded_contains(rect, radius, x, y));
        Ok(())
    }

    fn stroke_rounded_rect(
        &mut self,
        rect: Rect,
        radius: f32,
        stroke: Stroke,
    ) -> Result<(), SurfaceError> {
        let half = stroke.width / 2.0;
        let outer = inflate(rect, half);
        let inner = inflate(rect, -half);
        self.blend_where(outer, stroke.color, |x, y| {
            rounded_contains(outer, radius + half, x, y)
                && !rounded_contains(inner, (radius - half).max(0.0), x, y)
        });
        Ok(())
    }

    fn fill_circle(
        &mut self,
        center: (f32, f32),
        radius: f32,
        color: Rgba<u8>,
    ) -> Result<(), SurfaceError> {
        if !(radius.is_finite() && radius >= 0.0) {
            return Err(SurfaceError::InvalidGeometry(format!("circle radius {radius}")));
        }
        draw_filled_circle_mut(
            &mut self.canvas,
            (center.0.round() as i32, center.1.round() as i32),
            radius.round() as i32,
            color,
        );
        Ok(())
    }

    fn measure_text(&self, text: &str, style: &TextStyle) -> Result<f32, SurfaceError> {
        let fonts = self.fonts.as_ref().ok_or(SurfaceError::MissingFont)?;
        let (font, faux_bold) = fonts.face(style.bold, style.monospace);
        let (width, _) = text_size(PxScale::from(style.size), font, text);
        Ok(width as f32 + if faux_bold { 1.0 } else { 0.0 })
    }

    fn draw_text(
        &mut self,
        text: &str,
        x: f32,
        baseline: f32,
        style: &TextStyle,
    ) -> Result<(), SurfaceError> {
        let left = match style.align {
            TextAlign::Left => x,
            TextAlign::Right => x - self.measure_text(text, style)?,
        };

        let fonts = self.fonts.as_ref().ok_or(SurfaceError::MissingFont)?;
        let (font, faux_bold) = fonts.face(style.bold, style.monospace);
        let scale = PxScale::from(style.size);
        let ascent = font.as_scaled(scale).ascent();
        let left = left.round() as i32;
        let top = (baseline - ascent).round() as i32;

        if let Some(outline) = style.stroke {
            let reach = outline.width.round().max(1.0) as i32;
            for dy in -reach..=reach {
                for dx in -reach..=reach {
                    if (dx, dy) == (0, 0) || dx * dx + dy * dy > reach * reach {
                        continue;
                    }
                    draw_text_mut(&mut self.canvas, outline.color, left + dx, top + dy, scale, font, text);
                }
            }
        }

        draw_text_mut(&mut self.canvas, style.fill, left, top, scale, font, text);
        if faux_bold {
            draw_text_mut(&mut self.canvas, style.fill, left + 1, top, scale, font, text);
        }
        Ok(())
    }

    fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>, SurfaceError> {
        if self.canvas.0.width() == 0 || self.canvas.0.height() == 0 {
            return Err(SurfaceError::InvalidGeometry("empty raster".into()));
        }
        // JPEG carries no alpha channel.
        let rgb = DynamicImage::ImageRgba8(self.canvas.0.clone()).to_rgb8();
        let mut bytes = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100));
        rgb.write_with_encoder(encoder)?;
        Ok(bytes)
    }
}

fn rounded_contains(rect: Rect, radius: f32, x: f32, y: f32) -> bool {
    if !rect.contains(x, y) {
        return false;
    }
    let radius = radius.min(rect.width / 2.0).min(rect.height / 2.0).max(0.0);
    let cx = x.clamp(rect.x + radius, rect.right() - radius);
    let cy = y.clamp(rect.y + radius, rect.bottom() - radius);
    let (dx, dy) = (x - cx, y - cy);
    dx * dx + dy * dy <= radius * radius
}

fn inflate(rect: Rect, by: f32) -> Rect {
    Rect::new(
        rect.x - by,
        rect.y - by,
        rect.width + 2.0 * by,
        rect.height + 2.0 * by,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::surface::rgba;

    fn surface(width: u32, height: u32) -> ImageSurface {
        let mut surface = ImageSurface::without_fonts();
        surface.reset(width, height);
        surface
    }

    #[test]
    fn reset_clears_to_opaque_black() {
        let surface = surface(8, 4);
        assert_eq!(surface.dimensions(), (8, 4));
        assert!(surface.image().pixels().all(|p| *p == Rgba([0, 0, 0, 255])));
    }

    #[test]
    fn translucent_fill_blends_with_frame() {
        let mut surface = surface(10, 10);
        let frame = RgbaImage::from_pixel(10, 10, Rgba([200, 200, 200, 255]));
        surface.draw_image(&frame).unwrap();
        surface
            .fill_rect(Rect::new(0.0, 0.0, 10.0, 5.0), rgba(0, 0, 0, 0.5))
            .unwrap();

        let shaded = surface.image().get_pixel(3, 2);
        assert!(shaded[0] > 90 && shaded[0] < 110, "got {shaded:?}");
        assert_eq!(shaded[3], 255);
        assert_eq!(surface.image().get_pixel(3, 7), &Rgba([200, 200, 200, 255]));
    }

    #[test]
    fn rounded_rect_leaves_corners_untouched() {
        let mut surface = surface(40, 40);
        let white = rgba(255, 255, 255, 1.0);
        surface
            .fill_rounded_rect(Rect::new(0.0, 0.0, 40.0, 40.0), 10.0, white)
            .unwrap();
        assert_eq!(surface.image().get_pixel(0, 0), &Rgba([0, 0, 0, 255]));
        assert_eq!(surface.image().get_pixel(20, 20), &white);
        assert_eq!(surface.image().get_pixel(20, 0), &white);
    }

    #[test]
    fn rounded_border_keeps_interior() {
        let mut surface = surface(40, 40);
        let white = rgba(255, 255, 255, 1.0);
        let stroke = Stroke {
            color: white,
            width: 2.0,
        };
        surface
            .stroke_rounded_rect(Rect::new(5.0, 5.0, 30.0, 30.0), 4.0, stroke)
            .unwrap();
        assert_eq!(surface.image().get_pixel(20, 5), &white);
        assert_eq!(surface.image().get_pixel(20, 20), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn thick_and_thin_lines_draw() {
        let mut surface = surface(20, 20);
        let white = rgba(255, 255, 255, 1.0);
        surface
            .stroke_line((10.0, 0.0), (10.0, 19.0), Stroke { color: white, width: 1.0 })
            .unwrap();
        surface
            .stroke_line((0.0, 5.0), (19.0, 5.0), Stroke { color: white, width: 3.0 })
            .unwrap();
        assert_eq!(surface.image().get_pixel(10, 15), &white);
        assert_eq!(surface.image().get_pixel(3, 5), &white);
        assert!(surface
            .stroke_line((1.0, 1.0), (f32::NAN, 1.0), Stroke { color: white, width: 1.0 })
            .is_err());
    }

    #[test]
    fn circle_is_filled_around_centre() {
        let mut surface = surface(30, 30);
        let green = rgba(34, 197, 94, 1.0);
        surface.fill_circle((15.0, 15.0), 12.0, green).unwrap();
        assert_eq!(surface.image().get_pixel(15, 15), &green);
        assert_eq!(surface.image().get_pixel(0, 0), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn text_without_fonts_fails() {
        let mut surface = surface(50, 20);
        let style = TextStyle::new(12.0, rgba(255, 255, 255, 1.0));
        assert!(matches!(
            surface.measure_text("MDNL", &style),
            Err(SurfaceError::MissingFont)
        ));
        assert!(surface.draw_text("MDNL", 1.0, 15.0, &style).is_err());
    }

    #[test]
    fn encodes_jpeg() {
        let surface = surface(64, 48);
        let bytes = surface.encode_jpeg(95).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));

        assert!(ImageSurface::without_fonts().encode_jpeg(95).is_err());
    }

    #[test]
    fn right_aligned_text_ends_at_anchor() {
        let Ok(fonts) = FontSet::load(&crate::capture::FontConfig::default()) else {
            return;
        };
        let mut surface = ImageSurface::new(fonts);
        surface.reset(200, 40);
        let style = TextStyle::new(16.0, rgba(255, 255, 255, 1.0)).aligned(TextAlign::Right);
        surface.draw_text("±30m", 120.0, 25.0, &style).unwrap();

        let lit = |x: u32| (0..40).any(|y| surface.image().get_pixel(x, y)[0] > 128);
        assert!((100..=120).any(lit));
        assert!(!(124..200).any(lit));
    }
}

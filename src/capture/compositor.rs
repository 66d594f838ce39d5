use chrono::{DateTime, Local, Utc};
use image::imageops::{self, FilterType};
use serde::{Deserialize, Serialize};

use crate::error::CaptureError;
use crate::location::LocationFix;

use super::annotated::{AnnotatedImage, CaptureMetadata};
use super::fingerprint::frame_fingerprint;
use super::options::CaptureOptions;
use super::overlay::{
    fit_address, format_capture_date, format_utc_timestamp, session_id_for, AccuracyBand,
};
use super::surface::{rgba, FrameSource, Rect, Stroke, Surface, TextAlign, TextStyle};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

const TOP_BAND_HEIGHT: f32 = 45.0;
const BOTTOM_BAND_HEIGHT: f32 = 85.0;
const TEXT_INSET: f32 = 10.0;

const WATERMARK_SIZE: f32 = 36.0;
const WATERMARK_MARGIN: f32 = 25.0;
const WATERMARK_PADDING: f32 = 12.0;
const WATERMARK_CORNER_RADIUS: f32 = 8.0;
const BADGE_RADIUS: f32 = 12.0;
const BADGE_GAP: f32 = 6.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WatermarkConfig {
    pub text: String,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            text: "MDNL".into(),
        }
    }
}

/// Composites a video frame with the GPS/time overlay and brand watermark.
#[derive(Debug, Clone, Default)]
pub struct Compositor {
    watermark: WatermarkConfig,
}

impl Compositor {
    pub fn new(watermark: WatermarkConfig) -> Self {
        Self { watermark }
    }

    pub fn capture(
        &self,
        frame_source: Option<&dyn FrameSource>,
        raster_target: Option<&mut dyn Surface>,
        location: Option<&LocationFix>,
        options: &CaptureOptions,
    ) -> Result<AnnotatedImage, CaptureError> {
        let result = self.capture_at(frame_source, raster_target, location, options, Utc::now());
        match &result {
            Ok(image) => log_info!(
                "capture #{} composited ({} bytes, location: {})",
                image.session_id(),
                image.encoded_bytes().len(),
                location.is_some()
            ),
            Err(err) => log_error!("capture failed: {err}"),
        }
        result
    }

    /// Same as [`Self::capture`] with an explicit capture instant.
    ///
    /// Either every overlay element is drawn and encoded or an error is
    /// returned; a half-drawn raster never leaves this function.
    pub fn capture_at(
        &self,
        frame_source: Option<&dyn FrameSource>,
        raster_target: Option<&mut dyn Surface>,
        location: Option<&LocationFix>,
        options: &CaptureOptions,
        now: DateTime<Utc>,
    ) -> Result<AnnotatedImage, CaptureError> {
        let source = frame_source.ok_or(CaptureError::Unavailable("no active video stream"))?;
        let surface = raster_target.ok_or(CaptureError::Unavailable("no raster target bound"))?;
        options.validate()?;
        let frame = source
            .current_frame()
            .ok_or(CaptureError::Unavailable("video stream has not produced a frame"))?;

        let (width, height) = (options.output_width, options.output_height);
        let scaled = if frame.dimensions() == (width, height) {
            frame.as_ref().clone()
        } else {
            imageops::resize(frame.as_ref(), width, height, FilterType::Triangle)
        };

        surface.reset(width, height);
        surface.draw_image(&scaled)?;

        let (w, h) = (width as f32, height as f32);
        draw_bands(surface, w, h, options.overlay_opacity)?;
        if options.show_grid_lines {
            draw_grid(surface, w, h)?;
        }

        let timestamp_utc = format_utc_timestamp(&now);
        if let Some(fix) = location {
            let formatted_date = format_capture_date(&now.with_timezone(&Local));
            draw_location(surface, w, h, fix, &formatted_date, &timestamp_utc)?;
        }

        self.draw_watermark(surface, w, h)?;

        let session_id = session_id_for(&now);
        surface.draw_text(
            &format!("#{session_id}"),
            w - 60.0,
            h - 5.0,
            &TextStyle::new(10.0, rgba(255, 255, 255, 0.6)).monospace(),
        )?;

        let encoded = surface.encode_jpeg(options.jpeg_quality_percent())?;
        if encoded.is_empty() {
            return Err(CaptureError::EncodingFailed("encoder produced no bytes".into()));
        }

        let fingerprint = options
            .compute_fingerprint
            .then(|| frame_fingerprint(&scaled));

        Ok(AnnotatedImage::new(
            encoded,
            CaptureMetadata {
                captured_at: now,
                timestamp_utc,
                session_id,
                width,
                height,
                source_location: location.cloned(),
                fingerprint,
                operator_id: None,
            },
        ))
    }

    fn draw_watermark(&self, surface: &mut dyn Surface, w: f32, h: f32) -> Result<(), CaptureError> {
        let white = rgba(255, 255, 255, 1.0);
        let style = TextStyle::new(WATERMARK_SIZE, rgba(255, 215, 0, 1.0))
            .bold()
            .outlined(rgba(0, 0, 0, 1.0), 2.0);

        let text = self.watermark.text.as_str();
        let text_width = surface.measure_text(text, &style)?;
        let text_right = w - WATERMARK_MARGIN - BADGE_GAP - 2.0 * BADGE_RADIUS;
        let text_x = text_right - text_width;
        let baseline = h - WATERMARK_MARGIN;

        let backdrop = Rect::new(
            text_x - WATERMARK_PADDING,
            baseline - WATERMARK_SIZE - WATERMARK_PADDING,
            text_width + 2.0 * WATERMARK_PADDING,
            WATERMARK_SIZE + 2.0 * WATERMARK_PADDING,
        );
        surface.fill_rounded_rect(backdrop, WATERMARK_CORNER_RADIUS, rgba(0, 0, 0, 0.85))?;
        surface.stroke_rounded_rect(
            backdrop,
            WATERMARK_CORNER_RADIUS,
            Stroke {
                color: white,
                width: 2.0,
            },
        )?;
        surface.draw_text(text, text_x, baseline, &style)?;

        // Verification badge, centred on the cap height of the mark.
        let cx = text_right + BADGE_GAP + BADGE_RADIUS;
        let cy = baseline - WATERMARK_SIZE * 0.35;
        surface.fill_circle((cx, cy), BADGE_RADIUS, rgba(34, 197, 94, 1.0))?;
        let tick = Stroke {
            color: white,
            width: 2.0,
        };
        surface.stroke_line((cx - 5.0, cy), (cx - 1.5, cy + 4.0), tick)?;
        surface.stroke_line((cx - 1.5, cy + 4.0), (cx + 5.5, cy - 4.5), tick)?;
        Ok(())
    }
}

fn draw_bands(surface: &mut dyn Surface, w: f32, h: f32, opacity: f32) -> Result<(), CaptureError> {
    let shade = rgba(0, 0, 0, opacity);
    surface.fill_rect(Rect::new(0.0, 0.0, w, TOP_BAND_HEIGHT), shade)?;
    surface.fill_rect(
        Rect::new(0.0, h - BOTTOM_BAND_HEIGHT, w, BOTTOM_BAND_HEIGHT),
        shade,
    )?;
    Ok(())
}

fn draw_grid(surface: &mut dyn Surface, w: f32, h: f32) -> Result<(), CaptureError> {
    let stroke = Stroke {
        color: rgba(255, 255, 255, 0.3),
        width: 1.0,
    };
    for i in 1..=2 {
        let x = w * i as f32 / 3.0;
        surface.stroke_line((x, 0.0), (x, h), stroke)?;
    }
    for i in 1..=2 {
        let y = h * i as f32 / 3.0;
        surface.stroke_line((0.0, y), (w, y), stroke)?;
    }
    Ok(())
}

fn draw_location(
    surface: &mut dyn Surface,
    w: f32,
    h: f32,
    fix: &LocationFix,
    formatted_date: &str,
    timestamp_utc: &str,
) -> Result<(), CaptureError> {
    let white = rgba(255, 255, 255, 1.0);
    let black = rgba(0, 0, 0, 1.0);
    let gps = TextStyle::new(16.0, white).bold().outlined(black, 2.0);

    surface.draw_text(&fix.latitude_label(), TEXT_INSET, 20.0, &gps)?;
    surface.draw_text(&fix.longitude_label(), TEXT_INSET, 38.0, &gps)?;

    if let (Some(accuracy), Some(label)) = (fix.accuracy_meters(), fix.accuracy_label()) {
        let style = TextStyle {
            fill: AccuracyBand::classify(accuracy).color(),
            ..gps
        }
        .aligned(TextAlign::Right);
        surface.draw_text(&label, w - 80.0, 20.0, &style)?;
    }

    surface.draw_text(
        formatted_date,
        TEXT_INSET,
        h - 55.0,
        &TextStyle::new(18.0, white).bold(),
    )?;

    if let Some(address) = fix.resolved_address() {
        let style = TextStyle::new(14.0, white);
        let line = fit_address(address, w - 2.0 * TEXT_INSET, |text| {
            surface.measure_text(text, &style)
        })?;
        surface.draw_text(&line, TEXT_INSET, h - 35.0, &style)?;
    }

    surface.draw_text(
        &format!("UTC: {timestamp_utc}"),
        TEXT_INSET,
        h - 15.0,
        &TextStyle::new(10.0, rgba(255, 255, 255, 0.8)),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::surface::{DrawOp, RecordingSurface};
    use chrono::TimeZone;
    use image::{Rgba, RgbaImage};
    use std::sync::Arc;

    struct StillFrame(Option<Arc<RgbaImage>>);

    impl FrameSource for StillFrame {
        fn current_frame(&self) -> Option<Arc<RgbaImage>> {
            self.0.clone()
        }
    }

    fn frame() -> StillFrame {
        StillFrame(Some(Arc::new(RgbaImage::from_pixel(
            320,
            240,
            Rgba([40, 90, 160, 255]),
        ))))
    }

    fn instant() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_709_284_512_345).unwrap()
    }

    fn fix(accuracy: Option<f64>, address: Option<&str>) -> LocationFix {
        let fix = LocationFix::new(1, 6.601838, 3.351486, accuracy, instant()).unwrap();
        match address {
            Some(address) => fix.with_address(address),
            None => fix,
        }
    }

    fn run(
        location: Option<&LocationFix>,
        options: &CaptureOptions,
    ) -> (Result<AnnotatedImage, CaptureError>, RecordingSurface) {
        let mut surface = RecordingSurface::new();
        let source = frame();
        let result = Compositor::default().capture_at(
            Some(&source),
            Some(&mut surface),
            location,
            options,
            instant(),
        );
        (result, surface)
    }

    #[test]
    fn missing_stream_or_target_is_capture_unavailable() {
        let compositor = Compositor::default();
        let options = CaptureOptions::default();
        let source = frame();
        let mut surface = RecordingSurface::new();

        let result = compositor.capture(None, None, None, &options);
        assert!(matches!(result, Err(CaptureError::Unavailable(_))));

        let result = compositor.capture(Some(&source), None, None, &options);
        assert!(matches!(result, Err(CaptureError::Unavailable(_))));

        let idle = StillFrame(None);
        let result = compositor.capture(Some(&idle), Some(&mut surface), None, &options);
        assert!(matches!(result, Err(CaptureError::Unavailable(_))));
        assert!(surface.ops().is_empty());
    }

    #[test]
    fn invalid_options_are_rejected_before_drawing() {
        let options = CaptureOptions::default().with_size(0, 10);
        let (result, surface) = run(None, &options);
        assert!(matches!(result, Err(CaptureError::InvalidOptions(_))));
        assert!(surface.ops().is_empty());
    }

    #[test]
    fn frame_is_scaled_to_output_size_and_bands_precede_text() {
        let options = CaptureOptions::default();
        let (result, surface) = run(Some(&fix(Some(5.0), None)), &options);
        let image = result.unwrap();
        assert_eq!((image.metadata().width, image.metadata().height), (800, 600));

        let ops = surface.ops();
        assert_eq!(ops[0], DrawOp::Reset { width: 800, height: 600 });
        assert_eq!(ops[1], DrawOp::Image { width: 800, height: 600 });
        assert_eq!(
            ops[2],
            DrawOp::FillRect {
                rect: Rect::new(0.0, 0.0, 800.0, 45.0),
                color: rgba(0, 0, 0, 0.6),
            }
        );
        assert_eq!(
            ops[3],
            DrawOp::FillRect {
                rect: Rect::new(0.0, 515.0, 800.0, 85.0),
                color: rgba(0, 0, 0, 0.6),
            }
        );
        let first_text = ops
            .iter()
            .position(|op| matches!(op, DrawOp::Text { .. }))
            .unwrap();
        assert!(first_text > 3);
    }

    #[test]
    fn grid_lines_follow_rule_of_thirds() {
        let options = CaptureOptions::default().with_size(600, 300);
        let (_, surface) = run(None, &options);
        let lines: Vec<_> = surface
            .ops()
            .iter()
            .filter_map(|op| match op {
                DrawOp::Line { from, to, stroke } if stroke.color == rgba(255, 255, 255, 0.3) => {
                    Some((*from, *to))
                }
                _ => None,
            })
            .collect();
        assert_eq!(
            lines,
            vec![
                ((200.0, 0.0), (200.0, 300.0)),
                ((400.0, 0.0), (400.0, 300.0)),
                ((0.0, 100.0), (600.0, 100.0)),
                ((0.0, 200.0), (600.0, 200.0)),
            ]
        );

        let mut no_grid = CaptureOptions::default();
        no_grid.show_grid_lines = false;
        let (_, surface) = run(None, &no_grid);
        assert!(!surface.ops().iter().any(
            |op| matches!(op, DrawOp::Line { stroke, .. } if stroke.color == rgba(255, 255, 255, 0.3))
        ));
    }

    #[test]
    fn location_capture_renders_gps_lines_and_watermark() {
        let location = fix(Some(30.0), Some("12 Allen Avenue, Ikeja"));
        let (result, surface) = run(Some(&location), &CaptureOptions::default());
        let image = result.unwrap();

        let texts = surface.texts();
        assert!(texts.contains(&"LAT: 6.601838°"));
        assert!(texts.contains(&"LNG: 3.351486°"));
        assert!(texts.contains(&"±30m"));
        assert!(texts.contains(&"12 Allen Avenue, Ikeja"));
        assert!(texts.contains(&"UTC: 2024-03-01T09:15:12.345Z"));
        assert!(texts.contains(&"MDNL"));
        assert!(texts.contains(&"#512345"));

        match surface.text_op("LAT:") {
            Some(DrawOp::Text { x, baseline, style, .. }) => {
                assert_eq!((*x, *baseline), (10.0, 20.0));
                assert!(style.bold);
                assert_eq!(style.stroke.map(|s| s.width), Some(2.0));
            }
            other => panic!("unexpected op {other:?}"),
        }
        match surface.text_op("±") {
            Some(DrawOp::Text { x, style, .. }) => {
                assert_eq!(*x, 720.0);
                assert_eq!(style.align, TextAlign::Right);
                assert_eq!(style.fill, AccuracyBand::Fair.color());
            }
            other => panic!("unexpected op {other:?}"),
        }

        assert_eq!(image.session_id(), "512345");
        assert_eq!(image.timestamp_utc(), "2024-03-01T09:15:12.345Z");
        assert_eq!(image.source_location(), Some(&location));
        assert!(image.metadata().fingerprint.is_some());
    }

    #[test]
    fn locationless_capture_keeps_bands_and_watermark_only() {
        let (result, surface) = run(None, &CaptureOptions::default());
        let image = result.unwrap();
        assert_eq!(surface.texts(), vec!["MDNL", "#512345"]);

        let bands = surface
            .ops()
            .iter()
            .filter(|op| matches!(op, DrawOp::FillRect { .. }))
            .count();
        assert_eq!(bands, 2);
        assert!(image.source_location().is_none());
    }

    #[test]
    fn long_address_is_truncated_to_fit() {
        let address = "12 Allen Avenue, Ikeja, Lagos, Nigeria";
        let options = CaptureOptions::default().with_size(200, 300);
        let (_, surface) = run(Some(&fix(None, Some(address))), &options);
        assert!(surface.texts().contains(&"12 Allen Avenue, Ikeja…"));
        assert!(surface.text_op("±").is_none());
    }

    #[test]
    fn watermark_sits_bottom_right_with_badge() {
        let (_, surface) = run(None, &CaptureOptions::default());
        // Recording metrics: 4 chars * 36 * 0.6 = 86.4 px wide.
        let text_right = 800.0 - 25.0 - 30.0;
        match surface.text_op("MDNL") {
            Some(DrawOp::Text { x, baseline, style, .. }) => {
                assert!((x - (text_right - 86.4)).abs() < 1e-3);
                assert_eq!(*baseline, 575.0);
                assert_eq!(style.fill, Rgba([255, 215, 0, 255]));
            }
            other => panic!("unexpected op {other:?}"),
        }
        assert!(surface.ops().iter().any(|op| matches!(
            op,
            DrawOp::FillRoundedRect { color, .. } if *color == rgba(0, 0, 0, 0.85)
        )));
        assert!(surface.ops().iter().any(|op| matches!(
            op,
            DrawOp::Circle { center, radius, .. } if *radius == 12.0 && center.0 == text_right + 18.0
        )));
    }

    #[test]
    fn any_draw_failure_aborts_the_capture() {
        let source = frame();
        for budget in [0, 3, 6] {
            let mut surface = RecordingSurface::failing_after(budget);
            let result = Compositor::default().capture_at(
                Some(&source),
                Some(&mut surface),
                Some(&fix(Some(5.0), Some("Ikeja"))),
                &CaptureOptions::default(),
                instant(),
            );
            assert!(matches!(result, Err(CaptureError::EncodingFailed(_))));
        }
    }

    #[test]
    fn custom_watermark_text_is_used() {
        let compositor = Compositor::new(WatermarkConfig {
            text: "ACME".into(),
        });
        let source = frame();
        let mut surface = RecordingSurface::new();
        compositor
            .capture_at(
                Some(&source),
                Some(&mut surface),
                None,
                &CaptureOptions::default(),
                instant(),
            )
            .unwrap();
        assert!(surface.texts().contains(&"ACME"));
    }
}

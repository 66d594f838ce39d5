//! Text and colour rules for the information overlay.
//!
//! Everything here is pure so the compositor stays a thin sequence of draw calls.

use std::fmt::Display;

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use image::Rgba;

use super::surface::rgba;

/// Hard cut used when an address has no comma to split on.
pub const ADDRESS_MAX_CHARS: usize = 45;
const ELLIPSIS: char = '…';

/// Human-readable capture time, `DD-MM-YYYY, HH:MM:SS` in 24-hour form.
pub fn format_capture_date<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    at.format("%d-%m-%Y, %H:%M:%S").to_string()
}

/// ISO-8601 UTC instant with millisecond precision (`2024-03-01T09:15:00.000Z`).
pub fn format_utc_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Last six digits of the epoch-millisecond value of `at`.
pub fn session_id_for(at: &DateTime<Utc>) -> String {
    format!("{:06}", at.timestamp_millis().rem_euclid(1_000_000))
}

/// Accuracy readout colour class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccuracyBand {
    /// Under 10 m.
    Good,
    /// Under 50 m.
    Fair,
    Poor,
}

impl AccuracyBand {
    pub fn classify(accuracy_meters: f64) -> Self {
        if accuracy_meters < 10.0 {
            AccuracyBand::Good
        } else if accuracy_meters < 50.0 {
            AccuracyBand::Fair
        } else {
            AccuracyBand::Poor
        }
    }

    pub fn color(self) -> Rgba<u8> {
        match self {
            AccuracyBand::Good => rgba(0, 255, 0, 1.0),
            AccuracyBand::Fair => rgba(255, 255, 0, 1.0),
            AccuracyBand::Poor => rgba(255, 165, 0, 1.0),
        }
    }
}

/// Shorten an address that does not fit on one line.
///
/// Keeps the first two comma-separated segments when there are at least two,
/// otherwise cuts at [`ADDRESS_MAX_CHARS`] characters.
pub fn truncate_address(address: &str) -> String {
    let segments: Vec<&str> = address.split(',').collect();
    let mut shortened = if segments.len() >= 2 {
        segments[..2].join(",")
    } else {
        address.chars().take(ADDRESS_MAX_CHARS).collect()
    };
    shortened.push(ELLIPSIS);
    shortened
}

/// Return `address` unchanged when it renders within `max_width`, else its
/// truncated form.
pub fn fit_address<E>(
    address: &str,
    max_width: f32,
    measure: impl FnOnce(&str) -> Result<f32, E>,
) -> Result<String, E> {
    if measure(address)? > max_width {
        Ok(truncate_address(address))
    } else {
        Ok(address.to_string())
    }
}

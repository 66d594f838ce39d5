use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LocationError;

/// A single resolved latitude/longitude/accuracy reading.
///
/// Fixes are never mutated in place: address enrichment produces a new value
/// via [`LocationFix::with_address`] that keeps the same `fix_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationFix {
    fix_id: u64,
    latitude: f64,
    longitude: f64,
    accuracy_meters: Option<f64>,
    resolved_address: Option<String>,
    acquired_at: DateTime<Utc>,
}

impl LocationFix {
    pub fn new(
        fix_id: u64,
        latitude: f64,
        longitude: f64,
        accuracy_meters: Option<f64>,
        acquired_at: DateTime<Utc>,
    ) -> Result<Self, LocationError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(LocationError::PositionUnavailable(format!(
                "latitude {latitude} out of range"
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(LocationError::PositionUnavailable(format!(
                "longitude {longitude} out of range"
            )));
        }
        // Hosts report unknown accuracy in a few odd ways; treat them all as absent.
        let accuracy_meters = accuracy_meters.filter(|acc| acc.is_finite() && *acc >= 0.0);

        Ok(Self {
            fix_id,
            latitude,
            longitude,
            accuracy_meters,
            resolved_address: None,
            acquired_at,
        })
    }

    pub fn with_address(&self, address: impl Into<String>) -> Self {
        Self {
            resolved_address: Some(address.into()),
            ..self.clone()
        }
    }

    pub fn fix_id(&self) -> u64 {
        self.fix_id
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn accuracy_meters(&self) -> Option<f64> {
        self.accuracy_meters
    }

    pub fn resolved_address(&self) -> Option<&str> {
        self.resolved_address.as_deref()
    }

    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }

    /// Same reading as `other`, possibly differing only in enrichment.
    pub fn is_same_reading(&self, other: &LocationFix) -> bool {
        self.fix_id == other.fix_id
    }

    pub fn latitude_label(&self) -> String {
        format!("LAT: {:.6}°", self.latitude)
    }

    pub fn longitude_label(&self) -> String {
        format!("LNG: {:.6}°", self.longitude)
    }

    pub fn accuracy_label(&self) -> Option<String> {
        self.accuracy_meters.map(|acc| format!("±{acc:.0}m"))
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::location::LocationFix;

use super::fingerprint::{fingerprint_distance, NEAR_DUPLICATE_THRESHOLD};

/// Output of one compositing call. The pipeline keeps no reference to it.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedImage {
    encoded_bytes: Vec<u8>,
    metadata: CaptureMetadata,
}

/// Everything about a capture except the pixels; serializes to the sidecar
/// record uploaded next to the image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureMetadata {
    pub captured_at: DateTime<Utc>,
    pub timestamp_utc: String,
    pub session_id: String,
    pub width: u32,
    pub height: u32,
    pub source_location: Option<LocationFix>,
    pub fingerprint: Option<String>,
    pub operator_id: Option<String>,
}

impl AnnotatedImage {
    pub(crate) fn new(encoded_bytes: Vec<u8>, metadata: CaptureMetadata) -> Self {
        Self {
            encoded_bytes,
            metadata,
        }
    }

    pub fn encoded_bytes(&self) -> &[u8] {
        &self.encoded_bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.encoded_bytes
    }

    pub fn mime_type(&self) -> &'static str {
        "image/jpeg"
    }

    pub fn metadata(&self) -> &CaptureMetadata {
        &self.metadata
    }

    pub fn timestamp_utc(&self) -> &str {
        &self.metadata.timestamp_utc
    }

    pub fn session_id(&self) -> &str {
        &self.metadata.session_id
    }

    pub fn source_location(&self) -> Option<&LocationFix> {
        self.metadata.source_location.as_ref()
    }

    pub fn with_operator(mut self, operator_id: impl Into<String>) -> Self {
        self.metadata.operator_id = Some(operator_id.into());
        self
    }

    /// Suggested download name, e.g. `capture_20240301_091507_512345.jpg`.
    pub fn file_name(&self) -> String {
        format!(
            "capture_{}_{}.jpg",
            self.metadata.captured_at.format("%Y%m%d_%H%M%S"),
            self.metadata.session_id
        )
    }

    /// Whether both captures show the same scene, judged by their source
    /// frame fingerprints. Captures without fingerprints never match.
    pub fn is_near_duplicate(&self, other: &AnnotatedImage) -> bool {
        match (&self.metadata.fingerprint, &other.metadata.fingerprint) {
            (Some(lhs), Some(rhs)) => fingerprint_distance(lhs, rhs) <= NEAR_DUPLICATE_THRESHOLD,
            _ => false,
        }
    }
}

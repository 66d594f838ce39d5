use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Parameters handed to the host positioning capability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PositionRequest {
    pub high_accuracy: bool,
    pub timeout_ms: u64,
    /// Oldest cached reading the host may answer with.
    pub maximum_age_ms: u64,
}

impl Default for PositionRequest {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout_ms: 15_000,
            maximum_age_ms: 30_000,
        }
    }
}

impl PositionRequest {
    pub const MAX_TIMEOUT_MS: u64 = 5 * 60 * 1000;
    pub const MAX_MAXIMUM_AGE_MS: u64 = 24 * 60 * 60 * 1000;

    pub fn new(timeout_ms: u64, high_accuracy: bool) -> Self {
        Self {
            high_accuracy,
            timeout_ms,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::new("location.timeoutMs", "must be positive"));
        }
        if self.timeout_ms > Self::MAX_TIMEOUT_MS {
            return Err(ConfigError::new(
                "location.timeoutMs",
                format!("must not exceed {}", Self::MAX_TIMEOUT_MS),
            ));
        }
        if self.maximum_age_ms > Self::MAX_MAXIMUM_AGE_MS {
            return Err(ConfigError::new(
                "location.maximumAgeMs",
                format!("must not exceed {}", Self::MAX_MAXIMUM_AGE_MS),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn maximum_age(&self) -> Duration {
        Duration::from_millis(self.maximum_age_ms)
    }
}

/// Raw reading as reported by the host, before range validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawPosition {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_meters: Option<f64>,
}

/// The three standard failure codes of a host positioning API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PositionErrorCode {
    PermissionDenied,
    PositionUnavailable,
    Timeout,
}

/// Host positioning capability (GPS receiver, OS location service, browser bridge).
pub trait PositionProvider: Send + Sync {
    /// `false` when the host has no positioning capability at all.
    fn is_available(&self) -> bool;

    fn current_position(
        &self,
        request: &PositionRequest,
    ) -> impl Future<Output = Result<RawPosition, PositionErrorCode>> + Send;
}

/// Provider answering with a configured reading, for fixed installations and
/// for replaying known positions.
#[derive(Debug, Clone)]
pub struct StaticPositionProvider {
    outcome: Option<Result<RawPosition, PositionErrorCode>>,
    latency: Duration,
}

impl StaticPositionProvider {
    pub fn at(latitude: f64, longitude: f64, accuracy_meters: Option<f64>) -> Self {
        Self {
            outcome: Some(Ok(RawPosition {
                latitude,
                longitude,
                accuracy_meters,
            })),
            latency: Duration::ZERO,
        }
    }

    pub fn failing(code: PositionErrorCode) -> Self {
        Self {
            outcome: Some(Err(code)),
            latency: Duration::ZERO,
        }
    }

    /// A host without any positioning capability.
    pub fn unsupported() -> Self {
        Self {
            outcome: None,
            latency: Duration::ZERO,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

impl PositionProvider for StaticPositionProvider {
    fn is_available(&self) -> bool {
        self.outcome.is_some()
    }

    async fn current_position(
        &self,
        request: &PositionRequest,
    ) -> Result<RawPosition, PositionErrorCode> {
        if !self.latency.is_zero() {
            if self.latency > request.timeout() {
                tokio::time::sleep(request.timeout()).await;
                return Err(PositionErrorCode::Timeout);
            }
            tokio::time::sleep(self.latency).await;
        }
        self.outcome
            .unwrap_or(Err(PositionErrorCode::PositionUnavailable))
    }
}

use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeocoderConfig {
    pub enabled: bool,
    pub endpoint: String,
    /// Sent as `User-Agent`; public geocoders reject anonymous clients.
    pub user_agent: String,
    pub timeout_ms: u64,
    pub result_limit: u32,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://nominatim.openstreetmap.org/reverse".into(),
            user_agent: concat!("FieldCam/", env!("CARGO_PKG_VERSION")).into(),
            timeout_ms: 8_000,
            result_limit: 1,
        }
    }
}

/// Coordinate to human-readable address lookup.
///
/// `Ok(None)` means the service answered but had no name for the spot.
pub trait ReverseGeocoder: Send + Sync + 'static {
    fn reverse(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> impl Future<Output = Result<Option<String>>> + Send;
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    display_name: Option<String>,
}

/// Extract the display name from a reverse-geocode JSON body.
pub fn parse_display_name(body: &str) -> Result<Option<String>> {
    let response: ReverseResponse =
        serde_json::from_str(body).context("malformed reverse geocode response")?;
    Ok(response
        .display_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty()))
}

/// Nominatim-compatible HTTP reverse geocoder.
#[derive(Clone)]
pub struct NominatimGeocoder {
    agent: ureq::Agent,
    endpoint: String,
    result_limit: u32,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocoderConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(&config.user_agent)
            .build();

        Self {
            agent,
            endpoint: config.endpoint.clone(),
            result_limit: config.result_limit.max(1),
        }
    }

    /// `None` when reverse geocoding is switched off.
    pub fn from_config(config: &GeocoderConfig) -> Option<Self> {
        config.enabled.then(|| Self::new(config))
    }

    fn lookup_blocking(&self, latitude: f64, longitude: f64) -> Result<Option<String>> {
        let response = self
            .agent
            .get(&self.endpoint)
            .query("lat", &latitude.to_string())
            .query("lon", &longitude.to_string())
            .query("format", "json")
            .query("limit", &self.result_limit.to_string())
            .call()
            .map_err(|err| match err {
                ureq::Error::Status(code, _) => anyhow!("reverse geocode returned HTTP {code}"),
                other => anyhow!("reverse geocode request failed: {other}"),
            })?;

        let body = response
            .into_string()
            .context("failed to read reverse geocode body")?;
        parse_display_name(&body)
    }
}

impl ReverseGeocoder for NominatimGeocoder {
    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<Option<String>> {
        let geocoder = self.clone();
        tokio::task::spawn_blocking(move || geocoder.lookup_blocking(latitude, longitude))
            .await
            .context("reverse geocode worker join failed")?
    }
}

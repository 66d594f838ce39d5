use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::LocationError;

use super::fix::LocationFix;
use super::geocode::ReverseGeocoder;
use super::provider::{PositionErrorCode, PositionProvider, PositionRequest};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Extra time granted to the host before our own guard declares a timeout.
const PROVIDER_GRACE: Duration = Duration::from_millis(500);

/// Acquires location fixes and enriches them with a street address.
///
/// The latest fix lives in a single watch slot. Address lookups run in the
/// background and only land in the slot if the fix they were issued for is
/// still the current one. Each request reserves its `fix_id` when it starts,
/// so a slow request never replaces the result of a later one.
pub struct LocationService<P, G> {
    provider: P,
    geocoder: Option<Arc<G>>,
    defaults: PositionRequest,
    current: Arc<watch::Sender<Option<LocationFix>>>,
    next_fix_id: AtomicU64,
    /// Requests started before the last shutdown may not publish.
    retired_below: AtomicU64,
    cancel_token: Mutex<CancellationToken>,
}

impl<P, G> LocationService<P, G>
where
    P: PositionProvider,
    G: ReverseGeocoder,
{
    pub fn new(provider: P, geocoder: Option<G>, defaults: PositionRequest) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            provider,
            geocoder: geocoder.map(Arc::new),
            defaults,
            current: Arc::new(tx),
            next_fix_id: AtomicU64::new(1),
            retired_below: AtomicU64::new(0),
            cancel_token: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn defaults(&self) -> &PositionRequest {
        &self.defaults
    }

    pub fn has_geocoder(&self) -> bool {
        self.geocoder.is_some()
    }

    /// Latest published fix, enriched if its lookup already finished.
    pub fn current(&self) -> Option<LocationFix> {
        self.current.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<LocationFix>> {
        self.current.subscribe()
    }

    /// Acquire with the configured defaults.
    pub async fn acquire(&self) -> Result<LocationFix, LocationError> {
        self.acquire_with(self.defaults).await
    }

    /// Acquire a fresh fix and start a background address lookup for it.
    ///
    /// The returned fix never carries an address; the enriched copy shows up
    /// through [`Self::current`] / [`Self::subscribe`]. A fix superseded by a
    /// later request is returned to its caller but neither published nor
    /// enriched.
    pub async fn acquire_with(&self, request: PositionRequest) -> Result<LocationFix, LocationError> {
        let fix = self.fetch_fix(&request).await?;
        if self.publish(fix.clone()) {
            self.spawn_enrichment(fix.clone());
        }
        Ok(fix)
    }

    /// Acquire a fix and wait for its address lookup before returning.
    ///
    /// Lookup failures are swallowed: the fix is returned without an address.
    pub async fn acquire_enriched(&self) -> Result<LocationFix, LocationError> {
        let fix = self.fetch_fix(&self.defaults).await?;
        if !self.publish(fix.clone()) {
            return Ok(fix);
        }

        let Some(geocoder) = self.geocoder.clone() else {
            return Ok(fix);
        };

        match lookup_address(geocoder.as_ref(), &fix).await {
            Some(address) => {
                let enriched = fix.with_address(address);
                publish_if_current(&self.current, enriched.clone());
                Ok(enriched)
            }
            None => Ok(fix),
        }
    }

    /// Drop the current fix and abandon in-flight lookups and requests.
    ///
    /// The service stays usable; later acquisitions enrich as usual.
    pub fn shutdown(&self) {
        let fresh = CancellationToken::new();
        let previous = std::mem::replace(&mut *self.cancel_guard(), fresh);
        previous.cancel();
        self.retired_below
            .fetch_max(self.next_fix_id.load(Ordering::SeqCst), Ordering::SeqCst);
        self.current.send_replace(None);
        log_info!("location service shut down");
    }

    async fn fetch_fix(&self, request: &PositionRequest) -> Result<LocationFix, LocationError> {
        if !self.provider.is_available() {
            return Err(LocationError::Unavailable);
        }

        let fix_id = self.next_fix_id.fetch_add(1, Ordering::SeqCst);
        let guard = request.timeout() + PROVIDER_GRACE;
        let raw = match tokio::time::timeout(guard, self.provider.current_position(request)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(code)) => return Err(map_error_code(code)),
            Err(_) => {
                log_warn!("positioning host did not answer within {:?}", guard);
                return Err(LocationError::Timeout);
            }
        };

        let fix = LocationFix::new(
            fix_id,
            raw.latitude,
            raw.longitude,
            raw.accuracy_meters,
            Utc::now(),
        )?;

        log_info!(
            "location fix #{} acquired (accuracy: {:?}m)",
            fix.fix_id(),
            fix.accuracy_meters()
        );
        log_debug!("fix #{} at {}, {}", fix.fix_id(), fix.latitude(), fix.longitude());
        Ok(fix)
    }

    /// Store `fix` unless a later request already published or the service
    /// was shut down after this request started.
    fn publish(&self, fix: LocationFix) -> bool {
        if fix.fix_id() < self.retired_below.load(Ordering::SeqCst) {
            log_debug!("fix #{} arrived after shutdown; dropped", fix.fix_id());
            return false;
        }
        let published = self.current.send_if_modified(|current| match current {
            Some(existing) if existing.fix_id() >= fix.fix_id() => false,
            _ => {
                *current = Some(fix.clone());
                true
            }
        });
        if !published {
            log_debug!("fix #{} superseded by a later request", fix.fix_id());
        }
        published
    }

    fn cancel_guard(&self) -> std::sync::MutexGuard<'_, CancellationToken> {
        self.cancel_token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn spawn_enrichment(&self, fix: LocationFix) {
        let Some(geocoder) = self.geocoder.clone() else {
            return;
        };
        let slot = Arc::clone(&self.current);
        let cancel_token = self.cancel_guard().clone();

        tokio::spawn(async move {
            tokio::select! {
                address = lookup_address(geocoder.as_ref(), &fix) => {
                    if let Some(address) = address {
                        publish_if_current(&slot, fix.with_address(address));
                    }
                }
                _ = cancel_token.cancelled() => {
                    log_debug!("address lookup for fix #{} abandoned", fix.fix_id());
                }
            }
        });
    }
}

async fn lookup_address<G: ReverseGeocoder>(geocoder: &G, fix: &LocationFix) -> Option<String> {
    match geocoder.reverse(fix.latitude(), fix.longitude()).await {
        Ok(address) => address,
        Err(err) => {
            log_warn!("reverse geocode failed for fix #{}: {err:#}", fix.fix_id());
            None
        }
    }
}

/// Replace the slot with `enriched` only while it still holds the same reading.
fn publish_if_current(slot: &watch::Sender<Option<LocationFix>>, enriched: LocationFix) -> bool {
    slot.send_if_modified(|current| match current {
        Some(existing) if existing.is_same_reading(&enriched) => {
            *current = Some(enriched.clone());
            true
        }
        _ => {
            log_debug!("discarding stale address for fix #{}", enriched.fix_id());
            false
        }
    })
}

fn map_error_code(code: PositionErrorCode) -> LocationError {
    match code {
        PositionErrorCode::PermissionDenied => LocationError::PermissionDenied,
        PositionErrorCode::PositionUnavailable => {
            LocationError::PositionUnavailable("the positioning host reported no fix".into())
        }
        PositionErrorCode::Timeout => LocationError::Timeout,
    }
}

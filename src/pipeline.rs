use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use crate::{
    auth::AuthContext,
    camera::{CameraConfig, CameraDevice, CameraSession, SessionState},
    capture::{AnnotatedImage, CaptureOptions, Compositor, FontSet, ImageSurface, Surface},
    config::PipelineConfig,
    error::{CameraError, CaptureError, ConfigError, LocationError},
    location::{LocationFix, LocationService, NominatimGeocoder, PositionProvider, ReverseGeocoder},
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

/// Camera, location and compositor wired together for one capture screen.
///
/// Clones share the same session, location slot and raster target.
pub struct CapturePipeline<D: CameraDevice, P, G, S> {
    location: Arc<LocationService<P, G>>,
    camera: Arc<Mutex<CameraSession<D>>>,
    surface: Arc<Mutex<S>>,
    compositor: Compositor,
    options: CaptureOptions,
    camera_config: CameraConfig,
    auth: Option<Arc<AuthContext>>,
}

impl<D: CameraDevice, P, G, S> Clone for CapturePipeline<D, P, G, S> {
    fn clone(&self) -> Self {
        Self {
            location: Arc::clone(&self.location),
            camera: Arc::clone(&self.camera),
            surface: Arc::clone(&self.surface),
            compositor: self.compositor.clone(),
            options: self.options.clone(),
            camera_config: self.camera_config.clone(),
            auth: self.auth.clone(),
        }
    }
}

impl<D, P, G, S> CapturePipeline<D, P, G, S>
where
    D: CameraDevice + 'static,
    P: PositionProvider,
    G: ReverseGeocoder,
    S: Surface + 'static,
{
    pub fn new(
        device: D,
        provider: P,
        geocoder: Option<G>,
        surface: S,
        config: &PipelineConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let session =
            CameraSession::new(device).require_location_fix(config.camera.require_location_fix);

        Ok(Self {
            location: Arc::new(LocationService::new(provider, geocoder, config.location)),
            camera: Arc::new(Mutex::new(session)),
            surface: Arc::new(Mutex::new(surface)),
            compositor: Compositor::new(config.watermark.clone()),
            options: config.capture.clone(),
            camera_config: config.camera.clone(),
            auth: None,
        })
    }

    /// Stamp captures with the signed-in operator of `auth`.
    pub fn with_auth(mut self, auth: Arc<AuthContext>) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn options(&self) -> &CaptureOptions {
        &self.options
    }

    pub fn geocoding_enabled(&self) -> bool {
        self.location.has_geocoder()
    }

    pub async fn start_camera(&self) -> Result<(), CameraError> {
        let constraints = self.camera_config.constraints();
        let mut camera = self.camera.lock().await;
        camera.start_with(constraints).await.map_err(|err| {
            log_error!("camera start failed: {err}");
            err
        })
    }

    pub async fn stop_camera(&self) {
        self.camera.lock().await.stop().await;
    }

    pub async fn camera_state(&self) -> SessionState {
        self.camera.lock().await.state()
    }

    /// Acquire a fresh fix; its address arrives later through
    /// [`Self::subscribe_location`].
    pub async fn locate(&self) -> Result<LocationFix, LocationError> {
        self.location.acquire().await
    }

    pub fn current_location(&self) -> Option<LocationFix> {
        self.location.current()
    }

    pub fn subscribe_location(&self) -> watch::Receiver<Option<LocationFix>> {
        self.location.subscribe()
    }

    /// Composite the live frame with whatever fix is current right now.
    ///
    /// An address lookup finishing after this call does not alter the result.
    /// Rasterizing and encoding run on the blocking pool.
    pub async fn capture(&self) -> Result<AnnotatedImage, CaptureError> {
        let location = self.location.current();

        let camera = Arc::clone(&self.camera).lock_owned().await;
        let mut surface = Arc::clone(&self.surface).lock_owned().await;
        let compositor = self.compositor.clone();
        let options = self.options.clone();

        let image = tokio::task::spawn_blocking(move || {
            camera.capture(&compositor, Some(&mut *surface), location.as_ref(), &options)
        })
        .await
        .map_err(|err| CaptureError::EncodingFailed(format!("compositing task failed: {err}")))??;

        let image = match self.auth.as_ref().and_then(|auth| auth.operator_id()) {
            Some(operator) => image.with_operator(operator),
            None => image,
        };
        log_info!(
            "capture {} ready ({} bytes)",
            image.file_name(),
            image.encoded_bytes().len()
        );
        Ok(image)
    }

    /// Release the camera and forget the location fix.
    pub async fn shutdown(&self) {
        self.stop_camera().await;
        self.location.shutdown();
        log_info!("capture pipeline shut down");
    }
}

impl<D, P> CapturePipeline<D, P, NominatimGeocoder, ImageSurface>
where
    D: CameraDevice + 'static,
    P: PositionProvider,
{
    /// Build the geocoder and raster surface from `config` as well, honouring
    /// `geocoder.enabled` and the configured font paths.
    pub fn from_config(device: D, provider: P, config: &PipelineConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let fonts = FontSet::load(&config.fonts)?;
        let geocoder = NominatimGeocoder::from_config(&config.geocoder);
        if geocoder.is_none() {
            log_info!("reverse geocoding disabled by configuration");
        }
        Ok(Self::new(device, provider, geocoder, ImageSurface::new(fonts), config)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Credential;
    use crate::camera::StillImageDevice;
    use crate::capture::RecordingSurface;
    use crate::location::{NominatimGeocoder, PositionErrorCode, StaticPositionProvider};
    use chrono::{Duration, Utc};
    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    type TestPipeline =
        CapturePipeline<StillImageDevice, StaticPositionProvider, NominatimGeocoder, RecordingSurface>;

    fn pipeline(provider: StaticPositionProvider, config: &PipelineConfig) -> TestPipeline {
        let device = StillImageDevice::new(RgbaImage::from_pixel(320, 240, Rgba([90, 120, 60, 255])));
        CapturePipeline::new(device, provider, None, RecordingSurface::new(), config).unwrap()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = PipelineConfig::default();
        config.capture.output_width = 0;
        let device = StillImageDevice::new(RgbaImage::new(2, 2));
        let result: Result<TestPipeline, _> = CapturePipeline::new(
            device,
            StaticPositionProvider::unsupported(),
            None,
            RecordingSurface::new(),
            &config,
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn capture_requires_fix_by_default() {
        let pipeline = pipeline(
            StaticPositionProvider::at(6.5244, 3.3792, Some(8.0)),
            &PipelineConfig::default(),
        );
        pipeline.start_camera().await.unwrap();
        assert_eq!(pipeline.capture().await.unwrap_err(), CaptureError::LocationPending);

        let fix = pipeline.locate().await.unwrap();
        let image = pipeline.capture().await.unwrap();
        assert_eq!(image.source_location(), Some(&fix));
        assert_eq!(image.metadata().width, 800);
        assert_eq!(image.metadata().operator_id, None);
    }

    #[tokio::test]
    async fn location_failure_still_allows_capture_when_not_required() {
        let mut config = PipelineConfig::default();
        config.camera.require_location_fix = false;
        let pipeline = pipeline(
            StaticPositionProvider::failing(PositionErrorCode::PermissionDenied),
            &config,
        );
        pipeline.start_camera().await.unwrap();

        assert_eq!(pipeline.locate().await.unwrap_err(), LocationError::PermissionDenied);
        let image = pipeline.capture().await.unwrap();
        assert!(image.source_location().is_none());
    }

    #[tokio::test]
    async fn capture_is_stamped_with_operator() {
        let dir = TempDir::new().unwrap();
        let auth = Arc::new(AuthContext::load(dir.path().join("credential.json")).unwrap());
        auth.sign_in(Credential {
            token: "t".into(),
            user_id: "surveyor-7".into(),
            display_name: None,
            expires_at: Utc::now() + Duration::hours(1),
        })
        .unwrap();

        let pipeline = pipeline(
            StaticPositionProvider::at(1.0, 2.0, None),
            &PipelineConfig::default(),
        )
        .with_auth(Arc::clone(&auth));
        pipeline.start_camera().await.unwrap();
        pipeline.locate().await.unwrap();

        let image = pipeline.capture().await.unwrap();
        assert_eq!(image.metadata().operator_id.as_deref(), Some("surveyor-7"));

        auth.sign_out().unwrap();
        let image = pipeline.capture().await.unwrap();
        assert_eq!(image.metadata().operator_id, None);
    }

    #[tokio::test]
    async fn shutdown_releases_camera_and_fix() {
        let pipeline = pipeline(
            StaticPositionProvider::at(1.0, 2.0, Some(3.0)),
            &PipelineConfig::default(),
        );
        let other_handle = pipeline.clone();
        pipeline.start_camera().await.unwrap();
        pipeline.locate().await.unwrap();
        assert_eq!(other_handle.camera_state().await, SessionState::Streaming);

        other_handle.shutdown().await;
        assert_eq!(pipeline.camera_state().await, SessionState::Idle);
        assert!(pipeline.current_location().is_none());
        assert!(matches!(
            pipeline.capture().await,
            Err(CaptureError::LocationPending)
        ));
    }

    #[test]
    fn from_config_honours_font_paths() {
        let mut config = PipelineConfig::default();
        config.fonts.regular = Some("/no/such/font.ttf".into());
        let result = CapturePipeline::from_config(
            StillImageDevice::new(RgbaImage::new(2, 2)),
            StaticPositionProvider::unsupported(),
            &config,
        );
        assert!(result.is_err());
    }

    #[test]
    fn from_config_honours_geocoder_switch() {
        if FontSet::load(&crate::capture::FontConfig::default()).is_err() {
            return;
        }
        let device = || StillImageDevice::new(RgbaImage::new(2, 2));

        let enabled = CapturePipeline::from_config(
            device(),
            StaticPositionProvider::unsupported(),
            &PipelineConfig::default(),
        )
        .unwrap();
        assert!(enabled.geocoding_enabled());

        let mut config = PipelineConfig::default();
        config.geocoder.enabled = false;
        let disabled =
            CapturePipeline::from_config(device(), StaticPositionProvider::unsupported(), &config)
                .unwrap();
        assert!(!disabled.geocoding_enabled());
    }
}

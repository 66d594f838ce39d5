use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::camera::CameraConfig;
use crate::capture::{CaptureOptions, FontConfig, WatermarkConfig};
use crate::error::ConfigError;
use crate::location::{GeocoderConfig, PositionRequest};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Environment variable naming an alternate config file.
pub const CONFIG_PATH_ENV: &str = "FIELDCAM_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    pub capture: CaptureOptions,
    pub location: PositionRequest,
    pub geocoder: GeocoderConfig,
    pub camera: CameraConfig,
    pub watermark: WatermarkConfig,
    pub fonts: FontConfig,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.capture.validate()?;
        self.location.validate()?;
        if self.geocoder.enabled {
            if self.geocoder.timeout_ms == 0 {
                return Err(ConfigError::new("geocoder.timeoutMs", "must be positive"));
            }
            if self.geocoder.endpoint.trim().is_empty() {
                return Err(ConfigError::new("geocoder.endpoint", "must not be empty"));
            }
        }
        if self.camera.ideal_width == 0 || self.camera.ideal_height == 0 {
            return Err(ConfigError::new("camera", "ideal dimensions must be positive"));
        }
        Ok(())
    }
}

pub struct ConfigStore {
    path: PathBuf,
    data: RwLock<PipelineConfig>,
}

impl ConfigStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            parse_or_default(&path, &contents)
        } else {
            PipelineConfig::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Open the store at `$FIELDCAM_CONFIG`, or at `default_path` when unset.
    pub fn from_env(default_path: impl Into<PathBuf>) -> Result<Self> {
        let path = env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| default_path.into());
        log_info!("using config file {}", path.display());
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> PipelineConfig {
        self.read().clone()
    }

    pub fn capture(&self) -> CaptureOptions {
        self.read().capture.clone()
    }

    pub fn update_capture(&self, options: CaptureOptions) -> Result<()> {
        options.validate()?;
        self.update(|config| config.capture = options)
    }

    pub fn update_location(&self, request: PositionRequest) -> Result<()> {
        request.validate()?;
        self.update(|config| config.location = request)
    }

    pub fn update_geocoder(&self, geocoder: GeocoderConfig) -> Result<()> {
        self.update(|config| config.geocoder = geocoder)
    }

    pub fn update_camera(&self, camera: CameraConfig) -> Result<()> {
        self.update(|config| config.camera = camera)
    }

    pub fn update_watermark(&self, watermark: WatermarkConfig) -> Result<()> {
        self.update(|config| config.watermark = watermark)
    }

    /// Apply `change`, validate the result and persist it. Nothing is kept
    /// when validation fails.
    fn update(&self, change: impl FnOnce(&mut PipelineConfig)) -> Result<()> {
        let mut guard = self.write();
        let mut next = guard.clone();
        change(&mut next);
        next.validate()?;
        self.persist(&next)?;
        *guard = next;
        Ok(())
    }

    fn persist(&self, data: &PipelineConfig) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write config to {}", self.path.display()))
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read config from {}", self.path.display()))?;
        let data: PipelineConfig = serde_json::from_str(&contents)?;
        data.validate()?;
        *self.write() = data;
        Ok(())
    }

    fn read(&self) -> RwLockReadGuard<'_, PipelineConfig> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, PipelineConfig> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn parse_or_default(path: &Path, contents: &str) -> PipelineConfig {
    match serde_json::from_str::<PipelineConfig>(contents) {
        Ok(config) => match config.validate() {
            Ok(()) => config,
            Err(err) => {
                log_warn!("{} rejected ({err}); using defaults", path.display());
                PipelineConfig::default()
            }
        },
        Err(err) => {
            log_warn!("{} is not valid config ({err}); using defaults", path.display());
            PipelineConfig::default()
        }
    }
}

use std::fs;
use std::path::{Path, PathBuf};

use ab_glyph::FontArc;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_info;

const REGULAR_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

const BOLD_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
    "/Library/Fonts/Arial Bold.ttf",
    "C:\\Windows\\Fonts\\arialbd.ttf",
];

const MONOSPACE_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSansMono.ttf",
    "/usr/share/fonts/dejavu/DejaVuSansMono.ttf",
    "/usr/share/fonts/TTF/DejaVuSansMono.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationMono-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Courier New.ttf",
    "/Library/Fonts/Courier New.ttf",
    "C:\\Windows\\Fonts\\cour.ttf",
];

/// Font file locations. Unset entries are probed at well-known system paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FontConfig {
    pub regular: Option<PathBuf>,
    pub bold: Option<PathBuf>,
    pub monospace: Option<PathBuf>,
}

/// Faces used by the raster surface. Bold and monospace fall back to regular.
#[derive(Clone)]
pub struct FontSet {
    pub regular: FontArc,
    pub bold: Option<FontArc>,
    pub monospace: Option<FontArc>,
}

impl FontSet {
    pub fn from_bytes(regular: Vec<u8>) -> Result<Self> {
        let regular = FontArc::try_from_vec(regular).map_err(|err| anyhow!("invalid font: {err}"))?;
        Ok(Self {
            regular,
            bold: None,
            monospace: None,
        })
    }

    pub fn load(config: &FontConfig) -> Result<Self> {
        let regular_path = config
            .regular
            .clone()
            .or_else(|| probe(REGULAR_CANDIDATES))
            .ok_or_else(|| anyhow!("no regular font configured and none found on this system"))?;
        let regular = load_face(&regular_path)?;

        // Optional faces: an explicit path must load, a probed one may be skipped.
        let bold = optional_face(config.bold.as_deref(), BOLD_CANDIDATES)?;
        let monospace = optional_face(config.monospace.as_deref(), MONOSPACE_CANDIDATES)?;

        log_info!(
            "fonts loaded from {} (bold: {}, monospace: {})",
            regular_path.display(),
            bold.is_some(),
            monospace.is_some()
        );

        Ok(Self {
            regular,
            bold,
            monospace,
        })
    }

    /// Face for the requested style and whether bold must be synthesized.
    pub fn face(&self, bold: bool, monospace: bool) -> (&FontArc, bool) {
        if monospace {
            if let Some(face) = &self.monospace {
                return (face, bold);
            }
        }
        if bold {
            return match &self.bold {
                Some(face) => (face, false),
                None => (&self.regular, true),
            };
        }
        (&self.regular, false)
    }
}

fn probe(candidates: &[&str]) -> Option<PathBuf> {
    candidates
        .iter()
        .map(PathBuf::from)
        .find(|path| path.is_file())
}

fn load_face(path: &Path) -> Result<FontArc> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read font {}", path.display()))?;
    FontArc::try_from_vec(bytes).map_err(|err| anyhow!("invalid font {}: {err}", path.display()))
}

fn optional_face(explicit: Option<&Path>, candidates: &[&str]) -> Result<Option<FontArc>> {
    match explicit {
        Some(path) => load_face(path).map(Some),
        None => Ok(probe(candidates).and_then(|path| load_face(&path).ok())),
    }
}

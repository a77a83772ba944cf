//! Loading of the static render assets: font, background template, logo.
//!
//! Each asset has its own failure policy:
//!
//! | Asset | Missing | Unreadable |
//! |---|---|---|
//! | font | fatal ([`RenderError::Font`]) | fatal |
//! | background | solid fill colour | fatal ([`RenderError::Background`]) |
//! | logo | skipped | skipped, reason kept in [`LogoAsset::Failed`] |

use super::compositor::RenderError;
use ab_glyph::FontVec;
use image::{Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Locations probed when no font is configured.
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Load the configured font, or the first usable system font when none is
/// configured.
pub fn load_font(path: Option<&Path>) -> Result<FontVec, RenderError> {
    match path {
        Some(path) => read_font(path),
        None => probe_system_font().map(|(_, font)| font).ok_or_else(|| {
            RenderError::Font(
                "no font configured and no system font found; set assets.font".to_string(),
            )
        }),
    }
}

fn read_font(path: &Path) -> Result<FontVec, RenderError> {
    let data = std::fs::read(path)
        .map_err(|e| RenderError::Font(format!("failed to read {}: {e}", path.display())))?;
    FontVec::try_from_vec(data)
        .map_err(|_| RenderError::Font(format!("failed to parse font file {}", path.display())))
}

/// First font from [`SYSTEM_FONT_CANDIDATES`] that exists and parses.
pub fn probe_system_font() -> Option<(PathBuf, FontVec)> {
    for candidate in SYSTEM_FONT_CANDIDATES {
        let path = Path::new(candidate);
        if let Ok(data) = std::fs::read(path)
            && let Ok(font) = FontVec::try_from_vec(data)
        {
            debug!("Using system font {}", path.display());
            return Some((path.to_path_buf(), font));
        }
    }
    None
}

/// Canvas base layer.
#[derive(Debug, Clone)]
pub enum Background {
    /// Template image, resized to the canvas at paint time.
    Template(RgbaImage),
    /// Solid fill used when no template exists.
    Solid(Rgba<u8>),
}

/// Load the background template, falling back to `fill` when no template
/// is configured or the file does not exist.
pub fn load_background(path: Option<&Path>, fill: Rgba<u8>) -> Result<Background, RenderError> {
    let Some(path) = path.filter(|p| p.exists()) else {
        debug!("No background template, using solid fill");
        return Ok(Background::Solid(fill));
    };
    let img = image::open(path).map_err(|e| RenderError::Background {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(Background::Template(img.to_rgba8()))
}

/// Logo overlay, or why there is none.
#[derive(Debug, Clone)]
pub enum LogoAsset {
    Loaded(RgbaImage),
    NotConfigured,
    Missing(PathBuf),
    Failed(String),
}

/// Load the optional logo. Never fails; problems are reported in the
/// returned variant.
pub fn load_logo(path: Option<&Path>) -> LogoAsset {
    let Some(path) = path else {
        return LogoAsset::NotConfigured;
    };
    if !path.exists() {
        return LogoAsset::Missing(path.to_path_buf());
    }
    match image::open(path) {
        Ok(img) => LogoAsset::Loaded(img.to_rgba8()),
        Err(e) => {
            warn!("Logo {} could not be decoded: {e}", path.display());
            LogoAsset::Failed(format!("failed to decode {}: {e}", path.display()))
        }
    }
}

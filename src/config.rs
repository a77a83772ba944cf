//! Service configuration.
//!
//! Configuration lives in a single TOML file (`agv-proc.toml` by default,
//! overridable with `--config`). Stock defaults are the base layer and the
//! user file is merged on top, so the file only needs the keys it changes.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [server]
//! bind = "0.0.0.0:3000"
//! public_url = "http://localhost:3000"   # Base of the URLs handed back to clients
//! static_prefix = "/generated"           # URL prefix the output directory is served under
//! bot_name = "agv-proc"                  # Static identifier in every JSON payload
//!
//! [upstream]
//! endpoint = "http://localhost:8080/api/agv"
//! dni_param = "dni"
//! timeout_secs = 30
//!
//! [scanner]
//! cols = 7
//! rows = 5
//! variance_threshold = 1200.0
//! skin_ratio_threshold = 0.2
//!
//! [canvas]
//! width = 1080
//! height = 1350
//! # ... see `agv-proc gen-config` for the full list
//!
//! [assets]
//! background = "assets/background.png"
//! logo = "assets/logo.png"
//! # font = "assets/font.ttf"             # Omit to probe common system fonts
//! output_dir = "public/generated"
//! file_prefix = "agv"
//!
//! [ocr]
//! enabled = true
//! command = "tesseract"
//! language = "spa"
//! timeout_secs = 20
//!
//! [processing]
//! # max_threads = 4                      # Scanner worker threads (omit for auto)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use image::Rgba;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "agv-proc.toml";

/// Full service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// HTTP listener and public URL settings.
    pub server: ServerConfig,
    /// Remote image provider.
    pub upstream: UpstreamConfig,
    /// Photo-region detection grid and thresholds.
    pub scanner: ScannerConfig,
    /// Output canvas geometry, typography and colours.
    pub canvas: CanvasConfig,
    /// Asset locations and output directory.
    pub assets: AssetsConfig,
    /// Text recognition engine.
    pub ocr: OcrConfig,
    /// Worker thread settings.
    pub processing: ProcessingConfig,
}

impl AppConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let scanner = &self.scanner;
        if scanner.cols == 0 || scanner.rows == 0 {
            return Err(ConfigError::Validation(
                "scanner.cols and scanner.rows must be non-zero".into(),
            ));
        }
        if !scanner.variance_threshold.is_finite() || scanner.variance_threshold < 0.0 {
            return Err(ConfigError::Validation(
                "scanner.variance_threshold must be a finite value >= 0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&scanner.skin_ratio_threshold) {
            return Err(ConfigError::Validation(
                "scanner.skin_ratio_threshold must be within 0-1".into(),
            ));
        }

        let canvas = &self.canvas;
        if canvas.width == 0 || canvas.height == 0 {
            return Err(ConfigError::Validation(
                "canvas.width and canvas.height must be non-zero".into(),
            ));
        }
        if !(canvas.text_fraction > 0.0 && canvas.text_fraction < 1.0) {
            return Err(ConfigError::Validation(
                "canvas.text_fraction must be strictly between 0 and 1".into(),
            ));
        }
        if canvas.text_columns == 0 || canvas.thumb_cols == 0 {
            return Err(ConfigError::Validation(
                "canvas.text_columns and canvas.thumb_cols must be non-zero".into(),
            ));
        }
        if canvas.footer_margin >= canvas.height || canvas.top_offset >= canvas.height {
            return Err(ConfigError::Validation(
                "canvas.footer_margin and canvas.top_offset must be smaller than canvas.height"
                    .into(),
            ));
        }
        let text_end = f64::from(canvas.margin) + f64::from(canvas.width) * canvas.text_fraction;
        let thumbs_used = text_end + f64::from(canvas.gap) + f64::from(canvas.margin);
        if thumbs_used >= f64::from(canvas.width) {
            return Err(ConfigError::Validation(
                "canvas leaves no room for the thumbnail region; lower text_fraction or margins"
                    .into(),
            ));
        }
        for (key, value) in [
            ("canvas.background_color", &canvas.background_color),
            ("canvas.text_color", &canvas.text_color),
        ] {
            if parse_hex_color(value).is_none() {
                return Err(ConfigError::Validation(format!(
                    "{key} must be a #rrggbb colour, got {value:?}"
                )));
            }
        }

        if self.upstream.timeout_secs == 0 || self.ocr.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "upstream.timeout_secs and ocr.timeout_secs must be non-zero".into(),
            ));
        }
        let prefix = &self.server.static_prefix;
        if !prefix.starts_with('/') || prefix.len() < 2 || prefix.ends_with('/') {
            return Err(ConfigError::Validation(
                "server.static_prefix must look like \"/generated\": leading '/', no trailing '/'"
                    .into(),
            ));
        }
        Ok(())
    }
}

/// HTTP listener and public URL settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address to listen on.
    pub bind: String,
    /// Externally visible base URL, prepended to generated file URLs.
    pub public_url: String,
    /// URL prefix under which `assets.output_dir` is served.
    pub static_prefix: String,
    /// Static bot identifier echoed in every JSON response.
    pub bot_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
            public_url: "http://localhost:3000".to_string(),
            static_prefix: "/generated".to_string(),
            bot_name: "agv-proc".to_string(),
        }
    }
}

/// Remote image provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpstreamConfig {
    /// Endpoint queried with `?<dni_param>=<dni>`.
    pub endpoint: String,
    /// Name of the query parameter carrying the identifier.
    pub dni_param: String,
    /// Timeout applied to every upstream request, including the file download.
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080/api/agv".to_string(),
            dni_param: "dni".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Photo-region detection settings.
///
/// The thresholds are empirical and tuned against the provider's layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScannerConfig {
    /// Grid columns.
    pub cols: u32,
    /// Grid rows.
    pub rows: u32,
    /// Minimum luminance variance for a cell to qualify.
    pub variance_threshold: f64,
    /// A cell qualifies when its skin ratio is strictly above this.
    pub skin_ratio_threshold: f64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            cols: 7,
            rows: 5,
            variance_threshold: 1200.0,
            skin_ratio_threshold: 0.2,
        }
    }
}

/// Output canvas geometry, typography and colours.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
    /// Outer margin on every side.
    pub margin: u32,
    /// Gap between the text and thumbnail regions, and between thumbnails.
    pub gap: u32,
    /// Width of the text region as a fraction of the canvas width.
    pub text_fraction: f64,
    /// Number of text columns inside the text region.
    pub text_columns: u32,
    /// Horizontal gap between text columns.
    pub column_gap: u32,
    /// Number of thumbnail columns.
    pub thumb_cols: u32,
    /// Maximum number of thumbnails drawn.
    pub max_thumbnails: usize,
    /// Y offset where text and thumbnails start (below the title).
    pub top_offset: u32,
    /// Distance from the bottom where text flow stops.
    pub footer_margin: u32,
    /// Distance from the bottom where the footer text baseline box starts.
    pub footer_offset: u32,
    pub title_size: f32,
    pub text_size: f32,
    pub footer_size: f32,
    /// Line advance as a multiple of `text_size`.
    pub line_spacing: f32,
    /// Logo width after resizing; height follows the aspect ratio.
    pub logo_width: u32,
    /// Width of the translucent frame around each thumbnail.
    pub border_width: u32,
    /// Opacity of the thumbnail frame (0-255).
    pub border_alpha: u8,
    /// Solid fill used when no background template is available.
    pub background_color: String,
    pub text_color: String,
    /// Static text placed before the identifier in the title.
    pub title_prefix: String,
    /// Static branding text in the footer.
    pub footer_text: String,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1350,
            margin: 40,
            gap: 12,
            text_fraction: 0.42,
            text_columns: 2,
            column_gap: 16,
            thumb_cols: 3,
            max_thumbnails: 30,
            top_offset: 140,
            footer_margin: 90,
            footer_offset: 50,
            title_size: 34.0,
            text_size: 15.0,
            footer_size: 14.0,
            line_spacing: 1.35,
            logo_width: 160,
            border_width: 3,
            border_alpha: 140,
            background_color: "#101820".to_string(),
            text_color: "#f2f2f2".to_string(),
            title_prefix: "DNI ".to_string(),
            footer_text: "agv-proc · documento generado automáticamente".to_string(),
        }
    }
}

impl CanvasConfig {
    /// Parsed background fill. Falls back to black for an unvalidated config.
    pub fn background_rgba(&self) -> Rgba<u8> {
        parse_hex_color(&self.background_color).unwrap_or(Rgba([0, 0, 0, 255]))
    }

    /// Parsed text colour. Falls back to white for an unvalidated config.
    pub fn text_rgba(&self) -> Rgba<u8> {
        parse_hex_color(&self.text_color).unwrap_or(Rgba([255, 255, 255, 255]))
    }
}

/// Asset locations and output directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssetsConfig {
    /// Background template; a solid fill is used when absent or missing.
    pub background: Option<PathBuf>,
    /// Optional logo overlay.
    pub logo: Option<PathBuf>,
    /// TrueType/OpenType font. When absent, common system fonts are probed.
    pub font: Option<PathBuf>,
    /// Directory generated cards are written to.
    pub output_dir: PathBuf,
    /// Filename prefix of generated cards.
    pub file_prefix: String,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            background: Some(PathBuf::from("assets/background.png")),
            logo: Some(PathBuf::from("assets/logo.png")),
            font: None,
            output_dir: PathBuf::from("public/generated"),
            file_prefix: "agv".to_string(),
        }
    }
}

/// Text recognition engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OcrConfig {
    /// When false, recognition is skipped and the fallback text is used.
    pub enabled: bool,
    /// Tesseract executable.
    pub command: String,
    /// Tesseract language code(s), e.g. `"spa"` or `"spa+eng"`.
    pub language: String,
    pub timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: "tesseract".to_string(),
            language: "spa".to_string(),
            timeout_secs: 20,
        }
    }
}

/// Worker thread settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of scanner worker threads.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_threads: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)`, at least 1
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_threads
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Parse a `#rrggbb` colour into an opaque RGBA pixel.
pub fn parse_hex_color(value: &str) -> Option<Rgba<u8>> {
    let hex = value.strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(Rgba([channel(0)?, channel(2)?, channel(4)?, 255]))
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(AppConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<AppConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: AppConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the given file.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result. A missing file yields the stock defaults.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock config file with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# agv-proc Configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# ---------------------------------------------------------------------------
# HTTP server
# ---------------------------------------------------------------------------
[server]
bind = "0.0.0.0:3000"
# Externally visible base URL; generated file URLs start with it.
public_url = "http://localhost:3000"
# URL prefix the output directory is served under.
static_prefix = "/generated"
# Static identifier included in every JSON response.
bot_name = "agv-proc"

# ---------------------------------------------------------------------------
# Remote image provider
# ---------------------------------------------------------------------------
[upstream]
# Queried as <endpoint>?<dni_param>=<dni>. Must answer with either an image
# body or JSON carrying urls.FILE.
endpoint = "http://localhost:8080/api/agv"
dni_param = "dni"
# Applies to the lookup and to the file download. No retries.
timeout_secs = 30

# ---------------------------------------------------------------------------
# Photo-region detection
# ---------------------------------------------------------------------------
[scanner]
# The source image is split into cols x rows cells; remainder pixels on the
# right and bottom edges are ignored.
cols = 7
rows = 5
# A cell qualifies when its luminance variance reaches this value...
variance_threshold = 1200.0
# ...or when more than this fraction of its pixels look like skin.
skin_ratio_threshold = 0.2

# ---------------------------------------------------------------------------
# Output canvas
# ---------------------------------------------------------------------------
[canvas]
width = 1080
height = 1350
margin = 40
gap = 12
# Left text region width as a fraction of the canvas width.
text_fraction = 0.42
text_columns = 2
column_gap = 16
thumb_cols = 3
max_thumbnails = 30
# Text and thumbnails start below this offset (title area above).
top_offset = 140
# Text flow stops this far from the bottom edge.
footer_margin = 90
footer_offset = 50
title_size = 34.0
text_size = 15.0
footer_size = 14.0
line_spacing = 1.35
logo_width = 160
border_width = 3
border_alpha = 140
background_color = "#101820"
text_color = "#f2f2f2"
title_prefix = "DNI "
footer_text = "agv-proc · documento generado automáticamente"

# ---------------------------------------------------------------------------
# Assets
# ---------------------------------------------------------------------------
[assets]
# Missing background -> solid background_color. Missing logo -> no logo.
background = "assets/background.png"
logo = "assets/logo.png"
# Omit to probe common system font locations.
# font = "assets/font.ttf"
output_dir = "public/generated"
file_prefix = "agv"

# ---------------------------------------------------------------------------
# Text recognition
# ---------------------------------------------------------------------------
[ocr]
enabled = true
command = "tesseract"
language = "spa"
timeout_secs = 20

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum scanner worker threads.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_threads = 4
"##
}

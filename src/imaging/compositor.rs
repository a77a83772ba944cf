//! Final image composition.
//!
//! A render paints, in order:
//!
//! 1. background (template resized to the canvas, or solid fill)
//! 2. logo, top-right
//! 3. title, top-left
//! 4. thumbnails of the top candidates, cover-fit into their slots and framed
//! 5. wrapped text in the left columns
//! 6. footer band and branding text, always last
//!
//! Only the font, a corrupt background template and PNG encoding can fail a
//! render. Everything else degrades and is reported in [`RenderReport`].
//!
//! Steps 1, 2 and 4 and the footer band are free functions over explicit
//! inputs, so they can be tested without a font.

use super::assets::{self, Background, LogoAsset};
use super::calculations::{calculate_cover_fit, height_for_width};
use super::layout::{FontMeasure, LayoutPlan, Slot};
use crate::config::{AssetsConfig, CanvasConfig};
use crate::types::{Candidate, Region, TextLine};
use ab_glyph::{FontVec, PxScale};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Pixel, Rgba, RgbaImage};
use imageproc::drawing::draw_text_mut;
use serde::Serialize;
use std::io::Cursor;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, warn};

const FOOTER_BAND: Rgba<u8> = Rgba([0, 0, 0, 110]);

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("font unavailable: {0}")]
    Font(String),
    #[error("background template {} could not be decoded: {reason}", path.display())]
    Background { path: PathBuf, reason: String },
    #[error("source image could not be decoded: {0}")]
    SourceDecode(String),
    #[error("PNG encoding failed: {0}")]
    Encode(String),
}

/// Inputs of one render.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    /// Decoded source card.
    pub source: &'a RgbaImage,
    /// Ranked candidates, best first.
    pub candidates: &'a [Candidate],
    pub lines: &'a [TextLine],
    /// Shown in the title after the configured prefix.
    pub identifier: &'a str,
}

#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub png: Vec<u8>,
    pub report: RenderReport,
}

/// What a render actually did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderReport {
    pub canvas: (u32, u32),
    pub background_template: bool,
    pub logo: LogoOutcome,
    pub thumbnails_placed: usize,
    pub skipped: Vec<SkippedThumbnail>,
    pub lines_drawn: usize,
    pub truncated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LogoOutcome {
    Placed {
        x: i64,
        y: i64,
        width: u32,
        height: u32,
    },
    #[default]
    NotConfigured,
    Missing {
        path: PathBuf,
    },
    Failed {
        reason: String,
    },
}

/// A candidate that did not make it onto the canvas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedThumbnail {
    /// Position in the ranked candidate list.
    pub rank: usize,
    pub region: Region,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Region is not inside the decoded source.
    OutsideSource,
    /// Slot has a zero dimension.
    EmptySlot,
    /// Grid ran into the footer before this candidate.
    NoRoom,
}

/// Frame drawn around each thumbnail.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BorderStyle {
    pub width: u32,
    pub color: Rgba<u8>,
}

/// Renders the branded card for one identifier.
#[derive(Debug, Clone)]
pub struct Compositor {
    canvas: CanvasConfig,
    assets: AssetsConfig,
}

impl Compositor {
    pub fn new(canvas: CanvasConfig, assets: AssetsConfig) -> Self {
        Self { canvas, assets }
    }

    pub fn plan(&self) -> LayoutPlan {
        LayoutPlan::new(&self.canvas)
    }

    /// Load the assets and render to PNG bytes.
    ///
    /// Assets are read on every call, so replacing the template or logo on
    /// disk takes effect on the next request.
    pub fn render(&self, request: &RenderRequest<'_>) -> Result<RenderOutput, RenderError> {
        let font = assets::load_font(self.assets.font.as_deref())?;
        let background = assets::load_background(
            self.assets.background.as_deref(),
            self.canvas.background_rgba(),
        )?;
        let logo = assets::load_logo(self.assets.logo.as_deref());

        let (canvas, report) = self.compose(request, &font, &background, logo);
        let png = encode_png(&canvas)?;
        debug!(
            "Rendered {}x{} canvas, {} bytes",
            canvas.width(),
            canvas.height(),
            png.len()
        );
        Ok(RenderOutput { png, report })
    }

    /// Paint every layer onto a fresh canvas.
    pub fn compose(
        &self,
        request: &RenderRequest<'_>,
        font: &FontVec,
        background: &Background,
        logo: LogoAsset,
    ) -> (RgbaImage, RenderReport) {
        let cfg = &self.canvas;
        let plan = self.plan();
        let text_color = cfg.text_rgba();

        let mut canvas = base_canvas(background, cfg.width, cfg.height);
        let logo = place_logo(&mut canvas, logo, &plan, cfg.logo_width);

        let (tx, ty) = plan.title_origin();
        let title = format!("{}{}", cfg.title_prefix, request.identifier);
        draw_text_mut(&mut canvas, text_color, tx, ty, PxScale::from(cfg.title_size), font, &title);

        let border = BorderStyle {
            width: cfg.border_width,
            color: Rgba([255, 255, 255, cfg.border_alpha]),
        };
        let top: Vec<Candidate> = request
            .candidates
            .iter()
            .take(cfg.max_thumbnails)
            .copied()
            .collect();
        let (placed, skipped) = place_thumbnails(&mut canvas, request.source, &top, &plan, border);

        let flow = plan.flow_text(request.lines, &FontMeasure::new(font, cfg.text_size));
        for line in &flow.lines {
            draw_text_mut(
                &mut canvas,
                text_color,
                line.x as i32,
                line.y as i32,
                PxScale::from(cfg.text_size),
                font,
                &line.text,
            );
        }
        if flow.truncated {
            warn!(
                "Text overflowed {} columns; {} lines drawn",
                plan.columns.len(),
                flow.lines.len()
            );
        }

        paint_footer_band(&mut canvas, footer_band_top(&plan, cfg.footer_size));
        let (fx, fy) = plan.footer_origin();
        draw_text_mut(
            &mut canvas,
            text_color,
            fx,
            fy,
            PxScale::from(cfg.footer_size),
            font,
            &cfg.footer_text,
        );

        let report = RenderReport {
            canvas: (cfg.width, cfg.height),
            background_template: matches!(background, Background::Template(_)),
            logo,
            thumbnails_placed: placed,
            skipped,
            lines_drawn: flow.lines.len(),
            truncated: flow.truncated,
        };
        (canvas, report)
    }
}

/// Decode upstream bytes into an RGBA raster.
pub fn decode_source(bytes: &[u8]) -> Result<RgbaImage, RenderError> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgba8())
        .map_err(|e| RenderError::SourceDecode(e.to_string()))
}

pub fn encode_png(canvas: &RgbaImage) -> Result<Vec<u8>, RenderError> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(canvas.clone())
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| RenderError::Encode(e.to_string()))?;
    Ok(buf.into_inner())
}

/// Fresh canvas filled from the background.
pub fn base_canvas(background: &Background, width: u32, height: u32) -> RgbaImage {
    match background {
        Background::Template(img) if img.dimensions() == (width, height) => img.clone(),
        Background::Template(img) => imageops::resize(img, width, height, FilterType::Lanczos3),
        Background::Solid(color) => RgbaImage::from_pixel(width, height, *color),
    }
}

/// Scale the logo to `logo_width` and overlay it at the top-right anchor.
pub fn place_logo(
    canvas: &mut RgbaImage,
    logo: LogoAsset,
    plan: &LayoutPlan,
    logo_width: u32,
) -> LogoOutcome {
    match logo {
        LogoAsset::Loaded(img) => {
            if img.width() == 0 || img.height() == 0 || logo_width == 0 {
                warn!(
                    "Logo skipped: empty dimension ({}x{}, target width {})",
                    img.width(),
                    img.height(),
                    logo_width
                );
                return LogoOutcome::Failed {
                    reason: "logo has an empty dimension".to_string(),
                };
            }
            let height = (height_for_width(img.dimensions(), f64::from(logo_width)) as u32).max(1);
            let scaled = imageops::resize(&img, logo_width, height, FilterType::Lanczos3);
            let (x, y) = plan.logo_origin(logo_width);
            imageops::overlay(canvas, &scaled, x, y);
            LogoOutcome::Placed {
                x,
                y,
                width: logo_width,
                height,
            }
        }
        LogoAsset::NotConfigured => LogoOutcome::NotConfigured,
        LogoAsset::Missing(path) => {
            warn!("Logo {} not found, skipping", path.display());
            LogoOutcome::Missing { path }
        }
        LogoAsset::Failed(reason) => LogoOutcome::Failed { reason },
    }
}

/// Crop each candidate from `source`, cover-fit it into its slot and frame it.
///
/// Returns the number placed and the candidates skipped. A skipped
/// candidate leaves its slot empty.
pub fn place_thumbnails(
    canvas: &mut RgbaImage,
    source: &RgbaImage,
    candidates: &[Candidate],
    plan: &LayoutPlan,
    border: BorderStyle,
) -> (usize, Vec<SkippedThumbnail>) {
    let regions: Vec<Region> = candidates.iter().map(|c| c.region).collect();
    let slots = plan.thumbnail_slots(&regions);
    let (src_w, src_h) = source.dimensions();

    let mut placed = 0;
    let mut skipped = Vec::new();
    for (rank, region) in regions.into_iter().enumerate() {
        let skip = |reason| SkippedThumbnail {
            rank,
            region,
            reason,
        };
        let Some(slot) = slots.get(rank) else {
            skipped.push(skip(SkipReason::NoRoom));
            continue;
        };
        if !region.fits_within(src_w, src_h) {
            warn!("Candidate {region} lies outside the {src_w}x{src_h} source");
            skipped.push(skip(SkipReason::OutsideSource));
            continue;
        }
        let Some(thumb) = cover_fit_crop(source, region, slot) else {
            skipped.push(skip(SkipReason::EmptySlot));
            continue;
        };
        imageops::overlay(canvas, &thumb, i64::from(slot.x), i64::from(slot.y));
        draw_border(canvas, slot, border);
        placed += 1;
    }
    if !skipped.is_empty() {
        debug!("{} thumbnails placed, {} skipped", placed, skipped.len());
    }
    (placed, skipped)
}

fn cover_fit_crop(source: &RgbaImage, region: Region, slot: &Slot) -> Option<RgbaImage> {
    let fit = calculate_cover_fit((region.width, region.height), (slot.width, slot.height))?;
    let cell = imageops::crop_imm(source, region.x, region.y, region.width, region.height).to_image();
    let scaled = imageops::resize(&cell, fit.scaled.0, fit.scaled.1, FilterType::Lanczos3);
    Some(imageops::crop_imm(&scaled, fit.offset.0, fit.offset.1, slot.width, slot.height).to_image())
}

/// Blend a frame of `border.width` pixels along the inside edge of `slot`.
pub fn draw_border(canvas: &mut RgbaImage, slot: &Slot, border: BorderStyle) {
    let bw = border.width.min(slot.width / 2).min(slot.height / 2);
    if bw == 0 {
        return;
    }
    let (x, y, w, h) = (slot.x, slot.y, slot.width, slot.height);
    blend_rect(canvas, x, y, w, bw, border.color);
    blend_rect(canvas, x, y + h - bw, w, bw, border.color);
    blend_rect(canvas, x, y + bw, bw, h - 2 * bw, border.color);
    blend_rect(canvas, x + w - bw, y + bw, bw, h - 2 * bw, border.color);
}

/// Top edge of the footer band.
pub fn footer_band_top(plan: &LayoutPlan, footer_size: f32) -> u32 {
    (plan.footer_y - footer_size * 0.75).max(0.0) as u32
}

/// Darken everything from `top` to the bottom edge.
pub fn paint_footer_band(canvas: &mut RgbaImage, top: u32) {
    let (w, h) = canvas.dimensions();
    blend_rect(canvas, 0, top, w, h.saturating_sub(top), FOOTER_BAND);
}

/// Alpha-blend `color` over a rectangle, clipped to the canvas.
fn blend_rect(canvas: &mut RgbaImage, x: u32, y: u32, w: u32, h: u32, color: Rgba<u8>) {
    let x_end = x.saturating_add(w).min(canvas.width());
    let y_end = y.saturating_add(h).min(canvas.height());
    for py in y..y_end {
        for px in x..x_end {
            canvas.get_pixel_mut(px, py).blend(&color);
        }
    }
}

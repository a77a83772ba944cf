//! Shared test utilities for the agv-proc test suite.
//!
//! Synthetic card builders: flat fills, checkerboards, deterministic noise
//! and skin patches painted into exact grid cells, plus PNG encoding and an
//! system font for tests that rasterise text (those tests are `#[ignore]`d).
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let mut img = flat_image(700, 500, GRAY);
//! paint_noise(&mut img, Region::new(300, 200, 100, 100), 7);
//! let candidates = GridScanner::new(config).detect(&img);
//! ```

use crate::imaging::assets;
use crate::types::Region;
use ab_glyph::FontVec;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

pub const GRAY: Rgba<u8> = Rgba([128, 128, 128, 255]);
pub const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
/// Passes the coarse skin test: R > 90, G > 40, B > 20, R−G > 15, R−B > 15.
pub const SKIN: Rgba<u8> = Rgba([210, 150, 120, 255]);

// =========================================================================
// Image builders
// =========================================================================

pub fn flat_image(width: u32, height: u32, color: Rgba<u8>) -> RgbaImage {
    RgbaImage::from_pixel(width, height, color)
}

pub fn paint_region(img: &mut RgbaImage, region: Region, color: Rgba<u8>) {
    for y in region.y..region.y + region.height {
        for x in region.x..region.x + region.width {
            img.put_pixel(x, y, color);
        }
    }
}

/// One-pixel black/white checkerboard anchored at the region origin.
pub fn paint_checkerboard(img: &mut RgbaImage, region: Region) {
    paint_checker_colors(img, region, BLACK, WHITE);
}

pub fn paint_checker_colors(img: &mut RgbaImage, region: Region, a: Rgba<u8>, b: Rgba<u8>) {
    for y in region.y..region.y + region.height {
        for x in region.x..region.x + region.width {
            let even = (x - region.x + y - region.y) % 2 == 0;
            img.put_pixel(x, y, if even { a } else { b });
        }
    }
}

/// Deterministic RGB noise (xorshift32 seeded with `seed`).
pub fn paint_noise(img: &mut RgbaImage, region: Region, seed: u32) {
    let mut state = seed.wrapping_mul(2_654_435_761).max(1);
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        state
    };
    for y in region.y..region.y + region.height {
        for x in region.x..region.x + region.width {
            let [r, g, b, _] = next().to_le_bytes();
            img.put_pixel(x, y, Rgba([r, g, b, 255]));
        }
    }
}

/// Encode an image as PNG bytes, as the upstream would deliver it.
pub fn encode_png(img: &RgbaImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img.clone())
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

pub fn decode_png(bytes: &[u8]) -> RgbaImage {
    image::load_from_memory_with_format(bytes, ImageFormat::Png)
        .unwrap()
        .to_rgba8()
}

// =========================================================================
// Fonts
// =========================================================================

/// First usable system font. Panics when the machine has none.
///
/// Tests that rasterise text are `#[ignore = "needs a system font"]`; run
/// them with `cargo test -- --include-ignored` on a machine with fonts.
pub fn system_font() -> FontVec {
    assets::probe_system_font()
        .map(|(_, font)| font)
        .expect("no system font found; install DejaVu or Liberation fonts")
}

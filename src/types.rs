//! Shared types passed between the scanner, the layout engine, the
//! compositor and the HTTP layer.
//!
//! Everything here is a plain value: constructed once, never mutated after
//! creation, cheap to clone.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Rectangle in source-image pixel coordinates.
///
/// A `Region` produced by the scanner always lies fully inside the image it
/// was computed from: `x + width <= image_width` and
/// `y + height <= image_height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether the region lies inside an image of the given dimensions.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.x.checked_add(self.width).is_some_and(|r| r <= width)
            && self.y.checked_add(self.height).is_some_and(|b| b <= height)
    }

    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}+{}+{}",
            self.width, self.height, self.x, self.y
        )
    }
}

/// Weight of the skin ratio in [`Candidate::score`]. Biases ranking toward
/// faces over generic high-contrast cells.
pub const SKIN_WEIGHT: f64 = 1000.0;

/// A grid cell believed to contain photographic content.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Candidate {
    pub region: Region,
    /// Population variance of the cell's luminance. Always `>= 0`.
    pub variance: f64,
    /// Fraction of skin-toned pixels in the cell, in `[0, 1]`.
    pub skin_ratio: f64,
}

impl Candidate {
    /// Ranking score: `variance + 1000 × skin_ratio`.
    pub fn score(&self) -> f64 {
        self.variance + SKIN_WEIGHT * self.skin_ratio
    }
}

/// One trimmed, non-empty line of recognized text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextLine(String);

impl TextLine {
    /// Trim `raw`; returns `None` when nothing is left.
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Split OCR output into lines, keeping recognizer order and dropping
    /// blank lines.
    pub fn from_ocr(text: &str) -> Vec<Self> {
        text.lines().filter_map(Self::new).collect()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TextLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Minimum number of digits in a national identity number.
pub const DNI_MIN_DIGITS: usize = 6;

/// Maximum number of digits accepted. Covers an 11-digit CUIT/CUIL.
pub const DNI_MAX_DIGITS: usize = 11;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required query parameter `dni`")]
    MissingDni,
    #[error("dni must contain only digits and be at least {DNI_MIN_DIGITS} long, got {0:?}")]
    MalformedDni(String),
    #[error("dni must have at most {DNI_MAX_DIGITS} digits, got {0}")]
    TooLongDni(usize),
}

/// A validated national identity number: ASCII digits only, between
/// [`DNI_MIN_DIGITS`] and [`DNI_MAX_DIGITS`] of them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dni(String);

impl Dni {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.len() < DNI_MIN_DIGITS || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::MalformedDni(raw.to_string()));
        }
        if trimmed.len() > DNI_MAX_DIGITS {
            return Err(ValidationError::TooLongDni(trimmed.len()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Dni {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//! Photo-region detection over a fixed grid.
//!
//! The source card is split into `cols × rows` equal cells. Each cell is
//! scored on two cheap statistics:
//!
//! | Statistic | Meaning |
//! |---|---|
//! | luminance variance | how "busy" the cell is; flat backgrounds and text bands score low |
//! | skin ratio | share of pixels passing a coarse RGB skin test |
//!
//! Cells passing either threshold become [`Candidate`]s, ranked by
//! `variance + 1000 × skin_ratio`. Ties keep scan order (row-major), so the
//! output is a pure function of the pixels and the [`ScannerConfig`].
//!
//! Cells are scored in parallel with rayon; every cell owns its
//! accumulators and results are collected back in scan order.

use crate::config::ScannerConfig;
use crate::types::{Candidate, Region};
use image::{Rgba, RgbaImage};
use rayon::prelude::*;

/// Raw statistics of one grid cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellScore {
    pub region: Region,
    pub variance: f64,
    pub skin_ratio: f64,
}

impl CellScore {
    fn into_candidate(self) -> Candidate {
        Candidate {
            region: self.region,
            variance: self.variance,
            skin_ratio: self.skin_ratio,
        }
    }
}

/// Grid-based candidate detector.
#[derive(Debug, Clone)]
pub struct GridScanner {
    config: ScannerConfig,
}

impl GridScanner {
    pub fn new(config: ScannerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Grid cells of an image of the given size, in scan order.
    ///
    /// Cell size is `floor(width / cols) × floor(height / rows)`; leftover
    /// pixels on the right and bottom edges belong to no cell. Returns an
    /// empty list when the image is smaller than the grid.
    pub fn cells(&self, width: u32, height: u32) -> Vec<Region> {
        let (cols, rows) = (self.config.cols, self.config.rows);
        if cols == 0 || rows == 0 {
            return Vec::new();
        }
        let cell_w = width / cols;
        let cell_h = height / rows;
        if cell_w == 0 || cell_h == 0 {
            return Vec::new();
        }
        (0..rows)
            .flat_map(|row| {
                (0..cols).map(move |col| Region::new(col * cell_w, row * cell_h, cell_w, cell_h))
            })
            .collect()
    }

    /// Score every cell of the grid, in scan order.
    pub fn score_cells(&self, image: &RgbaImage) -> Vec<CellScore> {
        self.cells(image.width(), image.height())
            .into_par_iter()
            .map(|region| score_region(image, region))
            .collect()
    }

    /// Statistics of a single region, scored like a grid cell.
    ///
    /// `region` must lie inside `image`.
    pub fn score_cell(&self, image: &RgbaImage, region: Region) -> CellScore {
        score_region(image, region)
    }

    /// Detect candidate photo regions, best first.
    pub fn detect(&self, image: &RgbaImage) -> Vec<Candidate> {
        let mut candidates: Vec<Candidate> = self
            .score_cells(image)
            .into_iter()
            .filter(|cell| self.qualifies(cell))
            .map(CellScore::into_candidate)
            .collect();
        // Stable sort: equal scores keep scan order.
        candidates.sort_by(|a, b| b.score().total_cmp(&a.score()));
        candidates
    }

    fn qualifies(&self, cell: &CellScore) -> bool {
        cell.variance >= self.config.variance_threshold
            || cell.skin_ratio > self.config.skin_ratio_threshold
    }
}

/// Compute luminance variance and skin ratio of one region.
fn score_region(image: &RgbaImage, region: Region) -> CellScore {
    let mut sum: u64 = 0;
    let mut sum_sq: u64 = 0;
    let mut skin: u64 = 0;

    for y in region.y..region.y + region.height {
        for x in region.x..region.x + region.width {
            let px = image.get_pixel(x, y);
            let l = u64::from(luminance(px));
            sum += l;
            sum_sq += l * l;
            if is_skin(px) {
                skin += 1;
            }
        }
    }

    let n = region.pixel_count();
    if n == 0 {
        return CellScore {
            region,
            variance: 0.0,
            skin_ratio: 0.0,
        };
    }
    let n = n as f64;
    let mean = sum as f64 / n;
    let variance = (sum_sq as f64 / n - mean * mean).max(0.0);

    CellScore {
        region,
        variance,
        skin_ratio: skin as f64 / n,
    }
}

/// Rec. 601 luma, rounded to the nearest integer.
pub fn luminance(px: &Rgba<u8>) -> u8 {
    let [r, g, b, _] = px.0;
    (0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b)).round() as u8
}

/// Coarse RGB skin test. Not colorimetrically rigorous.
pub fn is_skin(px: &Rgba<u8>) -> bool {
    let [r, g, b, _] = px.0;
    let (r, g, b) = (i16::from(r), i16::from(g), i16::from(b));
    r > 90 && g > 40 && b > 20 && r - g > 15 && r - b > 15
}

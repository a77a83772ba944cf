//! # agv-proc
//!
//! Builds a branded card from the identity document image of a DNI. The
//! document comes from an upstream service; the output is a PNG served back
//! over HTTP together with the recognised text.
//!
//! # Architecture: One Request, Five Stages
//!
//! ```text
//! 1. Fetch     dni        →  source bytes    (upstream: image or JSON + urls.FILE)
//! 2. OCR       bytes      →  text lines      (tesseract subprocess, failure absorbed)
//! 3. Scan      raster     →  candidates      (grid cells ranked by variance + skin)
//! 4. Render    all above  →  PNG             (background, logo, thumbnails, text, footer)
//! 5. Persist   PNG        →  public URL      (output_dir, served under static_prefix)
//! ```
//!
//! Stages 3 and 4 are pure functions of pixels and configuration: identical
//! input produces an identical card. The I/O stages sit behind traits
//! ([`upstream::Upstream`], [`ocr::TextRecognizer`], [`store::AssetStore`])
//! so the pipeline can be tested with recording mocks.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`server`] | axum routes, JSON bodies, error → status mapping |
//! | [`pipeline`] | Runs the five stages for one DNI |
//! | [`upstream`] | reqwest client for the document service |
//! | [`ocr`] | Text recognition trait and the tesseract implementation |
//! | [`imaging`] | Grid scanner, layout engine, compositor, asset loading |
//! | [`store`] | Writes generated files and builds their public URLs |
//! | [`config`] | `agv-proc.toml` loading, merging over stock defaults, validation |
//! | [`types`] | Shared values: `Region`, `Candidate`, `TextLine`, `Dni` |
//! | [`output`] | CLI output formatting for `scan` and `render` |
//!
//! # Design Decisions
//!
//! ## Degrade, Don't Fail
//!
//! The card is useful without text or a logo. OCR failures, a missing logo
//! and thumbnails that cannot be cut are recorded in
//! [`ocr::OcrOutcome`] and [`imaging::RenderReport`] and the request
//! continues. Only a missing font, a corrupt background template, an
//! undecodable source or an I/O failure ends a request with an error.
//!
//! ## Heuristic Photo Detection
//!
//! Photos on the card are found with two per-cell statistics over a fixed
//! grid rather than a trained detector. It is tuned to one document layout
//! and makes no accuracy claims; what it guarantees is reproducibility. The
//! thresholds live in `[scanner]` so they can be tuned per deployment with
//! `agv-proc scan`.
//!
//! ## Assets Read Per Render
//!
//! Font, background and logo are loaded on each render. The server starts
//! without them, and replacing a file on disk takes effect on the next
//! request.

pub mod config;
pub mod imaging;
pub mod ocr;
pub mod output;
pub mod pipeline;
pub mod server;
pub mod store;
pub mod types;
pub mod upstream;

#[cfg(test)]
pub(crate) mod test_helpers;

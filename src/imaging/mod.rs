//! Image processing: detection, layout and composition.
//!
//! | Stage | Module | Core call |
//! |---|---|---|
//! | **Detect** | [`scanner`] | [`GridScanner::detect`] |
//! | **Lay out** | [`layout`] | [`LayoutPlan::thumbnail_slots`], [`LayoutPlan::flow_text`] |
//! | **Compose** | [`compositor`] | [`Compositor::render`] |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Assets**: Font, background and logo loading with per-asset failure policy
//! - **Scanner**, **Layout**: pure functions of pixels and configuration
//! - **Compositor**: paints the canvas and encodes the PNG

pub mod assets;
mod calculations;
pub mod compositor;
pub mod layout;
pub mod scanner;

pub use compositor::{
    Compositor, LogoOutcome, RenderError, RenderOutput, RenderReport, RenderRequest, SkipReason,
    SkippedThumbnail, decode_source,
};
pub use layout::{FontMeasure, LayoutPlan, TextFlow, TextMeasure};
pub use scanner::{CellScore, GridScanner};

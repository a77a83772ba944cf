//! Canvas geometry: where text and thumbnails go.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ title                                   logo │
//! │                                              │  ← top_offset
//! │ ┌─ text region ─────┐ gap ┌─ thumbnails ───┐ │
//! │ │ col 0   │ col 1   │     │ ▢  ▢  ▢        │ │
//! │ │         │         │     │ ▢  ▢  ▢        │ │
//! │ └─────────┴─────────┘     └────────────────┘ │  ← height − footer_margin
//! │ footer                                       │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! A [`LayoutPlan`] is derived from the [`CanvasConfig`] alone; it has no
//! state beyond the numbers it was built from. Text width is measured
//! through [`TextMeasure`] so wrapping can be tested without a font.

use super::calculations::height_for_width;
use crate::config::CanvasConfig;
use crate::types::{Region, TextLine};
use ab_glyph::{Font, FontVec, PxScale, ScaleFont};

/// Rendered width of a string.
pub trait TextMeasure {
    fn width(&self, text: &str) -> f32;
}

/// Measures text by summing glyph advances of a font at a given scale.
pub struct FontMeasure<'a> {
    font: &'a FontVec,
    scale: PxScale,
}

impl<'a> FontMeasure<'a> {
    pub fn new(font: &'a FontVec, size: f32) -> Self {
        Self {
            font,
            scale: PxScale::from(size),
        }
    }
}

impl TextMeasure for FontMeasure<'_> {
    fn width(&self, text: &str) -> f32 {
        let scaled = self.font.as_scaled(self.scale);
        text.chars()
            .map(|ch| scaled.h_advance(scaled.glyph_id(ch)))
            .sum()
    }
}

/// One text column of the left region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextColumn {
    pub x: f32,
    pub width: f32,
}

/// Target rectangle of one thumbnail on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// A wrapped line with its canvas position (top-left of the text box).
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    pub column: usize,
    pub x: f32,
    pub y: f32,
}

/// Result of flowing text through the columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextFlow {
    pub lines: Vec<PlacedLine>,
    /// True when lines were dropped because every column was full.
    pub truncated: bool,
}

/// Geometry of one render.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutPlan {
    pub width: u32,
    pub height: u32,
    pub margin: u32,
    pub columns: Vec<TextColumn>,
    pub thumb_x: f32,
    pub thumb_width: f32,
    pub thumb_cols: u32,
    pub gap: f32,
    /// Y where text and thumbnails start.
    pub top: f32,
    /// Text flow moves to the next column once the cursor passes this Y.
    pub bottom_limit: f32,
    pub line_height: f32,
    pub footer_y: f32,
}

impl LayoutPlan {
    pub fn new(canvas: &CanvasConfig) -> Self {
        let width = canvas.width as f32;
        let margin = canvas.margin as f32;
        let gap = canvas.gap as f32;

        let text_x = margin;
        let text_width = (f64::from(canvas.width) * canvas.text_fraction) as f32;
        let n = canvas.text_columns.max(1);
        let column_gap = canvas.column_gap as f32;
        let column_width = ((text_width - (n - 1) as f32 * column_gap) / n as f32).max(1.0);
        let columns = (0..n)
            .map(|i| TextColumn {
                x: text_x + i as f32 * (column_width + column_gap),
                width: column_width,
            })
            .collect();

        let thumb_x = text_x + text_width + gap;
        let thumb_width = (width - thumb_x - margin).max(0.0);

        Self {
            width: canvas.width,
            height: canvas.height,
            margin: canvas.margin,
            columns,
            thumb_x,
            thumb_width,
            thumb_cols: canvas.thumb_cols.max(1),
            gap,
            top: canvas.top_offset as f32,
            bottom_limit: canvas.height.saturating_sub(canvas.footer_margin) as f32,
            line_height: canvas.text_size * canvas.line_spacing,
            footer_y: canvas.height.saturating_sub(canvas.footer_offset) as f32,
        }
    }

    /// Width of one thumbnail cell.
    pub fn thumb_cell_width(&self) -> f32 {
        let cols = self.thumb_cols as f32;
        ((self.thumb_width - (cols - 1.0) * self.gap) / cols)
            .floor()
            .max(0.0)
    }

    /// Lay out thumbnails for the given source regions, row by row.
    ///
    /// Each cell keeps its region's aspect ratio at the common cell width.
    /// The row advance is the tallest cell of the row times 1.05, plus the
    /// gap. Returns at most one slot per region, in order; placement stops
    /// at the first slot whose top edge passes the footer line.
    pub fn thumbnail_slots(&self, regions: &[Region]) -> Vec<Slot> {
        let cell_w = self.thumb_cell_width();
        let cols = self.thumb_cols as usize;
        let mut slots = Vec::with_capacity(regions.len());
        let mut y = self.top;
        let mut row_advance = 0.0f32;

        for (i, region) in regions.iter().enumerate() {
            let col = i % cols;
            if col == 0 && i > 0 {
                y += row_advance + self.gap;
                row_advance = 0.0;
            }
            if y > self.bottom_limit {
                break;
            }
            let cell_h = height_for_width((region.width, region.height), f64::from(cell_w)) as f32;
            row_advance = row_advance.max(cell_h * 1.05);
            slots.push(Slot {
                x: (self.thumb_x + col as f32 * (cell_w + self.gap)).round() as u32,
                y: y.round() as u32,
                width: cell_w as u32,
                height: cell_h as u32,
            });
        }
        slots
    }

    /// Greedy word wrap of `lines` into the text columns.
    ///
    /// Every source line starts a new printed line. Words are never split:
    /// a word wider than the column sits alone on its line. When all
    /// columns are full the rest is dropped and `truncated` is set.
    pub fn flow_text(&self, lines: &[TextLine], measure: &impl TextMeasure) -> TextFlow {
        let mut flow = TextFlow::default();
        let mut cursor = FlowCursor {
            column: 0,
            y: self.top,
        };

        for line in lines {
            let mut current = String::new();
            for word in line.as_str().split_whitespace() {
                if current.is_empty() {
                    current.push_str(word);
                    continue;
                }
                let extended = format!("{current} {word}");
                let limit = self.columns.get(cursor.column).map_or(0.0, |c| c.width);
                if measure.width(&extended) <= limit {
                    current = extended;
                } else {
                    if !self.place(&mut flow, &mut cursor, std::mem::take(&mut current)) {
                        flow.truncated = true;
                        return flow;
                    }
                    current.push_str(word);
                }
            }
            if !current.is_empty() && !self.place(&mut flow, &mut cursor, current) {
                flow.truncated = true;
                return flow;
            }
        }
        flow
    }

    /// Place one printed line at the cursor. Returns false when no column
    /// is left.
    fn place(&self, flow: &mut TextFlow, cursor: &mut FlowCursor, text: String) -> bool {
        let Some(column) = self.columns.get(cursor.column) else {
            return false;
        };
        flow.lines.push(PlacedLine {
            text,
            column: cursor.column,
            x: column.x,
            y: cursor.y,
        });
        cursor.y += self.line_height;
        if cursor.y > self.bottom_limit {
            cursor.column += 1;
            cursor.y = self.top;
        }
        true
    }

    /// Top-left corner of the title.
    pub fn title_origin(&self) -> (i32, i32) {
        (self.margin as i32, self.margin as i32)
    }

    /// Top-left corner of a logo of the given width, anchored top-right.
    pub fn logo_origin(&self, logo_width: u32) -> (i64, i64) {
        (
            i64::from(self.width) - i64::from(self.margin) - i64::from(logo_width),
            i64::from(self.margin),
        )
    }

    /// Top-left corner of the footer text.
    pub fn footer_origin(&self) -> (i32, i32) {
        (self.margin as i32, self.footer_y as i32)
    }
}

struct FlowCursor {
    column: usize,
    y: f32,
}

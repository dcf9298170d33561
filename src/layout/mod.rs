//! Windowed text layout.
//!
//! This module handles:
//! - Splitting chapter text into indented paragraphs
//! - Breaking paragraphs into line boxes through a [`TextMeasurer`]
//! - Keeping a bounded window of laid-out chapters that grows and evicts
//!   at its ends as the reader scrolls
//! - Pixel scroll state for the window

mod oracle;
mod paragraph;
pub mod viewport;
mod window;

pub use oracle::{CellMetrics, LineMetrics, TextMeasurer};
pub use paragraph::{ChapterSlot, LineBox, ParagraphLayout, split_paragraphs};
pub use viewport::Viewport;
pub use window::{
    ChapterWindow, DEFAULT_MAX_SLOTS, EdgeDemand, Eviction, GrowOutcome, Side, VisibleRow,
    WindowConfig, WindowError,
};

/// Indent placed before every paragraph: two ideographic spaces.
pub const DEFAULT_INDENT: &str = "\u{3000}\u{3000}";

const MIN_FONT_SIZE: f64 = 10.0;
const MIN_LINE_SPACING: f64 = 0.5;

/// Typography knobs that affect layout.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutStyle {
    pub font_size: f64,
    /// Multiplier applied to each line's natural height.
    pub line_spacing: f64,
    /// Extra advance after each character.
    pub letter_spacing: f64,
    /// Vertical gap between paragraphs.
    pub paragraph_spacing: f64,
    pub indent: String,
}

impl Default for LayoutStyle {
    fn default() -> Self {
        Self::with_font_size(16.0)
    }
}

impl LayoutStyle {
    /// Defaults at `font_size`; paragraph spacing follows the font size.
    pub fn with_font_size(font_size: f64) -> Self {
        Self {
            font_size,
            line_spacing: 1.5,
            letter_spacing: 1.5,
            paragraph_spacing: font_size,
            indent: DEFAULT_INDENT.to_string(),
        }
    }

    /// Change the font size (never below 10), keeping paragraph spacing in step.
    pub fn set_font_size(&mut self, font_size: f64) {
        self.font_size = font_size.max(MIN_FONT_SIZE);
        self.paragraph_spacing = self.font_size;
    }

    pub fn increase_font_size(&mut self) {
        self.set_font_size(self.font_size + 2.0);
    }

    pub fn decrease_font_size(&mut self) {
        self.set_font_size(self.font_size - 2.0);
    }

    pub fn increase_line_spacing(&mut self) {
        self.line_spacing += 0.1;
    }

    pub fn decrease_line_spacing(&mut self) {
        self.line_spacing = (self.line_spacing - 0.1).max(MIN_LINE_SPACING);
    }

    pub fn increase_letter_spacing(&mut self) {
        self.letter_spacing += 0.5;
    }

    pub fn decrease_letter_spacing(&mut self) {
        self.letter_spacing = (self.letter_spacing - 0.5).max(0.0);
    }
}

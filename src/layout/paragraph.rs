//! Chapter and paragraph geometry.

use std::ops::Range;

use super::{LayoutStyle, TextMeasurer};

/// Split chapter text into trimmed, non-empty paragraphs.
///
/// Blank lines never become paragraphs.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    text.trim()
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// A laid-out line within a paragraph.
#[derive(Debug, Clone, PartialEq)]
pub struct LineBox {
    /// Characters of the paragraph's display text (indent included).
    pub chars: Range<usize>,
    /// Top of the line relative to the paragraph.
    pub y: f64,
    pub height: f64,
}

/// One paragraph broken into lines.
///
/// Character positions exposed to callers index the source text; the
/// display text is the source with the style's indent in front.
#[derive(Debug, Clone)]
pub struct ParagraphLayout {
    source_text: String,
    display_text: String,
    indent_chars: usize,
    char_count: usize,
    lines: Vec<LineBox>,
    height: f64,
    y: f64,
}

impl ParagraphLayout {
    /// Lay out `source_text`.
    pub fn new<M: TextMeasurer + ?Sized>(
        source_text: String,
        measurer: &M,
        width: f64,
        style: &LayoutStyle,
    ) -> Self {
        let char_count = source_text.chars().count();
        let mut paragraph = Self {
            source_text,
            display_text: String::new(),
            indent_chars: 0,
            char_count,
            lines: Vec::new(),
            height: 0.0,
            y: 0.0,
        };
        paragraph.relayout(measurer, width, style);
        paragraph
    }

    /// Re-break lines for a new width or style.
    pub fn relayout<M: TextMeasurer + ?Sized>(
        &mut self,
        measurer: &M,
        width: f64,
        style: &LayoutStyle,
    ) {
        self.indent_chars = style.indent.chars().count();
        self.display_text = format!("{}{}", style.indent, self.source_text);

        let mut y = 0.0;
        self.lines = measurer
            .break_lines(&self.display_text, width, style)
            .into_iter()
            .map(|metrics| {
                let height = metrics.height * style.line_spacing;
                let line = LineBox {
                    chars: metrics.chars,
                    y,
                    height,
                };
                y += height;
                line
            })
            .collect();
        self.height = y;
    }

    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    pub fn display_text(&self) -> &str {
        &self.display_text
    }

    /// Number of characters in the source text.
    pub const fn char_count(&self) -> usize {
        self.char_count
    }

    pub fn lines(&self) -> &[LineBox] {
        &self.lines
    }

    pub const fn height(&self) -> f64 {
        self.height
    }

    /// Top of the paragraph relative to its chapter.
    pub const fn y(&self) -> f64 {
        self.y
    }

    /// Display-text character index to source-text character index.
    ///
    /// Positions inside the indent collapse to the first source character.
    pub fn to_source(&self, display_char: usize) -> usize {
        display_char
            .saturating_sub(self.indent_chars)
            .min(self.char_count)
    }

    pub const fn to_display(&self, source_char: usize) -> usize {
        source_char + self.indent_chars
    }

    /// Source text for a character range, clamped to the paragraph.
    pub fn slice_source(&self, chars: Range<usize>) -> &str {
        slice_chars(&self.source_text, chars)
    }

    /// Display text of line `line`.
    pub fn line_text(&self, line: usize) -> &str {
        self.lines
            .get(line)
            .map_or("", |l| slice_chars(&self.display_text, l.chars.clone()))
    }

    /// Index of the line containing paragraph-relative `y`, clamped.
    pub fn line_at_y(&self, y: f64) -> usize {
        let idx = self.lines.partition_point(|line| line.y + line.height <= y);
        idx.min(self.lines.len().saturating_sub(1))
    }
}

/// Slice by character indices, clamping both ends.
fn slice_chars(text: &str, chars: Range<usize>) -> &str {
    let byte_at = |char_idx: usize| {
        text.char_indices()
            .nth(char_idx)
            .map_or(text.len(), |(byte, _)| byte)
    };
    let start = byte_at(chars.start);
    let end = byte_at(chars.end.max(chars.start));
    &text[start..end]
}

/// One chapter materialised in the window.
#[derive(Debug, Clone)]
pub struct ChapterSlot {
    chapter_index: usize,
    paragraphs: Vec<ParagraphLayout>,
    height: f64,
    y: f64,
}

impl ChapterSlot {
    /// Split and lay out a chapter's text.
    pub fn new<M: TextMeasurer + ?Sized>(
        chapter_index: usize,
        text: &str,
        measurer: &M,
        width: f64,
        style: &LayoutStyle,
    ) -> Self {
        let paragraphs = split_paragraphs(text)
            .into_iter()
            .map(|source| ParagraphLayout::new(source, measurer, width, style))
            .collect();
        let mut slot = Self {
            chapter_index,
            paragraphs,
            height: 0.0,
            y: 0.0,
        };
        slot.stack_paragraphs(style);
        slot
    }

    pub fn relayout<M: TextMeasurer + ?Sized>(
        &mut self,
        measurer: &M,
        width: f64,
        style: &LayoutStyle,
    ) {
        for paragraph in &mut self.paragraphs {
            paragraph.relayout(measurer, width, style);
        }
        self.stack_paragraphs(style);
    }

    /// Assign paragraph offsets and the chapter height.
    fn stack_paragraphs(&mut self, style: &LayoutStyle) {
        let mut y = 0.0;
        for paragraph in &mut self.paragraphs {
            paragraph.y = y;
            y += paragraph.height + style.paragraph_spacing;
        }
        self.height = if self.paragraphs.is_empty() {
            0.0
        } else {
            y - style.paragraph_spacing
        };
    }

    pub const fn chapter_index(&self) -> usize {
        self.chapter_index
    }

    pub fn paragraphs(&self) -> &[ParagraphLayout] {
        &self.paragraphs
    }

    pub const fn height(&self) -> f64 {
        self.height
    }

    /// Top of the chapter in document coordinates.
    pub const fn y(&self) -> f64 {
        self.y
    }

    pub(super) const fn set_y(&mut self, y: f64) {
        self.y = y;
    }

    /// Paragraph containing chapter-relative `y`.
    ///
    /// A point in the gap between two paragraphs maps to the one below.
    pub fn paragraph_at_y(&self, y: f64) -> Option<usize> {
        if self.paragraphs.is_empty() {
            return None;
        }
        let idx = self
            .paragraphs
            .partition_point(|paragraph| paragraph.y + paragraph.height <= y);
        Some(idx.min(self.paragraphs.len() - 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::CellMetrics;

    fn style() -> LayoutStyle {
        LayoutStyle {
            letter_spacing: 0.0,
            line_spacing: 1.0,
            paragraph_spacing: 10.0,
            ..LayoutStyle::default()
        }
    }

    #[test]
    fn test_split_drops_blank_lines_and_trims() {
        let paragraphs = split_paragraphs("\n  第一段  \r\n\n\u{3000}\u{3000}第二段\n   \n第三段\n");
        assert_eq!(paragraphs, vec!["第一段", "第二段", "第三段"]);
    }

    #[test]
    fn test_split_whitespace_only_is_empty() {
        assert!(split_paragraphs(" \n\r\n\t").is_empty());
    }

    #[test]
    fn test_paragraph_prefixes_indent() {
        let p = ParagraphLayout::new("正文".to_string(), &CellMetrics::default(), 400.0, &style());
        assert_eq!(p.display_text(), "\u{3000}\u{3000}正文");
        assert_eq!(p.char_count(), 2);
        assert_eq!(p.to_source(0), 0);
        assert_eq!(p.to_source(3), 1);
        assert_eq!(p.to_display(1), 3);
    }

    #[test]
    fn test_paragraph_height_sums_lines() {
        // Indent + 6 ideographs = 8 full-width chars = 128px; 64px per line.
        let p = ParagraphLayout::new(
            "一二三四五六".to_string(),
            &CellMetrics::default(),
            64.0,
            &style(),
        );
        assert_eq!(p.lines().len(), 2);
        assert!((p.height() - 32.0).abs() < f64::EPSILON);
        assert!((p.lines()[1].y - 16.0).abs() < f64::EPSILON);
        assert_eq!(p.line_text(1), "三四五六");
    }

    #[test]
    fn test_line_spacing_multiplies_height() {
        let spaced = LayoutStyle {
            line_spacing: 1.5,
            ..style()
        };
        let p = ParagraphLayout::new("一".to_string(), &CellMetrics::default(), 400.0, &spaced);
        assert!((p.height() - 24.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_chapter_height_includes_gaps_between_paragraphs() {
        let slot = ChapterSlot::new(3, "甲\n\n乙\n丙", &CellMetrics::default(), 400.0, &style());
        assert_eq!(slot.chapter_index(), 3);
        assert_eq!(slot.paragraphs().len(), 3);
        // 3 lines of 16px + 2 gaps of 10px
        assert!((slot.height() - 68.0).abs() < f64::EPSILON);
        assert!((slot.paragraphs()[2].y() - 52.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_chapter_has_zero_height() {
        let slot = ChapterSlot::new(0, "  \n ", &CellMetrics::default(), 400.0, &style());
        assert!(slot.paragraphs().is_empty());
        assert!(slot.height().abs() < f64::EPSILON);
    }

    #[test]
    fn test_paragraph_at_y_maps_gaps_downward() {
        let slot = ChapterSlot::new(0, "甲\n乙", &CellMetrics::default(), 400.0, &style());
        assert_eq!(slot.paragraph_at_y(5.0), Some(0));
        assert_eq!(slot.paragraph_at_y(20.0), Some(1));
        assert_eq!(slot.paragraph_at_y(1000.0), Some(1));
    }

    #[test]
    fn test_slice_source_clamps() {
        let p = ParagraphLayout::new("abcdef".to_string(), &CellMetrics::default(), 400.0, &style());
        assert_eq!(p.slice_source(2..4), "cd");
        assert_eq!(p.slice_source(4..100), "ef");
        assert_eq!(p.slice_source(5..2), "");
    }
}

//! Glyph metrics and line breaking.
//!
//! Layout never measures text itself; it asks a [`TextMeasurer`]. A GUI
//! host would back this with its font shaper. [`CellMetrics`] is the
//! fixed-pitch implementation used by the CLI and the tests: every
//! character occupies one or two cells according to its Unicode width.

use std::ops::Range;

use unicode_width::UnicodeWidthChar;

use super::LayoutStyle;

/// One line produced by [`TextMeasurer::break_lines`].
#[derive(Debug, Clone, PartialEq)]
pub struct LineMetrics {
    /// Character indices (not bytes) covered by the line.
    pub chars: Range<usize>,
    /// Natural line height before line spacing is applied.
    pub height: f64,
}

/// Line-breaking and hit-testing oracle.
pub trait TextMeasurer {
    /// Break `text` into lines no wider than `width`.
    ///
    /// Lines must be contiguous and cover every character; non-empty text
    /// always yields at least one line.
    fn break_lines(&self, text: &str, width: f64, style: &LayoutStyle) -> Vec<LineMetrics>;

    /// Horizontal position of the boundary before `char_index` on `line`.
    fn char_to_x(
        &self,
        text: &str,
        line: &Range<usize>,
        char_index: usize,
        style: &LayoutStyle,
    ) -> f64;

    /// Nearest character boundary to `x` on `line`.
    fn x_to_char(&self, text: &str, line: &Range<usize>, x: f64, style: &LayoutStyle) -> usize;
}

/// Fixed-pitch metrics.
///
/// A half-width character advances `cell_width`, a full-width one twice
/// that, both scaled by `font_size / base_font_size`. Letter spacing is
/// added after every visible character.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellMetrics {
    pub cell_width: f64,
    pub cell_height: f64,
    pub base_font_size: f64,
}

impl CellMetrics {
    pub const fn new(cell_width: f64, cell_height: f64, base_font_size: f64) -> Self {
        Self {
            cell_width,
            cell_height,
            base_font_size,
        }
    }

    /// One column per cell and one row per line at `font_size`.
    pub const fn terminal(font_size: f64) -> Self {
        Self::new(1.0, 1.0, font_size)
    }

    fn scale(&self, style: &LayoutStyle) -> f64 {
        if self.base_font_size > 0.0 {
            style.font_size / self.base_font_size
        } else {
            1.0
        }
    }

    fn advance(&self, ch: char, style: &LayoutStyle) -> f64 {
        let cells = ch.width().unwrap_or(0);
        if cells == 0 {
            return 0.0;
        }
        (cells as f64).mul_add(self.cell_width * self.scale(style), style.letter_spacing)
    }
}

impl Default for CellMetrics {
    fn default() -> Self {
        Self::new(8.0, 16.0, 16.0)
    }
}

impl TextMeasurer for CellMetrics {
    fn break_lines(&self, text: &str, width: f64, style: &LayoutStyle) -> Vec<LineMetrics> {
        let height = self.cell_height * self.scale(style);
        let mut lines = Vec::new();
        let mut line_start = 0usize;
        let mut line_width = 0.0;
        // Index just past the last whitespace that follows a word.
        let mut soft_break: Option<(usize, f64)> = None;
        let mut has_word = false;

        for (i, ch) in text.chars().enumerate() {
            let advance = self.advance(ch, style);
            let overflows = line_width + advance > width && i > line_start;
            // Whitespace hangs past the margin instead of starting a line.
            if overflows && !ch.is_whitespace() {
                let (break_at, carried) = match soft_break {
                    Some((at, width_before)) if at > line_start => (at, line_width - width_before),
                    _ => (i, 0.0),
                };
                lines.push(LineMetrics {
                    chars: line_start..break_at,
                    height,
                });
                line_start = break_at;
                line_width = carried;
                soft_break = None;
                has_word = break_at < i;
            }
            line_width += advance;
            if !ch.is_whitespace() {
                has_word = true;
            } else if has_word {
                soft_break = Some((i + 1, line_width));
            }
        }

        let total = text.chars().count();
        if total > line_start || lines.is_empty() {
            lines.push(LineMetrics {
                chars: line_start..total,
                height,
            });
        }
        lines
    }

    fn char_to_x(
        &self,
        text: &str,
        line: &Range<usize>,
        char_index: usize,
        style: &LayoutStyle,
    ) -> f64 {
        let upto = char_index.clamp(line.start, line.end);
        text.chars()
            .skip(line.start)
            .take(upto - line.start)
            .map(|ch| self.advance(ch, style))
            .sum()
    }

    fn x_to_char(&self, text: &str, line: &Range<usize>, x: f64, style: &LayoutStyle) -> usize {
        let mut left = 0.0;
        for (offset, ch) in text.chars().skip(line.start).take(line.len()).enumerate() {
            let advance = self.advance(ch, style);
            if x < advance.mul_add(0.5, left) {
                return line.start + offset;
            }
            left += advance;
        }
        line.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style() -> LayoutStyle {
        LayoutStyle {
            letter_spacing: 0.0,
            ..LayoutStyle::default()
        }
    }

    fn ranges(lines: &[LineMetrics]) -> Vec<Range<usize>> {
        lines.iter().map(|l| l.chars.clone()).collect()
    }

    #[test]
    fn test_cjk_wraps_anywhere() {
        let metrics = CellMetrics::default();
        // Full-width chars are 16px; 40px fits two per line.
        let lines = metrics.break_lines("一二三四五", 40.0, &style());
        assert_eq!(ranges(&lines), vec![0..2, 2..4, 4..5]);
    }

    #[test]
    fn test_latin_prefers_word_boundaries() {
        let metrics = CellMetrics::default();
        // 8px per char, 80px = 10 chars per line.
        let lines = metrics.break_lines("hello there world", 80.0, &style());
        assert_eq!(ranges(&lines), vec![0..6, 6..12, 12..17]);
    }

    #[test]
    fn test_leading_indent_is_not_a_break_point() {
        let metrics = CellMetrics::default();
        let lines = metrics.break_lines("\u{3000}\u{3000}一二三四五六", 64.0, &style());
        assert_eq!(ranges(&lines), vec![0..4, 4..8]);
    }

    #[test]
    fn test_overlong_word_breaks_mid_word() {
        let metrics = CellMetrics::default();
        let lines = metrics.break_lines("abcdefghijkl", 40.0, &style());
        assert_eq!(ranges(&lines), vec![0..5, 5..10, 10..12]);
    }

    #[test]
    fn test_empty_text_yields_one_empty_line() {
        let metrics = CellMetrics::default();
        let lines = metrics.break_lines("", 100.0, &style());
        assert_eq!(ranges(&lines), vec![0..0]);
    }

    #[test]
    fn test_zero_width_still_progresses() {
        let metrics = CellMetrics::default();
        let lines = metrics.break_lines("abc", 0.0, &style());
        assert_eq!(ranges(&lines), vec![0..1, 1..2, 2..3]);
    }

    #[test]
    fn test_line_height_scales_with_font() {
        let metrics = CellMetrics::default();
        let big = LayoutStyle {
            font_size: 32.0,
            ..style()
        };
        let lines = metrics.break_lines("a", 100.0, &big);
        assert!((lines[0].height - 32.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_x_to_char_rounds_to_nearest_boundary() {
        let metrics = CellMetrics::default();
        let line = 0..4;
        assert_eq!(metrics.x_to_char("abcd", &line, 3.0, &style()), 0);
        assert_eq!(metrics.x_to_char("abcd", &line, 5.0, &style()), 1);
        assert_eq!(metrics.x_to_char("abcd", &line, 500.0, &style()), 4);
    }

    #[test]
    fn test_char_to_x_accumulates_advances() {
        let metrics = CellMetrics::default();
        let x = metrics.char_to_x("a一b", &(0..3), 2, &style());
        assert!((x - 24.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_letter_spacing_widens_advance() {
        let metrics = CellMetrics::default();
        let spaced = LayoutStyle {
            letter_spacing: 2.0,
            ..style()
        };
        let x = metrics.char_to_x("ab", &(0..2), 2, &spaced);
        assert!((x - 20.0).abs() < f64::EPSILON);
    }
}

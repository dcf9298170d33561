//! Hit-testing and text selection over the chapter window.
//!
//! Positions are `(slot, paragraph, char)` triples compared
//! lexicographically. Paragraph and character indices only mean something
//! inside their own slot and paragraph, so no other ordering is valid.
//! Character indices count source characters; the paragraph indent is not
//! addressable.

use std::ops::Range;

use crate::layout::{ChapterWindow, GrowOutcome, Side, TextMeasurer};

/// A structured address into the resident window.
///
/// Field order is the comparison order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TextPosition {
    pub slot: usize,
    pub paragraph: usize,
    pub char_index: usize,
}

impl TextPosition {
    pub const fn new(slot: usize, paragraph: usize, char_index: usize) -> Self {
        Self {
            slot,
            paragraph,
            char_index,
        }
    }

    const fn block(&self) -> (usize, usize) {
        (self.slot, self.paragraph)
    }
}

/// Anchor/cursor selection driven by pointer events.
///
/// `None` endpoints are invalid (never set, or their slot was evicted).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    anchor: Option<TextPosition>,
    cursor: Option<TextPosition>,
    active: bool,
}

impl Selection {
    pub const fn new() -> Self {
        Self {
            anchor: None,
            cursor: None,
            active: false,
        }
    }

    /// Pointer down: start a new selection at `position`.
    pub const fn begin(&mut self, position: TextPosition) {
        self.anchor = Some(position);
        self.cursor = Some(position);
        self.active = true;
    }

    /// Pointer move: extend while active.
    pub const fn update(&mut self, position: TextPosition) {
        if self.active {
            self.cursor = Some(position);
        }
    }

    /// Pointer up.
    pub const fn finish(&mut self) {
        self.active = false;
    }

    pub const fn clear(&mut self) {
        *self = Self::new();
    }

    pub const fn is_active(&self) -> bool {
        self.active
    }

    pub const fn anchor(&self) -> Option<TextPosition> {
        self.anchor
    }

    pub const fn cursor(&self) -> Option<TextPosition> {
        self.cursor
    }

    /// Ordered `[start, end)` bounds, if both ends are valid and distinct.
    pub fn range(&self) -> Option<(TextPosition, TextPosition)> {
        let (anchor, cursor) = (self.anchor?, self.cursor?);
        match anchor.cmp(&cursor) {
            std::cmp::Ordering::Less => Some((anchor, cursor)),
            std::cmp::Ordering::Greater => Some((cursor, anchor)),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.range().is_none()
    }

    /// Selected source characters of one paragraph, for highlighting.
    pub fn highlight_range(
        &self,
        slot: usize,
        paragraph: usize,
        char_count: usize,
    ) -> Option<Range<usize>> {
        let (start, end) = self.range()?;
        let here = (slot, paragraph);
        if here < start.block() || here > end.block() {
            return None;
        }
        let from = if here == start.block() {
            start.char_index
        } else {
            0
        };
        let to = if here == end.block() {
            end.char_index
        } else {
            char_count
        };
        (from < to).then_some(from..to)
    }

    /// Re-index endpoints after the window grew.
    ///
    /// `slot_count` is the window length after the grow. Endpoints in an
    /// evicted slot become invalid.
    pub fn apply(&mut self, outcome: &GrowOutcome, slot_count: usize) {
        if outcome.is_noop() {
            return;
        }
        let shift = |position: Option<TextPosition>| {
            let mut position = position?;
            match outcome.side {
                Side::Front => {
                    position.slot += 1;
                    if position.slot >= slot_count {
                        return None;
                    }
                }
                Side::Back => {
                    if outcome.evicted.is_some() {
                        position.slot = position.slot.checked_sub(1)?;
                    }
                }
            }
            Some(position)
        };
        self.anchor = shift(self.anchor);
        self.cursor = shift(self.cursor);
        if self.anchor.is_none() || self.cursor.is_none() {
            tracing::debug!("selection endpoint evicted");
        }
    }
}

/// Map a viewport point to a text position.
///
/// Points above the window clamp to the start, points below to the end of
/// the last paragraph, and points in gaps to the paragraph below. Only an
/// empty window gives `None`.
pub fn point_to_position<M: TextMeasurer>(
    window: &ChapterWindow<M>,
    x: f64,
    y: f64,
) -> Option<TextPosition> {
    let doc_y = y + window.viewport().offset();
    if doc_y < 0.0 {
        return window.slot(0).map(|_| TextPosition::default());
    }
    if doc_y >= window.total_height() {
        let slot = window.len().checked_sub(1)?;
        let paragraphs = window.slot(slot)?.paragraphs();
        let paragraph = paragraphs.len().checked_sub(1)?;
        return Some(TextPosition::new(
            slot,
            paragraph,
            paragraphs[paragraph].char_count(),
        ));
    }

    let slot_idx = window.slot_at_y(doc_y)?;
    let slot = window.slot(slot_idx)?;
    let para_idx = slot.paragraph_at_y(doc_y - slot.y())?;
    let paragraph = slot.paragraphs().get(para_idx)?;
    let line = paragraph
        .lines()
        .get(paragraph.line_at_y(doc_y - slot.y() - paragraph.y()))?;
    let display_char = window.measurer().x_to_char(
        paragraph.display_text(),
        &line.chars,
        x,
        window.style(),
    );
    Some(TextPosition::new(
        slot_idx,
        para_idx,
        paragraph.to_source(display_char),
    ))
}

/// Viewport point at the left edge of `position`, on its line's top.
pub fn position_to_point<M: TextMeasurer>(
    window: &ChapterWindow<M>,
    position: TextPosition,
) -> Option<(f64, f64)> {
    let slot = window.slot(position.slot)?;
    let paragraph = slot.paragraphs().get(position.paragraph)?;
    let display_char = paragraph.to_display(position.char_index.min(paragraph.char_count()));
    let lines = paragraph.lines();
    let line_idx = lines
        .partition_point(|line| line.chars.start <= display_char)
        .saturating_sub(1);
    let line = lines.get(line_idx)?;
    let x = window.measurer().char_to_x(
        paragraph.display_text(),
        &line.chars,
        display_char,
        window.style(),
    );
    let y = slot.y() + paragraph.y() + line.y - window.viewport().offset();
    Some((x, y))
}

/// Text covered by `selection`, one line per paragraph touched.
pub fn selected_text<M: TextMeasurer>(window: &ChapterWindow<M>, selection: &Selection) -> String {
    let Some((start, end)) = selection.range() else {
        return String::new();
    };

    let mut pieces = Vec::new();
    for slot_idx in start.slot..=end.slot {
        let Some(slot) = window.slot(slot_idx) else {
            break;
        };
        let paragraphs = slot.paragraphs();
        let first = if slot_idx == start.slot {
            start.paragraph
        } else {
            0
        };
        let last = if slot_idx == end.slot {
            end.paragraph
        } else {
            paragraphs.len().saturating_sub(1)
        };
        for para_idx in first..=last {
            let Some(paragraph) = paragraphs.get(para_idx) else {
                break;
            };
            let here = (slot_idx, para_idx);
            let from = if here == start.block() {
                start.char_index
            } else {
                0
            };
            let to = if here == end.block() {
                end.char_index
            } else {
                paragraph.char_count()
            };
            pieces.push(paragraph.slice_source(from..to));
        }
    }
    pieces.join("\n")
}

//! The bounded window of laid-out chapters.
//!
//! The window holds at most `max_slots` consecutive chapters in ascending
//! order. Growing at one end evicts from the other, and because the document
//! origin is the top of the first slot, every change at the front moves the
//! origin. The window rebases its own viewport so the visible text stays
//! still, and reports the delta so callers holding document coordinates can
//! do the same.

use std::collections::VecDeque;
use std::fmt;

use super::{CellMetrics, ChapterSlot, LayoutStyle, TextMeasurer, Viewport};
use crate::index::ChapterSource;

/// Default number of resident chapters.
pub const DEFAULT_MAX_SLOTS: usize = 5;

/// Sizing and prefetch policy for a [`ChapterWindow`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowConfig {
    /// Maximum resident chapters; values below 1 behave as 1.
    pub max_slots: usize,
    /// Distance from either end, as a fraction of the viewport height, at
    /// which the adjacent chapter is wanted.
    pub edge_threshold_ratio: f64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            max_slots: DEFAULT_MAX_SLOTS,
            edge_threshold_ratio: 0.5,
        }
    }
}

impl WindowConfig {
    const fn capacity(&self) -> usize {
        if self.max_slots == 0 { 1 } else { self.max_slots }
    }
}

/// End of the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Front,
    Back,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Front => f.write_str("front"),
            Self::Back => f.write_str("back"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WindowError {
    #[error("chapter {chapter} out of range ({count} chapters)")]
    OutOfRange { chapter: usize, count: usize },
    #[error("chapter {chapter} cannot go at the {side} of chapters {first}..={last}")]
    OutOfOrder {
        chapter: usize,
        side: Side,
        first: usize,
        last: usize,
    },
    #[error("chapter {0} has no displayable text")]
    EmptyContent(usize),
}

/// A slot dropped to keep the window within capacity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Eviction {
    pub chapter: usize,
    pub height: f64,
    /// The end it was removed from.
    pub side: Side,
}

/// What a grow call did to the window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrowOutcome {
    pub side: Side,
    pub chapter: usize,
    /// False when the chapter was already resident.
    pub inserted: bool,
    pub added_height: f64,
    pub evicted: Option<Eviction>,
    /// Amount the document origin moved. Adding it to a stored document
    /// `y` keeps that point on the same text.
    pub scroll_delta: f64,
}

impl GrowOutcome {
    const fn resident(side: Side, chapter: usize) -> Self {
        Self {
            side,
            chapter,
            inserted: false,
            added_height: 0.0,
            evicted: None,
            scroll_delta: 0.0,
        }
    }

    pub const fn is_noop(&self) -> bool {
        !self.inserted
    }
}

/// Chapters the window wants next, given the scroll position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeDemand {
    pub previous: Option<usize>,
    pub next: Option<usize>,
}

impl EdgeDemand {
    pub const fn is_empty(&self) -> bool {
        self.previous.is_none() && self.next.is_none()
    }
}

/// One line inside the viewport, ready to paint.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibleRow<'a> {
    pub chapter: usize,
    pub slot: usize,
    pub paragraph: usize,
    pub line: usize,
    /// Display text of the line, indent included on first lines.
    pub text: &'a str,
    /// Top of the line relative to the viewport.
    pub y: f64,
    pub height: f64,
}

/// Sliding window of laid-out chapters plus its scroll state.
#[derive(Debug)]
pub struct ChapterWindow<M: TextMeasurer = CellMetrics> {
    slots: VecDeque<ChapterSlot>,
    total_height: f64,
    chapter_count: usize,
    config: WindowConfig,
    style: LayoutStyle,
    measurer: M,
    viewport: Viewport,
    /// End the reader last scrolled toward. Lets a full window grow past
    /// the ping-pong guard once per gesture.
    intent: Option<Side>,
}

impl<M: TextMeasurer> ChapterWindow<M> {
    /// An empty window over a `width` by `height` viewport.
    pub fn new(
        measurer: M,
        style: LayoutStyle,
        config: WindowConfig,
        width: f64,
        height: f64,
    ) -> Self {
        Self {
            slots: VecDeque::new(),
            total_height: 0.0,
            chapter_count: 0,
            config,
            style,
            measurer,
            viewport: Viewport::new(width, height, 0.0),
            intent: None,
        }
    }

    /// Drop every slot.
    pub fn reset(&mut self) {
        self.slots.clear();
        self.total_height = 0.0;
        self.viewport.set_total_height(0.0);
        self.viewport.go_to_top();
        self.intent = None;
    }

    /// Reset and seed the window around `chapter`.
    ///
    /// Loads the chapter before and after as the capacity allows (the one
    /// after first) and scrolls to the top of `chapter`. Chapters without
    /// displayable text are skipped.
    ///
    /// # Errors
    ///
    /// [`WindowError::OutOfRange`] if `chapter` is not in `source`, and
    /// [`WindowError::EmptyContent`] if nothing could be laid out.
    pub fn load_centered<S: ChapterSource + ?Sized>(
        &mut self,
        source: &S,
        chapter: usize,
    ) -> Result<(), WindowError> {
        self.reset();
        let count = source.chapter_count();
        self.chapter_count = count;
        if chapter >= count {
            return Err(WindowError::OutOfRange { chapter, count });
        }

        let capacity = self.config.capacity();
        let mut seed = vec![chapter];
        if capacity >= 2 && chapter + 1 < count {
            seed.push(chapter + 1);
        }
        if capacity >= 3 && chapter > 0 {
            seed.insert(0, chapter - 1);
        }

        for index in seed {
            let slot = self.build_slot(source, index);
            if slot.paragraphs().is_empty() {
                tracing::debug!(chapter = index, "skipping empty chapter");
                continue;
            }
            self.slots.push_back(slot);
        }
        if self.slots.is_empty() {
            return Err(WindowError::EmptyContent(chapter));
        }

        self.restack();
        self.viewport.set_total_height(self.total_height);
        self.scroll_to_chapter(chapter);
        tracing::debug!(
            chapter,
            slots = self.slots.len(),
            height = self.total_height,
            "window seeded"
        );
        Ok(())
    }

    /// Add `chapter` after the last slot, evicting the first if over capacity.
    ///
    /// A resident chapter is a no-op.
    ///
    /// # Errors
    ///
    /// [`WindowError::OutOfOrder`] unless `chapter` is past the last slot,
    /// and [`WindowError::EmptyContent`] when it has no displayable text.
    /// The window is unchanged on error.
    pub fn grow_append<S: ChapterSource + ?Sized>(
        &mut self,
        source: &S,
        chapter: usize,
    ) -> Result<GrowOutcome, WindowError> {
        self.grow(source, chapter, Side::Back)
    }

    /// Add `chapter` before the first slot, evicting the last if over capacity.
    ///
    /// # Errors
    ///
    /// As [`ChapterWindow::grow_append`], mirrored.
    pub fn grow_prepend<S: ChapterSource + ?Sized>(
        &mut self,
        source: &S,
        chapter: usize,
    ) -> Result<GrowOutcome, WindowError> {
        self.grow(source, chapter, Side::Front)
    }

    fn grow<S: ChapterSource + ?Sized>(
        &mut self,
        source: &S,
        chapter: usize,
        side: Side,
    ) -> Result<GrowOutcome, WindowError> {
        let count = source.chapter_count();
        self.chapter_count = count;
        if chapter >= count {
            return Err(WindowError::OutOfRange { chapter, count });
        }
        if self.is_chapter_displayed(chapter) {
            return Ok(GrowOutcome::resident(side, chapter));
        }
        if let (Some(first), Some(last)) = (
            self.first_loaded_chapter_index(),
            self.last_loaded_chapter_index(),
        ) {
            let in_order = match side {
                Side::Front => chapter < first,
                Side::Back => chapter > last,
            };
            if !in_order {
                return Err(WindowError::OutOfOrder {
                    chapter,
                    side,
                    first,
                    last,
                });
            }
        }

        let slot = self.build_slot(source, chapter);
        if slot.paragraphs().is_empty() {
            return Err(WindowError::EmptyContent(chapter));
        }
        let added_height = slot.height();

        let capacity = self.config.capacity();
        let (evicted, scroll_delta) = match side {
            Side::Back => {
                self.slots.push_back(slot);
                let evicted = if self.slots.len() > capacity {
                    self.slots.pop_front()
                } else {
                    None
                };
                let delta = evicted.as_ref().map_or(0.0, |gone| -gone.height());
                (evicted, delta)
            }
            Side::Front => {
                self.slots.push_front(slot);
                let evicted = if self.slots.len() > capacity {
                    self.slots.pop_back()
                } else {
                    None
                };
                (evicted, added_height)
            }
        };
        let evicted = evicted.map(|gone| Eviction {
            chapter: gone.chapter_index(),
            height: gone.height(),
            side: match side {
                Side::Back => Side::Front,
                Side::Front => Side::Back,
            },
        });

        if evicted.is_some() && self.intent == Some(side) {
            self.intent = None;
        }
        self.restack();
        self.viewport.rebase(self.total_height, scroll_delta);
        tracing::debug!(
            chapter,
            %side,
            evicted = evicted.map(|e| e.chapter),
            scroll_delta,
            "window grew"
        );
        Ok(GrowOutcome {
            side,
            chapter,
            inserted: true,
            added_height,
            evicted,
            scroll_delta,
        })
    }

    fn build_slot<S: ChapterSource + ?Sized>(&self, source: &S, chapter: usize) -> ChapterSlot {
        let text = source.chapter_text(chapter);
        ChapterSlot::new(
            chapter,
            &text,
            &self.measurer,
            self.viewport.width(),
            &self.style,
        )
    }

    /// Recompute slot offsets and the total height.
    fn restack(&mut self) {
        let mut y = 0.0;
        for slot in &mut self.slots {
            slot.set_y(y);
            y += slot.height();
        }
        self.total_height = y;
    }

    /// Re-break every line at the current width and style.
    ///
    /// Membership is unchanged; the scroll position keeps its ratio.
    pub fn relayout(&mut self) {
        let ratio = self.viewport.scroll_ratio();
        self.relayout_at_ratio(ratio);
    }

    fn relayout_at_ratio(&mut self, ratio: f64) {
        let _scope = crate::perf::scope("layout.relayout");
        let width = self.viewport.width();
        for slot in &mut self.slots {
            slot.relayout(&self.measurer, width, &self.style);
        }
        self.restack();
        self.viewport.set_total_height(self.total_height);
        self.viewport.set_scroll_ratio(ratio);
    }

    /// Replace the style and relayout.
    pub fn set_style(&mut self, style: LayoutStyle) {
        if style == self.style {
            return;
        }
        self.style = style;
        self.relayout();
    }

    /// Resize the viewport; a width change triggers a relayout.
    pub fn resize(&mut self, width: f64, height: f64) {
        let ratio = self.viewport.scroll_ratio();
        let width_changed = (width - self.viewport.width()).abs() > f64::EPSILON;
        self.viewport.resize(width, height);
        if width_changed {
            self.relayout_at_ratio(ratio);
        }
    }

    pub const fn style(&self) -> &LayoutStyle {
        &self.style
    }

    pub const fn config(&self) -> &WindowConfig {
        &self.config
    }

    pub const fn measurer(&self) -> &M {
        &self.measurer
    }

    pub const fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub const fn total_height(&self) -> f64 {
        self.total_height
    }

    /// Chapter count of the source last used to fill the window.
    pub const fn chapter_count(&self) -> usize {
        self.chapter_count
    }

    pub const fn slots(&self) -> &VecDeque<ChapterSlot> {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> Option<&ChapterSlot> {
        self.slots.get(index)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn first_loaded_chapter_index(&self) -> Option<usize> {
        self.slots.front().map(ChapterSlot::chapter_index)
    }

    pub fn last_loaded_chapter_index(&self) -> Option<usize> {
        self.slots.back().map(ChapterSlot::chapter_index)
    }

    pub fn is_chapter_displayed(&self, chapter: usize) -> bool {
        self.slot_of_chapter(chapter).is_some()
    }

    /// Slot position holding `chapter`.
    pub fn slot_of_chapter(&self, chapter: usize) -> Option<usize> {
        self.slots
            .binary_search_by_key(&chapter, ChapterSlot::chapter_index)
            .ok()
    }

    /// Slot containing document `y`, clamped to the first and last slot.
    pub fn slot_at_y(&self, y: f64) -> Option<usize> {
        if self.slots.is_empty() {
            return None;
        }
        let idx = self
            .slots
            .partition_point(|slot| slot.y() + slot.height() <= y);
        Some(idx.min(self.slots.len() - 1))
    }

    /// Record a scroll toward the front (`dy < 0`) or back (`dy > 0`),
    /// even when the viewport is already pinned at that end.
    fn note_intent(&mut self, dy: f64) {
        if dy > 0.0 {
            self.intent = Some(Side::Back);
        } else if dy < 0.0 {
            self.intent = Some(Side::Front);
        }
    }

    /// Scroll down by `dy` pixels (up when negative).
    pub fn scroll_by(&mut self, dy: f64) {
        self.note_intent(dy);
        if dy >= 0.0 {
            self.viewport.scroll_down(dy);
        } else {
            self.viewport.scroll_up(-dy);
        }
    }

    pub fn scroll_to(&mut self, y: f64) {
        self.note_intent(y - self.viewport.offset());
        self.viewport.go_to(y);
    }

    pub fn page_up(&mut self) {
        self.note_intent(-1.0);
        self.viewport.page_up();
    }

    pub fn page_down(&mut self) {
        self.note_intent(1.0);
        self.viewport.page_down();
    }

    pub fn half_page_up(&mut self) {
        self.note_intent(-1.0);
        self.viewport.half_page_up();
    }

    pub fn half_page_down(&mut self) {
        self.note_intent(1.0);
        self.viewport.half_page_down();
    }

    pub fn scroll_to_top(&mut self) {
        self.note_intent(-1.0);
        self.viewport.go_to_top();
    }

    pub fn scroll_to_bottom(&mut self) {
        self.note_intent(1.0);
        self.viewport.go_to_bottom();
    }

    /// Jump to `percent` of the way through the resident window.
    pub fn go_to_percent(&mut self, percent: u8) {
        let before = self.viewport.offset();
        self.viewport.go_to_percent(percent);
        self.note_intent(self.viewport.offset() - before);
    }

    /// Put the top of `chapter` at the top of the viewport if it is resident.
    pub fn scroll_to_chapter(&mut self, chapter: usize) -> bool {
        let Some(y) = self
            .slot_of_chapter(chapter)
            .and_then(|idx| self.slots.get(idx))
            .map(ChapterSlot::y)
        else {
            return false;
        };
        self.viewport.go_to(y);
        true
    }

    /// Adjacent chapters wanted because the viewport is near an end.
    ///
    /// A window below capacity grows at any end within the threshold. A
    /// full window grows only when evicting the far slot cannot bring the
    /// opposite end back within its threshold, or when the reader has
    /// scrolled toward that end since the last eviction there. Short
    /// chapters in a tall viewport therefore advance one chapter per
    /// scroll gesture instead of stalling or ping-ponging.
    pub fn edge_demand(&self) -> EdgeDemand {
        let (Some(first), Some(last)) = (
            self.first_loaded_chapter_index(),
            self.last_loaded_chapter_index(),
        ) else {
            return EdgeDemand::default();
        };
        let threshold = self.viewport.height() * self.config.edge_threshold_ratio;
        let top = self.viewport.offset();
        let bottom = top + self.viewport.height();

        let full = self.slots.len() >= self.config.capacity();
        let front_height = self.slots.front().map_or(0.0, ChapterSlot::height);
        let back_height = self.slots.back().map_or(0.0, ChapterSlot::height);

        let previous = first
            .checked_sub(1)
            .filter(|_| top < threshold)
            .filter(|_| {
                !full
                    || self.intent == Some(Side::Front)
                    || bottom <= self.total_height - back_height - threshold
            });
        let next = Some(last + 1)
            .filter(|&next| next < self.chapter_count && bottom > self.total_height - threshold)
            .filter(|_| {
                !full || self.intent == Some(Side::Back) || top - front_height >= threshold
            });
        EdgeDemand { previous, next }
    }

    /// Lines intersecting the viewport, top to bottom.
    pub fn visible_rows(&self) -> Vec<VisibleRow<'_>> {
        let range = self.viewport.visible_range();
        let offset = self.viewport.offset();
        let mut rows = Vec::new();

        for (slot_idx, slot) in self.slots.iter().enumerate() {
            if slot.y() >= range.end {
                break;
            }
            if slot.y() + slot.height() <= range.start {
                continue;
            }
            for (para_idx, paragraph) in slot.paragraphs().iter().enumerate() {
                let para_top = slot.y() + paragraph.y();
                if para_top >= range.end {
                    break;
                }
                if para_top + paragraph.height() <= range.start {
                    continue;
                }
                for (line_idx, line) in paragraph.lines().iter().enumerate() {
                    let y = para_top + line.y;
                    if y >= range.end {
                        break;
                    }
                    if y + line.height <= range.start {
                        continue;
                    }
                    rows.push(VisibleRow {
                        chapter: slot.chapter_index(),
                        slot: slot_idx,
                        paragraph: para_idx,
                        line: line_idx,
                        text: paragraph.line_text(line_idx),
                        y: y - offset,
                        height: line.height,
                    });
                }
            }
        }
        rows
    }

    /// Chapter at the top of the viewport and how far through it the top is.
    pub fn progress(&self) -> Option<(usize, f64)> {
        let offset = self.viewport.offset();
        let slot = self.slots.get(self.slot_at_y(offset)?)?;
        let fraction = if slot.height() > 0.0 {
            ((offset - slot.y()) / slot.height()).clamp(0.0, 1.0)
        } else {
            0.0
        };
        Some((slot.chapter_index(), fraction))
    }

    /// Scroll position through the resident window, 0-100.
    pub fn percent(&self) -> u8 {
        self.viewport.scroll_percent()
    }
}

impl Default for ChapterWindow<CellMetrics> {
    fn default() -> Self {
        Self::new(
            CellMetrics::default(),
            LayoutStyle::default(),
            WindowConfig::default(),
            800.0,
            600.0,
        )
    }
}

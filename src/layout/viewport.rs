//! Viewport management for scrolling.
//!
//! The [`Viewport`] struct tracks the visible area of the chapter window in
//! pixels and handles all scroll operations. Because the window's document
//! origin moves when chapters are evicted or prepended, the viewport can be
//! rebased so the visible content stays put.

use std::ops::Range;

/// Manages the visible portion of the laid-out window.
///
/// The viewport tracks:
/// - Viewport dimensions (width, height)
/// - Current scroll offset (in pixels)
/// - Total document height
///
/// # Example
///
/// ```
/// use tome::layout::Viewport;
///
/// let mut vp = Viewport::new(480.0, 240.0, 1000.0);
/// assert_eq!(vp.visible_range(), 0.0..240.0);
///
/// vp.scroll_down(100.0);
/// assert_eq!(vp.visible_range(), 100.0..340.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    width: f64,
    height: f64,
    offset: f64,
    total_height: f64,
}

impl Viewport {
    /// Create a new viewport scrolled to the top.
    ///
    /// # Arguments
    ///
    /// * `width` - Layout width in pixels
    /// * `height` - Visible height in pixels
    /// * `total_height` - Height of the laid-out document
    pub const fn new(width: f64, height: f64, total_height: f64) -> Self {
        Self {
            width,
            height,
            offset: 0.0,
            total_height,
        }
    }

    /// Get the current scroll offset.
    pub const fn offset(&self) -> f64 {
        self.offset
    }

    pub const fn width(&self) -> f64 {
        self.width
    }

    pub const fn height(&self) -> f64 {
        self.height
    }

    pub const fn total_height(&self) -> f64 {
        self.total_height
    }

    /// Get the visible document span, clamped to the document.
    pub fn visible_range(&self) -> Range<f64> {
        let start = self.offset;
        let end = (self.offset + self.height).min(self.total_height);
        start..end
    }

    /// Largest valid offset.
    pub fn max_offset(&self) -> f64 {
        (self.total_height - self.height).max(0.0)
    }

    /// Get the scroll percentage (0-100).
    pub fn scroll_percent(&self) -> u8 {
        let max_offset = self.max_offset();
        if max_offset <= 0.0 {
            return 100;
        }
        // Percentage value always 0-100
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            ((self.offset / max_offset) * 100.0).round() as u8
        }
    }

    /// Offset as a fraction of the maximum offset (0.0 when nothing scrolls).
    pub fn scroll_ratio(&self) -> f64 {
        let max_offset = self.max_offset();
        if max_offset <= 0.0 {
            0.0
        } else {
            self.offset / max_offset
        }
    }

    /// Scroll to `ratio` of the maximum offset.
    pub fn set_scroll_ratio(&mut self, ratio: f64) {
        self.offset = self.max_offset() * ratio.clamp(0.0, 1.0);
    }

    pub fn scroll_up(&mut self, px: f64) {
        self.offset = (self.offset - px).max(0.0);
    }

    pub fn scroll_down(&mut self, px: f64) {
        self.offset = (self.offset + px).min(self.max_offset());
    }

    pub fn page_up(&mut self) {
        self.scroll_up(self.height);
    }

    pub fn page_down(&mut self) {
        self.scroll_down(self.height);
    }

    pub fn half_page_up(&mut self) {
        self.scroll_up(self.height / 2.0);
    }

    pub fn half_page_down(&mut self) {
        self.scroll_down(self.height / 2.0);
    }

    pub const fn go_to_top(&mut self) {
        self.offset = 0.0;
    }

    pub fn go_to_bottom(&mut self) {
        self.offset = self.max_offset();
    }

    /// Scroll so `y` is at the top of the viewport, clamped.
    pub fn go_to(&mut self, y: f64) {
        self.offset = y.clamp(0.0, self.max_offset());
    }

    /// Go to a percentage through the document.
    pub fn go_to_percent(&mut self, percent: u8) {
        let percent = percent.min(100);
        self.offset = self.max_offset() * f64::from(percent) / 100.0;
    }

    /// Resize the viewport.
    pub fn resize(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
        self.offset = self.offset.min(self.max_offset());
    }

    /// Update the total height (e.g., after relayout).
    pub fn set_total_height(&mut self, total: f64) {
        self.total_height = total;
        self.offset = self.offset.min(self.max_offset());
    }

    /// Move the document origin by `delta` and set a new total height.
    ///
    /// The offset moves with the origin so the same content stays on
    /// screen, then is clamped.
    pub fn rebase(&mut self, total: f64, delta: f64) {
        self.total_height = total;
        self.offset = (self.offset + delta).clamp(0.0, self.max_offset());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_new_viewport_starts_at_top() {
        let vp = Viewport::new(100.0, 240.0, 1000.0);
        assert!(approx(vp.offset(), 0.0));
    }

    #[test]
    fn test_visible_range_at_bottom() {
        let mut vp = Viewport::new(100.0, 240.0, 1000.0);
        vp.go_to_bottom();
        assert_eq!(vp.visible_range(), 760.0..1000.0);
    }

    #[test]
    fn test_visible_range_with_short_document() {
        let vp = Viewport::new(100.0, 240.0, 100.0);
        assert_eq!(vp.visible_range(), 0.0..100.0);
    }

    #[test]
    fn test_scroll_down_clamps_to_max() {
        let mut vp = Viewport::new(100.0, 240.0, 1000.0);
        vp.scroll_down(5000.0);
        assert!(approx(vp.offset(), 760.0));
    }

    #[test]
    fn test_scroll_up_clamps_to_zero() {
        let mut vp = Viewport::new(100.0, 240.0, 1000.0);
        vp.scroll_down(100.0);
        vp.scroll_up(500.0);
        assert!(approx(vp.offset(), 0.0));
    }

    #[test]
    fn test_page_and_half_page() {
        let mut vp = Viewport::new(100.0, 240.0, 1000.0);
        vp.page_down();
        assert!(approx(vp.offset(), 240.0));
        vp.half_page_up();
        assert!(approx(vp.offset(), 120.0));
        vp.half_page_down();
        vp.page_up();
        assert!(approx(vp.offset(), 0.0));
    }

    #[test]
    fn test_go_to_percent_fifty() {
        let mut vp = Viewport::new(100.0, 240.0, 1000.0);
        vp.go_to_percent(50);
        assert!(approx(vp.offset(), 380.0));
        assert_eq!(vp.scroll_percent(), 50);
    }

    #[test]
    fn test_scroll_percent_short_document() {
        let vp = Viewport::new(100.0, 240.0, 100.0);
        assert_eq!(vp.scroll_percent(), 100);
    }

    #[test]
    fn test_scroll_ratio_round_trip_after_growth() {
        let mut vp = Viewport::new(100.0, 200.0, 1200.0);
        vp.go_to(500.0);
        let ratio = vp.scroll_ratio();
        vp.set_total_height(2200.0);
        vp.set_scroll_ratio(ratio);
        assert!(approx(vp.offset(), 1000.0));
    }

    #[test]
    fn test_rebase_keeps_content_in_place() {
        let mut vp = Viewport::new(100.0, 200.0, 1000.0);
        vp.go_to(100.0);
        vp.rebase(1300.0, 300.0);
        assert!(approx(vp.offset(), 400.0));
        vp.rebase(900.0, -400.0);
        assert!(approx(vp.offset(), 0.0));
    }

    #[test]
    fn test_resize_keeps_valid_offset() {
        let mut vp = Viewport::new(100.0, 240.0, 1000.0);
        vp.scroll_down(700.0);
        vp.resize(100.0, 600.0);
        assert!(approx(vp.offset(), 400.0));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn scroll_never_exceeds_bounds(
                total in 0.0..100_000.0f64,
                height in 1.0..2_000.0f64,
                amount in 0.0..200_000.0f64,
            ) {
                let mut vp = Viewport::new(400.0, height, total);
                vp.scroll_down(amount);
                prop_assert!(vp.offset() >= 0.0);
                prop_assert!(vp.offset() <= vp.max_offset());
            }

            #[test]
            fn rebase_never_leaves_bounds(
                total in 0.0..100_000.0f64,
                new_total in 0.0..100_000.0f64,
                delta in -50_000.0..50_000.0f64,
            ) {
                let mut vp = Viewport::new(400.0, 600.0, total);
                vp.go_to_percent(50);
                vp.rebase(new_total, delta);
                prop_assert!(vp.offset() >= 0.0);
                prop_assert!(vp.offset() <= vp.max_offset());
            }

            #[test]
            fn percent_always_valid(
                total in 0.0..100_000.0f64,
                height in 1.0..2_000.0f64,
                offset in 0.0..100_000.0f64,
            ) {
                let mut vp = Viewport::new(400.0, height, total);
                vp.go_to(offset);
                prop_assert!(vp.scroll_percent() <= 100);
            }
        }
    }
}

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use crate::index::{ChapterIndex, ChapterSource, LoadRequest};
use crate::layout::{CellMetrics, ChapterWindow, LayoutStyle, TextMeasurer, WindowConfig};
use crate::selection::{self, Selection};

/// Everything the reader shows, and what it is waiting for.
#[derive(Debug)]
pub struct Model<M: TextMeasurer = CellMetrics> {
    pub path: Option<PathBuf>,
    /// Titles in the order the scan reported them.
    pub titles: Vec<String>,
    /// Published once the scan finishes.
    pub index: Option<Arc<ChapterIndex>>,
    pub window: ChapterWindow<M>,
    pub selection: Selection,
    pub status: String,
    pub parsing: bool,
    /// Ticket of the chapter load in flight. Edge prefetch waits for it.
    pub loading: Option<u64>,
    /// Chapter to centre on once the index is ready.
    pub pending_jump: Option<usize>,
    /// Chapters that produced nothing to lay out; never requested again.
    pub unavailable: BTreeSet<usize>,
}

impl<M: TextMeasurer> Model<M> {
    pub fn new(window: ChapterWindow<M>) -> Self {
        Self {
            path: None,
            titles: Vec::new(),
            index: None,
            window,
            selection: Selection::new(),
            status: String::new(),
            parsing: false,
            loading: None,
            pending_jump: None,
            unavailable: BTreeSet::new(),
        }
    }

    /// Forget the current book, keeping layout settings.
    pub(super) fn clear_book(&mut self) {
        self.path = None;
        self.titles.clear();
        self.index = None;
        self.window.reset();
        self.selection.clear();
        self.parsing = false;
        self.loading = None;
        self.pending_jump = None;
        self.unavailable.clear();
    }

    pub fn chapter_count(&self) -> usize {
        self.index.as_ref().map_or(0, |index| index.chapter_count())
    }

    /// Nothing is being scanned or loaded.
    pub const fn is_idle(&self) -> bool {
        !self.parsing && self.loading.is_none()
    }

    /// The chapter load the window needs next, if one may start now.
    pub fn next_request(&self) -> Option<LoadRequest> {
        if self.loading.is_some() || self.index.is_none() {
            return None;
        }
        if let Some(chapter) = self.pending_jump {
            return Some(LoadRequest::Centered(chapter));
        }
        // Unavailable chapters are stepped over, so one unreadable chapter
        // does not stop growth in its direction.
        let demand = self.window.edge_demand();
        let available = |chapter: &usize| !self.unavailable.contains(chapter);
        let previous = demand
            .previous
            .and_then(|chapter| (0..=chapter).rev().find(available));
        let next = demand
            .next
            .and_then(|chapter| (chapter..self.chapter_count()).find(available));
        previous
            .map(LoadRequest::Previous)
            .or_else(|| next.map(LoadRequest::Next))
    }

    /// Chapter indices to read for `request`.
    pub fn chapters_for(&self, request: LoadRequest) -> Vec<usize> {
        match request {
            LoadRequest::Centered(chapter) => {
                let count = self.chapter_count();
                (chapter.saturating_sub(1)..=chapter + 1)
                    .filter(|&i| i < count)
                    .collect()
            }
            LoadRequest::Previous(chapter) | LoadRequest::Next(chapter) => vec![chapter],
        }
    }

    /// Chapter at the top of the viewport and the fraction read.
    pub fn progress(&self) -> Option<(usize, f64)> {
        self.window.progress()
    }

    /// `"<title>  42%"` for the chapter at the top of the viewport.
    pub fn progress_label(&self) -> Option<String> {
        let (chapter, fraction) = self.progress()?;
        let title = self.titles.get(chapter)?;
        Some(format!("{title}  {:.0}%", fraction * 100.0))
    }

    pub fn copy_selection(&self) -> String {
        selection::selected_text(&self.window, &self.selection)
    }

    pub fn style(&self) -> &LayoutStyle {
        self.window.style()
    }
}

impl<M: TextMeasurer + Default> Default for Model<M> {
    fn default() -> Self {
        Self::new(ChapterWindow::new(
            M::default(),
            LayoutStyle::default(),
            WindowConfig::default(),
            800.0,
            600.0,
        ))
    }
}

/// Chapters read off-thread, served to the window.
pub(super) struct LoadedChapters {
    pub count: usize,
    pub chapters: Vec<(usize, String)>,
}

impl ChapterSource for LoadedChapters {
    fn chapter_count(&self) -> usize {
        self.count
    }

    fn chapter_text(&self, index: usize) -> String {
        self.chapters
            .iter()
            .find(|(chapter, _)| *chapter == index)
            .map(|(_, text)| text.clone())
            .unwrap_or_default()
    }
}

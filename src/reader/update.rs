use std::path::PathBuf;
use std::sync::Arc;

use crate::index::{ChapterIndex, IndexEvent, LoadRequest};
use crate::layout::{LayoutStyle, TextMeasurer, WindowError};
use crate::selection::point_to_position;

use super::Model;
use super::model::LoadedChapters;

/// Everything that can happen to a reader session.
#[derive(Debug, Clone)]
pub enum Message {
    // Book
    /// Start reading a new file
    Open(PathBuf),
    /// A chapter heading was found by the scan
    ChapterFound(String),
    /// The scan finished
    ParsingFinished(Arc<ChapterIndex>),
    /// Chapter text arrived for a load request
    ChaptersLoaded {
        ticket: u64,
        request: LoadRequest,
        chapters: Vec<(usize, String)>,
    },
    /// Clear the window and reload centred on a chapter
    JumpToChapter(usize),

    // Navigation
    /// Scroll by pixels, positive is down
    ScrollBy(f64),
    /// Scroll to a document offset
    ScrollTo(f64),
    PageUp,
    PageDown,
    HalfPageUp,
    HalfPageDown,
    ScrollToTop,
    ScrollToBottom,
    /// Jump to a percentage of the resident window
    GoToPercent(u8),
    /// Viewport resized to width x height
    Resize(f64, f64),

    // Typography
    SetStyle(LayoutStyle),
    IncreaseFontSize,
    DecreaseFontSize,
    IncreaseLineSpacing,
    DecreaseLineSpacing,
    IncreaseLetterSpacing,
    DecreaseLetterSpacing,

    // Selection
    /// Pointer pressed at viewport x, y
    PointerDown(f64, f64),
    PointerMove(f64, f64),
    PointerUp(f64, f64),
    ClearSelection,
}

impl From<IndexEvent> for Message {
    fn from(event: IndexEvent) -> Self {
        match event {
            IndexEvent::ChapterFound { title, .. } => Self::ChapterFound(title),
            IndexEvent::ParsingFinished { index, .. } => Self::ParsingFinished(index),
            IndexEvent::ChaptersLoaded {
                ticket,
                request,
                chapters,
                ..
            } => Self::ChaptersLoaded {
                ticket,
                request,
                chapters,
            },
        }
    }
}

/// Apply `msg` to `model`.
///
/// Pure state transition: starting scans and chapter reads is up to the
/// caller (see [`super::Reader`]).
pub fn update<M: TextMeasurer>(mut model: Model<M>, msg: Message) -> Model<M> {
    match msg {
        Message::Open(path) => {
            model.clear_book();
            model.status = format!("Parsing {}...", path.display());
            model.path = Some(path);
            model.parsing = true;
        }
        Message::ChapterFound(title) => {
            model.titles.push(title);
        }
        Message::ParsingFinished(index) => {
            let count = index.chapter_count();
            model.parsing = false;
            model.titles = index
                .entries()
                .iter()
                .map(|entry| entry.title.clone())
                .collect();
            model.index = Some(index);
            if count == 0 {
                model.pending_jump = None;
                model.status = match &model.path {
                    Some(path) => format!("Failed to open {}", path.display()),
                    None => "Failed to open file".to_string(),
                };
            } else {
                match model.pending_jump {
                    Some(chapter) if chapter >= count => {
                        model.pending_jump = Some(0);
                        model.status = format!("No chapter {}", chapter + 1);
                    }
                    jump => {
                        model.pending_jump = Some(jump.unwrap_or(0));
                        model.status = format!("Found {count} chapters");
                    }
                }
            }
        }
        Message::ChaptersLoaded {
            ticket,
            request,
            chapters,
        } => apply_loaded(&mut model, ticket, request, chapters),
        Message::JumpToChapter(chapter) => {
            let count = model.chapter_count();
            if model.index.is_some() && chapter >= count {
                model.status = format!("No chapter {}", chapter + 1);
            } else {
                model.window.reset();
                model.selection.clear();
                model.loading = None;
                model.pending_jump = Some(chapter);
            }
        }

        Message::ScrollBy(dy) => model.window.scroll_by(dy),
        Message::ScrollTo(y) => model.window.scroll_to(y),
        Message::PageUp => model.window.page_up(),
        Message::PageDown => model.window.page_down(),
        Message::HalfPageUp => model.window.half_page_up(),
        Message::HalfPageDown => model.window.half_page_down(),
        Message::ScrollToTop => model.window.scroll_to_top(),
        Message::ScrollToBottom => model.window.scroll_to_bottom(),
        Message::GoToPercent(percent) => model.window.go_to_percent(percent),
        Message::Resize(width, height) => model.window.resize(width, height),

        Message::SetStyle(style) => model.window.set_style(style),
        Message::IncreaseFontSize => restyle(&mut model, LayoutStyle::increase_font_size),
        Message::DecreaseFontSize => restyle(&mut model, LayoutStyle::decrease_font_size),
        Message::IncreaseLineSpacing => restyle(&mut model, LayoutStyle::increase_line_spacing),
        Message::DecreaseLineSpacing => restyle(&mut model, LayoutStyle::decrease_line_spacing),
        Message::IncreaseLetterSpacing => {
            restyle(&mut model, LayoutStyle::increase_letter_spacing);
        }
        Message::DecreaseLetterSpacing => {
            restyle(&mut model, LayoutStyle::decrease_letter_spacing);
        }

        Message::PointerDown(x, y) => {
            if let Some(position) = point_to_position(&model.window, x, y) {
                model.selection.begin(position);
            }
        }
        Message::PointerMove(x, y) => {
            if let Some(position) = point_to_position(&model.window, x, y) {
                model.selection.update(position);
            }
        }
        Message::PointerUp(x, y) => {
            if let Some(position) = point_to_position(&model.window, x, y) {
                model.selection.update(position);
            }
            model.selection.finish();
        }
        Message::ClearSelection => model.selection.clear(),
    }
    model
}

fn restyle<M: TextMeasurer>(model: &mut Model<M>, change: fn(&mut LayoutStyle)) {
    let mut style = model.window.style().clone();
    change(&mut style);
    model.window.set_style(style);
}

fn apply_loaded<M: TextMeasurer>(
    model: &mut Model<M>,
    ticket: u64,
    request: LoadRequest,
    chapters: Vec<(usize, String)>,
) {
    if model.loading != Some(ticket) {
        tracing::debug!(ticket, ?request, "dropping superseded chapter load");
        return;
    }
    model.loading = None;
    let source = LoadedChapters {
        count: model.chapter_count(),
        chapters,
    };

    let result = match request {
        LoadRequest::Centered(chapter) => {
            model.pending_jump = None;
            model.selection.clear();
            model.window.load_centered(&source, chapter)
        }
        LoadRequest::Previous(chapter) => model
            .window
            .grow_prepend(&source, chapter)
            .map(|outcome| model.selection.apply(&outcome, model.window.len())),
        LoadRequest::Next(chapter) => model
            .window
            .grow_append(&source, chapter)
            .map(|outcome| model.selection.apply(&outcome, model.window.len())),
    };

    if let Err(err) = result {
        tracing::warn!(%err, ?request, "chapter load not applied");
        match err {
            WindowError::EmptyContent(chapter) | WindowError::OutOfRange { chapter, .. } => {
                model.unavailable.insert(chapter);
                if matches!(request, LoadRequest::Centered(_)) {
                    model.status = format!("Chapter {} has nothing to show", chapter + 1);
                }
            }
            WindowError::OutOfOrder { .. } => {}
        }
    }
}

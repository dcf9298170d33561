//! Off-thread indexing and chapter loading.
//!
//! Scans and chapter reads run on short-lived worker threads and report
//! back over a channel. Every open bumps a generation counter; events from
//! an older generation are dropped on receipt, and a scan that notices it
//! has been superseded stops early.

use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use super::{ChapterIndex, ChapterSource, IndexConfig, IndexError, build_index_with};

/// Why a batch of chapters was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadRequest {
    /// Seed an empty window around this chapter.
    Centered(usize),
    /// Prepend this chapter.
    Previous(usize),
    /// Append this chapter.
    Next(usize),
}

/// Notifications from the worker, in the order they were produced.
#[derive(Debug, Clone)]
pub enum IndexEvent {
    /// A heading was found. Emitted in ascending offset order.
    ChapterFound { generation: u64, title: String },
    /// The scan is complete. Emitted exactly once per open, last.
    ParsingFinished {
        generation: u64,
        index: Arc<ChapterIndex>,
    },
    /// Chapter text requested with [`IndexWorker::request_chapters`].
    ChaptersLoaded {
        generation: u64,
        ticket: u64,
        request: LoadRequest,
        chapters: Vec<(usize, String)>,
    },
}

impl IndexEvent {
    pub const fn generation(&self) -> u64 {
        match self {
            Self::ChapterFound { generation, .. }
            | Self::ParsingFinished { generation, .. }
            | Self::ChaptersLoaded { generation, .. } => *generation,
        }
    }
}

pub struct IndexWorker {
    tx: Sender<IndexEvent>,
    rx: Receiver<IndexEvent>,
    generation: Arc<AtomicU64>,
    next_ticket: u64,
}

impl IndexWorker {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx,
            rx,
            generation: Arc::new(AtomicU64::new(0)),
            next_ticket: 0,
        }
    }

    /// Generation of the most recent [`IndexWorker::open`].
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Start indexing `path`, superseding any scan still in flight.
    ///
    /// Returns the new generation.
    pub fn open(&mut self, path: PathBuf, config: IndexConfig) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let tx = self.tx.clone();
        let current = Arc::clone(&self.generation);

        let spawned = thread::Builder::new()
            .name("tome-index".to_string())
            .spawn(move || {
                let result = build_index_with(&path, &config, &mut |entry| {
                    if current.load(Ordering::Acquire) != generation {
                        return ControlFlow::Break(());
                    }
                    let found = IndexEvent::ChapterFound {
                        generation,
                        title: entry.title.clone(),
                    };
                    if tx.send(found).is_err() {
                        return ControlFlow::Break(());
                    }
                    ControlFlow::Continue(())
                });
                let index = match result {
                    Ok(index) => index,
                    Err(IndexError::Cancelled) => {
                        tracing::debug!(generation, "scan superseded");
                        return;
                    }
                    Err(err) => {
                        tracing::warn!(path = %path.display(), %err, "open failed");
                        ChapterIndex::empty(path)
                    }
                };
                let _ = tx.send(IndexEvent::ParsingFinished {
                    generation,
                    index: Arc::new(index),
                });
            });

        if let Err(err) = spawned {
            tracing::warn!(%err, "could not start indexing thread");
            let _ = self.tx.send(IndexEvent::ParsingFinished {
                generation,
                index: Arc::new(ChapterIndex::empty(PathBuf::new())),
            });
        }
        generation
    }

    /// Read `chapters` from `index` off-thread.
    ///
    /// Returns a ticket echoed in the matching [`IndexEvent::ChaptersLoaded`].
    pub fn request_chapters(
        &mut self,
        index: Arc<ChapterIndex>,
        request: LoadRequest,
        chapters: Vec<usize>,
    ) -> u64 {
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let generation = self.generation();
        let tx = self.tx.clone();

        let spawned = thread::Builder::new()
            .name("tome-chapter".to_string())
            .spawn(move || {
                let chapters = chapters
                    .into_iter()
                    .map(|chapter| (chapter, index.chapter_text(chapter)))
                    .collect();
                let _ = tx.send(IndexEvent::ChaptersLoaded {
                    generation,
                    ticket,
                    request,
                    chapters,
                });
            });

        if let Err(err) = spawned {
            tracing::warn!(%err, "could not start chapter thread");
            let _ = self.tx.send(IndexEvent::ChaptersLoaded {
                generation,
                ticket,
                request,
                chapters: Vec::new(),
            });
        }
        ticket
    }

    /// Next current-generation event, without blocking.
    pub fn try_next(&mut self) -> Option<IndexEvent> {
        while let Ok(event) = self.rx.try_recv() {
            if self.is_current(&event) {
                return Some(event);
            }
        }
        None
    }

    /// Next current-generation event, waiting up to `timeout`.
    pub fn next_timeout(&mut self, timeout: Duration) -> Option<IndexEvent> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(event) if self.is_current(&event) => return Some(event),
                Ok(_) => {}
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    fn is_current(&self, event: &IndexEvent) -> bool {
        let current = self.generation();
        if event.generation() == current {
            return true;
        }
        tracing::debug!(stale = event.generation(), current, "dropping stale event");
        false
    }
}

impl Default for IndexWorker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const WAIT: Duration = Duration::from_secs(5);

    fn drain_until_finished(worker: &mut IndexWorker) -> (Vec<String>, Arc<ChapterIndex>) {
        let mut titles = Vec::new();
        loop {
            match worker.next_timeout(WAIT).expect("worker event") {
                IndexEvent::ChapterFound { title, .. } => titles.push(title),
                IndexEvent::ParsingFinished { index, .. } => return (titles, index),
                IndexEvent::ChaptersLoaded { .. } => {}
            }
        }
    }

    #[test]
    fn test_open_reports_titles_then_finish() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("novel.txt");
        std::fs::write(&path, "第一章 甲\n一\n第二章 乙\n二\n第三章 丙\n三").unwrap();

        let mut worker = IndexWorker::new();
        worker.open(path, IndexConfig::default());
        let (titles, index) = drain_until_finished(&mut worker);
        assert_eq!(titles, vec!["第一章 甲", "第二章 乙", "第三章 丙"]);
        assert_eq!(index.chapter_count(), 3);
    }

    #[test]
    fn test_missing_file_still_finishes_with_zero() {
        let dir = tempdir().unwrap();
        let mut worker = IndexWorker::new();
        worker.open(dir.path().join("nope.txt"), IndexConfig::default());
        let (titles, index) = drain_until_finished(&mut worker);
        assert!(titles.is_empty());
        assert_eq!(index.chapter_count(), 0);
    }

    #[test]
    fn test_reopen_discards_previous_generation() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("first.txt");
        let second = dir.path().join("second.txt");
        std::fs::write(&first, "第一章 旧\n旧").unwrap();
        std::fs::write(&second, "第一章 新\n新").unwrap();

        let mut worker = IndexWorker::new();
        worker.open(first, IndexConfig::default());
        let generation = worker.open(second, IndexConfig::default());
        let (titles, index) = drain_until_finished(&mut worker);
        assert_eq!(titles, vec!["第一章 新"]);
        assert_eq!(index.chapter_title(0), Some("第一章 新"));
        assert_eq!(worker.generation(), generation);
    }

    #[test]
    fn test_request_chapters_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("novel.txt");
        std::fs::write(&path, "第一章 甲\n一\n第二章 乙\n二").unwrap();

        let mut worker = IndexWorker::new();
        worker.open(path, IndexConfig::default());
        let (_, index) = drain_until_finished(&mut worker);
        let ticket = worker.request_chapters(index, LoadRequest::Next(1), vec![1]);
        match worker.next_timeout(WAIT).expect("load event") {
            IndexEvent::ChaptersLoaded {
                ticket: got,
                request,
                chapters,
                ..
            } => {
                assert_eq!(got, ticket);
                assert_eq!(request, LoadRequest::Next(1));
                assert_eq!(chapters, vec![(1, "第二章 乙\n二".to_string())]);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}

//! Reader session: the host side of indexing and layout.
//!
//! Follows a message/update split:
//! - [`Model`]: titles, the published index, the chapter window, selection
//! - [`Message`]: user input and worker notifications
//! - [`update`]: pure state transitions
//! - [`Reader`]: owns the [`IndexWorker`], feeds its events back in as
//!   messages and starts the chapter loads the model asks for
//!
//! Only one chapter load is in flight at a time; prefetch requests that
//! come up meanwhile wait until it lands.

mod model;
mod update;

pub use model::Model;
pub use update::{Message, update};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::index::{IndexConfig, IndexWorker};
use crate::layout::{CellMetrics, TextMeasurer};

/// A [`Model`] wired to a background [`IndexWorker`].
pub struct Reader<M: TextMeasurer + Default = CellMetrics> {
    model: Model<M>,
    worker: IndexWorker,
    index_config: IndexConfig,
}

impl<M: TextMeasurer + Default> Reader<M> {
    pub fn new(model: Model<M>, index_config: IndexConfig) -> Self {
        Self {
            model,
            worker: IndexWorker::new(),
            index_config,
        }
    }

    pub const fn model(&self) -> &Model<M> {
        &self.model
    }

    pub fn open(&mut self, path: impl Into<PathBuf>) {
        self.dispatch(Message::Open(path.into()));
    }

    /// Apply a message, then start whatever work it calls for.
    pub fn dispatch(&mut self, msg: Message) {
        if let Message::Open(path) = &msg {
            let generation = self.worker.open(path.clone(), self.index_config.clone());
            crate::perf::log_event(
                "reader.open",
                format!("path={} generation={generation}", path.display()),
            );
        }
        self.model = update(std::mem::take(&mut self.model), msg);
        self.request_chapters_if_needed();
    }

    fn request_chapters_if_needed(&mut self) {
        let Some(request) = self.model.next_request() else {
            return;
        };
        let Some(index) = self.model.index.as_ref().map(Arc::clone) else {
            return;
        };
        let chapters = self.model.chapters_for(request);
        tracing::debug!(?request, ?chapters, "loading chapters");
        let ticket = self.worker.request_chapters(index, request, chapters);
        self.model.loading = Some(ticket);
    }

    /// Handle every event already waiting. Returns how many there were.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.worker.try_next() {
            self.dispatch(event.into());
            handled += 1;
        }
        handled
    }

    /// Handle events until nothing is scanning or loading.
    ///
    /// Returns false if `timeout` ran out first.
    pub fn run_until_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.model.is_idle() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.worker.next_timeout(remaining) {
                Some(event) => self.dispatch(event.into()),
                None => return false,
            }
        }
        true
    }

    pub fn copy_selection(&self) -> String {
        self.model.copy_selection()
    }
}

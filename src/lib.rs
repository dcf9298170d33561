// Only allow lints that are either transitive-dependency noise or
// genuinely opinionated style choices that don't indicate real issues.
#![allow(
    // Transitive dependency version mismatches we can't control
    clippy::multiple_crate_versions,
    // module_name_repetitions is pure style preference (e.g. index::IndexError)
    clippy::module_name_repetitions
)]

//! # Tome
//!
//! A reading core for very large plain-text novels.
//!
//! Tome never builds the whole book as a formatted document. Instead it:
//! - Scans the file once for chapter headings, keeping only byte offsets
//! - Reads and decodes one chapter at a time on demand
//! - Lays out a small sliding window of chapters and grows or evicts at its
//!   ends as the reader scrolls
//! - Maps viewport points to text positions for selection
//!
//! ## Architecture
//!
//! The [`reader`] session uses a message/update split:
//! - **Model**: titles, index, chapter window, selection
//! - **Message**: input and background notifications
//! - **Update**: pure state transitions
//!
//! Scanning and chapter reads run on worker threads and report back over a
//! channel; stale results from a superseded open are dropped.
//!
//! ## Modules
//!
//! - [`encoding`]: Encoding detection
//! - [`index`]: Chapter indexing and off-thread loading
//! - [`layout`]: Paragraph layout, the chapter window and its viewport
//! - [`selection`]: Hit-testing and selection
//! - [`reader`]: Session state wiring it all together
//! - [`config`]: Saved command-line defaults
//! - [`perf`]: Timing and debug event log

pub mod config;
pub mod encoding;
pub mod index;
pub mod layout;
pub mod perf;
pub mod reader;
pub mod selection;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::index::{
        ChapterIndex, ChapterSource, IndexConfig, IndexWorker, build_index,
    };
    pub use crate::layout::{CellMetrics, ChapterWindow, LayoutStyle, TextMeasurer, WindowConfig};
    pub use crate::reader::{Message, Model, Reader};
    pub use crate::selection::{Selection, TextPosition};
}

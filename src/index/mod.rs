//! Chapter indexing over large plain-text files.
//!
//! This module handles:
//! - Scanning a whole file for chapter headings in one left-to-right pass
//! - Recording byte offsets only, never copying chapter text
//! - Reading and decoding a single chapter's byte range on demand
//!
//! Every failure is absorbed into a degraded but valid result: an unreadable
//! file yields zero chapters, a file without headings yields one chapter
//! named after the file, and an undecodable chapter yields a placeholder.

mod pattern;
mod scan;
pub mod worker;

pub use pattern::{DEFAULT_HEADING_PATTERN, HeadingPattern, PatternError};
pub use worker::{IndexEvent, IndexWorker, LoadRequest};

use std::borrow::Cow;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::encoding::{self, EncodingChoice, ResolvedEncoding, SNIFF_LEN};
use scan::Collector;

/// One discovered chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterIndexEntry {
    /// The matched heading text.
    pub title: String,
    /// Byte offset of the heading match.
    pub start_offset: u64,
    /// Byte offset just past the heading line and its line break.
    pub body_offset: u64,
}

/// Inputs to [`build_index`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    /// Regular expression recognising a chapter heading.
    pub heading_pattern: String,
    pub encoding: EncodingChoice,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            heading_pattern: DEFAULT_HEADING_PATTERN.to_string(),
            encoding: EncodingChoice::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} is empty", .0.display())]
    EmptyFile(PathBuf),
    #[error("chapter {index} out of range ({count} chapters)")]
    OutOfRange { index: usize, count: usize },
    #[error("chapter {index} is not valid {encoding}")]
    Decode {
        index: usize,
        encoding: &'static str,
    },
    #[error("scan superseded by a newer open")]
    Cancelled,
}

/// Anything the layout window can pull chapter text from.
pub trait ChapterSource {
    fn chapter_count(&self) -> usize;

    /// Display text for a chapter; empty if it cannot be provided.
    fn chapter_text(&self, index: usize) -> String;
}

/// In-memory books, mostly for tests and benchmarks.
impl ChapterSource for [String] {
    fn chapter_count(&self) -> usize {
        self.len()
    }

    fn chapter_text(&self, index: usize) -> String {
        self.get(index).cloned().unwrap_or_default()
    }
}

/// Ordered chapter offsets for one file.
///
/// Built once per open and never mutated afterwards. Only offsets are kept
/// resident; chapter text is re-read from disk on every request.
#[derive(Debug, Clone)]
pub struct ChapterIndex {
    path: PathBuf,
    encoding: ResolvedEncoding,
    file_len: u64,
    entries: Vec<ChapterIndexEntry>,
}

impl ChapterIndex {
    /// An index with no chapters, used when a file cannot be opened.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            encoding: ResolvedEncoding {
                encoding: encoding_rs::UTF_8,
                bom_len: 0,
            },
            file_len: 0,
            entries: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub const fn encoding(&self) -> ResolvedEncoding {
        self.encoding
    }

    pub const fn file_len(&self) -> u64 {
        self.file_len
    }

    pub fn entries(&self) -> &[ChapterIndexEntry] {
        &self.entries
    }

    pub fn chapter_count(&self) -> usize {
        self.entries.len()
    }

    pub fn chapter_title(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|entry| entry.title.as_str())
    }

    /// Decoded chapter body: everything after the heading line up to the
    /// next heading (or end of file).
    ///
    /// Never fails. Out-of-range requests give an empty string and
    /// undecodable bytes give a visible placeholder.
    pub fn chapter_content(&self, index: usize) -> String {
        self.try_chapter_content(index)
            .unwrap_or_else(|err| self.degrade(index, &err))
    }

    /// Decoded chapter including its heading line.
    ///
    /// Concatenating this for every chapter reproduces the file from the
    /// first heading to the end.
    pub fn chapter_raw(&self, index: usize) -> String {
        self.try_chapter_raw(index)
            .unwrap_or_else(|err| self.degrade(index, &err))
    }

    /// # Errors
    ///
    /// Returns [`IndexError::OutOfRange`], [`IndexError::Io`] or
    /// [`IndexError::Decode`].
    pub fn try_chapter_content(&self, index: usize) -> Result<String, IndexError> {
        let (entry, end) = self.span(index)?;
        self.read_decoded(index, entry.body_offset.min(end), end)
    }

    /// # Errors
    ///
    /// Same as [`ChapterIndex::try_chapter_content`].
    pub fn try_chapter_raw(&self, index: usize) -> Result<String, IndexError> {
        let (entry, end) = self.span(index)?;
        self.read_decoded(index, entry.start_offset, end)
    }

    fn span(&self, index: usize) -> Result<(&ChapterIndexEntry, u64), IndexError> {
        let entry = self.entries.get(index).ok_or(IndexError::OutOfRange {
            index,
            count: self.entries.len(),
        })?;
        let end = self
            .entries
            .get(index + 1)
            .map_or(self.file_len, |next| next.start_offset);
        Ok((entry, end))
    }

    fn read_decoded(&self, index: usize, start: u64, end: u64) -> Result<String, IndexError> {
        if end <= start {
            return Ok(String::new());
        }
        let bytes = read_range(&self.path, start, end).map_err(|source| IndexError::Io {
            path: self.path.clone(),
            source,
        })?;
        self.encoding
            .encoding
            .decode_without_bom_handling_and_without_replacement(&bytes)
            .map(Cow::into_owned)
            .ok_or(IndexError::Decode {
                index,
                encoding: self.encoding.name(),
            })
    }

    fn degrade(&self, index: usize, err: &IndexError) -> String {
        tracing::warn!(path = %self.path.display(), index, %err, "chapter unavailable");
        crate::perf::log_event("chapter.degraded", format!("index={index} err={err}"));
        match err {
            IndexError::Decode { encoding, .. } => {
                format!("[Chapter {} could not be decoded as {encoding}]", index + 1)
            }
            _ => String::new(),
        }
    }
}

impl ChapterSource for ChapterIndex {
    fn chapter_count(&self) -> usize {
        self.entries.len()
    }

    /// The heading is part of what the reader sees.
    fn chapter_text(&self, index: usize) -> String {
        self.chapter_raw(index)
    }
}

fn read_range(path: &Path, start: u64, end: u64) -> io::Result<Vec<u8>> {
    let len = usize::try_from(end - start)
        .map_err(|_| io::Error::other("chapter does not fit in memory"))?;
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(start))?;
    let mut buf = vec![0; len];
    file.read_exact(&mut buf)?;
    Ok(buf)
}

/// Index `path`, absorbing every failure into a degraded result.
///
/// Unreadable and empty files give zero chapters.
pub fn build_index(path: &Path, config: &IndexConfig) -> ChapterIndex {
    try_build_index(path, config).unwrap_or_else(|err| {
        tracing::warn!(path = %path.display(), %err, "indexing failed");
        ChapterIndex::empty(path)
    })
}

/// Index `path`, reporting why it failed.
///
/// # Errors
///
/// Returns [`IndexError::Io`] if the file cannot be opened or mapped and
/// [`IndexError::EmptyFile`] for a zero-length file.
pub fn try_build_index(path: &Path, config: &IndexConfig) -> Result<ChapterIndex, IndexError> {
    build_index_with(path, config, &mut |_| ControlFlow::Continue(()))
}

/// Index `path`, calling `on_found` for each chapter in offset order.
///
/// Returning `Break` from the callback abandons the scan.
///
/// # Errors
///
/// As [`try_build_index`], plus [`IndexError::Cancelled`] when the callback
/// stopped the scan.
pub fn build_index_with(
    path: &Path,
    config: &IndexConfig,
    on_found: &mut dyn FnMut(&ChapterIndexEntry) -> ControlFlow<()>,
) -> Result<ChapterIndex, IndexError> {
    let io_err = |source: io::Error| IndexError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(io_err)?;
    let file_len = file.metadata().map_err(io_err)?.len();
    if file_len == 0 {
        return Err(IndexError::EmptyFile(path.to_path_buf()));
    }

    let _scope = crate::perf::scope("index.scan");
    // SAFETY: the map is read-only and dropped before returning. Another
    // process truncating the file mid-scan is the usual mmap caveat.
    #[allow(unsafe_code)]
    let map = unsafe { Mmap::map(&file) }.map_err(io_err)?;

    let detection = encoding::detect(&map[..SNIFF_LEN.min(map.len())]);
    let resolved = encoding::resolve(detection, config.encoding);
    tracing::debug!(path = %path.display(), encoding = resolved.name(), "scanning");

    let mut collector = Collector::new(on_found);
    match HeadingPattern::compile(&config.heading_pattern) {
        Ok(pattern) => {
            if scan::scan(&map, resolved, &pattern, &mut collector).is_break() {
                return Err(IndexError::Cancelled);
            }
        }
        Err(err) => tracing::warn!(%err, "no usable heading pattern"),
    }

    if collector.is_empty() {
        let fallback = ChapterIndexEntry {
            title: display_name(path),
            start_offset: resolved.bom_len as u64,
            body_offset: resolved.bom_len as u64,
        };
        if collector.push(fallback).is_break() {
            return Err(IndexError::Cancelled);
        }
    }

    let entries = collector.into_entries();
    crate::perf::log_event(
        "index.done",
        format!("path={} chapters={}", path.display(), entries.len()),
    );
    Ok(ChapterIndex {
        path: path.to_path_buf(),
        encoding: resolved,
        file_len,
        entries,
    })
}

fn display_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}

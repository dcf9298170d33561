//! Heading scan over a mapped file.
//!
//! Three strategies, chosen by encoding:
//! - UTF-8 files are matched in place with the byte regex, no copying
//! - ASCII-compatible legacy encodings are decoded one line at a time
//! - Anything else (UTF-16) is decoded whole for the duration of the scan
//!
//! Byte offsets are always reported in the file's own encoding.

use std::ops::ControlFlow;

use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE};
use regex::{Regex, bytes};

use super::ChapterIndexEntry;
use super::pattern::HeadingPattern;
use crate::encoding::ResolvedEncoding;

/// Receives entries in scan order and keeps offsets strictly increasing.
pub(super) struct Collector<'a> {
    entries: Vec<ChapterIndexEntry>,
    on_found: &'a mut dyn FnMut(&ChapterIndexEntry) -> ControlFlow<()>,
}

impl<'a> Collector<'a> {
    pub(super) fn new(on_found: &'a mut dyn FnMut(&ChapterIndexEntry) -> ControlFlow<()>) -> Self {
        Self {
            entries: Vec::new(),
            on_found,
        }
    }

    pub(super) fn push(&mut self, entry: ChapterIndexEntry) -> ControlFlow<()> {
        if entry.title.is_empty()
            || self
                .entries
                .last()
                .is_some_and(|last| entry.start_offset <= last.start_offset)
        {
            return ControlFlow::Continue(());
        }
        let flow = (self.on_found)(&entry);
        self.entries.push(entry);
        flow
    }

    pub(super) const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(super) fn into_entries(self) -> Vec<ChapterIndexEntry> {
        self.entries
    }
}

/// Scan `buffer` (the whole file) for headings.
///
/// Returns `Break` if the callback asked to stop.
pub(super) fn scan(
    buffer: &[u8],
    encoding: ResolvedEncoding,
    pattern: &HeadingPattern,
    out: &mut Collector<'_>,
) -> ControlFlow<()> {
    let base = encoding.bom_len.min(buffer.len());
    let text = &buffer[base..];
    if encoding.encoding == UTF_8 {
        scan_utf8(text, base, pattern.bytes_regex(), out)
    } else if encoding.encoding.is_ascii_compatible() {
        scan_lines(text, base, encoding.encoding, pattern.text_regex(), out)
    } else {
        scan_decoded(text, base, encoding.encoding, pattern.text_regex(), out)
    }
}

fn scan_utf8(
    text: &[u8],
    base: usize,
    regex: &bytes::Regex,
    out: &mut Collector<'_>,
) -> ControlFlow<()> {
    for m in regex.find_iter(text) {
        let end = m.end() + line_break_len(&text[m.end()..]);
        out.push(ChapterIndexEntry {
            title: String::from_utf8_lossy(m.as_bytes()).into_owned(),
            start_offset: (base + m.start()) as u64,
            body_offset: (base + end) as u64,
        })?;
    }
    ControlFlow::Continue(())
}

fn scan_lines(
    text: &[u8],
    base: usize,
    encoding: &'static Encoding,
    regex: &Regex,
    out: &mut Collector<'_>,
) -> ControlFlow<()> {
    let mut line_start = 0usize;
    for line in text.split_inclusive(|&b| b == b'\n') {
        let (decoded, _) = encoding.decode_without_bom_handling(line);
        if regex.is_match(&decoded) {
            let mapped = MappedLine::decode(encoding, line);
            for m in regex.find_iter(&mapped.text) {
                let start = line_start + mapped.source_offset(m.start());
                let end = line_start + mapped.source_offset(m.end());
                let body = end + line_break_len(&text[end.min(text.len())..]);
                out.push(ChapterIndexEntry {
                    title: m.as_str().to_string(),
                    start_offset: (base + start) as u64,
                    body_offset: (base + body) as u64,
                })?;
            }
        }
        line_start += line.len();
    }
    ControlFlow::Continue(())
}

/// Longest byte sequence of one character in the legacy encodings.
const MAX_SEQUENCE_LEN: usize = 4;

/// A line decoded one character at a time, remembering where each
/// character starts in the source bytes.
///
/// Re-encoding decoded text does not give source lengths back: malformed
/// bytes become U+FFFD and some characters have no encoding in the
/// encoder's table.
struct MappedLine {
    text: String,
    /// `(text offset, source offset)` at every character start, then the end.
    starts: Vec<(usize, usize)>,
}

impl MappedLine {
    fn decode(encoding: &'static Encoding, line: &[u8]) -> Self {
        let mut text = String::with_capacity(line.len() * 2);
        let mut starts = Vec::new();
        let mut pos = 0;
        while pos < line.len() {
            starts.push((text.len(), pos));
            let longest = MAX_SEQUENCE_LEN.min(line.len() - pos);
            let step = (1..=longest).find_map(|len| {
                encoding
                    .decode_without_bom_handling_and_without_replacement(&line[pos..pos + len])
                    .filter(|decoded| !decoded.is_empty())
                    .map(|decoded| (len, decoded))
            });
            match step {
                Some((len, decoded)) => {
                    text.push_str(&decoded);
                    pos += len;
                }
                None => {
                    text.push(char::REPLACEMENT_CHARACTER);
                    pos += 1;
                }
            }
        }
        starts.push((text.len(), line.len()));
        Self { text, starts }
    }

    /// Source offset of the character at or before text offset `at`.
    fn source_offset(&self, at: usize) -> usize {
        let idx = self.starts.partition_point(|&(text_pos, _)| text_pos <= at);
        self.starts[idx.saturating_sub(1)].1
    }
}

fn scan_decoded(
    text: &[u8],
    base: usize,
    encoding: &'static Encoding,
    regex: &Regex,
    out: &mut Collector<'_>,
) -> ControlFlow<()> {
    let (decoded, _) = encoding.decode_without_bom_handling(text);
    // Running (char, byte) cursor so each prefix is only measured once.
    let mut char_pos = 0usize;
    let mut byte_pos = 0usize;
    for m in regex.find_iter(&decoded) {
        byte_pos += encoded_len(encoding, &decoded[char_pos..m.start()]);
        let start = byte_pos;
        byte_pos += encoded_len(encoding, m.as_str());
        char_pos = m.end();

        let rest = &decoded[m.end()..];
        let line_break = ["\r\n", "\n", "\r"]
            .into_iter()
            .find(|brk| rest.starts_with(brk))
            .unwrap_or("");
        let body = byte_pos + encoded_len(encoding, line_break);
        out.push(ChapterIndexEntry {
            title: m.as_str().to_string(),
            start_offset: (base + start) as u64,
            body_offset: (base + body) as u64,
        })?;
    }
    ControlFlow::Continue(())
}

fn line_break_len(rest: &[u8]) -> usize {
    if rest.starts_with(b"\r\n") {
        2
    } else if rest.starts_with(b"\n") || rest.starts_with(b"\r") {
        1
    } else {
        0
    }
}

/// Encoded length of valid decoded text. Exact for UTF-16, where every
/// code unit decodes to one UTF-16 unit, malformed ones to U+FFFD.
fn encoded_len(encoding: &'static Encoding, text: &str) -> usize {
    if encoding == UTF_16LE || encoding == UTF_16BE {
        text.encode_utf16().count() * 2
    } else {
        encoding.encode(text).0.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::DEFAULT_HEADING_PATTERN;
    use encoding_rs::{BIG5, GB18030};

    fn default_pattern() -> HeadingPattern {
        HeadingPattern::compile(DEFAULT_HEADING_PATTERN).unwrap()
    }

    fn collect(buffer: &[u8], encoding: ResolvedEncoding) -> Vec<ChapterIndexEntry> {
        let mut sink = |_: &ChapterIndexEntry| ControlFlow::Continue(());
        let mut out = Collector::new(&mut sink);
        let flow = scan(buffer, encoding, &default_pattern(), &mut out);
        assert!(flow.is_continue());
        out.into_entries()
    }

    const fn plain(encoding: &'static Encoding) -> ResolvedEncoding {
        ResolvedEncoding {
            encoding,
            bom_len: 0,
        }
    }

    #[test]
    fn test_utf8_offsets_point_at_headings() {
        let text = "前言\n第一章 开始\n正文\n第二章 继续\r\n尾声";
        let entries = collect(text.as_bytes(), plain(UTF_8));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].start_offset as usize, text.find("第一章").unwrap());
        assert_eq!(entries[0].body_offset as usize, text.find("正文").unwrap());
        assert_eq!(entries[1].title, "第二章 继续");
        assert_eq!(entries[1].body_offset as usize, text.find("尾声").unwrap());
    }

    #[test]
    fn test_gb18030_offsets_match_encoded_bytes() {
        let text = "序\n第一章 开始\n正文一\n第二章 继续\n正文二";
        let (bytes, _, _) = GB18030.encode(text);
        let entries = collect(&bytes, plain(GB18030));
        assert_eq!(entries.len(), 2);
        let (heading, _, _) = GB18030.encode("第二章 继续");
        let start = entries[1].start_offset as usize;
        assert_eq!(&bytes[start..start + heading.len()], &heading[..]);
        assert_eq!(entries[1].title, "第二章 继续");
    }

    #[test]
    fn test_malformed_byte_before_heading_keeps_offsets() {
        let mut bytes = GB18030.encode("序言\n").0.into_owned();
        bytes.push(0x81);
        bytes.extend_from_slice(&GB18030.encode(" 第一章 开始\n正文").0);
        let entries = collect(&bytes, plain(GB18030));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "第一章 开始");
        // 序言 and newline (5), stray lead byte, space
        assert_eq!(entries[0].start_offset, 7);
        assert_eq!(entries[0].body_offset, 19);
        assert_eq!(&bytes[19..], &GB18030.encode("正文").0[..]);
    }

    #[test]
    fn test_multi_char_sequence_before_heading_keeps_offsets() {
        // 0x8862 decodes to two code points that do not encode back to it.
        let mut bytes = vec![0x88, 0x62];
        bytes.extend_from_slice(&BIG5.encode(" 第一章 開始\n正文").0);
        let entries = collect(&bytes, plain(BIG5));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "第一章 開始");
        assert_eq!(entries[0].start_offset, 3);
        let body = entries[0].body_offset as usize;
        assert_eq!(&bytes[body..], &BIG5.encode("正文").0[..]);
    }

    #[test]
    fn test_utf16_offsets_skip_bom() {
        let text = "第一章 开\n文";
        let mut bytes = vec![0xFF, 0xFE];
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let entries = collect(
            &bytes,
            ResolvedEncoding {
                encoding: UTF_16LE,
                bom_len: 2,
            },
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].start_offset, 2);
        // 5 code units of heading + 1 newline
        assert_eq!(entries[0].body_offset, 2 + 12);
    }

    #[test]
    fn test_callback_break_stops_scan() {
        let text = "第一章\n第二章\n第三章\n";
        let mut seen = 0;
        let mut sink = |_: &ChapterIndexEntry| {
            seen += 1;
            if seen == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        };
        let mut out = Collector::new(&mut sink);
        let flow = scan(
            text.as_bytes(),
            plain(UTF_8),
            &default_pattern(),
            &mut out,
        );
        assert!(flow.is_break());
        assert_eq!(out.into_entries().len(), 2);
    }

    #[test]
    fn test_empty_matches_are_ignored() {
        let pattern = HeadingPattern::compile("x*").unwrap();
        let mut sink = |_: &ChapterIndexEntry| ControlFlow::Continue(());
        let mut out = Collector::new(&mut sink);
        let _ = scan(b"abc", plain(UTF_8), &pattern, &mut out);
        assert!(out.is_empty());
    }
}

//! Text encoding detection.
//!
//! Novels distributed as plain text come in whatever encoding the uploader's
//! editor happened to use. The detector sniffs a prefix of the file and
//! reports a best guess:
//! - A byte order mark wins outright
//! - Valid UTF-8 (allowing a sequence cut off by the prefix boundary)
//! - Otherwise the legacy CJK encoding whose decode looks most like prose
//!
//! Detection never fails; an undecidable prefix is reported as
//! [`Detection::Unknown`] and resolved through [`EncodingChoice`].

use encoding_rs::{BIG5, EUC_KR, Encoding, GB18030, SHIFT_JIS, UTF_8};

/// Number of leading bytes inspected by [`detect`].
pub const SNIFF_LEN: usize = 4096;

/// Legacy encodings tried, in order, when the prefix is not UTF-8.
const LEGACY_CANDIDATES: &[&Encoding] = &[GB18030, BIG5, SHIFT_JIS, EUC_KR];

/// Result of sniffing a byte prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    /// A byte order mark was present; `bom_len` bytes precede the text.
    Bom {
        encoding: &'static Encoding,
        bom_len: usize,
    },
    /// No BOM, but the prefix decodes cleanly as this encoding.
    Guessed(&'static Encoding),
    /// Nothing fit.
    Unknown,
}

/// How the caller wants the encoding chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingChoice {
    /// Sniff the file, using `fallback` when detection is inconclusive.
    ///
    /// A fallback of UTF-8 means "assume the file is already Unicode".
    Auto { fallback: &'static Encoding },
    /// Skip detection. A BOM matching the forced encoding is still skipped.
    Forced(&'static Encoding),
}

impl Default for EncodingChoice {
    fn default() -> Self {
        Self::Auto { fallback: UTF_8 }
    }
}

impl EncodingChoice {
    /// Parse a WHATWG label such as `gbk`, `utf-8` or `shift_jis`.
    ///
    /// `auto` selects detection with the UTF-8 fallback.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        if label.eq_ignore_ascii_case("auto") {
            return Some(Self::default());
        }
        Encoding::for_label(label.as_bytes()).map(Self::Forced)
    }
}

/// The encoding actually used to read a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedEncoding {
    pub encoding: &'static Encoding,
    /// Bytes of byte order mark at the start of the file.
    pub bom_len: usize,
}

impl ResolvedEncoding {
    /// Human-readable encoding name, e.g. `GBK`.
    pub fn name(&self) -> &'static str {
        self.encoding.name()
    }
}

/// Sniff `prefix` (normally the first [`SNIFF_LEN`] bytes of a file).
pub fn detect(prefix: &[u8]) -> Detection {
    if let Some((encoding, bom_len)) = Encoding::for_bom(prefix) {
        return Detection::Bom { encoding, bom_len };
    }
    if prefix.is_empty() {
        return Detection::Unknown;
    }
    if is_utf8_prefix(prefix) {
        return Detection::Guessed(UTF_8);
    }

    let mut best: Option<(&'static Encoding, usize)> = None;
    for &candidate in LEGACY_CANDIDATES {
        let Some(score) = prose_score(candidate, prefix) else {
            continue;
        };
        if best.is_none_or(|(_, best_score)| score > best_score) {
            best = Some((candidate, score));
        }
    }
    best.map_or(Detection::Unknown, |(encoding, _)| Detection::Guessed(encoding))
}

/// Combine a detection with the caller's choice.
pub fn resolve(detection: Detection, choice: EncodingChoice) -> ResolvedEncoding {
    match (choice, detection) {
        (EncodingChoice::Forced(encoding), Detection::Bom { encoding: bom, bom_len })
            if bom == encoding =>
        {
            ResolvedEncoding { encoding, bom_len }
        }
        (EncodingChoice::Forced(encoding), _) => ResolvedEncoding {
            encoding,
            bom_len: 0,
        },
        (EncodingChoice::Auto { .. }, Detection::Bom { encoding, bom_len }) => {
            ResolvedEncoding { encoding, bom_len }
        }
        (EncodingChoice::Auto { .. }, Detection::Guessed(encoding)) => ResolvedEncoding {
            encoding,
            bom_len: 0,
        },
        (EncodingChoice::Auto { fallback }, Detection::Unknown) => {
            tracing::debug!(fallback = fallback.name(), "encoding undetected, using fallback");
            ResolvedEncoding {
                encoding: fallback,
                bom_len: 0,
            }
        }
    }
}

/// Valid UTF-8, or valid up to a multi-byte sequence truncated at the end.
fn is_utf8_prefix(prefix: &[u8]) -> bool {
    let valid = Encoding::utf8_valid_up_to(prefix);
    if valid == prefix.len() {
        return true;
    }
    let tail = &prefix[valid..];
    // A cut-off sequence is at most 3 bytes and starts with a lead byte.
    tail.len() < 4 && tail[0] >= 0xC2 && tail[1..].iter().all(|b| b & 0xC0 == 0x80)
}

/// Count of ideographs/kana/hangul in a clean decode, `None` if malformed.
fn prose_score(encoding: &'static Encoding, prefix: &[u8]) -> Option<usize> {
    // Legacy multi-byte characters are at most 4 bytes; tolerate a cut at the end.
    let text = (0..4.min(prefix.len())).find_map(|trim| {
        encoding.decode_without_bom_handling_and_without_replacement(
            &prefix[..prefix.len() - trim],
        )
    })?;
    let score = text.chars().filter(|&ch| is_cjk(ch)).count();
    Some(score)
}

const fn is_cjk(ch: char) -> bool {
    matches!(ch,
        '\u{3040}'..='\u{30FF}'     // kana
        | '\u{3400}'..='\u{4DBF}'   // CJK extension A
        | '\u{4E00}'..='\u{9FFF}'   // CJK unified ideographs
        | '\u{AC00}'..='\u{D7AF}'   // hangul syllables
        | '\u{FF01}'..='\u{FF5E}')  // full-width forms
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::{UTF_16BE, UTF_16LE};

    #[test]
    fn test_detect_utf8_bom() {
        let bytes = b"\xEF\xBB\xBFhello";
        assert_eq!(
            detect(bytes),
            Detection::Bom {
                encoding: UTF_8,
                bom_len: 3
            }
        );
    }

    #[test]
    fn test_detect_utf16_boms() {
        assert_eq!(
            detect(b"\xFF\xFEa\0"),
            Detection::Bom {
                encoding: UTF_16LE,
                bom_len: 2
            }
        );
        assert_eq!(
            detect(b"\xFE\xFF\0a"),
            Detection::Bom {
                encoding: UTF_16BE,
                bom_len: 2
            }
        );
    }

    #[test]
    fn test_detect_plain_utf8_chinese() {
        assert_eq!(detect("第一章 开始".as_bytes()), Detection::Guessed(UTF_8));
    }

    #[test]
    fn test_detect_utf8_with_truncated_tail() {
        let text = "第一章 开始".as_bytes();
        // Cut the last ideograph in half.
        let cut = &text[..text.len() - 1];
        assert_eq!(detect(cut), Detection::Guessed(UTF_8));
    }

    #[test]
    fn test_detect_gbk_text() {
        let (bytes, _, _) = GB18030.encode("第一章 开始\n这是正文内容。");
        assert_eq!(detect(&bytes), Detection::Guessed(GB18030));
    }

    #[test]
    fn test_detect_empty_is_unknown() {
        assert_eq!(detect(b""), Detection::Unknown);
    }

    #[test]
    fn test_resolve_unknown_uses_fallback() {
        let resolved = resolve(
            Detection::Unknown,
            EncodingChoice::Auto { fallback: GB18030 },
        );
        assert_eq!(resolved.encoding, GB18030);
        assert_eq!(resolved.bom_len, 0);
    }

    #[test]
    fn test_resolve_forced_keeps_matching_bom() {
        let resolved = resolve(
            Detection::Bom {
                encoding: UTF_8,
                bom_len: 3,
            },
            EncodingChoice::Forced(UTF_8),
        );
        assert_eq!(resolved.bom_len, 3);
    }

    #[test]
    fn test_resolve_forced_ignores_foreign_bom() {
        let resolved = resolve(
            Detection::Bom {
                encoding: UTF_16LE,
                bom_len: 2,
            },
            EncodingChoice::Forced(GB18030),
        );
        assert_eq!(resolved.encoding, GB18030);
        assert_eq!(resolved.bom_len, 0);
    }

    #[test]
    fn test_choice_from_label() {
        assert_eq!(
            EncodingChoice::from_label("gbk"),
            Some(EncodingChoice::Forced(encoding_rs::GBK))
        );
        assert_eq!(
            EncodingChoice::from_label("AUTO"),
            Some(EncodingChoice::default())
        );
        assert_eq!(EncodingChoice::from_label("klingon"), None);
    }
}

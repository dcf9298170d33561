//! Chapter heading patterns.

use regex::{Regex, RegexBuilder, bytes};

/// Default heading rule: `第<numeral>章` followed by the rest of the line.
///
/// Numerals may be Chinese (including 两/零/〇), ASCII or full-width digits.
pub const DEFAULT_HEADING_PATTERN: &str =
    "第[一二三四五六七八九十百千万两零〇0-9０-９]+章[^\\r\\n]*";

/// Error compiling a user-supplied heading pattern.
#[derive(Debug, thiserror::Error)]
#[error("invalid chapter heading pattern `{pattern}`: {source}")]
pub struct PatternError {
    pub pattern: String,
    #[source]
    pub source: regex::Error,
}

/// A compiled chapter heading rule.
///
/// Holds both a byte-level regex (scanned directly over UTF-8 files) and a
/// text regex (used on decoded lines of other encodings). Both are
/// case-insensitive so `chapter 1` and `CHAPTER 1` match the same rule.
#[derive(Debug, Clone)]
pub struct HeadingPattern {
    source: String,
    bytes: bytes::Regex,
    text: Regex,
}

impl HeadingPattern {
    /// Compile a heading pattern.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] if the expression is not a valid regex.
    pub fn compile(pattern: &str) -> Result<Self, PatternError> {
        let wrap = |source| PatternError {
            pattern: pattern.to_string(),
            source,
        };
        let bytes = bytes::RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(wrap)?;
        let text = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(wrap)?;
        Ok(Self {
            source: pattern.to_string(),
            bytes,
            text,
        })
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub(crate) const fn bytes_regex(&self) -> &bytes::Regex {
        &self.bytes
    }

    pub(crate) const fn text_regex(&self) -> &Regex {
        &self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pattern_matches_chinese_numerals() {
        let pattern = HeadingPattern::compile(DEFAULT_HEADING_PATTERN).unwrap();
        for heading in ["第一章 开始", "第十二章", "第两百零一章 归来", "第3章 x", "第１２章"] {
            assert!(
                pattern.text_regex().is_match(heading),
                "should match {heading}"
            );
        }
    }

    #[test]
    fn test_default_pattern_stops_at_line_end() {
        let pattern = HeadingPattern::compile(DEFAULT_HEADING_PATTERN).unwrap();
        let m = pattern
            .bytes_regex()
            .find("第一章 开始\r\n正文".as_bytes())
            .unwrap();
        assert_eq!(m.as_bytes(), "第一章 开始".as_bytes());
    }

    #[test]
    fn test_default_pattern_rejects_plain_prose() {
        let pattern = HeadingPattern::compile(DEFAULT_HEADING_PATTERN).unwrap();
        assert!(!pattern.text_regex().is_match("第一次见面"));
    }

    #[test]
    fn test_custom_pattern_is_case_insensitive() {
        let pattern = HeadingPattern::compile(r"chapter \d+[^\n]*").unwrap();
        assert!(pattern.text_regex().is_match("CHAPTER 7: The End"));
        assert!(pattern.bytes_regex().is_match(b"Chapter 7"));
    }

    #[test]
    fn test_invalid_pattern_reports_source() {
        let err = HeadingPattern::compile("第(章").unwrap_err();
        assert_eq!(err.pattern, "第(章");
        assert!(err.to_string().contains("invalid chapter heading pattern"));
    }
}

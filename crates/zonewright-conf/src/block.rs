//! Brace-block scanning.
//!
//! A block is a header of the form `<kind> "<name>"` followed by a brace
//! delimited body and an optional terminating `;`. Blocks nest (zones live
//! inside views), so the closing brace is found by counting depth rather than
//! by pattern matching. Quoted strings and comments (`//`, `#`, `/* */`) are
//! skipped by both the header search and the depth counter.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{ConfError, Result};

// ============================================================================
// Block Kinds
// ============================================================================

/// Kinds of blocks this crate knows how to locate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    /// `view "name" { ... };`
    View,
    /// `zone "name" { ... };`
    Zone,
    /// `acl "name" { ... };`
    Acl,
}

impl BlockKind {
    /// Returns the configuration keyword for this kind.
    pub const fn keyword(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Zone => "zone",
            Self::Acl => "acl",
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl FromStr for BlockKind {
    type Err = ConfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "view" => Ok(Self::View),
            "zone" => Ok(Self::Zone),
            "acl" => Ok(Self::Acl),
            other => Err(ConfError::invalid("block kind", format!("unknown kind '{other}'"))),
        }
    }
}

// ============================================================================
// Spans
// ============================================================================

/// Location of a matched block inside a text buffer.
///
/// Offsets are byte offsets into the buffer the span was produced from and
/// are only meaningful until that buffer is modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSpan {
    /// Kind of the block.
    pub kind: BlockKind,
    /// Name as written in the header, without quotes.
    pub name: String,
    /// Offset of the first byte of the keyword.
    pub start: usize,
    /// Offset of the opening brace.
    pub open_brace: usize,
    /// Offset of the matching closing brace.
    pub close_brace: usize,
    /// Offset just past the closing brace and any following run of
    /// whitespace and `;`.
    pub end: usize,
}

impl BlockSpan {
    /// Returns the raw interior between the braces.
    pub fn body<'a>(&self, text: &'a str) -> &'a str {
        &text[self.open_brace + 1..self.close_brace]
    }

    /// Returns the header up to and including the opening brace.
    pub fn header<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..=self.open_brace]
    }

    /// Returns the matched region `[start, end)`.
    pub fn region<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }

    /// Returns the offset just past the closing brace and its `;`, if any,
    /// without the trailing whitespace run.
    pub fn statement_end(&self, text: &str) -> usize {
        let bytes = text.as_bytes();
        let mut i = self.close_brace + 1;
        while i < self.end && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i < self.end && bytes[i] == b';' {
            i + 1
        } else {
            self.close_brace + 1
        }
    }

    /// Copies the block out of the buffer.
    pub fn to_block(&self, text: &str) -> ConfigBlock {
        ConfigBlock {
            kind: self.kind,
            name: self.name.clone(),
            body: self.body(text).to_string(),
            start: self.start,
            end: self.end,
        }
    }
}

/// A named, typed region of configuration text.
///
/// Blocks are snapshots; they are recomputed from the text for every
/// operation and never kept across mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigBlock {
    /// Kind of the block.
    pub kind: BlockKind,
    /// Name as written in the header.
    pub name: String,
    /// Raw interior text.
    pub body: String,
    /// Start offset of the matched region.
    pub start: usize,
    /// End offset of the matched region, including trailing `;` and
    /// whitespace.
    pub end: usize,
}

// ============================================================================
// Scanner
// ============================================================================

/// Block scanner over a single text buffer.
///
/// Construction precomputes the comment and string ranges of the buffer so
/// repeated lookups over the same text stay linear.
#[derive(Debug)]
pub struct Scanner<'a> {
    text: &'a str,
    masked: Vec<Range<usize>>,
}

impl<'a> Scanner<'a> {
    /// Creates a scanner over `text`.
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            masked: masked_ranges(text),
        }
    }

    /// Returns the scanned text.
    pub fn text(&self) -> &'a str {
        self.text
    }

    /// Finds the first `kind "name"` block in the document.
    pub fn find(&self, kind: BlockKind, name: &str) -> Result<BlockSpan> {
        self.find_from(0, kind, name)
    }

    /// Finds the first `kind "name"` block starting at or after `from`.
    pub fn find_from(&self, from: usize, kind: BlockKind, name: &str) -> Result<BlockSpan> {
        let escaped = regex::escape(name);
        let pattern = format!(
            r#"(?i:{})\s+(?:"({escaped})"|({escaped})(?:[\s{{]|$))"#,
            kind.keyword()
        );
        let re = Regex::new(&pattern)
            .map_err(|e| ConfError::invalid("block name", e.to_string()))?;

        match self.next_match(&re, from, kind)? {
            Some(span) => Ok(span),
            None => Err(ConfError::not_found(kind, name)),
        }
    }

    /// Finds the next block of `kind`, whatever its name, at or after `from`.
    pub fn find_any(&self, from: usize, kind: BlockKind) -> Result<Option<BlockSpan>> {
        let pattern = format!(
            r#"(?i:{})\s+(?:"([^"]*)"|([^\s{{}};"]+))"#,
            kind.keyword()
        );
        let re = Regex::new(&pattern)
            .map_err(|e| ConfError::invalid("block kind", e.to_string()))?;
        self.next_match(&re, from, kind)
    }

    /// Collects every top-level block of `kind` within `range`.
    ///
    /// Scanning resumes past each matched block, so blocks nested inside a
    /// match are not reported.
    pub fn blocks_in(&self, range: Range<usize>, kind: BlockKind) -> Result<Vec<BlockSpan>> {
        let mut spans = Vec::new();
        let mut pos = range.start;
        while pos < range.end {
            match self.find_any(pos, kind)? {
                Some(span) if span.start < range.end && span.close_brace < range.end => {
                    pos = span.end.max(span.close_brace + 1);
                    spans.push(span);
                }
                _ => break,
            }
        }
        Ok(spans)
    }

    /// Collects every block of `kind` in the whole document, skipping blocks
    /// nested inside another match.
    pub fn blocks(&self, kind: BlockKind) -> Result<Vec<BlockSpan>> {
        self.blocks_in(0..self.text.len(), kind)
    }

    /// Returns true if `pos` lies inside a comment or quoted string.
    pub fn is_masked(&self, pos: usize) -> bool {
        self.masked
            .binary_search_by(|r| {
                if r.end <= pos {
                    std::cmp::Ordering::Less
                } else if r.start > pos {
                    std::cmp::Ordering::Greater
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    /// Returns the offset of the brace matching the `{` at `open`.
    pub fn matching_close(&self, open: usize) -> Result<usize> {
        let bytes = self.text.as_bytes();
        let mut depth = 0usize;
        let mut idx = self.masked.partition_point(|r| r.end <= open);
        let mut i = open;

        while i < bytes.len() {
            if let Some(r) = self.masked.get(idx) {
                if r.start <= i {
                    i = r.end.max(i + 1);
                    idx += 1;
                    continue;
                }
            }
            match bytes[i] {
                b'{' => depth += 1,
                b'}' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Ok(i);
                    }
                }
                _ => {}
            }
            i += 1;
        }

        Err(ConfError::malformed(open, "unbalanced braces: no matching '}'"))
    }

    fn next_match(&self, re: &Regex, from: usize, kind: BlockKind) -> Result<Option<BlockSpan>> {
        let from = from.min(self.text.len());
        let haystack = &self.text[from..];

        for caps in re.captures_iter(haystack) {
            let Some(whole) = caps.get(0) else { continue };
            let start = from + whole.start();
            if self.is_masked(start) || !at_statement_boundary(self.text, start) {
                continue;
            }
            let Some(name) = caps.get(1).or_else(|| caps.get(2)) else {
                continue;
            };
            let name_end = from + name.end() + usize::from(caps.get(1).is_some());

            // `zone "x";` inside response-policy and similar lists names a
            // zone without defining one.
            let Some(open_brace) = self.open_brace_after(name_end) else {
                trace!(%kind, name = name.as_str(), start, "skipped block reference");
                continue;
            };
            let close_brace = self.matching_close(open_brace)?;
            let end = consume_separators(self.text, close_brace + 1);

            trace!(%kind, name = name.as_str(), start, end, "matched block");
            return Ok(Some(BlockSpan {
                kind,
                name: name.as_str().to_string(),
                start,
                open_brace,
                close_brace,
                end,
            }));
        }

        Ok(None)
    }

    /// Finds the `{` opening the body of a header ending at `pos`.
    ///
    /// Only whitespace, comments and a class word (`IN`, `CH`, `HS`, `ANY`)
    /// may appear between the header and the brace. Anything else, such as a
    /// `;` or an option keyword, means the header is a reference and `None`
    /// is returned.
    fn open_brace_after(&self, pos: usize) -> Option<usize> {
        let bytes = self.text.as_bytes();
        let mut i = pos;
        while i < bytes.len() {
            if self.is_masked(i) {
                i += 1;
                continue;
            }
            match bytes[i] {
                b'{' => return Some(i),
                b if b.is_ascii_whitespace() => i += 1,
                _ => {
                    let word_end = bytes[i..]
                        .iter()
                        .position(|&b| b.is_ascii_whitespace() || matches!(b, b'{' | b'}' | b';' | b'"'))
                        .map_or(bytes.len(), |p| i + p);
                    if word_end == i || !is_class(&self.text[i..word_end]) {
                        return None;
                    }
                    i = word_end;
                }
            }
        }
        None
    }
}

fn is_class(word: &str) -> bool {
    ["in", "ch", "chaos", "hs", "hesiod", "any"]
        .iter()
        .any(|class| word.eq_ignore_ascii_case(class))
}

// ============================================================================
// Convenience Functions
// ============================================================================

/// Finds the first `kind "name"` block in `text`.
pub fn find(text: &str, kind: BlockKind, name: &str) -> Result<BlockSpan> {
    Scanner::new(text).find(kind, name)
}

/// Returns the ranges of `text` that are comments or quoted strings.
pub fn masked_ranges(text: &str) -> Vec<Range<usize>> {
    let bytes = text.as_bytes();
    let mut ranges = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                let start = i;
                i += 1;
                while i < bytes.len() && bytes[i] != b'"' {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
                i = (i + 1).min(bytes.len());
                ranges.push(start..i);
            }
            b'#' => {
                let start = i;
                i = line_end(bytes, i);
                ranges.push(start..i);
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                let start = i;
                i = line_end(bytes, i);
                ranges.push(start..i);
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let start = i;
                i = text[i + 2..]
                    .find("*/")
                    .map_or(bytes.len(), |off| i + 2 + off + 2);
                ranges.push(start..i);
            }
            _ => i += 1,
        }
    }

    ranges
}

fn line_end(bytes: &[u8], from: usize) -> usize {
    bytes[from..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |p| from + p)
}

/// Returns true if a keyword starting at `pos` begins a statement.
fn at_statement_boundary(text: &str, pos: usize) -> bool {
    match text[..pos].bytes().next_back() {
        None => true,
        Some(b) => b.is_ascii_whitespace() || matches!(b, b';' | b'{' | b'}' | b'/'),
    }
}

/// Skips the run of whitespace and `;` that follows a closing brace.
pub(crate) fn consume_separators(text: &str, from: usize) -> usize {
    let bytes = text.as_bytes();
    let mut i = from;
    while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b';') {
        i += 1;
    }
    i
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const NESTED: &str = r#"options {
    directory "/var/named";
};

view "internal" {
    match-clients { 10.0.0.0/8; };
    zone "example.com" {
        type master;
        file "internal/example.com.zone";
    };
};

zone "example.org" IN {
    type master;
    file "example.org.zone";
};
"#;

    #[test]
    fn test_find_nested_view_closes_at_view_brace() {
        let span = find(NESTED, BlockKind::View, "internal").unwrap();
        assert!(span.region(NESTED).starts_with("view \"internal\""));
        let body = span.body(NESTED);
        assert!(body.contains("zone \"example.com\""));
        assert!(body.trim_end().ends_with("};"));
        assert_eq!(&NESTED[span.close_brace..span.close_brace + 2], "};");
    }

    #[test]
    fn test_find_zone_inside_view() {
        let span = find(NESTED, BlockKind::Zone, "example.com").unwrap();
        assert!(span.body(NESTED).contains("internal/example.com.zone"));
        // trailing `;` and whitespace are part of the span
        assert_eq!(NESTED[span.end..].chars().next(), Some('}'));
    }

    #[test]
    fn test_find_with_class_between_name_and_brace() {
        let span = find(NESTED, BlockKind::Zone, "example.org").unwrap();
        assert!(span.body(NESTED).contains("example.org.zone"));
        assert_eq!(span.end, NESTED.len());
    }

    #[test]
    fn test_keyword_is_case_insensitive_but_name_is_exact() {
        let text = "ZONE \"Example.com\" { type master; };\n";
        assert!(find(text, BlockKind::Zone, "Example.com").is_ok());
        assert!(find(text, BlockKind::Zone, "example.com").unwrap_err().is_not_found());
    }

    #[test]
    fn test_name_prefix_does_not_match() {
        let text = "zone \"example.com.au\" { type master; };\n";
        assert!(find(text, BlockKind::Zone, "example.com").unwrap_err().is_not_found());
    }

    #[test]
    fn test_unquoted_name() {
        let text = "zone example.net { type slave; };\n";
        let span = find(text, BlockKind::Zone, "example.net").unwrap();
        assert_eq!(span.name, "example.net");
    }

    #[test]
    fn test_missing_close_is_malformed() {
        let text = "view \"a\" {\n    zone \"b\" { type master; };\n";
        let err = find(text, BlockKind::View, "a").unwrap_err();
        assert!(matches!(err, ConfError::Malformed { .. }));
    }

    #[test]
    fn test_header_without_body_is_a_reference() {
        let text = "zone \"a\";\nzone \"b\" { };\n";
        assert!(find(text, BlockKind::Zone, "a").unwrap_err().is_not_found());
        assert_eq!(find(text, BlockKind::Zone, "b").unwrap().name, "b");
    }

    #[test]
    fn test_zone_references_in_options_are_skipped() {
        let text = r#"options {
    directory "/var/named";
    response-policy { zone "rpz.local"; zone "rpz.extra" policy given; };
    catalog-zones { zone "catalog.example" default-masters { 10.0.0.1; } in-memory no; };
};

zone "example.com" {
    type master;
    file "example.com.zone";
};
"#;
        let scanner = Scanner::new(text);
        let zones = scanner.blocks(BlockKind::Zone).unwrap();
        let names: Vec<_> = zones.iter().map(|z| z.name.as_str()).collect();
        assert_eq!(names, vec!["example.com"]);
        assert!(scanner.find(BlockKind::Zone, "rpz.local").unwrap_err().is_not_found());
        assert!(scanner.find(BlockKind::Zone, "catalog.example").unwrap_err().is_not_found());
    }

    #[test]
    fn test_comments_and_strings_are_ignored() {
        let text = r#"// zone "ghost" { type master; };
# zone "ghost" {
/* zone "ghost" { */
zone "real" {
    file "weird}{name.zone"; // a } in a comment
};
"#;
        assert!(find(text, BlockKind::Zone, "ghost").unwrap_err().is_not_found());
        let span = find(text, BlockKind::Zone, "real").unwrap();
        assert!(span.body(text).contains("weird}{name.zone"));
        assert_eq!(span.end, text.len());
    }

    #[test]
    fn test_blocks_skips_nested() {
        let scanner = Scanner::new(NESTED);
        let views = scanner.blocks(BlockKind::View).unwrap();
        assert_eq!(views.len(), 1);

        let zones = scanner.blocks(BlockKind::Zone).unwrap();
        let names: Vec<_> = zones.iter().map(|z| z.name.as_str()).collect();
        assert_eq!(names, vec!["example.com", "example.org"]);
    }

    #[test]
    fn test_blocks_in_view_body() {
        let scanner = Scanner::new(NESTED);
        let view = scanner.find(BlockKind::View, "internal").unwrap();
        let zones = scanner
            .blocks_in(view.open_brace + 1..view.close_brace, BlockKind::Zone)
            .unwrap();
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].name, "example.com");
    }

    #[test]
    fn test_statement_end() {
        let text = "zone \"a\" { };   \nzone \"b\" { };\n";
        let span = find(text, BlockKind::Zone, "a").unwrap();
        assert_eq!(&text[span.start..span.statement_end(text)], "zone \"a\" { };");
    }

    #[test]
    fn test_block_kind_parse() {
        assert_eq!("VIEW".parse::<BlockKind>().unwrap(), BlockKind::View);
        assert_eq!(BlockKind::Acl.to_string(), "acl");
        assert!("options".parse::<BlockKind>().is_err());
    }
}

//! Text surgery on matched blocks.
//!
//! Every function here is pure: it takes the current text and a span produced
//! from that exact text and returns a new string. Spans must be recomputed
//! after each edit.
//!
//! Documents written with CRLF line endings keep them: inserted text is
//! converted to the document's line ending.

use crate::block::BlockSpan;

const INDENT: &str = "    ";

/// Removes a block from the document.
///
/// The block's own line indentation goes with it, runs of three or more
/// newlines collapse to two, and the result is trimmed to a single trailing
/// newline.
pub fn remove(text: &str, span: &BlockSpan) -> String {
    let start = extend_to_line_start(text, span.start);
    let end = keep_following_indent(text, span.close_brace + 1, span.end);

    let mut out = String::with_capacity(text.len());
    out.push_str(&text[..start]);
    out.push_str(&text[end..]);
    normalize_blank_lines(&out)
}

/// Inserts `block` on its own line just before the container's closing brace.
pub fn insert_into(text: &str, container: &BlockSpan, block: &str) -> String {
    let child_indent = child_indent(text, container);
    let indented = indent_block(block, &child_indent);

    let close = container.close_brace;
    let close_line = line_start(text, close);
    let mut out = String::with_capacity(text.len() + indented.len() + 2);

    if text[close_line..close].trim().is_empty() {
        out.push_str(&text[..close_line]);
        out.push_str(&indented);
        out.push('\n');
        out.push_str(&text[close_line..]);
    } else {
        // closing brace shares a line with other content
        let base = leading_whitespace(text, container.start);
        out.push_str(text[..close].trim_end_matches([' ', '\t']));
        out.push('\n');
        out.push_str(&indented);
        out.push('\n');
        out.push_str(base);
        out.push_str(&text[close..]);
    }
    with_line_endings_of(text, out)
}

/// Appends `block` at the end of the document, separated by a blank line.
pub fn insert_top_level(text: &str, block: &str) -> String {
    let trimmed = text.trim_end();
    let mut out = String::with_capacity(trimmed.len() + block.len() + 3);
    out.push_str(trimmed);
    if !trimmed.is_empty() {
        out.push_str("\n\n");
    }
    out.push_str(block.trim_end());
    out.push('\n');
    with_line_endings_of(text, out)
}

/// Replaces the interior of a block, keeping its header and footer.
pub fn replace_body(text: &str, span: &BlockSpan, body: &str) -> String {
    let mut out = String::with_capacity(text.len() + body.len());
    out.push_str(&text[..=span.open_brace]);
    out.push_str(body);
    out.push_str(&text[span.close_brace..]);
    with_line_endings_of(text, out)
}

/// Replaces a whole block statement with `block`, keeping surrounding text.
///
/// Continuation lines of `block` are indented to match the original header.
pub fn replace(text: &str, span: &BlockSpan, block: &str) -> String {
    let base = leading_whitespace(text, span.start);
    let stmt_end = span.statement_end(text);

    let mut lines = block.trim().lines();
    let mut rendered = String::new();
    if let Some(first) = lines.next() {
        rendered.push_str(first);
    }
    for line in lines {
        rendered.push('\n');
        if !line.trim().is_empty() {
            rendered.push_str(base);
        }
        rendered.push_str(line);
    }

    let mut out = String::with_capacity(text.len() + rendered.len());
    out.push_str(&text[..span.start]);
    out.push_str(&rendered);
    out.push_str(&text[stmt_end..]);
    with_line_endings_of(text, out)
}

/// Collapses runs of blank lines to one and trims blank lines at both ends.
///
/// Whitespace-only lines count as blank. The result ends with exactly one
/// line ending, or is empty. CRLF documents stay CRLF.
pub fn normalize_blank_lines(text: &str) -> String {
    let newline = line_ending(text);
    let mut out = String::with_capacity(text.len());
    let mut pending_blank = false;

    for line in text.lines() {
        if line.trim().is_empty() {
            pending_blank = !out.is_empty();
            continue;
        }
        if pending_blank {
            out.push_str(newline);
            pending_blank = false;
        }
        out.push_str(line);
        out.push_str(newline);
    }

    out
}

/// Returns the line ending a document is written with.
pub fn line_ending(text: &str) -> &'static str {
    if text.contains("\r\n") { "\r\n" } else { "\n" }
}

/// Rewrites the line endings of `out` to match `original`.
fn with_line_endings_of(original: &str, out: String) -> String {
    if line_ending(original) == "\n" {
        return out;
    }
    out.replace("\r\n", "\n").replace('\n', "\r\n")
}

/// Prefixes every non-empty line of `block` with `indent`.
pub fn indent_block(block: &str, indent: &str) -> String {
    block
        .trim_end()
        .lines()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                format!("{indent}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// Helpers
// ============================================================================

fn line_start(text: &str, pos: usize) -> usize {
    text[..pos].rfind('\n').map_or(0, |p| p + 1)
}

fn leading_whitespace(text: &str, pos: usize) -> &str {
    let start = line_start(text, pos);
    let line = &text[start..];
    let len = line.len() - line.trim_start_matches([' ', '\t']).len();
    &text[start..(start + len).min(pos)]
}

/// Moves `pos` back to the start of its line if only indentation precedes it.
fn extend_to_line_start(text: &str, pos: usize) -> usize {
    let start = line_start(text, pos);
    if text[start..pos].trim().is_empty() {
        start
    } else {
        pos
    }
}

/// Shrinks `[close, end)` so the indentation of the following line survives.
fn keep_following_indent(text: &str, close: usize, end: usize) -> usize {
    match text[close..end].rfind('\n') {
        Some(p) => close + p + 1,
        None => end,
    }
}

/// Works out the indentation for a new child of `container`.
///
/// Reuses the indentation of the last non-blank line inside the body when
/// there is one, otherwise nests one level deeper than the header.
fn child_indent(text: &str, container: &BlockSpan) -> String {
    let body = &text[container.open_brace + 1..container.close_brace];
    let close_line = line_start(text, container.close_brace);

    let last_content_line = body
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .filter(|_| body.contains('\n'));

    match last_content_line {
        Some(line) if container.open_brace < close_line => {
            let ws = line.len() - line.trim_start_matches([' ', '\t']).len();
            let indent = &line[..ws];
            let header_indent = leading_whitespace(text, container.start);
            if indent.len() > header_indent.len() {
                indent.to_string()
            } else {
                format!("{header_indent}{INDENT}")
            }
        }
        _ => format!("{}{INDENT}", leading_whitespace(text, container.start)),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{BlockKind, find};

    const DOC: &str = r#"acl "trusted" {
    10.0.0.0/8;
};

view "internal" {
    match-clients { trusted; };
    zone "a.example" {
        type master;
        file "a.example.zone";
    };
    zone "b.example" {
        type master;
        file "b.example.zone";
    };
};



zone "c.example" {
    type master;
    file "c.example.zone";
};
"#;

    #[test]
    fn test_remove_then_find_is_not_found() {
        for name in ["a.example", "b.example", "c.example"] {
            let span = find(DOC, BlockKind::Zone, name).unwrap();
            let out = remove(DOC, &span);
            assert!(find(&out, BlockKind::Zone, name).unwrap_err().is_not_found());
            // nothing else disappeared
            assert!(find(&out, BlockKind::View, "internal").is_ok());
            assert!(find(&out, BlockKind::Acl, "trusted").is_ok());
        }
    }

    #[test]
    fn test_remove_last_nested_zone_keeps_view_close_indent() {
        let span = find(DOC, BlockKind::Zone, "b.example").unwrap();
        let out = remove(DOC, &span);
        assert!(out.contains("        file \"a.example.zone\";\n    };\n};\n"));
    }

    #[test]
    fn test_remove_normalizes_whitespace() {
        let span = find(DOC, BlockKind::View, "internal").unwrap();
        let out = remove(DOC, &span);
        assert!(!out.contains("\n\n\n"));
        assert!(out.ends_with("};\n"));
        assert!(!out.ends_with("\n\n"));
        assert_eq!(out, "acl \"trusted\" {\n    10.0.0.0/8;\n};\n\nzone \"c.example\" {\n    type master;\n    file \"c.example.zone\";\n};\n");
    }

    #[test]
    fn test_repeated_removal_does_not_accumulate_blank_lines() {
        let mut text = DOC.to_string();
        for name in ["a.example", "c.example", "b.example"] {
            let span = find(&text, BlockKind::Zone, name).unwrap();
            text = remove(&text, &span);
        }
        assert!(!text.contains("\n\n\n"));
        assert!(!text.starts_with('\n'));
    }

    #[test]
    fn test_insert_into_single_line_block() {
        let view = find(DOC, BlockKind::View, "internal").unwrap();
        let block = r#"zone "d.example" { type master; file "d.zone"; };"#;
        let out = insert_into(DOC, &view, block);

        let zone = find(&out, BlockKind::Zone, "d.example").unwrap();
        assert_eq!(zone.body(&out), r#" type master; file "d.zone"; "#);
        assert!(out.contains("    zone \"d.example\""));

        // still nested inside the view
        let view = find(&out, BlockKind::View, "internal").unwrap();
        assert!(view.start < zone.start && zone.end <= view.close_brace + 1);
    }

    #[test]
    fn test_insert_into_multi_line_block() {
        let view = find(DOC, BlockKind::View, "internal").unwrap();
        let block = "zone \"e.example\" {\n    type slave;\n};";
        let out = insert_into(DOC, &view, block);

        let zone = find(&out, BlockKind::Zone, "e.example").unwrap();
        let interior = |s: &str| -> Vec<String> {
            s.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect()
        };
        assert_eq!(interior(zone.body(&out)), interior("\n    type slave;\n"));
        assert!(out.contains("    zone \"e.example\" {\n        type slave;\n    };\n};\n"));
    }

    #[test]
    fn test_insert_into_empty_inline_container() {
        let text = "view \"guest\" { };\n";
        let view = find(text, BlockKind::View, "guest").unwrap();
        let out = insert_into(text, &view, "zone \"x\" { type master; };");
        assert_eq!(out, "view \"guest\" {\n    zone \"x\" { type master; };\n};\n");
    }

    #[test]
    fn test_insert_top_level() {
        let out = insert_top_level("zone \"a\" { };\n\n\n", "zone \"b\" { };");
        assert_eq!(out, "zone \"a\" { };\n\nzone \"b\" { };\n");
        assert_eq!(insert_top_level("", "acl \"x\" { };"), "acl \"x\" { };\n");
    }

    #[test]
    fn test_replace_body() {
        let span = find(DOC, BlockKind::Acl, "trusted").unwrap();
        let out = replace_body(DOC, &span, "\n    192.168.0.0/16;\n");
        let span = find(&out, BlockKind::Acl, "trusted").unwrap();
        assert_eq!(span.body(&out), "\n    192.168.0.0/16;\n");
        assert!(out.contains("view \"internal\""));
    }

    #[test]
    fn test_replace_whole_block_keeps_indentation() {
        let span = find(DOC, BlockKind::Zone, "a.example").unwrap();
        let out = replace(
            DOC,
            &span,
            "zone \"a.example\" {\n    type slave;\n    masters { 192.0.2.1; };\n};",
        );
        assert!(out.contains("    zone \"a.example\" {\n        type slave;\n        masters { 192.0.2.1; };\n    };\n    zone \"b.example\""));
    }

    #[test]
    fn test_crlf_documents_keep_crlf() {
        let text = "options {\r\n    directory \"/var/named\";\r\n};\r\n\r\nzone \"a\" {\r\n    type master;\r\n};\r\n\r\nzone \"b\" {\r\n    type master;\r\n};\r\n";

        let span = find(text, BlockKind::Zone, "a").unwrap();
        let removed = remove(text, &span);
        assert_eq!(
            removed,
            "options {\r\n    directory \"/var/named\";\r\n};\r\n\r\nzone \"b\" {\r\n    type master;\r\n};\r\n"
        );

        let added = insert_top_level(&removed, "zone \"c\" {\n    type master;\n};");
        assert!(added.ends_with("};\r\n\r\nzone \"c\" {\r\n    type master;\r\n};\r\n"));
        assert!(!added.replace("\r\n", "").contains('\n'));

        let span = find(&added, BlockKind::Zone, "b").unwrap();
        let nested = insert_into(&added, &span, "also-notify { 10.0.0.2; };");
        assert!(nested.contains("    also-notify { 10.0.0.2; };\r\n};"));
        assert!(!nested.replace("\r\n", "").contains('\n'));
    }

    #[test]
    fn test_normalize_blank_lines() {
        assert_eq!(normalize_blank_lines("\n\na\n\n\n\nb\n   \n\n"), "a\n\nb\n");
        assert_eq!(normalize_blank_lines("\n \n"), "");
    }
}

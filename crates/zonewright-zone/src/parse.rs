//! Zone master file record parsing and formatting.
//!
//! The parser is deliberately forgiving: it reads the record lines it
//! understands and steps over everything else (directives, the SOA, lines
//! without a class). It never rejects a file, because the authoritative
//! check is the name server's own zone checker.

use std::ops::Range;

use tracing::debug;

use crate::record::{RecordType, ResourceRecord};

/// A parsed record and the lines it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneEntry {
    /// The record, with an inherited owner filled in.
    pub record: ResourceRecord,
    /// Zero-based line indices, end exclusive.
    pub lines: Range<usize>,
    /// Whether the owner was written on the line or inherited.
    pub explicit_owner: bool,
}

/// Parses the resource records of a zone file.
pub fn parse(text: &str) -> Vec<ResourceRecord> {
    parse_entries(text).into_iter().map(|e| e.record).collect()
}

/// Parses records along with their line ranges.
pub fn parse_entries(text: &str) -> Vec<ZoneEntry> {
    let lines: Vec<&str> = text.lines().collect();
    let mut entries = Vec::new();
    let mut last_owner: Option<String> = None;
    let mut i = 0;

    while i < lines.len() {
        let start = i;
        let first = lines[i];
        let mut logical = strip_comment(first).to_string();
        let mut depth = paren_depth(&logical);
        i += 1;

        // Multi-line records
        while depth > 0 && i < lines.len() {
            let more = strip_comment(lines[i]);
            depth += paren_depth(more);
            logical.push(' ');
            logical.push_str(more);
            i += 1;
        }

        let logical = strip_parens(&logical);
        let trimmed = logical.trim();
        if trimmed.is_empty() || trimmed.starts_with('$') {
            continue;
        }

        let indented = first.starts_with([' ', '\t']);
        match parse_record(trimmed, indented, last_owner.as_deref()) {
            Some(Parsed::Record(record, explicit_owner)) => {
                last_owner = Some(record.name.clone());
                entries.push(ZoneEntry {
                    record,
                    lines: start..i,
                    explicit_owner,
                });
            }
            Some(Parsed::Soa(owner)) => last_owner = Some(owner),
            None => debug!(line = start + 1, "skipping unrecognized zone file line"),
        }
    }

    entries
}

enum Parsed {
    Record(ResourceRecord, bool),
    Soa(String),
}

fn parse_record(line: &str, indented: bool, last_owner: Option<&str>) -> Option<Parsed> {
    let tokens = tokenize(line);
    let class = tokens.iter().position(|t| t.eq_ignore_ascii_case("IN"))?;
    let fallback_owner = || last_owner.unwrap_or("@").to_string();

    // A lone number before the class is a TTL only on an indented line;
    // at column zero it is an owner such as a reverse-zone host.
    let (name, ttl, explicit) = match &tokens[..class] {
        [] => (fallback_owner(), None, false),
        [single] if indented => match parse_ttl(single) {
            Some(ttl) => (fallback_owner(), Some(ttl), false),
            None => (single.to_string(), None, true),
        },
        [single] => (single.to_string(), None, true),
        [owner, ttl] => (owner.to_string(), Some(parse_ttl(ttl)?), true),
        _ => return None,
    };

    let rtype: RecordType = tokens.get(class + 1)?.parse().ok()?;
    if rtype == RecordType::SOA {
        return Some(Parsed::Soa(name));
    }
    let data = &tokens[class + 2..];
    if data.is_empty() {
        return None;
    }

    let mut record = ResourceRecord::new(name, rtype, String::new()).with_ttl(ttl);
    let rest = match record.rtype {
        RecordType::MX => {
            record.priority = Some(data[0].parse().ok()?);
            &data[1..]
        }
        RecordType::SRV if data.len() >= 4 => {
            record.priority = Some(data[0].parse().ok()?);
            record.weight = Some(data[1].parse().ok()?);
            record.port = Some(data[2].parse().ok()?);
            &data[3..]
        }
        RecordType::SRV => return None,
        _ => data,
    };
    if rest.is_empty() {
        return None;
    }
    record.value = rest.join(" ");
    Some(Parsed::Record(record, explicit))
}

/// Formats a record as a single zone file line.
pub fn format(record: &ResourceRecord) -> String {
    let ttl = record.ttl.map(|t| t.to_string()).unwrap_or_default();
    let line = format!(
        "{:<24} {:<8} IN {:<6} {}",
        record.name,
        ttl,
        record.rtype.as_str(),
        record.rdata()
    );
    line.trim_end().to_string()
}

/// Parses a TTL with optional `s`, `m`, `h`, `d` and `w` suffixes.
pub fn parse_ttl(s: &str) -> Option<u32> {
    if !s.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }

    let mut total: u32 = 0;
    let mut current: u32 = 0;
    let mut pending = false;
    for c in s.to_ascii_lowercase().chars() {
        let unit = match c {
            '0'..='9' => {
                current = current.checked_mul(10)?.checked_add(c.to_digit(10)?)?;
                pending = true;
                continue;
            }
            's' => 1,
            'm' => 60,
            'h' => 3_600,
            'd' => 86_400,
            'w' => 604_800,
            _ => return None,
        };
        total = total.checked_add(current.checked_mul(unit)?)?;
        current = 0;
        pending = false;
    }
    if pending {
        total = total.checked_add(current)?;
    }
    Some(total)
}

// ============================================================================
// Lexing helpers
// ============================================================================

/// Drops a `;` comment, ignoring semicolons inside quoted strings.
fn strip_comment(line: &str) -> &str {
    let mut quoted = false;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => quoted = !quoted,
            ';' if !quoted => return &line[..i],
            _ => {}
        }
    }
    line
}

fn paren_depth(line: &str) -> i32 {
    let mut quoted = false;
    let mut depth = 0;
    for c in line.chars() {
        match c {
            '"' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => depth -= 1,
            _ => {}
        }
    }
    depth
}

fn strip_parens(line: &str) -> String {
    let mut quoted = false;
    line.chars()
        .map(|c| match c {
            '"' => {
                quoted = !quoted;
                c
            }
            '(' | ')' if !quoted => ' ',
            _ => c,
        })
        .collect()
}

/// Splits on whitespace, keeping quoted strings as single tokens.
fn tokenize(line: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;
    let mut quoted = false;

    for (i, c) in line.char_indices() {
        if c == '"' {
            quoted = !quoted;
            start.get_or_insert(i);
        } else if c.is_whitespace() && !quoted {
            if let Some(s) = start.take() {
                tokens.push(&line[s..i]);
            }
        } else {
            start.get_or_insert(i);
        }
    }
    if let Some(s) = start {
        tokens.push(&line[s..]);
    }
    tokens
}

//! Record-level edits of zone file text.
//!
//! These functions only touch record lines. Serial maintenance is left to
//! the caller so that a batch of edits can share one increment.

use tracing::warn;

use crate::error::Result;
use crate::parse::{ZoneEntry, format, parse_entries};
use crate::record::{RecordSelector, ResourceRecord};
use crate::serial::bump_serial;

/// Appends a record line.
pub fn add_record(text: &str, record: &ResourceRecord) -> Result<String> {
    record.validate()?;
    let mut out = text.trim_end_matches(['\n', '\r']).to_string();
    if !out.is_empty() {
        out.push('\n');
    }
    out.push_str(&format(record));
    out.push('\n');
    Ok(out)
}

/// Replaces the record picked by `selector`.
pub fn update_record(text: &str, selector: &RecordSelector, record: &ResourceRecord) -> Result<String> {
    record.validate()?;
    let entries = parse_entries(text);
    let target = select(&entries, selector)?;
    Ok(splice(text, &entries, target, Some(format(record))))
}

/// Removes the record picked by `selector`.
pub fn delete_record(text: &str, selector: &RecordSelector) -> Result<String> {
    let entries = parse_entries(text);
    let target = select(&entries, selector)?;
    Ok(splice(text, &entries, target, None))
}

/// Bumps the serial, or logs a warning and keeps the text when there is no
/// tagged serial.
pub fn bump_or_keep(text: String, zone: &str) -> String {
    match bump_serial(&text) {
        Some(bumped) => bumped,
        None => {
            warn!(zone, "no '; Serial' tag found, serial left unchanged");
            text
        }
    }
}

fn select(entries: &[ZoneEntry], selector: &RecordSelector) -> Result<usize> {
    let records: Vec<ResourceRecord> = entries.iter().map(|e| e.record.clone()).collect();
    selector.select(&records)
}

/// Rewrites the lines of entry `target`.
///
/// If the next record inherits its owner from the target's line, it is
/// rewritten with an explicit owner so it keeps its name.
fn splice(text: &str, entries: &[ZoneEntry], target: usize, replacement: Option<String>) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let entry = &entries[target];

    let follower = entries
        .get(target + 1)
        .filter(|next| entry.explicit_owner && !next.explicit_owner);

    let mut out: Vec<String> = Vec::with_capacity(lines.len() + 1);
    let mut i = 0;
    while i < lines.len() {
        if i == entry.lines.start {
            out.extend(replacement.iter().cloned());
            i = entry.lines.end;
        } else if let Some(next) = follower.filter(|n| n.lines.start == i) {
            out.push(format(&next.record));
            i = next.lines.end;
        } else {
            out.push(lines[i].to_string());
            i += 1;
        }
    }

    let mut joined = out.join("\n");
    if text.ends_with('\n') || text.is_empty() {
        joined.push('\n');
    }
    joined
}

//! SOA serial maintenance.

use std::sync::LazyLock;

use regex::Regex;

static SERIAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)(\s*;\s*serial\b)").expect("serial pattern is valid"));

/// Returns the serial tagged with `; Serial`, if any.
pub fn extract_serial(text: &str) -> Option<u64> {
    SERIAL.captures(text)?.get(1)?.as_str().parse().ok()
}

/// Increments the serial tagged with `; Serial` by one.
///
/// The number keeps its original width (leading zeros are preserved).
/// Returns `None` when no tagged serial is present or it cannot be
/// incremented.
pub fn bump_serial(text: &str) -> Option<String> {
    let digits = SERIAL.captures(text)?.get(1)?;
    let next = digits.as_str().parse::<u64>().ok()?.checked_add(1)?;
    let width = digits.len();

    let mut out = String::with_capacity(text.len() + 1);
    out.push_str(&text[..digits.start()]);
    out.push_str(&format!("{next:0width$}"));
    out.push_str(&text[digits.end()..]);
    Some(out)
}

/// Returns the serial a freshly generated zone starts with: `YYYYMMDD01`.
pub fn initial_serial() -> u64 {
    let date = chrono::Local::now().format("%Y%m%d").to_string();
    format!("{date}01").parse().unwrap_or(1)
}

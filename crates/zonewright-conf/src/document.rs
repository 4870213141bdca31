//! Zone and view model over a configuration document.
//!
//! Nothing here caches parsed state: every function takes the current text,
//! scans it, and either describes it or returns a new candidate text. The
//! candidate is meant to be validated and committed by the caller.

use std::collections::HashSet;
use std::fmt;
use std::net::IpAddr;
use std::ops::Range;
use std::path::PathBuf;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::block::{BlockKind, BlockSpan, Scanner, masked_ranges};
use crate::edit;
use crate::error::{ConfError, Result};

// ============================================================================
// Model Types
// ============================================================================

/// Zone type as written in the `type` statement.
///
/// Only master, slave and hint zones are created or converted here; the
/// other types are recognized so documents that declare them can still be
/// listed and edited around.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneType {
    /// Authoritative with a local master file.
    #[default]
    Master,
    /// Authoritative via transfer from a primary.
    Slave,
    /// Root hints.
    Hint,
    /// Transferred, validated copy (usually of the root).
    Mirror,
    /// Transfers only the NS records of a primary.
    Stub,
    /// Stub with locally configured server addresses.
    #[serde(rename = "static-stub")]
    StaticStub,
    /// Forwards queries for the domain.
    Forward,
    /// Answers queries that would otherwise return NXDOMAIN.
    Redirect,
    /// Forces referrals for the zone.
    #[serde(rename = "delegation-only")]
    DelegationOnly,
}

impl ZoneType {
    /// Returns the configuration keyword.
    pub const fn keyword(&self) -> &'static str {
        match self {
            Self::Master => "master",
            Self::Slave => "slave",
            Self::Hint => "hint",
            Self::Mirror => "mirror",
            Self::Stub => "stub",
            Self::StaticStub => "static-stub",
            Self::Forward => "forward",
            Self::Redirect => "redirect",
            Self::DelegationOnly => "delegation-only",
        }
    }

    /// Returns true for the types whose statements can be rendered from a
    /// [`Zone`] without losing options: master, slave and hint.
    pub const fn is_managed(&self) -> bool {
        matches!(self, Self::Master | Self::Slave | Self::Hint)
    }
}

impl fmt::Display for ZoneType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl FromStr for ZoneType {
    type Err = ConfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "master" | "primary" => Ok(Self::Master),
            "slave" | "secondary" => Ok(Self::Slave),
            "hint" => Ok(Self::Hint),
            "mirror" => Ok(Self::Mirror),
            "stub" => Ok(Self::Stub),
            "static-stub" => Ok(Self::StaticStub),
            "forward" => Ok(Self::Forward),
            "redirect" => Ok(Self::Redirect),
            "delegation-only" => Ok(Self::DelegationOnly),
            other => Err(ConfError::invalid("zone type", format!("unsupported type '{other}'"))),
        }
    }
}

/// A zone statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    /// Fully-qualified name with exactly one trailing dot.
    pub name: String,
    /// Zone type.
    pub zone_type: ZoneType,
    /// Master file path as written in the document.
    pub file: Option<PathBuf>,
    /// Enclosing view, `None` for top-level zones.
    pub view: Option<String>,
    /// Primaries to transfer from (slave zones).
    pub masters: Vec<IpAddr>,
    /// `allow-transfer` entries.
    pub allow_transfer: Vec<String>,
}

impl Zone {
    /// Creates a zone with a normalized name and no optional fields.
    pub fn new(name: &str, zone_type: ZoneType) -> Result<Self> {
        Ok(Self {
            name: normalize_zone_name(name)?,
            zone_type,
            file: None,
            view: None,
            masters: Vec::new(),
            allow_transfer: Vec::new(),
        })
    }

    /// Sets the master file path.
    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Sets the enclosing view.
    pub fn in_view(mut self, view: Option<String>) -> Self {
        self.view = view;
        self
    }

    /// Sets the primaries list.
    pub fn with_masters(mut self, masters: Vec<IpAddr>) -> Self {
        self.masters = masters;
        self
    }

    /// Returns the name as it is written in the configuration (no trailing
    /// dot, except for the root zone).
    pub fn config_name(&self) -> &str {
        config_name(&self.name)
    }

    /// Returns true for `in-addr.arpa.` and `ip6.arpa.` zones.
    pub fn is_reverse(&self) -> bool {
        is_reverse_name(&self.name)
    }

    /// Checks the invariants a zone must satisfy before it is rendered.
    pub fn validate(&self) -> Result<()> {
        match self.zone_type {
            ZoneType::Master | ZoneType::Hint if self.file.is_none() => Err(ConfError::invalid(
                "file",
                format!("{} zone {} requires a file", self.zone_type, self.name),
            )),
            ZoneType::Slave if self.masters.is_empty() => Err(ConfError::invalid(
                "masters",
                format!("slave zone {} requires at least one master", self.name),
            )),
            _ => Ok(()),
        }
    }
}

/// Client match list of a view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControl {
    /// Allowed matchers, in order.
    pub allow: Vec<String>,
    /// Negated matchers (written with a leading `!`), in order.
    pub deny: Vec<String>,
}

impl AccessControl {
    /// Builds a match list from raw tokens; `!`-prefixed tokens are denies.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut acl = Self::default();
        for token in tokens {
            let token = token.as_ref().trim().trim_matches('"');
            if token.is_empty() {
                continue;
            }
            match token.strip_prefix('!') {
                Some(denied) => push_unique(&mut acl.deny, denied.trim()),
                None => push_unique(&mut acl.allow, token),
            }
        }
        acl
    }

    /// Parses a `;` or `,` separated list such as `10.0.0.0/8; !10.0.0.1`.
    pub fn parse(list: &str) -> Self {
        Self::from_tokens(list.split([';', ',']))
    }

    /// Returns the match list as written in the document.
    pub fn tokens(&self) -> Vec<String> {
        self.deny
            .iter()
            .map(|d| format!("!{d}"))
            .chain(self.allow.iter().cloned())
            .collect()
    }

    /// Returns true if there are no matchers.
    pub fn is_empty(&self) -> bool {
        self.allow.is_empty() && self.deny.is_empty()
    }
}

fn push_unique(list: &mut Vec<String>, token: &str) {
    if !token.is_empty() && !list.iter().any(|t| t == token) {
        list.push(token.to_string());
    }
}

/// A view statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    /// View name.
    pub name: String,
    /// `match-clients` list.
    pub access: AccessControl,
    /// Normalized names of zones nested in the view.
    pub zones: Vec<String>,
    /// Names of ACLs declared inside the view.
    pub acls: Vec<String>,
}

/// A named address match list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acl {
    /// ACL name.
    pub name: String,
    /// Matchers, in order.
    pub entries: Vec<String>,
}

// ============================================================================
// Names
// ============================================================================

/// Normalizes a zone name: trimmed, lowercased, exactly one trailing dot.
pub fn normalize_zone_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ConfError::invalid("zone name", "name is empty"));
    }
    if trimmed
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '"' | '{' | '}' | ';' | '\\'))
    {
        return Err(ConfError::invalid(
            "zone name",
            format!("'{trimmed}' contains characters not allowed in a zone name"),
        ));
    }

    let bare = trimmed.trim_end_matches('.');
    if bare.is_empty() {
        return Ok(".".to_string());
    }
    if bare.starts_with('.') || bare.contains("..") {
        return Err(ConfError::invalid("zone name", format!("'{trimmed}' has an empty label")));
    }
    Ok(format!("{}.", bare.to_ascii_lowercase()))
}

/// Returns a normalized name as written in the configuration.
pub fn config_name(name: &str) -> &str {
    if name == "." {
        name
    } else {
        name.trim_end_matches('.')
    }
}

/// Returns true for names under `in-addr.arpa.` or `ip6.arpa.`.
pub fn is_reverse_name(name: &str) -> bool {
    let lower = name.trim_end_matches('.').to_ascii_lowercase();
    lower.ends_with("in-addr.arpa") || lower.ends_with("ip6.arpa")
}

/// Checks that a view or ACL name can be written between quotes.
pub fn validate_block_name(kind: BlockKind, name: &str) -> Result<()> {
    if name.is_empty() || name.chars().any(|c| c.is_whitespace() || matches!(c, '"' | '{' | '}' | ';')) {
        return Err(ConfError::invalid(
            format!("{kind} name"),
            format!("'{name}' is not a valid {kind} name"),
        ));
    }
    Ok(())
}

fn same_zone(written: &str, normalized: &str) -> bool {
    normalize_zone_name(written).is_ok_and(|n| n == normalized)
}

// ============================================================================
// Enumeration
// ============================================================================

/// Lists views in document order.
pub fn list_views(text: &str) -> Result<Vec<View>> {
    let scanner = Scanner::new(text);
    scanner
        .blocks(BlockKind::View)?
        .iter()
        .map(|span| parse_view(&scanner, span))
        .collect()
}

/// Lists zones, views first, then top-level zones.
///
/// Zones are deduplicated by normalized name; a zone found inside a view is
/// not reported again at top level.
pub fn list_zones(text: &str) -> Result<Vec<Zone>> {
    let scanner = Scanner::new(text);
    let views = scanner.blocks(BlockKind::View)?;
    let mut seen = HashSet::new();
    let mut zones = Vec::new();

    for view in &views {
        for span in scanner.blocks_in(view.open_brace + 1..view.close_brace, BlockKind::Zone)? {
            let zone = parse_zone(text, &span, Some(view.name.clone()))?;
            if seen.insert(zone.name.clone()) {
                zones.push(zone);
            }
        }
    }

    for span in scanner.blocks(BlockKind::Zone)? {
        if views.iter().any(|v| v.start <= span.start && span.start < v.end) {
            continue;
        }
        let zone = parse_zone(text, &span, None)?;
        if seen.insert(zone.name.clone()) {
            zones.push(zone);
        } else {
            debug!(zone = %zone.name, "duplicate top-level zone statement ignored");
        }
    }

    Ok(zones)
}

/// Lists top-level ACLs.
pub fn list_acls(text: &str) -> Result<Vec<Acl>> {
    let scanner = Scanner::new(text);
    let views = scanner.blocks(BlockKind::View)?;
    Ok(scanner
        .blocks(BlockKind::Acl)?
        .into_iter()
        .filter(|span| !views.iter().any(|v| v.start <= span.start && span.start < v.end))
        .map(|span| Acl {
            name: span.name.clone(),
            entries: list_entries(&code_only(span.body(text))),
        })
        .collect())
}

/// Looks up a zone by name.
pub fn find_zone(text: &str, name: &str) -> Result<Option<Zone>> {
    let name = normalize_zone_name(name)?;
    Ok(list_zones(text)?.into_iter().find(|z| z.name == name))
}

/// Looks up a view by name.
pub fn find_view(text: &str, name: &str) -> Result<Option<View>> {
    let scanner = Scanner::new(text);
    match scanner.find(BlockKind::View, name) {
        Ok(span) => parse_view(&scanner, &span).map(Some),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Returns the spans of every zone statement for `name`, anywhere.
pub fn zone_spans(text: &str, name: &str) -> Result<Vec<BlockSpan>> {
    let name = normalize_zone_name(name)?;
    Ok(Scanner::new(text)
        .blocks(BlockKind::Zone)?
        .into_iter()
        .filter(|span| same_zone(&span.name, &name))
        .collect())
}

fn parse_view(scanner: &Scanner<'_>, span: &BlockSpan) -> Result<View> {
    let text = scanner.text();
    let inner = span.open_brace + 1..span.close_brace;
    let zones = scanner
        .blocks_in(inner.clone(), BlockKind::Zone)?
        .into_iter()
        .map(|z| normalize_zone_name(&z.name).unwrap_or(z.name))
        .collect();
    let acls = scanner
        .blocks_in(inner, BlockKind::Acl)?
        .into_iter()
        .map(|a| a.name)
        .collect();

    let code = code_only(span.body(text));
    let access = statement_range(&code, "match-clients")
        .map(|r| AccessControl::from_tokens(list_entries(list_interior(&code[r]))))
        .unwrap_or_default();

    Ok(View {
        name: span.name.clone(),
        access,
        zones,
        acls,
    })
}

fn parse_zone(text: &str, span: &BlockSpan, view: Option<String>) -> Result<Zone> {
    let code = code_only(span.body(text));
    let name = normalize_zone_name(&span.name)?;

    let zone_type = match statement_word(&code, "type") {
        Some(word) => word.parse()?,
        None => ZoneType::Master,
    };

    let file = statement_quoted(&code, "file").map(PathBuf::from);

    let masters = ["masters", "primaries"]
        .iter()
        .find_map(|kw| statement_range(&code, kw))
        .map(|r| {
            list_entries(list_interior(&code[r]))
                .iter()
                .filter_map(|entry| entry.split_whitespace().next()?.parse::<IpAddr>().ok())
                .collect()
        })
        .unwrap_or_default();

    let allow_transfer = statement_range(&code, "allow-transfer")
        .map(|r| list_entries(list_interior(&code[r])))
        .unwrap_or_default();

    Ok(Zone {
        name,
        zone_type,
        file,
        view,
        masters,
        allow_transfer,
    })
}

// ============================================================================
// Statement Helpers
// ============================================================================

/// Blanks out comments, keeping offsets and quoted strings intact.
fn code_only(text: &str) -> String {
    let mut out = text.to_string();
    for range in masked_ranges(text) {
        if text.as_bytes()[range.start] != b'"' {
            out.replace_range(range.clone(), &" ".repeat(range.len()));
        }
    }
    out
}

fn keyword_regex(keyword: &str, tail: &str) -> Option<Regex> {
    Regex::new(&format!(r"(?i)(?:^|[\s;{{}}])({}){tail}", regex::escape(keyword))).ok()
}

/// Returns the bare word in `keyword <word>;`.
fn statement_word(code: &str, keyword: &str) -> Option<String> {
    let re = keyword_regex(keyword, r"\s+([A-Za-z-]+)\s*;")?;
    re.captures(code).map(|c| c[2].to_string())
}

/// Returns the quoted value in `keyword "<value>";`.
fn statement_quoted(code: &str, keyword: &str) -> Option<String> {
    let re = keyword_regex(keyword, r#"\s+"([^"]*)""#)?;
    re.captures(code).map(|c| c[2].to_string())
}

/// Returns the range of a `keyword [...] { ... };` statement.
fn statement_range(code: &str, keyword: &str) -> Option<Range<usize>> {
    let re = keyword_regex(keyword, r"[^;{}]*\{")?;
    let caps = re.captures(code)?;
    let start = caps.get(1)?.start();
    let open = caps.get(0)?.end() - 1;

    let bytes = code.as_bytes();
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            _ => {}
        }
        i += 1;
    }
    if i >= bytes.len() {
        return None;
    }

    let mut end = i + 1;
    let rest = &code[end..];
    let trimmed = rest.trim_start_matches([' ', '\t']);
    if trimmed.starts_with(';') {
        end += rest.len() - trimmed.len() + 1;
    }
    Some(start..end)
}

/// Returns the text between the first `{` and the last `}` of a statement.
fn list_interior(statement: &str) -> &str {
    match (statement.find('{'), statement.rfind('}')) {
        (Some(open), Some(close)) if open < close => &statement[open + 1..close],
        _ => "",
    }
}

/// Splits a `a; b; c;` list into trimmed, unquoted entries.
fn list_entries(interior: &str) -> Vec<String> {
    interior
        .split(';')
        .map(|e| e.trim().trim_matches('"').trim())
        .filter(|e| !e.is_empty())
        .map(String::from)
        .collect()
}

// ============================================================================
// Rendering
// ============================================================================

/// Renders a zone statement.
pub fn zone_block(zone: &Zone) -> String {
    let mut out = format!("zone \"{}\" {{\n", zone.config_name());
    out.push_str(&format!("    type {};\n", zone.zone_type));
    if zone.zone_type == ZoneType::Slave && !zone.masters.is_empty() {
        out.push_str(&format!("    masters {{ {} }};\n", join_list(zone.masters.iter())));
    }
    if let Some(file) = &zone.file {
        out.push_str(&format!("    file \"{}\";\n", file.display()));
    }
    if !zone.allow_transfer.is_empty() {
        out.push_str(&format!(
            "    allow-transfer {{ {} }};\n",
            join_list(zone.allow_transfer.iter())
        ));
    }
    out.push_str("};");
    out
}

/// Renders a view statement with no zones.
pub fn view_block(name: &str, access: &AccessControl) -> String {
    format!("view \"{name}\" {{\n    {}\n}};", match_clients(access))
}

/// Renders an ACL statement.
pub fn acl_block(name: &str, entries: &[String]) -> String {
    let mut out = format!("acl \"{name}\" {{\n");
    for entry in entries {
        out.push_str(&format!("    {entry};\n"));
    }
    out.push_str("};");
    out
}

fn match_clients(access: &AccessControl) -> String {
    let tokens = access.tokens();
    if tokens.is_empty() {
        "match-clients { any; };".to_string()
    } else {
        format!("match-clients {{ {} }};", join_list(tokens.iter()))
    }
}

fn join_list<T: fmt::Display>(items: impl Iterator<Item = T>) -> String {
    items.map(|i| format!("{i};")).collect::<Vec<_>>().join(" ")
}

// ============================================================================
// Candidate Builders
// ============================================================================

/// Adds a new zone statement, into its view or at top level.
///
/// A missing view is created with `view_access` when given; otherwise the
/// call fails with `NotFound`. Fails with `Duplicate` if the zone exists
/// anywhere in the document.
pub fn add_zone(text: &str, zone: &Zone, view_access: Option<&AccessControl>) -> Result<String> {
    zone.validate()?;
    if !zone_spans(text, &zone.name)?.is_empty() {
        return Err(ConfError::Duplicate {
            kind: BlockKind::Zone,
            name: zone.name.clone(),
        });
    }
    insert_zone(text, zone, view_access)
}

/// Removes every statement for zone `name`.
pub fn remove_zone(text: &str, name: &str) -> Result<String> {
    let mut out = text.to_string();
    let mut removed = 0;
    while let Some(span) = zone_spans(&out, name)?.into_iter().next() {
        out = edit::remove(&out, &span);
        removed += 1;
    }
    if removed == 0 {
        return Err(ConfError::not_found(BlockKind::Zone, name));
    }
    debug!(zone = name, removed, "removed zone statements");
    Ok(out)
}

/// Rewrites an existing zone statement in place, keeping its container.
pub fn replace_zone(text: &str, zone: &Zone) -> Result<String> {
    zone.validate()?;
    let span = zone_spans(text, &zone.name)?
        .into_iter()
        .next()
        .ok_or_else(|| ConfError::not_found(BlockKind::Zone, &zone.name))?;
    Ok(edit::replace(text, &span, &zone_block(zone)))
}

/// Moves a zone into `target_view` (or top level when `None`).
///
/// The zone keeps its current type and transfer settings (a master zone is
/// assumed when it does not exist yet). Every existing statement for the
/// zone is removed before the new one is inserted, so calling this twice
/// with the same arguments leaves exactly one statement. A missing target
/// view is created with `target_acl`.
pub fn move_zone_to_container(
    text: &str,
    zone_name: &str,
    zone_file: impl Into<PathBuf>,
    target_view: Option<&str>,
    target_acl: &AccessControl,
) -> Result<String> {
    let name = normalize_zone_name(zone_name)?;
    let existing = find_zone(text, &name)?;

    let mut zone = match existing {
        Some(z) => z,
        None => Zone::new(&name, ZoneType::Master)?,
    };
    zone.file = Some(zone_file.into());
    zone.view = target_view.map(String::from);

    let mut out = text.to_string();
    while let Some(span) = zone_spans(&out, &name)?.into_iter().next() {
        out = edit::remove(&out, &span);
    }

    insert_zone(&out, &zone, Some(target_acl))
}

fn insert_zone(text: &str, zone: &Zone, view_access: Option<&AccessControl>) -> Result<String> {
    let block = zone_block(zone);
    let Some(view) = zone.view.as_deref() else {
        return Ok(edit::insert_top_level(text, &block));
    };

    validate_block_name(BlockKind::View, view)?;
    let mut out = text.to_string();
    let span = match Scanner::new(&out).find(BlockKind::View, view) {
        Ok(span) => span,
        Err(e) if e.is_not_found() => {
            let access = view_access.ok_or_else(|| ConfError::not_found(BlockKind::View, view))?;
            debug!(view, "creating missing view");
            out = edit::insert_top_level(&out, &view_block(view, access));
            Scanner::new(&out).find(BlockKind::View, view)?
        }
        Err(e) => return Err(e),
    };

    Ok(edit::insert_into(&out, &span, &block))
}

/// Appends a new, empty view.
pub fn add_view(text: &str, name: &str, access: &AccessControl) -> Result<String> {
    validate_block_name(BlockKind::View, name)?;
    match Scanner::new(text).find(BlockKind::View, name) {
        Ok(_) => Err(ConfError::Duplicate {
            kind: BlockKind::View,
            name: name.to_string(),
        }),
        Err(e) if e.is_not_found() => Ok(edit::insert_top_level(text, &view_block(name, access))),
        Err(e) => Err(e),
    }
}

/// Removes a view and everything nested in it.
pub fn remove_view(text: &str, name: &str) -> Result<String> {
    let span = Scanner::new(text).find(BlockKind::View, name)?;
    Ok(edit::remove(text, &span))
}

/// Rewrites a view's `match-clients` statement, leaving nested zones alone.
pub fn set_view_access(text: &str, name: &str, access: &AccessControl) -> Result<String> {
    let span = Scanner::new(text).find(BlockKind::View, name)?;
    let body = span.body(text);
    let code = code_only(body);
    let statement = match_clients(access);

    let new_body = match statement_range(&code, "match-clients") {
        Some(range) => format!("{}{statement}{}", &body[..range.start], &body[range.end..]),
        None => {
            let indent = format!("{}    ", header_indent(text, span.start));
            format!("\n{indent}{statement}{body}")
        }
    };

    Ok(edit::replace_body(text, &span, &new_body))
}

fn header_indent(text: &str, pos: usize) -> &str {
    let start = text[..pos].rfind('\n').map_or(0, |p| p + 1);
    let line = &text[start..pos];
    &line[..line.len() - line.trim_start().len()]
}

// ============================================================================
// Tests
// ============================================================================

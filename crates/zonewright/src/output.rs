//! Terminal and JSON output.

use std::time::Duration;

use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use zonewright_conf::{View, Zone};
use zonewright_ops::ZoneStatus;
use zonewright_zone::{ResourceRecord, format};

// ============================================================================
// Plumbing
// ============================================================================

/// How results are written.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    /// Print JSON instead of styled text.
    pub json: bool,
    /// Suppress confirmations and spinners.
    pub quiet: bool,
}

impl Output {
    /// Prints `value` as JSON, or hands it to `human`.
    pub fn emit<T: Serialize>(&self, value: &T, human: impl FnOnce(&T)) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            human(value);
        }
        Ok(())
    }

    /// Prints a confirmation line unless quiet.
    pub fn done(&self, message: impl std::fmt::Display) {
        if !self.quiet {
            println!("{} {}", style("✓").green(), message);
        }
    }

    /// Starts a spinner for a step that runs external commands.
    pub fn spinner(&self, message: &str) -> Option<ProgressBar> {
        if self.quiet || self.json || !console::user_attended_stderr() {
            return None;
        }
        let pb = ProgressBar::new_spinner();
        if let Ok(spinner) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(spinner);
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    }
}

/// Clears a spinner started by [`Output::spinner`].
pub fn finish(pb: Option<ProgressBar>) {
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
}

/// Prints an error to stderr.
pub fn print_error(err: &anyhow::Error, json: bool) {
    if json {
        let error = serde_json::json!({
            "success": false,
            "error": format!("{err:#}"),
        });
        eprintln!("{error}");
    } else {
        eprintln!("{} {:#}", style("Error:").red().bold(), err);
    }
}

// ============================================================================
// Listings
// ============================================================================

fn container(view: Option<&str>) -> String {
    view.map_or_else(|| "(top level)".to_string(), String::from)
}

pub fn print_zones(zones: &[Zone]) {
    if zones.is_empty() {
        println!("{}", style("No zones").dim());
        return;
    }

    println!("{}", style("Zones").cyan().bold());
    for zone in zones {
        let file = zone
            .file
            .as_ref()
            .map(|f| f.display().to_string())
            .unwrap_or_default();
        println!(
            "  {:<32} {:<7} {:<16} {}",
            zone.name,
            zone.zone_type,
            container(zone.view.as_deref()),
            style(file).dim()
        );
    }
}

pub fn print_views(views: &[View]) {
    if views.is_empty() {
        println!("{}", style("No views").dim());
        return;
    }

    for view in views {
        println!("{}", style(&view.name).cyan().bold());
        let tokens = view.access.tokens();
        let access = if tokens.is_empty() { "any".to_string() } else { tokens.join("; ") };
        println!("  {}  {}", style("Clients:").dim(), access);
        if view.zones.is_empty() {
            println!("  {}    {}", style("Zones:").dim(), style("none").dim());
        } else {
            println!("  {}    {}", style("Zones:").dim(), view.zones.join(", "));
        }
    }
}

pub fn print_status(status: &[ZoneStatus]) {
    for zone in status {
        let indicator = match (zone.declared, zone.file_exists) {
            (true, true) => style("●").green(),
            (true, false) => style("●").yellow(),
            _ => style("●").red(),
        };
        println!("{} {}", indicator, style(&zone.name).bold());

        if !zone.declared {
            println!("  {}", style("not declared").dim());
            continue;
        }
        println!("  {}     {}", style("View:").dim(), container(zone.view.as_deref()));
        if let Some(zone_type) = zone.zone_type {
            println!("  {}     {}", style("Type:").dim(), zone_type);
        }
        if let Some(file) = &zone.file {
            let missing = if zone.file_exists { "" } else { " (missing)" };
            println!("  {}     {}{}", style("File:").dim(), file.display(), style(missing).yellow());
        }
        if let Some(serial) = zone.serial {
            println!("  {}   {}", style("Serial:").dim(), serial);
        }
        if let Some(records) = zone.records {
            println!("  {}  {}", style("Records:").dim(), records);
        }
    }
}

pub fn print_records(records: &[ResourceRecord]) {
    if records.is_empty() {
        println!("{}", style("No records").dim());
        return;
    }
    for record in records {
        println!("{}", format(record));
    }
}

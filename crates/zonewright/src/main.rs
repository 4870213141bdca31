//! zonewright
//!
//! Manage the views, zones and zone records of a BIND style name server by
//! editing its configuration text in place. Every change is validated by the
//! server's own checkers before it replaces the live file.
//!
//! # Examples
//!
//! ```bash
//! zonewright zone create example.com
//! zonewright zone move corp.example --view guest --access "192.168.0.0/16"
//! zonewright record add example.com www A 192.0.2.10
//! zonewright view delete lab --force
//! ```

use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use console::style;
use zonewright_conf::{AccessControl, ZoneType};
use zonewright_config::Config;
use zonewright_ops::{CreateZone, ZoneOps, zone_file_options};
use zonewright_zone::{RecordSelector, RecordType, ResourceRecord, generate_zone_file};

mod logging;
mod output;

use logging::{LogConfig, init_tracing};
use output::{Output, finish, print_error, print_records, print_status, print_views, print_zones};

// ============================================================================
// CLI Structure
// ============================================================================

/// Manage name-server views, zones and records through validated commits
#[derive(Parser, Debug)]
#[command(name = "zonewright")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(after_help = "EXAMPLES:
    zonewright zone list                          List all zones
    zonewright zone create example.com            Create a top-level master zone
    zonewright zone move corp.example --view lab  Move a zone into another view
    zonewright record add example.com www A 192.0.2.10")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, value_name = "FILE", env = "ZONEWRIGHT_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output as JSON for scripting
    #[arg(long, global = true)]
    json: bool,

    /// Commit changes without asking the server to reload
    #[arg(long, global = true)]
    no_reload: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Zone management
    Zone {
        #[command(subcommand)]
        action: ZoneCommands,
    },

    /// View management
    View {
        #[command(subcommand)]
        action: ViewCommands,
    },

    /// Record editing in master zone files
    Record {
        #[command(subcommand)]
        action: RecordCommands,
    },

    /// Validate the live configuration document
    Check,

    /// Print a generated zone file without writing anything
    Generate {
        /// Zone name
        zone: String,

        /// Add host PTR records (reverse zones only)
        #[arg(long)]
        ptr: bool,
    },

    /// Show version information
    Version {
        /// Show detailed version info
        #[arg(short, long)]
        verbose: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ZoneCommands {
    /// List zones
    List,

    /// Show zone status (all zones when none are named)
    Status {
        /// Zone names
        zones: Vec<String>,
    },

    /// Create a zone and its file
    ///
    /// Examples:
    ///   zonewright zone create example.com
    ///   zonewright zone create 2.0.192.in-addr.arpa --view internal --ptr
    ///   zonewright zone create b.example --type slave --masters 10.0.0.53
    Create {
        /// Zone name
        name: String,

        /// Zone type (master, slave)
        #[arg(short = 't', long = "type", default_value = "master", value_parser = parse_zone_type)]
        zone_type: ZoneType,

        #[command(flatten)]
        target: ViewTarget,

        /// Primaries for a slave zone (comma separated)
        #[arg(long, value_delimiter = ',')]
        masters: Vec<IpAddr>,

        /// Generate host PTR records in a reverse zone
        #[arg(long, conflicts_with = "no_ptr")]
        ptr: bool,

        /// Do not generate host PTR records
        #[arg(long)]
        no_ptr: bool,
    },

    /// Delete a zone and its file (a backup is kept)
    Delete {
        /// Zone name
        name: String,
    },

    /// Move a zone into a view, or to top level
    Move {
        /// Zone name
        name: String,

        #[command(flatten)]
        target: ViewTarget,
    },

    /// Convert a zone between master and slave
    Convert {
        /// Zone name
        name: String,

        /// New type (master, slave)
        #[arg(value_parser = parse_zone_type)]
        to: ZoneType,

        /// Primaries when converting to slave (comma separated)
        #[arg(long, value_delimiter = ',')]
        masters: Vec<IpAddr>,
    },
}

/// Where a zone goes.
#[derive(Args, Debug)]
struct ViewTarget {
    /// Target view; omit for top level
    #[arg(long)]
    view: Option<String>,

    /// match-clients list for the view if it has to be created
    #[arg(long, value_name = "LIST")]
    access: Option<String>,
}

#[derive(Subcommand, Debug)]
enum ViewCommands {
    /// List views and their zones
    List,

    /// Create an empty view
    Create {
        /// View name
        name: String,

        /// match-clients list, e.g. "10.0.0.0/8; !10.0.0.1"
        #[arg(long, value_name = "LIST")]
        access: Option<String>,
    },

    /// Delete a view
    Delete {
        /// View name
        name: String,

        /// Delete even if the view still holds zones
        #[arg(short, long)]
        force: bool,
    },

    /// Replace a view's match-clients list
    Acl {
        /// View name
        name: String,

        /// New match-clients list
        access: String,
    },
}

#[derive(Subcommand, Debug)]
enum RecordCommands {
    /// List records of a master zone
    List {
        /// Zone name
        zone: String,
    },

    /// Add a record
    ///
    /// Examples:
    ///   zonewright record add example.com www A 192.0.2.10
    ///   zonewright record add example.com @ MX mail.example.com. --priority 10
    ///   zonewright record add example.com note TXT '"hello world"'
    Add {
        /// Zone name
        zone: String,

        #[command(flatten)]
        record: RecordArgs,
    },

    /// Replace a record
    Update {
        /// Zone name
        zone: String,

        /// Only replace the record with this value
        #[arg(long = "match", value_name = "VALUE")]
        matching: Option<String>,

        #[command(flatten)]
        record: RecordArgs,
    },

    /// Delete a record
    Delete {
        /// Zone name
        zone: String,

        /// Owner name
        name: String,

        /// Record type
        rtype: RecordType,

        /// Only delete the record with this value
        #[arg(long = "match", value_name = "VALUE")]
        matching: Option<String>,
    },
}

/// A record on the command line.
#[derive(Args, Debug)]
struct RecordArgs {
    /// Owner name (`@` for the apex)
    name: String,

    /// Record type
    rtype: RecordType,

    /// Record data
    #[arg(required = true, num_args = 1.., allow_hyphen_values = true)]
    value: Vec<String>,

    /// Explicit TTL
    #[arg(long)]
    ttl: Option<u32>,

    /// MX preference or SRV priority
    #[arg(long)]
    priority: Option<u16>,

    /// SRV weight
    #[arg(long)]
    weight: Option<u16>,

    /// SRV port
    #[arg(long)]
    port: Option<u16>,
}

impl RecordArgs {
    fn to_record(&self) -> ResourceRecord {
        ResourceRecord {
            priority: self.priority,
            weight: self.weight,
            port: self.port,
            ..ResourceRecord::new(self.name.as_str(), self.rtype.clone(), self.value.join(" ")).with_ttl(self.ttl)
        }
    }
}

fn parse_zone_type(s: &str) -> std::result::Result<ZoneType, String> {
    s.parse::<ZoneType>().map_err(|e| e.to_string())
}

fn access_list(access: Option<&str>) -> AccessControl {
    access.map(AccessControl::parse).unwrap_or_default()
}

// ============================================================================
// Command Handlers
// ============================================================================

async fn handle_zone(ops: &ZoneOps, out: Output, action: ZoneCommands) -> Result<()> {
    match action {
        ZoneCommands::List => out.emit(&ops.list_zones().await?, |z| print_zones(z)),

        ZoneCommands::Status { zones } => out.emit(&ops.zone_status(&zones).await?, |s| print_status(s)),

        ZoneCommands::Create {
            name,
            zone_type,
            target,
            masters,
            ptr,
            no_ptr,
        } => {
            if zone_type == ZoneType::Slave && masters.is_empty() {
                bail!("a slave zone needs at least one --masters address");
            }
            let request = CreateZone {
                name,
                zone_type,
                view: target.view,
                access: target.access.as_deref().map(AccessControl::parse),
                masters,
                auto_generate_ptr: match (ptr, no_ptr) {
                    (true, _) => Some(true),
                    (_, true) => Some(false),
                    _ => None,
                },
            };

            let pb = out.spinner("Creating zone...");
            let created = ops.create_zone(request).await;
            finish(pb);
            let created = created?;

            out.emit(&created, |c| {
                out.done(format_args!("Created zone {} in {}", c.zone.name, location(c.zone.view.as_deref())));
                if !out.quiet {
                    let origin = if c.generated { "generated" } else { "kept existing" };
                    println!("  {}  {} ({})", style("File:").dim(), c.file.display(), origin);
                    if let Some(serial) = c.serial {
                        println!("  {} {}", style("Serial:").dim(), serial);
                    }
                }
            })
        }

        ZoneCommands::Delete { name } => {
            let pb = out.spinner("Deleting zone...");
            let deleted = ops.delete_zone(&name).await;
            finish(pb);
            let deleted = deleted?;

            out.emit(&deleted, |d| {
                out.done(format_args!("Deleted zone {}", d.zone.name));
                if let (Some(backup), false) = (&d.file_backup, out.quiet) {
                    println!("  {} {}", style("Backup:").dim(), backup.display());
                }
            })
        }

        ZoneCommands::Move { name, target } => {
            let access = access_list(target.access.as_deref());
            let pb = out.spinner("Moving zone...");
            let moved = ops.move_zone(&name, target.view.as_deref(), &access).await;
            finish(pb);
            let moved = moved?;

            out.emit(&moved, |m| {
                if m.created_view {
                    out.done(format_args!("Created view {}", location(m.to.as_deref())));
                }
                out.done(format_args!(
                    "Moved {} from {} to {}",
                    m.zone,
                    location(m.from.as_deref()),
                    location(m.to.as_deref())
                ));
            })
        }

        ZoneCommands::Convert { name, to, masters } => {
            if to == ZoneType::Slave && masters.is_empty() {
                bail!("converting to slave needs at least one --masters address");
            }
            let pb = out.spinner("Converting zone...");
            let converted = ops.convert_zone(&name, to, masters).await;
            finish(pb);
            let converted = converted?;

            out.emit(&converted, |c| {
                if c.changed {
                    out.done(format_args!("Converted {} from {} to {}", c.zone.name, c.from, c.zone.zone_type));
                } else {
                    out.done(format_args!("{} is already {}", c.zone.name, c.zone.zone_type));
                }
            })
        }
    }
}

async fn handle_view(ops: &ZoneOps, out: Output, action: ViewCommands) -> Result<()> {
    match action {
        ViewCommands::List => out.emit(&ops.list_views().await?, |v| print_views(v)),

        ViewCommands::Create { name, access } => {
            let changed = ops.create_view(&name, &access_list(access.as_deref())).await?;
            out.emit(&changed, |c| out.done(format_args!("Created view {}", c.view)))
        }

        ViewCommands::Delete { name, force } => {
            let changed = ops.delete_view(&name, force).await?;
            out.emit(&changed, |c| {
                out.done(format_args!("Deleted view {}", c.view));
                if !c.dropped_zones.is_empty() && !out.quiet {
                    println!("  {} {}", style("Dropped zones:").dim(), c.dropped_zones.join(", "));
                }
            })
        }

        ViewCommands::Acl { name, access } => {
            let changed = ops.update_view_access(&name, &AccessControl::parse(&access)).await?;
            out.emit(&changed, |c| out.done(format_args!("Updated match-clients of view {}", c.view)))
        }
    }
}

async fn handle_record(ops: &ZoneOps, out: Output, action: RecordCommands) -> Result<()> {
    let change = match action {
        RecordCommands::List { zone } => {
            return out.emit(&ops.list_records(&zone).await?, |r| print_records(r));
        }

        RecordCommands::Add { zone, record } => ops.add_record(&zone, &record.to_record()).await?,

        RecordCommands::Update { zone, matching, record } => {
            let mut selector = RecordSelector::new(record.name.as_str(), record.rtype.clone());
            if let Some(value) = matching {
                selector = selector.with_value(value);
            }
            ops.update_record(&zone, &selector, &record.to_record()).await?
        }

        RecordCommands::Delete {
            zone,
            name,
            rtype,
            matching,
        } => {
            let mut selector = RecordSelector::new(name, rtype);
            if let Some(value) = matching {
                selector = selector.with_value(value);
            }
            ops.delete_record(&zone, &selector).await?
        }
    };

    out.emit(&change, |c| {
        let serial = c.serial.map(|s| format!(", serial {s}")).unwrap_or_default();
        out.done(format_args!("Updated {}{}", c.zone, serial));
    })
}

async fn handle_check(ops: &ZoneOps, out: Output) -> Result<()> {
    let pb = out.spinner("Checking configuration...");
    let result = ops.check().await;
    finish(pb);
    result.with_context(|| format!("{} failed validation", ops.workspace().named_conf.display()))?;

    out.emit(&serde_json::json!({ "success": true }), |_| {
        out.done(format_args!("{} is valid", ops.workspace().named_conf.display()));
    })
}

fn handle_generate(config: &Config, zone: &str, ptr: bool) -> Result<()> {
    let mut options = zone_file_options(&config.defaults);
    options.auto_generate_ptr = ptr;
    print!("{}", generate_zone_file(zone, &options)?);
    Ok(())
}

fn location(view: Option<&str>) -> String {
    match view {
        Some(view) => format!("view {view}"),
        None => "top level".to_string(),
    }
}

/// Print version information
fn print_version(verbose: bool) {
    let version = env!("CARGO_PKG_VERSION");
    let name = env!("CARGO_PKG_NAME");

    if verbose {
        println!("{} {}", style(name).cyan().bold(), style(format!("v{version}")).dim());
        println!();
        println!("  {}: {}", style("Build target").dim(), std::env::consts::ARCH);
        println!("  {}: {}", style("OS").dim(), std::env::consts::OS);
        println!();
    } else {
        println!("{name} {version}");
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

async fn run(cli: Cli) -> Result<()> {
    let (config, source) = Config::discover(cli.config.as_deref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    init_tracing(&LogConfig::resolve(&config.logging, cli.log_level.as_deref(), cli.quiet));
    match &source {
        Some(path) => tracing::debug!(path = %path.display(), "configuration loaded"),
        None => tracing::debug!("no configuration file found, using defaults"),
    }

    let out = Output {
        json: cli.json,
        quiet: cli.quiet,
    };

    if let Commands::Generate { zone, ptr } = &cli.command {
        return handle_generate(&config, zone, *ptr);
    }

    let ops = ZoneOps::from_config(&config)
        .context("Failed to open the settings store")?
        .with_reload(!cli.no_reload);

    match cli.command {
        Commands::Zone { action } => handle_zone(&ops, out, action).await,
        Commands::View { action } => handle_view(&ops, out, action).await,
        Commands::Record { action } => handle_record(&ops, out, action).await,
        Commands::Check => handle_check(&ops, out).await,
        Commands::Generate { .. } | Commands::Version { .. } => Ok(()),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Commands::Version { verbose } = &cli.command {
        print_version(*verbose);
        return;
    }

    let json = cli.json;
    if let Err(e) = run(cli).await {
        print_error(&e, json);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================

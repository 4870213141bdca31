//! # Zonewright Operations
//!
//! Zone and view management over a live name-server configuration.
//!
//! [`ZoneOps`] ties the pieces together:
//!
//! - the configuration document is edited as text and committed through a
//!   validating pipeline, one lock per document
//! - zone files are generated, edited and removed through a second
//!   pipeline that runs the zone checker
//! - the settings store mirrors view membership after every successful
//!   commit and keeps per-zone flags
//!
//! Every mutation either leaves the live files exactly as they were or
//! replaces them with a candidate the checker accepted.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod records;
pub mod status;
pub mod views;
pub mod workspace;
pub mod zones;

#[cfg(test)]
mod testing;

pub use error::{OpsError, Result};
pub use status::ZoneStatus;
pub use views::ViewChanged;
pub use workspace::{SLAVE_DIR, Workspace};
pub use zones::{CreateZone, ZoneConverted, ZoneCreated, ZoneDeleted, ZoneMoved, ZoneOps, zone_file_options};

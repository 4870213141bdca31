//! # Zonewright Zone Files
//!
//! Record-level handling of zone master files:
//!
//! - **Parsing**: read resource records out of hand-written master files,
//!   stepping over directives, comments and the SOA
//! - **Formatting**: write records back as aligned single lines
//! - **Serials**: find and increment the `; Serial` tagged SOA serial
//! - **Generation**: produce a new master file for forward or reverse zones
//! - **Storage**: [`ZoneFileStore`] edits a zone's file through the commit
//!   pipeline, one serial increment per edit
//!
//! ## Example
//!
//! ```rust
//! use zonewright_zone::{RecordType, ZoneFileOptions, generate_zone_file, parse};
//!
//! let text = generate_zone_file("example.com", &ZoneFileOptions::default()).unwrap();
//! let ns = parse(&text)
//!     .into_iter()
//!     .find(|r| r.rtype == RecordType::NS)
//!     .unwrap();
//! assert_eq!(ns.value, "ns1.example.com.");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod edit;
pub mod error;
pub mod generate;
pub mod parse;
pub mod record;
pub mod serial;
pub mod store;

pub use edit::{add_record, bump_or_keep, delete_record, update_record};
pub use error::{Result, ZoneError};
pub use generate::{PTR_SWEEP_LEN, ZoneFileOptions, generate_zone_file, placeholder_slave_file};
pub use parse::{ZoneEntry, format, parse, parse_entries, parse_ttl};
pub use record::{RecordSelector, RecordType, ResourceRecord};
pub use serial::{bump_serial, extract_serial, initial_serial};
pub use store::{RecordChange, ZoneFileStore};

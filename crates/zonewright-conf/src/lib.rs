//! # Zonewright Configuration Documents
//!
//! Pure text handling for `named.conf` style configuration files.
//!
//! - **Scanning**: locate `view`, `zone` and `acl` blocks with brace-depth
//!   matching that survives nesting, comments and quoted strings
//! - **Editing**: remove, insert, and replace blocks without disturbing the
//!   rest of the document
//! - **Document model**: enumerate views, zones and ACLs and build candidate
//!   documents for zone moves and view changes
//!
//! The text buffer is the only source of truth. Nothing in this crate
//! performs I/O or keeps parsed state between calls; callers re-scan the
//! current text for every operation and hand the resulting candidate to a
//! commit pipeline for validation.
//!
//! ## Example
//!
//! ```rust
//! use zonewright_conf::{AccessControl, list_zones, move_zone_to_container};
//!
//! let conf = "zone \"example.com\" {\n    type master;\n    file \"example.com.zone\";\n};\n";
//! let moved = move_zone_to_container(
//!     conf,
//!     "example.com",
//!     "internal/example.com.zone",
//!     Some("internal"),
//!     &AccessControl::parse("10.0.0.0/8"),
//! )
//! .unwrap();
//!
//! let zones = list_zones(&moved).unwrap();
//! assert_eq!(zones[0].view.as_deref(), Some("internal"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod block;
pub mod document;
pub mod edit;
pub mod error;

pub use block::{BlockKind, BlockSpan, ConfigBlock, Scanner, find};
pub use document::{
    AccessControl, Acl, View, Zone, ZoneType, add_view, add_zone, config_name, find_view,
    find_zone, is_reverse_name, list_acls, list_views, list_zones, move_zone_to_container,
    normalize_zone_name, remove_view, remove_zone, replace_zone, set_view_access, zone_block,
    zone_spans,
};
pub use error::{ConfError, Result};

//! # Zonewright Commit Pipeline
//!
//! Every change to a live name-server file goes through one path: the
//! candidate is written next to the target, handed to a [`Checker`] for
//! validation, the old file is copied aside, and the candidate is renamed
//! into place. An optional apply step asks the server to reload, and a
//! failed reload puts the previous version back.
//!
//! Per-file async locks serialize concurrent commits to the same target.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checker;
pub mod error;
pub mod lock;
pub mod pipeline;

pub use checker::{CheckError, CheckSubject, Checker, CommandChecker, run_command};
pub use error::{CommitError, CommitStage, Result};
pub use lock::FileLocks;
pub use pipeline::{BackupPolicy, CommitOptions, CommitPipeline, CommitReport, TargetGuard};

//! File-backed record store for a single zone.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, instrument};
use zonewright_commit::{CommitOptions, CommitPipeline, CommitReport};

use crate::edit::{add_record, bump_or_keep, delete_record, update_record};
use crate::error::{Result, ZoneError};
use crate::parse::parse;
use crate::record::{RecordSelector, ResourceRecord};
use crate::serial::extract_serial;

/// Outcome of a record edit.
#[derive(Debug, Clone, Serialize)]
pub struct RecordChange {
    /// Zone that was edited.
    pub zone: String,
    /// Serial after the edit, if the file carries one.
    pub serial: Option<u64>,
    /// Backup of the previous file, if one was kept.
    pub backup: Option<PathBuf>,
    /// Whether the server was asked to reload the zone.
    pub reloaded: bool,
}

/// Reads and edits the records of one zone master file.
///
/// Every edit holds the file's lock across read, mutate and commit. The
/// serial is bumped once per edit, and the candidate goes through the
/// pipeline's checker (normally the zone checker) before it replaces the
/// live file.
#[derive(Debug, Clone)]
pub struct ZoneFileStore {
    zone: String,
    path: PathBuf,
    pipeline: CommitPipeline,
    backup: bool,
    reload: bool,
}

impl ZoneFileStore {
    /// Creates a store for `zone` backed by `path`.
    pub fn new(zone: impl Into<String>, path: impl Into<PathBuf>, pipeline: CommitPipeline) -> Self {
        Self {
            zone: zone.into(),
            path: path.into(),
            pipeline,
            backup: true,
            reload: false,
        }
    }

    /// Sets whether edits keep a backup.
    pub fn with_backup(mut self, backup: bool) -> Self {
        self.backup = backup;
        self
    }

    /// Sets whether edits ask the server to reload the zone.
    pub fn with_reload(mut self, reload: bool) -> Self {
        self.reload = reload;
        self
    }

    /// Zone name.
    pub fn zone(&self) -> &str {
        &self.zone
    }

    /// Master file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lists the records in the file.
    pub async fn list(&self) -> Result<Vec<ResourceRecord>> {
        Ok(parse(&self.read().await?))
    }

    /// Returns the current serial.
    pub async fn serial(&self) -> Result<Option<u64>> {
        Ok(extract_serial(&self.read().await?))
    }

    /// Appends a record.
    #[instrument(skip(self, record), fields(zone = %self.zone, name = %record.name, rtype = %record.rtype))]
    pub async fn add(&self, record: &ResourceRecord) -> Result<RecordChange> {
        self.mutate(|text| add_record(text, record)).await
    }

    /// Replaces the record picked by `selector`.
    #[instrument(skip(self, selector, record), fields(zone = %self.zone, name = %selector.name, rtype = %selector.rtype))]
    pub async fn update(&self, selector: &RecordSelector, record: &ResourceRecord) -> Result<RecordChange> {
        self.mutate(|text| update_record(text, selector, record)).await
    }

    /// Removes the record picked by `selector`.
    #[instrument(skip(self, selector), fields(zone = %self.zone, name = %selector.name, rtype = %selector.rtype))]
    pub async fn delete(&self, selector: &RecordSelector) -> Result<RecordChange> {
        self.mutate(|text| delete_record(text, selector)).await
    }

    async fn read(&self) -> Result<String> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| ZoneError::Io {
                path: self.path.clone(),
                source,
            })
    }

    async fn mutate<F>(&self, edit: F) -> Result<RecordChange>
    where
        F: FnOnce(&str) -> Result<String>,
    {
        let guard = self.pipeline.lock(&self.path).await;
        let current = guard.read().await?;
        let candidate = bump_or_keep(edit(&current)?, &self.zone);

        let options = CommitOptions::for_zone(self.zone.as_str())
            .backup(self.backup)
            .apply(self.reload);
        let CommitReport { backup, applied, .. } = self.pipeline.commit(&guard, &candidate, &options).await?;

        let serial = extract_serial(&candidate);
        info!(serial, "zone file updated");
        Ok(RecordChange {
            zone: self.zone.clone(),
            serial,
            backup,
            reloaded: applied,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordType;
    use async_trait::async_trait;
    use std::sync::Arc;
    use tempfile::TempDir;
    use zonewright_commit::{CheckError, CheckSubject, Checker, CommitError};

    struct ZoneChecker {
        reject: bool,
    }

    #[async_trait]
    impl Checker for ZoneChecker {
        async fn validate(&self, subject: &CheckSubject<'_>) -> std::result::Result<(), CheckError> {
            assert!(subject.zone.is_some());
            if self.reject {
                return Err(CheckError::Rejected {
                    command: "named-checkzone".into(),
                    status: Some(1),
                    diagnostic: "zone example.com/IN: has 0 SOA records".into(),
                });
            }
            Ok(())
        }

        async fn apply(&self, _subject: &CheckSubject<'_>) -> std::result::Result<(), CheckError> {
            Ok(())
        }
    }

    const ZONE: &str = "$TTL 3600\n@ IN SOA ns1.example.com. hostmaster.example.com. (\n    2024010101 ; Serial\n    3600 )\n@ IN NS ns1.example.com.\n";

    fn store(reject: bool) -> (TempDir, ZoneFileStore) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("example.com.zone");
        std::fs::write(&path, ZONE).unwrap();
        let pipeline = CommitPipeline::new(Arc::new(ZoneChecker { reject }));
        (dir, ZoneFileStore::new("example.com.", path, pipeline))
    }

    #[tokio::test]
    async fn test_each_edit_bumps_serial_once() {
        let (_dir, store) = store(false);

        for i in 1..=3u8 {
            let record = ResourceRecord::new(format!("host{i}"), RecordType::A, format!("192.0.2.{i}"));
            let change = store.add(&record).await.unwrap();
            assert_eq!(change.serial, Some(2024010101 + u64::from(i)));
        }
        store
            .delete(&RecordSelector::new("host2", RecordType::A))
            .await
            .unwrap();

        assert_eq!(store.serial().await.unwrap(), Some(2024010105));
        let names: Vec<_> = store.list().await.unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["@", "host1", "host3"]);
    }

    #[tokio::test]
    async fn test_update_record() {
        let (_dir, store) = store(false);
        store
            .add(&ResourceRecord::new("www", RecordType::A, "192.0.2.1"))
            .await
            .unwrap();
        let change = store
            .update(
                &RecordSelector::new("www", RecordType::A),
                &ResourceRecord::new("www", RecordType::A, "192.0.2.2").with_ttl(Some(300)),
            )
            .await
            .unwrap();
        assert!(change.backup.is_some());

        let www = store.list().await.unwrap().pop().unwrap();
        assert_eq!((www.value.as_str(), www.ttl), ("192.0.2.2", Some(300)));
    }

    #[tokio::test]
    async fn test_rejected_edit_leaves_file_unchanged() {
        let (_dir, store) = store(true);
        let err = store
            .add(&ResourceRecord::new("www", RecordType::A, "192.0.2.1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ZoneError::Commit(CommitError::ValidationRejected { .. })));
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), ZONE);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let pipeline = CommitPipeline::new(Arc::new(ZoneChecker { reject: false }));
        let store = ZoneFileStore::new("gone.example.", dir.path().join("gone.zone"), pipeline);
        assert!(matches!(store.list().await, Err(ZoneError::Io { .. })));
    }
}

//! Record edits on a zone's master file.

use tracing::instrument;
use zonewright_conf::ZoneType;
use zonewright_zone::{RecordChange, RecordSelector, ResourceRecord, ZoneFileStore};

use crate::error::{OpsError, Result};
use crate::zones::{ZoneOps, require_zone};

impl ZoneOps {
    /// Returns the record store for a master zone.
    ///
    /// The store honours the zone's `backup_enabled` and `auto_reload` flags.
    pub async fn zone_store(&self, name: &str) -> Result<ZoneFileStore> {
        let text = self.read_conf().await?;
        let zone = require_zone(&text, name)?;
        if zone.zone_type != ZoneType::Master {
            return Err(OpsError::unsupported(format!(
                "records can only be edited in master zones, {} is {}",
                zone.name, zone.zone_type
            )));
        }

        let file = zone
            .file
            .as_deref()
            .map(|f| self.workspace.resolve(f))
            .unwrap_or_else(|| self.workspace.master_file(&zone.name));
        let flags = self.settings.flags(&zone.name);

        Ok(ZoneFileStore::new(zone.name, file, self.zones.clone())
            .with_backup(self.backups && flags.backup_enabled)
            .with_reload(self.reload && flags.auto_reload))
    }

    /// Lists a zone's records.
    pub async fn list_records(&self, zone: &str) -> Result<Vec<ResourceRecord>> {
        Ok(self.zone_store(zone).await?.list().await?)
    }

    /// Adds a record to a zone.
    #[instrument(skip(self, record))]
    pub async fn add_record(&self, zone: &str, record: &ResourceRecord) -> Result<RecordChange> {
        Ok(self.zone_store(zone).await?.add(record).await?)
    }

    /// Replaces the record picked by `selector`.
    #[instrument(skip(self, selector, record))]
    pub async fn update_record(
        &self,
        zone: &str,
        selector: &RecordSelector,
        record: &ResourceRecord,
    ) -> Result<RecordChange> {
        Ok(self.zone_store(zone).await?.update(selector, record).await?)
    }

    /// Removes the record picked by `selector`.
    #[instrument(skip(self, selector))]
    pub async fn delete_record(&self, zone: &str, selector: &RecordSelector) -> Result<RecordChange> {
        Ok(self.zone_store(zone).await?.delete(selector).await?)
    }
}

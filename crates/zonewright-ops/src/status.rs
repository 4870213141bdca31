//! Read-only zone status and live document checks.

use std::path::PathBuf;

use futures::future::join_all;
use serde::Serialize;
use tracing::instrument;
use zonewright_conf::{Zone, ZoneType, list_zones, normalize_zone_name};
use zonewright_zone::{extract_serial, parse};

use crate::error::Result;
use crate::zones::ZoneOps;

/// What is known about one zone.
#[derive(Debug, Clone, Serialize)]
pub struct ZoneStatus {
    /// Zone name as requested (normalized when valid).
    pub name: String,
    /// Whether the document declares the zone.
    pub declared: bool,
    /// Enclosing view.
    pub view: Option<String>,
    /// Zone type.
    pub zone_type: Option<ZoneType>,
    /// Resolved zone file.
    pub file: Option<PathBuf>,
    /// Whether the zone file exists.
    pub file_exists: bool,
    /// SOA serial from the file.
    pub serial: Option<u64>,
    /// Number of records in the file.
    pub records: Option<usize>,
}

impl ZoneOps {
    /// Collects status for `names`, or for every zone when empty.
    ///
    /// Zone files are read concurrently.
    #[instrument(skip(self))]
    pub async fn zone_status(&self, names: &[String]) -> Result<Vec<ZoneStatus>> {
        let zones = list_zones(&self.read_conf().await?)?;

        let wanted: Vec<(String, Option<&Zone>)> = if names.is_empty() {
            zones.iter().map(|z| (z.name.clone(), Some(z))).collect()
        } else {
            names
                .iter()
                .map(|n| {
                    let name = normalize_zone_name(n).unwrap_or_else(|_| n.clone());
                    let zone = zones.iter().find(|z| z.name == name);
                    (name, zone)
                })
                .collect()
        };

        Ok(join_all(wanted.into_iter().map(|(name, zone)| self.status_of(name, zone))).await)
    }

    async fn status_of(&self, name: String, zone: Option<&Zone>) -> ZoneStatus {
        let Some(zone) = zone else {
            return ZoneStatus {
                name,
                declared: false,
                view: None,
                zone_type: None,
                file: None,
                file_exists: false,
                serial: None,
                records: None,
            };
        };

        let file = zone.file.as_deref().map(|f| self.workspace.resolve(f));
        let content = match &file {
            Some(path) => tokio::fs::read_to_string(path).await.ok(),
            None => None,
        };

        ZoneStatus {
            name,
            declared: true,
            view: zone.view.clone(),
            zone_type: Some(zone.zone_type),
            file_exists: content.is_some(),
            serial: content.as_deref().and_then(extract_serial),
            records: content.as_deref().map(|c| parse(c).len()),
            file,
        }
    }

    /// Runs the configuration checker against the live document.
    #[instrument(skip(self))]
    pub async fn check(&self) -> Result<()> {
        let guard = self.conf.lock(&self.workspace.named_conf).await;
        Ok(self.conf.check_live(&guard, None).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use crate::zones::CreateZone;

    #[tokio::test]
    async fn test_status_of_all_zones() {
        let fx = Fixture::new();
        fx.ops
            .create_zone(CreateZone {
                name: "example.com".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let status = fx.ops.zone_status(&[]).await.unwrap();
        assert_eq!(status.len(), 2);

        let corp = status.iter().find(|s| s.name == "corp.example.").unwrap();
        assert!(corp.declared && corp.file_exists);
        assert_eq!(corp.view.as_deref(), Some("internal"));
        assert_eq!(corp.serial, Some(2024010101));
        assert_eq!(corp.records, Some(2));

        let example = status.iter().find(|s| s.name == "example.com.").unwrap();
        assert_eq!(example.zone_type, Some(ZoneType::Master));
        assert_eq!(example.records, Some(4));
    }

    #[tokio::test]
    async fn test_status_of_named_zones() {
        let fx = Fixture::new();
        std::fs::remove_file(fx.zone_path("corp.example.zone")).unwrap();

        let status = fx
            .ops
            .zone_status(&["CORP.example".to_string(), "nope.example".to_string()])
            .await
            .unwrap();

        assert_eq!(status[0].name, "corp.example.");
        assert!(status[0].declared);
        assert!(!status[0].file_exists);
        assert_eq!(status[0].serial, None);

        assert_eq!(status[1].name, "nope.example.");
        assert!(!status[1].declared);
    }

    #[tokio::test]
    async fn test_check_live_document() {
        let fx = Fixture::new();
        fx.ops.check().await.unwrap();
        fx.conf.reject(true);
        assert!(fx.ops.check().await.is_err());
    }
}

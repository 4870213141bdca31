//! View operations.

use serde::Serialize;
use tracing::{info, instrument};
use zonewright_conf::{AccessControl, BlockKind, ConfError, View, add_view, find_view, remove_view, set_view_access};

use crate::error::{OpsError, Result};
use crate::zones::{ZoneOps, read_guarded};

/// Outcome of a view change.
#[derive(Debug, Clone, Serialize)]
pub struct ViewChanged {
    /// View name.
    pub view: String,
    /// Zones dropped along with a forced deletion.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dropped_zones: Vec<String>,
    /// Whether the server was asked to reload.
    pub reloaded: bool,
}

impl ZoneOps {
    /// Looks up one view.
    pub async fn find_view(&self, name: &str) -> Result<View> {
        let text = self.read_conf().await?;
        find_view(&text, name)?.ok_or_else(|| ConfError::not_found(BlockKind::View, name).into())
    }

    /// Creates an empty view.
    #[instrument(skip(self, access))]
    pub async fn create_view(&self, name: &str, access: &AccessControl) -> Result<ViewChanged> {
        let conf = self.conf.lock(&self.workspace.named_conf).await;
        let text = read_guarded(&conf).await?;
        let candidate = add_view(&text, name, access)?;

        let report = self.conf.commit(&conf, &candidate, &self.conf_options()).await?;
        info!(view = name, "view created");
        self.sync_settings(&candidate, |_| {}).await;

        Ok(ViewChanged {
            view: name.to_string(),
            dropped_zones: Vec::new(),
            reloaded: report.applied,
        })
    }

    /// Deletes a view.
    ///
    /// A view that still holds zones is only deleted when `force` is set;
    /// its zones are then dropped from the document and the settings. Their
    /// files stay on disk.
    #[instrument(skip(self))]
    pub async fn delete_view(&self, name: &str, force: bool) -> Result<ViewChanged> {
        let conf = self.conf.lock(&self.workspace.named_conf).await;
        let text = read_guarded(&conf).await?;
        let view = find_view(&text, name)?.ok_or_else(|| ConfError::not_found(BlockKind::View, name))?;

        if !view.zones.is_empty() && !force {
            return Err(OpsError::ViewNotEmpty {
                view: view.name,
                zones: view.zones,
            });
        }

        let candidate = remove_view(&text, name)?;
        let report = self.conf.commit(&conf, &candidate, &self.conf_options()).await?;
        info!(view = name, zones = view.zones.len(), "view deleted");

        self.sync_settings(&candidate, |s| {
            for zone in &view.zones {
                s.remove_zone(zone);
            }
        })
        .await;

        Ok(ViewChanged {
            view: view.name,
            dropped_zones: view.zones,
            reloaded: report.applied,
        })
    }

    /// Replaces a view's `match-clients` list, leaving its zones alone.
    #[instrument(skip(self, access))]
    pub async fn update_view_access(&self, name: &str, access: &AccessControl) -> Result<ViewChanged> {
        let conf = self.conf.lock(&self.workspace.named_conf).await;
        let text = read_guarded(&conf).await?;
        let candidate = set_view_access(&text, name, access)?;

        let report = self.conf.commit(&conf, &candidate, &self.conf_options()).await?;
        info!(view = name, "view access updated");
        self.sync_settings(&candidate, |_| {}).await;

        Ok(ViewChanged {
            view: name.to_string(),
            dropped_zones: Vec::new(),
            reloaded: report.applied,
        })
    }
}

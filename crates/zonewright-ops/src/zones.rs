//! Zone lifecycle: create, delete, move between views, convert.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, instrument, warn};
use zonewright_commit::{
    BackupPolicy, Checker, CommandChecker, CommitOptions, CommitPipeline, TargetGuard,
};
use zonewright_conf::{
    AccessControl, BlockKind, ConfError, View, Zone, ZoneType, add_zone, find_view, find_zone,
    list_views, list_zones, move_zone_to_container, normalize_zone_name, remove_zone, replace_zone,
};
use zonewright_config::{Config, DefaultsConfig, Settings, SettingsStore, ZoneFlags};
use zonewright_zone::{ZoneFileOptions, extract_serial, generate_zone_file, placeholder_slave_file};

use crate::error::{OpsError, Result};
use crate::workspace::Workspace;

// ============================================================================
// Requests and Reports
// ============================================================================

/// Parameters for a new zone.
#[derive(Debug, Clone, Default)]
pub struct CreateZone {
    /// Zone name.
    pub name: String,
    /// Zone type. Only master and slave zones can be created.
    pub zone_type: ZoneType,
    /// Target view, `None` for top level.
    pub view: Option<String>,
    /// Match list for the view if it has to be created.
    pub access: Option<AccessControl>,
    /// Primaries for slave zones.
    pub masters: Vec<IpAddr>,
    /// Generate a PTR sweep for reverse zones. Falls back to the zone's
    /// stored flag.
    pub auto_generate_ptr: Option<bool>,
}

/// Outcome of a zone creation.
#[derive(Debug, Clone, Serialize)]
pub struct ZoneCreated {
    /// The zone as written to the document.
    pub zone: Zone,
    /// Zone file on disk.
    pub file: PathBuf,
    /// Whether the file was generated (as opposed to already present).
    pub generated: bool,
    /// Serial of the zone file.
    pub serial: Option<u64>,
    /// Whether the server was asked to reload.
    pub reloaded: bool,
}

/// Outcome of a zone deletion.
#[derive(Debug, Clone, Serialize)]
pub struct ZoneDeleted {
    /// The zone that was removed.
    pub zone: Zone,
    /// Backup of the removed zone file.
    pub file_backup: Option<PathBuf>,
    /// Backup of the previous configuration document.
    pub conf_backup: Option<PathBuf>,
    /// Whether the server was asked to reload.
    pub reloaded: bool,
}

/// Outcome of a zone move.
#[derive(Debug, Clone, Serialize)]
pub struct ZoneMoved {
    /// Zone name.
    pub zone: String,
    /// Previous view.
    pub from: Option<String>,
    /// New view.
    pub to: Option<String>,
    /// Whether the target view had to be created.
    pub created_view: bool,
    /// Whether the server was asked to reload.
    pub reloaded: bool,
}

/// Outcome of a type conversion.
#[derive(Debug, Clone, Serialize)]
pub struct ZoneConverted {
    /// The zone as now written.
    pub zone: Zone,
    /// Type before the conversion.
    pub from: ZoneType,
    /// Whether anything changed.
    pub changed: bool,
    /// Whether the server was asked to reload.
    pub reloaded: bool,
}

// ============================================================================
// ZoneOps
// ============================================================================

/// Operations on zones and views of one name-server configuration.
///
/// Every mutation holds the configuration document's lock for the whole
/// read-modify-commit sequence. Zone files are committed through a second
/// pipeline that runs the zone checker and shares the same lock registry.
#[derive(Debug)]
pub struct ZoneOps {
    pub(crate) workspace: Workspace,
    pub(crate) conf: CommitPipeline,
    pub(crate) zones: CommitPipeline,
    pub(crate) settings: SettingsStore,
    pub(crate) defaults: ZoneFileOptions,
    pub(crate) reload: bool,
    pub(crate) backups: bool,
}

impl ZoneOps {
    /// Creates operations with explicit checkers.
    ///
    /// `conf_checker` validates configuration candidates and reloads the
    /// server; `zone_checker` validates zone files and reloads single zones.
    pub fn new(
        workspace: Workspace,
        conf_checker: Arc<dyn Checker>,
        zone_checker: Arc<dyn Checker>,
        settings: SettingsStore,
    ) -> Self {
        let conf = CommitPipeline::new(conf_checker);
        let zones = conf.with_checker(zone_checker);
        Self {
            workspace,
            conf,
            zones,
            settings,
            defaults: ZoneFileOptions::default(),
            reload: true,
            backups: true,
        }
    }

    /// Builds operations from the tool configuration, shelling out to the
    /// configured commands.
    pub fn from_config(config: &Config) -> Result<Self> {
        let commands = &config.commands;
        let timeout = Duration::from_secs(commands.timeout_secs);

        let conf_checker = CommandChecker::new(commands.check_conf.clone())
            .with_reload(commands.reload.clone())
            .with_timeout(timeout);
        let zone_checker = CommandChecker::new(commands.check_zone.clone())
            .with_reload(commands.reload_zone.clone())
            .with_timeout(timeout);
        let settings = SettingsStore::open(&config.paths.settings_file)?;

        Ok(Self::new(
            Workspace::from_config(&config.paths),
            Arc::new(conf_checker),
            Arc::new(zone_checker),
            settings,
        )
        .with_defaults(zone_file_options(&config.defaults))
        .with_backups(
            config.backups.enabled,
            BackupPolicy {
                dir: config.paths.backup_dir.clone(),
                keep: config.backups.keep,
            },
        ))
    }

    /// Sets the values used for generated zone files.
    pub fn with_defaults(mut self, defaults: ZoneFileOptions) -> Self {
        self.defaults = defaults;
        self
    }

    /// Sets whether committed changes are applied to the running server.
    pub fn with_reload(mut self, reload: bool) -> Self {
        self.reload = reload;
        self
    }

    /// Sets whether backups are kept and how they are retained.
    pub fn with_backups(mut self, enabled: bool, policy: BackupPolicy) -> Self {
        self.backups = enabled;
        self.conf = self.conf.clone().with_backups(policy.clone());
        self.zones = self.zones.clone().with_backups(policy);
        self
    }

    /// Paths in use.
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Settings store in use.
    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Lists all zones in the document.
    pub async fn list_zones(&self) -> Result<Vec<Zone>> {
        Ok(list_zones(&self.read_conf().await?)?)
    }

    /// Lists all views in the document.
    pub async fn list_views(&self) -> Result<Vec<View>> {
        Ok(list_views(&self.read_conf().await?)?)
    }

    /// Looks up one zone.
    pub async fn find_zone(&self, name: &str) -> Result<Zone> {
        let text = self.read_conf().await?;
        require_zone(&text, name)
    }

    // ------------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------------

    /// Creates a zone: writes its file, then declares it in the document.
    ///
    /// The file is removed again if the document commit fails.
    #[instrument(skip(self, request), fields(zone = %request.name, view = ?request.view))]
    pub async fn create_zone(&self, request: CreateZone) -> Result<ZoneCreated> {
        let name = normalize_zone_name(&request.name)?;
        let conf = self.conf.lock(&self.workspace.named_conf).await;
        let text = read_guarded(&conf).await?;

        if find_zone(&text, &name)?.is_some() {
            return Err(OpsError::ZoneExists(name));
        }

        let file = match request.zone_type {
            ZoneType::Master => self.workspace.master_file(&name),
            ZoneType::Slave => self.workspace.slave_file(&name),
            other => return Err(OpsError::unsupported(format!("{other} zones cannot be created"))),
        };
        let zone = Zone::new(&name, request.zone_type)?
            .with_file(&file)
            .in_view(request.view.clone())
            .with_masters(request.masters.clone());
        let candidate = add_zone(&text, &zone, request.access.as_ref())?;

        let flags = ZoneFlags {
            auto_generate_ptr: request
                .auto_generate_ptr
                .unwrap_or_else(|| self.settings.flags(&name).auto_generate_ptr),
            ..self.settings.flags(&name)
        };
        let (generated, serial) = self.write_zone_file(&zone, &file, flags.auto_generate_ptr).await?;

        let report = match self.conf.commit(&conf, &candidate, &self.conf_options()).await {
            Ok(report) => report,
            Err(err) => {
                if generated {
                    self.discard_zone_file(&file).await;
                }
                return Err(err.into());
            }
        };

        info!(file = %file.display(), "zone created");
        self.sync_settings(&candidate, |s| {
            s.zones.insert(name.clone(), flags);
        })
        .await;

        Ok(ZoneCreated {
            zone,
            file,
            generated,
            serial,
            reloaded: report.applied,
        })
    }

    /// Deletes a zone and its file.
    ///
    /// The file is backed up before it is removed and restored if the
    /// document commit fails. Hint files are left in place.
    #[instrument(skip(self))]
    pub async fn delete_zone(&self, name: &str) -> Result<ZoneDeleted> {
        let conf = self.conf.lock(&self.workspace.named_conf).await;
        let text = read_guarded(&conf).await?;
        let zone = require_zone(&text, name)?;
        let candidate = remove_zone(&text, &zone.name)?;

        let file = match (&zone.file, zone.zone_type) {
            (Some(file), ZoneType::Master | ZoneType::Slave) => Some(self.workspace.resolve(file)),
            _ => None,
        };

        let mut removed = None;
        if let Some(path) = &file {
            let guard = self.zones.lock(path).await;
            let backup = self.zones.remove(&guard, true).await?;
            removed = Some((guard, backup));
        }

        let report = match self.conf.commit(&conf, &candidate, &self.conf_options()).await {
            Ok(report) => report,
            Err(err) => {
                if let Some((guard, Some(backup))) = &removed {
                    if let Err(restore) = self.zones.restore(guard, backup).await {
                        warn!(error = %restore, "could not restore zone file");
                    }
                }
                return Err(err.into());
            }
        };

        info!(zone = %zone.name, "zone deleted");
        self.sync_settings(&candidate, |s| s.remove_zone(&zone.name)).await;

        Ok(ZoneDeleted {
            file_backup: removed.and_then(|(_, backup)| backup),
            conf_backup: report.backup,
            reloaded: report.applied,
            zone,
        })
    }

    /// Moves a zone into `view`, or to top level when `view` is `None`.
    ///
    /// A missing view is created with `access`. The membership index is only
    /// updated after the document commit succeeds.
    #[instrument(skip(self, access))]
    pub async fn move_zone(&self, name: &str, view: Option<&str>, access: &AccessControl) -> Result<ZoneMoved> {
        let conf = self.conf.lock(&self.workspace.named_conf).await;
        let text = read_guarded(&conf).await?;
        let zone = require_zone(&text, name)?;
        if !zone.zone_type.is_managed() {
            return Err(OpsError::unsupported(format!(
                "{} zones cannot be moved, {} is left in place",
                zone.zone_type, zone.name
            )));
        }

        let created_view = match view {
            Some(v) => find_view(&text, v)?.is_none(),
            None => false,
        };
        let file = zone
            .file
            .clone()
            .unwrap_or_else(|| self.workspace.master_file(&zone.name));
        let candidate = move_zone_to_container(&text, &zone.name, file, view, access)?;

        let report = self.conf.commit(&conf, &candidate, &self.conf_options()).await?;
        info!(zone = %zone.name, from = ?zone.view, to = ?view, "zone moved");
        self.sync_settings(&candidate, |_| {}).await;

        Ok(ZoneMoved {
            zone: zone.name,
            from: zone.view,
            to: view.map(String::from),
            created_view,
            reloaded: report.applied,
        })
    }

    /// Converts a zone between master and slave.
    ///
    /// Switching to slave writes a placeholder file under the slave
    /// directory; switching to master generates a file if none exists. The
    /// old file is kept.
    #[instrument(skip(self, masters))]
    pub async fn convert_zone(&self, name: &str, to: ZoneType, masters: Vec<IpAddr>) -> Result<ZoneConverted> {
        let conf = self.conf.lock(&self.workspace.named_conf).await;
        let text = read_guarded(&conf).await?;
        let current = require_zone(&text, name)?;
        let from = current.zone_type;

        if from == to {
            return Ok(ZoneConverted {
                zone: current,
                from,
                changed: false,
                reloaded: false,
            });
        }
        if !is_convertible(from) || !is_convertible(to) {
            return Err(OpsError::unsupported(format!(
                "{} cannot be converted from {from} to {to}",
                current.name
            )));
        }

        let (file, masters) = match to {
            ZoneType::Slave => (self.workspace.slave_file(&current.name), masters),
            _ => (self.workspace.master_file(&current.name), Vec::new()),
        };
        let zone = Zone {
            zone_type: to,
            file: Some(file.clone()),
            masters,
            ..current
        };
        let candidate = replace_zone(&text, &zone)?;

        let flags = self.settings.flags(&zone.name);
        let (generated, _) = self.write_zone_file(&zone, &file, flags.auto_generate_ptr).await?;

        let report = match self.conf.commit(&conf, &candidate, &self.conf_options()).await {
            Ok(report) => report,
            Err(err) => {
                if generated {
                    self.discard_zone_file(&file).await;
                }
                return Err(err.into());
            }
        };

        info!(zone = %zone.name, %from, %to, "zone converted");
        self.sync_settings(&candidate, |_| {}).await;

        Ok(ZoneConverted {
            zone,
            from,
            changed: true,
            reloaded: report.applied,
        })
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    pub(crate) async fn read_conf(&self) -> Result<String> {
        match tokio::fs::read_to_string(&self.workspace.named_conf).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(zonewright_commit::CommitError::io(
                zonewright_commit::CommitStage::Draft,
                &self.workspace.named_conf,
                e,
            )
            .into()),
        }
    }

    pub(crate) fn conf_options(&self) -> CommitOptions {
        CommitOptions::default().apply(self.reload).backup(self.backups)
    }

    /// Writes a generated or placeholder file for `zone` unless one exists.
    ///
    /// Returns whether a file was written and its serial.
    async fn write_zone_file(&self, zone: &Zone, file: &Path, sweep: bool) -> Result<(bool, Option<u64>)> {
        let guard = self.zones.lock(file).await;
        if let Some(existing) = guard.read_optional().await? {
            info!(file = %file.display(), "zone file already exists, keeping it");
            return Ok((false, extract_serial(&existing)));
        }

        let content = match zone.zone_type {
            ZoneType::Slave => placeholder_slave_file(&zone.name, &self.defaults)?,
            _ => {
                let options = ZoneFileOptions {
                    auto_generate_ptr: sweep,
                    ..self.defaults.clone()
                };
                generate_zone_file(&zone.name, &options)?
            }
        };

        let options = CommitOptions::for_zone(zone.name.as_str()).backup(false);
        self.zones.commit(&guard, &content, &options).await?;
        Ok((true, extract_serial(&content)))
    }

    async fn discard_zone_file(&self, file: &Path) {
        let guard = self.zones.lock(file).await;
        if let Err(e) = self.zones.remove(&guard, false).await {
            warn!(file = %file.display(), error = %e, "could not remove zone file");
        }
    }

    /// Rebuilds the membership index from `text` and applies `change`.
    ///
    /// The document has already been committed at this point, so a failure
    /// here is logged rather than returned; the next successful mutation
    /// rebuilds the index from the document again.
    pub(crate) async fn sync_settings(&self, text: &str, change: impl FnOnce(&mut Settings)) {
        let membership: Vec<(String, Vec<String>)> = match list_views(text) {
            Ok(views) => views.into_iter().map(|v| (v.name, v.zones)).collect(),
            Err(e) => {
                warn!(error = %e, "could not rebuild view membership");
                return;
            }
        };

        let update = self.settings.update(|s| {
            s.set_membership(membership);
            change(s);
        });
        if let Err(e) = update.await {
            warn!(path = %self.settings.path().display(), error = %e, "could not update settings");
        }
    }
}

/// Converts the `defaults` section into zone file generation options.
pub fn zone_file_options(defaults: &DefaultsConfig) -> ZoneFileOptions {
    ZoneFileOptions {
        ttl: defaults.ttl,
        refresh: defaults.refresh,
        retry: defaults.retry,
        expire: defaults.expire,
        minimum: defaults.minimum,
        hostmaster: defaults.hostmaster.clone(),
        nameserver_prefix: defaults.nameserver_prefix.clone(),
        address: defaults.default_ip,
        ptr_domain: defaults.ptr_domain.clone(),
        ..ZoneFileOptions::default()
    }
}

pub(crate) async fn read_guarded(guard: &TargetGuard) -> Result<String> {
    Ok(guard.read_optional().await?.unwrap_or_default())
}

fn is_convertible(zone_type: ZoneType) -> bool {
    matches!(zone_type, ZoneType::Master | ZoneType::Slave)
}

pub(crate) fn require_zone(text: &str, name: &str) -> Result<Zone> {
    let normalized = normalize_zone_name(name)?;
    find_zone(text, &normalized)?.ok_or_else(|| ConfError::not_found(BlockKind::Zone, normalized).into())
}

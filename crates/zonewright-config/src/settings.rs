//! Persistent settings: view membership and per-zone flags.
//!
//! The configuration document is the source of truth for which zones live
//! in which view. This store keeps a copy of that index for callers that
//! want it without scanning, and it is rewritten after every successful
//! commit. Per-zone flags exist only here.
//!
//! [`Settings::save`] blocks; async callers go through
//! [`SettingsStore::update`], which writes with `tokio::fs`.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::Result;

/// Settings file contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// File format version.
    #[serde(default = "default_version")]
    pub version: u32,

    /// Zones per view, keyed by view name.
    #[serde(default)]
    pub views: BTreeMap<String, ViewEntry>,

    /// Flags per zone, keyed by normalized zone name.
    #[serde(default)]
    pub zones: BTreeMap<String, ZoneFlags>,
}

fn default_version() -> u32 {
    1
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            views: BTreeMap::new(),
            zones: BTreeMap::new(),
        }
    }
}

/// Membership entry for one view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewEntry {
    /// Normalized names of the zones in the view.
    #[serde(default)]
    pub zones: Vec<String>,
}

/// Per-zone behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneFlags {
    /// Reload the zone after record edits.
    pub auto_reload: bool,

    /// Keep backups of the zone file.
    pub backup_enabled: bool,

    /// Generate a PTR sweep when the reverse zone file is created.
    pub auto_generate_ptr: bool,
}

impl Default for ZoneFlags {
    fn default() -> Self {
        Self {
            auto_reload: true,
            backup_enabled: true,
            auto_generate_ptr: false,
        }
    }
}

impl Settings {
    /// Loads settings from a file. A missing file gives the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    /// Saves settings to a file, blocking the calling thread.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // Write to a temp file first, then rename for atomicity
        let temp_path = path.with_extension("tmp");
        let content = serde_json::to_string_pretty(self)?;

        let mut file = std::fs::File::create(&temp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        drop(file);

        std::fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Saves settings to a file without blocking the runtime.
    pub async fn save_async(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let temp_path = path.with_extension("tmp");
        let content = serde_json::to_string_pretty(self)?;

        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(content.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&temp_path, path).await?;
        Ok(())
    }

    /// Replaces the membership index with what the document says.
    pub fn set_membership<I>(&mut self, views: I)
    where
        I: IntoIterator<Item = (String, Vec<String>)>,
    {
        self.views = views
            .into_iter()
            .map(|(name, zones)| (name, ViewEntry { zones }))
            .collect();
    }

    /// Returns the view a zone is recorded in.
    pub fn view_of(&self, zone: &str) -> Option<&str> {
        self.views
            .iter()
            .find(|(_, entry)| entry.zones.iter().any(|z| z == zone))
            .map(|(name, _)| name.as_str())
    }

    /// Returns a zone's flags, defaults if it has none.
    pub fn flags(&self, zone: &str) -> ZoneFlags {
        self.zones.get(zone).copied().unwrap_or_default()
    }

    /// Drops a zone from the membership index and the flags.
    pub fn remove_zone(&mut self, zone: &str) {
        for entry in self.views.values_mut() {
            entry.zones.retain(|z| z != zone);
        }
        self.zones.remove(zone);
    }
}

/// Shared, file-backed [`Settings`].
///
/// Reads are served from memory. Writers are serialized by an async mutex,
/// and the in-memory lock is only taken to copy or swap the value, never
/// across file I/O.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    state: RwLock<Settings>,
    writer: Mutex<()>,
}

impl SettingsStore {
    /// Opens the store, loading the file if it exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let settings = Settings::load(&path)?;
        Ok(Self {
            path,
            state: RwLock::new(settings),
            writer: Mutex::new(()),
        })
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns a copy of the current settings.
    pub fn snapshot(&self) -> Settings {
        self.state.read().clone()
    }

    /// Returns a zone's flags.
    pub fn flags(&self, zone: &str) -> ZoneFlags {
        self.state.read().flags(zone)
    }

    /// Applies `change` and persists the result.
    ///
    /// The in-memory copy is only replaced once the file has been written.
    pub async fn update<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut Settings),
    {
        let _writer = self.writer.lock().await;
        let current = self.snapshot();
        let mut next = current.clone();
        change(&mut next);
        if next == current {
            return Ok(());
        }

        next.save_async(&self.path).await?;
        debug!(path = %self.path.display(), "settings saved");
        *self.state.write() = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load(&dir.path().join("none.json")).unwrap();
        assert_eq!(settings, Settings::default());
        assert!(settings.flags("example.com.").auto_reload);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join("settings.json");

        let mut settings = Settings::default();
        settings.set_membership([("internal".to_string(), vec!["a.example.".to_string()])]);
        settings.zones.insert(
            "a.example.".into(),
            ZoneFlags {
                auto_reload: false,
                ..Default::default()
            },
        );
        settings.save(&path).unwrap();

        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded, settings);
        assert_eq!(loaded.view_of("a.example."), Some("internal"));
        assert!(!loaded.flags("a.example.").auto_reload);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_lenient_fields() {
        let settings: Settings = serde_json::from_str(r#"{"zones": {"a.": {"auto_generate_ptr": true}}}"#).unwrap();
        let flags = settings.flags("a.");
        assert!(flags.auto_generate_ptr);
        assert!(flags.backup_enabled);
        assert_eq!(settings.version, 1);
    }

    #[test]
    fn test_remove_zone() {
        let mut settings = Settings::default();
        settings.set_membership([
            ("internal".to_string(), vec!["a.".to_string(), "b.".to_string()]),
            ("guest".to_string(), vec!["c.".to_string()]),
        ]);
        settings.zones.insert("a.".into(), ZoneFlags::default());
        settings.remove_zone("a.");

        assert_eq!(settings.view_of("a."), None);
        assert_eq!(settings.views["internal"].zones, vec!["b."]);
        assert!(!settings.zones.contains_key("a."));
    }

    #[tokio::test]
    async fn test_store_update_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::open(&path).unwrap();

        store
            .update(|s| s.set_membership([("guest".to_string(), vec!["x.".to_string()])]))
            .await
            .unwrap();
        assert!(!path.with_extension("tmp").exists());

        let reopened = SettingsStore::open(&path).unwrap();
        assert_eq!(reopened.snapshot().view_of("x."), Some("guest"));
    }

    #[tokio::test]
    async fn test_store_unchanged_does_not_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::open(&path).unwrap();
        store.update(|_| {}).await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_store_concurrent_updates_are_serialized() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        let store = std::sync::Arc::new(SettingsStore::open(&path).unwrap());

        let mut tasks = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store
                    .update(|s| {
                        s.zones.insert(format!("z{i}."), ZoneFlags::default());
                    })
                    .await
                    .unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(store.snapshot().zones.len(), 8);
        assert_eq!(Settings::load(&path).unwrap().zones.len(), 8);
    }
}

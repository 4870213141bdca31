//! Paths every operation works against.

use std::path::{Path, PathBuf};

use zonewright_conf::config_name;
use zonewright_config::PathsConfig;

/// Directory holding slave zone files, relative to the zone directory.
pub const SLAVE_DIR: &str = "slaves";

/// Files and directories an operation may touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    /// Main configuration document.
    pub named_conf: PathBuf,
    /// Directory for zone master files.
    pub zone_dir: PathBuf,
}

impl Workspace {
    /// Creates a workspace.
    pub fn new(named_conf: impl Into<PathBuf>, zone_dir: impl Into<PathBuf>) -> Self {
        Self {
            named_conf: named_conf.into(),
            zone_dir: zone_dir.into(),
        }
    }

    /// Builds a workspace from the `paths` section.
    pub fn from_config(paths: &PathsConfig) -> Self {
        Self::new(&paths.named_conf, &paths.zone_dir)
    }

    /// Resolves a `file` path from the document. Relative paths are taken
    /// relative to the zone directory.
    pub fn resolve(&self, file: &Path) -> PathBuf {
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.zone_dir.join(file)
        }
    }

    /// Default master file for a zone.
    pub fn master_file(&self, zone: &str) -> PathBuf {
        self.zone_dir.join(format!("{}.zone", config_name(zone)))
    }

    /// Default file for a slave zone's transferred data.
    pub fn slave_file(&self, zone: &str) -> PathBuf {
        self.zone_dir.join(SLAVE_DIR).join(format!("{}.zone", config_name(zone)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_layout() {
        let ws = Workspace::new("/etc/bind/named.conf", "/var/named");
        assert_eq!(ws.master_file("example.com."), PathBuf::from("/var/named/example.com.zone"));
        assert_eq!(ws.slave_file("b.example."), PathBuf::from("/var/named/slaves/b.example.zone"));
    }

    #[test]
    fn test_resolve() {
        let ws = Workspace::new("/etc/bind/named.conf", "/var/named");
        assert_eq!(ws.resolve(Path::new("db.local")), PathBuf::from("/var/named/db.local"));
        assert_eq!(ws.resolve(Path::new("/srv/db.x")), PathBuf::from("/srv/db.x"));
    }
}

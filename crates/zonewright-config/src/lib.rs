//! # Zonewright Configuration
//!
//! YAML-based configuration for the zonewright tool, plus the JSON settings
//! store that keeps view membership and per-zone flags.
//!
//! ## Design Philosophy
//!
//! - **Sensible defaults**: an empty file describes a stock BIND layout
//! - **Type-safe**: every section is a typed struct with `validate()`
//! - **Flexible**: YAML, JSON and TOML are accepted, chosen by extension

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub mod settings;

pub use settings::{Settings, SettingsStore, ViewEntry, ZoneFlags};

/// Configuration error.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("File not found: {0}")]
    NotFound(PathBuf),
}

impl ConfigError {
    fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// File name looked up in the working directory.
pub const LOCAL_CONFIG: &str = "zonewright.yaml";

/// System-wide configuration path.
pub const SYSTEM_CONFIG: &str = "/etc/zonewright/config.yaml";

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Files and directories the tool works on.
    pub paths: PathsConfig,

    /// External validator and reload commands.
    pub commands: CommandsConfig,

    /// Values for generated zone files.
    pub defaults: DefaultsConfig,

    /// Backup retention.
    pub backups: BackupsConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Config {
    /// Loads configuration from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)?;

        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            Some("json") => serde_json::from_str(&content)?,
            Some("toml") => toml::from_str(&content)?,
            _ => serde_yaml::from_str(&content)?,
        };

        Ok(config)
    }

    /// Loads configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Finds and loads the configuration.
    ///
    /// An explicit path must exist. Otherwise the first existing file among
    /// [`Config::search_paths`] is used, and the built-in defaults apply when
    /// there is none. Returns the file that was loaded, if any.
    pub fn discover(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            return Ok((Self::from_file(path)?, Some(path.to_path_buf())));
        }

        for candidate in Self::search_paths() {
            if candidate.is_file() {
                debug!(path = %candidate.display(), "loading configuration");
                return Ok((Self::from_file(&candidate)?, Some(candidate)));
            }
        }

        debug!("no configuration file found, using defaults");
        Ok((Self::default(), None))
    }

    /// Configuration files tried by [`Config::discover`], in order.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG), PathBuf::from(SYSTEM_CONFIG)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("zonewright").join("config.yaml"));
        }
        paths
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        self.paths.validate()?;
        self.commands.validate()?;
        self.defaults.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Serializes to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Paths configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Main name-server configuration file.
    pub named_conf: PathBuf,

    /// Directory holding zone master files.
    pub zone_dir: PathBuf,

    /// JSON settings store.
    pub settings_file: PathBuf,

    /// Backup directory. Backups sit next to their target when unset.
    pub backup_dir: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            named_conf: PathBuf::from("/etc/bind/named.conf"),
            zone_dir: PathBuf::from("/etc/bind/zones"),
            settings_file: PathBuf::from("/var/lib/zonewright/settings.json"),
            backup_dir: None,
        }
    }
}

impl PathsConfig {
    fn validate(&self) -> Result<()> {
        for (field, path) in [
            ("paths.named_conf", &self.named_conf),
            ("paths.zone_dir", &self.zone_dir),
            ("paths.settings_file", &self.settings_file),
        ] {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::invalid(field, "must not be empty"));
            }
        }
        Ok(())
    }
}

/// External command configuration.
///
/// Commands are argv lists. `{path}` and `{zone}` are substituted; a check
/// command without `{path}` gets the candidate path appended. An empty list
/// disables the step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    /// Configuration syntax check.
    pub check_conf: Vec<String>,

    /// Zone file check.
    pub check_zone: Vec<String>,

    /// Reload after a configuration change.
    pub reload: Vec<String>,

    /// Reload of a single zone after a record edit.
    pub reload_zone: Vec<String>,

    /// Time limit for each command.
    pub timeout_secs: u64,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            check_conf: vec!["named-checkconf".to_string()],
            check_zone: argv(&["named-checkzone", "{zone}", "{path}"]),
            reload: argv(&["rndc", "reconfig"]),
            reload_zone: argv(&["rndc", "reload", "{zone}"]),
            timeout_secs: 30,
        }
    }
}

impl CommandsConfig {
    fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::invalid("commands.timeout_secs", "must be greater than 0"));
        }
        for (field, cmd) in [
            ("commands.check_conf", &self.check_conf),
            ("commands.check_zone", &self.check_zone),
            ("commands.reload", &self.reload),
            ("commands.reload_zone", &self.reload_zone),
        ] {
            if cmd.first().is_some_and(|program| program.trim().is_empty()) {
                return Err(ConfigError::invalid(field, "program name is empty"));
            }
        }
        Ok(())
    }
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

/// Values used when generating zone files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// `$TTL` of generated zones.
    pub ttl: u32,

    /// SOA refresh.
    pub refresh: u32,

    /// SOA retry.
    pub retry: u32,

    /// SOA expire.
    pub expire: u32,

    /// SOA minimum.
    pub minimum: u32,

    /// SOA mailbox.
    pub hostmaster: String,

    /// First label of the zone's name server.
    pub nameserver_prefix: String,

    /// Address for generated A and glue records.
    pub default_ip: Ipv4Addr,

    /// Domain for generated PTR targets.
    pub ptr_domain: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            ttl: 86_400,
            refresh: 3_600,
            retry: 1_800,
            expire: 604_800,
            minimum: 86_400,
            hostmaster: "hostmaster".to_string(),
            nameserver_prefix: "ns1".to_string(),
            default_ip: Ipv4Addr::LOCALHOST,
            ptr_domain: "localdomain".to_string(),
        }
    }
}

impl DefaultsConfig {
    fn validate(&self) -> Result<()> {
        if self.ttl == 0 {
            return Err(ConfigError::invalid("defaults.ttl", "must be greater than 0"));
        }
        if self.retry > self.refresh {
            return Err(ConfigError::invalid("defaults.retry", "should not exceed refresh"));
        }
        if self.hostmaster.trim().is_empty() {
            return Err(ConfigError::invalid("defaults.hostmaster", "must not be empty"));
        }
        let prefix = self.nameserver_prefix.trim();
        if prefix.is_empty() || prefix.contains(char::is_whitespace) {
            return Err(ConfigError::invalid(
                "defaults.nameserver_prefix",
                format!("'{prefix}' is not a valid label"),
            ));
        }
        Ok(())
    }
}

/// Backup configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupsConfig {
    /// Keep a backup of every replaced file.
    pub enabled: bool,

    /// Backups kept per file (0 keeps all).
    pub keep: usize,
}

impl Default for BackupsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            keep: 10,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or filter directive.
    pub level: String,

    /// Log format (text, json).
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl LoggingConfig {
    fn validate(&self) -> Result<()> {
        if self.level.trim().is_empty() {
            return Err(ConfigError::invalid("logging.level", "must not be empty"));
        }
        match self.format.as_str() {
            "text" | "json" => Ok(()),
            other => Err(ConfigError::invalid(
                "logging.format",
                format!("'{other}' is not one of text, json"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.defaults.nameserver_prefix, "ns1");
        assert!(config.backups.enabled);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = Config::default();
        let yaml = config.to_yaml().unwrap();
        let parsed = Config::from_yaml(&yaml).unwrap();
        assert_eq!(config.paths.named_conf, parsed.paths.named_conf);
        assert_eq!(config.commands.check_zone, parsed.commands.check_zone);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config = Config::from_yaml(
            "paths:\n  named_conf: /srv/named.conf\ncommands:\n  reload: []\nbackups:\n  keep: 3\n",
        )
        .unwrap();
        assert_eq!(config.paths.named_conf, PathBuf::from("/srv/named.conf"));
        assert_eq!(config.paths.zone_dir, PathBuf::from("/etc/bind/zones"));
        assert!(config.commands.reload.is_empty());
        assert_eq!(config.commands.check_conf, vec!["named-checkconf"]);
        assert_eq!(config.backups.keep, 3);
        assert!(config.backups.enabled);
    }

    #[test]
    fn test_validation_errors() {
        let mut config = Config::default();
        config.commands.timeout_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { .. })));

        let mut config = Config::default();
        config.logging.format = "xml".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.defaults.nameserver_prefix = " ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_by_extension() {
        let dir = TempDir::new().unwrap();

        let json = dir.path().join("c.json");
        std::fs::write(&json, r#"{"defaults": {"ttl": 300}}"#).unwrap();
        assert_eq!(Config::from_file(&json).unwrap().defaults.ttl, 300);

        let toml = dir.path().join("c.toml");
        std::fs::write(&toml, "[logging]\nformat = \"json\"\n").unwrap();
        assert_eq!(Config::from_file(&toml).unwrap().logging.format, "json");

        assert!(matches!(
            Config::from_file(dir.path().join("missing.yaml")),
            Err(ConfigError::NotFound(_))
        ));
    }

    #[test]
    fn test_discover_explicit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("zw.yaml");
        std::fs::write(&path, "defaults:\n  default_ip: 192.0.2.53\n").unwrap();

        let (config, used) = Config::discover(Some(&path)).unwrap();
        assert_eq!(used.as_deref(), Some(path.as_path()));
        assert_eq!(config.defaults.default_ip, Ipv4Addr::new(192, 0, 2, 53));
    }

    #[test]
    fn test_search_order() {
        let paths = Config::search_paths();
        assert_eq!(paths[0], PathBuf::from(LOCAL_CONFIG));
        assert_eq!(paths[1], PathBuf::from(SYSTEM_CONFIG));
    }
}

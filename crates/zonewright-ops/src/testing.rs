//! Shared fixtures for operation tests.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tempfile::TempDir;
use zonewright_commit::{CheckError, CheckSubject, Checker};
use zonewright_config::SettingsStore;

use crate::workspace::Workspace;
use crate::zones::ZoneOps;

pub(crate) const NAMED_CONF: &str = r#"options {
    directory "/var/named";
};

view "internal" {
    match-clients { 10.0.0.0/8; };
    zone "corp.example" {
        type master;
        file "corp.example.zone";
    };
};
"#;

#[derive(Default)]
pub(crate) struct FakeChecker {
    pub reject: AtomicBool,
    pub fail_apply: AtomicBool,
    pub applied: AtomicUsize,
}

impl FakeChecker {
    pub fn reject(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }
}

#[async_trait]
impl Checker for FakeChecker {
    async fn validate(&self, subject: &CheckSubject<'_>) -> Result<(), CheckError> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(CheckError::Rejected {
                command: "fake-check".into(),
                status: Some(1),
                diagnostic: format!("{}: rejected", subject.path.display()),
            });
        }
        Ok(())
    }

    async fn apply(&self, _subject: &CheckSubject<'_>) -> Result<(), CheckError> {
        if self.fail_apply.load(Ordering::SeqCst) {
            return Err(CheckError::Rejected {
                command: "fake-reload".into(),
                status: Some(1),
                diagnostic: "server refused".into(),
            });
        }
        self.applied.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub(crate) struct Fixture {
    pub dir: TempDir,
    pub conf: Arc<FakeChecker>,
    pub zone: Arc<FakeChecker>,
    pub ops: ZoneOps,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let zone_dir = dir.path().join("zones");
        std::fs::create_dir_all(&zone_dir).unwrap();
        std::fs::write(dir.path().join("named.conf"), NAMED_CONF).unwrap();
        std::fs::write(
            zone_dir.join("corp.example.zone"),
            "$TTL 3600\n@ IN SOA ns1.corp.example. hostmaster.corp.example. (\n    2024010101 ; Serial\n    3600 )\n@ IN NS ns1.corp.example.\nns1 IN A 10.0.0.1\n",
        )
        .unwrap();

        let conf = Arc::new(FakeChecker::default());
        let zone = Arc::new(FakeChecker::default());
        let settings = SettingsStore::open(dir.path().join("settings.json")).unwrap();
        let ops = ZoneOps::new(
            Workspace::new(dir.path().join("named.conf"), zone_dir),
            conf.clone(),
            zone.clone(),
            settings,
        );

        Self { dir, conf, zone, ops }
    }

    pub fn named_conf(&self) -> String {
        std::fs::read_to_string(self.dir.path().join("named.conf")).unwrap()
    }

    /// Appends statements to the document, as an administrator would.
    pub fn append_named_conf(&self, extra: &str) {
        let text = format!("{}{extra}", self.named_conf());
        std::fs::write(self.dir.path().join("named.conf"), text).unwrap();
    }

    pub fn zone_path(&self, file: &str) -> PathBuf {
        self.dir.path().join("zones").join(file)
    }
}

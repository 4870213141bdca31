//! End-to-end tests for zonewright.
//!
//! These tests cover:
//! - the `zonewright` binary against a scratch configuration tree, with
//!   shell commands standing in for the name-server checkers
//! - rejected validation and failed reloads leaving live files untouched
//! - concurrent record edits through one shared operations handle

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tempfile::TempDir;

use zonewright_commit::{CheckError, CheckSubject, Checker};
use zonewright_config::SettingsStore;
use zonewright_ops::{CreateZone, Workspace, ZoneOps};
use zonewright_zone::{RecordType, ResourceRecord, initial_serial};

// ============================================================================
// Test Helpers
// ============================================================================

const NAMED_CONF: &str = r#"// managed by zonewright
acl "trusted" { 10.0.0.0/8; };

view "internal" {
    match-clients { trusted; };
    zone "corp.example" {
        type master;
        file "corp.example.zone";
    };
};
"#;

const CORP_ZONE: &str = "$TTL 3600
@   IN SOA ns1.corp.example. hostmaster.corp.example. (
        2024060101 ; Serial
        3600       ; Refresh
        1800       ; Retry
        604800     ; Expire
        86400 )    ; Minimum
@   IN NS  ns1.corp.example.
ns1 IN A   10.0.0.1
";

/// A scratch configuration tree.
struct Tree {
    dir: TempDir,
}

impl Tree {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("zones")).unwrap();
        std::fs::write(dir.path().join("named.conf"), NAMED_CONF).unwrap();
        std::fs::write(dir.path().join("zones/corp.example.zone"), CORP_ZONE).unwrap();
        Self { dir }
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    fn read(&self, rel: &str) -> String {
        std::fs::read_to_string(self.path(rel)).unwrap()
    }

    /// Writes a config file using the given check and reload commands.
    fn config(&self, check_conf: &[&str], reload: &[&str]) -> PathBuf {
        let yaml = format!(
            "paths:
  named_conf: {conf}
  zone_dir: {zones}
  settings_file: {settings}
commands:
  check_conf: {check_conf:?}
  check_zone: [\"true\"]
  reload: {reload:?}
  reload_zone: []
  timeout_secs: 10
backups:
  keep: 2
logging:
  level: error
",
            conf = self.path("named.conf").display(),
            zones = self.path("zones").display(),
            settings = self.path("state/settings.json").display(),
        );
        let path = self.path("zonewright.yaml");
        std::fs::write(&path, yaml).unwrap();
        path
    }

    fn run(&self, config: &Path, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_zonewright"))
            .arg("--config")
            .arg(config)
            .arg("--json")
            .args(args)
            .env_remove("RUST_LOG")
            .output()
            .unwrap()
    }
}

fn json(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

#[derive(Default)]
struct CountingChecker {
    validations: AtomicUsize,
}

#[async_trait]
impl Checker for CountingChecker {
    async fn validate(&self, _subject: &CheckSubject<'_>) -> Result<(), CheckError> {
        self.validations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn apply(&self, _subject: &CheckSubject<'_>) -> Result<(), CheckError> {
        Ok(())
    }
}

// ============================================================================
// Binary
// ============================================================================

#[test]
fn test_create_zone_at_top_level() {
    let tree = Tree::new();
    let config = tree.config(&["true"], &[]);

    let created = json(&tree.run(&config, &["zone", "create", "example.com"]));
    assert_eq!(created["zone"]["name"], "example.com.");
    assert!(created["zone"]["view"].is_null());
    assert_eq!(created["serial"], initial_serial());

    let zone_file = tree.read("zones/example.com.zone");
    assert!(zone_file.contains("ns1.example.com."));
    assert!(tree.read("named.conf").contains("zone \"example.com\" {"));

    let zones = json(&tree.run(&config, &["zone", "list"]));
    let names: Vec<_> = zones.as_array().unwrap().iter().map(|z| z["name"].clone()).collect();
    assert_eq!(names, vec!["corp.example.", "example.com."]);
}

#[test]
fn test_move_zone_into_new_view() {
    let tree = Tree::new();
    let config = tree.config(&["true"], &[]);

    let moved = json(&tree.run(
        &config,
        &["zone", "move", "corp.example", "--view", "guest", "--access", "192.168.0.0/16"],
    ));
    assert_eq!(moved["from"], "internal");
    assert_eq!(moved["to"], "guest");
    assert_eq!(moved["created_view"], true);

    let views = json(&tree.run(&config, &["view", "list"]));
    let views = views.as_array().unwrap();
    let internal = views.iter().find(|v| v["name"] == "internal").unwrap();
    let guest = views.iter().find(|v| v["name"] == "guest").unwrap();
    assert!(internal["zones"].as_array().unwrap().is_empty());
    assert_eq!(guest["zones"][0], "corp.example.");
    assert_eq!(guest["access"]["allow"][0], "192.168.0.0/16");

    let settings: serde_json::Value = serde_json::from_str(&tree.read("state/settings.json")).unwrap();
    assert_eq!(settings["views"]["guest"]["zones"][0], "corp.example.");
}

#[test]
fn test_record_edits_bump_serial() {
    let tree = Tree::new();
    let config = tree.config(&["true"], &[]);

    for (i, host) in ["a", "b", "c"].into_iter().enumerate() {
        let ip = format!("10.0.1.{}", i + 1);
        let change = json(&tree.run(&config, &["record", "add", "corp.example", host, "A", &ip]));
        assert_eq!(change["serial"], 2024060101 + i as u64 + 1);
    }
    let change = json(&tree.run(&config, &["record", "delete", "corp.example", "b", "A"]));
    assert_eq!(change["serial"], 2024060105_u64);

    let records = json(&tree.run(&config, &["record", "list", "corp.example"]));
    let names: Vec<_> = records
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["@", "ns1", "a", "c"]);

    let status = json(&tree.run(&config, &["zone", "status", "corp.example"]));
    assert_eq!(status[0]["serial"], 2024060105_u64);
    assert_eq!(status[0]["records"], 4);
}

#[test]
fn test_rejected_validation_leaves_document_identical() {
    let tree = Tree::new();
    let config = tree.config(&["sh", "-c", "echo 'unknown option' >&2; exit 1"], &[]);

    let output = tree.run(&config, &["zone", "create", "example.net", "--view", "internal"]);
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    let error: serde_json::Value = serde_json::from_str(stderr.lines().last().unwrap()).unwrap();
    assert_eq!(error["success"], false);
    assert!(error["error"].as_str().unwrap().contains("unknown option"));

    assert_eq!(tree.read("named.conf"), NAMED_CONF);
    assert!(!tree.path("zones/example.net.zone").exists());
    assert!(!tree.path("state/settings.json").exists());
}

#[test]
fn test_failed_reload_rolls_back() {
    let tree = Tree::new();
    let config = tree.config(&["true"], &["sh", "-c", "echo 'reload refused' >&2; exit 1"]);

    let output = tree.run(&config, &["view", "create", "lab", "--access", "10.9.0.0/16"]);
    assert!(!output.status.success());
    assert_eq!(tree.read("named.conf"), NAMED_CONF);

    let output = tree.run(&config, &["--no-reload", "view", "create", "lab", "--access", "10.9.0.0/16"]);
    json(&output);
    assert!(tree.read("named.conf").contains("view \"lab\""));
}

#[test]
fn test_view_delete_requires_force() {
    let tree = Tree::new();
    let config = tree.config(&["true"], &[]);

    let output = tree.run(&config, &["view", "delete", "internal"]);
    assert!(!output.status.success());
    assert_eq!(tree.read("named.conf"), NAMED_CONF);

    let deleted = json(&tree.run(&config, &["view", "delete", "internal", "--force"]));
    assert_eq!(deleted["dropped_zones"][0], "corp.example.");
    assert!(!tree.read("named.conf").contains("view \"internal\""));
}

#[test]
fn test_generate_prints_reverse_sweep() {
    let tree = Tree::new();
    let config = tree.config(&["true"], &[]);

    let output = tree.run(&config, &["generate", "2.0.192.in-addr.arpa", "--ptr"]);
    assert!(output.status.success());
    let text = String::from_utf8(output.stdout).unwrap();
    assert_eq!(text.lines().filter(|l| l.contains("IN PTR")).count(), 254);
    assert!(!tree.path("zones/2.0.192.in-addr.arpa.zone").exists());
}

// ============================================================================
// Library
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_record_edits() {
    let tree = Tree::new();
    let checker = Arc::new(CountingChecker::default());
    let ops = Arc::new(
        ZoneOps::new(
            Workspace::new(tree.path("named.conf"), tree.path("zones")),
            checker.clone(),
            checker.clone(),
            SettingsStore::open(tree.path("settings.json")).unwrap(),
        )
        .with_reload(false),
    );

    ops.create_zone(CreateZone {
        name: "edits.example".into(),
        view: Some("internal".into()),
        ..Default::default()
    })
    .await
    .unwrap();

    let mut tasks = Vec::new();
    for i in 0..16u8 {
        let ops = ops.clone();
        tasks.push(tokio::spawn(async move {
            let record = ResourceRecord::new(format!("h{i}"), RecordType::A, format!("10.1.0.{i}"));
            ops.add_record("edits.example", &record).await.unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let records = ops.list_records("edits.example").await.unwrap();
    assert_eq!(records.iter().filter(|r| r.name.starts_with('h')).count(), 16);

    let status = ops.zone_status(&["edits.example".to_string()]).await.unwrap();
    assert_eq!(status[0].serial, Some(initial_serial() + 16));
    assert_eq!(status[0].view.as_deref(), Some("internal"));
    assert!(checker.validations.load(Ordering::SeqCst) >= 18);
}

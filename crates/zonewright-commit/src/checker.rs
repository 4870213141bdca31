//! External validation and reload.
//!
//! The pipeline never decides on its own whether a candidate is acceptable.
//! It asks a [`Checker`], which in production shells out to the name
//! server's tooling (`named-checkconf`, `named-checkzone`, `rndc reload`)
//! and in tests is replaced by an in-process fake.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

/// Default time limit for one external command.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// What a checker is asked about.
#[derive(Debug, Clone, Copy)]
pub struct CheckSubject<'a> {
    /// File to check, or the live file being applied.
    pub path: &'a Path,
    /// Zone name for zone-file checks and per-zone reloads.
    pub zone: Option<&'a str>,
}

impl<'a> CheckSubject<'a> {
    /// Creates a subject for a configuration file.
    pub fn file(path: &'a Path) -> Self {
        Self { path, zone: None }
    }

    /// Creates a subject for a zone master file.
    pub fn zone(path: &'a Path, zone: &'a str) -> Self {
        Self {
            path,
            zone: Some(zone),
        }
    }
}

/// Errors reported by a checker.
#[derive(Debug, Error)]
pub enum CheckError {
    /// The command ran and reported failure.
    #[error("{command} exited with status {code}: {diagnostic}", code = .status.map_or_else(|| "signal".to_string(), |c| c.to_string()))]
    Rejected {
        /// Command line that was run.
        command: String,
        /// Exit code, `None` if killed by a signal.
        status: Option<i32>,
        /// Combined stdout and stderr, verbatim.
        diagnostic: String,
    },

    /// The command did not finish in time and was killed.
    #[error("{command} timed out after {timeout:?}")]
    Timeout {
        /// Command line that was run.
        command: String,
        /// Limit that was exceeded.
        timeout: Duration,
    },

    /// The command could not be started.
    #[error("failed to run {command}: {source}")]
    Spawn {
        /// Command line that was attempted.
        command: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl CheckError {
    /// Returns the diagnostic text to show an operator.
    pub fn diagnostic(&self) -> String {
        match self {
            Self::Rejected { diagnostic, .. } => diagnostic.clone(),
            other => other.to_string(),
        }
    }
}

/// Validates candidate files and applies committed ones.
#[async_trait]
pub trait Checker: Send + Sync {
    /// Checks a candidate file. `Ok` means acceptable.
    async fn validate(&self, subject: &CheckSubject<'_>) -> Result<(), CheckError>;

    /// Asks the running server to pick up a committed file.
    async fn apply(&self, subject: &CheckSubject<'_>) -> Result<(), CheckError>;
}

/// Checker backed by external commands.
///
/// Command templates are argv vectors. `{path}` and `{zone}` are replaced by
/// the subject's path and zone name; if the check template has no `{path}`
/// the path is appended. An empty template means "not configured": checks
/// pass and applies are skipped.
#[derive(Debug, Clone)]
pub struct CommandChecker {
    check: Vec<String>,
    reload: Vec<String>,
    timeout: Duration,
}

impl CommandChecker {
    /// Creates a checker with the given check command and no reload.
    pub fn new(check: Vec<String>) -> Self {
        Self {
            check,
            reload: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the reload command.
    pub fn with_reload(mut self, reload: Vec<String>) -> Self {
        self.reload = reload;
        self
    }

    /// Sets the per-command time limit.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn render(template: &[String], subject: &CheckSubject<'_>, append_path: bool) -> Vec<String> {
        let path = subject.path.display().to_string();
        let zone = subject.zone.unwrap_or_default();
        let mut saw_path = false;

        let mut argv: Vec<String> = template
            .iter()
            .map(|arg| {
                saw_path |= arg.contains("{path}");
                arg.replace("{path}", &path).replace("{zone}", zone)
            })
            .collect();

        if append_path && !saw_path {
            argv.push(path);
        }
        argv
    }
}

#[async_trait]
impl Checker for CommandChecker {
    async fn validate(&self, subject: &CheckSubject<'_>) -> Result<(), CheckError> {
        if self.check.is_empty() {
            warn!(path = %subject.path.display(), "no validator configured, accepting candidate");
            return Ok(());
        }
        run_command(&Self::render(&self.check, subject, true), self.timeout).await
    }

    async fn apply(&self, subject: &CheckSubject<'_>) -> Result<(), CheckError> {
        if self.reload.is_empty() {
            debug!("no reload command configured");
            return Ok(());
        }
        run_command(&Self::render(&self.reload, subject, false), self.timeout).await
    }
}

/// Runs a command to completion under a time limit.
///
/// The child is killed if the limit is reached.
pub async fn run_command(argv: &[String], timeout: Duration) -> Result<(), CheckError> {
    let command = argv.join(" ");
    let Some((program, args)) = argv.split_first() else {
        return Ok(());
    };

    debug!(%command, "running external command");
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| CheckError::Timeout {
            command: command.clone(),
            timeout,
        })?
        .map_err(|source| CheckError::Spawn {
            command: command.clone(),
            source,
        })?;

    if output.status.success() {
        return Ok(());
    }

    let diagnostic = [&output.stdout, &output.stderr]
        .iter()
        .map(|bytes| String::from_utf8_lossy(bytes).trim().to_string())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    Err(CheckError::Rejected {
        command,
        status: output.status.code(),
        diagnostic,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_render_appends_path() {
        let path = PathBuf::from("/etc/named.conf.tmp.1");
        let subject = CheckSubject::file(&path);
        assert_eq!(
            CommandChecker::render(&argv(&["named-checkconf"]), &subject, true),
            argv(&["named-checkconf", "/etc/named.conf.tmp.1"])
        );
    }

    #[test]
    fn test_render_substitutes_placeholders() {
        let path = PathBuf::from("/var/named/example.com.zone");
        let subject = CheckSubject::zone(&path, "example.com.");
        assert_eq!(
            CommandChecker::render(&argv(&["named-checkzone", "{zone}", "{path}"]), &subject, true),
            argv(&["named-checkzone", "example.com.", "/var/named/example.com.zone"])
        );
        assert_eq!(
            CommandChecker::render(&argv(&["rndc", "reload", "{zone}"]), &subject, false),
            argv(&["rndc", "reload", "example.com."])
        );
    }

    #[tokio::test]
    async fn test_unconfigured_checker_accepts() {
        let checker = CommandChecker::new(Vec::new());
        let path = PathBuf::from("/nonexistent");
        checker.validate(&CheckSubject::file(&path)).await.unwrap();
        checker.apply(&CheckSubject::file(&path)).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_rejection_carries_diagnostic() {
        let err = run_command(
            &argv(&["sh", "-c", "echo 'line 3: unknown option' >&2; exit 1"]),
            DEFAULT_TIMEOUT,
        )
        .await
        .unwrap_err();

        match err {
            CheckError::Rejected { status, diagnostic, .. } => {
                assert_eq!(status, Some(1));
                assert_eq!(diagnostic, "line 3: unknown option");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_command() {
        let err = run_command(&argv(&["sleep", "5"]), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let err = run_command(&argv(&["/definitely/not/a/program"]), DEFAULT_TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckError::Spawn { .. }));
    }
}

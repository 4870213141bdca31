//! The validate-backup-rename-apply sequence.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, error, info, instrument, warn};

use crate::checker::{CheckError, CheckSubject, Checker};
use crate::error::{CommitError, CommitStage, Result};
use crate::lock::FileLocks;

/// Where backups go and how many are kept.
#[derive(Debug, Clone, Default)]
pub struct BackupPolicy {
    /// Backup directory. `None` puts backups next to the target.
    pub dir: Option<PathBuf>,
    /// Backups kept per target. `0` keeps all of them.
    pub keep: usize,
}

/// Per-commit switches.
#[derive(Debug, Clone)]
pub struct CommitOptions {
    /// Run the checker's apply step after the rename.
    pub apply: bool,
    /// Keep a backup of the previous version.
    pub backup: bool,
    /// Zone name handed to the checker.
    pub zone: Option<String>,
}

impl Default for CommitOptions {
    fn default() -> Self {
        Self {
            apply: false,
            backup: true,
            zone: None,
        }
    }
}

impl CommitOptions {
    /// Options for a zone file commit.
    pub fn for_zone(zone: impl Into<String>) -> Self {
        Self {
            zone: Some(zone.into()),
            ..Self::default()
        }
    }

    /// Sets whether to apply after committing.
    pub fn apply(mut self, apply: bool) -> Self {
        self.apply = apply;
        self
    }

    /// Sets whether to keep a backup.
    pub fn backup(mut self, backup: bool) -> Self {
        self.backup = backup;
        self
    }
}

/// Outcome of a successful commit.
#[derive(Debug, Clone)]
pub struct CommitReport {
    /// Live file that was replaced.
    pub target: PathBuf,
    /// Backup of the previous version, if one was kept.
    pub backup: Option<PathBuf>,
    /// Whether the apply step ran.
    pub applied: bool,
    /// Always [`CommitStage::Committed`].
    pub stage: CommitStage,
}

/// Exclusive access to one target file.
///
/// Holding the guard across read, edit and commit keeps concurrent
/// operations on the same file from interleaving.
#[derive(Debug)]
pub struct TargetGuard {
    path: PathBuf,
    _guard: OwnedMutexGuard<()>,
}

impl TargetGuard {
    /// Locked file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the live file.
    pub async fn read(&self) -> Result<String> {
        fs::read_to_string(&self.path)
            .await
            .map_err(|e| CommitError::io(CommitStage::Draft, &self.path, e))
    }

    /// Reads the live file, `None` if it does not exist.
    pub async fn read_optional(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CommitError::io(CommitStage::Draft, &self.path, e)),
        }
    }

    /// Returns true if the live file exists.
    pub async fn exists(&self) -> bool {
        fs::try_exists(&self.path).await.unwrap_or(false)
    }
}

/// Commits candidate text to live files.
///
/// Every commit goes through the same stages: write a temporary sibling,
/// validate it, copy the live file aside, rename the temporary over the live
/// file, and optionally apply. A rejected candidate never reaches the live
/// path, and a failed apply restores the previous version.
#[derive(Clone)]
pub struct CommitPipeline {
    checker: Arc<dyn Checker>,
    locks: Arc<FileLocks>,
    backups: BackupPolicy,
}

impl std::fmt::Debug for CommitPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitPipeline")
            .field("locks", &self.locks.len())
            .field("backups", &self.backups)
            .finish_non_exhaustive()
    }
}

impl CommitPipeline {
    /// Creates a pipeline with its own lock registry.
    pub fn new(checker: Arc<dyn Checker>) -> Self {
        Self {
            checker,
            locks: Arc::new(FileLocks::new()),
            backups: BackupPolicy::default(),
        }
    }

    /// Sets the backup policy.
    pub fn with_backups(mut self, backups: BackupPolicy) -> Self {
        self.backups = backups;
        self
    }

    /// Creates a pipeline that uses another checker but shares this one's
    /// locks and backup policy.
    pub fn with_checker(&self, checker: Arc<dyn Checker>) -> Self {
        Self {
            checker,
            locks: Arc::clone(&self.locks),
            backups: self.backups.clone(),
        }
    }

    /// Backup policy in use.
    pub fn backups(&self) -> &BackupPolicy {
        &self.backups
    }

    /// Waits for exclusive access to `target`.
    pub async fn lock(&self, target: impl AsRef<Path>) -> TargetGuard {
        let path = target.as_ref().to_path_buf();
        let guard = self.locks.acquire(&path).await;
        TargetGuard {
            path,
            _guard: guard,
        }
    }

    /// Runs the checker's validation against the live file without changing
    /// anything.
    pub async fn check_live(&self, guard: &TargetGuard, zone: Option<&str>) -> Result<()> {
        let subject = CheckSubject {
            path: guard.path(),
            zone,
        };
        self.checker
            .validate(&subject)
            .await
            .map_err(|err| rejected(guard.path(), err))
    }

    /// Replaces the live file with `candidate`.
    #[instrument(skip(self, guard, candidate), fields(target = %guard.path().display()))]
    pub async fn commit(
        &self,
        guard: &TargetGuard,
        candidate: &str,
        options: &CommitOptions,
    ) -> Result<CommitReport> {
        let target = guard.path();
        let stamp = timestamp();
        let temp = unique_path(sibling(target, &format!("tmp.{stamp}"))).await;

        write_synced(&temp, candidate, target)
            .await
            .map_err(|e| CommitError::io(CommitStage::Draft, &temp, e))?;
        debug!(temp = %temp.display(), "candidate written");

        let subject = CheckSubject {
            path: &temp,
            zone: options.zone.as_deref(),
        };
        if let Err(err) = self.checker.validate(&subject).await {
            discard(&temp).await;
            warn!(error = %err, "candidate rejected");
            return Err(rejected(target, err));
        }

        // A rollback needs the previous version even if backups are off.
        let existed = guard.exists().await;
        let backup = if existed && (options.backup || options.apply) {
            match self.copy_aside(target, &stamp).await {
                Ok(path) => Some(path),
                Err(err) => {
                    discard(&temp).await;
                    return Err(err);
                }
            }
        } else {
            None
        };

        if let Err(e) = fs::rename(&temp, target).await {
            discard(&temp).await;
            if let Some(path) = &backup {
                if !options.backup {
                    discard(path).await;
                }
            }
            return Err(CommitError::io(CommitStage::BackedUp, target, e));
        }
        info!(backup = ?backup, "committed");

        let mut applied = false;
        if options.apply {
            let subject = CheckSubject {
                path: target,
                zone: options.zone.as_deref(),
            };
            if let Err(err) = self.checker.apply(&subject).await {
                return Err(self.roll_back(target, backup.as_deref(), err).await);
            }
            applied = true;
        }

        let backup = match backup {
            Some(path) if !options.backup => {
                discard(&path).await;
                None
            }
            other => other,
        };
        self.prune(target).await;

        Ok(CommitReport {
            target: target.to_path_buf(),
            backup,
            applied,
            stage: CommitStage::Committed,
        })
    }

    /// Removes the live file, optionally keeping a backup.
    ///
    /// Returns the backup path. Missing files are not an error.
    #[instrument(skip(self, guard), fields(target = %guard.path().display()))]
    pub async fn remove(&self, guard: &TargetGuard, backup: bool) -> Result<Option<PathBuf>> {
        let target = guard.path();
        if !guard.exists().await {
            return Ok(None);
        }

        let saved = if backup {
            Some(self.copy_aside(target, &timestamp()).await?)
        } else {
            None
        };

        fs::remove_file(target)
            .await
            .map_err(|e| CommitError::io(CommitStage::BackedUp, target, e))?;
        info!(backup = ?saved, "removed");
        Ok(saved)
    }

    /// Puts a backup back in place of the live file.
    pub async fn restore(&self, guard: &TargetGuard, backup: &Path) -> Result<()> {
        restore_copy(backup, guard.path())
            .await
            .map_err(|e| CommitError::io(CommitStage::Failed, guard.path(), e))?;
        info!(target = %guard.path().display(), from = %backup.display(), "restored");
        Ok(())
    }

    /// Lists backups of `target`, oldest first.
    pub async fn list_backups(&self, target: &Path) -> Result<Vec<PathBuf>> {
        let dir = self.backup_dir(target);
        let prefix = backup_prefix(target);

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CommitError::io(CommitStage::Committed, &dir, e)),
        };

        let mut found = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CommitError::io(CommitStage::Committed, &dir, e))?
        {
            if entry.file_name().to_string_lossy().starts_with(&prefix) {
                found.push(entry.path());
            }
        }
        found.sort();
        Ok(found)
    }

    async fn copy_aside(&self, target: &Path, stamp: &str) -> Result<PathBuf> {
        let dir = self.backup_dir(target);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| CommitError::io(CommitStage::Validated, &dir, e))?;

        let path = unique_path(dir.join(format!("{}{stamp}", backup_prefix(target)))).await;
        fs::copy(target, &path)
            .await
            .map_err(|e| CommitError::io(CommitStage::Validated, target, e))?;
        debug!(backup = %path.display(), "backed up");
        Ok(path)
    }

    async fn roll_back(&self, target: &Path, backup: Option<&Path>, err: CheckError) -> CommitError {
        let diagnostic = err.diagnostic();
        let result = match backup {
            Some(path) => restore_copy(path, target).await,
            None => fs::remove_file(target).await,
        };

        match result {
            Ok(()) => {
                warn!(target = %target.display(), "apply failed, rolled back");
                CommitError::ApplyFailed {
                    target: target.to_path_buf(),
                    diagnostic,
                    restored_from: backup.map(Path::to_path_buf),
                }
            }
            Err(rollback) => {
                error!(target = %target.display(), error = %rollback, "rollback failed");
                CommitError::RollbackFailed {
                    target: target.to_path_buf(),
                    diagnostic,
                    rollback,
                }
            }
        }
    }

    async fn prune(&self, target: &Path) {
        if self.backups.keep == 0 {
            return;
        }
        let backups = match self.list_backups(target).await {
            Ok(backups) => backups,
            Err(e) => {
                warn!(error = %e, "could not list backups");
                return;
            }
        };
        let excess = backups.len().saturating_sub(self.backups.keep);
        for old in &backups[..excess] {
            if let Err(e) = fs::remove_file(old).await {
                warn!(backup = %old.display(), error = %e, "could not prune backup");
            }
        }
    }

    fn backup_dir(&self, target: &Path) -> PathBuf {
        match &self.backups.dir {
            Some(dir) => dir.clone(),
            None => parent_dir(target),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn rejected(target: &Path, err: CheckError) -> CommitError {
    match err {
        CheckError::Rejected { diagnostic, .. } => CommitError::ValidationRejected {
            target: target.to_path_buf(),
            diagnostic,
        },
        other => CommitError::Validator {
            target: target.to_path_buf(),
            source: other,
        },
    }
}

fn timestamp() -> String {
    chrono::Local::now().format("%Y%m%d%H%M%S%6f").to_string()
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn sibling(target: &Path, suffix: &str) -> PathBuf {
    parent_dir(target).join(format!("{}.{suffix}", file_name(target)))
}

fn backup_prefix(target: &Path) -> String {
    format!("{}.backup.", file_name(target))
}

async fn unique_path(base: PathBuf) -> PathBuf {
    let mut candidate = base.clone();
    let mut n = 1;
    while fs::try_exists(&candidate).await.unwrap_or(false) {
        candidate = PathBuf::from(format!("{}.{n}", base.display()));
        n += 1;
    }
    candidate
}

/// Writes `content` to `path`, flushes it to disk, and copies the
/// permissions of `like` when it exists.
async fn write_synced(path: &Path, content: &str, like: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let mut file = fs::File::create(path).await?;
    file.write_all(content.as_bytes()).await?;
    file.sync_all().await?;
    drop(file);

    if let Ok(meta) = fs::metadata(like).await {
        fs::set_permissions(path, meta.permissions()).await?;
    }
    Ok(())
}

async fn restore_copy(backup: &Path, target: &Path) -> std::io::Result<()> {
    let temp = unique_path(sibling(target, &format!("restore.{}", timestamp()))).await;
    fs::copy(backup, &temp).await?;
    if let Err(e) = fs::rename(&temp, target).await {
        discard(&temp).await;
        return Err(e);
    }
    Ok(())
}

async fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "could not remove temporary file");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Best-effort compensating actions.
//!
//! A rollback point is a journal of reversible steps: an ordered list of
//! compensating commands plus file backups. Replaying it never stops on the
//! first failure; every failed step is reported and the rest still run.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::common::process::{CommandRunner, CommandSpec};
use crate::ui::prelude::*;

const POINT_FILE: &str = "point.toml";
const FILES_DIR: &str = "files";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileBackup {
    pub original: PathBuf,
    pub backup: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackPoint {
    pub id: String,
    pub package: String,
    pub operation: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub backup_files: Vec<FileBackup>,
    /// Compensating commands in registration order
    #[serde(default)]
    pub commands: Vec<String>,
}

impl RollbackPoint {
    pub fn is_empty(&self) -> bool {
        self.backup_files.is_empty() && self.commands.is_empty()
    }
}

/// What happened while replaying a rollback point
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackReport {
    pub commands_run: Vec<String>,
    pub files_restored: Vec<PathBuf>,
    pub failures: Vec<String>,
}

impl RollbackReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct RollbackManager {
    root: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl RollbackManager {
    pub fn new(root: impl Into<PathBuf>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            root: root.into(),
            runner,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn point_dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    /// Create and persist a new checkpoint.
    ///
    /// IDs are `<package>_<operation>_<unix seconds>`; a second checkpoint for
    /// the same package and operation within one second gets a numeric suffix.
    pub fn create_rollback_point(&self, package: &str, operation: &str) -> Result<RollbackPoint> {
        let created_at = Utc::now();
        let base = format!("{}_{}_{}", package, operation, created_at.timestamp());

        fs::create_dir_all(&self.root)
            .with_context(|| format!("creating rollback directory {}", self.root.display()))?;

        let mut id = base.clone();
        let mut suffix = 1;
        loop {
            match fs::create_dir(self.point_dir(&id)) {
                Ok(()) => break,
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                    id = format!("{}-{}", base, suffix);
                    suffix += 1;
                }
                Err(err) => {
                    return Err(err).with_context(|| {
                        format!("creating rollback point {}", self.point_dir(&id).display())
                    });
                }
            }
        }

        let point = RollbackPoint {
            id,
            package: package.to_string(),
            operation: operation.to_string(),
            created_at,
            backup_files: Vec::new(),
            commands: Vec::new(),
        };
        self.persist(&point)?;

        emit(
            Level::Debug,
            "rollback.point.created",
            &format!("Created rollback point {}", point.id),
            None,
        );
        Ok(point)
    }

    fn persist(&self, point: &RollbackPoint) -> Result<()> {
        let path = self.point_dir(&point.id).join(POINT_FILE);
        let content = toml::to_string_pretty(point)?;
        fs::write(&path, content)
            .with_context(|| format!("writing rollback point {}", path.display()))
    }

    pub fn load(&self, id: &str) -> Result<RollbackPoint> {
        let path = self.point_dir(id).join(POINT_FILE);
        let content = fs::read_to_string(&path)
            .with_context(|| format!("reading rollback point {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing rollback point {}", path.display()))
    }

    /// Register a compensating command; replayed last-in first-out
    pub fn add_command(&self, point: &mut RollbackPoint, command: &CommandSpec) -> Result<()> {
        point.commands.push(command.display());
        self.persist(point)
    }

    /// Copy `path` into the checkpoint so a rollback can restore it.
    ///
    /// Returns `false` when there is nothing to back up. Backing up the same
    /// file twice keeps the first (oldest) copy.
    pub fn backup_file(&self, point: &mut RollbackPoint, path: &Path) -> Result<bool> {
        if !path.is_file() {
            return Ok(false);
        }
        if point.backup_files.iter().any(|b| b.original == path) {
            return Ok(true);
        }

        let files_dir = self.point_dir(&point.id).join(FILES_DIR);
        fs::create_dir_all(&files_dir)
            .with_context(|| format!("creating {}", files_dir.display()))?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        let backup = files_dir.join(format!("{}-{}", point.backup_files.len(), file_name));
        fs::copy(path, &backup)
            .with_context(|| format!("backing up {} to {}", path.display(), backup.display()))?;

        point.backup_files.push(FileBackup {
            original: path.to_path_buf(),
            backup,
        });
        self.persist(point)?;
        Ok(true)
    }

    /// Undo a checkpoint: commands in reverse registration order, then file
    /// restores. Failures are reported as warnings and never stop the replay.
    pub async fn execute_rollback(&self, point: &RollbackPoint) -> RollbackReport {
        let mut report = RollbackReport::default();

        emit(
            Level::Warn,
            "rollback.start",
            &format!(
                "Rolling back {} of {} ({} command(s), {} file(s))",
                point.operation,
                point.package,
                point.commands.len(),
                point.backup_files.len()
            ),
            Some(serde_json::json!({ "id": point.id })),
        );

        for line in point.commands.iter().rev() {
            report.commands_run.push(line.clone());
            let outcome = match CommandSpec::parse(line) {
                Ok(spec) => self.runner.run(&spec.noninteractive()).await,
                Err(err) => Err(err),
            };
            let failure = match outcome {
                Ok(status) if status.is_success() => None,
                Ok(status) => Some(format!("`{}` failed with {}", line, status)),
                Err(err) => Some(format!("`{}` could not run: {:#}", line, err)),
            };
            if let Some(message) = failure {
                emit(Level::Warn, "rollback.command.failed", &message, None);
                report.failures.push(message);
            }
        }

        for backup in &point.backup_files {
            match fs::copy(&backup.backup, &backup.original) {
                Ok(_) => report.files_restored.push(backup.original.clone()),
                Err(err) => {
                    let message = format!(
                        "could not restore {} from {}: {}",
                        backup.original.display(),
                        backup.backup.display(),
                        err
                    );
                    emit(Level::Warn, "rollback.restore.failed", &message, None);
                    report.failures.push(message);
                }
            }
        }

        if report.is_clean() {
            emit(
                Level::Info,
                "rollback.done",
                &format!("Rollback of {} completed", point.package),
                None,
            );
        }
        report
    }

    /// Delete the checkpoint from disk; the point is consumed
    pub fn cleanup_rollback_point(&self, point: RollbackPoint) -> Result<()> {
        let dir = self.point_dir(&point.id);
        if dir.exists() {
            fs::remove_dir_all(&dir)
                .with_context(|| format!("removing rollback point {}", dir.display()))?;
        }
        Ok(())
    }

    /// Every checkpoint currently on disk, oldest first. Unreadable ones are skipped.
    pub fn list_rollback_points(&self) -> Vec<RollbackPoint> {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let mut points: Vec<RollbackPoint> = entries
            .flatten()
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| self.load(&entry.file_name().to_string_lossy()).ok())
            .collect();
        points.sort_by_key(|p| p.created_at);
        points
    }

    /// Sweep checkpoints older than `max_age`, returning how many were removed.
    ///
    /// Directories without a readable `point.toml` are aged by their mtime.
    pub fn cleanup_old_rollback_points(&self, max_age: Duration) -> Result<usize> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("reading rollback directory {}", self.root.display()));
            }
        };

        // An age reaching past the representable range makes nothing old enough
        let Some(cutoff) = chrono::Duration::from_std(max_age)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            return Ok(0);
        };
        let mut removed = 0;

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let id = entry.file_name().to_string_lossy().into_owned();
            let created_at = match self.load(&id) {
                Ok(point) => Some(point.created_at),
                Err(_) => entry
                    .metadata()
                    .and_then(|m| m.modified())
                    .ok()
                    .map(DateTime::<Utc>::from),
            };
            let Some(created_at) = created_at else {
                continue;
            };
            if created_at >= cutoff {
                continue;
            }
            match fs::remove_dir_all(&path) {
                Ok(()) => removed += 1,
                Err(err) => emit(
                    Level::Warn,
                    "rollback.cleanup.failed",
                    &format!("Could not remove {}: {}", path.display(), err),
                    None,
                ),
            }
        }

        Ok(removed)
    }
}

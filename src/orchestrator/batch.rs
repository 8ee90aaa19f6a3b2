//! Batch drivers and the end-of-run summary.

use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;

use super::install::{InstallManager, InstallOutcome};
use super::lock::LockManager;
use super::remove::{RemovalEngine, RemovalOptions, RemovalResult};
use crate::error::{OrchestratorError, Result};
use crate::ui::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Sequential,
    /// One task per package name; only same-name operations serialize
    Parallel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Install,
    Remove,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Install => "install",
            Operation::Remove => "remove",
        }
    }
}

/// Summary categories, in presentation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Succeeded,
    AlreadySatisfied,
    Skipped,
    Failed,
}

impl ItemStatus {
    fn label(&self) -> &'static str {
        match self {
            ItemStatus::Succeeded => "ok",
            ItemStatus::AlreadySatisfied => "already satisfied",
            ItemStatus::Skipped => "skipped",
            ItemStatus::Failed => "failed",
        }
    }

    fn color(&self) -> Color {
        match self {
            ItemStatus::Succeeded => Color::Green,
            ItemStatus::AlreadySatisfied => Color::Cyan,
            ItemStatus::Skipped => Color::Yellow,
            ItemStatus::Failed => Color::Red,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageReport {
    pub name: String,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub removed_paths: Vec<String>,
}

impl PackageReport {
    fn new(name: &str, status: ItemStatus, detail: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            detail,
            error_kind: None,
            retryable: false,
            removed_paths: Vec::new(),
        }
    }

    fn failed(name: &str, err: &OrchestratorError) -> Self {
        Self {
            error_kind: Some(err.kind().to_string()),
            retryable: err.is_retryable(),
            ..Self::new(name, ItemStatus::Failed, Some(err.to_string()))
        }
    }

    pub fn from_install(name: &str, result: Result<InstallOutcome>) -> Self {
        match result {
            Ok(InstallOutcome::Installed { version }) => {
                Self::new(name, ItemStatus::Succeeded, version)
            }
            Ok(InstallOutcome::AlreadySatisfied { version }) => {
                Self::new(name, ItemStatus::AlreadySatisfied, version)
            }
            Err(err) => Self::failed(name, &err),
        }
    }

    pub fn from_removal(name: &str, result: Result<RemovalResult>) -> Self {
        let removal = match result {
            Ok(removal) => removal,
            Err(err) => return Self::failed(name, &err),
        };
        let mut report = if let Some(error) = &removal.error {
            Self {
                error_kind: Some("removal_failure".to_string()),
                ..Self::new(name, ItemStatus::Failed, Some(error.clone()))
            }
        } else if removal.is_skipped() {
            Self::new(name, ItemStatus::Skipped, removal.warning.clone())
        } else {
            let verb = if removal.dry_run { "would remove" } else { "removed" };
            Self::new(
                name,
                ItemStatus::Succeeded,
                Some(format!("{} ({})", verb, removal.installation_type)),
            )
        };
        report.removed_paths = removal.removed_paths;
        report
    }
}

/// Per-package results of one batch, sorted by result then name
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub operation: Operation,
    pub reports: Vec<PackageReport>,
}

impl BatchSummary {
    pub fn new(operation: Operation, mut reports: Vec<PackageReport>) -> Self {
        reports.sort_by(|a, b| a.status.cmp(&b.status).then_with(|| a.name.cmp(&b.name)));
        Self { operation, reports }
    }

    fn names_with(&self, status: ItemStatus) -> Vec<&str> {
        self.reports
            .iter()
            .filter(|r| r.status == status)
            .map(|r| r.name.as_str())
            .collect()
    }

    pub fn succeeded(&self) -> Vec<&str> {
        self.names_with(ItemStatus::Succeeded)
    }

    pub fn already_satisfied(&self) -> Vec<&str> {
        self.names_with(ItemStatus::AlreadySatisfied)
    }

    pub fn skipped(&self) -> Vec<&str> {
        self.names_with(ItemStatus::Skipped)
    }

    /// Failed names with their error text
    pub fn failed(&self) -> Vec<(&str, &str)> {
        self.reports
            .iter()
            .filter(|r| r.status == ItemStatus::Failed)
            .map(|r| (r.name.as_str(), r.detail.as_deref().unwrap_or("")))
            .collect()
    }

    pub fn has_failures(&self) -> bool {
        self.reports.iter().any(|r| r.status == ItemStatus::Failed)
    }

    /// Percentage of items that did not fail; an empty batch is 100%
    pub fn success_rate(&self) -> f64 {
        if self.reports.is_empty() {
            return 100.0;
        }
        let failed = self.failed().len();
        (self.reports.len() - failed) as f64 * 100.0 / self.reports.len() as f64
    }

    /// Invocation that retries only the failed names
    pub fn retry_command(&self) -> Option<String> {
        let failed: Vec<&str> = self.failed().into_iter().map(|(name, _)| name).collect();
        if failed.is_empty() {
            return None;
        }
        Some(format!(
            "{} {} {}",
            env!("CARGO_PKG_NAME"),
            self.operation.as_str(),
            failed.join(" ")
        ))
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "operation": self.operation,
            "succeeded": self.succeeded(),
            "already_satisfied": self.already_satisfied(),
            "skipped": self.skipped(),
            "failed": self
                .failed()
                .into_iter()
                .map(|(name, error)| serde_json::json!({ "name": name, "error": error }))
                .collect::<Vec<_>>(),
            "success_rate": self.success_rate(),
            "retry": self.retry_command(),
            "reports": self.reports,
        })
    }

    pub fn print(&self) {
        if matches!(get_output_format(), OutputFormat::Json) {
            emit(
                if self.has_failures() {
                    Level::Error
                } else {
                    Level::Success
                },
                "batch.summary",
                &format!("{} summary", self.operation.as_str()),
                Some(self.to_json()),
            );
            return;
        }

        separator(false);
        println!("{}", format!("{} summary", self.operation.as_str()).bold());

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["Package", "Result", "Details"]);
        for report in &self.reports {
            let mut details = report.detail.clone().unwrap_or_default();
            if !report.removed_paths.is_empty() {
                if !details.is_empty() {
                    details.push('\n');
                }
                details.push_str(&report.removed_paths.join("\n"));
            }
            table.add_row(vec![
                Cell::new(&report.name),
                Cell::new(report.status.label()).fg(report.status.color()),
                Cell::new(details),
            ]);
        }
        println!("{table}");

        println!(
            "Succeeded: {}  Already satisfied: {}  Skipped: {}  Failed: {}  Success rate: {:.1}%",
            self.succeeded().len().to_string().green(),
            self.already_satisfied().len().to_string().cyan(),
            self.skipped().len().to_string().yellow(),
            self.failed().len().to_string().red(),
            self.success_rate()
        );

        if let Some(retry) = self.retry_command() {
            if self.reports.iter().any(|r| r.retryable) {
                println!("Some packages were busy; try again shortly.");
            }
            println!("Retry with: {}", retry.bold());
        }
    }
}

/// Run `task` for every name, one after another or as concurrent tasks.
///
/// Reports are returned in completion order; [`BatchSummary`] sorts them.
pub async fn drive<F, Fut>(names: Vec<String>, mode: ExecutionMode, task: F) -> Vec<PackageReport>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = PackageReport> + Send + 'static,
{
    let mut reports = Vec::with_capacity(names.len());
    match mode {
        ExecutionMode::Sequential => {
            for name in names {
                reports.push(task(name).await);
            }
        }
        ExecutionMode::Parallel => {
            let mut handles = vec![];
            for name in names {
                let handle = tokio::spawn(task(name.clone()));
                handles.push((name, handle));
            }
            for (name, handle) in handles {
                match handle.await {
                    Ok(report) => reports.push(report),
                    Err(err) => reports.push(PackageReport::new(
                        &name,
                        ItemStatus::Failed,
                        Some(format!("task aborted: {}", err)),
                    )),
                }
            }
        }
    }
    reports
}

pub async fn install_packages(
    manager: Arc<InstallManager>,
    names: Vec<String>,
    version: Option<String>,
    mode: ExecutionMode,
) -> BatchSummary {
    let reports = drive(names, mode, move |name| {
        let manager = manager.clone();
        let version = version.clone();
        async move {
            let result = manager.install(&name, version.as_deref()).await;
            if let Err(err) = &result {
                emit(
                    Level::Error,
                    "install.failed",
                    &err.to_string(),
                    Some(serde_json::json!({ "package": name, "kind": err.kind() })),
                );
            }
            PackageReport::from_install(&name, result)
        }
    })
    .await;
    BatchSummary::new(Operation::Install, reports)
}

pub async fn remove_packages(
    engine: Arc<RemovalEngine>,
    locks: Arc<LockManager>,
    names: Vec<String>,
    options: RemovalOptions,
    mode: ExecutionMode,
) -> BatchSummary {
    let reports = drive(names, mode, move |name| {
        let engine = engine.clone();
        let locks = locks.clone();
        async move {
            let result = match locks.acquire(&name).await {
                Ok(_lock) => engine.safe_remove(&name, options).await,
                Err(err) => Err(err),
            };
            PackageReport::from_removal(&name, result)
        }
    })
    .await;
    BatchSummary::new(Operation::Remove, reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::remove::InstallationType;

    fn report(name: &str, status: ItemStatus) -> PackageReport {
        PackageReport::new(name, status, None)
    }

    #[test]
    fn summary_sorts_by_category_then_name() {
        let summary = BatchSummary::new(
            Operation::Install,
            vec![
                report("zeta", ItemStatus::Failed),
                report("beta", ItemStatus::AlreadySatisfied),
                report("alpha", ItemStatus::Failed),
                report("gamma", ItemStatus::Succeeded),
            ],
        );
        let order: Vec<&str> = summary.reports.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(order, vec!["gamma", "beta", "alpha", "zeta"]);
        assert_eq!(summary.success_rate(), 50.0);
        assert_eq!(
            summary.retry_command().as_deref(),
            Some("stackctl install alpha zeta")
        );
    }

    #[test]
    fn clean_batch_has_no_retry() {
        let summary = BatchSummary::new(Operation::Remove, vec![report("redis", ItemStatus::Skipped)]);
        assert!(!summary.has_failures());
        assert_eq!(summary.retry_command(), None);
        assert_eq!(summary.success_rate(), 100.0);
        assert_eq!(BatchSummary::new(Operation::Install, vec![]).success_rate(), 100.0);
    }

    #[test]
    fn install_errors_carry_kind_and_retryability() {
        let busy = PackageReport::from_install(
            "node",
            Err(OrchestratorError::LockTimeout("node".to_string(), 30)),
        );
        assert_eq!(busy.status, ItemStatus::Failed);
        assert_eq!(busy.error_kind.as_deref(), Some("lock_timeout"));
        assert!(busy.retryable);

        let skipped = PackageReport::from_install(
            "node",
            Ok(InstallOutcome::AlreadySatisfied {
                version: Some("20.11.1".to_string()),
            }),
        );
        assert_eq!(skipped.status, ItemStatus::AlreadySatisfied);
    }

    #[test]
    fn removal_results_map_to_categories() {
        let removed = RemovalResult {
            package: "redis".to_string(),
            installation_type: InstallationType::Apt,
            success: true,
            warning: None,
            error: None,
            removed_paths: vec!["redis-server".to_string()],
            dry_run: true,
        };
        let report = PackageReport::from_removal("redis", Ok(removed.clone()));
        assert_eq!(report.status, ItemStatus::Succeeded);
        assert_eq!(report.removed_paths, vec!["redis-server"]);

        let gated = RemovalResult {
            success: false,
            warning: Some("critical".to_string()),
            removed_paths: vec![],
            installation_type: InstallationType::Unknown,
            ..removed.clone()
        };
        assert_eq!(
            PackageReport::from_removal("sudo", Ok(gated)).status,
            ItemStatus::Skipped
        );

        let failed = RemovalResult {
            success: false,
            error: Some("purge failed".to_string()),
            ..removed
        };
        assert_eq!(
            PackageReport::from_removal("redis", Ok(failed)).status,
            ItemStatus::Failed
        );
    }

    #[tokio::test]
    async fn parallel_driver_runs_every_name() {
        let names: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let reports = drive(names, ExecutionMode::Parallel, |name| async move {
            if name == "b" {
                PackageReport::new(&name, ItemStatus::Failed, Some("boom".to_string()))
            } else {
                PackageReport::new(&name, ItemStatus::Succeeded, None)
            }
        })
        .await;
        let summary = BatchSummary::new(Operation::Install, reports);
        assert_eq!(summary.succeeded(), vec!["a", "c"]);
        assert_eq!(summary.failed(), vec![("b", "boom")]);
    }
}

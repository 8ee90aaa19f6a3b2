//! The installation and removal engine.
//!
//! [`Orchestrator`] wires the pieces together for one process run: a read-only
//! registry view, the detector, a shared lock manager, the removal engine and
//! the install manager. Everything that touches the host goes through the
//! injected [`SystemProbe`] and [`CommandRunner`].

pub mod batch;
pub mod install;
pub mod lock;
pub mod remove;
pub mod rollback;

use serde::Serialize;
use std::sync::Arc;

pub use batch::{BatchSummary, ExecutionMode, ItemStatus, Operation, PackageReport};
pub use install::{InstallManager, InstallOutcome};
pub use lock::{LockManager, PackageLock};
pub use remove::{InstallationType, RemovalEngine, RemovalLayout, RemovalOptions, RemovalResult};
pub use rollback::{RollbackManager, RollbackPoint, RollbackReport};

use crate::common::config::Settings;
use crate::common::process::{CommandRunner, HostProbe, HostRunner, SystemProbe};
use crate::error::Result;
use crate::package::{Category, Detector, RegistryView};

/// Point-in-time view of one catalog package
#[derive(Debug, Clone, Serialize)]
pub struct PackageStatus {
    pub name: String,
    pub description: String,
    pub category: Category,
    pub installed: bool,
    pub version: Option<String>,
    pub installation_type: InstallationType,
    pub dependencies: Vec<String>,
    pub supported_versions: Vec<String>,
}

pub struct Orchestrator {
    registry: RegistryView,
    detector: Detector,
    locks: Arc<LockManager>,
    remover: Arc<RemovalEngine>,
    installer: Arc<InstallManager>,
}

impl Orchestrator {
    pub fn new(
        settings: &Settings,
        registry: RegistryView,
        probe: Arc<dyn SystemProbe>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        let detector = Detector::new(probe);
        let locks = Arc::new(LockManager::new(settings.lock_timeout()));
        let remover = Arc::new(RemovalEngine::new(
            registry.clone(),
            detector.clone(),
            runner.clone(),
            RemovalLayout::from_settings(settings),
        ));
        let installer = Arc::new(InstallManager::new(
            registry.clone(),
            detector.clone(),
            runner,
            locks.clone(),
            remover.clone(),
            settings,
        ));
        Self {
            registry,
            detector,
            locks,
            remover,
            installer,
        }
    }

    /// Built-in catalog against the real host
    pub fn for_host(settings: &Settings) -> Result<Self> {
        Ok(Self::new(
            settings,
            RegistryView::builtin()?,
            Arc::new(HostProbe::new()),
            Arc::new(HostRunner::new()),
        ))
    }

    pub fn registry(&self) -> &RegistryView {
        &self.registry
    }

    pub fn installer(&self) -> &Arc<InstallManager> {
        &self.installer
    }

    pub fn remover(&self) -> &Arc<RemovalEngine> {
        &self.remover
    }

    pub fn rollback(&self) -> &RollbackManager {
        self.installer.rollback()
    }

    pub async fn install(
        &self,
        names: Vec<String>,
        version: Option<String>,
        mode: ExecutionMode,
    ) -> BatchSummary {
        batch::install_packages(self.installer.clone(), names, version, mode).await
    }

    pub async fn remove(
        &self,
        names: Vec<String>,
        options: RemovalOptions,
        mode: ExecutionMode,
    ) -> BatchSummary {
        batch::remove_packages(
            self.remover.clone(),
            self.locks.clone(),
            names,
            options,
            mode,
        )
        .await
    }

    pub fn status(&self, name: &str) -> Result<PackageStatus> {
        let pkg = self.registry.require(name)?;
        let installed = self.detector.is_installed(&pkg);
        let version = self.detector.system_version(&pkg);
        let installation_type = self.remover.detect_installation_type(name)?;
        Ok(PackageStatus {
            name: pkg.name,
            description: pkg.description,
            category: pkg.category,
            installed,
            version: (!version.is_empty()).then_some(version),
            installation_type,
            dependencies: pkg.dependencies,
            supported_versions: pkg.supported_versions,
        })
    }
}

//! Transactional package installation.
//!
//! Each install runs under the package's lock:
//!
//! 1. validate the name, the requested version and the dependency subgraph
//! 2. open a rollback point
//! 3. install missing system commands through APT, then missing catalog
//!    dependencies (recursively, one at a time)
//! 4. stop early when the package is already in the requested state
//! 5. replace a conflicting version, except for the system interpreter
//! 6. back up config files and run the install script
//! 7. drop the rollback point on success, replay it on failure

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::Serialize;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::lock::LockManager;
use super::remove::{RemovalEngine, RemovalOptions};
use super::rollback::{RollbackManager, RollbackPoint};
use crate::common::config::Settings;
use crate::common::process::{CommandRunner, CommandSpec};
use crate::error::{OrchestratorError, Result};
use crate::package::catalog::{SYSTEM_INTERPRETER, apt_package_for_command};
use crate::package::validation::{safe_join, validate_version};
use crate::package::{Detector, PackageDescriptor, RegistryView, installation_order, version_matches};
use crate::ui::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InstallOutcome {
    /// The install script ran and succeeded
    Installed { version: Option<String> },
    /// Nothing to do; the package was already in the requested state
    AlreadySatisfied { version: Option<String> },
}

impl InstallOutcome {
    pub fn is_already_satisfied(&self) -> bool {
        matches!(self, InstallOutcome::AlreadySatisfied { .. })
    }
}

fn non_empty(version: String) -> Option<String> {
    (!version.is_empty()).then_some(version)
}

pub struct InstallManager {
    registry: RegistryView,
    detector: Detector,
    runner: Arc<dyn CommandRunner>,
    locks: Arc<LockManager>,
    remover: Arc<RemovalEngine>,
    rollback: RollbackManager,
    install_root: PathBuf,
    config_root: PathBuf,
    script_timeout: Option<Duration>,
}

impl InstallManager {
    pub fn new(
        registry: RegistryView,
        detector: Detector,
        runner: Arc<dyn CommandRunner>,
        locks: Arc<LockManager>,
        remover: Arc<RemovalEngine>,
        settings: &Settings,
    ) -> Self {
        let rollback = RollbackManager::new(settings.rollback_dir.clone(), runner.clone());
        Self {
            registry,
            detector,
            runner,
            locks,
            remover,
            rollback,
            install_root: settings.install_root.clone(),
            config_root: settings.config_root.clone(),
            script_timeout: settings.script_timeout(),
        }
    }

    pub fn registry(&self) -> &RegistryView {
        &self.registry
    }

    pub fn rollback(&self) -> &RollbackManager {
        &self.rollback
    }

    /// Install `name`, optionally at a specific supported version
    pub async fn install(&self, name: &str, version: Option<&str>) -> Result<InstallOutcome> {
        self.install_boxed(name.to_string(), version.map(str::to_string))
            .await
    }

    // Dependencies recurse back into the same flow
    fn install_boxed(
        &self,
        name: String,
        version: Option<String>,
    ) -> BoxFuture<'_, Result<InstallOutcome>> {
        async move { self.install_locked(&name, version.as_deref()).await }.boxed()
    }

    fn validate(&self, name: &str, version: Option<&str>) -> Result<PackageDescriptor> {
        // Rejects bad names, unknown packages and cycles before anything is touched
        installation_order(&self.registry, &[name.to_string()])?;
        let pkg = self.registry.require(name)?;

        if let Some(version) = version {
            validate_version(version)?;
            if !pkg.version_support {
                return Err(OrchestratorError::validation(format!(
                    "{} does not support version selection",
                    name
                )));
            }
            if !pkg.supports_version(version) {
                return Err(OrchestratorError::validation(format!(
                    "{} {} is not supported (supported: {})",
                    name,
                    version,
                    pkg.supported_versions.join(", ")
                )));
            }
        }
        Ok(pkg)
    }

    async fn install_locked(&self, name: &str, version: Option<&str>) -> Result<InstallOutcome> {
        let pkg = self.validate(name, version)?;

        let _lock = self.locks.acquire(name).await?;
        emit(
            Level::Debug,
            "install.lock",
            &format!("Acquired lock for {}", name),
            None,
        );

        let mut point = self.rollback.create_rollback_point(name, "install")?;

        if let Err(err) = self.install_dependencies(&pkg, &mut point).await {
            self.roll_back(point).await;
            return Err(err);
        }

        let installed = self.detector.is_installed(&pkg);
        let current = if installed {
            self.detector.system_version(&pkg)
        } else {
            String::new()
        };

        let satisfied = installed
            && match version {
                None => true,
                Some(requested) => version_matches(&current, requested),
            };
        if satisfied {
            emit(
                Level::Info,
                "install.skip",
                &format!(
                    "{} is already installed{}",
                    name,
                    if current.is_empty() {
                        String::new()
                    } else {
                        format!(" ({})", current)
                    }
                ),
                None,
            );
            self.commit(point);
            return Ok(InstallOutcome::AlreadySatisfied {
                version: non_empty(current),
            });
        }

        if let Some(requested) = version {
            if installed && !current.is_empty() {
                if let Err(err) = self.replace_installed(&pkg, &current, requested).await {
                    self.roll_back(point).await;
                    return Err(err);
                }
            }
        }

        if let Err(err) = self.run_script(&pkg, version, &mut point).await {
            self.roll_back(point).await;
            return Err(err);
        }

        self.commit(point);
        let detected = non_empty(self.detector.system_version(&pkg));
        emit(
            Level::Success,
            "install.done",
            &format!("Installed {}", name),
            Some(serde_json::json!({ "package": name, "version": detected })),
        );
        Ok(InstallOutcome::Installed {
            version: detected.or_else(|| version.map(str::to_string)),
        })
    }

    /// System commands first, in one APT transaction, then catalog dependencies in order
    async fn install_dependencies(
        &self,
        pkg: &PackageDescriptor,
        point: &mut RollbackPoint,
    ) -> Result<()> {
        let mut missing = Vec::new();
        let mut catalog = Vec::new();
        for dep in &pkg.dependencies {
            if self.registry.contains(dep) {
                catalog.push(dep.clone());
            } else if !self.detector.command_available(dep) {
                missing.push(dep.clone());
            }
        }

        if !missing.is_empty() {
            self.install_system_commands(pkg, &missing, point).await?;
        }

        for dep in catalog {
            let dep_pkg = self.registry.require(&dep)?;
            if self.detector.is_installed(&dep_pkg) {
                continue;
            }
            emit(
                Level::Info,
                "install.dependency",
                &format!("Installing {} (required by {})", dep, pkg.name),
                None,
            );
            if let Err(err) = self.install_boxed(dep.clone(), None).await {
                return Err(OrchestratorError::DependencyFailure {
                    package: pkg.name.clone(),
                    dependency: dep,
                    reason: err.to_string(),
                });
            }
        }
        Ok(())
    }

    async fn install_system_commands(
        &self,
        pkg: &PackageDescriptor,
        missing: &[String],
        point: &mut RollbackPoint,
    ) -> Result<()> {
        let mut apt_packages: Vec<String> = Vec::new();
        for command in missing {
            let apt = apt_package_for_command(command).to_string();
            if !apt_packages.contains(&apt) {
                apt_packages.push(apt);
            }
        }

        emit(
            Level::Info,
            "install.system",
            &format!(
                "Installing system packages for {}: {}",
                pkg.name,
                apt_packages.join(" ")
            ),
            None,
        );

        let install = CommandSpec::privileged("apt-get")
            .args(["install", "-y"])
            .args(apt_packages.iter().cloned())
            .noninteractive();
        let failure = match self.runner.run(&install).await {
            Ok(status) if status.is_success() => None,
            Ok(status) => Some(format!("`{}` failed with {}", install, status)),
            Err(err) => Some(format!("{:#}", err)),
        };
        if let Some(reason) = failure {
            return Err(OrchestratorError::DependencyFailure {
                package: pkg.name.clone(),
                dependency: missing.join(", "),
                reason,
            });
        }

        let undo = CommandSpec::privileged("apt-get")
            .args(["remove", "-y"])
            .args(apt_packages);
        self.rollback.add_command(point, &undo)?;
        Ok(())
    }

    async fn replace_installed(
        &self,
        pkg: &PackageDescriptor,
        current: &str,
        requested: &str,
    ) -> Result<()> {
        if pkg.name == SYSTEM_INTERPRETER {
            return Err(OrchestratorError::VersionConflict {
                package: pkg.name.clone(),
                installed: current.to_string(),
                requested: requested.to_string(),
            });
        }

        emit(
            Level::Warn,
            "install.replace",
            &format!(
                "{} {} is installed; removing it before installing {}",
                pkg.name, current, requested
            ),
            None,
        );
        let result = self
            .remover
            .safe_remove(&pkg.name, RemovalOptions::default())
            .await?;
        match result.error {
            None => Ok(()),
            Some(error) => Err(OrchestratorError::InstallationFailure {
                package: pkg.name.clone(),
                reason: format!("could not remove installed version {}: {}", current, error),
            }),
        }
    }

    async fn run_script(
        &self,
        pkg: &PackageDescriptor,
        version: Option<&str>,
        point: &mut RollbackPoint,
    ) -> Result<()> {
        let script = safe_join(&self.install_root, &pkg.script_path)?;
        if !script.is_file() {
            return Err(OrchestratorError::ScriptNotFound {
                package: pkg.name.clone(),
                path: script.display().to_string(),
            });
        }
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755))?;

        for config in &pkg.config_files {
            let path = safe_join(&self.config_root, config)?;
            if self.rollback.backup_file(point, &path)? {
                emit(
                    Level::Debug,
                    "install.backup",
                    &format!("Backed up {}", path.display()),
                    None,
                );
            }
        }

        let mut command = CommandSpec::new(script.display().to_string())
            .noninteractive()
            .current_dir(&self.install_root)
            .with_timeout(self.script_timeout);
        if pkg.version_support {
            if let Some(version) = version.or(pkg.default_version.as_deref()) {
                command = command.args(["--version", version]);
            }
        }

        emit(
            Level::Info,
            "install.script",
            &format!("Running {}", command),
            None,
        );
        match self.runner.run(&command).await {
            Ok(status) if status.is_success() => Ok(()),
            Ok(status) => Err(OrchestratorError::InstallationFailure {
                package: pkg.name.clone(),
                reason: format!("{} exited with {}", pkg.script_path, status),
            }),
            Err(err) => Err(OrchestratorError::InstallationFailure {
                package: pkg.name.clone(),
                reason: format!("{:#}", err),
            }),
        }
    }

    fn commit(&self, point: RollbackPoint) {
        let id = point.id.clone();
        if let Err(err) = self.rollback.cleanup_rollback_point(point) {
            emit(
                Level::Warn,
                "rollback.cleanup.failed",
                &format!("Could not remove rollback point {}: {:#}", id, err),
                None,
            );
        }
    }

    /// Replay the checkpoint; a fully replayed one is deleted, a partial one is
    /// left on disk for the next `cleanup` sweep
    async fn roll_back(&self, point: RollbackPoint) {
        let report = self.rollback.execute_rollback(&point).await;
        if report.is_clean() {
            self.commit(point);
        }
    }
}

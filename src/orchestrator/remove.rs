//! Multi-strategy package removal.
//!
//! A package can reach the host in five ways. Detection probes them in a
//! fixed priority order, the first hit decides the strategy, and the strategy
//! is turned into a [`RemovalPlan`] before anything is touched. Dry runs
//! report the plan, real runs execute it, so both list the same paths.

use glob::Pattern;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::common::config::Settings;
use crate::common::process::{CommandRunner, CommandSpec};
use crate::error::Result;
use crate::package::validation::validate_package_name;
use crate::package::{Category, Detector, PackageDescriptor, RegistryView, version_matches};
use crate::ui::prelude::*;

/// Host-critical package names, matched exactly
pub const CRITICAL_PACKAGES: &[&str] = &[
    "apt",
    "base-files",
    "base-passwd",
    "bash",
    "ca-certificates",
    "coreutils",
    "dash",
    "dpkg",
    "grub-common",
    "grub-pc",
    "gzip",
    "init",
    "libc6",
    "login",
    "mount",
    "openssh-client",
    "openssh-server",
    "passwd",
    "perl-base",
    "procps",
    "python3",
    "sudo",
    "systemd",
    "tar",
    "util-linux",
];

/// Host-critical package name prefixes
pub const CRITICAL_PREFIXES: &[&str] = &[
    "grub-",
    "libc6-",
    "libsystemd",
    "linux-headers",
    "linux-image",
    "linux-modules",
    "python3-minimal",
    "python3.",
    "systemd-",
];

pub fn is_critical(name: &str) -> bool {
    CRITICAL_PACKAGES.contains(&name) || CRITICAL_PREFIXES.iter().any(|p| name.starts_with(p))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallationType {
    Apt,
    Manual,
    User,
    VersionManager,
    Alternatives,
    Unknown,
}

impl InstallationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallationType::Apt => "apt",
            InstallationType::Manual => "manual",
            InstallationType::User => "user",
            InstallationType::VersionManager => "version_manager",
            InstallationType::Alternatives => "alternatives",
            InstallationType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for InstallationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemovalOptions {
    /// Bypass the critical-package gate and the advisory warning
    pub force: bool,
    /// Report what would be removed without touching anything
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovalResult {
    pub package: String,
    pub installation_type: InstallationType,
    pub success: bool,
    pub warning: Option<String>,
    pub error: Option<String>,
    /// Paths or APT package names that were (or in a dry run, would be) removed
    pub removed_paths: Vec<String>,
    pub dry_run: bool,
}

impl RemovalResult {
    fn new(package: &str, installation_type: InstallationType, dry_run: bool) -> Self {
        Self {
            package: package.to_string(),
            installation_type,
            success: true,
            warning: None,
            error: None,
            removed_paths: Vec::new(),
            dry_run,
        }
    }

    /// Nothing was removed and nothing failed: gated or not installed
    pub fn is_skipped(&self) -> bool {
        self.error.is_none() && self.warning.is_some() && self.removed_paths.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalStep {
    /// Run a command; best-effort steps only warn on failure
    Run { command: CommandSpec, best_effort: bool },
    /// Delete a path owned by the invoking user
    Delete(PathBuf),
}

impl RemovalStep {
    fn describe(&self) -> String {
        match self {
            RemovalStep::Run { command, .. } => command.display(),
            RemovalStep::Delete(path) => format!("delete {}", path.display()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalPlan {
    pub installation_type: InstallationType,
    pub removed_paths: Vec<String>,
    pub steps: Vec<RemovalStep>,
}

impl RemovalPlan {
    fn unknown() -> Self {
        Self {
            installation_type: InstallationType::Unknown,
            removed_paths: Vec::new(),
            steps: Vec::new(),
        }
    }
}

/// Where the filesystem strategies look
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalLayout {
    pub usr_local: PathBuf,
    pub home: PathBuf,
}

impl RemovalLayout {
    pub fn new(usr_local: impl Into<PathBuf>, home: impl Into<PathBuf>) -> Self {
        Self {
            usr_local: usr_local.into(),
            home: home.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let home = settings.home.clone().unwrap_or_else(invoking_user_home);
        Self::new(settings.usr_local.clone(), home)
    }
}

/// Home of the user behind `sudo`, falling back to our own
pub fn invoking_user_home() -> PathBuf {
    if matches!(sudo::check(), sudo::RunningAs::Root) {
        if let Ok(user) = std::env::var("SUDO_USER") {
            if !user.is_empty() && user != "root" {
                if let Some(home) = passwd_home(&user) {
                    return home;
                }
                return PathBuf::from("/home").join(user);
            }
        }
    }
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("/root"))
}

fn passwd_home(user: &str) -> Option<PathBuf> {
    let passwd = fs::read_to_string("/etc/passwd").ok()?;
    passwd.lines().find_map(|line| {
        let fields: Vec<&str> = line.split(':').collect();
        (fields.len() >= 6 && fields[0] == user).then(|| PathBuf::from(fields[5]))
    })
}

/// Names of fully installed packages in `dpkg -l` output
fn installed_dpkg_packages(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| line.starts_with("ii "))
        .filter_map(|line| line.split_whitespace().nth(1))
        .map(|name| name.split(':').next().unwrap_or(name).to_string())
        .collect()
}

fn glob_paths(pattern: &str) -> Vec<PathBuf> {
    match glob::glob(pattern) {
        Ok(paths) => paths.flatten().collect(),
        Err(err) => {
            emit(
                Level::Debug,
                "remove.glob.invalid",
                &format!("Ignoring glob {}: {}", pattern, err),
                None,
            );
            Vec::new()
        }
    }
}

fn escaped(path: &Path) -> String {
    Pattern::escape(&path.to_string_lossy())
}

fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

fn display_paths(paths: &[PathBuf]) -> Vec<String> {
    paths.iter().map(|p| p.display().to_string()).collect()
}

pub struct RemovalEngine {
    registry: RegistryView,
    detector: Detector,
    runner: Arc<dyn CommandRunner>,
    layout: RemovalLayout,
}

impl RemovalEngine {
    pub fn new(
        registry: RegistryView,
        detector: Detector,
        runner: Arc<dyn CommandRunner>,
        layout: RemovalLayout,
    ) -> Self {
        Self {
            registry,
            detector,
            runner,
            layout,
        }
    }

    pub fn layout(&self) -> &RemovalLayout {
        &self.layout
    }

    /// Catalog entry for `name`, or a conventional one for names outside the catalog
    fn descriptor(&self, name: &str) -> PackageDescriptor {
        self.registry
            .get(name)
            .unwrap_or_else(|| PackageDescriptor::new(name, "", Category::Tool))
    }

    pub fn detect_installation_type(&self, name: &str) -> Result<InstallationType> {
        validate_package_name(name)?;
        Ok(self.plan(&self.descriptor(name), false).installation_type)
    }

    /// First matching strategy in priority order
    pub fn plan(&self, pkg: &PackageDescriptor, force: bool) -> RemovalPlan {
        self.plan_apt(pkg, force)
            .or_else(|| self.plan_manual(pkg))
            .or_else(|| self.plan_version_manager(pkg))
            .or_else(|| self.plan_user(pkg))
            .or_else(|| self.plan_alternatives(pkg))
            .unwrap_or_else(RemovalPlan::unknown)
    }

    fn plan_apt(&self, pkg: &PackageDescriptor, force: bool) -> Option<RemovalPlan> {
        if pkg.apt_packages.is_empty() {
            return None;
        }
        let patterns: Vec<Pattern> = pkg
            .apt_packages
            .iter()
            .filter_map(|p| Pattern::new(p).ok())
            .collect();
        let listing = self.detector.probe().command_output("dpkg", &["-l"])?;

        let mut matched: Vec<String> = installed_dpkg_packages(&listing)
            .into_iter()
            .filter(|name| patterns.iter().any(|p| p.matches(name)))
            .collect();
        matched.sort();
        matched.dedup();

        if !force {
            let (critical, rest): (Vec<String>, Vec<String>) =
                matched.into_iter().partition(|name| is_critical(name));
            if !critical.is_empty() {
                emit(
                    Level::Warn,
                    "remove.apt.critical",
                    &format!(
                        "Leaving host-critical packages in place: {}",
                        critical.join(", ")
                    ),
                    None,
                );
            }
            matched = rest;
        }
        if matched.is_empty() {
            return None;
        }

        let purge = CommandSpec::privileged("apt-get")
            .args(["purge", "-y"])
            .args(matched.iter().cloned())
            .noninteractive();
        let autoremove = CommandSpec::privileged("apt-get")
            .args(["autoremove", "-y"])
            .noninteractive();

        Some(RemovalPlan {
            installation_type: InstallationType::Apt,
            removed_paths: matched,
            steps: vec![
                RemovalStep::Run {
                    command: purge,
                    best_effort: false,
                },
                RemovalStep::Run {
                    command: autoremove,
                    best_effort: true,
                },
            ],
        })
    }

    fn plan_manual(&self, pkg: &PackageDescriptor) -> Option<RemovalPlan> {
        let root = &self.layout.usr_local;
        let mut patterns: Vec<String> = pkg
            .detection_commands
            .iter()
            .map(|cmd| format!("{}/{}", escaped(&root.join("bin")), Pattern::escape(cmd)))
            .collect();
        for sub in ["lib", "include", "share", "etc"] {
            patterns.push(format!(
                "{}/{}*",
                escaped(&root.join(sub)),
                Pattern::escape(&pkg.name)
            ));
        }

        let mut paths: Vec<PathBuf> = patterns.iter().flat_map(|p| glob_paths(p)).collect();
        paths.sort();
        paths.dedup();
        if paths.is_empty() {
            return None;
        }

        let rm = CommandSpec::privileged("rm")
            .arg("-rf")
            .args(paths.iter().map(|p| p.display().to_string()));
        Some(RemovalPlan {
            installation_type: InstallationType::Manual,
            removed_paths: display_paths(&paths),
            steps: vec![RemovalStep::Run {
                command: rm,
                best_effort: false,
            }],
        })
    }

    fn plan_version_manager(&self, pkg: &PackageDescriptor) -> Option<RemovalPlan> {
        let manager = pkg.version_manager?;
        let versions_dir = self.layout.home.join(manager.versions_dir());
        let installed: Vec<PathBuf> = glob_paths(&format!("{}/*", escaped(&versions_dir)))
            .into_iter()
            .filter(|p| p.is_dir())
            .collect();
        if installed.is_empty() {
            return None;
        }

        let current = self.detector.system_version(pkg);
        let matching: Vec<PathBuf> = installed
            .iter()
            .filter(|dir| {
                let name = dir.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
                !current.is_empty() && version_matches(&name, &current)
            })
            .cloned()
            .collect();
        // Without a detectable active version every managed version goes
        let mut targets = if matching.is_empty() { installed } else { matching };
        targets.sort();

        let home = self.layout.home.display().to_string();
        let mut steps = Vec::new();
        for dir in &targets {
            let version = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let (program, args) = manager.uninstall_command(&version);
            steps.push(RemovalStep::Run {
                command: CommandSpec::new(program).args(args).env("HOME", home.clone()),
                best_effort: true,
            });
            steps.push(RemovalStep::Delete(dir.clone()));
        }

        Some(RemovalPlan {
            installation_type: InstallationType::VersionManager,
            removed_paths: display_paths(&targets),
            steps,
        })
    }

    fn plan_user(&self, pkg: &PackageDescriptor) -> Option<RemovalPlan> {
        let home = &self.layout.home;
        let name = Pattern::escape(&pkg.name);

        let bin = escaped(&home.join(".local/bin"));
        let mut patterns: Vec<String> = pkg
            .detection_commands
            .iter()
            .flat_map(|cmd| {
                let cmd = Pattern::escape(cmd);
                [format!("{}/{}", bin, cmd), format!("{}/{}-*", bin, cmd)]
            })
            .collect();
        for sub in [".local/share", ".local/lib", ".config", ".cache"] {
            let dir = escaped(&home.join(sub));
            patterns.push(format!("{}/{}", dir, name));
            patterns.push(format!("{}/{}[-._]*", dir, name));
        }
        let home_dir = escaped(home);
        patterns.push(format!("{}/.{}", home_dir, name));
        patterns.push(format!("{}/.{}rc", home_dir, name));
        patterns.push(format!("{}/.{}[-._]*", home_dir, name));

        let mut paths: Vec<PathBuf> = patterns.iter().flat_map(|p| glob_paths(p)).collect();
        paths.sort();
        paths.dedup();
        if paths.is_empty() {
            return None;
        }

        Some(RemovalPlan {
            installation_type: InstallationType::User,
            removed_paths: display_paths(&paths),
            steps: paths.into_iter().map(RemovalStep::Delete).collect(),
        })
    }

    fn plan_alternatives(&self, pkg: &PackageDescriptor) -> Option<RemovalPlan> {
        let probe = self.detector.probe();
        let registered: Vec<&String> = pkg
            .detection_commands
            .iter()
            .filter(|cmd| {
                probe
                    .command_output("update-alternatives", &["--list", cmd.as_str()])
                    .is_some_and(|out| !out.trim().is_empty())
            })
            .collect();
        if registered.is_empty() {
            return None;
        }

        Some(RemovalPlan {
            installation_type: InstallationType::Alternatives,
            removed_paths: registered
                .iter()
                .map(|cmd| format!("/etc/alternatives/{}", cmd))
                .collect(),
            steps: registered
                .iter()
                .map(|cmd| RemovalStep::Run {
                    command: CommandSpec::privileged("update-alternatives")
                        .args(["--remove-all", cmd.as_str()]),
                    best_effort: false,
                })
                .collect(),
        })
    }

    /// Detect how `name` was installed and remove it with the matching strategy.
    ///
    /// `Err` is reserved for invalid input. Gated, unknown and failed removals
    /// are reported on the [`RemovalResult`].
    pub async fn safe_remove(&self, name: &str, options: RemovalOptions) -> Result<RemovalResult> {
        validate_package_name(name)?;

        if !options.force && is_critical(name) {
            let message = format!(
                "{} is critical to the host and was not removed (use --force to override)",
                name
            );
            emit(Level::Warn, "remove.gate.critical", &message, None);
            let mut result = RemovalResult::new(name, InstallationType::Unknown, options.dry_run);
            result.success = false;
            result.warning = Some(message);
            return Ok(result);
        }

        let pkg = self.descriptor(name);
        let plan = self.plan(&pkg, options.force);
        let mut result = RemovalResult::new(name, plan.installation_type, options.dry_run);
        result.removed_paths = plan.removed_paths.clone();

        if plan.installation_type == InstallationType::Unknown {
            let message = format!("{} does not appear to be installed", name);
            emit(Level::Warn, "remove.not_installed", &message, None);
            result.warning = Some(message);
            return Ok(result);
        }

        if options.dry_run {
            emit(
                Level::Info,
                "remove.dry_run",
                &format!("Would remove {} ({} installation)", name, plan.installation_type),
                Some(serde_json::json!({
                    "package": name,
                    "installation_type": plan.installation_type,
                    "removed_paths": plan.removed_paths,
                })),
            );
            for step in &plan.steps {
                emit(
                    Level::Info,
                    "remove.dry_run.step",
                    &format!("  would run: {}", step.describe()),
                    None,
                );
            }
            return Ok(result);
        }

        if !options.force {
            emit(
                Level::Warn,
                "remove.advisory",
                &format!(
                    "Removing {} ({} installation): {}",
                    name,
                    plan.installation_type,
                    plan.removed_paths.join(", ")
                ),
                None,
            );
        }

        let mut errors = Vec::new();
        for step in &plan.steps {
            if let Err(message) = self.execute_step(step).await {
                match step {
                    RemovalStep::Run {
                        best_effort: true, ..
                    } => emit(Level::Warn, "remove.step.failed", &message, None),
                    _ => {
                        emit(Level::Error, "remove.step.failed", &message, None);
                        errors.push(message);
                    }
                }
            }
        }

        if errors.is_empty() {
            emit(
                Level::Success,
                "remove.done",
                &format!("Removed {} ({} installation)", name, plan.installation_type),
                None,
            );
        } else {
            result.success = false;
            result.error = Some(errors.join("; "));
        }
        Ok(result)
    }

    async fn execute_step(&self, step: &RemovalStep) -> std::result::Result<(), String> {
        match step {
            RemovalStep::Run { command, .. } => match self.runner.run(command).await {
                Ok(status) if status.is_success() => Ok(()),
                Ok(status) => Err(format!("`{}` failed with {}", command, status)),
                Err(err) => Err(format!("`{}` could not run: {:#}", command, err)),
            },
            RemovalStep::Delete(path) => {
                let outcome = match fs::symlink_metadata(path) {
                    Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
                    Ok(_) => fs::remove_file(path),
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
                    Err(err) => Err(err),
                };
                outcome.map_err(|err| format!("could not delete {}: {}", path.display(), err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{PackageRegistry, VersionManager};
    use crate::testing::FakeHost;

    struct Fixture {
        _dir: tempfile::TempDir,
        layout: RemovalLayout,
        host: Arc<FakeHost>,
        engine: RemovalEngine,
    }

    fn fixture(host: FakeHost) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let layout = RemovalLayout::new(dir.path().join("usr/local"), dir.path().join("home"));
        fs::create_dir_all(&layout.usr_local).unwrap();
        fs::create_dir_all(&layout.home).unwrap();

        let host = Arc::new(host);
        let registry = PackageRegistry::from_descriptors(vec![
            PackageDescriptor::new("postgresql", "", Category::Database)
                .with_detection(&["psql"])
                .with_apt_packages(&["postgresql", "postgresql-*", "postgresql-client-*"]),
            PackageDescriptor::new("redis", "", Category::Database)
                .with_detection(&["redis-server", "redis-cli"])
                .with_apt_packages(&["redis-server"]),
            PackageDescriptor::new("node", "", Category::Runtime)
                .with_detection(&["node"])
                .with_apt_packages(&["nodejs"])
                .with_version_manager(VersionManager::Nvm),
            PackageDescriptor::new("yarn", "", Category::Tool),
            PackageDescriptor::new("java", "", Category::Runtime)
                .with_apt_packages(&["openjdk-*"]),
        ])
        .unwrap()
        .into_view();
        let engine = RemovalEngine::new(
            registry,
            Detector::new(host.clone()),
            host.clone(),
            layout.clone(),
        );
        Fixture {
            _dir: dir,
            layout,
            host,
            engine,
        }
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    const DRY: RemovalOptions = RemovalOptions {
        force: false,
        dry_run: true,
    };
    const REAL: RemovalOptions = RemovalOptions {
        force: false,
        dry_run: false,
    };

    #[test]
    fn critical_names_exact_and_prefix() {
        assert!(is_critical("sudo"));
        assert!(is_critical("linux-image-6.8.0-31-generic"));
        assert!(is_critical("python3.12"));
        assert!(is_critical("python3.12-minimal"));
        assert!(!is_critical("sudoku"));
        assert!(!is_critical("nginx"));
    }

    #[tokio::test]
    async fn critical_package_is_gated_without_force() {
        let f = fixture(FakeHost::new().with_output("dpkg -l", "ii  sudo  1.9.15  amd64  sudo\n"));

        let result = f.engine.safe_remove("sudo", REAL).await.unwrap();
        assert!(!result.success);
        assert!(result.warning.is_some());
        assert!(result.is_skipped());
        assert!(f.host.lines().is_empty());

        let forced = f
            .engine
            .safe_remove(
                "sudo",
                RemovalOptions {
                    force: true,
                    dry_run: true,
                },
            )
            .await
            .unwrap();
        assert_eq!(forced.installation_type, InstallationType::Apt);
        assert_eq!(forced.removed_paths, vec!["sudo"]);
    }

    #[tokio::test]
    async fn apt_strategy_matches_every_physical_package() {
        let listing = "\
Desired=Unknown/Install/Remove/Purge/Hold
||/ Name                   Version      Architecture Description
ii  postgresql-16          16.2-1       amd64        object-relational SQL database
ii  postgresql-client-16   16.2-1       amd64        front-end programs
rc  postgresql-15          15.6-1       amd64        removed but config remains
ii  libpq5:amd64           16.2-1       amd64        client library
";
        let f = fixture(FakeHost::new().with_output("dpkg -l", listing));

        let result = f.engine.safe_remove("postgresql", REAL).await.unwrap();
        assert!(result.success);
        assert_eq!(result.installation_type, InstallationType::Apt);
        assert_eq!(
            result.removed_paths,
            vec!["postgresql-16", "postgresql-client-16"]
        );
        assert_eq!(
            f.host.lines(),
            vec![
                "sudo apt-get purge -y postgresql-16 postgresql-client-16",
                "sudo apt-get autoremove -y",
            ]
        );
    }

    #[tokio::test]
    async fn failed_purge_is_an_error() {
        let f = fixture(
            FakeHost::new()
                .with_output("dpkg -l", "ii  redis-server  7.0  amd64  redis\n")
                .fail_on("purge"),
        );
        let result = f.engine.safe_remove("redis", REAL).await.unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("apt-get purge"));
    }

    #[tokio::test]
    async fn apt_wins_over_manual() {
        let f = fixture(FakeHost::new().with_output("dpkg -l", "ii  redis-server  7.0  amd64  x\n"));
        touch(&f.layout.usr_local.join("bin/redis-server"));
        assert_eq!(
            f.engine.detect_installation_type("redis").unwrap(),
            InstallationType::Apt
        );
    }

    #[tokio::test]
    async fn manual_dry_run_matches_real_run() {
        let f = fixture(FakeHost::new());
        touch(&f.layout.usr_local.join("bin/redis-server"));
        touch(&f.layout.usr_local.join("bin/redis-cli"));
        touch(&f.layout.usr_local.join("share/redis/README"));
        touch(&f.layout.usr_local.join("bin/unrelated"));

        let dry = f.engine.safe_remove("redis", DRY).await.unwrap();
        assert_eq!(dry.installation_type, InstallationType::Manual);
        assert!(f.host.lines().is_empty());

        let real = f.engine.safe_remove("redis", REAL).await.unwrap();
        assert_eq!(dry.removed_paths, real.removed_paths);
        assert_eq!(real.removed_paths.len(), 3);
        assert!(!real.removed_paths.iter().any(|p| p.ends_with("unrelated")));

        let lines = f.host.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("sudo rm -rf "));
    }

    #[tokio::test]
    async fn version_manager_removes_active_version_even_if_uninstall_fails() {
        let f = fixture(
            FakeHost::new()
                .with_commands(&["node"])
                .with_output("node", "v20.11.1\n")
                .fail_on("nvm uninstall"),
        );
        let versions = f.layout.home.join(".nvm/versions/node");
        fs::create_dir_all(versions.join("v20.11.1/bin")).unwrap();
        fs::create_dir_all(versions.join("v18.19.0/bin")).unwrap();

        let result = f.engine.safe_remove("node", REAL).await.unwrap();
        assert_eq!(result.installation_type, InstallationType::VersionManager);
        assert!(result.success);
        assert_eq!(
            result.removed_paths,
            vec![versions.join("v20.11.1").display().to_string()]
        );
        assert!(f.host.ran("nvm uninstall v20.11.1"));
        assert!(!versions.join("v20.11.1").exists());
        assert!(versions.join("v18.19.0").exists());
    }

    #[test]
    fn version_directory_names_are_quoted_into_the_uninstall_script() {
        let f = fixture(FakeHost::new());
        let versions = f.layout.home.join(".nvm/versions/node");
        fs::create_dir_all(versions.join("v1;touch hijacked")).unwrap();

        let plan = f.engine.plan(&f.engine.descriptor("node"), false);
        assert_eq!(plan.installation_type, InstallationType::VersionManager);
        let RemovalStep::Run { command, .. } = &plan.steps[0] else {
            panic!("expected the uninstall command first, got {:?}", plan.steps);
        };
        assert_eq!(command.program, "bash");
        assert_eq!(
            command.args,
            vec![
                "-c".to_string(),
                "source \"$HOME/.nvm/nvm.sh\" && nvm uninstall 'v1;touch hijacked'".to_string(),
            ]
        );
        assert_eq!(plan.steps[1], RemovalStep::Delete(versions.join("v1;touch hijacked")));
    }

    #[test]
    fn python_apt_packages_stay_unless_forced() {
        let f = fixture(FakeHost::new().with_output(
            "dpkg -l",
            "ii  python3.12  3.12.3-1  amd64  interpreter\nii  python3.12-venv  3.12.3-1  amd64  venv\n",
        ));
        let pkg = PackageDescriptor::new("python", "", Category::Runtime)
            .with_detection(&["python3"])
            .with_apt_packages(&["python3.1[0-3]", "python3.1[0-3]-venv"]);

        let gated = f.engine.plan(&pkg, false);
        assert_ne!(gated.installation_type, InstallationType::Apt);

        let forced = f.engine.plan(&pkg, true);
        assert_eq!(forced.installation_type, InstallationType::Apt);
        assert_eq!(forced.removed_paths, vec!["python3.12", "python3.12-venv"]);
    }

    #[tokio::test]
    async fn user_strategy_globs_prefixed_artifacts() {
        let f = fixture(FakeHost::new());
        let home = &f.layout.home;
        touch(&home.join(".local/bin/yarn-1.22"));
        touch(&home.join(".local/lib/yarn-cache/index"));
        touch(&home.join(".yarnrc"));
        touch(&home.join(".local/share/yarnish/keep"));
        touch(&home.join(".local/bin/yarnpkg-helper"));

        let result = f.engine.safe_remove("yarn", REAL).await.unwrap();
        assert_eq!(result.installation_type, InstallationType::User);
        let mut expected = vec![
            home.join(".local/bin/yarn-1.22").display().to_string(),
            home.join(".local/lib/yarn-cache").display().to_string(),
            home.join(".yarnrc").display().to_string(),
        ];
        expected.sort();
        assert_eq!(result.removed_paths, expected);
        assert!(!home.join(".local/lib/yarn-cache").exists());
        assert!(home.join(".local/share/yarnish/keep").exists());
        assert!(home.join(".local/bin/yarnpkg-helper").exists());
    }

    #[tokio::test]
    async fn user_strategy_deletes_without_privileges() {
        let f = fixture(FakeHost::new());
        touch(&f.layout.home.join(".local/bin/yarn"));
        fs::create_dir_all(f.layout.home.join(".yarn/cache")).unwrap();

        let dry = f.engine.safe_remove("yarn", DRY).await.unwrap();
        assert_eq!(dry.installation_type, InstallationType::User);
        assert!(f.layout.home.join(".yarn").exists());

        let real = f.engine.safe_remove("yarn", REAL).await.unwrap();
        assert!(real.success);
        assert_eq!(dry.removed_paths, real.removed_paths);
        assert!(!f.layout.home.join(".local/bin/yarn").exists());
        assert!(!f.layout.home.join(".yarn").exists());
        assert!(f.host.lines().is_empty());
    }

    #[tokio::test]
    async fn alternatives_strategy_deregisters() {
        let f = fixture(FakeHost::new().with_output(
            "update-alternatives --list java",
            "/usr/lib/jvm/java-21-openjdk-amd64/bin/java\n",
        ));
        let result = f.engine.safe_remove("java", REAL).await.unwrap();
        assert_eq!(result.installation_type, InstallationType::Alternatives);
        assert_eq!(result.removed_paths, vec!["/etc/alternatives/java"]);
        assert_eq!(
            f.host.lines(),
            vec!["sudo update-alternatives --remove-all java"]
        );
    }

    #[tokio::test]
    async fn unknown_installation_is_a_no_op_warning() {
        let f = fixture(FakeHost::new());
        let result = f.engine.safe_remove("htop", REAL).await.unwrap();
        assert_eq!(result.installation_type, InstallationType::Unknown);
        assert!(result.success);
        assert!(result.warning.is_some());
        assert!(result.error.is_none());
        assert!(f.host.lines().is_empty());
    }

    #[tokio::test]
    async fn invalid_names_are_rejected() {
        let f = fixture(FakeHost::new());
        assert!(f.engine.safe_remove("../etc", REAL).await.is_err());
    }

    #[test]
    fn dpkg_listing_parser_keeps_installed_rows() {
        let names = installed_dpkg_packages("ii  a  1  all  x\nrc  b  1  all  y\nii  c:amd64  1  amd64  z\n");
        assert_eq!(names, vec!["a", "c"]);
    }
}

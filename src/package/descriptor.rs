//! Catalog entry types.

use serde::Serialize;
use std::fmt;

use crate::common::shell::shell_quote;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Runtime,
    Database,
    WebServer,
    ProcessManager,
    Tool,
    Container,
}

impl Category {
    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Runtime => "runtime",
            Category::Database => "database",
            Category::WebServer => "web server",
            Category::ProcessManager => "process manager",
            Category::Tool => "tool",
            Category::Container => "container",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// An OS service whose liveness is part of "installed"
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceCheck {
    pub unit: String,
    /// Treat an inactive unit as installed as long as the detection commands resolve
    pub tolerate_inactive: bool,
}

/// Language version managers the removal engine knows how to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionManager {
    Nvm,
    Pyenv,
    Rbenv,
    Goenv,
    Sdkman,
}

impl VersionManager {
    pub fn name(&self) -> &'static str {
        match self {
            VersionManager::Nvm => "nvm",
            VersionManager::Pyenv => "pyenv",
            VersionManager::Rbenv => "rbenv",
            VersionManager::Goenv => "goenv",
            VersionManager::Sdkman => "sdkman",
        }
    }

    /// Versions directory relative to the user's home
    pub fn versions_dir(&self) -> &'static str {
        match self {
            VersionManager::Nvm => ".nvm/versions/node",
            VersionManager::Pyenv => ".pyenv/versions",
            VersionManager::Rbenv => ".rbenv/versions",
            VersionManager::Goenv => ".goenv/versions",
            VersionManager::Sdkman => ".sdkman/candidates/java",
        }
    }

    /// The manager's own uninstall invocation for `version`.
    ///
    /// nvm and sdkman are shell functions, so they are sourced through bash.
    /// `version` comes from a directory name and is quoted into the script.
    pub fn uninstall_command(&self, version: &str) -> (String, Vec<String>) {
        let bash = |script: String| ("bash".to_string(), vec!["-c".to_string(), script]);
        match self {
            VersionManager::Nvm => bash(format!(
                "source \"$HOME/.nvm/nvm.sh\" && nvm uninstall {}",
                shell_quote(version)
            )),
            VersionManager::Sdkman => bash(format!(
                "source \"$HOME/.sdkman/bin/sdkman-init.sh\" && sdk uninstall java {}",
                shell_quote(version)
            )),
            VersionManager::Pyenv => (
                "pyenv".to_string(),
                vec!["uninstall".into(), "-f".into(), version.to_string()],
            ),
            VersionManager::Rbenv => (
                "rbenv".to_string(),
                vec!["uninstall".into(), "-f".into(), version.to_string()],
            ),
            VersionManager::Goenv => (
                "goenv".to_string(),
                vec!["uninstall".into(), "-f".into(), version.to_string()],
            ),
        }
    }
}

/// Immutable catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageDescriptor {
    pub name: String,
    pub description: String,
    /// Relative to the install root, validated before use
    pub script_path: String,
    /// Catalog names or bare system commands, in declaration order
    pub dependencies: Vec<String>,
    /// Executables whose presence on PATH means "installed"
    pub detection_commands: Vec<String>,
    pub category: Category,
    pub version_support: bool,
    pub default_version: Option<String>,
    pub supported_versions: Vec<String>,
    pub service: Option<ServiceCheck>,
    /// `--version`-style probe: program and arguments
    pub version_probe: Option<(String, Vec<String>)>,
    /// Physical APT package names or glob patterns owned by this package
    pub apt_packages: Vec<String>,
    pub version_manager: Option<VersionManager>,
    /// Config files backed up before the install script runs, relative to the config root
    pub config_files: Vec<String>,
}

impl PackageDescriptor {
    /// A descriptor with conventional defaults: `scripts/<name>.sh`, detected by a
    /// binary of the same name, owning the APT package of the same name.
    pub fn new(name: &str, description: &str, category: Category) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            script_path: format!("scripts/{}.sh", name),
            dependencies: Vec::new(),
            detection_commands: vec![name.to_string()],
            category,
            version_support: false,
            default_version: None,
            supported_versions: Vec::new(),
            service: None,
            version_probe: Some((name.to_string(), vec!["--version".to_string()])),
            apt_packages: vec![name.to_string()],
            version_manager: None,
            config_files: Vec::new(),
        }
    }

    pub fn with_script(mut self, script_path: &str) -> Self {
        self.script_path = script_path.to_string();
        self
    }

    pub fn with_dependencies(mut self, deps: &[&str]) -> Self {
        self.dependencies = deps.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn with_detection(mut self, commands: &[&str]) -> Self {
        self.detection_commands = commands.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_versions(mut self, default: &str, supported: &[&str]) -> Self {
        self.version_support = true;
        self.default_version = Some(default.to_string());
        self.supported_versions = supported.iter().map(|v| v.to_string()).collect();
        self
    }

    pub fn with_service(mut self, unit: &str, tolerate_inactive: bool) -> Self {
        self.service = Some(ServiceCheck {
            unit: unit.to_string(),
            tolerate_inactive,
        });
        self
    }

    pub fn with_version_probe(mut self, program: &str, args: &[&str]) -> Self {
        self.version_probe = Some((
            program.to_string(),
            args.iter().map(|a| a.to_string()).collect(),
        ));
        self
    }

    pub fn with_apt_packages(mut self, packages: &[&str]) -> Self {
        self.apt_packages = packages.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_version_manager(mut self, manager: VersionManager) -> Self {
        self.version_manager = Some(manager);
        self
    }

    pub fn with_config_files(mut self, files: &[&str]) -> Self {
        self.config_files = files.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn supports_version(&self, version: &str) -> bool {
        self.version_support && self.supported_versions.iter().any(|v| v == version)
    }
}

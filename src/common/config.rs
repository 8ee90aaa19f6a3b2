//! Runtime settings loaded from `~/.config/stackctl/config.toml`.
//!
//! Every field has a serde default, so a missing file or a file with only a
//! couple of keys is fine. CLI flags are applied on top by the binary.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::paths;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory the package script paths are resolved against
    pub install_root: PathBuf,
    /// Where rollback points are persisted
    pub rollback_dir: PathBuf,
    /// Bounded wait for a package lock
    pub lock_timeout_secs: u64,
    /// Hard limit for a single install script; unset means wait forever
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_timeout_secs: Option<u64>,
    /// Rollback points older than this are swept by `cleanup`
    pub rollback_max_age_hours: u64,
    /// Run batches concurrently by default
    pub parallel: bool,
    /// Prefix probed by the manual-install removal strategy
    pub usr_local: PathBuf,
    /// Root that descriptor config files are resolved against
    pub config_root: PathBuf,
    /// Home directory probed by user and version-manager strategies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            install_root: paths::default_install_root(),
            rollback_dir: paths::default_rollback_dir(),
            lock_timeout_secs: 30,
            script_timeout_secs: None,
            rollback_max_age_hours: 24,
            parallel: false,
            usr_local: PathBuf::from("/usr/local"),
            config_root: PathBuf::from("/"),
            home: None,
        }
    }
}

impl Settings {
    /// Load settings from an explicit path, or the default location.
    ///
    /// An explicit path must exist; the default location may be absent.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Configuration file not found: {}", path.display());
                }
                path.to_path_buf()
            }
            None => {
                let path = paths::default_config_file()?;
                if !path.exists() {
                    return Ok(Self::default());
                }
                path
            }
        };

        let content = fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content)?;
        Ok(settings.expanded())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating config directory {}", parent.display()))?;
        }
        fs::write(path, content).with_context(|| format!("writing config to {}", path.display()))?;
        Ok(())
    }

    fn expanded(mut self) -> Self {
        self.install_root = paths::expand_path(&self.install_root);
        self.rollback_dir = paths::expand_path(&self.rollback_dir);
        self.usr_local = paths::expand_path(&self.usr_local);
        self.config_root = paths::expand_path(&self.config_root);
        self.home = self.home.map(|home| paths::expand_path(&home));
        self
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    pub fn script_timeout(&self) -> Option<Duration> {
        self.script_timeout_secs.map(Duration::from_secs)
    }

    pub fn rollback_max_age(&self) -> Duration {
        hours(self.rollback_max_age_hours)
    }
}

/// `count` hours, saturating instead of overflowing
pub fn hours(count: u64) -> Duration {
    Duration::from_secs(count.saturating_mul(3600))
}

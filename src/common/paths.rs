use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Centralized path management for stackctl

/// Get the stackctl config directory (not created here; config may legitimately be absent)
pub fn stackctl_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .context("Unable to determine user config directory")?
        .join("stackctl");
    Ok(config_dir)
}

/// Default location of the config file
pub fn default_config_file() -> Result<PathBuf> {
    Ok(stackctl_config_dir()?.join("config.toml"))
}

/// Per-user data directory: `$XDG_DATA_HOME/stackctl`, else `~/.local/share/stackctl`.
/// Not created here.
pub fn stackctl_data_dir() -> PathBuf {
    dirs::data_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stackctl")
}

/// Default directory for on-disk rollback points
pub fn default_rollback_dir() -> PathBuf {
    stackctl_data_dir().join("rollback")
}

/// Where `completions install` writes scripts unless given `--output`
pub fn default_completions_dir() -> PathBuf {
    stackctl_data_dir().join("completions")
}

/// Directory the install scripts are resolved against when nothing else is configured:
/// the directory containing the running executable.
pub fn default_install_root() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Expand `~` and environment variables in a configured path
pub fn expand_path(raw: &Path) -> PathBuf {
    let raw = raw.to_string_lossy();
    match shellexpand::full(&raw) {
        Ok(expanded) => PathBuf::from(expanded.into_owned()),
        Err(_) => PathBuf::from(shellexpand::tilde(&raw).into_owned()),
    }
}

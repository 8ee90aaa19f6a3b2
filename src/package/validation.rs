//! Input validation: package names, versions and script paths.
//!
//! All checks fail closed with [`OrchestratorError::Validation`].

use lazy_static::lazy_static;
use regex::Regex;
use std::path::{Component, Path, PathBuf};

use crate::error::{OrchestratorError, Result};

lazy_static! {
    static ref NAME_RE: Regex = Regex::new(r"^[a-z0-9][a-z0-9._+-]{0,63}$").expect("valid regex");
    static ref VERSION_RE: Regex =
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._+-]{0,31}$").expect("valid regex");
}

/// Words that would be ambiguous on the command line or in paths
pub const RESERVED_NAMES: &[&str] = &[
    "all", "none", "help", "install", "remove", "list", "status", "order", "check", "cleanup",
    "root", "system", "default", "true", "false", "null",
];

pub fn validate_package_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(OrchestratorError::validation("package name is empty"));
    }
    if !NAME_RE.is_match(name) {
        return Err(OrchestratorError::validation(format!(
            "package name '{}' may only contain lowercase letters, digits, '.', '_', '+' and '-'",
            name
        )));
    }
    if name.contains("..") {
        return Err(OrchestratorError::validation(format!(
            "package name '{}' contains '..'",
            name
        )));
    }
    if RESERVED_NAMES.contains(&name) {
        return Err(OrchestratorError::validation(format!(
            "'{}' is a reserved word and cannot be used as a package name",
            name
        )));
    }
    Ok(())
}

pub fn validate_version(version: &str) -> Result<()> {
    if !VERSION_RE.is_match(version) || version.contains("..") {
        return Err(OrchestratorError::validation(format!(
            "'{}' is not a valid version string",
            version
        )));
    }
    Ok(())
}

/// Lowercase, trim and de-duplicate user supplied names, keeping first occurrence order
pub fn sanitize_names<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    raw.iter()
        .map(|name| name.as_ref().trim().to_lowercase())
        .filter(|name| !name.is_empty())
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// Reject absolute paths and anything containing `..`
pub fn validate_relative_path(relative: &str) -> Result<()> {
    if relative.trim().is_empty() {
        return Err(OrchestratorError::validation("path is empty"));
    }
    let path = Path::new(relative);
    if path.is_absolute() {
        return Err(OrchestratorError::validation(format!(
            "path '{}' must be relative",
            relative
        )));
    }
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => {
                return Err(OrchestratorError::validation(format!(
                    "path '{}' must not escape its root",
                    relative
                )));
            }
        }
    }
    if relative.contains("..") {
        return Err(OrchestratorError::validation(format!(
            "path '{}' must not contain '..'",
            relative
        )));
    }
    Ok(())
}

/// Join `relative` onto `root`, making sure the result stays inside `root`.
///
/// When the target exists, symlinks are resolved and the check is repeated on
/// the canonical paths.
pub fn safe_join(root: &Path, relative: &str) -> Result<PathBuf> {
    validate_relative_path(relative)?;

    let joined = root.join(relative);
    if !joined.starts_with(root) {
        return Err(OrchestratorError::validation(format!(
            "path '{}' resolves outside {}",
            relative,
            root.display()
        )));
    }

    if joined.exists() {
        let canonical_root = root.canonicalize()?;
        let canonical = joined.canonicalize()?;
        if !canonical.starts_with(&canonical_root) {
            return Err(OrchestratorError::validation(format!(
                "path '{}' resolves outside {} via a symlink",
                relative,
                root.display()
            )));
        }
    }

    Ok(joined)
}

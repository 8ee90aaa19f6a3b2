//! Installation state detection.

use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;

use super::descriptor::PackageDescriptor;
use crate::common::process::SystemProbe;
use crate::ui::prelude::*;

lazy_static! {
    static ref DOTTED_VERSION: Regex = Regex::new(r"\d+(?:\.\d+)+").expect("valid regex");
}

/// Pull a version out of `--version` style output: the first dotted number,
/// otherwise the first non-empty line.
pub fn extract_version(output: &str) -> String {
    if let Some(found) = DOTTED_VERSION.find(output) {
        return found.as_str().to_string();
    }
    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Whether a detected version satisfies a requested one.
///
/// A request is a version prefix on component boundaries: `20` is satisfied by
/// `20.11.1`, `3.1` is not satisfied by `3.12.0`.
pub fn version_matches(installed: &str, requested: &str) -> bool {
    let installed = installed.trim_start_matches('v');
    let requested = requested.trim_start_matches('v');
    if installed.is_empty() || requested.is_empty() {
        return false;
    }
    installed == requested
        || installed
            .strip_prefix(requested)
            .is_some_and(|rest| rest.starts_with('.') || rest.starts_with('-'))
}

#[derive(Clone)]
pub struct Detector {
    probe: Arc<dyn SystemProbe>,
}

impl Detector {
    pub fn new(probe: Arc<dyn SystemProbe>) -> Self {
        Self { probe }
    }

    pub fn probe(&self) -> &Arc<dyn SystemProbe> {
        &self.probe
    }

    /// All detection commands resolve, and any associated service is active.
    ///
    /// For services marked `tolerate_inactive` (the PHP FPM pool) a stopped unit
    /// still counts as installed when the CLI resolves.
    pub fn is_installed(&self, pkg: &PackageDescriptor) -> bool {
        if pkg.detection_commands.is_empty() {
            return false;
        }
        if !pkg
            .detection_commands
            .iter()
            .all(|cmd| self.probe.command_exists(cmd))
        {
            return false;
        }

        match &pkg.service {
            None => true,
            Some(service) => {
                if self.probe.service_active(&service.unit) {
                    return true;
                }
                if service.tolerate_inactive {
                    emit(
                        Level::Debug,
                        "detect.service.inactive",
                        &format!(
                            "{} is inactive but the {} CLI resolves; treating as installed",
                            service.unit, pkg.name
                        ),
                        None,
                    );
                    return true;
                }
                false
            }
        }
    }

    /// Whether a bare system command is available
    pub fn command_available(&self, command: &str) -> bool {
        self.probe.command_exists(command)
    }

    /// Version reported by the package's probe; empty when the binary is missing
    pub fn system_version(&self, pkg: &PackageDescriptor) -> String {
        let Some((program, args)) = &pkg.version_probe else {
            return String::new();
        };
        if !self.probe.command_exists(program) {
            return String::new();
        }
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.probe
            .command_output(program, &args)
            .map(|output| extract_version(&output))
            .unwrap_or_default()
    }
}

//! stackctl: install, roll back and safely remove developer runtimes,
//! databases and web servers on Debian/Ubuntu hosts.
//!
//! - [`package`]: the catalog, dependency graph and install-state detection
//! - [`orchestrator`]: locks, rollback points, installation, removal and the
//!   batch drivers
//! - [`common`]: settings, paths and the host seams ([`common::SystemProbe`],
//!   [`common::CommandRunner`])

pub mod cli;
pub mod common;
pub mod completions;
pub mod error;
pub mod orchestrator;
pub mod package;
pub mod ui;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{OrchestratorError, Result};

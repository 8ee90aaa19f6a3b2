//! Package catalog, dependency graph and installation state.
//!
//! # Architecture
//!
//! - [`PackageDescriptor`]: immutable catalog entry
//! - [`PackageRegistry`] / [`RegistryView`]: the catalog, mutable for tests, read-only
//!   for everything that orchestrates
//! - [`DependencyGraph`]: cycle detection and installation order
//! - [`Detector`]: "is it installed, and which version"

pub mod catalog;
mod descriptor;
mod detect;
pub mod graph;
mod registry;
pub mod validation;

pub use descriptor::{Category, PackageDescriptor, ServiceCheck, VersionManager};
pub use detect::{Detector, extract_version, version_matches};
pub use graph::{DependencyGraph, detect_circular_dependencies, installation_order};
pub use registry::{PackageRegistry, RegistryView};

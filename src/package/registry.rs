use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use super::catalog::builtin_packages;
use super::descriptor::PackageDescriptor;
use super::validation::{validate_package_name, validate_relative_path};
use crate::error::{OrchestratorError, Result};

/// The package catalog.
///
/// Entries are kept sorted by name, which also fixes iteration order for the
/// dependency graph. Mutation (`add`, `update`, `remove`) exists for tests and
/// tooling; the orchestration path only ever sees a [`RegistryView`].
#[derive(Debug, Default)]
pub struct PackageRegistry {
    packages: RwLock<BTreeMap<String, PackageDescriptor>>,
}

impl PackageRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry populated from the built-in catalog
    pub fn builtin() -> Result<Self> {
        Self::from_descriptors(builtin_packages())
    }

    pub fn from_descriptors(descriptors: Vec<PackageDescriptor>) -> Result<Self> {
        let registry = Self::empty();
        for descriptor in descriptors {
            registry.add(descriptor)?;
        }
        Ok(registry)
    }

    fn check(descriptor: &PackageDescriptor) -> Result<()> {
        validate_package_name(&descriptor.name)?;
        validate_relative_path(&descriptor.script_path)?;
        for config in &descriptor.config_files {
            validate_relative_path(config)?;
        }
        if let Some(default) = &descriptor.default_version {
            if !descriptor.supports_version(default) {
                return Err(OrchestratorError::validation(format!(
                    "default version {} of '{}' is not in its supported versions",
                    default, descriptor.name
                )));
            }
        }
        Ok(())
    }

    pub fn add(&self, descriptor: PackageDescriptor) -> Result<()> {
        Self::check(&descriptor)?;
        let mut packages = self
            .packages
            .write()
            .map_err(|_| anyhow::anyhow!("package registry lock poisoned"))?;
        if packages.contains_key(&descriptor.name) {
            return Err(OrchestratorError::validation(format!(
                "package '{}' is already registered",
                descriptor.name
            )));
        }
        packages.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    pub fn update(&self, descriptor: PackageDescriptor) -> Result<()> {
        Self::check(&descriptor)?;
        let mut packages = self
            .packages
            .write()
            .map_err(|_| anyhow::anyhow!("package registry lock poisoned"))?;
        match packages.get_mut(&descriptor.name) {
            Some(existing) => {
                *existing = descriptor;
                Ok(())
            }
            None => Err(OrchestratorError::UnknownPackage(descriptor.name)),
        }
    }

    pub fn remove(&self, name: &str) -> Result<PackageDescriptor> {
        let mut packages = self
            .packages
            .write()
            .map_err(|_| anyhow::anyhow!("package registry lock poisoned"))?;
        packages
            .remove(name)
            .ok_or_else(|| OrchestratorError::UnknownPackage(name.to_string()))
    }

    /// Freeze into a shareable read-only view
    pub fn into_view(self) -> RegistryView {
        RegistryView {
            inner: Arc::new(self),
        }
    }
}

/// Read-only handle on the registry, cheap to clone across tasks
#[derive(Debug, Clone)]
pub struct RegistryView {
    inner: Arc<PackageRegistry>,
}

impl RegistryView {
    pub fn builtin() -> Result<Self> {
        Ok(PackageRegistry::builtin()?.into_view())
    }

    /// Share a registry that tests keep mutating through the original `Arc`
    pub fn shared(registry: Arc<PackageRegistry>) -> Self {
        Self { inner: registry }
    }

    pub fn get(&self, name: &str) -> Option<PackageDescriptor> {
        self.inner
            .packages
            .read()
            .ok()
            .and_then(|packages| packages.get(name).cloned())
    }

    pub fn require(&self, name: &str) -> Result<PackageDescriptor> {
        self.get(name)
            .ok_or_else(|| OrchestratorError::UnknownPackage(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner
            .packages
            .read()
            .map(|packages| packages.contains_key(name))
            .unwrap_or(false)
    }

    pub fn names(&self) -> Vec<String> {
        self.inner
            .packages
            .read()
            .map(|packages| packages.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Snapshot of every descriptor, sorted by name
    pub fn all(&self) -> Vec<PackageDescriptor> {
        self.inner
            .packages
            .read()
            .map(|packages| packages.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.inner.packages.read().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::descriptor::Category;

    fn pkg(name: &str) -> PackageDescriptor {
        PackageDescriptor::new(name, "test package", Category::Tool)
    }

    #[test]
    fn builtin_registry_loads() {
        let view = RegistryView::builtin().unwrap();
        assert!(view.contains("node"));
        assert!(view.contains("postgresql"));
        assert!(!view.contains("curl"));
        let names = view.names();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn add_rejects_duplicates_and_bad_names() {
        let registry = PackageRegistry::empty();
        registry.add(pkg("alpha")).unwrap();
        assert!(matches!(
            registry.add(pkg("alpha")),
            Err(OrchestratorError::Validation(_))
        ));
        assert!(registry.add(pkg("Bad Name")).is_err());
        assert!(registry.add(pkg("beta").with_script("/etc/evil.sh")).is_err());
    }

    #[test]
    fn update_and_remove() {
        let registry = Arc::new(PackageRegistry::empty());
        registry.add(pkg("alpha")).unwrap();
        let view = RegistryView::shared(registry.clone());

        registry
            .update(pkg("alpha").with_dependencies(&["curl"]))
            .unwrap();
        assert_eq!(view.require("alpha").unwrap().dependencies, vec!["curl"]);

        assert!(matches!(
            registry.update(pkg("ghost")),
            Err(OrchestratorError::UnknownPackage(_))
        ));

        registry.remove("alpha").unwrap();
        assert!(view.is_empty());
        assert!(registry.remove("alpha").is_err());
    }

    #[test]
    fn default_version_must_be_supported() {
        let mut bad = pkg("gamma").with_versions("2", &["1", "2"]);
        bad.default_version = Some("3".to_string());
        assert!(PackageRegistry::empty().add(bad).is_err());
    }
}

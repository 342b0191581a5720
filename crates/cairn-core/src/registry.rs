//! The recipe registry: every loaded package, keyed by name.
//!
//! The registry is populated once at startup and handed to resolvers as a
//! read-only reference. Loading is all-or-nothing: the first malformed
//! recipe aborts the load and nothing is admitted.

use std::collections::BTreeMap;
use std::path::Path;

use crate::errors::{CairnError, CairnResult};
use crate::recipe::Package;

/// All loaded recipes, keyed by package name.
#[derive(Debug, Default)]
pub struct Registry {
    packages: BTreeMap<String, Package>,
}

impl Registry {
    /// Build a registry from already-parsed packages (tests, embedding).
    pub fn from_packages(packages: Vec<Package>) -> CairnResult<Self> {
        let mut registry = Self::default();
        for pkg in packages {
            registry.insert(pkg)?;
        }
        Ok(registry)
    }

    /// Load every `*.toml` recipe in a directory.
    ///
    /// Files are read in name order so load diagnostics are stable.
    pub fn load_dir(dir: &Path) -> CairnResult<Self> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|e| e == "toml") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut registry = Self::default();
        for path in &paths {
            let pkg = Package::from_path(path)?;
            tracing::debug!("loaded recipe `{}` from {}", pkg.name, path.display());
            registry.insert(pkg)?;
        }
        tracing::info!(
            "recipe registry loaded: {} packages from {}",
            registry.len(),
            dir.display()
        );
        Ok(registry)
    }

    fn insert(&mut self, pkg: Package) -> CairnResult<()> {
        if self.packages.contains_key(&pkg.name) {
            return Err(CairnError::MalformedRecipe {
                package: pkg.name.clone(),
                message: "duplicate recipe for this package name".to_string(),
            });
        }
        self.packages.insert(pkg.name.clone(), pkg);
        Ok(())
    }

    /// Look up a package, failing with `PackageNotFound`.
    pub fn get(&self, name: &str) -> CairnResult<&Package> {
        self.packages
            .get(name)
            .ok_or_else(|| CairnError::PackageNotFound {
                name: name.to_string(),
            })
    }

    pub fn find(&self, name: &str) -> Option<&Package> {
        self.packages.get(name)
    }

    /// All packages in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const MINIMAL: &str = r#"
[package]
name = "{name}"

[[version]]
version = "1.0"
sha256 = "00"
"#;

    fn write_recipe(dir: &Path, name: &str) {
        fs::write(
            dir.join(format!("{name}.toml")),
            MINIMAL.replace("{name}", name),
        )
        .unwrap();
    }

    #[test]
    fn load_directory() {
        let tmp = TempDir::new().unwrap();
        write_recipe(tmp.path(), "alpha");
        write_recipe(tmp.path(), "beta");
        fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

        let registry = Registry::load_dir(tmp.path()).unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.find("alpha").is_some());
        assert!(registry.find("beta").is_some());
    }

    #[test]
    fn malformed_recipe_aborts_load() {
        let tmp = TempDir::new().unwrap();
        write_recipe(tmp.path(), "alpha");
        fs::write(tmp.path().join("broken.toml"), "[package]\nname = \"broken\"\n").unwrap();

        let err = Registry::load_dir(tmp.path()).unwrap_err();
        assert!(matches!(err, CairnError::MalformedRecipe { .. }), "{err}");
    }

    #[test]
    fn duplicate_package_name_rejected() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("a.toml"),
            MINIMAL.replace("{name}", "same"),
        )
        .unwrap();
        fs::write(
            tmp.path().join("b.toml"),
            MINIMAL.replace("{name}", "same"),
        )
        .unwrap();

        let err = Registry::load_dir(tmp.path()).unwrap_err();
        assert!(matches!(err, CairnError::MalformedRecipe { .. }));
    }

    #[test]
    fn missing_package_lookup() {
        let registry = Registry::default();
        let err = registry.get("ghost").unwrap_err();
        assert!(matches!(err, CairnError::PackageNotFound { .. }));
    }
}

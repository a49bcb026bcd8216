//! Composition of multiple content packages
//!
//! The [`PackageManager`] owns the class registry and every loaded
//! package, assigns each package its small numeric ID in load order, and
//! acts as the package-ID resolver for readers opened while later packages
//! load (so cross-package references resolve to the IDs of packages that
//! came before).

use std::collections::HashMap;
use std::path::Path;

use crate::config::ContentConfig;
use crate::reader::{PackageIdResolver, Reader};
use crate::registry::{ClassId, ClassRegistry, Entity, RegistryError};

use super::{LoadError, Package, PACKAGE_INDEX};

/// Name-to-ID table of the packages a manager has assigned IDs to.
#[derive(Debug, Default)]
struct PackageIds {
    by_name: HashMap<String, u32>,
}

impl PackageIdResolver for PackageIds {
    fn resolve(&self, package_name: &str) -> Option<u32> {
        self.by_name.get(package_name).copied()
    }
}

/// Owns the class registry and an ordered set of loaded packages.
///
/// There is no partial rollback: a failing package load aborts and leaves
/// already loaded packages in place, so callers wanting atomicity must
/// discard the whole manager on error.
pub struct PackageManager {
    classes: ClassRegistry,
    packages: Vec<Package>,
    ids: PackageIds,
}

impl PackageManager {
    /// Creates a manager with the built-in content classes registered.
    pub fn new() -> Result<Self, RegistryError> {
        let mut classes = ClassRegistry::new();
        crate::presets::register_core_classes(&mut classes)?;
        Ok(Self::with_registry(classes))
    }

    /// Creates a manager around an externally prepared class registry,
    /// for callers registering their own content types.
    pub fn with_registry(classes: ClassRegistry) -> Self {
        Self {
            classes,
            packages: Vec::new(),
            ids: PackageIds::default(),
        }
    }

    /// Loads every package named by the configuration, in order.
    ///
    /// With `allow_missing_packages` set, packages whose index file does
    /// not exist are skipped with a warning instead of failing the load.
    pub fn load_all(&mut self, config: &ContentConfig) -> Result<(), LoadError> {
        log::info!(
            "loading {} package(s) from '{}'",
            config.packages.len(),
            config.content_root.display()
        );
        for name in &config.packages {
            let index_path = Path::new(name).join(PACKAGE_INDEX);
            let reader = if config.allow_missing_packages {
                match Reader::open_optional(&config.content_root, &index_path)? {
                    Some(reader) => reader,
                    None => {
                        log::warn!("package '{}' is not present; skipping", name);
                        continue;
                    }
                }
            } else {
                Reader::open(&config.content_root, &index_path)?
            };
            let reader = reader
                .with_overwrite_existing(config.overwrite_duplicates)
                .with_skip_includes(config.skip_includes)
                .with_progress(crate::foundation::logging::progress_logger());
            self.load_prepared(reader, name)?;
        }
        Ok(())
    }

    /// Loads one package from under `root` with default reader settings.
    pub fn load_package(&mut self, root: impl AsRef<Path>, name: &str) -> Result<&Package, LoadError> {
        let reader = Reader::open(root, Path::new(name).join(PACKAGE_INDEX))?;
        self.load_prepared(reader, name)
    }

    fn load_prepared(&mut self, mut reader: Reader, name: &str) -> Result<&Package, LoadError> {
        let id = self.packages.len() as u32;
        self.ids.by_name.insert(name.to_string(), id);
        reader.resolve_package_id(&self.ids);

        let package = Package::load_with(reader, name, &mut self.classes);
        let package = match package {
            Ok(package) => package,
            Err(err) => {
                // The ID reservation is taken back so a retry can reuse it.
                self.ids.by_name.remove(name);
                return Err(err);
            }
        };
        let index = self.packages.len();
        self.packages.push(package);
        Ok(&self.packages[index])
    }

    /// The shared class registry.
    pub fn classes(&self) -> &ClassRegistry {
        &self.classes
    }

    /// Mutable access to the class registry, for registering additional
    /// content types before loading.
    pub fn classes_mut(&mut self) -> &mut ClassRegistry {
        &mut self.classes
    }

    /// Every loaded package, in load (and therefore ID) order.
    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    /// Looks a loaded package up by its directory name.
    pub fn package(&self, name: &str) -> Option<&Package> {
        let id = self.ids.resolve(name)?;
        self.package_by_id(id)
    }

    /// Looks a loaded package up by its numeric ID.
    pub fn package_by_id(&self, id: u32) -> Option<&Package> {
        self.packages.get(id as usize)
    }

    /// The numeric ID assigned to a package name, if it has been loaded.
    pub fn package_id(&self, name: &str) -> Option<u32> {
        self.ids.resolve(name)
    }

    /// Finds a preset by exact type and name, searching packages in
    /// reverse load order so later packages shadow earlier ones.
    pub fn find_preset(&self, exact_type: ClassId, name: &str) -> Option<&dyn Entity> {
        self.packages
            .iter()
            .rev()
            .find_map(|package| package.get_preset(&self.classes, exact_type, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_file(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    const BASE_INDEX: &str = "\
Package
\tPackageName = Base Content
\tAuthor = The Team
\tVersion = 2
\tAddPreset = Material
\t\tPresetName = Rock
\t\tFriction = 0.5
";

    const EXTRA_INDEX: &str = "\
Package
\tPackageName = Extra Content
\tAddPreset = Material
\t\tPresetName = Rock
\t\tFriction = 0.9
";

    #[test]
    fn test_packages_get_sequential_ids() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "base.pack/index.ini", BASE_INDEX);
        write_file(dir.path(), "extra.pack/index.ini", EXTRA_INDEX);

        let mut manager = PackageManager::new().unwrap();
        manager.load_package(dir.path(), "base.pack").unwrap();
        manager.load_package(dir.path(), "extra.pack").unwrap();

        assert_eq!(manager.package_id("base.pack"), Some(0));
        assert_eq!(manager.package_id("extra.pack"), Some(1));
        assert_eq!(
            manager.package("base.pack").unwrap().friendly_name(),
            "Base Content"
        );
        // Each package's presets were stamped with its own ID.
        let base = manager.package("base.pack").unwrap();
        assert!(base.presets().all(|p| p.base().package_id() == Some(0)));
    }

    #[test]
    fn test_find_preset_prefers_later_packages() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "base.pack/index.ini", BASE_INDEX);
        write_file(dir.path(), "extra.pack/index.ini", EXTRA_INDEX);

        let mut manager = PackageManager::new().unwrap();
        manager.load_package(dir.path(), "base.pack").unwrap();
        manager.load_package(dir.path(), "extra.pack").unwrap();

        let material_id = manager.classes().lookup("Material").unwrap();
        let rock = manager.find_preset(material_id, "Rock").unwrap();
        assert_eq!(rock.base().package_id(), Some(1));
    }

    #[test]
    fn test_load_all_with_missing_package() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "base.pack/index.ini", BASE_INDEX);

        let config = ContentConfig {
            content_root: dir.path().to_path_buf(),
            packages: vec!["base.pack".to_string(), "absent.pack".to_string()],
            allow_missing_packages: true,
            ..ContentConfig::default()
        };

        let mut manager = PackageManager::new().unwrap();
        manager.load_all(&config).unwrap();
        assert_eq!(manager.packages().len(), 1);
        assert!(manager.package("absent.pack").is_none());
    }

    #[test]
    fn test_load_all_missing_package_is_fatal_by_default() {
        let dir = tempfile::tempdir().unwrap();

        let config = ContentConfig {
            content_root: dir.path().to_path_buf(),
            packages: vec!["absent.pack".to_string()],
            ..ContentConfig::default()
        };

        let mut manager = PackageManager::new().unwrap();
        assert!(manager.load_all(&config).is_err());
    }
}

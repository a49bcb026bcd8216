//! End-to-end package loading tests over real files
//!
//! These exercise the full path: index files on disk, include splicing,
//! class resolution, pooled instantiation, registration and round-trip
//! serialization.

use std::fs;
use std::path::Path;

use crate::package::{LoadError, Package, PackageManager};
use crate::presets::{register_core_classes, Material, Weapon};
use crate::reader::Reader;
use crate::registry::ClassRegistry;
use crate::writer::Writer;

fn write_file(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

fn registry() -> ClassRegistry {
    let mut classes = ClassRegistry::new();
    register_core_classes(&mut classes).unwrap();
    classes
}

const INDEX: &str = "\
Package
\tPackageName = Base Content
\tAuthor = The Team
\tDescription = Core materials and devices
\tVersion = 3
\tIconFile = base.pack/icon.png
\tIncludeFile = base.pack/materials.ini
\tAddPreset = Weapon
\t\tPresetName = Service Pistol
\t\tAddToGroup = Weapons
\t\tMass = 1.2
\t\tRateOfFire = 300
\t\tMagazineSize = 12
\t\tIcon = Icon
\t\t\tBitmapFile = base.pack/pistol_icon.png
\t\t\tFrameCount = 2
";

const MATERIALS: &str = "\
// Shared surface materials.
AddPreset = Material
\tPresetName = Rock
\tAddToGroup = Terrain
\tIndex = 3
\tFriction = 0.6
\tColor = Color
\t\tR = 120
\t\tG = 115
\t\tB = 110
AddPreset = Material
\tPresetName = Sand
\tAddToGroup = Terrain
\tAddToGroup = Loose
\tIndex = 4
\tFriction = 0.9
";

#[test]
fn test_full_package_load() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "base.pack/index.ini", INDEX);
    write_file(dir.path(), "base.pack/materials.ini", MATERIALS);

    let mut classes = registry();
    let package = Package::load(dir.path(), "base.pack", &mut classes, None, None).unwrap();

    assert_eq!(package.friendly_name(), "Base Content");
    assert_eq!(package.author(), "The Team");
    assert_eq!(package.version(), 3);
    assert_eq!(package.icon_file(), "base.pack/icon.png");
    assert_eq!(package.len(), 3);

    // Included presets come first, in include order.
    let names: Vec<&str> = package.presets().map(|p| p.base().preset_name()).collect();
    assert_eq!(names, ["Rock", "Sand", "Service Pistol"]);

    // The source file records point at the physical files.
    let material_id = classes.lookup("Material").unwrap();
    let weapon_id = classes.lookup("Weapon").unwrap();
    assert_eq!(
        package.data_location(&classes, material_id, "Rock"),
        Some("base.pack/materials.ini")
    );
    assert_eq!(
        package.data_location(&classes, weapon_id, "Service Pistol"),
        Some("base.pack/index.ini")
    );

    // Groups from every file were cataloged.
    assert_eq!(package.groups(), ["Loose", "Terrain", "Weapons"]);

    // Parsed values made it through the include boundary intact.
    let rock = package.get_preset(&classes, material_id, "Rock").unwrap();
    let rock = rock.as_any().downcast_ref::<Material>().unwrap();
    assert_eq!(rock.index(), 3);
    assert_eq!(rock.friction(), 0.6);
    assert_eq!(rock.color().r, 120);

    let pistol = package
        .get_preset(&classes, weapon_id, "Service Pistol")
        .unwrap();
    let pistol = pistol.as_any().downcast_ref::<Weapon>().unwrap();
    assert_eq!(pistol.magazine_size(), 12);
    assert_eq!(pistol.icon().frame_count(), 2);
}

#[test]
fn test_duplicate_preset_keeps_first_without_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "dup.pack/index.ini",
        "Package\n\tAddPreset = Material\n\t\tPresetName = Rock\n\t\tFriction = 0.5\n\tAddPreset = Material\n\t\tPresetName = Rock\n\t\tFriction = 0.9\n",
    );

    let mut classes = registry();
    let package = Package::load(dir.path(), "dup.pack", &mut classes, None, None).unwrap();
    assert_eq!(package.len(), 1);

    let material_id = classes.lookup("Material").unwrap();
    let rock = package.get_preset(&classes, material_id, "Rock").unwrap();
    let rock = rock.as_any().downcast_ref::<Material>().unwrap();
    assert_eq!(rock.friction(), 0.5);
}

#[test]
fn test_duplicate_preset_overwrites_when_requested() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "dup.pack/index.ini",
        "Package\n\tAddPreset = Material\n\t\tPresetName = Rock\n\t\tFriction = 0.5\n\tAddPreset = Material\n\t\tPresetName = Rock\n\t\tFriction = 0.9\n",
    );

    let mut classes = registry();
    let reader = Reader::open(dir.path(), "dup.pack/index.ini")
        .unwrap()
        .with_overwrite_existing(true);
    let package = Package::load_with(reader, "dup.pack", &mut classes).unwrap();
    assert_eq!(package.len(), 1);

    let material_id = classes.lookup("Material").unwrap();
    let rock = package.get_preset(&classes, material_id, "Rock").unwrap();
    let rock = rock.as_any().downcast_ref::<Material>().unwrap();
    assert_eq!(rock.friction(), 0.9);
}

#[test]
fn test_unknown_preset_type_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "bad.pack/index.ini",
        "Package\n\tAddPreset = Gizmo\n\t\tPresetName = What\n",
    );

    let mut classes = registry();
    let result = Package::load(dir.path(), "bad.pack", &mut classes, None, None);
    assert!(matches!(
        result,
        Err(LoadError::UnknownPresetType { ref class, .. }) if class == "Gizmo"
    ));
}

#[test]
fn test_missing_declaration_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "bad.pack/index.ini", "NotAPackage\n");

    let mut classes = registry();
    let result = Package::load(dir.path(), "bad.pack", &mut classes, None, None);
    assert!(matches!(result, Err(LoadError::MissingDeclaration { .. })));
}

#[test]
fn test_metadata_only_read() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "base.pack/index.ini", INDEX);
    // The include target is deliberately absent: metadata reads must not
    // follow includes at all.
    let package = Package::read_metadata(dir.path(), "base.pack", None).unwrap();

    assert_eq!(package.friendly_name(), "Base Content");
    assert_eq!(package.version(), 3);
    assert!(package.is_empty());
}

#[test]
fn test_save_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "base.pack/index.ini", INDEX);
    write_file(dir.path(), "base.pack/materials.ini", MATERIALS);

    let mut classes = registry();
    let package = Package::load(dir.path(), "base.pack", &mut classes, None, None).unwrap();

    let mut writer = Writer::to_buffer();
    package.save(&mut writer).unwrap();
    let text = writer.into_string().unwrap();

    let mut reparsed = Package::new("base.pack");
    let mut reader = Reader::from_string(&text);
    reparsed.read_from(&mut reader, &mut classes).unwrap();

    assert_eq!(reparsed.friendly_name(), package.friendly_name());
    assert_eq!(reparsed.version(), package.version());
    assert_eq!(reparsed.len(), package.len());

    let names: Vec<&str> = reparsed.presets().map(|p| p.base().preset_name()).collect();
    assert_eq!(names, ["Rock", "Sand", "Service Pistol"]);

    let material_id = classes.lookup("Material").unwrap();
    let rock = reparsed.get_preset(&classes, material_id, "Rock").unwrap();
    let rock = rock.as_any().downcast_ref::<Material>().unwrap();
    assert_eq!(rock.friction(), 0.6);
    assert_eq!(rock.color().g, 115);
}

#[test]
fn test_pool_reuse_across_a_load() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "base.pack/index.ini", INDEX);
    write_file(dir.path(), "base.pack/materials.ini", MATERIALS);

    let mut classes = registry();
    let material_id = classes.lookup("Material").unwrap();
    let _package = Package::load(dir.path(), "base.pack", &mut classes, None, None).unwrap();

    let stats = classes.pool_stats(material_id);
    // Two materials are owned by the package; every scratch instance went
    // back to the pool.
    assert_eq!(stats.in_use, 2);
    assert_eq!(stats.bulk_allocations, 1);
}

#[test]
fn test_manager_resolves_package_ids_through_config() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "base.pack/index.ini", INDEX);
    write_file(dir.path(), "base.pack/materials.ini", MATERIALS);

    let config = crate::config::ContentConfig {
        content_root: dir.path().to_path_buf(),
        packages: vec!["base.pack".to_string()],
        ..crate::config::ContentConfig::default()
    };

    let mut manager = PackageManager::new().unwrap();
    manager.load_all(&config).unwrap();

    let package = manager.package("base.pack").unwrap();
    assert_eq!(package.package_id(), Some(0));
    assert!(package.presets().all(|p| p.base().package_id() == Some(0)));
}

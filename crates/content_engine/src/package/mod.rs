//! Per-package preset registry
//!
//! A [`Package`] owns every preset parsed from one content package: the
//! authoritative, file-ordered list of instances, a type index that lets
//! presets be found under their exact type and every ancestor type, the
//! catalog of group tags seen in the package, and the package-local
//! remapping table for the shared material palette.

pub mod manager;

pub use manager::PackageManager;

use std::collections::HashMap;
use std::io;
use std::path::Path;

use slotmap::{new_key_type, SlotMap};
use thiserror::Error;

use crate::reader::{PackageIdResolver, ProgressCallback, Reader, ReaderError};
use crate::registry::{read_entity, ClassId, ClassRegistry, Entity, RegistryError};
use crate::writer::Writer;

/// File every package is loaded through, at the root of its directory.
pub const PACKAGE_INDEX: &str = "index.ini";

/// Declaration expected on the first line of a package index.
pub const PACKAGE_CLASS_NAME: &str = "Package";

/// Property that introduces an object block in package files.
pub const ADD_PRESET_PROPERTY: &str = "AddPreset";

/// Number of slots in the shared material palette.
pub const MATERIAL_SLOT_COUNT: usize = 256;

new_key_type! {
    /// Stable key of one owned preset within its package.
    pub struct PresetKey;
}

/// Errors produced while loading a content package.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The underlying reader failed fatally.
    #[error(transparent)]
    Reader(#[from] ReaderError),

    /// Class registration or instantiation failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// An object block named a type the registry does not know.
    #[error("unknown preset type '{class}' in {path} at line {line}")]
    UnknownPresetType {
        /// The unresolved type name.
        class: String,
        /// File the block appeared in.
        path: String,
        /// One-based line of the block.
        line: u32,
    },

    /// The index file did not begin with a `Package` declaration.
    #[error("'{path}' does not begin with a {PACKAGE_CLASS_NAME} declaration (found '{found}')")]
    MissingDeclaration {
        /// File that was read.
        path: String,
        /// What the first line actually held.
        found: String,
    },
}

/// One owned preset and where it was read from.
struct PresetEntry {
    preset: Box<dyn Entity>,
    read_from: String,
}

/// The presets, groups and material mappings of one content package.
pub struct Package {
    name: String,
    friendly_name: String,
    author: String,
    description: String,
    version: u32,
    icon_file: String,
    package_id: Option<u32>,
    /// Owns every preset; the sole owner of their lifetimes.
    presets: SlotMap<PresetKey, PresetEntry>,
    /// Keys in file-read order, for faithful re-serialization.
    read_order: Vec<PresetKey>,
    /// Non-owning index: each preset appears under its exact type and
    /// every ancestor type up to the root.
    type_index: HashMap<ClassId, Vec<(String, PresetKey)>>,
    /// Sorted, unique catalog of every group tag registered here.
    group_register: Vec<String>,
    /// Package-local material palette remappings; 0 means unmapped.
    material_mappings: [u8; MATERIAL_SLOT_COUNT],
}

impl Package {
    /// Creates an empty package with the given directory name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            friendly_name: String::new(),
            author: String::new(),
            description: String::new(),
            version: 1,
            icon_file: String::new(),
            package_id: None,
            presets: SlotMap::with_key(),
            read_order: Vec::new(),
            type_index: HashMap::new(),
            group_register: Vec::new(),
            material_mappings: [0; MATERIAL_SLOT_COUNT],
        }
    }

    /// Loads the package `name` from under the content root.
    ///
    /// Opens `<root>/<name>/index.ini` and reads every declared object
    /// block into the returned package. The resolver, when given, supplies
    /// the package's numeric ID.
    pub fn load(
        root: impl AsRef<Path>,
        name: &str,
        classes: &mut ClassRegistry,
        resolver: Option<&dyn PackageIdResolver>,
        progress: Option<ProgressCallback>,
    ) -> Result<Self, LoadError> {
        let mut reader = Reader::open(root, Path::new(name).join(PACKAGE_INDEX))?;
        if let Some(progress) = progress {
            reader = reader.with_progress(progress);
        }
        if let Some(resolver) = resolver {
            reader.resolve_package_id(resolver);
        }
        Self::load_with(reader, name, classes)
    }

    /// Loads a package through an already configured reader; the reader's
    /// overwrite flag decides whether re-declared presets replace earlier
    /// ones.
    pub fn load_with(
        mut reader: Reader,
        name: &str,
        classes: &mut ClassRegistry,
    ) -> Result<Self, LoadError> {
        let mut package = Self::new(name);
        package.package_id = reader.package_id();
        package.read_from(&mut reader, classes)?;
        log::info!(
            "loaded package '{}': {} presets, {} groups",
            package.name,
            package.read_order.len(),
            package.group_register.len()
        );
        Ok(package)
    }

    /// Reads package metadata only, skipping include directives and
    /// stopping at the first object block. Useful for listing available
    /// packages without loading their content.
    pub fn read_metadata(
        root: impl AsRef<Path>,
        name: &str,
        progress: Option<ProgressCallback>,
    ) -> Result<Self, LoadError> {
        let mut reader = Reader::open(root, Path::new(name).join(PACKAGE_INDEX))?
            .with_skip_includes(true);
        if let Some(progress) = progress {
            reader = reader.with_progress(progress);
        }

        let mut package = Self::new(name);
        expect_declaration(&mut reader)?;
        while reader.next_property()? {
            let prop = reader.read_prop_name()?;
            if prop.is_empty() || prop == ADD_PRESET_PROPERTY {
                break;
            }
            if !package.read_metadata_property(&prop, &mut reader)? {
                reader.read_prop_value()?;
            }
        }
        Ok(package)
    }

    /// Reads the whole package body from a reader positioned at the
    /// `Package` declaration.
    pub fn read_from(
        &mut self,
        reader: &mut Reader,
        classes: &mut ClassRegistry,
    ) -> Result<(), LoadError> {
        expect_declaration(reader)?;
        while reader.next_property()? {
            let prop = reader.read_prop_name()?;
            if prop.is_empty() {
                break;
            }
            if !self.read_property(&prop, reader, classes)? {
                let value = reader.read_prop_value()?;
                log::warn!(
                    "unrecognized package property '{}' (value '{}') in {} at line {}",
                    prop,
                    value,
                    reader.file_path(),
                    reader.line_number()
                );
            }
        }
        Ok(())
    }

    fn read_metadata_property(
        &mut self,
        name: &str,
        reader: &mut Reader,
    ) -> Result<bool, ReaderError> {
        match name {
            "PackageName" => self.friendly_name = reader.read_prop_value()?,
            "Author" => self.author = reader.read_prop_value()?,
            "Description" => self.description = reader.read_prop_value()?,
            "Version" => self.version = reader.read_parsed()?,
            "IconFile" => self.icon_file = reader.read_prop_value()?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn read_property(
        &mut self,
        name: &str,
        reader: &mut Reader,
        classes: &mut ClassRegistry,
    ) -> Result<bool, LoadError> {
        if name == ADD_PRESET_PROPERTY {
            self.load_preset(reader, classes)?;
            return Ok(true);
        }
        Ok(self.read_metadata_property(name, reader)?)
    }

    /// Reads one object block: the type name, then the properties, then
    /// registration. The scratch instance is recycled afterwards.
    fn load_preset(
        &mut self,
        reader: &mut Reader,
        classes: &mut ClassRegistry,
    ) -> Result<(), LoadError> {
        let class_name = reader.read_prop_value()?;
        let Some(class_id) = classes.lookup(&class_name) else {
            return Err(LoadError::UnknownPresetType {
                class: class_name,
                path: reader.file_path().to_string(),
                line: reader.line_number(),
            });
        };
        let mut scratch = classes.new_instance(class_id)?;
        read_entity(scratch.as_mut(), reader, false)?;

        let overwrite = reader.overwrite_existing();
        let source = reader.file_path().to_string();
        if !self.add_preset(classes, scratch.as_ref(), overwrite, Some(&source))? {
            log::warn!(
                "preset '{}' of type '{}' is already defined in package '{}'; keeping the first definition",
                scratch.base().preset_name(),
                class_name,
                self.name
            );
        }
        classes.release_instance(class_id, scratch);
        Ok(())
    }

    /// Registers a deep copy of `preset` with this package.
    ///
    /// When no preset of the same exact type and name exists, the copy is
    /// appended to the owned list and indexed under its exact type and
    /// every ancestor. When one exists, it is replaced in place only if
    /// `overwrite` is set. `read_from` records the source file;
    /// `None` keeps the existing record on overwrite.
    ///
    /// Returns whether the copy was inserted.
    pub fn add_preset(
        &mut self,
        classes: &mut ClassRegistry,
        preset: &dyn Entity,
        overwrite: bool,
        read_from: Option<&str>,
    ) -> Result<bool, RegistryError> {
        let exact = classes
            .lookup(preset.class_name())
            .ok_or_else(|| RegistryError::UnknownClass(preset.class_name().to_string()))?;
        let preset_name = preset.base().preset_name().to_string();

        if let Some(key) = self.find_exact(&preset_name, preset.class_name(), exact) {
            if !overwrite {
                return Ok(false);
            }
            let mut replacement = classes.clone_instance(preset)?;
            replacement.base_mut().set_preset_name(&preset_name);
            replacement.base_mut().set_package_id(self.package_id);

            let entry = &mut self.presets[key];
            let replaced = std::mem::replace(&mut entry.preset, replacement);
            if let Some(file) = read_from {
                entry.read_from = file.to_string();
            }
            classes.release_instance(exact, replaced);
            self.register_groups_of(key);
            log::debug!(
                "overwrote preset '{}' of type '{}' in package '{}'",
                preset_name,
                preset.class_name(),
                self.name
            );
            return Ok(true);
        }

        let mut copy = classes.clone_instance(preset)?;
        copy.base_mut().set_preset_name(&preset_name);
        copy.base_mut().set_package_id(self.package_id);

        let key = self.presets.insert(PresetEntry {
            preset: copy,
            read_from: read_from.unwrap_or_default().to_string(),
        });
        self.read_order.push(key);
        let mut cursor = Some(exact);
        while let Some(class_id) = cursor {
            self.type_index
                .entry(class_id)
                .or_default()
                .push((preset_name.clone(), key));
            cursor = classes.class(class_id).parent();
        }
        self.register_groups_of(key);
        Ok(true)
    }

    /// Finds a preset by its exact type and name.
    ///
    /// Only a preset whose most-derived type is `exact_type` matches, even
    /// though the type index also lists descendants under ancestor types.
    pub fn get_preset(
        &self,
        classes: &ClassRegistry,
        exact_type: ClassId,
        name: &str,
    ) -> Option<&dyn Entity> {
        let key = self.find_exact(name, classes.class(exact_type).name(), exact_type)?;
        Some(self.presets[key].preset.as_ref())
    }

    /// The file a preset was read from, looked up by exact type and name.
    pub fn data_location(
        &self,
        classes: &ClassRegistry,
        exact_type: ClassId,
        name: &str,
    ) -> Option<&str> {
        let key = self.find_exact(name, classes.class(exact_type).name(), exact_type)?;
        Some(self.presets[key].read_from.as_str())
    }

    fn find_exact(&self, name: &str, class_name: &str, exact_type: ClassId) -> Option<PresetKey> {
        let bucket = self.type_index.get(&exact_type)?;
        bucket.iter().find_map(|(candidate, key)| {
            (candidate == name && self.presets[*key].preset.class_name() == class_name)
                .then_some(*key)
        })
    }

    fn register_groups_of(&mut self, key: PresetKey) {
        let groups: Vec<String> = self.presets[key].preset.base().groups().to_vec();
        for group in groups {
            self.register_group(&group);
        }
    }

    /// Records a group tag in the package's catalog; duplicates are
    /// ignored and the catalog stays sorted.
    pub fn register_group(&mut self, group: &str) {
        if let Err(position) = self
            .group_register
            .binary_search_by(|candidate| candidate.as_str().cmp(group))
        {
            self.group_register.insert(position, group.to_string());
        }
    }

    /// Every group tag ever registered with this package, sorted.
    pub fn groups(&self) -> &[String] {
        &self.group_register
    }

    /// Groups that contain at least one preset of the given type or its
    /// descendants; `None` means any type.
    pub fn groups_with_type(
        &self,
        classes: &ClassRegistry,
        type_filter: Option<ClassId>,
    ) -> Vec<String> {
        let mut groups = Vec::new();
        for &key in &self.read_order {
            let entry = &self.presets[key];
            if !matches_type(classes, entry.preset.as_ref(), type_filter) {
                continue;
            }
            for group in entry.preset.base().groups() {
                if !groups.contains(group) {
                    groups.push(group.clone());
                }
            }
        }
        groups.sort();
        groups
    }

    /// Presets carrying the given group tag, optionally narrowed to a type
    /// and its descendants. `None` means any type.
    pub fn collect_by_group(
        &self,
        classes: &ClassRegistry,
        group: &str,
        type_filter: Option<ClassId>,
    ) -> Vec<&dyn Entity> {
        self.read_order
            .iter()
            .filter_map(|&key| {
                let entry = &self.presets[key];
                (entry.preset.base().is_in_group(group)
                    && matches_type(classes, entry.preset.as_ref(), type_filter))
                .then(|| entry.preset.as_ref())
            })
            .collect()
    }

    /// Presets of the given type and its descendants, in file-read order.
    /// `None` means any type.
    pub fn collect_by_type(
        &self,
        classes: &ClassRegistry,
        type_filter: Option<ClassId>,
    ) -> Vec<&dyn Entity> {
        self.read_order
            .iter()
            .filter_map(|&key| {
                let entry = &self.presets[key];
                matches_type(classes, entry.preset.as_ref(), type_filter)
                    .then(|| entry.preset.as_ref())
            })
            .collect()
    }

    /// Iterates every owned preset in file-read order. This is the only
    /// view external consumers get of the owned list.
    pub fn presets(&self) -> impl Iterator<Item = &dyn Entity> {
        self.read_order
            .iter()
            .map(|&key| self.presets[key].preset.as_ref())
    }

    /// Number of presets registered with this package.
    pub fn len(&self) -> usize {
        self.read_order.len()
    }

    /// Whether no presets have been registered.
    pub fn is_empty(&self) -> bool {
        self.read_order.is_empty()
    }

    /// The package's directory name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The package's friendly display name.
    pub fn friendly_name(&self) -> &str {
        &self.friendly_name
    }

    /// The package author.
    pub fn author(&self) -> &str {
        &self.author
    }

    /// The package description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The package version, starting at 1.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Path of the package's icon bitmap, empty when it has none.
    pub fn icon_file(&self) -> &str {
        &self.icon_file
    }

    /// The numeric ID assigned to this package, if one was resolved.
    pub fn package_id(&self) -> Option<u32> {
        self.package_id
    }

    /// Maps a local material palette slot to a resolved global slot.
    ///
    /// The first writer of a slot wins; a later attempt to remap the same
    /// slot returns `false` without changing anything.
    pub fn map_material(&mut self, from: u8, to: u8) -> bool {
        let slot = &mut self.material_mappings[from as usize];
        if *slot != 0 {
            return false;
        }
        *slot = to;
        true
    }

    /// The mapping of a local material slot, 0 when unmapped.
    pub fn material_mapping(&self, from: u8) -> u8 {
        self.material_mappings[from as usize]
    }

    /// The whole package-local material mapping table.
    pub fn material_mappings(&self) -> &[u8; MATERIAL_SLOT_COUNT] {
        &self.material_mappings
    }

    /// Writes the package declaration, metadata and every preset in
    /// file-read order.
    pub fn save(&self, writer: &mut Writer) -> io::Result<()> {
        writer.begin_object(PACKAGE_CLASS_NAME)?;
        writer.write_property("PackageName", &self.friendly_name)?;
        writer.write_property("Author", &self.author)?;
        writer.write_property("Description", &self.description)?;
        writer.write_property("Version", self.version)?;
        if !self.icon_file.is_empty() {
            writer.write_property("IconFile", &self.icon_file)?;
        }
        for &key in &self.read_order {
            let entry = &self.presets[key];
            writer.begin_nested(ADD_PRESET_PROPERTY, entry.preset.class_name())?;
            entry.preset.save(writer)?;
            writer.end_object();
        }
        writer.end_object();
        Ok(())
    }
}

fn expect_declaration(reader: &mut Reader) -> Result<(), LoadError> {
    let declared = reader.read_prop_value()?;
    if declared != PACKAGE_CLASS_NAME {
        return Err(LoadError::MissingDeclaration {
            path: reader.file_path().to_string(),
            found: declared,
        });
    }
    Ok(())
}

/// Whether a preset's exact type is the filter type or a descendant of it;
/// `None` matches any type.
fn matches_type(
    classes: &ClassRegistry,
    preset: &dyn Entity,
    type_filter: Option<ClassId>,
) -> bool {
    match type_filter {
        None => true,
        Some(filter) => classes
            .lookup(preset.class_name())
            .is_some_and(|exact| classes.is_kind_of(exact, filter)),
    }
}

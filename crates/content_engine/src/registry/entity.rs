//! Object lifecycle protocol shared by every registered content type
//!
//! Every content type carries an [`EntityBase`] with the attributes common
//! to all presets and implements [`Entity`], the property-dispatch contract
//! the loaders drive. Property names a type does not recognize are handed
//! down toward the base; names nobody recognizes are consumed and reported
//! without stopping the load.

use std::any::Any;
use std::io;

use crate::reader::{Reader, ReaderError};
use crate::registry::RegistryError;
use crate::writer::Writer;

/// Largest meaningful random selection weight.
pub const MAX_RANDOM_WEIGHT: u32 = 100;

/// The contract every registered content type implements: identification,
/// parse-population, deep copying, serialization and reset-to-defaults.
pub trait Entity: Any {
    /// The registered name of this object's exact (most derived) type.
    fn class_name(&self) -> &'static str;

    /// Access to the preset attributes shared by all content types.
    fn base(&self) -> &EntityBase;

    /// Mutable access to the shared preset attributes.
    fn base_mut(&mut self) -> &mut EntityBase;

    /// Reads one property from the reader, which is positioned on the
    /// property's value.
    ///
    /// Returns `Ok(false)` when no type in the inheritance chain recognizes
    /// `name`; the value has then *not* been consumed and the caller is
    /// responsible for discarding it so parsing stays aligned.
    fn read_property(&mut self, name: &str, reader: &mut Reader) -> Result<bool, ReaderError>;

    /// Writes this object's properties (not the introducing block header)
    /// so that parsing them back reproduces the same field values.
    fn save(&self, writer: &mut Writer) -> io::Result<()>;

    /// Makes this instance a deep copy of `source`, which must be of the
    /// same exact type. The copy starts out as a non-original preset until
    /// it is renamed.
    fn copy_from(&mut self, source: &dyn Entity) -> Result<(), RegistryError>;

    /// Returns a newly allocated deep copy. The copy starts out as a
    /// non-original preset until it is renamed.
    fn clone_entity(&self) -> Box<dyn Entity>;

    /// Restores every field, including inherited ones, to its default.
    fn reset(&mut self);

    /// Upcast for checked downcasting to the concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for checked downcasting to the concrete type.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Preset attributes shared by every content type: identity, ownership,
/// grouping and selection weight.
#[derive(Debug, Clone)]
pub struct EntityBase {
    preset_name: String,
    description: String,
    is_original_preset: bool,
    package_id: Option<u32>,
    /// Sorted and deduplicated; group names are case sensitive.
    groups: Vec<String>,
    random_weight: u32,
}

impl Default for EntityBase {
    fn default() -> Self {
        Self {
            preset_name: String::new(),
            description: String::new(),
            is_original_preset: false,
            package_id: None,
            groups: Vec::new(),
            random_weight: MAX_RANDOM_WEIGHT,
        }
    }
}

impl EntityBase {
    /// The preset name, empty for anonymous runtime instances.
    pub fn preset_name(&self) -> &str {
        &self.preset_name
    }

    /// Names the preset and flags it as an original named prototype.
    pub fn set_preset_name(&mut self, name: impl Into<String>) {
        self.is_original_preset = true;
        self.preset_name = name.into();
    }

    /// Free-text description shown in menus and tooling.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Sets the free-text description.
    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    /// Whether this instance is the authoritative named prototype, rather
    /// than a copy made from one.
    pub fn is_original_preset(&self) -> bool {
        self.is_original_preset
    }

    /// Clears the original-preset flag so the instance reads as a copy.
    pub fn reset_original_preset_flag(&mut self) {
        self.is_original_preset = false;
    }

    /// ID of the package this preset was registered with, if any.
    pub fn package_id(&self) -> Option<u32> {
        self.package_id
    }

    /// Records which package owns this preset.
    pub fn set_package_id(&mut self, package_id: Option<u32>) {
        self.package_id = package_id;
    }

    /// The sorted list of group tags this preset belongs to.
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    /// Adds a group tag; duplicates are ignored.
    pub fn add_to_group(&mut self, group: impl Into<String>) {
        let group = group.into();
        if let Err(position) = self.groups.binary_search(&group) {
            self.groups.insert(position, group);
        }
    }

    /// Whether this preset carries the given group tag.
    pub fn is_in_group(&self, group: &str) -> bool {
        self.groups
            .binary_search_by(|candidate| candidate.as_str().cmp(group))
            .is_ok()
    }

    /// Random selection weight, 0 to 100. Zero means never picked.
    pub fn random_weight(&self) -> u32 {
        self.random_weight
    }

    /// Sets the random selection weight, clamped to 0..=100.
    pub fn set_random_weight(&mut self, weight: u32) {
        self.random_weight = weight.min(MAX_RANDOM_WEIGHT);
    }

    /// Reads the base-level properties every content type shares.
    pub fn read_property(&mut self, name: &str, reader: &mut Reader) -> Result<bool, ReaderError> {
        match name {
            "PresetName" | "InstanceName" => {
                let value = reader.read_prop_value()?;
                self.set_preset_name(value);
            }
            "Description" => self.description = reader.read_prop_value()?,
            "AddToGroup" => {
                let group = reader.read_prop_value()?;
                self.add_to_group(group);
            }
            "RandomWeight" => {
                let weight = reader.read_parsed()?;
                self.set_random_weight(weight);
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Writes the base-level properties.
    pub fn save(&self, writer: &mut Writer) -> io::Result<()> {
        if !self.preset_name.is_empty() {
            writer.write_property("PresetName", &self.preset_name)?;
        }
        if !self.description.is_empty() {
            writer.write_property("Description", &self.description)?;
        }
        for group in &self.groups {
            writer.write_property("AddToGroup", group)?;
        }
        if self.random_weight != MAX_RANDOM_WEIGHT {
            writer.write_property("RandomWeight", self.random_weight)?;
        }
        Ok(())
    }
}

/// Reads one property block: an optional leading class-name check, then the
/// [`Reader::next_property`] loop, feeding each name to `handler`.
///
/// A handler returning `Ok(false)` leaves the value unconsumed; it is read
/// and discarded here with a diagnostic so parsing position stays correct.
pub fn read_block<F>(
    reader: &mut Reader,
    expected_class: Option<&str>,
    mut handler: F,
) -> Result<(), ReaderError>
where
    F: FnMut(&str, &mut Reader) -> Result<bool, ReaderError>,
{
    if let Some(expected) = expected_class {
        let declared = reader.read_prop_value()?;
        if declared != expected {
            return Err(reader.error(format!(
                "expected an object of type '{expected}' here, found '{declared}'"
            )));
        }
    }
    while reader.next_property()? {
        let name = reader.read_prop_name()?;
        if name.is_empty() {
            break;
        }
        if !handler(&name, reader)? {
            let value = reader.read_prop_value()?;
            log::warn!(
                "unrecognized property '{}' (value '{}') in {} at line {}",
                name,
                value,
                reader.file_path(),
                reader.line_number()
            );
        }
    }
    Ok(())
}

/// Parse-populates `entity` from the reader.
///
/// With `check_type` set, the pending property value is read first and must
/// match the entity's exact class name; this is how nested object blocks
/// (`Name = ClassName`) are consumed.
pub fn read_entity(
    entity: &mut dyn Entity,
    reader: &mut Reader,
    check_type: bool,
) -> Result<(), ReaderError> {
    let expected = check_type.then(|| entity.class_name());
    read_block(reader, expected, |name, reader| {
        entity.read_property(name, reader)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_naming_flags_original_preset() {
        let mut base = EntityBase::default();
        assert!(!base.is_original_preset());
        base.set_preset_name("Granite");
        assert!(base.is_original_preset());
        assert_eq!(base.preset_name(), "Granite");

        base.reset_original_preset_flag();
        assert!(!base.is_original_preset());
        assert_eq!(base.preset_name(), "Granite");
    }

    #[test]
    fn test_groups_sorted_and_deduplicated() {
        let mut base = EntityBase::default();
        base.add_to_group("Rocks");
        base.add_to_group("Common");
        base.add_to_group("Rocks");
        assert_eq!(base.groups(), ["Common", "Rocks"]);
        assert!(base.is_in_group("Rocks"));
        assert!(!base.is_in_group("rocks"));
    }

    #[test]
    fn test_random_weight_clamped() {
        let mut base = EntityBase::default();
        assert_eq!(base.random_weight(), MAX_RANDOM_WEIGHT);
        base.set_random_weight(250);
        assert_eq!(base.random_weight(), MAX_RANDOM_WEIGHT);
        base.set_random_weight(0);
        assert_eq!(base.random_weight(), 0);
    }

    #[test]
    fn test_base_properties_from_reader() {
        let text = "PresetName = Granite\nDescription = A hard rock\nAddToGroup = Rocks\nRandomWeight = 25\n";
        let mut reader = Reader::from_string(text);
        let mut base = EntityBase::default();
        read_block(&mut reader, None, |name, reader| {
            base.read_property(name, reader)
        })
        .unwrap();

        assert_eq!(base.preset_name(), "Granite");
        assert_eq!(base.description(), "A hard rock");
        assert!(base.is_in_group("Rocks"));
        assert_eq!(base.random_weight(), 25);
        assert!(base.is_original_preset());
    }

    #[test]
    fn test_unrecognized_property_is_consumed() {
        let text = "Mystery = whatever\nPresetName = Known\n";
        let mut reader = Reader::from_string(text);
        let mut base = EntityBase::default();
        read_block(&mut reader, None, |name, reader| {
            base.read_property(name, reader)
        })
        .unwrap();

        // Parsing continued past the unknown property.
        assert_eq!(base.preset_name(), "Known");
    }

    #[test]
    fn test_class_check_mismatch_is_fatal() {
        let mut reader = Reader::from_string("Icon\n\tFrameCount = 2\n");
        let result = read_block(&mut reader, Some("Material"), |_, _| Ok(true));
        assert!(matches!(result, Err(ReaderError::Syntax { .. })));
    }

    #[test]
    fn test_base_save_round_trip() {
        let mut base = EntityBase::default();
        base.set_preset_name("Granite");
        base.set_description("A hard rock");
        base.add_to_group("Rocks");
        base.set_random_weight(10);

        let mut writer = Writer::to_buffer();
        base.save(&mut writer).unwrap();
        let text = writer.into_string().unwrap();

        let mut reparsed = EntityBase::default();
        let mut reader = Reader::from_string(&text);
        read_block(&mut reader, None, |name, reader| {
            reparsed.read_property(name, reader)
        })
        .unwrap();

        assert_eq!(reparsed.preset_name(), base.preset_name());
        assert_eq!(reparsed.description(), base.description());
        assert_eq!(reparsed.groups(), base.groups());
        assert_eq!(reparsed.random_weight(), base.random_weight());
    }
}

//! Device-family presets
//!
//! `Device` is registered abstract; [`DeviceCore`] holds the data and
//! property handling shared by every device, and concrete devices embed it
//! and delegate unmatched property names to it, continuing the chain down
//! to [`EntityBase`].

use std::any::Any;
use std::io;

use crate::reader::{Reader, ReaderError};
use crate::registry::{read_entity, Entity, EntityBase, RegistryError};
use crate::writer::Writer;

use super::Icon;

/// Data shared by every preset in the `Device` family.
#[derive(Debug, Clone, Default)]
pub struct DeviceCore {
    entity: EntityBase,
    mass: f32,
    gold_value: f32,
    sprite_file: String,
}

impl DeviceCore {
    /// The shared preset attributes.
    pub fn entity(&self) -> &EntityBase {
        &self.entity
    }

    /// Mutable access to the shared preset attributes.
    pub fn entity_mut(&mut self) -> &mut EntityBase {
        &mut self.entity
    }

    /// Mass in kilograms.
    pub fn mass(&self) -> f32 {
        self.mass
    }

    /// Purchase value in gold.
    pub fn gold_value(&self) -> f32 {
        self.gold_value
    }

    /// Path of the sprite file.
    pub fn sprite_file(&self) -> &str {
        &self.sprite_file
    }

    /// Reads the device-level properties, falling through to the entity
    /// base for anything it does not recognize itself.
    pub fn read_property(&mut self, name: &str, reader: &mut Reader) -> Result<bool, ReaderError> {
        match name {
            "Mass" => self.mass = reader.read_parsed()?,
            "GoldValue" => self.gold_value = reader.read_parsed()?,
            "SpriteFile" => self.sprite_file = reader.read_prop_value()?,
            _ => return self.entity.read_property(name, reader),
        }
        Ok(true)
    }

    /// Writes the device-level properties, base attributes first.
    pub fn save(&self, writer: &mut Writer) -> io::Result<()> {
        self.entity.save(writer)?;
        writer.write_property("Mass", self.mass)?;
        writer.write_property("GoldValue", self.gold_value)?;
        if !self.sprite_file.is_empty() {
            writer.write_property("SpriteFile", &self.sprite_file)?;
        }
        Ok(())
    }
}

/// A weapon preset: device data plus fire behavior and a nested menu icon.
#[derive(Debug, Clone, Default)]
pub struct Weapon {
    device: DeviceCore,
    rate_of_fire: f32,
    magazine_size: u32,
    icon: Icon,
}

impl Weapon {
    /// Factory registered with the class registry.
    pub fn factory() -> Box<dyn Entity> {
        Box::new(Self::default())
    }

    /// The device-level data this weapon shares with its family.
    pub fn device(&self) -> &DeviceCore {
        &self.device
    }

    /// Rounds per minute.
    pub fn rate_of_fire(&self) -> f32 {
        self.rate_of_fire
    }

    /// Rounds per magazine.
    pub fn magazine_size(&self) -> u32 {
        self.magazine_size
    }

    /// The menu icon shown for this weapon.
    pub fn icon(&self) -> &Icon {
        &self.icon
    }
}

impl Entity for Weapon {
    fn class_name(&self) -> &'static str {
        "Weapon"
    }

    fn base(&self) -> &EntityBase {
        self.device.entity()
    }

    fn base_mut(&mut self) -> &mut EntityBase {
        self.device.entity_mut()
    }

    fn read_property(&mut self, name: &str, reader: &mut Reader) -> Result<bool, ReaderError> {
        match name {
            "RateOfFire" => self.rate_of_fire = reader.read_parsed()?,
            "MagazineSize" => self.magazine_size = reader.read_parsed()?,
            "Icon" => read_entity(&mut self.icon, reader, true)?,
            _ => return self.device.read_property(name, reader),
        }
        Ok(true)
    }

    fn save(&self, writer: &mut Writer) -> io::Result<()> {
        self.device.save(writer)?;
        writer.write_property("RateOfFire", self.rate_of_fire)?;
        writer.write_property("MagazineSize", self.magazine_size)?;
        writer.begin_nested("Icon", "Icon")?;
        self.icon.save(writer)?;
        writer.end_object();
        Ok(())
    }

    fn copy_from(&mut self, source: &dyn Entity) -> Result<(), RegistryError> {
        let source_class = source.class_name();
        let Some(source) = source.as_any().downcast_ref::<Self>() else {
            return Err(RegistryError::ClassMismatch {
                source_class: source_class.to_string(),
                target_class: self.class_name().to_string(),
            });
        };
        *self = source.clone();
        self.base_mut().reset_original_preset_flag();
        Ok(())
    }

    fn clone_entity(&self) -> Box<dyn Entity> {
        let mut copy = self.clone();
        copy.base_mut().reset_original_preset_flag();
        Box::new(copy)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

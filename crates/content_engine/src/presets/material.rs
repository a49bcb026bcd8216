//! Physical material presets

use std::any::Any;
use std::io;

use crate::reader::{Reader, ReaderError};
use crate::registry::{Entity, EntityBase, RegistryError};
use crate::writer::Writer;

use super::Color;

/// A physical substance preset: one entry of the shared 256-slot material
/// palette, carrying the surface response values the simulation layers
/// look up by palette index.
#[derive(Debug, Clone, Default)]
pub struct Material {
    base: EntityBase,
    index: u8,
    integrity: f32,
    restitution: f32,
    friction: f32,
    stickiness: f32,
    density: f32,
    use_own_color: bool,
    color: Color,
    texture_file: String,
}

impl Material {
    /// Factory registered with the class registry.
    pub fn factory() -> Box<dyn Entity> {
        Box::new(Self::default())
    }

    /// Palette slot this material was declared under in its own package.
    pub fn index(&self) -> u8 {
        self.index
    }

    /// Structural integrity: how much damage the material absorbs before
    /// giving way.
    pub fn integrity(&self) -> f32 {
        self.integrity
    }

    /// Restitution (bounciness), 0 to 1.
    pub fn restitution(&self) -> f32 {
        self.restitution
    }

    /// Surface friction, 0 to 1.
    pub fn friction(&self) -> f32 {
        self.friction
    }

    /// Stickiness, the chance of attaching on contact.
    pub fn stickiness(&self) -> f32 {
        self.stickiness
    }

    /// Density in kilograms per litre.
    pub fn density(&self) -> f32 {
        self.density
    }

    /// Whether the flat color is drawn instead of the texture.
    pub fn use_own_color(&self) -> bool {
        self.use_own_color
    }

    /// The material's flat color.
    pub fn color(&self) -> Color {
        self.color
    }

    /// Path of the texture file, empty when untextured.
    pub fn texture_file(&self) -> &str {
        &self.texture_file
    }
}

impl Entity for Material {
    fn class_name(&self) -> &'static str {
        "Material"
    }

    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EntityBase {
        &mut self.base
    }

    fn read_property(&mut self, name: &str, reader: &mut Reader) -> Result<bool, ReaderError> {
        match name {
            "Index" => self.index = reader.read_parsed()?,
            "StructuralIntegrity" => self.integrity = reader.read_parsed()?,
            "Restitution" => self.restitution = reader.read_parsed()?,
            "Friction" => self.friction = reader.read_parsed()?,
            "Stickiness" => self.stickiness = reader.read_parsed()?,
            "Density" => self.density = reader.read_parsed()?,
            "UseOwnColor" => self.use_own_color = reader.read_parsed::<u32>()? != 0,
            "Color" => self.color.read_from(reader)?,
            "TextureFile" => self.texture_file = reader.read_prop_value()?,
            _ => return self.base.read_property(name, reader),
        }
        Ok(true)
    }

    fn save(&self, writer: &mut Writer) -> io::Result<()> {
        self.base.save(writer)?;
        writer.write_property("Index", self.index)?;
        writer.write_property("StructuralIntegrity", self.integrity)?;
        writer.write_property("Restitution", self.restitution)?;
        writer.write_property("Friction", self.friction)?;
        writer.write_property("Stickiness", self.stickiness)?;
        writer.write_property("Density", self.density)?;
        writer.write_property("UseOwnColor", u8::from(self.use_own_color))?;
        self.color.save_as(writer, "Color")?;
        if !self.texture_file.is_empty() {
            writer.write_property("TextureFile", &self.texture_file)?;
        }
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
        self.base.reset_original_preset_flag();
        Ok(())
    }

    fn clone_entity(&self) -> Box<dyn Entity> {
        let mut copy = self.clone();
        copy.base.reset_original_preset_flag();
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::read_entity;

    const GRANITE: &str = "\
PresetName = Granite
AddToGroup = Rocks
Index = 7
StructuralIntegrity = 150
Restitution = 0.4
Friction = 0.6
Stickiness = 0
Density = 2.7
UseOwnColor = 1
Color = Color
\tR = 120
\tG = 115
\tB = 110
TextureFile = base.pack/granite.png
";

    #[test]
    fn test_parse_material() {
        let mut reader = Reader::from_string(GRANITE);
        let mut material = Material::default();
        read_entity(&mut material, &mut reader, false).unwrap();

        assert_eq!(material.base().preset_name(), "Granite");
        assert!(material.base().is_in_group("Rocks"));
        assert_eq!(material.index(), 7);
        assert_eq!(material.integrity(), 150.0);
        assert_eq!(material.restitution(), 0.4);
        assert_eq!(material.friction(), 0.6);
        assert_eq!(material.density(), 2.7);
        assert!(material.use_own_color());
        assert_eq!(material.color(), Color::new(120, 115, 110));
        assert_eq!(material.texture_file(), "base.pack/granite.png");
    }

    #[test]
    fn test_save_parse_round_trip() {
        let mut reader = Reader::from_string(GRANITE);
        let mut material = Material::default();
        read_entity(&mut material, &mut reader, false).unwrap();

        let mut writer = Writer::to_buffer();
        material.save(&mut writer).unwrap();
        let text = writer.into_string().unwrap();

        let mut reparsed = Material::default();
        let mut second_pass = Reader::from_string(&text);
        read_entity(&mut reparsed, &mut second_pass, false).unwrap();

        assert_eq!(reparsed.base().preset_name(), material.base().preset_name());
        assert_eq!(reparsed.base().groups(), material.base().groups());
        assert_eq!(reparsed.index(), material.index());
        assert_eq!(reparsed.integrity(), material.integrity());
        assert_eq!(reparsed.restitution(), material.restitution());
        assert_eq!(reparsed.friction(), material.friction());
        assert_eq!(reparsed.stickiness(), material.stickiness());
        assert_eq!(reparsed.density(), material.density());
        assert_eq!(reparsed.use_own_color(), material.use_own_color());
        assert_eq!(reparsed.color(), material.color());
        assert_eq!(reparsed.texture_file(), material.texture_file());
    }

    #[test]
    fn test_properties_after_nested_color_still_read() {
        // The color sub-block must hand control back at the right nesting
        // level for the following property to be seen.
        let text = "Color = Color\n\tR = 1\n\tG = 2\n\tB = 3\nFriction = 0.5\n";
        let mut reader = Reader::from_string(text);
        let mut material = Material::default();
        read_entity(&mut material, &mut reader, false).unwrap();

        assert_eq!(material.color(), Color::new(1, 2, 3));
        assert_eq!(material.friction(), 0.5);
    }
}

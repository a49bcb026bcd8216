//! Icon presets

use std::any::Any;
use std::io;

use crate::reader::{Reader, ReaderError};
use crate::registry::{Entity, EntityBase, RegistryError};
use crate::writer::Writer;

/// A menu icon preset: a bitmap strip and how many frames it holds.
#[derive(Debug, Clone)]
pub struct Icon {
    base: EntityBase,
    bitmap_file: String,
    frame_count: u32,
}

impl Default for Icon {
    fn default() -> Self {
        Self {
            base: EntityBase::default(),
            bitmap_file: String::new(),
            frame_count: 1,
        }
    }
}

impl Icon {
    /// Factory registered with the class registry.
    pub fn factory() -> Box<dyn Entity> {
        Box::new(Self::default())
    }

    /// Path of the bitmap strip file.
    pub fn bitmap_file(&self) -> &str {
        &self.bitmap_file
    }

    /// Number of frames in the bitmap strip.
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }
}

impl Entity for Icon {
    fn class_name(&self) -> &'static str {
        "Icon"
    }

    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EntityBase {
        &mut self.base
    }

    fn read_property(&mut self, name: &str, reader: &mut Reader) -> Result<bool, ReaderError> {
        match name {
            "BitmapFile" => self.bitmap_file = reader.read_prop_value()?,
            "FrameCount" => self.frame_count = reader.read_parsed()?,
            _ => return self.base.read_property(name, reader),
        }
        Ok(true)
    }

    fn save(&self, writer: &mut Writer) -> io::Result<()> {
        self.base.save(writer)?;
        if !self.bitmap_file.is_empty() {
            writer.write_property("BitmapFile", &self.bitmap_file)?;
        }
        writer.write_property("FrameCount", self.frame_count)?;
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

    #[test]
    fn test_parse_icon() {
        let text = "PresetName = Crosshair\nBitmapFile = base.pack/crosshair.png\nFrameCount = 4\n";
        let mut reader = Reader::from_string(text);
        let mut icon = Icon::default();
        read_entity(&mut icon, &mut reader, false).unwrap();

        assert_eq!(icon.base().preset_name(), "Crosshair");
        assert_eq!(icon.bitmap_file(), "base.pack/crosshair.png");
        assert_eq!(icon.frame_count(), 4);
    }

    #[test]
    fn test_frame_count_defaults_to_one() {
        let icon = Icon::default();
        assert_eq!(icon.frame_count(), 1);
    }
}

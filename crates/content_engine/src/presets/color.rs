//! 8-bit RGB color sub-blocks

use std::io;

use crate::reader::{Reader, ReaderError};
use crate::registry::read_block;
use crate::writer::Writer;

/// An 8-bit RGB color, read from a nested `Color` block:
///
/// ```text
/// Color = Color
///     R = 200
///     G = 180
///     B = 130
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color {
    /// Red channel, 0 to 255.
    pub r: u8,
    /// Green channel, 0 to 255.
    pub g: u8,
    /// Blue channel, 0 to 255.
    pub b: u8,
}

impl Color {
    /// Creates a color from its channels.
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Reads this color from a nested block whose pending property value is
    /// the `Color` class name.
    pub fn read_from(&mut self, reader: &mut Reader) -> Result<(), ReaderError> {
        read_block(reader, Some("Color"), |name, reader| {
            match name {
                "R" => self.r = reader.read_parsed()?,
                "G" => self.g = reader.read_parsed()?,
                "B" => self.b = reader.read_parsed()?,
                _ => return Ok(false),
            }
            Ok(true)
        })
    }

    /// Writes this color as a nested block held by the property `name`.
    pub fn save_as(&self, writer: &mut Writer, name: &str) -> io::Result<()> {
        writer.begin_nested(name, "Color")?;
        writer.write_property("R", self.r)?;
        writer.write_property("G", self.g)?;
        writer.write_property("B", self.b)?;
        writer.end_object();
        Ok(())
    }
}

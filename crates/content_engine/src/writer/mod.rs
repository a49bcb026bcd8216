//! Writer for the indentation-scoped content text format
//!
//! The semantic inverse of the [`Reader`](crate::reader::Reader): emits
//! `Name = Value` lines with tab indentation standing in for block
//! delimiters, so that a saved object parses back to the same field values.

use std::fmt::Display;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

enum Target {
    File(BufWriter<File>),
    Memory(Vec<u8>),
}

/// Writes properties and nested object blocks to a content file or an
/// in-memory buffer.
pub struct Writer {
    target: Target,
    path: String,
    indent: usize,
}

impl Writer {
    /// Creates a writer over a new file at `path`, truncating any existing
    /// file there.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)?;
        log::debug!("writing content file '{}'", path.display());
        Ok(Self {
            target: Target::File(BufWriter::new(file)),
            path: path.display().to_string(),
            indent: 0,
        })
    }

    /// Creates a writer over an in-memory buffer, retrievable through
    /// [`Writer::into_string`].
    pub fn to_buffer() -> Self {
        Self {
            target: Target::Memory(Vec::new()),
            path: "<memory>".to_string(),
            indent: 0,
        }
    }

    /// Path of the file being written, for diagnostics.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Current nesting depth in tabs.
    pub fn indent(&self) -> usize {
        self.indent
    }

    /// Writes one `Name = Value` property line at the current indent.
    pub fn write_property(&mut self, name: &str, value: impl Display) -> io::Result<()> {
        let tabs = self.tabs();
        writeln!(self.out(), "{tabs}{name} = {value}")
    }

    /// Opens a top-level object block: a bare declaration line followed by
    /// an indented property list. Close with [`Writer::end_object`].
    pub fn begin_object(&mut self, class_name: &str) -> io::Result<()> {
        let tabs = self.tabs();
        writeln!(self.out(), "{tabs}{class_name}")?;
        self.indent += 1;
        Ok(())
    }

    /// Opens a nested object block held by a property: `Name = ClassName`
    /// followed by an indented property list. Close with
    /// [`Writer::end_object`].
    pub fn begin_nested(&mut self, name: &str, class_name: &str) -> io::Result<()> {
        self.write_property(name, class_name)?;
        self.indent += 1;
        Ok(())
    }

    /// Closes the innermost open object block.
    pub fn end_object(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    /// Writes a raw line at the current indent.
    pub fn write_line(&mut self, text: &str) -> io::Result<()> {
        let tabs = self.tabs();
        writeln!(self.out(), "{tabs}{text}")
    }

    /// Writes a line comment at the current indent.
    pub fn write_comment(&mut self, text: &str) -> io::Result<()> {
        let tabs = self.tabs();
        writeln!(self.out(), "{tabs}// {text}")
    }

    /// Writes an empty line.
    pub fn blank_line(&mut self) -> io::Result<()> {
        writeln!(self.out())
    }

    /// Flushes any buffered output to the underlying target.
    pub fn flush(&mut self) -> io::Result<()> {
        self.out().flush()
    }

    /// Consumes the writer and returns the buffered text, if this writer
    /// targets memory rather than a file.
    pub fn into_string(self) -> Option<String> {
        match self.target {
            Target::Memory(buffer) => Some(String::from_utf8_lossy(&buffer).into_owned()),
            Target::File(_) => None,
        }
    }

    fn tabs(&self) -> String {
        "\t".repeat(self.indent)
    }

    fn out(&mut self) -> &mut dyn Write {
        match &mut self.target {
            Target::File(file) => file,
            Target::Memory(buffer) => buffer,
        }
    }
}

//! # Content Engine
//!
//! A data-driven content engine: hand-authored text files become live,
//! typed, reflectively managed preset objects, tracked per content package
//! so that packages can be composed, overridden and cross-referenced.
//!
//! ## Features
//!
//! - **Streaming Reader**: indentation-scoped, comment-aware text format
//!   with transparent file inclusion
//! - **Class Registry**: name-based construction over a single-inheritance
//!   type forest, with per-type instance pooling
//! - **Preset Packages**: per-package registries with type-indexed lookup,
//!   group catalogs and material palette remapping
//! - **Round-Trip Serialization**: a writer that is the inverse of the
//!   reader
//!
//! ## Quick Start
//!
//! ```rust
//! use content_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut classes = ClassRegistry::new();
//!     register_core_classes(&mut classes)?;
//!
//!     let mut reader = Reader::from_string(
//!         "PresetName = Granite\nFriction = 0.6\n",
//!     );
//!     let material_id = classes.lookup("Material").expect("registered above");
//!     let mut granite = classes.new_instance(material_id)?;
//!     read_entity(granite.as_mut(), &mut reader, false)?;
//!
//!     let mut package = Package::new("base.pack");
//!     package.add_preset(&mut classes, granite.as_ref(), false, None)?;
//!     assert!(package.get_preset(&classes, material_id, "Granite").is_some());
//!     Ok(())
//! }
//! ```
//!
//! The whole subsystem is synchronous and single-threaded by design: it
//! runs at content-load time, before any concurrent subsystems are active.
//! Neither the registry pools nor the readers may be shared across threads
//! without external synchronization.

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod package;
pub mod presets;
pub mod reader;
pub mod registry;
pub mod writer;

#[cfg(test)]
mod loading_tests;

pub use config::{Config, ContentConfig};
pub use package::{Package, PackageManager};
pub use reader::Reader;
pub use registry::{ClassRegistry, Entity};
pub use writer::Writer;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, ContentConfig},
        package::{LoadError, Package, PackageManager},
        presets::{register_core_classes, Color, Icon, Material, Weapon},
        reader::{PackageIdResolver, Reader, ReaderError},
        registry::{
            read_block, read_entity, ClassId, ClassRegistry, Entity, EntityBase, RegistryError,
        },
        writer::Writer,
    };
}

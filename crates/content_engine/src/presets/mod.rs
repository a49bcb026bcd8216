//! Built-in content types registered with the class registry
//!
//! These are the preset families the package loader can instantiate by
//! name. `Entity` is the abstract root of the forest; `Device` is an
//! abstract mid-level type whose concrete child `Weapon` demonstrates
//! property dispatch through a three-deep inheritance chain.

mod color;
mod device;
mod icon;
mod material;

pub use color::Color;
pub use device::{DeviceCore, Weapon};
pub use icon::Icon;
pub use material::Material;

use crate::registry::{ClassRegistry, RegistryError};

/// Registers the built-in content classes. Call once at startup, before
/// any package is loaded.
pub fn register_core_classes(classes: &mut ClassRegistry) -> Result<(), RegistryError> {
    let entity = classes.register_abstract("Entity", None)?;
    classes.register_concrete("Material", Some(entity), Material::factory, 32)?;
    classes.register_concrete("Icon", Some(entity), Icon::factory, 16)?;
    let device = classes.register_abstract("Device", Some(entity))?;
    classes.register_concrete("Weapon", Some(device), Weapon::factory, 16)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_classes_registered() {
        let mut classes = ClassRegistry::new();
        register_core_classes(&mut classes).unwrap();

        let names: Vec<&str> = classes.class_names().collect();
        assert_eq!(names, ["Entity", "Material", "Icon", "Device", "Weapon"]);
    }

    #[test]
    fn test_double_registration_fails() {
        let mut classes = ClassRegistry::new();
        register_core_classes(&mut classes).unwrap();
        assert!(register_core_classes(&mut classes).is_err());
    }
}

//! Class registry with inheritance-aware lookup and pooled allocation
//!
//! Content types are registered once at startup into a [`ClassRegistry`]:
//! an append-only forest of type descriptors linked to their parents by
//! [`ClassId`]. Concrete descriptors carry a factory and a pool of recycled
//! instances so that load-time churn (scratch objects, replaced presets)
//! reuses allocations instead of hitting the heap per instance.
//!
//! The registry is synchronous and single-threaded by design; it runs at
//! content-load time, before any concurrent subsystems are active. Sharing
//! one registry across threads without external synchronization is not
//! supported.

pub mod entity;

pub use entity::{read_block, read_entity, Entity, EntityBase};

use std::collections::HashMap;

use thiserror::Error;

/// Factory producing a default-initialized instance of a concrete type.
pub type FactoryFn = fn() -> Box<dyn Entity>;

/// Pool refill batch used when a registration does not specify one.
pub const DEFAULT_POOL_BATCH: usize = 10;

/// Errors produced by class registration and instantiation.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A class of this name has already been registered.
    #[error("class '{0}' is already registered")]
    DuplicateClass(String),

    /// No class of this name has been registered.
    #[error("unknown class '{0}'")]
    UnknownClass(String),

    /// The class has no factory and cannot produce instances.
    #[error("class '{0}' is abstract and cannot be instantiated")]
    AbstractClass(&'static str),

    /// A deep copy was attempted between unrelated concrete types.
    #[error("cannot copy a '{source_class}' into a '{target_class}'")]
    ClassMismatch {
        /// Exact type of the instance being copied from.
        source_class: String,
        /// Exact type of the instance being copied into.
        target_class: String,
    },
}

/// Stable handle to a registered class descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(usize);

/// Immutable identity of one registered type, plus its instance pool.
pub struct ClassInfo {
    name: &'static str,
    parent: Option<ClassId>,
    factory: Option<FactoryFn>,
    pool: Vec<Box<dyn Entity>>,
    pool_batch: usize,
    in_use: usize,
    bulk_allocations: usize,
}

impl ClassInfo {
    /// The registered class name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The parent class, `None` for root classes.
    pub fn parent(&self) -> Option<ClassId> {
        self.parent
    }

    /// Whether this class has a factory and can produce instances.
    pub fn is_concrete(&self) -> bool {
        self.factory.is_some()
    }
}

/// Diagnostic counters for one class's instance pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Recycled instances currently waiting in the pool.
    pub free: usize,
    /// Instances handed out and not yet returned.
    pub in_use: usize,
    /// How many times the pool had to be bulk-refilled.
    pub bulk_allocations: usize,
}

/// Append-only registry of type descriptors forming a single-inheritance
/// forest, with name-based construction and instance recycling.
#[derive(Default)]
pub struct ClassRegistry {
    classes: Vec<ClassInfo>,
    by_name: HashMap<&'static str, ClassId>,
}

impl ClassRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an abstract class: it participates in the inheritance
    /// forest but can never be instantiated.
    pub fn register_abstract(
        &mut self,
        name: &'static str,
        parent: Option<ClassId>,
    ) -> Result<ClassId, RegistryError> {
        self.register(name, parent, None, 0)
    }

    /// Registers a concrete class with its factory and pool refill batch.
    pub fn register_concrete(
        &mut self,
        name: &'static str,
        parent: Option<ClassId>,
        factory: FactoryFn,
        pool_batch: usize,
    ) -> Result<ClassId, RegistryError> {
        self.register(name, parent, Some(factory), pool_batch)
    }

    fn register(
        &mut self,
        name: &'static str,
        parent: Option<ClassId>,
        factory: Option<FactoryFn>,
        pool_batch: usize,
    ) -> Result<ClassId, RegistryError> {
        if self.by_name.contains_key(name) {
            return Err(RegistryError::DuplicateClass(name.to_string()));
        }
        let id = ClassId(self.classes.len());
        self.classes.push(ClassInfo {
            name,
            parent,
            factory,
            pool: Vec::new(),
            pool_batch: if pool_batch == 0 { DEFAULT_POOL_BATCH } else { pool_batch },
            in_use: 0,
            bulk_allocations: 0,
        });
        self.by_name.insert(name, id);
        log::debug!(
            "registered {} class '{}'",
            if factory.is_some() { "concrete" } else { "abstract" },
            name
        );
        Ok(id)
    }

    /// Looks a class up by its registered name.
    pub fn lookup(&self, name: &str) -> Option<ClassId> {
        self.by_name.get(name).copied()
    }

    /// The descriptor behind a handle.
    pub fn class(&self, id: ClassId) -> &ClassInfo {
        &self.classes[id.0]
    }

    /// Names of every registered class, in registration order.
    pub fn class_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.classes.iter().map(|info| info.name)
    }

    /// Handles of every registered class, in registration order.
    pub fn class_ids(&self) -> impl Iterator<Item = ClassId> {
        (0..self.classes.len()).map(ClassId)
    }

    /// Number of registered classes.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether no classes have been registered yet.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Whether `id` is `ancestor` itself or one of its descendants.
    pub fn is_kind_of(&self, id: ClassId, ancestor: ClassId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.classes[current.0].parent;
        }
        false
    }

    /// Iterates the inheritance chain from `id` up to its root, inclusive.
    pub fn ancestry(&self, id: ClassId) -> impl Iterator<Item = ClassId> + '_ {
        let mut cursor = Some(id);
        std::iter::from_fn(move || {
            let current = cursor?;
            cursor = self.classes[current.0].parent;
            Some(current)
        })
    }

    /// Produces an instance of a concrete class, reusing a recycled one
    /// when the pool has any.
    ///
    /// When the pool is dry it is bulk-refilled with the class's configured
    /// batch of fresh instances first.
    pub fn new_instance(&mut self, id: ClassId) -> Result<Box<dyn Entity>, RegistryError> {
        let info = &mut self.classes[id.0];
        let Some(factory) = info.factory else {
            return Err(RegistryError::AbstractClass(info.name));
        };
        if info.pool.is_empty() {
            info.pool.reserve(info.pool_batch);
            for _ in 0..info.pool_batch {
                info.pool.push(factory());
            }
            info.bulk_allocations += 1;
            log::trace!(
                "refilled pool of '{}' with {} instances",
                info.name,
                info.pool_batch
            );
        }
        let instance = match info.pool.pop() {
            Some(instance) => instance,
            None => factory(),
        };
        info.in_use += 1;
        Ok(instance)
    }

    /// Returns an instance to its class's pool after resetting it to
    /// defaults.
    ///
    /// Returning an instance to the wrong class's pool is a caller bug; it
    /// is asserted in debug builds and the instance is dropped instead of
    /// pooled in release builds.
    pub fn release_instance(&mut self, id: ClassId, mut instance: Box<dyn Entity>) {
        let info = &mut self.classes[id.0];
        if instance.class_name() != info.name {
            debug_assert!(
                false,
                "instance of '{}' returned to the pool of '{}'",
                instance.class_name(),
                info.name
            );
            log::error!(
                "instance of '{}' returned to the pool of '{}'; dropping it",
                instance.class_name(),
                info.name
            );
            return;
        }
        instance.reset();
        info.in_use = info.in_use.saturating_sub(1);
        info.pool.push(instance);
    }

    /// Pre-warms a concrete class's pool with `amount` fresh instances, or
    /// its configured batch when `amount` is zero.
    pub fn fill_pool(&mut self, id: ClassId, amount: usize) -> Result<(), RegistryError> {
        let info = &mut self.classes[id.0];
        let Some(factory) = info.factory else {
            return Err(RegistryError::AbstractClass(info.name));
        };
        let amount = if amount == 0 { info.pool_batch } else { amount };
        info.pool.reserve(amount);
        for _ in 0..amount {
            info.pool.push(factory());
        }
        info.bulk_allocations += 1;
        Ok(())
    }

    /// Diagnostic counters for a class's pool.
    pub fn pool_stats(&self, id: ClassId) -> PoolStats {
        let info = &self.classes[id.0];
        PoolStats {
            free: info.pool.len(),
            in_use: info.in_use,
            bulk_allocations: info.bulk_allocations,
        }
    }

    /// Deep-copies `source` into a pooled instance of its own class and
    /// returns it. Ownership of the copy transfers to the caller.
    pub fn clone_instance(&mut self, source: &dyn Entity) -> Result<Box<dyn Entity>, RegistryError> {
        let id = self
            .lookup(source.class_name())
            .ok_or_else(|| RegistryError::UnknownClass(source.class_name().to_string()))?;
        let mut copy = self.new_instance(id)?;
        copy.copy_from(source)?;
        Ok(copy)
    }

    /// Writes the pool counters of every concrete class, for memory
    /// diagnostics.
    pub fn dump_pool_info(&self, writer: &mut crate::writer::Writer) -> std::io::Result<()> {
        writer.write_comment("instance pool usage per class")?;
        for info in &self.classes {
            if info.factory.is_none() {
                continue;
            }
            writer.write_line(&format!(
                "{}: {} free, {} in use, {} bulk refills",
                info.name,
                info.pool.len(),
                info.in_use,
                info.bulk_allocations
            ))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets::register_core_classes;

    fn registry() -> ClassRegistry {
        let mut classes = ClassRegistry::new();
        register_core_classes(&mut classes).unwrap();
        classes
    }

    #[test]
    fn test_lookup_and_metadata() {
        let classes = registry();
        let entity = classes.lookup("Entity").unwrap();
        let material = classes.lookup("Material").unwrap();

        assert!(classes.lookup("Nonsense").is_none());
        assert_eq!(classes.class(material).name(), "Material");
        assert_eq!(classes.class(material).parent(), Some(entity));
        assert!(classes.class(material).is_concrete());
        assert!(!classes.class(entity).is_concrete());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut classes = registry();
        let result = classes.register_abstract("Entity", None);
        assert!(matches!(result, Err(RegistryError::DuplicateClass(_))));
    }

    #[test]
    fn test_inheritance_chain() {
        let classes = registry();
        let entity = classes.lookup("Entity").unwrap();
        let device = classes.lookup("Device").unwrap();
        let weapon = classes.lookup("Weapon").unwrap();

        assert!(classes.is_kind_of(weapon, weapon));
        assert!(classes.is_kind_of(weapon, device));
        assert!(classes.is_kind_of(weapon, entity));
        assert!(!classes.is_kind_of(device, weapon));

        let chain: Vec<&str> = classes
            .ancestry(weapon)
            .map(|id| classes.class(id).name())
            .collect();
        assert_eq!(chain, ["Weapon", "Device", "Entity"]);
    }

    #[test]
    fn test_abstract_class_cannot_instantiate() {
        let mut classes = registry();
        let entity = classes.lookup("Entity").unwrap();
        assert!(matches!(
            classes.new_instance(entity),
            Err(RegistryError::AbstractClass("Entity"))
        ));
    }

    #[test]
    fn test_new_instance_produces_defaults() {
        let mut classes = registry();
        let material = classes.lookup("Material").unwrap();
        let instance = classes.new_instance(material).unwrap();
        assert_eq!(instance.class_name(), "Material");
        assert!(instance.base().preset_name().is_empty());
    }

    #[test]
    fn test_pool_reuse_avoids_bulk_allocations() {
        let mut classes = registry();
        let material = classes.lookup("Material").unwrap();

        let count = 8;
        let mut held = Vec::new();
        for _ in 0..count {
            held.push(classes.new_instance(material).unwrap());
        }
        let allocations_after_first_burst = classes.pool_stats(material).bulk_allocations;
        assert_eq!(classes.pool_stats(material).in_use, count);

        for instance in held.drain(..) {
            classes.release_instance(material, instance);
        }
        assert_eq!(classes.pool_stats(material).in_use, 0);

        // The second burst is satisfied entirely from returned instances.
        for _ in 0..count {
            held.push(classes.new_instance(material).unwrap());
        }
        assert_eq!(
            classes.pool_stats(material).bulk_allocations,
            allocations_after_first_burst
        );
    }

    #[test]
    fn test_released_instances_are_reset() {
        let mut classes = registry();
        let material = classes.lookup("Material").unwrap();

        let mut instance = classes.new_instance(material).unwrap();
        instance.base_mut().set_preset_name("Granite");
        classes.release_instance(material, instance);

        // Drain the pool; every instance in it must be back to defaults.
        let stats = classes.pool_stats(material);
        for _ in 0..stats.free {
            let recycled = classes.new_instance(material).unwrap();
            assert!(recycled.base().preset_name().is_empty());
            assert!(!recycled.base().is_original_preset());
        }
    }

    #[test]
    fn test_clone_instance_deep_copies() {
        let mut classes = registry();
        let material = classes.lookup("Material").unwrap();

        let mut original = classes.new_instance(material).unwrap();
        original.base_mut().set_preset_name("Granite");
        original.base_mut().add_to_group("Rocks");

        let copy = classes.clone_instance(original.as_ref()).unwrap();
        assert_eq!(copy.base().preset_name(), "Granite");
        assert!(copy.base().is_in_group("Rocks"));
        // The copy is not the authoritative preset until renamed.
        assert!(!copy.base().is_original_preset());
        // The source keeps its own state.
        assert!(original.base().is_original_preset());
    }

    #[test]
    fn test_copy_between_unrelated_types_rejected() {
        let mut classes = registry();
        let material = classes.lookup("Material").unwrap();
        let icon = classes.lookup("Icon").unwrap();

        let source = classes.new_instance(material).unwrap();
        let mut target = classes.new_instance(icon).unwrap();
        assert!(matches!(
            target.copy_from(source.as_ref()),
            Err(RegistryError::ClassMismatch { .. })
        ));
    }

    #[test]
    fn test_dump_pool_info_lists_concrete_classes() {
        let mut classes = registry();
        let material = classes.lookup("Material").unwrap();
        let held = classes.new_instance(material).unwrap();

        let mut writer = crate::writer::Writer::to_buffer();
        classes.dump_pool_info(&mut writer).unwrap();
        let text = writer.into_string().unwrap();

        assert!(text.contains("Material: 31 free, 1 in use, 1 bulk refills"));
        // Abstract classes have no pool and are not listed.
        assert!(!text.contains("Entity:"));
        assert!(!text.contains("Device:"));
        classes.release_instance(material, held);
    }

    #[test]
    fn test_fill_pool_prewarms() {
        let mut classes = registry();
        let material = classes.lookup("Material").unwrap();
        classes.fill_pool(material, 5).unwrap();
        assert_eq!(classes.pool_stats(material).free, 5);

        let taken = classes.new_instance(material).unwrap();
        assert_eq!(classes.pool_stats(material).free, 4);
        classes.release_instance(material, taken);
        assert_eq!(classes.pool_stats(material).free, 5);
    }
}

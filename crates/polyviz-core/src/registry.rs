//! Structure registry for managing registered structures.

use crate::error::{PolyvizError, Result};
use crate::structure::Structure;

/// Registry of structures, kept in registration order.
///
/// Names are unique per structure type. Frame drawing walks the registry in order,
/// so the first registered structure is drawn first.
pub struct Registry<S: ?Sized + Structure = dyn Structure> {
    structures: Vec<Box<S>>,
}

impl<S: ?Sized + Structure> Default for Registry<S> {
    fn default() -> Self {
        Self {
            structures: Vec::new(),
        }
    }
}

impl<S: ?Sized + Structure> Registry<S> {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, type_name: &str, name: &str) -> Option<usize> {
        self.structures
            .iter()
            .position(|s| s.type_name() == type_name && s.name() == name)
    }

    /// Registers a structure with the registry.
    ///
    /// Returns an error if a structure with the same type and name already exists.
    pub fn register(&mut self, structure: Box<S>) -> Result<()> {
        if self.contains(structure.type_name(), structure.name()) {
            return Err(PolyvizError::StructureExists(structure.name().to_string()));
        }
        log::info!(
            "registered {} '{}'",
            structure.type_name(),
            structure.name()
        );
        self.structures.push(structure);
        Ok(())
    }

    /// Gets a reference to a structure by type and name.
    pub fn get(&self, type_name: &str, name: &str) -> Option<&S> {
        self.position(type_name, name)
            .map(|i| &*self.structures[i])
    }

    /// Gets a mutable reference to a structure by type and name.
    pub fn get_mut(&mut self, type_name: &str, name: &str) -> Option<&mut S> {
        let i = self.position(type_name, name)?;
        Some(&mut *self.structures[i])
    }

    /// Checks if a structure with the given type and name exists.
    pub fn contains(&self, type_name: &str, name: &str) -> bool {
        self.position(type_name, name).is_some()
    }

    /// Removes a structure by type and name.
    pub fn remove(&mut self, type_name: &str, name: &str) -> Option<Box<S>> {
        let i = self.position(type_name, name)?;
        Some(self.structures.remove(i))
    }

    /// Removes every structure with the given name, whatever its type.
    pub fn remove_named(&mut self, name: &str) -> usize {
        let before = self.structures.len();
        self.structures.retain(|s| s.name() != name);
        before - self.structures.len()
    }

    /// Removes all structures from the registry.
    pub fn clear(&mut self) {
        self.structures.clear();
    }

    /// Iterates in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &S> {
        self.structures.iter().map(|s| &**s)
    }

    /// Iterates mutably in registration order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut S> + '_ {
        self.structures.iter_mut().map(|s| &mut **s)
    }

    /// Returns the total number of registered structures.
    pub fn len(&self) -> usize {
        self.structures.len()
    }

    /// Returns true if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.structures.is_empty()
    }

    /// Combined bounding box of all enabled structures.
    pub fn bounding_box(&self) -> Option<(glam::Vec3, glam::Vec3)> {
        self.iter()
            .filter(|s| s.is_enabled())
            .filter_map(|s| s.bounding_box())
            .reduce(|(amin, amax), (bmin, bmax)| (amin.min(bmin), amax.max(bmax)))
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use glam::{Mat4, Vec3};

    use super::*;

    struct Dummy {
        name: String,
        at: Vec3,
    }

    impl Structure for Dummy {
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
        fn name(&self) -> &str {
            &self.name
        }
        fn type_name(&self) -> &'static str {
            "Dummy"
        }
        fn bounding_box(&self) -> Option<(Vec3, Vec3)> {
            Some((self.at, self.at + Vec3::ONE))
        }
        fn length_scale(&self) -> f32 {
            1.0
        }
        fn transform(&self) -> Mat4 {
            Mat4::IDENTITY
        }
        fn set_transform(&mut self, _transform: Mat4) {}
        fn is_enabled(&self) -> bool {
            true
        }
        fn set_enabled(&mut self, _enabled: bool) {}
        fn refresh(&mut self) {}
    }

    fn dummy(name: &str, at: Vec3) -> Box<dyn Structure> {
        Box::new(Dummy {
            name: name.to_string(),
            at,
        })
    }

    #[test]
    fn test_registration_order_and_duplicates() {
        let mut reg: Registry = Registry::new();
        reg.register(dummy("b", Vec3::ZERO)).unwrap();
        reg.register(dummy("a", Vec3::ZERO)).unwrap();
        assert!(matches!(
            reg.register(dummy("a", Vec3::ONE)),
            Err(PolyvizError::StructureExists(_))
        ));

        let names: Vec<&str> = reg.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_remove_and_bounds() {
        let mut reg: Registry = Registry::new();
        reg.register(dummy("a", Vec3::ZERO)).unwrap();
        reg.register(dummy("b", Vec3::splat(2.0))).unwrap();

        let (min, max) = reg.bounding_box().unwrap();
        assert_eq!(min, Vec3::ZERO);
        assert_eq!(max, Vec3::splat(3.0));

        assert!(reg.remove("Dummy", "a").is_some());
        assert!(reg.get("Dummy", "a").is_none());
        assert_eq!(reg.remove_named("b"), 1);
        assert!(reg.is_empty());
    }
}

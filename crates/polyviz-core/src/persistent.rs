//! Named values that remember their last setting.
//!
//! A [`PersistentValue`] looks itself up by name in a [`PersistentCache`] when it
//! is created. If a value with that name was set before, for example on a quantity
//! that has since been replaced by a new one of the same name, the cached value wins
//! over the construction default. Every explicit `set` writes through to the cache.
//!
//! The cache is an explicit object shared through [`SharedPersistentCache`] and
//! injected at construction; there is no process-wide instance.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use glam::Vec3;

use crate::quantity::IsolineStyle;
use crate::scaled_value::ScaledValue;

/// Name-keyed storage with one map per value kind.
#[derive(Debug, Default)]
pub struct PersistentCache {
    floats: HashMap<String, f32>,
    bools: HashMap<String, bool>,
    strings: HashMap<String, String>,
    vec3s: HashMap<String, Vec3>,
    scaled_values: HashMap<String, ScaledValue>,
    isoline_styles: HashMap<String, IsolineStyle>,
}

/// Shared handle to a cache.
pub type SharedPersistentCache = Arc<Mutex<PersistentCache>>;

/// A type that has a sub-map in [`PersistentCache`].
pub trait Persistable: Clone + PartialEq + Send + Sync + 'static {
    fn cache_map(cache: &PersistentCache) -> &HashMap<String, Self>;
    fn cache_map_mut(cache: &mut PersistentCache) -> &mut HashMap<String, Self>;
}

macro_rules! impl_persistable {
    ($ty:ty, $field:ident) => {
        impl Persistable for $ty {
            fn cache_map(cache: &PersistentCache) -> &HashMap<String, Self> {
                &cache.$field
            }

            fn cache_map_mut(cache: &mut PersistentCache) -> &mut HashMap<String, Self> {
                &mut cache.$field
            }
        }
    };
}

impl_persistable!(f32, floats);
impl_persistable!(bool, bools);
impl_persistable!(String, strings);
impl_persistable!(Vec3, vec3s);
impl_persistable!(ScaledValue, scaled_values);
impl_persistable!(IsolineStyle, isoline_styles);

impl PersistentCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty cache behind a shared handle.
    pub fn shared() -> SharedPersistentCache {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Looks up a cached value.
    pub fn get<T: Persistable>(&self, name: &str) -> Option<T> {
        T::cache_map(self).get(name).cloned()
    }

    /// Stores a value, replacing any previous one with the same name.
    pub fn insert<T: Persistable>(&mut self, name: impl Into<String>, value: T) {
        T::cache_map_mut(self).insert(name.into(), value);
    }

    /// Removes a cached value.
    pub fn remove<T: Persistable>(&mut self, name: &str) -> Option<T> {
        T::cache_map_mut(self).remove(name)
    }

    /// Returns true if a value of type `T` is cached under `name`.
    pub fn contains<T: Persistable>(&self, name: &str) -> bool {
        T::cache_map(self).contains_key(name)
    }

    /// Total number of cached entries across all kinds.
    pub fn len(&self) -> usize {
        self.floats.len()
            + self.bools.len()
            + self.strings.len()
            + self.vec3s.len()
            + self.scaled_values.len()
            + self.isoline_styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forgets every cached value.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

fn lock(cache: &SharedPersistentCache) -> MutexGuard<'_, PersistentCache> {
    // A panic while holding the lock cannot leave the maps half-written.
    cache.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A named variable whose value is remembered in a [`PersistentCache`].
#[derive(Debug)]
pub struct PersistentValue<T: Persistable> {
    name: String,
    value: T,
    holds_default: bool,
    cache: SharedPersistentCache,
}

impl<T: Persistable> PersistentValue<T> {
    /// Creates the value, taking the cached value for `name` if there is one.
    pub fn new(cache: &SharedPersistentCache, name: impl Into<String>, default: T) -> Self {
        let name = name.into();
        let mut guard = lock(cache);
        let (value, holds_default) = match guard.get::<T>(&name) {
            Some(cached) => (cached, false),
            None => {
                guard.insert(name.clone(), default.clone());
                (default, true)
            }
        };
        drop(guard);

        Self {
            name,
            value,
            holds_default,
            cache: Arc::clone(cache),
        }
    }

    /// Returns the cache key.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current value.
    pub fn get(&self) -> &T {
        &self.value
    }

    /// Mutable access for UI widgets. Call [`Self::manually_changed`] afterwards so
    /// the new value reaches the cache.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.value
    }

    /// Writes the current value through to the cache after an edit via `get_mut`.
    pub fn manually_changed(&mut self) {
        let value = self.value.clone();
        self.set(value);
    }

    /// Sets the value and records it in the cache.
    pub fn set(&mut self, value: T) {
        lock(&self.cache).insert(self.name.clone(), value.clone());
        self.value = value;
        self.holds_default = false;
    }

    /// Sets the value only if it was never explicitly set or restored from the cache.
    pub fn set_passive(&mut self, value: T) {
        if self.holds_default {
            lock(&self.cache).insert(self.name.clone(), value.clone());
            self.value = value;
        }
    }

    /// Removes the cached entry without changing the current value.
    pub fn clear_cache(&mut self) {
        lock(&self.cache).remove::<T>(&self.name);
        self.holds_default = true;
    }

    /// True while the value was neither set explicitly nor restored from the cache.
    pub fn holds_default_value(&self) -> bool {
        self.holds_default
    }
}

impl<T: Persistable + Copy> PersistentValue<T> {
    /// Returns a copy of the current value.
    pub fn value(&self) -> T {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_value_uses_default_and_populates_cache() {
        let cache = PersistentCache::shared();
        let v = PersistentValue::new(&cache, "cn#radius", 0.5_f32);
        assert_eq!(v.value(), 0.5);
        assert!(v.holds_default_value());
        assert_eq!(cache.lock().unwrap().get::<f32>("cn#radius"), Some(0.5));
    }

    #[test]
    fn test_cached_value_wins_over_default() {
        let cache = PersistentCache::shared();
        {
            let mut v = PersistentValue::new(&cache, "q#cmap", "viridis".to_string());
            v.set("blues".to_string());
        }
        let v = PersistentValue::new(&cache, "q#cmap", "viridis".to_string());
        assert_eq!(v.get(), "blues");
        assert!(!v.holds_default_value());
    }

    #[test]
    fn test_set_passive_only_applies_to_defaults() {
        let cache = PersistentCache::shared();
        let mut v = PersistentValue::new(&cache, "q#enabled", false);
        v.set_passive(true);
        assert!(*v.get());
        assert!(v.holds_default_value());

        v.set(false);
        v.set_passive(true);
        assert!(!*v.get());
    }

    #[test]
    fn test_manual_edit_reaches_cache() {
        let cache = PersistentCache::shared();
        let mut v = PersistentValue::new(&cache, "q#color", Vec3::ZERO);
        *v.get_mut() = Vec3::ONE;
        assert_eq!(cache.lock().unwrap().get::<Vec3>("q#color"), Some(Vec3::ZERO));
        v.manually_changed();
        assert_eq!(cache.lock().unwrap().get::<Vec3>("q#color"), Some(Vec3::ONE));
    }

    #[test]
    fn test_clear_cache_keeps_value() {
        let cache = PersistentCache::shared();
        let mut v = PersistentValue::new(&cache, "q#style", IsolineStyle::Stripe);
        v.set(IsolineStyle::Contour);
        v.clear_cache();
        assert_eq!(v.value(), IsolineStyle::Contour);
        assert!(v.holds_default_value());
        assert!(!cache.lock().unwrap().contains::<IsolineStyle>("q#style"));
    }

    #[test]
    fn test_typed_maps_are_separate() {
        let mut cache = PersistentCache::new();
        cache.insert("x", 1.0_f32);
        cache.insert("x", true);
        assert_eq!(cache.get::<f32>("x"), Some(1.0));
        assert_eq!(cache.get::<bool>("x"), Some(true));
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }
}

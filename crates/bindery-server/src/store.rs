//! Per-context store of shared objects.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

/// A value held in a [`SharedObjectStore`].
pub type SharedObject = Arc<dyn Any + Send + Sync>;

/// Keyed store of arbitrary values, scoped to one context.
///
/// Reads take the shared lock and writes the exclusive one; guards are
/// released on every exit path, including unwinding.
#[derive(Default)]
pub struct SharedObjectStore {
    objects: RwLock<HashMap<String, SharedObject>>,
}

impl SharedObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an object. An empty name is never present.
    pub fn get(&self, name: &str) -> Option<SharedObject> {
        if name.is_empty() {
            return None;
        }
        self.objects.read().get(name).cloned()
    }

    /// Look up an object and downcast it to `T`.
    pub fn get_as<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.get(name).and_then(|obj| obj.downcast::<T>().ok())
    }

    /// Store `value` under `name`, returning the object it replaced.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty.
    pub fn set<T: Any + Send + Sync>(&self, name: &str, value: T) -> Option<SharedObject> {
        self.set_shared(name, Arc::new(value))
    }

    /// Store an already shared object under `name`.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty.
    pub fn set_shared(&self, name: &str, value: SharedObject) -> Option<SharedObject> {
        assert!(!name.is_empty(), "shared object name must not be empty");
        self.objects.write().insert(name.to_string(), value)
    }

    /// Remove an object. An empty name removes nothing.
    pub fn remove(&self, name: &str) -> Option<SharedObject> {
        if name.is_empty() {
            return None;
        }
        self.objects.write().remove(name)
    }

    /// Names of all stored objects, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.objects.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl std::fmt::Debug for SharedObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedObjectStore")
            .field("names", &self.names())
            .finish()
    }
}

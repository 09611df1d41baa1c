//! Application object handles and the built-in dynamic target types

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::any::Any;
use std::sync::Arc;

use super::value::Value;

/// Shared handle to an application object
///
/// The engine never sees concrete application types; it sees a handle
/// carrying the registered type name and an `Any`-erased payload that the
/// registered accessor closures downcast internally. Handles have reference
/// semantics: clones alias the same object.
#[derive(Clone)]
pub struct ObjectHandle {
    type_name: Arc<str>,
    inner: Arc<RwLock<Box<dyn Any + Send + Sync>>>,
}

impl ObjectHandle {
    /// Wrap a value under the given registered type name
    pub fn new<T: Any + Send + Sync>(type_name: &str, value: T) -> Self {
        Self {
            type_name: Arc::from(type_name),
            inner: Arc::new(RwLock::new(Box::new(value))),
        }
    }

    /// The registered type name of the wrapped object
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Whether two handles alias the same object
    pub fn ptr_eq(&self, other: &ObjectHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Run `f` with shared access to the erased payload
    pub fn with_ref<R>(&self, f: impl FnOnce(&dyn Any) -> R) -> R {
        let guard = self.inner.read();
        f(guard.as_ref())
    }

    /// Run `f` with exclusive access to the erased payload
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut dyn Any) -> R) -> R {
        let mut guard = self.inner.write();
        f(guard.as_mut())
    }

    /// Run `f` against the payload downcast to `T`, if it is one
    pub fn with_downcast_ref<T: Any, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let guard = self.inner.read();
        guard.downcast_ref::<T>().map(f)
    }

    /// Run `f` against the payload downcast to `&mut T`, if it is one
    pub fn with_downcast_mut<T: Any, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut guard = self.inner.write();
        guard.downcast_mut::<T>().map(f)
    }
}

/// Open-ended name/value bag, the built-in map-style target
///
/// Property access on a bag resolves any name: absent keys read as `Null`
/// and writes insert. Registered under the type name `"PropertyBag"`.
#[derive(Default)]
pub struct PropertyBag {
    entries: FxHashMap<String, Value>,
}

impl PropertyBag {
    /// Create an empty bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an entry; `None` means the key is absent (not null-valued)
    pub fn get(&self, name: &str) -> Option<Value> {
        self.entries.get(name).cloned()
    }

    /// Insert or replace an entry
    pub fn put(&mut self, name: &str, value: Value) {
        self.entries.insert(name.to_string(), value);
    }

    /// Whether the key is present, even with a null value
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the bag has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Wrap this bag in an object handle under its registered type name
    pub fn into_value(self) -> Value {
        Value::Object(ObjectHandle::new(PropertyBag::TYPE_NAME, self))
    }

    /// The registered type name of the bag
    pub const TYPE_NAME: &'static str = "PropertyBag";
}

/// Fixed-length sequence with null holes
///
/// Stands in for a foreign scripting-engine array: the length is set at
/// construction, unset slots read as `Null`, and the sequence protocol's
/// null-skipping conventions exist for exactly this type. Registered under
/// the type name `"SparseArray"`.
pub struct SparseArray {
    slots: Vec<Value>,
}

impl SparseArray {
    /// Create an array of `len` null holes
    pub fn new(len: usize) -> Self {
        Self {
            slots: vec![Value::Null; len],
        }
    }

    /// Create from existing slots (nulls are holes)
    pub fn from_slots(slots: Vec<Value>) -> Self {
        Self { slots }
    }

    /// Fixed length, holes included
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the array has zero slots
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Clone of the slot at `index`, if in range
    pub fn get(&self, index: usize) -> Option<Value> {
        self.slots.get(index).cloned()
    }

    /// Fill the slot at `index`; returns false when out of range
    pub fn set(&mut self, index: usize, value: Value) -> bool {
        match self.slots.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Snapshot the slots
    pub fn to_vec(&self) -> Vec<Value> {
        self.slots.clone()
    }

    /// Wrap this array in an object handle under its registered type name
    pub fn into_value(self) -> Value {
        Value::Object(ObjectHandle::new(SparseArray::TYPE_NAME, self))
    }

    /// The registered type name of the sparse array
    pub const TYPE_NAME: &'static str = "SparseArray";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_clones_alias_the_object() {
        let bag = PropertyBag::new().into_value();
        let Value::Object(h) = &bag else {
            panic!("expected object");
        };
        let alias = h.clone();
        alias.with_downcast_mut::<PropertyBag, _>(|b| b.put("x", Value::Int(1)));
        let seen = h
            .with_downcast_ref::<PropertyBag, _>(|b| b.get("x"))
            .flatten();
        assert_eq!(seen, Some(Value::Int(1)));
    }

    #[test]
    fn bag_distinguishes_absent_from_null() {
        let mut bag = PropertyBag::new();
        bag.put("present", Value::Null);
        assert!(bag.contains("present"));
        assert_eq!(bag.get("present"), Some(Value::Null));
        assert_eq!(bag.get("absent"), None);
    }
}

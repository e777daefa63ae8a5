//! Instances of user classes: a class handle plus a mutable attribute table.
//!
//! The raw accessors here perform no access control. Shielded reads and writes
//! go through `ObjectRef::get_attr` / `set_attr` in the `shield` module.
use super::Value;
use crate::type_system::{TypeDef, TypeRef};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

pub struct Instance {
    class: TypeRef,
    attrs: RwLock<Vec<(String, Value)>>,
}

/// Shared handle to an instance. Clones refer to the same object.
#[derive(Clone)]
pub struct ObjectRef(Arc<Instance>);

impl ObjectRef {
    pub(crate) fn new(class: TypeRef) -> Self {
        Self(Arc::new(Instance { class, attrs: RwLock::new(Vec::new()) }))
    }

    pub fn class(&self) -> &TypeDef {
        &self.0.class
    }

    pub fn class_ref(&self) -> &TypeRef {
        &self.0.class
    }

    /// Identity comparison.
    #[inline]
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn raw_get(&self, name: &str) -> Option<Value> {
        let attrs = self.0.attrs.read().unwrap_or_else(PoisonError::into_inner);
        attrs.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone())
    }

    pub(crate) fn raw_set(&self, name: &str, value: Value) {
        let mut attrs = self.0.attrs.write().unwrap_or_else(PoisonError::into_inner);
        match attrs.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value,
            None => attrs.push((name.to_string(), value)),
        }
    }

    pub(crate) fn raw_remove(&self, name: &str) -> Option<Value> {
        let mut attrs = self.0.attrs.write().unwrap_or_else(PoisonError::into_inner);
        let pos = attrs.iter().position(|(k, _)| k == name)?;
        Some(attrs.remove(pos).1)
    }

    /// Names of the attributes currently stored on the instance, in insertion order.
    pub fn attribute_names(&self) -> Vec<String> {
        let attrs = self.0.attrs.read().unwrap_or_else(PoisonError::into_inner);
        attrs.iter().map(|(k, _)| k.clone()).collect()
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} object at {:p}>", self.class().name(), Arc::as_ptr(&self.0))
    }
}

//! Shielded attribute access on instances.
//!
//! Unshielded classes take the direct path with no checks. For shielded
//! classes, restricted names require the instance to be the receiver of a
//! method executing on the current thread, and writes are validated against
//! the class policy before anything is stored.
use super::naming::is_public;
use super::ownership;
use crate::error::{Access, GuardError};
use crate::guard::{bind, CallArgs};
use crate::value::{ObjectRef, Value};
use std::sync::Arc;
use tracing::debug;

impl ObjectRef {
    fn gate(&self, access: Access, name: &str) -> Result<(), GuardError> {
        if !self.class().is_shielded() || is_public(name) || ownership::is_owner(self) {
            return Ok(());
        }
        debug!(class = self.class().name(), attribute = name, %access, "shield denied access");
        Err(GuardError::AccessDenied { access, name: name.to_string() })
    }

    /// Reads an attribute: instance storage first, then a method from the
    /// class, returned bound to this instance.
    pub fn get_attr(&self, name: &str) -> Result<Value, GuardError> {
        self.gate(Access::Read, name)?;
        if let Some(value) = self.raw_get(name) {
            return Ok(value);
        }
        match self.class().resolve_method(name) {
            Some(method) => Ok(Value::Callable(Arc::new(bind(Arc::clone(method), Value::Object(self.clone()))))),
            None => Err(self.missing(name)),
        }
    }

    /// Writes an attribute. A policy violation leaves the stored value untouched.
    pub fn set_attr(&self, name: &str, value: impl Into<Value>) -> Result<(), GuardError> {
        self.gate(Access::Write, name)?;
        let value = value.into();
        if let Some(policy) = self.class().policy() {
            policy.check_write(name, &value)?;
        }
        self.raw_set(name, value);
        Ok(())
    }

    /// Deletes an attribute. Subject to the ownership gate but not to write rules.
    pub fn del_attr(&self, name: &str) -> Result<Value, GuardError> {
        self.gate(Access::Write, name)?;
        self.raw_remove(name).ok_or_else(|| self.missing(name))
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.raw_get(name).is_some() || self.class().resolve_method(name).is_some()
    }

    /// Looks up `name` through the shield and calls it.
    pub fn call_method(&self, name: &str, args: CallArgs) -> Result<Value, GuardError> {
        match self.get_attr(name)? {
            Value::Callable(f) => f.call(args),
            other => Err(GuardError::NotCallable { type_name: other.type_name().to_string() }),
        }
    }

    fn missing(&self, name: &str) -> GuardError {
        GuardError::AttributeMissing { type_name: self.class().name().to_string(), name: name.to_string() }
    }
}

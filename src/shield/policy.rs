//! Per-class write rules for shielded attributes.
use crate::error::GuardError;
use crate::rules::{describe, enforce, TypeRule};
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct FieldRule {
    pub rule: Arc<TypeRule>,
    pub expected: String,
}

/// Attribute name to write rule. Built when a class is registered and shared,
/// read-only, by all of its instances and subclasses.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    fields: HashMap<String, FieldRule>,
}

impl AccessPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(self, name: impl Into<String>, rule: TypeRule) -> Self {
        let expected = describe(&rule);
        self.field_described(name, expected, rule)
    }

    pub fn field_described(mut self, name: impl Into<String>, expected: impl Into<String>, rule: TypeRule) -> Self {
        self.fields.insert(name.into(), FieldRule { rule: Arc::new(rule), expected: expected.into() });
        self
    }

    pub fn rule_for(&self, name: &str) -> Option<&FieldRule> {
        self.fields.get(name)
    }

    /// Copies every rule of `other`, overriding rules of the same name.
    pub fn extend_from(&mut self, other: &AccessPolicy) {
        self.fields.extend(other.fields.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    /// Validates a write of `value` to `name`. Names without a rule accept anything.
    pub fn check_write(&self, name: &str, value: &Value) -> Result<(), GuardError> {
        match self.fields.get(name) {
            Some(field) => enforce(name, &field.expected, &field.rule, value),
            None => Ok(()),
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldRule)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

//! The rule model: immutable structural-type rules and the parameter/return
//! rule sets guards are built from.
mod describe;
pub mod expr;
mod matcher;

pub use self::describe::describe;
pub use self::expr::{ExprError, TypeExpr};
pub use self::matcher::{enforce, matches};

use crate::error::GuardError;
use crate::type_system::TypeRef;
use crate::type_system::builtins;
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A node of the structural-type rule tree.
///
/// A `None` sub-rule accepts any contents of the right container kind.
#[derive(Debug, Clone)]
pub enum TypeRule {
    Any,
    /// The type or any subtype.
    InstanceOf(TypeRef),
    /// Exactly this runtime type; subtype instances fail.
    ExactType(TypeRef),
    Union(Vec<TypeRule>),
    ListOf(Option<Box<TypeRule>>),
    DictOf(Option<Box<TypeRule>>, Option<Box<TypeRule>>),
    /// `tuple[T, ...]`: any arity, every element matching.
    TupleHomogeneous(Box<TypeRule>),
    /// `tuple[A, B, ...]` with a fixed arity.
    TupleFixed(Vec<TypeRule>),
    SetOf(Option<Box<TypeRule>>),
    /// Membership by value equality.
    LiteralSet(Vec<Value>),
}

impl TypeRule {
    pub fn instance_of(t: &TypeRef) -> Self {
        TypeRule::InstanceOf(Arc::clone(t))
    }

    pub fn exact(t: &TypeRef) -> Self {
        TypeRule::ExactType(Arc::clone(t))
    }

    pub fn list_of(element: TypeRule) -> Self {
        TypeRule::ListOf(Some(Box::new(element)))
    }

    pub fn set_of(element: TypeRule) -> Self {
        TypeRule::SetOf(Some(Box::new(element)))
    }

    pub fn dict_of(key: TypeRule, value: TypeRule) -> Self {
        TypeRule::DictOf(Some(Box::new(key)), Some(Box::new(value)))
    }

    pub fn tuple_of(element: TypeRule) -> Self {
        TypeRule::TupleHomogeneous(Box::new(element))
    }

    /// `T | None`.
    pub fn optional(rule: TypeRule) -> Self {
        TypeRule::Union(vec![rule, TypeRule::exact(builtins::none_type())])
    }

    pub fn literal(values: impl IntoIterator<Item = Value>) -> Self {
        TypeRule::LiteralSet(values.into_iter().collect())
    }

    /// Bare scalar annotations (`int`, `str`, `float`, `bool`, `None`) are
    /// enforced by exact type at a call boundary, so `True` is not an `int`
    /// argument. Everything else is returned unchanged.
    pub fn promote_primitive(self) -> Self {
        match self {
            TypeRule::InstanceOf(t) if builtins::is_primitive(&t) => TypeRule::ExactType(t),
            other => other,
        }
    }
}

/// `(name, expected description, rule)` for one parameter, local or attribute.
#[derive(Debug, Clone)]
pub struct ParameterRule {
    pub name: String,
    pub expected: String,
    pub rule: Arc<TypeRule>,
}

impl ParameterRule {
    pub fn new(name: impl Into<String>, expected: impl Into<String>, rule: impl Into<Arc<TypeRule>>) -> Self {
        Self { name: name.into(), expected: expected.into(), rule: rule.into() }
    }

    /// A rule whose expected description is derived from the rule itself.
    pub fn described(name: impl Into<String>, rule: TypeRule) -> Self {
        let expected = describe(&rule);
        Self::new(name, expected, rule)
    }

    #[inline]
    pub fn check(&self, value: &Value) -> Result<(), GuardError> {
        enforce(&self.name, &self.expected, &self.rule, value)
    }
}

/// Positional rules indexed by call position. `None` marks a parameter that
/// occupies a position but carries no rule.
pub type PositionalRules = Vec<Option<Arc<ParameterRule>>>;

/// Rules for keyword-capable parameters, keyed by name.
pub type KeywordRules = HashMap<String, Arc<ParameterRule>>;

#[derive(Debug, Clone, Default)]
pub struct ReturnRule {
    pub rule: Option<Arc<TypeRule>>,
    pub expected: String,
    pub check: bool,
}

impl ReturnRule {
    pub fn new(rule: Option<Arc<TypeRule>>, expected: impl Into<String>, check: bool) -> Self {
        Self { rule, expected: expected.into(), check }
    }

    /// Return checking happens only when enabled and a rule is configured.
    pub fn is_active(&self) -> bool {
        self.check && self.rule.is_some()
    }

    pub fn validate(&self, result: &Value) -> Result<(), GuardError> {
        match &self.rule {
            Some(rule) if self.check => enforce("return", &self.expected, rule, result),
            _ => Ok(()),
        }
    }
}

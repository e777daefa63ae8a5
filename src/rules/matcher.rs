//! The rule matcher: a pure recursive evaluation of a value against a rule.
use super::TypeRule;
use crate::error::GuardError;
use crate::value::Value;
use tracing::debug;

/// Returns `true` if `value` satisfies `rule`.
///
/// Container rules check the container kind first and fail immediately on a
/// mismatch; empty containers satisfy any element rule. Recursion depth is
/// bounded by the rule tree, not by the value.
pub fn matches(value: &Value, rule: &TypeRule) -> bool {
    match rule {
        TypeRule::Any => true,
        TypeRule::ExactType(t) => value.type_def().id() == t.id(),
        TypeRule::InstanceOf(t) => value.type_def().is_subtype_of(t),
        TypeRule::Union(options) => options.iter().any(|r| matches(value, r)),
        TypeRule::ListOf(element) => match value {
            Value::List(items) => all_match(items, element.as_deref()),
            _ => false,
        },
        TypeRule::SetOf(element) => match value {
            Value::Set(items) => all_match(items, element.as_deref()),
            _ => false,
        },
        TypeRule::DictOf(key_rule, value_rule) => match value {
            Value::Dict(entries) => entries.iter().all(|(k, v)| {
                matches_opt(k, key_rule.as_deref()) && matches_opt(v, value_rule.as_deref())
            }),
            _ => false,
        },
        TypeRule::TupleHomogeneous(element) => match value {
            Value::Tuple(items) => items.iter().all(|item| matches(item, element)),
            _ => false,
        },
        TypeRule::TupleFixed(rules) => match value {
            Value::Tuple(items) => {
                items.len() == rules.len()
                    && items.iter().zip(rules).all(|(item, r)| matches(item, r))
            }
            _ => false,
        },
        TypeRule::LiteralSet(allowed) => allowed.iter().any(|lit| lit == value),
    }
}

#[inline]
fn matches_opt(value: &Value, rule: Option<&TypeRule>) -> bool {
    rule.map_or(true, |r| matches(value, r))
}

#[inline]
fn all_match(items: &[Value], element: Option<&TypeRule>) -> bool {
    match element {
        None => true,
        Some(rule) => items.iter().all(|item| matches(item, rule)),
    }
}

/// Checks `value` against `rule`, producing a `TypeMismatch` labelled with
/// `subject` on failure.
pub fn enforce(subject: &str, expected: &str, rule: &TypeRule, value: &Value) -> Result<(), GuardError> {
    if matches(value, rule) {
        return Ok(());
    }
    let actual = value.type_name().to_string();
    debug!(subject, expected, actual = %actual, "type rule violated");
    Err(GuardError::TypeMismatch {
        name: subject.to_string(),
        expected: expected.to_string(),
        actual,
        repr: value.repr(),
    })
}

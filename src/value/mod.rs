//! The dynamic value model that guards and shields operate on.
//!
//! Values mirror the data model of a dynamically typed host: scalars, the four
//! builtin containers, user objects and callables. Equality follows the host's
//! rules (numeric cross-type equality, identity for objects), which is what
//! literal-set membership relies on.
pub mod object;

pub use self::object::ObjectRef;

use crate::guard::CallableRef;
use crate::type_system::{builtins, TypeDef, TypeRef};
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    /// Members are unique under `==`; use [`Value::set`] to build one.
    Set(Vec<Value>),
    /// Insertion-ordered entries with unique keys; use [`Value::dict`] to build one.
    Dict(Vec<(Value, Value)>),
    Object(ObjectRef),
    Callable(CallableRef),
}

impl Value {
    pub fn str(s: impl AsRef<str>) -> Self {
        Value::Str(Arc::from(s.as_ref()))
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(items.into_iter().collect())
    }

    pub fn tuple(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Tuple(items.into_iter().collect())
    }

    /// Builds a set, dropping members equal to one already present.
    pub fn set(items: impl IntoIterator<Item = Value>) -> Self {
        let mut members: Vec<Value> = Vec::new();
        for item in items {
            if !members.contains(&item) {
                members.push(item);
            }
        }
        Value::Set(members)
    }

    /// Builds a dict; a repeated key keeps its first position and its last value.
    pub fn dict(entries: impl IntoIterator<Item = (Value, Value)>) -> Self {
        let mut out: Vec<(Value, Value)> = Vec::new();
        for (key, value) in entries {
            match out.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => out.push((key, value)),
            }
        }
        Value::Dict(out)
    }

    /// The runtime type of this value.
    pub fn type_ref(&self) -> &TypeRef {
        match self {
            Value::None => builtins::none_type(),
            Value::Bool(_) => builtins::bool_type(),
            Value::Int(_) => builtins::int_type(),
            Value::Float(_) => builtins::float_type(),
            Value::Str(_) => builtins::str_type(),
            Value::List(_) => builtins::list_type(),
            Value::Tuple(_) => builtins::tuple_type(),
            Value::Set(_) => builtins::set_type(),
            Value::Dict(_) => builtins::dict_type(),
            Value::Callable(_) => builtins::function_type(),
            Value::Object(obj) => obj.class_ref(),
        }
    }

    pub fn type_def(&self) -> &TypeDef {
        self.type_ref()
    }

    pub fn type_name(&self) -> &str {
        self.type_def().name()
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            Value::Bool(b) => Some(f64::from(u8::from(*b))),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(&**s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_callable(&self) -> Option<&CallableRef> {
        match self {
            Value::Callable(f) => Some(f),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// The host-language `repr` of the value, used in error messages.
    pub fn repr(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = write_repr(self, &mut out);
        out
    }
}

fn write_repr(value: &Value, out: &mut String) -> fmt::Result {
    use fmt::Write;
    match value {
        Value::None => out.write_str("None"),
        Value::Bool(true) => out.write_str("True"),
        Value::Bool(false) => out.write_str("False"),
        Value::Int(i) => write!(out, "{}", i),
        Value::Float(f) => out.write_str(&float_repr(*f)),
        Value::Str(s) => out.write_str(&str_repr(s)),
        Value::List(items) => {
            out.write_char('[')?;
            write_items(items, out)?;
            out.write_char(']')
        }
        Value::Tuple(items) => {
            out.write_char('(')?;
            write_items(items, out)?;
            if items.len() == 1 {
                out.write_char(',')?;
            }
            out.write_char(')')
        }
        Value::Set(items) if items.is_empty() => out.write_str("set()"),
        Value::Set(items) => {
            out.write_char('{')?;
            write_items(items, out)?;
            out.write_char('}')
        }
        Value::Dict(entries) => {
            out.write_char('{')?;
            for (i, (k, v)) in entries.iter().enumerate() {
                if i > 0 {
                    out.write_str(", ")?;
                }
                write_repr(k, out)?;
                out.write_str(": ")?;
                write_repr(v, out)?;
            }
            out.write_char('}')
        }
        Value::Object(obj) => write!(out, "<{} object>", obj.class().name()),
        Value::Callable(f) => write!(out, "<function {}>", f.name()),
    }
}

fn write_items(items: &[Value], out: &mut String) -> fmt::Result {
    use fmt::Write;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.write_str(", ")?;
        }
        write_repr(item, out)?;
    }
    Ok(())
}

/// Shortest round-trip digits; scientific notation outside `1e-4 <= |f| < 1e16`,
/// with a signed, two-digit minimum exponent (`1e+16`, `1.5e-07`).
fn float_repr(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf".to_string() } else { "-inf".to_string() };
    }
    let sci = format!("{:e}", f);
    let (mantissa, exponent) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    if f != 0.0 && !(-4..16).contains(&exponent) {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exponent.abs())
    } else if f.fract() == 0.0 {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}

fn str_repr(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (None, None) => true,
            (Str(a), Str(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Bool(a), Bool(b)) => a == b,
            // Numeric tower: True == 1 == 1.0
            (Float(a), Float(b)) => a == b,
            (Float(f), n @ (Bool(_) | Int(_))) | (n @ (Bool(_) | Int(_)), Float(f)) => {
                n.as_int().map_or(false, |i| int_eq_float(i, *f))
            }
            (Bool(_) | Int(_), Bool(_) | Int(_)) => self.as_int() == other.as_int(),
            (List(a), List(b)) | (Tuple(a), Tuple(b)) => a == b,
            (Set(a), Set(b)) => a.len() == b.len() && a.iter().all(|x| b.contains(x)),
            (Dict(a), Dict(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| b.iter().any(|(k2, v2)| k == k2 && v == v2))
            }
            (Object(a), Object(b)) => a.ptr_eq(b),
            (Callable(a), Callable(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Exact comparison: no rounding of `i` to the nearest float.
fn int_eq_float(i: i64, f: f64) -> bool {
    // 2^63 is exactly representable; anything at or past it is out of range.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    f.fract() == 0.0 && (-LIMIT..LIMIT).contains(&f) && f as i64 == i
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            other => f.write_str(&other.repr()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self { Value::Bool(b) }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self { Value::Int(i) }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self { Value::Int(i64::from(i)) }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self { Value::Float(f) }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self { Value::str(s) }
}

impl From<String> for Value {
    fn from(s: String) -> Self { Value::Str(Arc::from(s)) }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Self { Value::Object(obj) }
}

impl From<CallableRef> for Value {
    fn from(f: CallableRef) -> Self { Value::Callable(f) }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::None, Into::into)
    }
}

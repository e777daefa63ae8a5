//! Error surface shared by guards, strict guards and the attribute shield.
use std::fmt;
use thiserror::Error;

/// The kind of attribute access refused by the shield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    Read,
    Write,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Message wording is part of the public contract ("read" / "modify").
        match self {
            Access::Read => f.write_str("read"),
            Access::Write => f.write_str("modify"),
        }
    }
}

/// Failures surfaced at an instrumented boundary.
///
/// `TypeMismatch` covers arguments, keywords, return values, local bindings and
/// attribute writes alike; only the labelled subject (`name`) differs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GuardError {
    #[error("Variable '{name}' expected {expected}, got {actual} ({repr})")]
    TypeMismatch {
        name: String,
        expected: String,
        actual: String,
        repr: String,
    },
    #[error("External access denied: Cannot {access} protected/private attribute '{name}'.")]
    AccessDenied { access: Access, name: String },
    #[error("'{type_name}' object has no attribute '{name}'")]
    AttributeMissing { type_name: String, name: String },
    #[error("'{type_name}' object is not callable")]
    NotCallable { type_name: String },
    /// An error raised by a wrapped code body. Guards propagate it untouched.
    #[error("{0}")]
    Raised(String),
}

impl GuardError {
    pub fn raised(msg: impl Into<String>) -> Self {
        GuardError::Raised(msg.into())
    }

    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, GuardError::TypeMismatch { .. })
    }

    pub fn is_access_denied(&self) -> bool {
        matches!(self, GuardError::AccessDenied { .. })
    }

    /// The labelled subject of a mismatch or denial (parameter, local, attribute or "return").
    pub fn subject(&self) -> Option<&str> {
        match self {
            GuardError::TypeMismatch { name, .. }
            | GuardError::AccessDenied { name, .. }
            | GuardError::AttributeMissing { name, .. } => Some(name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_mismatch_message_format() {
        let err = GuardError::TypeMismatch {
            name: "x".into(),
            expected: "int".into(),
            actual: "str".into(),
            repr: "'a'".into(),
        };
        assert_eq!(err.to_string(), "Variable 'x' expected int, got str ('a')");
        assert_eq!(err.subject(), Some("x"));
    }

    #[test]
    fn test_access_denied_message_uses_modify_for_writes() {
        let read = GuardError::AccessDenied { access: Access::Read, name: "_id".into() };
        let write = GuardError::AccessDenied { access: Access::Write, name: "_id".into() };
        assert_eq!(
            read.to_string(),
            "External access denied: Cannot read protected/private attribute '_id'."
        );
        assert_eq!(
            write.to_string(),
            "External access denied: Cannot modify protected/private attribute '_id'."
        );
    }
}

//! Defines the error types for the type system module.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("A type named '{0}' is already registered")]
    DuplicateName(String),
    #[error("Class '{class}' names unknown base '{base}'")]
    UnknownBase { class: String, base: String },
    #[error("Class '{class}' lists base '{base}' more than once")]
    DuplicateBase { class: String, base: String },
    #[error("Class '{class}' cannot inherit from builtin '{base}'")]
    SealedBase { class: String, base: String },
}

//! Runtime structural-type enforcement for dynamically typed values.
//!
//! Four layers, leaves first:
//!
//! * [`rules`]: immutable rule trees and the pure matcher that evaluates them.
//! * [`guard`]: call guards validating arguments and return values, and strict
//!   guards that also validate a body's local bindings as it returns.
//! * [`shield`]: per-class encapsulation of `_`-prefixed attributes and
//!   validated attribute writes.
//! * [`type_system`] and [`value`]: the runtime types and values everything
//!   above operates on.
//!
//! Rules are built once and shared read-only; guards and registered classes
//! can be used from any number of threads.
pub mod config;
pub mod error;
pub mod guard;
pub mod rules;
pub mod shield;
pub mod type_system;
pub mod value;

pub use crate::config::{ClassDecl, ConfigError, GuardConfig, GuardOptions};
pub use crate::error::{Access, GuardError};
pub use crate::guard::{
    guard, make_guard, make_strict_guard, strict_guard, CallArgs, Callable, CallableRef, Frame, Function,
    GuardedCallable, NativeFn, Signature, StrictGuardedCallable,
};
pub use crate::rules::{matches, ParameterRule, TypeExpr, TypeRule};
pub use crate::shield::AccessPolicy;
pub use crate::type_system::{ClassSpec, TypeRegistry};
pub use crate::value::{ObjectRef, Value};

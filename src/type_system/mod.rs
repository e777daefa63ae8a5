//! Runtime types: the builtin table, class descriptors and the class registry.
//!
//! Every value has exactly one runtime type. `InstanceOf` rules consult a
//! type's resolution order, `ExactType` rules its identity, and shielded
//! classes carry their access policy on the descriptor itself.
pub mod builtins;
mod error;
mod registry;
mod type_def;

pub use self::error::RegistryError;
pub use self::registry::{ClassSpec, TypeRegistry};
pub use self::type_def::{TypeDef, TypeId, TypeRef};

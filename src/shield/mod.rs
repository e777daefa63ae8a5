//! The attribute shield: convention-based encapsulation for opted-in classes.
mod access;
pub mod naming;
pub mod ownership;
mod policy;

pub use self::naming::{classify, is_public, Visibility};
pub use self::policy::{AccessPolicy, FieldRule};

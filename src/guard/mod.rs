//! Call interception: plain guards, strict guards and the callable model they wrap.
mod callable;
mod contract;
mod function;
mod plain;
mod signature;
pub mod strict;

pub use self::callable::{bind, BoundMethod, CallArgs, Callable, CallableRef, CodeId, NativeFn};
pub use self::contract::Contract;
pub use self::function::{Frame, Function, RECEIVER};
pub use self::plain::{guard, make_guard, GuardedCallable};
pub use self::signature::{CompiledSignature, Param, ParamKind, Signature};
pub use self::strict::{make_strict_guard, strict_guard, StrictGuardedCallable};
pub use crate::config::GuardOptions;

//! The plain call guard.
use super::callable::{bind, BoundMethod, CallArgs, Callable, CallableRef, CodeId};
use super::contract::Contract;
use super::signature::Signature;
use crate::config::GuardOptions;
use crate::error::GuardError;
use crate::rules::{KeywordRules, PositionalRules, ReturnRule, TypeRule};
use crate::value::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A callable that validates its arguments before delegating and its result
/// after. Metadata reads through to the wrapped callable.
pub struct GuardedCallable {
    inner: CallableRef,
    contract: Contract,
}

impl GuardedCallable {
    pub fn inner(&self) -> &CallableRef {
        &self.inner
    }

    pub fn contract(&self) -> &Contract {
        &self.contract
    }

    pub fn invoke(&self, args: CallArgs) -> Result<Value, GuardError> {
        self.contract.check_args(&args)?;
        let result = self.inner.call(args)?;
        self.contract.check_return(&result)?;
        Ok(result)
    }

    /// Binds the guard to a receiver, as attribute lookup on an instance does.
    pub fn bind(self: &Arc<Self>, receiver: Value) -> BoundMethod {
        bind(Arc::clone(self) as CallableRef, receiver)
    }
}

impl Callable for GuardedCallable {
    fn call(&self, args: CallArgs) -> Result<Value, GuardError> {
        self.invoke(args)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn doc(&self) -> Option<&str> {
        self.inner.doc()
    }

    fn code_id(&self) -> Option<CodeId> {
        self.inner.code_id()
    }

    fn attr(&self, name: &str) -> Option<Value> {
        match name {
            "__wrapped__" => Some(Value::Callable(Arc::clone(&self.inner))),
            other => self.inner.attr(other),
        }
    }
}

impl fmt::Debug for GuardedCallable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardedCallable")
            .field("name", &self.inner.name())
            .field("contract", &self.contract)
            .finish()
    }
}

/// Wraps `inner` with precompiled rules.
///
/// The return rule applies only when `check_return` is set and a rule is given.
pub fn make_guard(
    inner: CallableRef,
    positional: PositionalRules,
    keywords: KeywordRules,
    return_rule: Option<Arc<TypeRule>>,
    return_description: impl Into<String>,
    check_return: bool,
) -> GuardedCallable {
    let ret = ReturnRule::new(return_rule, return_description, check_return);
    debug!(
        callable = inner.name(),
        positional = positional.len(),
        keywords = keywords.len(),
        check_return = ret.is_active(),
        "guard installed"
    );
    GuardedCallable { inner, contract: Contract::new(positional, keywords, ret) }
}

/// Compiles `signature` and wraps `inner` with the result.
pub fn guard(inner: CallableRef, signature: &Signature, options: GuardOptions) -> GuardedCallable {
    let compiled = signature.compile();
    make_guard(
        inner,
        compiled.positional,
        compiled.keywords,
        compiled.returns,
        compiled.return_description,
        options.check_return,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::{Function, NativeFn};
    use crate::type_system::builtins;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn int() -> TypeRule {
        TypeRule::instance_of(builtins::int_type())
    }

    fn add_one() -> CallableRef {
        Arc::new(
            Function::new("f", &["x"], |frame| {
                let x = frame.arg("x")?.as_int().unwrap_or_default();
                Ok(Value::Int(x + 1))
            })
            .with_doc("Adds one."),
        )
    }

    #[test]
    fn test_guard_accepts_and_rejects() {
        let g = guard(add_one(), &Signature::new().param("x", int()).returns(int()), GuardOptions::default());
        assert_eq!(g.call(CallArgs::new().arg(3)).unwrap(), Value::Int(4));
        let err = g.call(CallArgs::new().arg("a")).unwrap_err();
        assert_eq!(err.to_string(), "Variable 'x' expected int, got str ('a')");
        let err = g.call(CallArgs::new().kwarg("x", 1.5)).unwrap_err();
        assert_eq!(err.subject(), Some("x"));
    }

    #[test]
    fn test_bad_argument_never_reaches_inner() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let inner: CallableRef = Arc::new(NativeFn::new("count", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Value::None)
        }));
        let g = guard(inner, &Signature::new().param("x", int()), GuardOptions::default());
        assert!(g.call(CallArgs::new().arg("bad")).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        g.call(CallArgs::new().arg(1)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_return_check_can_be_disabled() {
        let liar: CallableRef = Arc::new(NativeFn::new("liar", |_| Ok(Value::str("nope"))));
        let sig = Signature::new().returns(int());
        let strict = guard(Arc::clone(&liar), &sig, GuardOptions::default());
        let err = strict.call(CallArgs::new()).unwrap_err();
        assert_eq!(err.subject(), Some("return"));

        let lax = guard(liar, &sig, GuardOptions { check_return: false });
        assert_eq!(lax.call(CallArgs::new()).unwrap(), Value::str("nope"));
    }

    #[test]
    fn test_body_errors_propagate_unchanged() {
        let failing: CallableRef = Arc::new(NativeFn::new("boom", |_| Err(GuardError::raised("boom"))));
        let g = guard(failing, &Signature::new().returns(int()), GuardOptions::default());
        assert_eq!(g.call(CallArgs::new()).unwrap_err(), GuardError::raised("boom"));
    }

    #[test]
    fn test_metadata_reads_through() {
        let inner = add_one();
        let g = Arc::new(make_guard(Arc::clone(&inner), Vec::new(), HashMap::new(), None, "", true));
        assert_eq!(g.name(), "f");
        assert_eq!(g.doc(), Some("Adds one."));
        assert_eq!(g.code_id(), inner.code_id());
        assert!(matches!(g.attr("__wrapped__"), Some(Value::Callable(f)) if Arc::ptr_eq(&f, &inner)));
        assert!(g.contract().is_transparent());
        // No rules: any argument reaches the body.
        assert_eq!(g.call(CallArgs::new().arg("anything")).unwrap(), Value::Int(1));
    }
}

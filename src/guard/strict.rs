//! The strict call guard: argument and return checks plus validation of the
//! wrapped body's local bindings at the moment it returns.
//!
//! Observation is scoped to the current thread. Each strict call installs an
//! observer for its cached code identity and removes it when the call ends,
//! whether it returns, fails or unwinds; nested strict calls stack, so the
//! outer observer is active again once the inner call is done. A returning
//! frame is checked by the innermost observer of its own code, wherever that
//! observer sits in the stack.
use super::callable::{bind, BoundMethod, CallArgs, Callable, CallableRef, CodeId};
use super::contract::Contract;
use super::function::Frame;
use super::signature::Signature;
use crate::config::GuardOptions;
use crate::error::GuardError;
use crate::rules::{KeywordRules, ParameterRule, PositionalRules, ReturnRule, TypeRule};
use crate::value::Value;
use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, trace};

type LocalRules = Arc<[Arc<ParameterRule>]>;

struct Observer {
    code: CodeId,
    locals: LocalRules,
}

thread_local! {
    static OBSERVERS: RefCell<Vec<Observer>> = const { RefCell::new(Vec::new()) };
}

/// Keeps an observer installed for as long as it lives.
struct ObserverScope {
    _not_send: PhantomData<*const ()>,
}

impl ObserverScope {
    fn install(code: CodeId, locals: LocalRules) -> Self {
        OBSERVERS.with(|stack| stack.borrow_mut().push(Observer { code, locals }));
        Self { _not_send: PhantomData }
    }
}

impl Drop for ObserverScope {
    fn drop(&mut self) {
        let _ = OBSERVERS.try_with(|stack| stack.borrow_mut().pop());
    }
}

/// Number of strict calls in progress on this thread.
pub fn observer_depth() -> usize {
    OBSERVERS.with(|stack| stack.borrow().len())
}

/// Called by a code body as it returns. Validates its locals against the
/// innermost observer installed for the same code, if any.
pub(crate) fn notify_return(frame: &Frame) -> Result<(), GuardError> {
    let active = OBSERVERS.with(|stack| {
        stack
            .borrow()
            .iter()
            .rev()
            .find(|observer| observer.code == frame.code())
            .map(|observer| Arc::clone(&observer.locals))
    });
    let Some(locals) = active else {
        return Ok(());
    };
    trace!(code = ?frame.code(), rules = locals.len(), "validating locals at return");
    for rule in locals.iter() {
        if let Some(value) = frame.get(&rule.name) {
            rule.check(value)?;
        }
    }
    Ok(())
}

pub struct StrictGuardedCallable {
    inner: CallableRef,
    contract: Contract,
    code: Option<CodeId>,
    locals: LocalRules,
}

impl StrictGuardedCallable {
    /// Adds rules for locals that are not parameters. A rule for a name already
    /// covered replaces it.
    pub fn with_locals(mut self, rules: impl IntoIterator<Item = ParameterRule>) -> Self {
        let mut merged: Vec<Arc<ParameterRule>> = self.locals.iter().cloned().collect();
        for rule in rules {
            merged.retain(|existing| existing.name != rule.name);
            merged.push(Arc::new(rule));
        }
        merged.sort_by(|a, b| a.name.cmp(&b.name));
        self.locals = merged.into();
        self
    }

    pub fn inner(&self) -> &CallableRef {
        &self.inner
    }

    pub fn contract(&self) -> &Contract {
        &self.contract
    }

    /// Code identity captured at wrap time; `None` for opaque callables.
    pub fn code(&self) -> Option<CodeId> {
        self.code
    }

    pub fn local_rules(&self) -> &[Arc<ParameterRule>] {
        &self.locals
    }

    pub fn invoke(&self, args: CallArgs) -> Result<Value, GuardError> {
        let result = {
            let _observer = self.code.map(|code| ObserverScope::install(code, Arc::clone(&self.locals)));
            self.contract.check_args(&args)?;
            self.inner.call(args)?
        };
        self.contract.check_return(&result)?;
        Ok(result)
    }

    pub fn bind(self: &Arc<Self>, receiver: Value) -> BoundMethod {
        bind(Arc::clone(self) as CallableRef, receiver)
    }
}

impl Callable for StrictGuardedCallable {
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

impl fmt::Debug for StrictGuardedCallable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrictGuardedCallable")
            .field("name", &self.inner.name())
            .field("code", &self.code)
            .field("locals", &self.locals.iter().map(|r| r.name.as_str()).collect::<Vec<_>>())
            .finish()
    }
}

/// Wraps `inner` like [`make_guard`](super::make_guard), additionally checking
/// every keyword-named local of the body when it returns.
pub fn make_strict_guard(
    inner: CallableRef,
    positional: PositionalRules,
    keywords: KeywordRules,
    return_rule: Option<Arc<TypeRule>>,
    return_description: impl Into<String>,
    check_return: bool,
) -> StrictGuardedCallable {
    let ret = ReturnRule::new(return_rule, return_description, check_return);
    let code = inner.code_id();
    let mut locals: Vec<Arc<ParameterRule>> = keywords.values().cloned().collect();
    locals.sort_by(|a, b| a.name.cmp(&b.name));
    debug!(
        callable = inner.name(),
        locals = locals.len(),
        observable = code.is_some(),
        "strict guard installed"
    );
    StrictGuardedCallable {
        inner,
        contract: Contract::new(positional, keywords, ret),
        code,
        locals: locals.into(),
    }
}

/// Compiles `signature` (including its declared locals) into a strict guard.
pub fn strict_guard(inner: CallableRef, signature: &Signature, options: GuardOptions) -> StrictGuardedCallable {
    let compiled = signature.compile();
    make_strict_guard(
        inner,
        compiled.positional,
        compiled.keywords,
        compiled.returns,
        compiled.return_description,
        options.check_return,
    )
    .with_locals(compiled.locals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::{Function, NativeFn};
    use crate::shield::ownership;
    use crate::type_system::{builtins, ClassSpec, TypeRegistry};
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn int() -> TypeRule {
        TypeRule::instance_of(builtins::int_type())
    }

    fn str_() -> TypeRule {
        TypeRule::instance_of(builtins::str_type())
    }

    /// g(x: int): y binds to str(x) when x is negative, else to x.
    fn g() -> StrictGuardedCallable {
        let body = Function::new("g", &["x"], |frame| {
            let x = frame.arg("x")?.clone();
            let y = match x.as_int() {
                Some(n) if n < 0 => Value::str(n.to_string()),
                _ => x,
            };
            frame.set("y", y.clone());
            Ok(y)
        });
        strict_guard(Arc::new(body), &Signature::new().param("x", int()).local("y", int()), GuardOptions::default())
    }

    #[test]
    fn test_locals_checked_at_return() {
        let g = g();
        assert_eq!(g.call(CallArgs::new().arg(5)).unwrap(), Value::Int(5));
        let err = g.call(CallArgs::new().arg(-1)).unwrap_err();
        assert_eq!(err.to_string(), "Variable 'y' expected int, got str ('-1')");
        assert_eq!(observer_depth(), 0);
    }

    #[test]
    fn test_unbound_and_deleted_locals_are_skipped() {
        let body = Function::new("h", &["x"], |frame| {
            frame.set("tmp", "not an int");
            frame.remove("tmp");
            Ok(Value::None)
        });
        let h = strict_guard(
            Arc::new(body),
            &Signature::new().param("x", int()).local("tmp", int()).local("never", int()),
            GuardOptions::default(),
        );
        assert!(h.call(CallArgs::new().arg(1)).is_ok());
    }

    #[test]
    fn test_parameter_rebinding_is_caught() {
        let body = Function::new("rebind", &["x"], |frame| {
            frame.set("x", "now a string");
            Ok(Value::None)
        });
        let s = strict_guard(Arc::new(body), &Signature::new().param("x", int()), GuardOptions::default());
        let err = s.call(CallArgs::new().arg(1)).unwrap_err();
        assert_eq!(err.subject(), Some("x"));
    }

    #[test]
    fn test_body_error_skips_local_checks() {
        let body = Function::new("fails", &[], |frame| {
            frame.set("y", "bad");
            Err(GuardError::raised("body failed"))
        });
        let s = strict_guard(Arc::new(body), &Signature::new().local("y", int()), GuardOptions::default());
        assert_eq!(s.call(CallArgs::new()).unwrap_err(), GuardError::raised("body failed"));
        assert_eq!(observer_depth(), 0);
    }

    #[test]
    fn test_helper_frames_are_not_observed() {
        // The helper binds `y` to a str, but it is not the guarded code.
        let helper: CallableRef = Arc::new(Function::new("helper", &[], |frame| {
            frame.set("y", "helper");
            Ok(Value::None)
        }));
        let body = Function::new("outer", &[], move |frame| {
            helper.call(CallArgs::new())?;
            frame.set("y", 1);
            Ok(Value::None)
        });
        let s = strict_guard(Arc::new(body), &Signature::new().local("y", int()), GuardOptions::default());
        assert!(s.call(CallArgs::new()).is_ok());
    }

    #[test]
    fn test_nested_strict_calls_restore_outer_observer() {
        let inner = Arc::new(strict_guard(
            Arc::new(Function::new("inner", &[], |frame| {
                frame.set("s", "text");
                Ok(Value::None)
            })),
            &Signature::new().local("s", str_()),
            GuardOptions::default(),
        ));
        let inner_ref: CallableRef = inner;
        let outer = strict_guard(
            Arc::new(Function::new("outer", &[], move |frame| {
                inner_ref.call(CallArgs::new())?;
                assert_eq!(observer_depth(), 1);
                frame.set("n", "not an int");
                Ok(Value::None)
            })),
            &Signature::new().local("n", int()),
            GuardOptions::default(),
        );
        let err = outer.call(CallArgs::new()).unwrap_err();
        assert_eq!(err.subject(), Some("n"));
        assert_eq!(observer_depth(), 0);
    }

    #[test]
    fn test_unassigned_local_passed_as_keyword_is_not_checked() {
        let body = Function::new("g", &["x"], |_| Ok(Value::None));
        let s = strict_guard(Arc::new(body), &Signature::new().param("x", int()).local("y", int()), GuardOptions::default());
        let err = s.call(CallArgs::new().arg(1).kwarg("y", "oops")).unwrap_err();
        assert_eq!(err, GuardError::raised("unexpected keyword argument 'y'"));
        assert_eq!(observer_depth(), 0);
    }

    #[test]
    fn test_observer_removed_after_argument_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let body = Function::new("count", &["x"], move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Value::None)
        });
        let s = strict_guard(Arc::new(body), &Signature::new().param("x", int()), GuardOptions::default());
        assert!(s.code().is_some());
        let err = s.call(CallArgs::new().arg("bad")).unwrap_err();
        assert_eq!(err.subject(), Some("x"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(observer_depth(), 0);
    }

    #[test]
    fn test_observer_and_owner_removed_on_panic() {
        let mut reg = TypeRegistry::new();
        let class = reg.register(ClassSpec::new("Fuse")).unwrap();
        let obj = class.instantiate(CallArgs::new()).unwrap();

        let observed = Arc::new(AtomicUsize::new(0));
        let owners = Arc::new(AtomicUsize::new(0));
        let (seen_observers, seen_owners) = (Arc::clone(&observed), Arc::clone(&owners));
        let body = Function::new("explode", &["self"], move |_| {
            seen_observers.store(observer_depth(), Ordering::SeqCst);
            seen_owners.store(ownership::depth(), Ordering::SeqCst);
            panic!("body panicked");
        });
        let s = strict_guard(Arc::new(body), &Signature::new().untyped("self"), GuardOptions::default());

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| s.call(CallArgs::new().arg(obj.clone()))));
        assert!(outcome.is_err());
        assert_eq!(observed.load(Ordering::SeqCst), 1);
        assert_eq!(owners.load(Ordering::SeqCst), 1);
        assert_eq!(observer_depth(), 0);
        assert_eq!(ownership::depth(), 0);
    }

    #[test]
    fn test_outer_code_checked_while_inner_strict_call_runs() {
        // f(x, then) calls `then`; h calls the raw f with a bad `x`.
        let raw_f: CallableRef = Arc::new(Function::new("f", &["x", "then"], |frame| {
            if let Some(then) = frame.get("then").and_then(Value::as_callable).cloned() {
                then.call(CallArgs::new())?;
            }
            Ok(Value::None)
        }));
        let strict_f = strict_guard(
            Arc::clone(&raw_f),
            &Signature::new().param("x", int()).untyped("then"),
            GuardOptions::default(),
        );
        let inner_f = Arc::clone(&raw_f);
        let strict_h: CallableRef = Arc::new(strict_guard(
            Arc::new(Function::new("h", &[], move |_| inner_f.call(CallArgs::new().arg("bad")))),
            &Signature::new(),
            GuardOptions::default(),
        ));

        let err = strict_f.call(CallArgs::new().arg(1).arg(Value::Callable(strict_h))).unwrap_err();
        assert_eq!(err.subject(), Some("x"));
        assert_eq!(observer_depth(), 0);
    }

    #[test]
    fn test_opaque_callables_get_argument_checks_only() {
        let native: CallableRef = Arc::new(NativeFn::new("native", |_| Ok(Value::str("r"))));
        let s = strict_guard(native, &Signature::new().param("x", int()).local("y", int()), GuardOptions::default());
        assert_eq!(s.code(), None);
        assert!(s.call(CallArgs::new().arg(1)).is_ok());
        assert!(s.call(CallArgs::new().arg("1")).is_err());
    }

    #[test]
    fn test_with_locals_replaces_by_name() {
        let s = g().with_locals([ParameterRule::described("y", str_()), ParameterRule::described("z", int())]);
        let names: Vec<&str> = s.local_rules().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["x", "y", "z"]);
        assert!(s.call(CallArgs::new().arg(-3)).is_ok());
    }
}

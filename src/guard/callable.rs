//! The call protocol shared by plain callables, code bodies, bound methods and guards.
use crate::error::GuardError;
use crate::shield::ownership;
use crate::value::Value;
use smallvec::SmallVec;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identity of a code body. Two callables share a `CodeId` only if one wraps
/// (or binds) the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodeId(u64);

static NEXT_CODE_ID: AtomicU64 = AtomicU64::new(1);

impl CodeId {
    pub(crate) fn fresh() -> Self {
        CodeId(NEXT_CODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Anything that can be invoked with positional and keyword arguments.
///
/// Wrappers (guards, bound methods) implement this too and read metadata
/// through to what they wrap, so they substitute transparently for it.
pub trait Callable: Send + Sync {
    fn call(&self, args: CallArgs) -> Result<Value, GuardError>;

    fn name(&self) -> &str;

    fn doc(&self) -> Option<&str> {
        None
    }

    /// The code body executed by this callable, if it has one.
    fn code_id(&self) -> Option<CodeId> {
        None
    }

    /// Extra metadata attributes exposed by the callable.
    fn attr(&self, _name: &str) -> Option<Value> {
        None
    }
}

pub type CallableRef = Arc<dyn Callable>;

/// Arguments of a single call. Keywords keep call-site order.
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    pub positional: SmallVec<[Value; 4]>,
    pub keywords: SmallVec<[(String, Value); 2]>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn positional(items: impl IntoIterator<Item = Value>) -> Self {
        Self { positional: items.into_iter().collect(), keywords: SmallVec::new() }
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keywords.push((name.into(), value.into()));
        self
    }

    pub fn keyword(&self, name: &str) -> Option<&Value> {
        self.keywords.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub(crate) fn prepend(&mut self, receiver: Value) {
        self.positional.insert(0, receiver);
    }
}

type NativeBody = dyn Fn(CallArgs) -> Result<Value, GuardError> + Send + Sync;

/// An opaque native callable. It has no frame and no code identity, so strict
/// local checks never fire for it.
pub struct NativeFn {
    name: String,
    doc: Option<String>,
    f: Box<NativeBody>,
}

impl NativeFn {
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(CallArgs) -> Result<Value, GuardError> + Send + Sync + 'static,
    {
        Self { name: name.into(), doc: None, f: Box::new(f) }
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }
}

impl Callable for NativeFn {
    fn call(&self, args: CallArgs) -> Result<Value, GuardError> {
        (self.f)(args)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native {}>", self.name)
    }
}

/// A callable bound to a receiver, which is passed as the first positional argument.
pub struct BoundMethod {
    receiver: Value,
    func: CallableRef,
}

pub fn bind(func: CallableRef, receiver: Value) -> BoundMethod {
    BoundMethod { receiver, func }
}

impl BoundMethod {
    pub fn receiver(&self) -> &Value {
        &self.receiver
    }

    pub fn func(&self) -> &CallableRef {
        &self.func
    }
}

impl Callable for BoundMethod {
    fn call(&self, mut args: CallArgs) -> Result<Value, GuardError> {
        args.prepend(self.receiver.clone());
        // Code bodies establish ownership from their own `self` binding; opaque
        // natives get it for the duration of the method call instead.
        let _owner = match (&self.receiver, self.func.code_id()) {
            (Value::Object(obj), None) => Some(ownership::enter(obj.clone())),
            _ => None,
        };
        self.func.call(args)
    }

    fn name(&self) -> &str {
        self.func.name()
    }

    fn doc(&self) -> Option<&str> {
        self.func.doc()
    }

    fn code_id(&self) -> Option<CodeId> {
        self.func.code_id()
    }

    fn attr(&self, name: &str) -> Option<Value> {
        match name {
            "__self__" => Some(self.receiver.clone()),
            "__func__" => Some(Value::Callable(Arc::clone(&self.func))),
            other => self.func.attr(other),
        }
    }
}

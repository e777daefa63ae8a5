//! Code bodies with an explicit local frame.
//!
//! A [`Function`] is the only kind of callable whose locals are observable: it
//! binds its arguments into a [`Frame`], runs its body against that frame, and
//! reports the frame to the strict-guard observer when the body returns.
use super::callable::{CallArgs, Callable, CodeId};
use super::strict;
use crate::error::GuardError;
use crate::shield::ownership;
use crate::value::{ObjectRef, Value};
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// Conventional name of a method's receiver parameter.
pub const RECEIVER: &str = "self";

type Body = dyn Fn(&mut Frame) -> Result<Value, GuardError> + Send + Sync;

pub struct Function {
    name: String,
    doc: Option<String>,
    params: Vec<String>,
    code: CodeId,
    attrs: Vec<(String, Value)>,
    body: Box<Body>,
}

impl Function {
    pub fn new<F>(name: impl Into<String>, params: &[&str], body: F) -> Self
    where
        F: Fn(&mut Frame) -> Result<Value, GuardError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            doc: None,
            params: params.iter().map(|p| p.to_string()).collect(),
            code: CodeId::fresh(),
            attrs: Vec::new(),
            body: Box::new(body),
        }
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Attaches a custom metadata attribute, readable through any wrapper.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn code(&self) -> CodeId {
        self.code
    }
}

impl Callable for Function {
    fn call(&self, args: CallArgs) -> Result<Value, GuardError> {
        let mut frame = Frame::bind(self.code, &self.params, args)?;
        let _owner = match self.params.first().map(String::as_str) {
            Some(RECEIVER) => frame.receiver().cloned().map(ownership::enter),
            _ => None,
        };
        let result = (self.body)(&mut frame)?;
        strict::notify_return(&frame)?;
        Ok(result)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    fn code_id(&self) -> Option<CodeId> {
        Some(self.code)
    }

    fn attr(&self, name: &str) -> Option<Value> {
        self.attrs.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone())
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function {}({})>", self.name, self.params.join(", "))
    }
}

impl From<Function> for Arc<dyn Callable> {
    fn from(f: Function) -> Self {
        Arc::new(f)
    }
}

/// The local bindings of one executing call.
///
/// Parameters are bound first (positionally, then by keyword); assignments made
/// by the body follow in order. Surplus positional arguments are kept apart.
#[derive(Debug)]
pub struct Frame {
    code: CodeId,
    locals: Vec<(String, Value)>,
    extra: SmallVec<[Value; 2]>,
}

impl Frame {
    /// Keywords must name a declared parameter that is not already bound.
    fn bind(code: CodeId, params: &[String], args: CallArgs) -> Result<Self, GuardError> {
        let mut frame = Frame { code, locals: Vec::with_capacity(params.len()), extra: SmallVec::new() };
        let mut positional = args.positional.into_iter();
        for (param, value) in params.iter().zip(positional.by_ref()) {
            frame.locals.push((param.clone(), value));
        }
        frame.extra.extend(positional);
        for (name, value) in args.keywords {
            if !params.contains(&name) {
                return Err(GuardError::raised(format!("unexpected keyword argument '{}'", name)));
            }
            if frame.contains(&name) {
                return Err(GuardError::raised(format!("got multiple values for argument '{}'", name)));
            }
            frame.locals.push((name, value));
        }
        Ok(frame)
    }

    pub fn code(&self) -> CodeId {
        self.code
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.locals.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Reads a required argument, raising if the caller did not supply it.
    pub fn arg(&self, name: &str) -> Result<&Value, GuardError> {
        self.get(name)
            .ok_or_else(|| GuardError::raised(format!("missing required argument: '{}'", name)))
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.locals.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.locals.push((name, value)),
        }
    }

    /// Unbinds a local; it is then invisible to return-time checks.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let pos = self.locals.iter().position(|(k, _)| k == name)?;
        Some(self.locals.remove(pos).1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn locals(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.locals.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Positional arguments beyond the declared parameters.
    pub fn extra_args(&self) -> &[Value] {
        &self.extra
    }

    /// The object bound to the receiver parameter, if any.
    pub fn receiver(&self) -> Option<&ObjectRef> {
        self.get(RECEIVER).and_then(Value::as_object)
    }
}

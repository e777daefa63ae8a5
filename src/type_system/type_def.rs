//! Runtime type descriptors.
use crate::error::GuardError;
use crate::guard::{bind, CallArgs, Callable, CallableRef};
use crate::shield::AccessPolicy;
use crate::value::{ObjectRef, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Shared handle to an immutable type descriptor.
pub type TypeRef = Arc<TypeDef>;

/// Process-unique identity of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

static NEXT_TYPE_ID: AtomicU32 = AtomicU32::new(0);

impl TypeId {
    pub(crate) fn fresh() -> Self {
        TypeId(NEXT_TYPE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A runtime type: builtin or user class.
///
/// Everything here is fixed at registration time. In particular the shield
/// configuration (`policy`) is attached once, already merged with the
/// policies of every ancestor.
pub struct TypeDef {
    id: TypeId,
    name: String,
    builtin: bool,
    /// Ancestors in method resolution order, excluding the type itself.
    mro: Vec<TypeRef>,
    methods: HashMap<String, CallableRef>,
    policy: Option<Arc<AccessPolicy>>,
}

impl TypeDef {
    pub(crate) fn builtin(name: &str, mro: Vec<TypeRef>) -> Self {
        Self {
            id: TypeId::fresh(),
            name: name.to_string(),
            builtin: true,
            mro,
            methods: HashMap::new(),
            policy: None,
        }
    }

    pub(crate) fn class(
        name: String,
        mro: Vec<TypeRef>,
        methods: HashMap<String, CallableRef>,
        policy: Option<Arc<AccessPolicy>>,
    ) -> Self {
        Self { id: TypeId::fresh(), name, builtin: false, mro, methods, policy }
    }

    pub fn id(&self) -> TypeId { self.id }
    pub fn name(&self) -> &str { &self.name }
    pub fn is_builtin(&self) -> bool { self.builtin }
    pub fn mro(&self) -> &[TypeRef] { &self.mro }

    /// `true` when `self` is `other` or inherits from it.
    #[inline]
    pub fn is_subtype_of(&self, other: &TypeDef) -> bool {
        self.id == other.id || self.mro.iter().any(|t| t.id == other.id)
    }

    /// The merged write-validation policy, present when the class is shielded.
    pub fn policy(&self) -> Option<&AccessPolicy> {
        self.policy.as_deref()
    }

    pub fn is_shielded(&self) -> bool {
        self.policy.is_some()
    }

    /// Looks a method up on the type, then along its MRO.
    pub fn resolve_method(&self, name: &str) -> Option<&CallableRef> {
        self.methods
            .get(name)
            .or_else(|| self.mro.iter().find_map(|t| t.methods.get(name)))
    }

    /// Creates an instance and runs `__init__` bound to it, if the class has one.
    pub fn instantiate(self: &Arc<Self>, args: CallArgs) -> Result<ObjectRef, GuardError> {
        if self.builtin {
            return Err(GuardError::raised(format!(
                "cannot create '{}' instances through the registry",
                self.name
            )));
        }
        let obj = ObjectRef::new(Arc::clone(self));
        if let Some(init) = self.resolve_method("__init__") {
            bind(Arc::clone(init), Value::Object(obj.clone())).call(args)?;
        }
        Ok(obj)
    }
}

impl fmt::Debug for TypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<class '{}'>", self.name)
    }
}

impl PartialEq for TypeDef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeDef {}

//! The class registry: a petgraph inheritance graph plus a name index.
//!
//! Edges point from a class to each of its direct bases; the edge weight is the
//! base's position in the declaration, which fixes left-to-right resolution.
use super::builtins;
use super::error::RegistryError;
use super::type_def::{TypeDef, TypeRef};
use crate::guard::{guard, CallableRef, GuardOptions, Signature};
use crate::shield::AccessPolicy;
use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Declaration of a user class, consumed by [`TypeRegistry::register`].
#[derive(Default)]
pub struct ClassSpec {
    name: String,
    bases: Vec<String>,
    methods: Vec<(String, CallableRef)>,
    shield: Option<AccessPolicy>,
}

impl ClassSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    /// Adds a direct base. Without any, the class derives from `object`.
    pub fn base(mut self, name: impl Into<String>) -> Self {
        self.bases.push(name.into());
        self
    }

    pub fn method(mut self, name: impl Into<String>, f: CallableRef) -> Self {
        self.methods.push((name.into(), f));
        self
    }

    /// Declares `__init__` with a typed signature. The receiver is implicit:
    /// `signature` lists only the parameters after it.
    pub fn constructor(mut self, f: CallableRef, signature: &Signature) -> Self {
        let guarded = guard(f, &signature.with_receiver(), GuardOptions::default());
        self.methods.push(("__init__".to_string(), Arc::new(guarded)));
        self
    }

    /// Opts the class into the attribute shield with the given write rules.
    pub fn shielded(mut self, policy: AccessPolicy) -> Self {
        self.shield = Some(policy);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone)]
pub struct TypeRegistry {
    graph: DiGraph<TypeRef, u32>,
    index: HashMap<String, NodeIndex>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// A registry seeded with the builtin types.
    pub fn new() -> Self {
        let mut registry = Self { graph: DiGraph::new(), index: HashMap::new() };
        for t in builtins::all() {
            let node = registry.graph.add_node(Arc::clone(t));
            registry.index.insert(t.name().to_string(), node);
        }
        for t in builtins::all() {
            let child = registry.index[t.name()];
            // Builtin MROs are single chains; only direct bases become edges.
            if let Some(base) = t.mro().first() {
                let parent = registry.index[base.name()];
                registry.graph.add_edge(child, parent, 0);
            }
        }
        registry
    }

    pub fn get(&self, name: &str) -> Option<&TypeRef> {
        self.index.get(name).map(|&n| &self.graph[n])
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// `true` if `sub` names `base` or a class inheriting from it.
    pub fn is_subclass(&self, sub: &str, base: &str) -> bool {
        match (self.index.get(sub), self.index.get(base)) {
            (Some(&s), Some(&b)) => has_path_connecting(&self.graph, s, b, None),
            _ => false,
        }
    }

    /// Registers a class and returns its descriptor.
    ///
    /// The class's MRO and merged shield policy are computed here, once; the
    /// resulting [`TypeDef`] is immutable.
    pub fn register(&mut self, spec: ClassSpec) -> Result<TypeRef, RegistryError> {
        if self.index.contains_key(&spec.name) {
            return Err(RegistryError::DuplicateName(spec.name));
        }

        let base_names = if spec.bases.is_empty() {
            vec![builtins::object_type().name().to_string()]
        } else {
            spec.bases.clone()
        };

        let mut base_nodes = Vec::with_capacity(base_names.len());
        for base in &base_names {
            let node = *self.index.get(base).ok_or_else(|| RegistryError::UnknownBase {
                class: spec.name.clone(),
                base: base.clone(),
            })?;
            let base_def = &self.graph[node];
            if base_def.is_builtin() && base_def.id() != builtins::object_type().id() {
                return Err(RegistryError::SealedBase { class: spec.name.clone(), base: base.clone() });
            }
            if base_nodes.contains(&node) {
                return Err(RegistryError::DuplicateBase { class: spec.name.clone(), base: base.clone() });
            }
            base_nodes.push(node);
        }

        let mro: Vec<TypeRef> = self
            .linearize(&base_nodes)
            .into_iter()
            .map(|n| Arc::clone(&self.graph[n]))
            .collect();

        let policy = merge_policies(&mro, spec.shield).map(Arc::new);
        let shielded = policy.is_some();
        let methods: HashMap<String, CallableRef> = spec.methods.into_iter().collect();

        let def = Arc::new(TypeDef::class(spec.name.clone(), mro, methods, policy));
        let node = self.graph.add_node(Arc::clone(&def));
        for (position, &base) in base_nodes.iter().enumerate() {
            self.graph.add_edge(node, base, position as u32);
        }
        self.index.insert(spec.name, node);

        debug!(
            class = def.name(),
            mro = ?def.mro().iter().map(|t| t.name()).collect::<Vec<_>>(),
            shielded,
            "registered class"
        );
        Ok(def)
    }

    /// Depth-first, left-to-right walk over the bases, keeping only the last
    /// occurrence of each type. Diamonds therefore resolve shared ancestors
    /// after every class that derives from them, with `object` last.
    fn linearize(&self, bases: &[NodeIndex]) -> Vec<NodeIndex> {
        let mut walk = Vec::new();
        for &base in bases {
            self.walk(base, &mut walk);
        }
        let mut order = Vec::with_capacity(walk.len());
        for (i, node) in walk.iter().enumerate() {
            if !walk[i + 1..].contains(node) {
                order.push(*node);
            }
        }
        order
    }

    fn walk(&self, node: NodeIndex, out: &mut Vec<NodeIndex>) {
        out.push(node);
        let mut bases: Vec<(u32, NodeIndex)> =
            self.graph.edges(node).map(|e| (*e.weight(), e.target())).collect();
        bases.sort_unstable_by_key(|(position, _)| *position);
        for (_, base) in bases {
            self.walk(base, out);
        }
    }
}

/// Merges ancestor policies (furthest first) with the class's own declaration.
/// Returns `None` when neither the class nor any ancestor is shielded.
fn merge_policies(mro: &[TypeRef], own: Option<AccessPolicy>) -> Option<AccessPolicy> {
    let inherited: Vec<&AccessPolicy> = mro.iter().rev().filter_map(|t| t.policy()).collect();
    if own.is_none() && inherited.is_empty() {
        return None;
    }
    let mut merged = AccessPolicy::new();
    for parent in inherited {
        merged.extend_from(parent);
    }
    if let Some(own) = own {
        merged.extend_from(&own);
    }
    Some(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::TypeRule;

    fn names(t: &TypeRef) -> Vec<String> {
        t.mro().iter().map(|b| b.name().to_string()).collect()
    }

    #[test]
    fn test_builtins_are_seeded() {
        let reg = TypeRegistry::new();
        assert_eq!(reg.len(), 11);
        assert!(reg.is_subclass("bool", "int"));
        assert!(reg.is_subclass("str", "object"));
        assert!(!reg.is_subclass("int", "bool"));
        assert_eq!(reg.get("int").map(|t| t.id()), Some(builtins::int_type().id()));
    }

    #[test]
    fn test_diamond_mro_puts_shared_base_last() {
        // Shape: A <- B, A <- C, (B, C) <- D
        let mut reg = TypeRegistry::new();
        reg.register(ClassSpec::new("A")).unwrap();
        reg.register(ClassSpec::new("B").base("A")).unwrap();
        reg.register(ClassSpec::new("C").base("A")).unwrap();
        let d = reg.register(ClassSpec::new("D").base("B").base("C")).unwrap();

        assert_eq!(names(&d), vec!["B", "C", "A", "object"]);
        assert!(reg.is_subclass("D", "A"));
        assert!(!reg.is_subclass("B", "C"));
    }

    #[test]
    fn test_registration_errors() {
        let mut reg = TypeRegistry::new();
        reg.register(ClassSpec::new("A")).unwrap();

        let dup = reg.register(ClassSpec::new("A")).unwrap_err();
        assert_eq!(dup, RegistryError::DuplicateName("A".into()));

        let unknown = reg.register(ClassSpec::new("B").base("Missing")).unwrap_err();
        assert!(matches!(unknown, RegistryError::UnknownBase { ref base, .. } if base == "Missing"));

        let twice = reg.register(ClassSpec::new("C").base("A").base("A")).unwrap_err();
        assert!(matches!(twice, RegistryError::DuplicateBase { .. }));

        let sealed = reg.register(ClassSpec::new("MyInt").base("int")).unwrap_err();
        assert!(matches!(sealed, RegistryError::SealedBase { .. }));
    }

    #[test]
    fn test_policies_are_inherited_and_overridden() {
        let mut reg = TypeRegistry::new();
        let int = builtins::int_type();
        let str_ = builtins::str_type();
        reg.register(
            ClassSpec::new("Cat").shielded(
                AccessPolicy::new()
                    .field("name", TypeRule::InstanceOf(Arc::clone(str_)))
                    .field("age", TypeRule::InstanceOf(Arc::clone(int))),
            ),
        )
        .unwrap();
        let premium = reg
            .register(
                ClassSpec::new("PremiumCat")
                    .base("Cat")
                    .shielded(AccessPolicy::new().field("age", TypeRule::ExactType(Arc::clone(int)))),
            )
            .unwrap();
        let plain_child = reg.register(ClassSpec::new("Kitten").base("Cat")).unwrap();

        let policy = premium.policy().expect("shielded");
        assert!(policy.rule_for("name").is_some());
        assert!(matches!(&*policy.rule_for("age").unwrap().rule, TypeRule::ExactType(_)));
        // Subclasses of shielded classes are shielded even without their own declaration.
        assert!(plain_child.is_shielded());
        assert!(!reg.register(ClassSpec::new("Loose")).unwrap().is_shielded());
    }
}

//! Declared call signatures and their compilation into guard rules.
use crate::rules::{describe, KeywordRules, ParameterRule, PositionalRules, TypeRule};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    PositionalOnly,
    PositionalOrKeyword,
    KeywordOnly,
}

impl ParamKind {
    pub fn is_positional(self) -> bool {
        !matches!(self, ParamKind::KeywordOnly)
    }

    pub fn is_keyword(self) -> bool {
        !matches!(self, ParamKind::PositionalOnly)
    }
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
    pub annotation: Option<TypeRule>,
}

/// Parameters in declaration order, an optional return annotation and
/// optional annotations for non-parameter locals.
#[derive(Debug, Clone, Default)]
pub struct Signature {
    params: Vec<Param>,
    returns: Option<TypeRule>,
    locals: Vec<(String, TypeRule)>,
}

/// Rules produced by [`Signature::compile`].
#[derive(Debug, Clone, Default)]
pub struct CompiledSignature {
    pub positional: PositionalRules,
    pub keywords: KeywordRules,
    pub returns: Option<Arc<TypeRule>>,
    pub return_description: String,
    pub locals: Vec<ParameterRule>,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, name: impl Into<String>, kind: ParamKind, annotation: Option<TypeRule>) -> Self {
        self.params.push(Param { name: name.into(), kind, annotation });
        self
    }

    pub fn param(self, name: impl Into<String>, rule: TypeRule) -> Self {
        self.push(name, ParamKind::PositionalOrKeyword, Some(rule))
    }

    /// A parameter without an annotation. It occupies a position but is never checked.
    pub fn untyped(self, name: impl Into<String>) -> Self {
        self.push(name, ParamKind::PositionalOrKeyword, None)
    }

    pub fn positional_only(self, name: impl Into<String>, rule: TypeRule) -> Self {
        self.push(name, ParamKind::PositionalOnly, Some(rule))
    }

    pub fn keyword_only(self, name: impl Into<String>, rule: TypeRule) -> Self {
        self.push(name, ParamKind::KeywordOnly, Some(rule))
    }

    pub fn returns(mut self, rule: TypeRule) -> Self {
        self.returns = Some(rule);
        self
    }

    /// Annotates a local that is not a parameter; strict guards check it at return.
    pub fn local(mut self, name: impl Into<String>, rule: TypeRule) -> Self {
        self.locals.push((name.into(), rule));
        self
    }

    /// The same signature with an untyped receiver parameter in front.
    pub fn with_receiver(&self) -> Signature {
        let mut params = Vec::with_capacity(self.params.len() + 1);
        params.push(Param { name: "self".to_string(), kind: ParamKind::PositionalOrKeyword, annotation: None });
        params.extend(self.params.iter().cloned());
        Signature { params, returns: self.returns.clone(), locals: self.locals.clone() }
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Builds positional slots, keyword rules, the return rule and local rules.
    ///
    /// Every positional parameter gets a slot, annotated or not, so later
    /// parameters keep their call positions. A top-level primitive annotation
    /// is compiled to an exact-type rule; the expected text keeps the written form.
    pub fn compile(&self) -> CompiledSignature {
        let mut out = CompiledSignature::default();
        let mut keywords: HashMap<String, Arc<ParameterRule>> = HashMap::new();
        for param in &self.params {
            let rule = param.annotation.as_ref().map(|annotation| Arc::new(compile_rule(&param.name, annotation)));
            if param.kind.is_positional() {
                out.positional.push(rule.clone());
            }
            if let (Some(rule), true) = (rule, param.kind.is_keyword()) {
                keywords.insert(param.name.clone(), rule);
            }
        }
        out.keywords = keywords;
        if let Some(returns) = &self.returns {
            out.return_description = describe(returns);
            out.returns = Some(Arc::new(returns.clone().promote_primitive()));
        }
        out.locals = self.locals.iter().map(|(name, rule)| compile_rule(name, rule)).collect();
        out
    }
}

fn compile_rule(name: &str, annotation: &TypeRule) -> ParameterRule {
    ParameterRule::new(name, describe(annotation), annotation.clone().promote_primitive())
}

//! The compiled argument and return contract shared by both guard kinds.
use super::callable::CallArgs;
use crate::error::GuardError;
use crate::rules::{KeywordRules, PositionalRules, ReturnRule};
use crate::value::Value;

/// Per-call checks, built once at wrap time and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct Contract {
    positional: PositionalRules,
    keywords: KeywordRules,
    ret: ReturnRule,
}

impl Contract {
    pub fn new(positional: PositionalRules, keywords: KeywordRules, ret: ReturnRule) -> Self {
        Self { positional, keywords, ret }
    }

    /// Validates positional arguments against their slots, then keyword
    /// arguments against their named rules. Extra positionals and unknown
    /// keywords pass through unchecked.
    pub fn check_args(&self, args: &CallArgs) -> Result<(), GuardError> {
        for (value, slot) in args.positional.iter().zip(&self.positional) {
            if let Some(rule) = slot {
                rule.check(value)?;
            }
        }
        for (name, value) in &args.keywords {
            if let Some(rule) = self.keywords.get(name) {
                rule.check(value)?;
            }
        }
        Ok(())
    }

    pub fn check_return(&self, result: &Value) -> Result<(), GuardError> {
        self.ret.validate(result)
    }

    pub fn positional(&self) -> &PositionalRules {
        &self.positional
    }

    pub fn keywords(&self) -> &KeywordRules {
        &self.keywords
    }

    pub fn return_rule(&self) -> &ReturnRule {
        &self.ret
    }

    /// `true` when no call would ever be rejected.
    pub fn is_transparent(&self) -> bool {
        self.positional.iter().all(Option::is_none) && self.keywords.is_empty() && !self.ret.is_active()
    }
}

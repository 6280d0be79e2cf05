// Mon Feb 16 2026 - Alex

use crate::callback::traits::{CallbackResult, ScanCallback, ScanCallbackMatch};
use crate::callback::ScanContext;
use crate::rules::{MatchRule, Rule};

/// Collects every matching rule. The default callback of [`crate::Scanner`].
#[derive(Debug, Clone, Default)]
pub struct MatchRules(pub Vec<MatchRule>);

impl MatchRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MatchRule> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Vec<MatchRule> {
        self.0
    }
}

impl ScanCallback for MatchRules {
    fn as_rule_matching(&mut self) -> Option<&mut dyn ScanCallbackMatch> {
        Some(self)
    }
}

impl ScanCallbackMatch for MatchRules {
    fn rule_matching(&mut self, ctx: &ScanContext<'_>, rule: &Rule<'_>) -> CallbackResult {
        self.0.push(rule.to_match_rule(ctx));
        Ok(false)
    }
}

// Mon Feb 16 2026 - Alex

use crate::callback::ScanContext;
use crate::native::abi::string_matches;
use crate::native::rules::{MetaValue as NativeMetaValue, YrRule, YrRules, YrString};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Integer(i64),
    String(String),
    Boolean(bool),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    pub identifier: String,
    pub value: MetaValue,
}

/// One string hit, copied out of the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchString {
    pub name: String,
    pub base: u64,
    pub offset: u64,
    pub data: Vec<u8>,
    pub xor_key: u8,
}

/// A matching rule with everything needed after the scan returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRule {
    pub rule: String,
    pub namespace: String,
    pub tags: Vec<String>,
    pub metas: Vec<Meta>,
    pub strings: Vec<MatchString>,
}

impl fmt::Display for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.rule)?;
        if !self.tags.is_empty() {
            write!(f, " [{}]", self.tags.iter().join(","))?;
        }
        if !self.strings.is_empty() {
            let hits = self.strings.iter().map(|s| format!("{}@{:#x}", s.name, s.offset)).join(" ");
            write!(f, " {}", hits)?;
        }
        Ok(())
    }
}

/// Borrowed view of a compiled rule.
#[derive(Clone, Copy)]
pub struct Rule<'r> {
    rules: &'r YrRules,
    rule: &'r YrRule,
}

impl<'r> Rule<'r> {
    pub(crate) fn new(rules: &'r YrRules, rule: &'r YrRule) -> Self {
        Self { rules, rule }
    }

    pub fn identifier(&self) -> &'r str {
        self.rule.identifier_str()
    }

    pub fn namespace(&self) -> &'r str {
        self.rules.namespace_of(self.rule)
    }

    pub fn tags(&self) -> Vec<String> {
        self.rule.tags.iter().map(|t| t.to_string_lossy().into_owned()).collect()
    }

    pub fn metas(&self) -> Vec<Meta> {
        self.rule
            .metas
            .iter()
            .map(|m| Meta {
                identifier: m.identifier.to_string_lossy().into_owned(),
                value: match &m.value {
                    NativeMetaValue::Integer(i) => MetaValue::Integer(*i),
                    NativeMetaValue::String(s) => MetaValue::String(s.to_string_lossy().into_owned()),
                    NativeMetaValue::Boolean(b) => MetaValue::Boolean(*b),
                },
            })
            .collect()
    }

    pub fn is_private(&self) -> bool {
        self.rule.is_private()
    }

    pub fn is_global(&self) -> bool {
        self.rule.is_global()
    }

    pub fn strings(&self) -> Vec<RuleString<'r>> {
        self.rules.strings_of(self.rule).map(|string| RuleString { string }).collect()
    }

    /// Every hit of this rule's strings in the scan behind `ctx`.
    pub fn match_strings(&self, ctx: &ScanContext<'_>) -> Vec<MatchString> {
        self.strings().iter().flat_map(|s| s.matches(ctx)).collect()
    }

    pub fn to_match_rule(&self, ctx: &ScanContext<'_>) -> MatchRule {
        MatchRule {
            rule: self.identifier().to_string(),
            namespace: self.namespace().to_string(),
            tags: self.tags(),
            metas: self.metas(),
            strings: self.match_strings(ctx),
        }
    }
}

impl std::fmt::Debug for Rule<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("identifier", &self.identifier())
            .field("namespace", &self.namespace())
            .finish()
    }
}

#[derive(Clone, Copy)]
pub struct RuleString<'r> {
    string: &'r YrString,
}

impl<'r> RuleString<'r> {
    pub fn identifier(&self) -> &'r str {
        self.string.identifier_str()
    }

    pub fn is_private(&self) -> bool {
        self.string.is_private()
    }

    pub fn matches(&self, ctx: &ScanContext<'_>) -> Vec<MatchString> {
        let found = unsafe { string_matches(ctx.as_ptr(), self.string) };
        found
            .iter()
            .map(|m| MatchString {
                name: self.identifier().to_string(),
                base: m.base as u64,
                offset: m.offset as u64,
                data: m.data.clone(),
                xor_key: m.xor_key,
            })
            .collect()
    }
}

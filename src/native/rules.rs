// Mon Feb 16 2026 - Alex

use crate::native::abi::{META_TYPE_BOOLEAN, META_TYPE_INTEGER, META_TYPE_STRING, RULE_FLAGS_GLOBAL, RULE_FLAGS_PRIVATE};
use crate::native::condition::Expr;
use crate::native::strings::{StringModifiers, StringPattern};
use libc::c_int;
use serde::{Deserialize, Serialize};
use std::ffi::CString;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YrNamespace {
    pub name: CString,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetaValue {
    Integer(i64),
    String(CString),
    Boolean(bool),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YrMeta {
    pub identifier: CString,
    pub value: MetaValue,
}

impl YrMeta {
    pub fn kind(&self) -> c_int {
        match self.value {
            MetaValue::Integer(_) => META_TYPE_INTEGER,
            MetaValue::String(_) => META_TYPE_STRING,
            MetaValue::Boolean(_) => META_TYPE_BOOLEAN,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YrString {
    pub identifier: CString,
    pub idx: u32,
    pub rule_idx: u32,
    pub pattern: StringPattern,
    pub modifiers: StringModifiers,
}

impl YrString {
    pub fn identifier_str(&self) -> &str {
        self.identifier.to_str().unwrap_or("$")
    }

    pub fn is_private(&self) -> bool {
        self.modifiers.private
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YrRule {
    pub identifier: CString,
    pub ns_idx: u32,
    pub flags: u32,
    pub tags: Vec<CString>,
    pub metas: Vec<YrMeta>,
    pub strings: Vec<u32>,
    pub condition: Expr,
}

impl YrRule {
    pub fn is_private(&self) -> bool {
        self.flags & RULE_FLAGS_PRIVATE != 0
    }

    pub fn is_global(&self) -> bool {
        self.flags & RULE_FLAGS_GLOBAL != 0
    }

    pub fn identifier_str(&self) -> &str {
        self.identifier.to_str().unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExternalValue {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(CString),
}

impl ExternalValue {
    pub fn same_kind(&self, other: &ExternalValue) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YrExternal {
    pub identifier: CString,
    pub value: ExternalValue,
}

/// One hit of a string, relative to the block it was found in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YrMatch {
    pub base: i64,
    pub offset: i64,
    pub match_length: usize,
    pub data: Vec<u8>,
    pub xor_key: u8,
}

impl YrMatch {
    pub fn absolute(&self) -> i64 {
        self.base + self.offset
    }
}

/// Compiled ruleset. Immutable once handed out by the compiler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct YrRules {
    pub namespaces: Vec<YrNamespace>,
    pub rules: Vec<YrRule>,
    pub strings: Vec<YrString>,
    pub externals: Vec<YrExternal>,
    pub imports: Vec<CString>,
}

impl YrRules {
    pub fn namespace_of(&self, rule: &YrRule) -> &str {
        self.namespaces
            .get(rule.ns_idx as usize)
            .and_then(|ns| ns.name.to_str().ok())
            .unwrap_or("default")
    }

    pub fn strings_of<'a>(&'a self, rule: &'a YrRule) -> impl Iterator<Item = &'a YrString> + 'a {
        rule.strings.iter().filter_map(move |&idx| self.strings.get(idx as usize))
    }

    pub fn external_index(&self, name: &str) -> Option<usize> {
        self.externals.iter().position(|e| e.identifier.as_bytes() == name.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::pattern::Pattern;

    fn sample() -> YrRules {
        YrRules {
            namespaces: vec![YrNamespace { name: CString::new("default").unwrap() }],
            rules: vec![YrRule {
                identifier: CString::new("r").unwrap(),
                ns_idx: 0,
                flags: RULE_FLAGS_GLOBAL,
                tags: vec![],
                metas: vec![YrMeta { identifier: CString::new("n").unwrap(), value: MetaValue::Integer(1) }],
                strings: vec![0],
                condition: Expr::Bool(true),
            }],
            strings: vec![YrString {
                identifier: CString::new("$a").unwrap(),
                idx: 0,
                rule_idx: 0,
                pattern: StringPattern::Literal(Pattern::from_bytes(b"abc")),
                modifiers: StringModifiers::default(),
            }],
            externals: vec![],
            imports: vec![],
        }
    }

    #[test]
    fn test_rule_lookups() {
        let rules = sample();
        let rule = &rules.rules[0];
        assert!(rule.is_global());
        assert!(!rule.is_private());
        assert_eq!(rules.namespace_of(rule), "default");
        assert_eq!(rules.strings_of(rule).count(), 1);
        assert_eq!(rule.metas[0].kind(), META_TYPE_INTEGER);
    }

    #[test]
    fn test_serde_roundtrip_keeps_strings() {
        let rules = sample();
        let json = serde_json::to_vec(&rules).unwrap();
        let back: YrRules = serde_json::from_slice(&json).unwrap();
        assert_eq!(back.strings[0].identifier_str(), "$a");
        assert_eq!(back.rules[0].identifier_str(), "r");
    }
}

// Mon Feb 16 2026 - Alex

use crate::native::pattern::Pattern;
use once_cell::sync::OnceCell;
use regex::bytes::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// String modifiers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StringModifiers {
    pub nocase: bool,
    pub wide: bool,
    pub ascii: bool,
    pub fullword: bool,
    pub private: bool,
    pub xor: Option<(u8, u8)>,
}

impl StringModifiers {
    pub fn to_yara(&self) -> String {
        let mut mods = Vec::new();
        if self.nocase { mods.push("nocase".to_string()); }
        if self.wide { mods.push("wide".to_string()); }
        if self.ascii { mods.push("ascii".to_string()); }
        if self.fullword { mods.push("fullword".to_string()); }
        if self.private { mods.push("private".to_string()); }
        match self.xor {
            Some((0, 255)) => mods.push("xor".to_string()),
            Some((lo, hi)) if lo == hi => mods.push(format!("xor({})", lo)),
            Some((lo, hi)) => mods.push(format!("xor({}-{})", lo, hi)),
            None => {}
        }
        mods.join(" ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegexPattern {
    source: String,
    nocase: bool,
    dotall: bool,
    #[serde(skip)]
    compiled: OnceCell<Regex>,
}

impl RegexPattern {
    pub fn new(source: &str, nocase: bool, dotall: bool) -> Result<Self, String> {
        let pattern = Self {
            source: source.to_string(),
            nocase,
            dotall,
            compiled: OnceCell::new(),
        };
        pattern.regex()?;
        Ok(pattern)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn case_insensitive(&self) -> Result<Self, String> {
        Self::new(&self.source, true, self.dotall)
    }

    fn regex(&self) -> Result<&Regex, String> {
        self.compiled.get_or_try_init(|| {
            RegexBuilder::new(&self.source)
                .unicode(false)
                .case_insensitive(self.nocase)
                .dot_matches_new_line(self.dotall)
                .build()
                .map_err(|e| e.to_string())
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StringPattern {
    Literal(Pattern),
    Regex(RegexPattern),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawMatch {
    pub offset: usize,
    pub length: usize,
    pub xor_key: u8,
}

impl StringPattern {
    /// Searches `data` for every occurrence allowed by `modifiers`, stopping
    /// once `limit` hits have been collected.
    pub fn find_matches(&self, data: &[u8], modifiers: &StringModifiers, limit: usize) -> Vec<RawMatch> {
        let mut results = Vec::new();

        match self {
            StringPattern::Literal(pattern) => {
                let mut encodings = Vec::with_capacity(2);
                if modifiers.ascii || !modifiers.wide {
                    encodings.push((pattern.clone(), false));
                }
                if modifiers.wide {
                    encodings.push((pattern.widen(), true));
                }
                let (lo, hi) = modifiers.xor.unwrap_or((0, 0));

                'outer: for (encoded, wide) in &encodings {
                    for key in lo..=hi {
                        let candidate = if key == 0 { encoded.clone() } else { encoded.xor(key) };
                        for offset in candidate.find_all_in(data, modifiers.nocase) {
                            if modifiers.fullword && !is_fullword(data, offset, candidate.len(), *wide) {
                                continue;
                            }
                            results.push(RawMatch {
                                offset,
                                length: candidate.len(),
                                xor_key: key,
                            });
                            if results.len() >= limit {
                                break 'outer;
                            }
                        }
                    }
                }
                results.sort_by_key(|m| m.offset);
            }
            StringPattern::Regex(pattern) => {
                let regex = match pattern.regex() {
                    Ok(regex) => regex,
                    Err(_) => return results,
                };
                for m in regex.find_iter(data) {
                    if m.start() == m.end() {
                        continue;
                    }
                    if modifiers.fullword && !is_fullword(data, m.start(), m.end() - m.start(), false) {
                        continue;
                    }
                    results.push(RawMatch {
                        offset: m.start(),
                        length: m.end() - m.start(),
                        xor_key: 0,
                    });
                    if results.len() >= limit {
                        break;
                    }
                }
            }
        }

        results
    }

    pub fn fixed_byte_count(&self) -> Option<usize> {
        match self {
            StringPattern::Literal(pattern) => Some(pattern.fixed_byte_count()),
            StringPattern::Regex(_) => None,
        }
    }
}

fn is_fullword(data: &[u8], offset: usize, len: usize, wide: bool) -> bool {
    let is_word = |b: u8| b.is_ascii_alphanumeric();
    let end = offset + len;

    if wide {
        if offset >= 2 && is_word(data[offset - 2]) && data[offset - 1] == 0 {
            return false;
        }
        if let (Some(&b), Some(&z)) = (data.get(end), data.get(end + 1)) {
            if is_word(b) && z == 0 {
                return false;
            }
        }
        return true;
    }

    if offset >= 1 && is_word(data[offset - 1]) {
        return false;
    }
    if let Some(&b) = data.get(end) {
        if is_word(b) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literal(s: &[u8]) -> StringPattern {
        StringPattern::Literal(Pattern::from_bytes(s))
    }

    #[test]
    fn test_fullword() {
        let modifiers = StringModifiers { fullword: true, ..Default::default() };
        let hits = literal(b"abc").find_matches(b" abc abcd xabc", &modifiers, usize::MAX);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].offset, 1);
    }

    #[test]
    fn test_xor_key_reported() {
        let modifiers = StringModifiers { xor: Some((0, 255)), ..Default::default() };
        let hits = literal(&[0x00, 0x01, 0x02, 0x03]).find_matches(&[0x10, 0x11, 0x12, 0x13], &modifiers, usize::MAX);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].xor_key, 0x10);
    }

    #[test]
    fn test_wide_and_ascii() {
        let modifiers = StringModifiers { wide: true, ascii: true, ..Default::default() };
        let hits = literal(b"ab").find_matches(b"ab..a\0b\0", &modifiers, usize::MAX);
        assert_eq!(hits.iter().map(|m| m.offset).collect::<Vec<_>>(), vec![0, 4]);
        assert_eq!(hits[1].length, 4);
    }

    #[test]
    fn test_regex_and_limit() {
        let pattern = StringPattern::Regex(RegexPattern::new("a.c", false, false).unwrap());
        let hits = pattern.find_matches(b"abc axc", &StringModifiers::default(), 1);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].length, 3);
    }

    #[test]
    fn test_invalid_regex() {
        assert!(RegexPattern::new("a(", false, false).is_err());
    }
}

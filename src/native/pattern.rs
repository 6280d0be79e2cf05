// Mon Feb 16 2026 - Alex

use serde::{Deserialize, Serialize};
use std::fmt;

/// Byte pattern with a per-byte bit mask. `0xFF` is a fixed byte, `0x00`
/// a full wildcard, `0xF0`/`0x0F` a nibble wildcard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    bytes: Vec<u8>,
    mask: Vec<u8>,
}

impl Pattern {
    pub fn new(bytes: Vec<u8>, mask: Vec<u8>) -> Self {
        assert_eq!(bytes.len(), mask.len(), "Pattern bytes and mask must have same length");
        let bytes = bytes.iter().zip(mask.iter()).map(|(b, m)| b & m).collect();
        Self { bytes, mask }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
            mask: vec![0xFF; bytes.len()],
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mask(&self) -> &[u8] {
        &self.mask
    }

    pub fn fixed_byte_count(&self) -> usize {
        self.mask.iter().filter(|&&m| m == 0xFF).count()
    }

    pub fn matches(&self, data: &[u8], nocase: bool) -> bool {
        if data.len() < self.bytes.len() {
            return false;
        }

        self.bytes.iter()
            .zip(self.mask.iter())
            .zip(data.iter())
            .all(|((&pattern_byte, &mask), &data_byte)| {
                if nocase && mask == 0xFF {
                    pattern_byte.eq_ignore_ascii_case(&data_byte)
                } else {
                    data_byte & mask == pattern_byte
                }
            })
    }

    /// Every offset at which the pattern matches, overlapping hits included.
    pub fn find_all_in(&self, data: &[u8], nocase: bool) -> Vec<usize> {
        let mut results = Vec::new();

        if self.bytes.is_empty() || data.len() < self.bytes.len() {
            return results;
        }

        let anchor = self.mask.iter().position(|&m| m == 0xFF);

        for i in 0..=(data.len() - self.bytes.len()) {
            if let Some(a) = anchor {
                let d = data[i + a];
                let p = self.bytes[a];
                let hit = if nocase { d.eq_ignore_ascii_case(&p) } else { d == p };
                if !hit {
                    continue;
                }
            }
            if self.matches(&data[i..], nocase) {
                results.push(i);
            }
        }

        results
    }

    pub fn xor(&self, key: u8) -> Self {
        Self {
            bytes: self.bytes.iter().map(|b| b ^ key).collect(),
            mask: self.mask.clone(),
        }
    }

    /// UTF-16LE expansion used by the `wide` modifier.
    pub fn widen(&self) -> Self {
        let mut bytes = Vec::with_capacity(self.bytes.len() * 2);
        let mut mask = Vec::with_capacity(self.mask.len() * 2);
        for (&b, &m) in self.bytes.iter().zip(self.mask.iter()) {
            bytes.push(b);
            bytes.push(0);
            mask.push(m);
            mask.push(0xFF);
        }
        Self { bytes, mask }
    }

    pub fn to_hex_string(&self) -> String {
        self.bytes.iter()
            .zip(self.mask.iter())
            .map(|(b, &m)| match m {
                0xFF => format!("{:02X}", b),
                0xF0 => format!("{:X}?", b >> 4),
                0x0F => format!("?{:X}", b & 0x0F),
                _ => "??".to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex_string())
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes && self.mask == other.mask
    }
}

impl Eq for Pattern {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_all_overlapping() {
        let pattern = Pattern::from_bytes(b"aa");
        assert_eq!(pattern.find_all_in(b"aaaa", false), vec![0, 1, 2]);
    }

    #[test]
    fn test_nibble_mask() {
        let pattern = Pattern::new(vec![0x40, 0x5A], vec![0xF0, 0xFF]);
        assert!(pattern.matches(&[0x4D, 0x5A], false));
        assert!(!pattern.matches(&[0x3D, 0x5A], false));
        assert_eq!(pattern.to_hex_string(), "4? 5A");
    }

    #[test]
    fn test_nocase() {
        let pattern = Pattern::from_bytes(b"AbC");
        assert_eq!(pattern.find_all_in(b"xabcx", true), vec![1]);
        assert!(pattern.find_all_in(b"xabcx", false).is_empty());
    }

    #[test]
    fn test_widen_and_xor() {
        let pattern = Pattern::from_bytes(b"ab").widen();
        assert_eq!(pattern.bytes(), b"a\0b\0");
        let xored = Pattern::from_bytes(&[0x00, 0x01]).xor(0x10);
        assert_eq!(xored.bytes(), &[0x10, 0x11]);
    }
}

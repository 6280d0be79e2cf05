// Mon Feb 16 2026 - Alex

use crate::native::pattern::Pattern;

#[derive(Debug, Clone, PartialEq)]
pub enum HexToken {
    Byte(u8, u8),
    Jump(Option<u32>, Option<u32>),
    Alternatives(Vec<Vec<HexToken>>),
}

/// Parsed `{ .. }` string. Plain byte/wildcard sequences become a masked
/// [`Pattern`]; jumps and alternatives are lowered to a byte regex.
#[derive(Debug, Clone)]
pub enum HexString {
    Pattern(Pattern),
    Regex(String),
}

pub fn parse_hex_string(source: &str) -> Result<HexString, String> {
    let cleaned: Vec<char> = source.chars().filter(|c| !c.is_whitespace()).collect();
    let mut pos = 0;
    let tokens = parse_sequence(&cleaned, &mut pos, 0)?;
    if pos != cleaned.len() {
        return Err(format!("unexpected '{}' in hex string", cleaned[pos]));
    }
    if tokens.is_empty() {
        return Err("empty hex string".to_string());
    }
    if matches!(tokens.first(), Some(HexToken::Jump(..))) || matches!(tokens.last(), Some(HexToken::Jump(..))) {
        return Err("jumps are not allowed at the start or end of a hex string".to_string());
    }

    let plain = tokens.iter().all(|t| matches!(t, HexToken::Byte(..)));
    if plain {
        let mut bytes = Vec::with_capacity(tokens.len());
        let mut mask = Vec::with_capacity(tokens.len());
        for token in &tokens {
            if let HexToken::Byte(b, m) = token {
                bytes.push(*b);
                mask.push(*m);
            }
        }
        return Ok(HexString::Pattern(Pattern::new(bytes, mask)));
    }

    let mut regex = String::from("(?s-u)");
    write_regex(&tokens, &mut regex);
    Ok(HexString::Regex(regex))
}

fn parse_sequence(chars: &[char], pos: &mut usize, depth: usize) -> Result<Vec<HexToken>, String> {
    let mut tokens = Vec::new();

    while *pos < chars.len() {
        let c = chars[*pos];
        match c {
            '|' | ')' => {
                if depth == 0 {
                    return Err(format!("unexpected '{}' in hex string", c));
                }
                break;
            }
            '(' => {
                *pos += 1;
                let mut alternatives = Vec::new();
                loop {
                    let alt = parse_sequence(chars, pos, depth + 1)?;
                    if alt.is_empty() {
                        return Err("empty alternative in hex string".to_string());
                    }
                    alternatives.push(alt);
                    match chars.get(*pos) {
                        Some('|') => *pos += 1,
                        Some(')') => {
                            *pos += 1;
                            break;
                        }
                        _ => return Err("unterminated alternative in hex string".to_string()),
                    }
                }
                tokens.push(HexToken::Alternatives(alternatives));
            }
            '[' => {
                let end = chars[*pos..]
                    .iter()
                    .position(|&rc| rc == ']')
                    .ok_or_else(|| "unterminated jump in hex string".to_string())?;
                let range: String = chars[*pos + 1..*pos + end].iter().collect();
                *pos += end + 1;
                tokens.push(parse_jump(&range)?);
            }
            _ => {
                let hi = c;
                let lo = *chars
                    .get(*pos + 1)
                    .ok_or_else(|| "odd number of digits in hex string".to_string())?;
                *pos += 2;
                let (b_hi, m_hi) = nibble(hi)?;
                let (b_lo, m_lo) = nibble(lo)?;
                tokens.push(HexToken::Byte((b_hi << 4) | b_lo, (m_hi << 4) | m_lo));
            }
        }
    }

    Ok(tokens)
}

fn nibble(c: char) -> Result<(u8, u8), String> {
    if c == '?' {
        return Ok((0, 0));
    }
    c.to_digit(16)
        .map(|d| (d as u8, 0x0F))
        .ok_or_else(|| format!("invalid character '{}' in hex string", c))
}

fn parse_jump(range: &str) -> Result<HexToken, String> {
    let parse = |s: &str| -> Result<Option<u32>, String> {
        if s.is_empty() {
            Ok(None)
        } else {
            s.parse::<u32>().map(Some).map_err(|_| format!("invalid jump '[{}]'", range))
        }
    };

    match range.split_once('-') {
        Some((lo, hi)) => {
            let lo = parse(lo)?;
            let hi = parse(hi)?;
            if let (Some(l), Some(h)) = (lo, hi) {
                if l > h {
                    return Err(format!("invalid jump '[{}]'", range));
                }
            }
            Ok(HexToken::Jump(lo, hi))
        }
        None => {
            let n = parse(range)?;
            if n.is_none() {
                return Err("empty jump in hex string".to_string());
            }
            Ok(HexToken::Jump(n, n))
        }
    }
}

fn write_regex(tokens: &[HexToken], out: &mut String) {
    for token in tokens {
        match token {
            HexToken::Byte(b, 0xFF) => out.push_str(&format!("\\x{:02X}", b)),
            HexToken::Byte(_, 0x00) => out.push('.'),
            HexToken::Byte(b, 0xF0) => {
                let base = b & 0xF0;
                out.push_str(&format!("[\\x{:02X}-\\x{:02X}]", base, base | 0x0F));
            }
            HexToken::Byte(b, _) => {
                let low = b & 0x0F;
                out.push('[');
                for hi in 0..16u8 {
                    out.push_str(&format!("\\x{:02X}", (hi << 4) | low));
                }
                out.push(']');
            }
            HexToken::Jump(lo, hi) => {
                let lo = lo.unwrap_or(0);
                match hi {
                    Some(hi) => out.push_str(&format!(".{{{},{}}}", lo, hi)),
                    None => out.push_str(&format!(".{{{},}}", lo)),
                }
            }
            HexToken::Alternatives(alts) => {
                out.push_str("(?:");
                for (i, alt) in alts.iter().enumerate() {
                    if i > 0 {
                        out.push('|');
                    }
                    write_regex(alt, out);
                }
                out.push(')');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_hex_is_pattern() {
        match parse_hex_string("4D 5A ?? 0?").unwrap() {
            HexString::Pattern(p) => {
                assert_eq!(p.len(), 4);
                assert_eq!(p.mask(), &[0xFF, 0xFF, 0x00, 0xF0]);
            }
            other => panic!("expected pattern, got {:?}", other),
        }
    }

    #[test]
    fn test_jump_lowers_to_regex() {
        match parse_hex_string("4D [2-4] 5A").unwrap() {
            HexString::Regex(r) => assert_eq!(r, "(?s-u)\\x4D.{2,4}\\x5A"),
            other => panic!("expected regex, got {:?}", other),
        }
    }

    #[test]
    fn test_alternatives() {
        match parse_hex_string("4D ( 5A | 00 01 )").unwrap() {
            HexString::Regex(r) => assert_eq!(r, "(?s-u)\\x4D(?:\\x5A|\\x00\\x01)"),
            other => panic!("expected regex, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_hex() {
        assert!(parse_hex_string("4D 5").is_err());
        assert!(parse_hex_string("ZZ").is_err());
        assert!(parse_hex_string("[2] 4D").is_err());
        assert!(parse_hex_string("").is_err());
    }
}

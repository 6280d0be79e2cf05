// Mon Feb 16 2026 - Alex

use crate::native::abi::{RULE_FLAGS_GLOBAL, RULE_FLAGS_PRIVATE, YR_MAX_INCLUDE_DEPTH};
use crate::native::compiler::YrCompiler;
use crate::native::condition::{Arithmetic, Comparison, Expr, Quantifier};
use crate::native::error::*;
use crate::native::hex::{parse_hex_string, HexString};
use crate::native::lexer::{Lexer, Token};
use crate::native::modules::{self, Declared};
use crate::native::pattern::Pattern;
use crate::native::rules::{MetaValue, YrMeta, YrRule, YrString};
use crate::native::strings::{RegexPattern, StringModifiers, StringPattern};
use ahash::AHashSet;
use libc::c_int;
use std::ffi::CString;

const KEYWORDS: &[&str] = &[
    "all", "and", "any", "ascii", "at", "condition", "false", "filesize", "fullword", "global", "import",
    "in", "include", "meta", "nocase", "none", "not", "of", "or", "private", "rule", "strings", "them",
    "true", "wide", "xor",
];

#[derive(Debug, Clone)]
pub struct Fault {
    pub code: c_int,
    pub message: String,
    pub line: usize,
}

/// Recursive-descent front end. Rules are appended to the compiler's
/// ruleset as soon as they are complete; the caller rolls back on error.
pub struct Parser<'s, 'c> {
    lexer: Lexer<'s>,
    peeked: Option<Token>,
    compiler: &'c mut YrCompiler,
    ns_idx: u32,
    depth: usize,
    rule_strings: Vec<(String, u32)>,
    referenced: AHashSet<u32>,
}

impl<'s, 'c> Parser<'s, 'c> {
    pub fn new(source: &'s str, compiler: &'c mut YrCompiler, ns_idx: u32, depth: usize) -> Self {
        Self {
            lexer: Lexer::new(source),
            peeked: None,
            compiler,
            ns_idx,
            depth,
            rule_strings: Vec::new(),
            referenced: AHashSet::new(),
        }
    }

    fn fault(&self, code: c_int, message: impl Into<String>) -> Fault {
        Fault { code, message: message.into(), line: self.lexer.line() }
    }

    fn syntax(&self, message: impl Into<String>) -> Fault {
        self.fault(ERROR_SYNTAX_ERROR, message)
    }

    fn peek(&mut self) -> Result<&Token, Fault> {
        if self.peeked.is_none() {
            let token = self.lexer.next_token().map_err(|e| self.syntax(e))?;
            self.peeked = Some(token);
        }
        Ok(self.peeked.as_ref().unwrap_or(&Token::Eof))
    }

    fn advance(&mut self) -> Result<Token, Fault> {
        match self.peeked.take() {
            Some(token) => Ok(token),
            None => self.lexer.next_token().map_err(|e| self.syntax(e)),
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), Fault> {
        let token = self.advance()?;
        if token != expected {
            return Err(self.syntax(format!(
                "syntax error, unexpected {}, expecting {}",
                token.describe(),
                expected.describe()
            )));
        }
        Ok(())
    }

    fn peek_keyword(&mut self, keyword: &str) -> Result<bool, Fault> {
        Ok(matches!(self.peek()?, Token::Ident(s) if s == keyword))
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), Fault> {
        match self.advance()? {
            Token::Ident(s) if s == keyword => Ok(()),
            other => Err(self.syntax(format!("syntax error, unexpected {}, expecting {}", other.describe(), keyword))),
        }
    }

    fn expect_identifier(&mut self) -> Result<String, Fault> {
        match self.advance()? {
            Token::Ident(s) if !KEYWORDS.contains(&s.as_str()) => Ok(s),
            other => Err(self.syntax(format!("syntax error, unexpected {}, expecting identifier", other.describe()))),
        }
    }

    fn expect_text(&mut self) -> Result<Vec<u8>, Fault> {
        match self.advance()? {
            Token::Text(t) => Ok(t),
            other => Err(self.syntax(format!("syntax error, unexpected {}, expecting text string", other.describe()))),
        }
    }

    pub fn parse_source(&mut self) -> Result<(), Fault> {
        loop {
            let token = self.advance()?;
            match token {
                Token::Eof => return Ok(()),
                Token::Ident(ref kw) if kw == "import" => self.parse_import()?,
                Token::Ident(ref kw) if kw == "include" => self.parse_include()?,
                Token::Ident(ref kw) if kw == "rule" => self.parse_rule(0)?,
                Token::Ident(ref kw) if kw == "private" || kw == "global" => {
                    let mut flags = if kw == "private" { RULE_FLAGS_PRIVATE } else { RULE_FLAGS_GLOBAL };
                    loop {
                        match self.advance()? {
                            Token::Ident(ref k) if k == "private" => flags |= RULE_FLAGS_PRIVATE,
                            Token::Ident(ref k) if k == "global" => flags |= RULE_FLAGS_GLOBAL,
                            Token::Ident(ref k) if k == "rule" => break,
                            other => return Err(self.syntax(format!("syntax error, unexpected {}", other.describe()))),
                        }
                    }
                    self.parse_rule(flags)?;
                }
                other => return Err(self.syntax(format!("syntax error, unexpected {}", other.describe()))),
            }
        }
    }

    fn parse_import(&mut self) -> Result<(), Fault> {
        let name = String::from_utf8_lossy(&self.expect_text()?).into_owned();
        if !modules::is_known(&name) {
            return Err(self.fault(ERROR_UNKNOWN_MODULE, format!("unknown module \"{}\"", name)));
        }
        let already = self.compiler.rules.imports.iter().any(|i| i.as_bytes() == name.as_bytes());
        if !already {
            self.compiler.rules.imports.push(CString::new(name).unwrap_or_default());
        }
        Ok(())
    }

    fn parse_include(&mut self) -> Result<(), Fault> {
        let name = String::from_utf8_lossy(&self.expect_text()?).into_owned();
        if self.depth + 1 >= YR_MAX_INCLUDE_DEPTH {
            return Err(self.fault(ERROR_INCLUDE_DEPTH_EXCEEDED, "include depth exceeded"));
        }

        let namespace = self
            .compiler
            .rules
            .namespaces
            .get(self.ns_idx as usize)
            .map(|ns| ns.name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let (source, file) = self
            .compiler
            .include_source(&name, &namespace)
            .map_err(|e| self.fault(ERROR_COULD_NOT_OPEN_FILE, e))?;

        let previous = self.compiler.swap_current_file(file);
        let result = Parser::new(&source, &mut *self.compiler, self.ns_idx, self.depth + 1).parse_source();
        self.compiler.swap_current_file(previous);
        result
    }

    fn parse_rule(&mut self, flags: u32) -> Result<(), Fault> {
        let name = self.expect_identifier()?;
        let ns_idx = self.ns_idx;
        let duplicate = self
            .compiler
            .rules
            .rules
            .iter()
            .any(|r| r.ns_idx == ns_idx && r.identifier.as_bytes() == name.as_bytes());
        if duplicate || self.compiler.rules.external_index(&name).is_some() {
            return Err(self.fault(ERROR_DUPLICATED_IDENTIFIER, format!("duplicated identifier \"{}\"", name)));
        }

        let mut tags: Vec<CString> = Vec::new();
        if *self.peek()? == Token::Colon {
            self.advance()?;
            while let Token::Ident(_) = self.peek()? {
                let tag = self.expect_identifier()?;
                if tags.iter().any(|t| t.as_bytes() == tag.as_bytes()) {
                    return Err(self.fault(ERROR_DUPLICATED_TAG_IDENTIFIER, format!("duplicated tag identifier \"{}\"", tag)));
                }
                tags.push(CString::new(tag).unwrap_or_default());
            }
        }
        self.expect(Token::LBrace)?;

        let mut metas = Vec::new();
        if self.peek_keyword("meta")? {
            self.advance()?;
            self.expect(Token::Colon)?;
            metas = self.parse_metas()?;
        }

        self.rule_strings.clear();
        self.referenced.clear();
        let rule_idx = self.compiler.rules.rules.len() as u32;
        if self.peek_keyword("strings")? {
            self.advance()?;
            self.expect(Token::Colon)?;
            self.parse_strings(rule_idx)?;
        }

        self.expect_keyword("condition")?;
        self.expect(Token::Colon)?;
        let condition = self.parse_or()?;
        self.expect(Token::RBrace)?;

        for (identifier, idx) in &self.rule_strings {
            if !self.referenced.contains(idx) && !identifier.starts_with("$_") {
                return Err(self.fault(ERROR_UNREFERENCED_STRING, format!("unreferenced string \"{}\"", identifier)));
            }
        }

        let rule = YrRule {
            identifier: CString::new(name).unwrap_or_default(),
            ns_idx,
            flags,
            tags,
            metas,
            strings: self.rule_strings.iter().map(|(_, idx)| *idx).collect(),
            condition,
        };
        self.compiler.rules.rules.push(rule);
        Ok(())
    }

    fn parse_metas(&mut self) -> Result<Vec<YrMeta>, Fault> {
        let mut metas: Vec<YrMeta> = Vec::new();
        loop {
            let is_meta = match self.peek()? {
                Token::Ident(s) => s != "strings" && s != "condition",
                _ => false,
            };
            if !is_meta {
                return Ok(metas);
            }
            let identifier = self.expect_identifier()?;
            self.expect(Token::Assign)?;
            let value = match self.advance()? {
                Token::Text(t) => MetaValue::String(CString::new(t).map_err(|_| self.syntax("null byte in meta value"))?),
                Token::Integer(i) => MetaValue::Integer(i),
                Token::Minus => match self.advance()? {
                    Token::Integer(i) => MetaValue::Integer(-i),
                    other => return Err(self.syntax(format!("syntax error, unexpected {}", other.describe()))),
                },
                Token::Ident(ref b) if b == "true" => MetaValue::Boolean(true),
                Token::Ident(ref b) if b == "false" => MetaValue::Boolean(false),
                other => return Err(self.syntax(format!("syntax error, unexpected {}", other.describe()))),
            };
            if metas.iter().any(|m| m.identifier.as_bytes() == identifier.as_bytes()) {
                return Err(self.fault(ERROR_DUPLICATED_META_IDENTIFIER, format!("duplicated meta identifier \"{}\"", identifier)));
            }
            metas.push(YrMeta { identifier: CString::new(identifier).unwrap_or_default(), value });
        }
    }

    fn parse_strings(&mut self, rule_idx: u32) -> Result<(), Fault> {
        while let Token::StringId(_) = self.peek()? {
            let identifier = match self.advance()? {
                Token::StringId(id) => id,
                _ => unreachable!(),
            };
            if identifier.ends_with('*') {
                return Err(self.syntax(format!("syntax error, unexpected {}", identifier)));
            }
            if identifier != "$" && self.rule_strings.iter().any(|(id, _)| *id == identifier) {
                return Err(self.fault(
                    ERROR_DUPLICATED_STRING_IDENTIFIER,
                    format!("duplicated string identifier \"{}\"", identifier),
                ));
            }
            self.expect(Token::Assign)?;

            let line = self.lexer.line();
            let lead = self.lexer.peek_significant().map_err(|e| self.syntax(e))?;
            let (pattern, kind) = match lead {
                Some(b'"') => {
                    let text = self.expect_text()?;
                    if text.is_empty() {
                        return Err(self.fault(ERROR_EMPTY_STRING, format!("empty string \"{}\"", identifier)));
                    }
                    (StringPattern::Literal(Pattern::from_bytes(&text)), StringKind::Text)
                }
                Some(b'{') => {
                    let body = self.lexer.hex_body().map_err(|e| self.syntax(e))?;
                    let pattern = match parse_hex_string(&body).map_err(|e| self.fault(ERROR_INVALID_HEX_STRING, e))? {
                        HexString::Pattern(p) => StringPattern::Literal(p),
                        HexString::Regex(r) => StringPattern::Regex(
                            RegexPattern::new(&r, false, true).map_err(|e| self.fault(ERROR_INVALID_HEX_STRING, e))?,
                        ),
                    };
                    (pattern, StringKind::Hex)
                }
                Some(b'/') => {
                    let (body, nocase, dotall) = self.lexer.regex_body().map_err(|e| self.syntax(e))?;
                    let pattern = RegexPattern::new(&body, nocase, dotall)
                        .map_err(|e| self.fault(ERROR_INVALID_REGULAR_EXPRESSION, format!("invalid regular expression \"{}\": {}", identifier, e)))?;
                    (StringPattern::Regex(pattern), StringKind::Regex)
                }
                _ => return Err(self.syntax(format!("syntax error, expecting string value for \"{}\"", identifier))),
            };

            let modifiers = self.parse_modifiers(&identifier, kind)?;
            let pattern = match (pattern, modifiers.nocase, kind) {
                (StringPattern::Regex(r), true, StringKind::Regex) => StringPattern::Regex(
                    r.case_insensitive().map_err(|e| self.fault(ERROR_INVALID_REGULAR_EXPRESSION, e))?,
                ),
                (p, _, _) => p,
            };

            if let Some(fixed) = pattern.fixed_byte_count() {
                if fixed < 2 {
                    self.compiler.warning(line, &format!("string \"{}\" may slow down scanning", identifier));
                }
            }

            let idx = self.compiler.rules.strings.len() as u32;
            self.compiler.rules.strings.push(YrString {
                identifier: CString::new(identifier.clone()).unwrap_or_default(),
                idx,
                rule_idx,
                pattern,
                modifiers,
            });
            self.rule_strings.push((identifier, idx));
        }
        Ok(())
    }

    fn parse_modifiers(&mut self, identifier: &str, kind: StringKind) -> Result<StringModifiers, Fault> {
        let mut modifiers = StringModifiers::default();
        loop {
            let name = match self.peek()? {
                Token::Ident(s) if matches!(s.as_str(), "nocase" | "wide" | "ascii" | "fullword" | "private" | "xor") => s.clone(),
                _ => return Ok(modifiers),
            };
            self.advance()?;

            let allowed = match kind {
                StringKind::Text => true,
                StringKind::Hex => name == "private",
                StringKind::Regex => matches!(name.as_str(), "nocase" | "ascii" | "fullword" | "private"),
            };
            if !allowed {
                return Err(self.fault(ERROR_INVALID_MODIFIER, format!("invalid modifier \"{}\" for \"{}\"", name, identifier)));
            }

            let slot = match name.as_str() {
                "nocase" => &mut modifiers.nocase,
                "wide" => &mut modifiers.wide,
                "ascii" => &mut modifiers.ascii,
                "fullword" => &mut modifiers.fullword,
                "private" => &mut modifiers.private,
                _ => {
                    if modifiers.xor.is_some() {
                        return Err(self.fault(ERROR_DUPLICATED_MODIFIER, "duplicated modifier"));
                    }
                    modifiers.xor = Some(self.parse_xor_range()?);
                    continue;
                }
            };
            if *slot {
                return Err(self.fault(ERROR_DUPLICATED_MODIFIER, "duplicated modifier"));
            }
            *slot = true;
        }
    }

    fn parse_xor_range(&mut self) -> Result<(u8, u8), Fault> {
        if *self.peek()? != Token::LParen {
            return Ok((0, 255));
        }
        self.advance()?;
        let lo = self.parse_byte()?;
        let hi = if *self.peek()? == Token::Minus {
            self.advance()?;
            self.parse_byte()?
        } else {
            lo
        };
        self.expect(Token::RParen)?;
        if lo > hi {
            return Err(self.fault(ERROR_INVALID_MODIFIER, "lower bound for xor range exceeds upper bound"));
        }
        Ok((lo, hi))
    }

    fn parse_byte(&mut self) -> Result<u8, Fault> {
        match self.advance()? {
            Token::Integer(i) if (0..=255).contains(&i) => Ok(i as u8),
            other => Err(self.fault(ERROR_INVALID_MODIFIER, format!("invalid xor key {}", other.describe()))),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, Fault> {
        let mut lhs = self.parse_and()?;
        while self.peek_keyword("or")? {
            self.advance()?;
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, Fault> {
        let mut lhs = self.parse_not()?;
        while self.peek_keyword("and")? {
            self.advance()?;
            let rhs = self.parse_not()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, Fault> {
        if self.peek_keyword("not")? {
            self.advance()?;
            return Ok(Expr::Not(Box::new(self.parse_not()?)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, Fault> {
        let lhs = self.parse_additive()?;
        let op = match self.peek()? {
            Token::Eq => Comparison::Equal,
            Token::Ne => Comparison::NotEqual,
            Token::Lt => Comparison::LessThan,
            Token::Le => Comparison::LessEqual,
            Token::Gt => Comparison::GreaterThan,
            Token::Ge => Comparison::GreaterEqual,
            _ => return Ok(lhs),
        };
        self.advance()?;
        let rhs = self.parse_additive()?;
        Ok(Expr::Compare(op, Box::new(lhs), Box::new(rhs)))
    }

    fn parse_additive(&mut self) -> Result<Expr, Fault> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek()? {
                Token::Plus => Arithmetic::Add,
                Token::Minus => Arithmetic::Sub,
                _ => return Ok(lhs),
            };
            self.advance()?;
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Arith(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, Fault> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek()? {
                Token::Star => Arithmetic::Mul,
                Token::Backslash => Arithmetic::Div,
                Token::Percent => Arithmetic::Mod,
                _ => return Ok(lhs),
            };
            self.advance()?;
            let rhs = self.parse_unary()?;
            if let (Arithmetic::Div | Arithmetic::Mod, Expr::Integer(0)) = (op, &rhs) {
                return Err(self.fault(ERROR_DIVISION_BY_ZERO, "division by zero"));
            }
            lhs = Expr::Arith(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, Fault> {
        if *self.peek()? == Token::Minus {
            self.advance()?;
            return Ok(match self.parse_unary()? {
                Expr::Integer(i) => Expr::Integer(-i),
                other => Expr::Neg(Box::new(other)),
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, Fault> {
        let token = self.advance()?;
        match token {
            Token::Integer(i) => {
                if self.peek_keyword("of")? {
                    return self.parse_of(Quantifier::Count(Box::new(Expr::Integer(i))));
                }
                Ok(Expr::Integer(i))
            }
            Token::Float(f) => Ok(Expr::Float(f)),
            Token::Text(t) => Ok(Expr::Text(t)),
            Token::LParen => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::StringId(id) => {
                let idx = self.string_index(&id)?;
                if self.peek_keyword("at")? {
                    self.advance()?;
                    let at = self.parse_additive()?;
                    return Ok(Expr::StringAt(idx, Box::new(at)));
                }
                if self.peek_keyword("in")? {
                    self.advance()?;
                    self.expect(Token::LParen)?;
                    let lo = self.parse_additive()?;
                    self.expect(Token::DotDot)?;
                    let hi = self.parse_additive()?;
                    self.expect(Token::RParen)?;
                    return Ok(Expr::StringIn(idx, Box::new(lo), Box::new(hi)));
                }
                Ok(Expr::StringFound(idx))
            }
            Token::StringCount(id) => Ok(Expr::StringCount(self.string_index(&id)?)),
            Token::StringOffset(id) => {
                let idx = self.string_index(&id)?;
                let nth = self.parse_match_index()?;
                Ok(Expr::StringOffset(idx, Box::new(nth)))
            }
            Token::StringLength(id) => {
                let idx = self.string_index(&id)?;
                let nth = self.parse_match_index()?;
                Ok(Expr::StringLength(idx, Box::new(nth)))
            }
            Token::Ident(word) => self.parse_identifier(word),
            other => Err(self.syntax(format!("syntax error, unexpected {}", other.describe()))),
        }
    }

    /// Optional `[i]` after `@a` / `!a`; defaults to the first match.
    fn parse_match_index(&mut self) -> Result<Expr, Fault> {
        if *self.peek()? != Token::LBracket {
            return Ok(Expr::Integer(1));
        }
        self.advance()?;
        let nth = self.parse_additive()?;
        self.expect(Token::RBracket)?;
        Ok(nth)
    }

    fn parse_identifier(&mut self, word: String) -> Result<Expr, Fault> {
        match word.as_str() {
            "true" => return Ok(Expr::Bool(true)),
            "false" => return Ok(Expr::Bool(false)),
            "filesize" => return Ok(Expr::Filesize),
            "all" => return self.parse_of(Quantifier::All),
            "any" => return self.parse_of(Quantifier::Any),
            "none" => return self.parse_of(Quantifier::None),
            _ => {}
        }

        let imported = self.compiler.rules.imports.iter().any(|i| i.as_bytes() == word.as_bytes());
        if imported {
            return self.parse_module_reference(word);
        }

        let ns_idx = self.ns_idx;
        if let Some(idx) = self
            .compiler
            .rules
            .rules
            .iter()
            .position(|r| r.ns_idx == ns_idx && r.identifier.as_bytes() == word.as_bytes())
        {
            return Ok(Expr::Rule(idx as u32));
        }
        if let Some(idx) = self.compiler.rules.external_index(&word) {
            return Ok(Expr::External(idx as u32));
        }
        Err(self.fault(ERROR_UNDEFINED_IDENTIFIER, format!("undefined identifier \"{}\"", word)))
    }

    fn parse_module_reference(&mut self, module: String) -> Result<Expr, Fault> {
        let mut path = vec![module];
        while *self.peek()? == Token::Dot {
            self.advance()?;
            match self.advance()? {
                Token::Ident(field) => path.push(field),
                other => return Err(self.syntax(format!("syntax error, unexpected {}", other.describe()))),
            }
        }

        match modules::declaration(&path) {
            Some(Declared::Field) => Ok(Expr::Field(path)),
            Some(Declared::Function) => {
                self.expect(Token::LParen)?;
                let mut args = Vec::new();
                if *self.peek()? != Token::RParen {
                    loop {
                        args.push(self.parse_or()?);
                        if *self.peek()? == Token::Comma {
                            self.advance()?;
                            continue;
                        }
                        break;
                    }
                }
                self.expect(Token::RParen)?;
                Ok(Expr::Call(path, args))
            }
            None => Err(self.fault(ERROR_INVALID_FIELD_NAME, format!("invalid field name \"{}\"", path.join(".")))),
        }
    }

    fn parse_of(&mut self, quantifier: Quantifier) -> Result<Expr, Fault> {
        self.expect_keyword("of")?;
        let mut set = Vec::new();

        if self.peek_keyword("them")? {
            self.advance()?;
            if self.rule_strings.is_empty() {
                return Err(self.fault(ERROR_UNDEFINED_STRING, "undefined string identifier \"them\""));
            }
            set = self.rule_strings.iter().map(|(_, idx)| *idx).collect();
        } else {
            self.expect(Token::LParen)?;
            loop {
                let id = match self.advance()? {
                    Token::StringId(id) => id,
                    other => return Err(self.syntax(format!("syntax error, unexpected {}", other.describe()))),
                };
                match id.strip_suffix('*') {
                    Some(prefix) => {
                        let hits: Vec<u32> = self
                            .rule_strings
                            .iter()
                            .filter(|(name, _)| name.starts_with(prefix))
                            .map(|(_, idx)| *idx)
                            .collect();
                        if hits.is_empty() {
                            return Err(self.fault(ERROR_UNDEFINED_STRING, format!("undefined string identifier \"{}\"", id)));
                        }
                        set.extend(hits);
                    }
                    None => set.push(self.string_index(&id)?),
                }
                match self.advance()? {
                    Token::Comma => continue,
                    Token::RParen => break,
                    other => return Err(self.syntax(format!("syntax error, unexpected {}", other.describe()))),
                }
            }
        }

        for idx in &set {
            self.referenced.insert(*idx);
        }
        set.sort_unstable();
        set.dedup();
        Ok(Expr::Of(quantifier, set))
    }

    fn string_index(&mut self, identifier: &str) -> Result<u32, Fault> {
        if identifier == "$" {
            return Err(self.fault(ERROR_MISPLACED_ANONYMOUS_STRING, "wrong use of anonymous string"));
        }
        match self.rule_strings.iter().find(|(name, _)| name == identifier) {
            Some((_, idx)) => {
                let idx = *idx;
                self.referenced.insert(idx);
                Ok(idx)
            }
            None => Err(self.fault(ERROR_UNDEFINED_STRING, format!("undefined string identifier \"{}\"", identifier))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StringKind {
    Text,
    Hex,
    Regex,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::rules::YrRules;

    fn compile(source: &str) -> Result<YrRules, Fault> {
        let mut compiler = YrCompiler::new();
        let ns = compiler.namespace_index("default");
        let result = Parser::new(source, &mut compiler, ns, 0).parse_source();
        result.map(|_| compiler.rules.clone())
    }

    #[test]
    fn test_full_rule() {
        let rules = compile(
            r#"
            import "tests"
            private rule helper { condition: true }
            global rule g : tag1 tag2 {
                meta:
                    author = "alex"
                    version = 3
                    enabled = true
                strings:
                    $a = "abc" nocase fullword
                    $h = { 4D 5A [2] 00 }
                    $r = /ab+c/i
                    $x = "key" xor(1-3)
                condition:
                    helper and any of ($a, $h) and #r >= 0 and @x[1] == 0 or filesize < 1KB
            }
            "#,
        )
        .unwrap();

        assert_eq!(rules.rules.len(), 2);
        assert!(rules.rules[0].is_private());
        let g = &rules.rules[1];
        assert!(g.is_global());
        assert_eq!(g.tags.len(), 2);
        assert_eq!(g.metas.len(), 3);
        assert_eq!(g.strings.len(), 4);
        assert_eq!(rules.strings[3].modifiers.xor, Some((1, 3)));
        assert!(matches!(rules.strings[1].pattern, StringPattern::Regex(_)));
        assert_eq!(rules.imports.len(), 1);
    }

    #[test]
    fn test_unreferenced_string() {
        let fault = compile(r#"rule a { strings: $a = "abc" $b = "def" condition: $a }"#).unwrap_err();
        assert_eq!(fault.code, ERROR_UNREFERENCED_STRING);
        assert!(fault.message.contains("$b"));

        assert!(compile(r#"rule a { strings: $_skip = "abc" condition: true }"#).is_ok());
        assert!(compile(r#"rule a { strings: $ = "abc" $ = "def" condition: all of them }"#).is_ok());
    }

    #[test]
    fn test_undefined_identifiers() {
        assert_eq!(compile("rule a { condition: b }").unwrap_err().code, ERROR_UNDEFINED_IDENTIFIER);
        assert_eq!(compile("rule a { condition: $a }").unwrap_err().code, ERROR_UNDEFINED_STRING);
        assert_eq!(compile("rule a { condition: tests.module_data }").unwrap_err().code, ERROR_UNDEFINED_IDENTIFIER);
        assert_eq!(
            compile("import \"tests\" rule a { condition: tests.nope }").unwrap_err().code,
            ERROR_INVALID_FIELD_NAME
        );
        assert_eq!(compile("import \"pe\"").unwrap_err().code, ERROR_UNKNOWN_MODULE);
    }

    #[test]
    fn test_duplicates() {
        assert_eq!(
            compile("rule a { condition: true } rule a { condition: true }").unwrap_err().code,
            ERROR_DUPLICATED_IDENTIFIER
        );
        assert_eq!(
            compile(r#"rule a { strings: $a = "x1" $a = "x2" condition: $a }"#).unwrap_err().code,
            ERROR_DUPLICATED_STRING_IDENTIFIER
        );
        assert_eq!(
            compile(r#"rule a { strings: $a = "abc" nocase nocase condition: $a }"#).unwrap_err().code,
            ERROR_DUPLICATED_MODIFIER
        );
    }

    #[test]
    fn test_invalid_modifiers_and_values() {
        assert_eq!(
            compile("rule a { strings: $a = { 4D 5A } nocase condition: $a }").unwrap_err().code,
            ERROR_INVALID_MODIFIER
        );
        assert_eq!(
            compile(r#"rule a { strings: $a = "" condition: $a }"#).unwrap_err().code,
            ERROR_EMPTY_STRING
        );
        assert_eq!(
            compile("rule a { strings: $a = { 4D 5 } condition: $a }").unwrap_err().code,
            ERROR_INVALID_HEX_STRING
        );
        assert_eq!(compile("rule a { condition: 1 \\ 0 }").unwrap_err().code, ERROR_DIVISION_BY_ZERO);
    }

    #[test]
    fn test_fault_line_number() {
        let fault = compile("rule a {\n condition:\n nothing_here }").unwrap_err();
        assert_eq!(fault.line, 3);
    }

    #[test]
    fn test_console_call() {
        let rules = compile(r#"import "console" rule a { condition: console.log("x", 1) }"#).unwrap();
        assert!(matches!(rules.rules[0].condition, Expr::Call(ref path, ref args) if path.len() == 2 && args.len() == 2));
    }
}

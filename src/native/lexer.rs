// Mon Feb 16 2026 - Alex

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    /// `$a`, `$` or `$a*`
    StringId(String),
    /// `#a`
    StringCount(String),
    /// `@a`
    StringOffset(String),
    /// `!a`
    StringLength(String),
    Integer(i64),
    Float(f64),
    Text(Vec<u8>),
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Colon,
    Comma,
    Dot,
    DotDot,
    Assign,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Backslash,
    Percent,
    Eof,
}

impl Token {
    pub fn describe(&self) -> String {
        match self {
            Token::Ident(s) => s.clone(),
            Token::StringId(s) | Token::StringCount(s) | Token::StringOffset(s) | Token::StringLength(s) => s.clone(),
            Token::Integer(i) => i.to_string(),
            Token::Float(f) => f.to_string(),
            Token::Text(_) => "text string".to_string(),
            Token::Eof => "end of input".to_string(),
            other => format!("{:?}", other),
        }
    }
}

pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src: src.as_bytes(), pos: 0, line: 1 }
    }

    pub fn line(&self) -> usize {
        self.line
    }

    fn peek_byte(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_byte_at(&self, ahead: usize) -> Option<u8> {
        self.src.get(self.pos + ahead).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek_byte()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
        }
        Some(b)
    }

    pub fn skip_trivia(&mut self) -> Result<(), String> {
        loop {
            match (self.peek_byte(), self.peek_byte_at(1)) {
                (Some(b), _) if b.is_ascii_whitespace() => {
                    self.bump();
                }
                (Some(b'/'), Some(b'/')) => {
                    while let Some(b) = self.peek_byte() {
                        if b == b'\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                (Some(b'/'), Some(b'*')) => {
                    self.pos += 2;
                    loop {
                        match (self.peek_byte(), self.peek_byte_at(1)) {
                            (Some(b'*'), Some(b'/')) => {
                                self.pos += 2;
                                break;
                            }
                            (Some(_), _) => {
                                self.bump();
                            }
                            (None, _) => return Err("unterminated comment".to_string()),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Next raw byte after trivia, without consuming it.
    pub fn peek_significant(&mut self) -> Result<Option<u8>, String> {
        self.skip_trivia()?;
        Ok(self.peek_byte())
    }

    pub fn next_token(&mut self) -> Result<Token, String> {
        self.skip_trivia()?;

        let b = match self.peek_byte() {
            Some(b) => b,
            None => return Ok(Token::Eof),
        };

        if b.is_ascii_alphabetic() || b == b'_' {
            return Ok(Token::Ident(self.take_word()));
        }
        if b.is_ascii_digit() {
            return self.number();
        }

        self.bump();
        let token = match b {
            b'$' => {
                let mut id = format!("${}", self.take_word());
                if self.peek_byte() == Some(b'*') {
                    self.bump();
                    id.push('*');
                }
                Token::StringId(id)
            }
            b'#' => Token::StringCount(format!("${}", self.take_word())),
            b'@' => Token::StringOffset(format!("${}", self.take_word())),
            b'!' if self.peek_byte() == Some(b'=') => {
                self.bump();
                Token::Ne
            }
            b'!' => Token::StringLength(format!("${}", self.take_word())),
            b'"' => Token::Text(self.text()?),
            b'{' => Token::LBrace,
            b'}' => Token::RBrace,
            b'(' => Token::LParen,
            b')' => Token::RParen,
            b'[' => Token::LBracket,
            b']' => Token::RBracket,
            b':' => Token::Colon,
            b',' => Token::Comma,
            b'.' if self.peek_byte() == Some(b'.') => {
                self.bump();
                Token::DotDot
            }
            b'.' => Token::Dot,
            b'=' if self.peek_byte() == Some(b'=') => {
                self.bump();
                Token::Eq
            }
            b'=' => Token::Assign,
            b'<' if self.peek_byte() == Some(b'=') => {
                self.bump();
                Token::Le
            }
            b'<' => Token::Lt,
            b'>' if self.peek_byte() == Some(b'=') => {
                self.bump();
                Token::Ge
            }
            b'>' => Token::Gt,
            b'+' => Token::Plus,
            b'-' => Token::Minus,
            b'*' => Token::Star,
            b'\\' => Token::Backslash,
            b'%' => Token::Percent,
            other => return Err(format!("unexpected character '{}'", other as char)),
        };
        Ok(token)
    }

    fn take_word(&mut self) -> String {
        let start = self.pos;
        while let Some(b) = self.peek_byte() {
            if b.is_ascii_alphanumeric() || b == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        String::from_utf8_lossy(&self.src[start..self.pos]).into_owned()
    }

    fn number(&mut self) -> Result<Token, String> {
        let start = self.pos;

        if self.peek_byte() == Some(b'0') && matches!(self.peek_byte_at(1), Some(b'x') | Some(b'X')) {
            self.pos += 2;
            let digits_start = self.pos;
            while self.peek_byte().map_or(false, |b| b.is_ascii_hexdigit()) {
                self.pos += 1;
            }
            let digits = std::str::from_utf8(&self.src[digits_start..self.pos]).unwrap_or("");
            return i64::from_str_radix(digits, 16)
                .map(Token::Integer)
                .map_err(|_| format!("invalid hex number '0x{}'", digits));
        }

        while self.peek_byte().map_or(false, |b| b.is_ascii_digit()) {
            self.pos += 1;
        }

        if self.peek_byte() == Some(b'.') && self.peek_byte_at(1).map_or(false, |b| b.is_ascii_digit()) {
            self.pos += 1;
            while self.peek_byte().map_or(false, |b| b.is_ascii_digit()) {
                self.pos += 1;
            }
            let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap_or("");
            return text.parse::<f64>().map(Token::Float).map_err(|_| format!("invalid number '{}'", text));
        }

        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap_or("");
        let mut value: i64 = text.parse().map_err(|_| format!("invalid number '{}'", text))?;

        let multiplier = match (self.peek_byte(), self.peek_byte_at(1)) {
            (Some(b'K'), Some(b'B')) => Some(1024),
            (Some(b'M'), Some(b'B')) => Some(1024 * 1024),
            _ => None,
        };
        if let Some(m) = multiplier {
            self.pos += 2;
            value = value.checked_mul(m).ok_or_else(|| "integer overflow".to_string())?;
        }

        Ok(Token::Integer(value))
    }

    fn text(&mut self) -> Result<Vec<u8>, String> {
        let mut out = Vec::new();
        loop {
            match self.bump() {
                None | Some(b'\n') => return Err("unterminated string".to_string()),
                Some(b'"') => return Ok(out),
                Some(b'\\') => match self.bump() {
                    Some(b'n') => out.push(b'\n'),
                    Some(b't') => out.push(b'\t'),
                    Some(b'r') => out.push(b'\r'),
                    Some(b'\\') => out.push(b'\\'),
                    Some(b'"') => out.push(b'"'),
                    Some(b'x') => {
                        let hex = [self.bump().unwrap_or(0), self.bump().unwrap_or(0)];
                        let hex = std::str::from_utf8(&hex).map_err(|_| "illegal escape sequence".to_string())?;
                        let byte = u8::from_str_radix(hex, 16).map_err(|_| "illegal escape sequence".to_string())?;
                        out.push(byte);
                    }
                    _ => return Err("illegal escape sequence".to_string()),
                },
                Some(b) => out.push(b),
            }
        }
    }

    /// Body of a `{ .. }` hex string; the opening brace is next in input.
    pub fn hex_body(&mut self) -> Result<String, String> {
        self.skip_trivia()?;
        if self.bump() != Some(b'{') {
            return Err("expected hex string".to_string());
        }
        let start = self.pos;
        while let Some(b) = self.peek_byte() {
            if b == b'}' {
                let body = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
                self.bump();
                return Ok(body);
            }
            self.bump();
        }
        Err("unterminated hex string".to_string())
    }

    /// Body and flags of a `/../` regex; the opening slash is next in input.
    pub fn regex_body(&mut self) -> Result<(String, bool, bool), String> {
        self.skip_trivia()?;
        if self.bump() != Some(b'/') {
            return Err("expected regular expression".to_string());
        }
        let mut body = Vec::new();
        loop {
            match self.bump() {
                None | Some(b'\n') => return Err("unterminated regular expression".to_string()),
                Some(b'\\') => {
                    match self.bump() {
                        Some(b'/') => body.push(b'/'),
                        Some(b) => {
                            body.push(b'\\');
                            body.push(b);
                        }
                        None => return Err("unterminated regular expression".to_string()),
                    }
                }
                Some(b'/') => break,
                Some(b) => body.push(b),
            }
        }
        let mut nocase = false;
        let mut dotall = false;
        while let Some(b) = self.peek_byte() {
            match b {
                b'i' => nocase = true,
                b's' => dotall = true,
                _ => break,
            }
            self.bump();
        }
        Ok((String::from_utf8_lossy(&body).into_owned(), nocase, dotall))
    }
}

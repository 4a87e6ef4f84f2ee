use crate::language::{
    span::Span,
    token::{Token, TokenKind},
};

#[derive(Debug, Clone)]
pub struct LexError {
    pub message: String,
    pub span: Span,
}

pub fn lex(source: &str) -> Result<Vec<Token>, Vec<LexError>> {
    let lexer = Lexer::new(source);
    lexer.run()
}

/// Operators that have no dedicated token kind, longest first.
const OPERATORS: &[&str] = &[
    "<<=", ">>=", "&^=", "&&", "||", "++", "--", "==", "!=", "<=", ">=", "+=", "-=", "*=", "/=",
    "%=", "&=", "|=", "^=", "<<", ">>", "&^", "+", "-", "/", "%", "&", "^", "<", ">", "!",
];

struct Lexer<'a> {
    src: &'a str,
    chars: std::str::Chars<'a>,
    current: Option<char>,
    offset: usize,
    tokens: Vec<Token>,
    errors: Vec<LexError>,
    // set after a token that a newline terminates
    insert_semi: bool,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        let mut chars = src.chars();
        let current = chars.next();
        Self {
            src,
            chars,
            current,
            offset: 0,
            tokens: Vec::new(),
            errors: Vec::new(),
            insert_semi: false,
        }
    }

    fn run(mut self) -> Result<Vec<Token>, Vec<LexError>> {
        while let Some(ch) = self.current {
            match ch {
                '\n' => {
                    self.newline(self.offset);
                    self.bump();
                }
                '/' if self.peek() == Some('/') => self.eat_line_comment(),
                '/' if self.peek() == Some('*') => self.eat_block_comment(),
                ch if ch.is_whitespace() => {
                    self.bump();
                }
                ch if ch.is_alphabetic() || ch == '_' => self.lex_identifier(),
                ch if ch.is_ascii_digit() => self.lex_number(),
                '.' if self.peek().is_some_and(|next| next.is_ascii_digit()) => self.lex_number(),
                '"' => self.lex_string(),
                '`' => self.lex_raw_string(),
                '\'' => self.lex_rune(),
                _ => self.lex_symbol(),
            }
        }
        self.newline(self.offset);
        self.push_token(TokenKind::Eof, self.offset, self.offset);

        if self.errors.is_empty() {
            Ok(self.tokens)
        } else {
            Err(self.errors)
        }
    }

    fn bump(&mut self) -> Option<char> {
        if let Some(ch) = self.current {
            self.offset += ch.len_utf8();
        }
        self.current = self.chars.next();
        self.current
    }

    fn peek(&self) -> Option<char> {
        self.chars.clone().next()
    }

    fn push_token(&mut self, kind: TokenKind, start: usize, end: usize) {
        self.insert_semi = kind.ends_statement();
        self.tokens.push(Token {
            kind,
            span: Span::new(start, end),
        });
    }

    fn newline(&mut self, at: usize) {
        if self.insert_semi {
            self.push_token(TokenKind::Semi, at, at);
        }
    }

    fn error(&mut self, start: usize, end: usize, message: impl Into<String>) {
        self.errors.push(LexError {
            message: message.into(),
            span: Span::new(start, end),
        });
    }

    fn single(&mut self, kind: TokenKind) {
        let start = self.offset;
        self.bump();
        self.push_token(kind, start, self.offset);
    }

    fn eat_line_comment(&mut self) {
        self.bump();
        self.bump();
        while let Some(ch) = self.current {
            if ch == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn eat_block_comment(&mut self) {
        let start = self.offset;
        self.bump();
        self.bump();
        let mut saw_newline = false;
        while let Some(ch) = self.current {
            if ch == '*' && self.peek() == Some('/') {
                self.bump();
                self.bump();
                if saw_newline {
                    self.newline(start);
                }
                return;
            }
            saw_newline |= ch == '\n';
            self.bump();
        }
        self.error(start, self.offset, "Unterminated block comment");
    }

    fn lex_identifier(&mut self) {
        let start = self.offset;
        while let Some(ch) = self.current {
            if ch.is_alphanumeric() || ch == '_' {
                self.bump();
            } else {
                break;
            }
        }

        let end = self.offset;
        let slice = &self.src[start..end];
        let kind =
            TokenKind::keyword(slice).unwrap_or_else(|| TokenKind::Identifier(slice.to_string()));
        self.push_token(kind, start, end);
    }

    fn lex_number(&mut self) {
        let start = self.offset;
        let hex = self.current == Some('0') && matches!(self.peek(), Some('x') | Some('X'));
        let exponent: &[char] = if hex { &['p', 'P'] } else { &['e', 'E'] };
        while let Some(ch) = self.current {
            if exponent.contains(&ch) {
                self.bump();
                if matches!(self.current, Some('+') | Some('-')) {
                    self.bump();
                }
            } else if ch.is_ascii_alphanumeric() || ch == '_' {
                self.bump();
            } else if ch == '.' && self.peek() != Some('.') {
                self.bump();
            } else {
                break;
            }
        }
        let end = self.offset;
        let text = &self.src[start..end];
        if text.ends_with('_') {
            self.error(start, end, "'_' must separate successive digits");
            return;
        }
        self.push_token(TokenKind::Number(text.to_string()), start, end);
    }

    fn lex_string(&mut self) {
        let start = self.offset;
        self.bump();
        let mut value = Vec::new();
        while let Some(ch) = self.current {
            match ch {
                '"' => {
                    self.bump();
                    let end = self.offset;
                    let value = String::from_utf8_lossy(&value).into_owned();
                    self.push_token(TokenKind::String(value), start, end);
                    return;
                }
                '\n' => break,
                '\\' => {
                    if !self.lex_escape('"', &mut value) {
                        return;
                    }
                }
                _ => {
                    let mut buf = [0u8; 4];
                    value.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                    self.bump();
                }
            }
        }
        self.error(start, self.offset, "Unterminated string literal");
    }

    /// Consumes one escape sequence starting at the backslash.
    fn lex_escape(&mut self, quote: char, out: &mut Vec<u8>) -> bool {
        let start = self.offset;
        self.bump();
        let Some(ch) = self.current else {
            self.error(start, self.offset, "Unterminated escape sequence");
            return false;
        };
        let simple = match ch {
            'a' => Some(0x07),
            'b' => Some(0x08),
            'f' => Some(0x0c),
            'n' => Some(b'\n'),
            'r' => Some(b'\r'),
            't' => Some(b'\t'),
            'v' => Some(0x0b),
            '\\' => Some(b'\\'),
            c if c == quote => Some(c as u8),
            _ => None,
        };
        if let Some(byte) = simple {
            out.push(byte);
            self.bump();
            return true;
        }
        let (digits, radix) = match ch {
            'x' => (2, 16),
            'u' => (4, 16),
            'U' => (8, 16),
            '0'..='7' => (3, 8),
            _ => {
                self.bump();
                self.error(start, self.offset, "Unknown escape sequence");
                return false;
            }
        };
        if radix == 16 {
            self.bump();
        }
        let mut code: u32 = 0;
        for _ in 0..digits {
            match self.current.and_then(|c| c.to_digit(radix)) {
                Some(digit) => {
                    code = code * radix + digit;
                    self.bump();
                }
                None => {
                    self.error(start, self.offset, "Invalid escape sequence");
                    return false;
                }
            }
        }
        match ch {
            'x' | '0'..='7' if code <= 0xff => out.push(code as u8),
            'u' | 'U' => match char::from_u32(code) {
                Some(decoded) => {
                    let mut buf = [0u8; 4];
                    out.extend_from_slice(decoded.encode_utf8(&mut buf).as_bytes());
                }
                None => {
                    self.error(start, self.offset, "Escape is an invalid Unicode code point");
                    return false;
                }
            },
            _ => {
                self.error(start, self.offset, "Octal escape value out of range");
                return false;
            }
        }
        true
    }

    fn lex_raw_string(&mut self) {
        let start = self.offset;
        self.bump();
        let mut value = String::new();
        while let Some(ch) = self.current {
            match ch {
                '`' => {
                    self.bump();
                    let end = self.offset;
                    self.push_token(TokenKind::RawString(value), start, end);
                    return;
                }
                '\r' => {
                    self.bump();
                }
                _ => {
                    value.push(ch);
                    self.bump();
                }
            }
        }
        self.error(start, self.offset, "Unterminated raw string literal");
    }

    fn lex_rune(&mut self) {
        let start = self.offset;
        self.bump(); // '
        let mut escaped = false;
        while let Some(ch) = self.current {
            match ch {
                '\n' => break,
                '\'' if !escaped => {
                    self.bump();
                    let end = self.offset;
                    let text = self.src[start..end].to_string();
                    if text.len() == 2 {
                        self.error(start, end, "Empty rune literal");
                        return;
                    }
                    self.push_token(TokenKind::Rune(text), start, end);
                    return;
                }
                '\\' if !escaped => {
                    escaped = true;
                    self.bump();
                    continue;
                }
                _ => {
                    self.bump();
                }
            }
            escaped = false;
        }
        self.error(start, self.offset, "Unterminated rune literal");
    }

    fn lex_symbol(&mut self) {
        let start = self.offset;
        match self.current {
            Some('(') => self.single(TokenKind::LParen),
            Some(')') => self.single(TokenKind::RParen),
            Some('{') => self.single(TokenKind::LBrace),
            Some('}') => self.single(TokenKind::RBrace),
            Some('[') => self.single(TokenKind::LBracket),
            Some(']') => self.single(TokenKind::RBracket),
            Some(',') => self.single(TokenKind::Comma),
            Some(';') => self.single(TokenKind::Semi),
            Some('~') => self.single(TokenKind::Tilde),
            Some('.') => {
                if self.src[start..].starts_with("...") {
                    self.bump();
                    self.bump();
                    self.bump();
                    self.push_token(TokenKind::Ellipsis, start, self.offset);
                } else {
                    self.single(TokenKind::Dot);
                }
            }
            Some(':') => {
                self.bump();
                if self.current == Some('=') {
                    self.bump();
                    self.push_token(TokenKind::Define, start, self.offset);
                } else {
                    self.push_token(TokenKind::Colon, start, self.offset);
                }
            }
            Some('*') if self.peek() != Some('=') => self.single(TokenKind::Star),
            Some('|') if !matches!(self.peek(), Some('|') | Some('=')) => {
                self.single(TokenKind::Pipe)
            }
            Some('=') if self.peek() != Some('=') => self.single(TokenKind::Eq),
            Some('<') if self.peek() == Some('-') => {
                self.bump();
                self.bump();
                self.push_token(TokenKind::Arrow, start, self.offset);
            }
            Some(other) => {
                let rest = &self.src[start..];
                match OPERATORS.iter().find(|op| rest.starts_with(**op)) {
                    Some(op) => {
                        for _ in 0..op.len() {
                            self.bump();
                        }
                        self.push_token(TokenKind::Operator(op.to_string()), start, self.offset);
                    }
                    None => {
                        self.bump();
                        self.error(start, self.offset, format!("Unexpected character '{other}'"));
                    }
                }
            }
            None => {}
        }
    }
}

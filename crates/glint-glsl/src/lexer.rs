use crate::error::GlslError;

// ── Token ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    /// Numeric literal, kept verbatim (`1`, `0.5`, `1e-3`, `2u`).
    Number(String),
    /// Single punctuation character. Multi-character operators are emitted
    /// as consecutive punctuation tokens; the scanners never need them fused.
    Punct(char),
    /// A whole preprocessor line without the leading `#` (`version 120`).
    Directive(String),
    Eof,
}

/// A token with its 1-based source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub tok: Token,
    pub line: usize,
    pub col: usize,
}

const PUNCT: &str = "+-*/%=<>!&|^~?:;,.(){}[]";

// ── Lexer ─────────────────────────────────────────────────────────────────

pub struct Lexer<'s> {
    src: &'s str,
    pos: usize,
    line: usize,
    col: usize,
    /// True while only whitespace has been seen on the current line.
    line_start: bool,
}

impl<'s> Lexer<'s> {
    pub fn new(src: &'s str) -> Self {
        Self { src, pos: 0, line: 1, col: 1, line_start: true }
    }

    pub fn tokenize(mut self) -> Result<Vec<Spanned>, GlslError> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token()?;
            let eof = tok.tok == Token::Eof;
            tokens.push(tok);
            if eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.rest().chars().nth(1)
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
            self.line_start = true;
        } else {
            self.col += 1;
            if !ch.is_whitespace() {
                self.line_start = false;
            }
        }
        Some(ch)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while matches!(self.peek(), Some(c) if c.is_whitespace()) {
                self.advance();
            }
            if self.rest().starts_with("//") {
                while !matches!(self.peek(), None | Some('\n')) {
                    self.advance();
                }
            } else if self.rest().starts_with("/*") {
                let at_line_start = self.line_start;
                self.advance();
                self.advance();
                loop {
                    if self.rest().starts_with("*/") {
                        self.advance();
                        self.advance();
                        break;
                    }
                    if self.advance().is_none() {
                        break;
                    }
                }
                // A block comment does not end the "start of line" state.
                self.line_start = at_line_start || self.line_start;
            } else {
                break;
            }
        }
    }

    fn next_token(&mut self) -> Result<Spanned, GlslError> {
        self.skip_whitespace_and_comments();

        let (line, col) = (self.line, self.col);
        let spanned = |tok| Ok(Spanned { tok, line, col });

        let Some(ch) = self.peek() else {
            return spanned(Token::Eof);
        };

        match ch {
            '#' if self.line_start => {
                let directive = self.lex_directive();
                spanned(Token::Directive(directive))
            }
            c if c.is_ascii_digit() => spanned(self.lex_number()),
            '.' if matches!(self.peek_second(), Some(d) if d.is_ascii_digit()) => {
                spanned(self.lex_number())
            }
            c if c.is_ascii_alphabetic() || c == '_' => spanned(self.lex_ident()),
            c if PUNCT.contains(c) => {
                self.advance();
                spanned(Token::Punct(c))
            }
            other => Err(GlslError::new(format!("unexpected character {other:?}"), line, col)),
        }
    }

    fn lex_directive(&mut self) -> String {
        self.advance(); // consume `#`
        let mut text = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => break,
                Some('\\') if self.peek_second() == Some('\n') => {
                    self.advance();
                    self.advance();
                    text.push(' ');
                }
                Some(c) => {
                    self.advance();
                    text.push(c);
                }
            }
        }
        text.trim().to_string()
    }

    fn lex_number(&mut self) -> Token {
        let start = self.pos;
        while let Some(c) = self.peek() {
            let exponent_sign = matches!(c, '+' | '-')
                && matches!(self.src[start..self.pos].chars().last(), Some('e' | 'E'));
            if c.is_ascii_alphanumeric() || c == '.' || exponent_sign {
                self.advance();
            } else {
                break;
            }
        }
        Token::Number(self.src[start..self.pos].to_string())
    }

    fn lex_ident(&mut self) -> Token {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.advance();
        }
        Token::Ident(self.src[start..self.pos].to_string())
    }
}

/// Replaces `//` and `/* */` comments with spaces, keeping every newline so
/// line numbers of the result match the input.
pub fn strip_comments(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    let mut chars = src.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, chars.peek()) {
            ('/', Some('/')) => {
                while let Some(&n) = chars.peek() {
                    if n == '\n' {
                        break;
                    }
                    chars.next();
                }
                out.push(' ');
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for n in chars.by_ref() {
                    if n == '\n' {
                        out.push('\n');
                    }
                    if prev == '*' && n == '/' {
                        break;
                    }
                    prev = n;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }
    out
}

//! Splits MiniC source text into a token vector. The lexer tracks line
//! numbers so later stages can report diagnostics against the source.

mod error;
mod tokens;

#[cfg(test)]
mod tests;

pub use error::{LexerError, LexerErrorKind};
pub use tokens::{Token, TokenKind};

use crate::compiler::stringtable::StringTable;

pub struct Lexer<'st> {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    st: &'st StringTable,
}

impl<'st> Lexer<'st> {
    pub fn new(src: &str, st: &'st StringTable) -> Lexer<'st> {
        Lexer {
            chars: src.chars().collect(),
            pos: 0,
            line: 1,
            st,
        }
    }

    /// Consumes the entire input and produces the token vector. All lexing
    /// faults are collected; a file only fails to tokenize as a whole.
    pub fn tokenize(mut self) -> Result<Vec<Token>, Vec<LexerError>> {
        let mut tokens = vec![];
        let mut errors = vec![];

        while let Some(c) = self.peek() {
            if c == '\n' {
                self.line += 1;
                self.next();
            } else if c.is_whitespace() {
                self.next();
            } else if c == '/' && self.peek_at(1) == Some('/') {
                self.skip_line_comment();
            } else if c == '/' && self.peek_at(1) == Some('*') {
                if let Err(e) = self.skip_block_comment() {
                    errors.push(e);
                }
            } else if c.is_ascii_digit() {
                match self.number() {
                    Ok(t) => tokens.push(t),
                    Err(e) => errors.push(e),
                }
            } else if c.is_ascii_alphabetic() || c == '_' {
                tokens.push(self.word());
            } else {
                match self.operator() {
                    Ok(t) => tokens.push(t),
                    Err(e) => errors.push(e),
                }
            }
        }

        if errors.is_empty() {
            Ok(tokens)
        } else {
            Err(errors)
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, off: usize) -> Option<char> {
        self.chars.get(self.pos + off).copied()
    }

    fn next(&mut self) -> Option<char> {
        let c = self.peek();
        self.pos += 1;
        c
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.next();
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), LexerError> {
        let start = self.line;
        self.next();
        self.next();
        loop {
            match self.next() {
                Some('*') if self.peek() == Some('/') => {
                    self.next();
                    return Ok(());
                }
                Some('\n') => self.line += 1,
                Some(_) => (),
                None => {
                    return Err(LexerError {
                        line: start,
                        kind: LexerErrorKind::UnterminatedComment,
                    })
                }
            }
        }
    }

    /// Lexes a decimal, hexadecimal (0x...) or octal (leading 0) literal.
    fn number(&mut self) -> Result<Token, LexerError> {
        let line = self.line;
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() {
                text.push(c);
                self.next();
            } else {
                break;
            }
        }

        let parsed = if text == "0" {
            Ok(0)
        } else if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            i64::from_str_radix(hex, 16)
        } else if let Some(oct) = text.strip_prefix('0') {
            i64::from_str_radix(oct, 8)
        } else {
            text.parse::<i64>()
        };

        match parsed {
            Ok(v) if v <= u32::MAX as i64 => Ok(Token::new(line, TokenKind::IntLit(v as i32))),
            _ => Err(LexerError {
                line,
                kind: LexerErrorKind::MalformedNumber(text),
            }),
        }
    }

    fn word(&mut self) -> Token {
        let line = self.line;
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                text.push(c);
                self.next();
            } else {
                break;
            }
        }

        match TokenKind::keyword(&text) {
            Some(kw) => Token::new(line, kw),
            None => Token::new(line, TokenKind::Ident(self.st.insert(text))),
        }
    }

    fn operator(&mut self) -> Result<Token, LexerError> {
        let line = self.line;
        let c = self.next().unwrap();
        let kind = match c {
            '+' => TokenKind::Add,
            '-' => TokenKind::Sub,
            '*' => TokenKind::Mul,
            '/' => TokenKind::Div,
            '%' => TokenKind::Mod,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            '=' => {
                if self.peek() == Some('=') {
                    self.next();
                    TokenKind::Eq
                } else {
                    TokenKind::Assign
                }
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.next();
                    TokenKind::Ne
                } else {
                    TokenKind::Not
                }
            }
            '<' => {
                if self.peek() == Some('=') {
                    self.next();
                    TokenKind::Le
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.next();
                    TokenKind::Ge
                } else {
                    TokenKind::Gt
                }
            }
            '&' => {
                if self.peek() == Some('&') {
                    self.next();
                    TokenKind::And
                } else {
                    return Err(LexerError {
                        line,
                        kind: LexerErrorKind::UnexpectedChar('&'),
                    });
                }
            }
            '|' => {
                if self.peek() == Some('|') {
                    self.next();
                    TokenKind::Or
                } else {
                    return Err(LexerError {
                        line,
                        kind: LexerErrorKind::UnexpectedChar('|'),
                    });
                }
            }
            other => {
                return Err(LexerError {
                    line,
                    kind: LexerErrorKind::UnexpectedChar(other),
                })
            }
        };
        Ok(Token::new(line, kind))
    }
}

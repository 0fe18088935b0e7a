use std::fmt;

use crate::compiler::lexer::TokenKind;

#[derive(Clone, Debug, PartialEq)]
pub struct ParserError {
    pub line: u32,
    pub kind: ParserErrorKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ParserErrorKind {
    /// A specific token was required but something else was found.
    Expected(&'static str, Option<TokenKind>),
    InvalidAssignmentTarget,
    ArrayInitializerUnsupported,
    UnexpectedEof,
}

impl fmt::Display for ParserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ParserErrorKind::Expected(what, Some(found)) => f.write_fmt(format_args!(
                "line {}: expected {} but found `{}`",
                self.line, what, found
            )),
            ParserErrorKind::Expected(what, None) => f.write_fmt(format_args!(
                "line {}: expected {} but reached the end of the file",
                self.line, what
            )),
            ParserErrorKind::InvalidAssignmentTarget => f.write_fmt(format_args!(
                "line {}: left side of `=` must be a variable or array element",
                self.line
            )),
            ParserErrorKind::ArrayInitializerUnsupported => f.write_fmt(format_args!(
                "line {}: array initializer lists are not supported",
                self.line
            )),
            ParserErrorKind::UnexpectedEof => f.write_fmt(format_args!(
                "line {}: unexpected end of file",
                self.line
            )),
        }
    }
}

use std::fmt;

use thiserror::Error;

use crate::interpreter::value::ValueKind;
use crate::reader::lexer::{Position, TokenKind};

/// Every failure the tokenizer, parser or evaluator can raise.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    #[error("LexError: non-terminated string starting at {line}:{position}")]
    NonTerminatedString { line: usize, position: usize },
    #[error("LexError: invalid escape sequence `\\{character}` at {line}:{position}")]
    InvalidEscapeSequence { character: char, line: usize, position: usize },
    #[error("LexError: invalid character {character:?} in string at {line}:{position}")]
    InvalidStringCharacter { character: char, line: usize, position: usize },
    #[error("LexError: invalid character {character:?} in number at {line}:{position}")]
    InvalidNumberCharacter { character: char, line: usize, position: usize },
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("ParseError: unexpected {found} at {line}:{position}, expected {}", join_kinds(.expected))]
pub struct ParseError {
    pub line: usize,
    pub position: usize,
    pub found: TokenKind,
    pub expected: Vec<TokenKind>,
}

fn join_kinds(kinds: &[TokenKind]) -> String {
    match kinds {
        [single] => single.to_string(),
        _ => {
            let names: Vec<String> = kinds.iter().map(|k| k.to_string()).collect();
            format!("one of {}", names.join(", "))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EvalErrorKind {
    WrongNumberOfArguments { actual: usize, expected: usize, or_more: bool },
    WrongTypeOfArgument { actual: ValueKind, expected: Vec<ValueKind> },
    UnknownIdentifier(String),
    NotProcedure(ValueKind),
    UserException(String),
    InvalidValue(String),
}

impl fmt::Display for EvalErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EvalErrorKind::WrongNumberOfArguments { actual, expected, or_more } => {
                let qualifier = if *or_more { " or more" } else { "" };
                write!(f, "wrong number of arguments: expected {}{}, got {}", expected, qualifier, actual)
            }
            EvalErrorKind::WrongTypeOfArgument { actual, expected } => {
                let names: Vec<String> = expected.iter().map(|k| k.to_string()).collect();
                write!(f, "wrong type of argument: expected {}, got {}", names.join(" or "), actual)
            }
            EvalErrorKind::UnknownIdentifier(name) => write!(f, "unknown identifier: {}", name),
            EvalErrorKind::NotProcedure(kind) => write!(f, "not a procedure: {}", kind),
            EvalErrorKind::UserException(message) => write!(f, "{}", message),
            EvalErrorKind::InvalidValue(message) => write!(f, "invalid value: {}", message),
        }
    }
}

/// An evaluation failure plus the application sites it unwound through, innermost first.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalError {
    pub kind: EvalErrorKind,
    pub call_stack: Vec<Position>,
}

impl EvalError {
    pub fn new(kind: EvalErrorKind) -> EvalError { EvalError { kind, call_stack: Vec::new() } }

    pub fn at(mut self, position: Position) -> EvalError {
        self.call_stack.push(position);
        self
    }
}

impl std::error::Error for EvalError {}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "EvaluationError: {}", self.kind)?;
        for position in &self.call_stack {
            write!(f, "\n    at {}", position)?;
        }
        Ok(())
    }
}

impl From<EvalErrorKind> for EvalError {
    fn from(kind: EvalErrorKind) -> Self { EvalError::new(kind) }
}

impl From<EvalErrorKind> for Error {
    fn from(kind: EvalErrorKind) -> Self { Error::Eval(EvalError::new(kind)) }
}

impl Error {
    /// The evaluation error kind, when this is an evaluation failure.
    pub fn eval_kind(&self) -> Option<&EvalErrorKind> {
        match self {
            Error::Eval(e) => Some(&e.kind),
            _ => None,
        }
    }

    pub fn at(self, position: Position) -> Error {
        match self {
            Error::Eval(e) => Error::Eval(e.at(position)),
            other => other,
        }
    }
}

#[macro_export]
macro_rules! invalid_value {
    ($($arg:tt)*) => (
        return Err($crate::error::EvalErrorKind::InvalidValue(format!($($arg)*)).into())
    )
}

#[macro_export]
macro_rules! wrong_type {
    ($actual:expr, $($expected:expr),+) => (
        return Err($crate::error::EvalErrorKind::WrongTypeOfArgument {
            actual: $actual.kind(),
            expected: vec![$($expected),+],
        }
        .into())
    )
}

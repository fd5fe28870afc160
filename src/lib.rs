//! An embeddable interpreter for a small Lisp-family language.
//!
//! Source text goes through three stages:
//!
//! ```text
//! tokenize(&str) -> Vec<Token> -> parse(&[Token]) -> Program -> Interpreter::evaluate -> Value
//! ```
//!
//! ```
//! use scheme_rules::{Interpreter, Value};
//!
//! let mut interpreter = Interpreter::new().unwrap();
//! let value = interpreter.run("(define (sq x) (* x x)) (sq 5)").unwrap();
//! assert_eq!(value, Value::Number(25.0));
//! ```
//!
//! A session keeps its global frame between calls, so definitions made by one
//! submission are visible to the next.

pub mod error;
pub mod interpreter;
pub mod reader;

pub use error::{Error, EvalError, EvalErrorKind, LexError, ParseError};
pub use interpreter::datetime::DateTimeValue;
pub use interpreter::output::{BufferOutput, Channel, Output, StdOutput};
pub use interpreter::value::{Procedure, Value, ValueKind};
pub use interpreter::{evaluate, Interpreter, Options};
pub use reader::ast::Program;
pub use reader::lexer::{tokenize, Position, Token, TokenKind};
pub use reader::parser::{parse, parse_with, ParseOptions};

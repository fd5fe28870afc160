pub mod datetime;
pub mod env;
mod eval;
mod host;
pub mod output;
pub mod primitives;
mod printer;
pub mod symbols;
pub mod value;


use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use crate::error::Error;
use crate::interpreter::env::Env;
use crate::interpreter::output::{Output, StdOutput};
use crate::interpreter::symbols::SymbolTable;
use crate::interpreter::value::Value;
use crate::reader::ast::Program;
use crate::reader::lexer::{tokenize, Position};
use crate::reader::parser::{parse_with, ParseOptions};

const PRELUDE: &str = include_str!("prelude.scm");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Evaluate the bundled standard library into each new session.
    pub load_prelude: bool,
    pub parse: ParseOptions,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            load_prelude: true,
            parse: ParseOptions::default(),
        }
    }
}

/// A session: the global frame, the symbol table and the output sink.
pub struct Interpreter {
    global: Rc<RefCell<Env>>,
    symbols: SymbolTable,
    output: Box<dyn Output>,
    options: Options,
    /// Source position of the application being applied.
    site: Position,
}

/// Evaluates `program` in `session`, creating the session first if there is none.
/// The session is left in place for the next call.
pub fn evaluate(program: &Program, session: &mut Option<Interpreter>) -> Result<Value, Error> {
    let interpreter = match session.take() {
        Some(interpreter) => interpreter,
        None => Interpreter::new()?,
    };
    session.insert(interpreter).evaluate(program)
}

impl Interpreter {
    pub fn new() -> Result<Interpreter, Error> { Interpreter::with_options(Options::default()) }

    pub fn with_options(options: Options) -> Result<Interpreter, Error> { Interpreter::with_output(options, Box::new(StdOutput)) }

    pub fn with_output(options: Options, output: Box<dyn Output>) -> Result<Interpreter, Error> {
        let mut interpreter = Interpreter {
            global: Env::new_root(),
            symbols: SymbolTable::new(),
            output,
            options,
            site: Position { line: 1, column: 1 },
        };
        if options.load_prelude {
            interpreter.run(PRELUDE)?;
        }
        debug!(
            "new session with {} global bindings, prelude {}",
            interpreter.global.borrow().values.len(),
            if options.load_prelude { "loaded" } else { "skipped" }
        );
        Ok(interpreter)
    }

    pub fn options(&self) -> &Options { &self.options }

    pub fn global(&self) -> Rc<RefCell<Env>> { self.global.clone() }

    pub fn define(&mut self, name: &str, value: Value) { self.global.borrow_mut().define(name.to_string(), value); }

    pub fn lookup(&self, name: &str) -> Result<Value, Error> { self.global.borrow().lookup(name) }

    pub fn parse(&self, source: &str) -> Result<Program, Error> { parse_with(&tokenize(source)?, &self.options.parse) }

    pub fn evaluate(&mut self, program: &Program) -> Result<Value, Error> {
        debug!(
            "evaluating {} definitions and {} expressions",
            program.definitions.len(),
            program.expressions.len()
        );
        let global = self.global.clone();
        self.eval_program(program, &global)
    }

    pub fn run(&mut self, source: &str) -> Result<Value, Error> {
        let program = self.parse(source)?;
        self.evaluate(&program)
    }

    /// Applies a procedure value, as an application in source would.
    pub fn call(&mut self, procedure: Value, args: Vec<Value>) -> Result<Value, Error> { self.apply(procedure, args) }

    pub fn reset_symbols(&mut self) {
        debug!("dropping {} interned symbols", self.symbols.len());
        self.symbols.reset();
    }
}

//! The tree walker. One arm per syntax node, recursing on the host stack.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;

use crate::error::{Error, EvalErrorKind};
use crate::interpreter::env::Env;
use crate::interpreter::output::Output;
use crate::interpreter::primitives::{self, Host};
use crate::interpreter::symbols::Symbol;
use crate::interpreter::value::{Closure, Procedure, Value};
use crate::interpreter::Interpreter;
use crate::reader::ast::{Body, Datum, Definition, Expr, Program};
use crate::reader::lexer::Position;
use crate::reader::parser::parse_datum;

impl Interpreter {
    pub(crate) fn eval(&mut self, expr: &Expr, env: &Rc<RefCell<Env>>) -> Result<Value, Error> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::String(s) => Ok(Value::String(s.clone())),
            Expr::Boolean(b) => Ok(Value::Boolean(*b)),
            Expr::Identifier(name) => env.borrow().lookup(name),
            Expr::Quote(datum) => Ok(self.quote(datum)),
            Expr::Assignment { name, value } => {
                Env::assign(env, name, || self.eval(value, env))?;
                Ok(Value::Unspecified)
            }
            Expr::Lambda(lambda) => Ok(Value::Procedure(Procedure::User(Rc::new(Closure {
                lambda: lambda.clone(),
                env: env.clone(),
            })))),
            Expr::If {
                predicate,
                consequent,
                alternative,
            } => {
                if self.eval(predicate, env)?.is_truthy() {
                    self.eval(consequent, env)
                } else {
                    match alternative {
                        Some(alternative) => self.eval(alternative, env),
                        None => Ok(Value::Unspecified),
                    }
                }
            }
            Expr::Begin(exprs) => {
                let mut result = Value::Unspecified;
                for expr in exprs {
                    result = self.eval(expr, env)?;
                }
                Ok(result)
            }
            Expr::Application {
                operator,
                operands,
                position,
            } => self.application(operator, operands, *position, env).map_err(|e| e.at(*position)),
        }
    }

    /// Operator first, then operands left to right, then the call.
    fn application(
        &mut self,
        operator: &Expr,
        operands: &[Expr],
        position: Position,
        env: &Rc<RefCell<Env>>,
    ) -> Result<Value, Error> {
        let procedure = self.eval(operator, env)?;
        let mut args = Vec::with_capacity(operands.len());
        for operand in operands {
            args.push(self.eval(operand, env)?);
        }
        self.site = position;
        self.apply(procedure, args)
    }

    pub(crate) fn apply(&mut self, procedure: Value, args: Vec<Value>) -> Result<Value, Error> {
        match procedure {
            Value::Procedure(Procedure::Primitive(op)) => {
                trace!("apply primitive {} to {} args", op.name(), args.len());
                primitives::apply(op, args, self)
            }
            Value::Procedure(Procedure::User(closure)) => {
                trace!("apply closure ({}) to {} args", closure.lambda.params.join(" "), args.len());
                let frame = Env::extend(&closure.env, &closure.lambda.params, args)?;
                self.eval_body(&closure.lambda.body, &frame)
            }
            other => Err(EvalErrorKind::NotProcedure(other.kind()).into()),
        }
    }

    // Internal definitions see each other only through the frame, in order.
    fn eval_body(&mut self, body: &Body, env: &Rc<RefCell<Env>>) -> Result<Value, Error> {
        for definition in &body.definitions {
            self.eval_definition(definition, env)?;
        }
        self.eval(&body.expression, env)
    }

    fn eval_definition(&mut self, definition: &Definition, env: &Rc<RefCell<Env>>) -> Result<Value, Error> {
        let value = self.eval(&definition.value, env)?;
        env.borrow_mut().define(definition.name.clone(), value);
        Ok(Value::Unspecified)
    }

    /// Every definition, then every expression. One expression gives its own
    /// value, none gives Unspecified, several give a ProgramResult.
    pub(crate) fn eval_program(&mut self, program: &Program, env: &Rc<RefCell<Env>>) -> Result<Value, Error> {
        for definition in &program.definitions {
            self.eval_definition(definition, env)?;
        }
        let mut results = Vec::with_capacity(program.expressions.len());
        for expr in &program.expressions {
            results.push(self.eval(expr, env)?);
        }
        Ok(match results.len() {
            0 => Value::Unspecified,
            1 => results.pop().unwrap_or(Value::Unspecified),
            _ => Value::ProgramResult(results),
        })
    }

    fn quote(&mut self, datum: &Datum) -> Value {
        match datum {
            Datum::Number(n) => Value::Number(*n),
            Datum::String(s) => Value::String(s.clone()),
            Datum::Boolean(b) => Value::Boolean(*b),
            Datum::Symbol(name) => Value::Symbol(self.symbols.intern(name)),
            Datum::List(items) => Value::from_vec(items.iter().map(|item| self.quote(item)).collect()),
        }
    }
}

impl Host for Interpreter {
    fn output(&mut self) -> &mut dyn Output { self.output.as_mut() }

    fn intern(&mut self, text: &str) -> Symbol { self.symbols.intern(text) }

    /// Errors raised inside the datum point back at the `eval` call that read it.
    fn eval_datum(&mut self, datum: &Datum) -> Result<Value, Error> {
        trace!("eval {:?} at {}:{}", datum, self.site.line, self.site.column);
        let program = parse_datum(datum, self.site, &self.options.parse)?;
        let global = self.global.clone();
        self.eval_program(&program, &global)
    }
}

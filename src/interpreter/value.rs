use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::interpreter::datetime::DateTimeValue;
use crate::interpreter::env::Env;
use crate::interpreter::primitives::Op;
use crate::interpreter::symbols::Symbol;
use crate::reader::ast::{Datum, Lambda};

#[derive(Clone)]
pub enum Value {
    Number(f64),
    String(String),
    Boolean(bool),
    DateTime(DateTimeValue),
    Pair(Rc<Pair>),
    Nil,
    Unspecified,
    Procedure(Procedure),
    Symbol(Symbol),
    /// Results of a program with several top-level expressions, in order.
    ProgramResult(Vec<Value>),
}

/// A mutable cons cell.
pub struct Pair {
    first: RefCell<Value>,
    second: RefCell<Value>,
}

impl Pair {
    pub fn first(&self) -> Value { self.first.borrow().clone() }

    pub fn second(&self) -> Value { self.second.borrow().clone() }

    pub fn set_first(&self, value: Value) { *self.first.borrow_mut() = value; }

    pub fn set_second(&self, value: Value) { *self.second.borrow_mut() = value; }
}

#[derive(Clone)]
pub enum Procedure {
    User(Rc<Closure>),
    Primitive(Op),
}

/// A lambda together with the frame it was created in.
pub struct Closure {
    pub lambda: Rc<Lambda>,
    pub env: Rc<RefCell<Env>>,
}

impl fmt::Debug for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Procedure::User(ref closure) => write!(f, "#<procedure ({})>", closure.lambda.params.join(" ")),
            Procedure::Primitive(op) => write!(f, "#<primitive {}>", op.name()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Number,
    String,
    Boolean,
    DateTime,
    Pair,
    Nil,
    Unspecified,
    Procedure,
    Symbol,
    ProgramResult,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Boolean => "boolean",
            ValueKind::DateTime => "datetime",
            ValueKind::Pair => "pair",
            ValueKind::Nil => "empty list",
            ValueKind::Unspecified => "unspecified",
            ValueKind::Procedure => "procedure",
            ValueKind::Symbol => "symbol",
            ValueKind::ProgramResult => "program result",
        };
        write!(f, "{}", name)
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::DateTime(_) => ValueKind::DateTime,
            Value::Pair(_) => ValueKind::Pair,
            Value::Nil => ValueKind::Nil,
            Value::Unspecified => ValueKind::Unspecified,
            Value::Procedure(_) => ValueKind::Procedure,
            Value::Symbol(_) => ValueKind::Symbol,
            Value::ProgramResult(_) => ValueKind::ProgramResult,
        }
    }

    /// Everything except `false` counts as true.
    pub fn is_truthy(&self) -> bool { !matches!(self, Value::Boolean(false)) }

    pub fn cons(first: Value, second: Value) -> Value {
        Value::Pair(Rc::new(Pair {
            first: RefCell::new(first),
            second: RefCell::new(second),
        }))
    }

    /// Pairs chained right to left, ending in Nil.
    pub fn from_vec(values: Vec<Value>) -> Value { values.into_iter().rfold(Value::Nil, |acc, val| Value::cons(val, acc)) }

    /// Elements of a proper list; `None` for anything else, improper and cyclic lists included.
    pub fn to_vec(&self) -> Option<Vec<Value>> {
        let mut items = Vec::new();
        let mut current = self.clone();
        // advances at half speed; meeting `current` again means the tail loops
        let mut lagging = self.clone();
        loop {
            let pair = match current {
                Value::Nil => return Some(items),
                Value::Pair(ref pair) => pair.clone(),
                _ => return None,
            };
            items.push(pair.first());
            current = pair.second();
            if items.len() % 2 == 0 {
                lagging = match lagging {
                    Value::Pair(ref pair) => pair.second(),
                    _ => return None,
                };
            }
            if let (Value::Pair(a), Value::Pair(b)) = (&current, &lagging) {
                if Rc::ptr_eq(a, b) {
                    return None;
                }
            }
        }
    }

    /// Quoted-data form of a value: literals, symbols and proper lists of them.
    /// `None` for anything else, including lists that contain themselves.
    pub fn to_datum(&self) -> Option<Datum> { self.datum_within(&mut Vec::new()) }

    fn datum_within(&self, open: &mut Vec<Rc<Pair>>) -> Option<Datum> {
        match self {
            Value::Number(n) => Some(Datum::Number(*n)),
            Value::String(s) => Some(Datum::String(s.clone())),
            Value::Boolean(b) => Some(Datum::Boolean(*b)),
            Value::Symbol(symbol) => Some(Datum::Symbol(symbol.as_str().to_string())),
            Value::Nil => Some(Datum::List(Vec::new())),
            Value::Pair(pair) => {
                if open.iter().any(|outer| Rc::ptr_eq(outer, pair)) {
                    return None;
                }
                open.push(pair.clone());
                let items = self
                    .to_vec()
                    .and_then(|items| items.iter().map(|item| item.datum_within(open)).collect());
                open.pop();
                items.map(Datum::List)
            }
            _ => None,
        }
    }

    /// The equality used by `=`: structural for atoms, identity for pairs and procedures.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Nil, Value::Nil) | (Value::Unspecified, Value::Unspecified) => true,
            (Value::Pair(a), Value::Pair(b)) => Rc::ptr_eq(a, b),
            (Value::Procedure(Procedure::User(a)), Value::Procedure(Procedure::User(b))) => Rc::ptr_eq(a, b),
            (Value::Procedure(Procedure::Primitive(a)), Value::Procedure(Procedure::Primitive(b))) => a == b,
            (Value::ProgramResult(a), Value::ProgramResult(b)) => a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equals(y)),
            _ => false,
        }
    }
}

/// Structural comparison, descending into pairs. Procedures still compare by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Pair(a), Value::Pair(b)) => Rc::ptr_eq(a, b) || (a.first() == b.first() && a.second() == b.second()),
            (Value::ProgramResult(a), Value::ProgramResult(b)) => a == b,
            _ => self.equals(other),
        }
    }
}

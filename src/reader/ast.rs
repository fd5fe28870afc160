//! Syntax tree handed to the evaluator.
//!
//! Only primitive forms appear here: `cond`, `let`, `and`, `or`, `delay`,
//! `cons-stream` and the quote shorthand are rewritten by the parser before a
//! tree is built. Trees are plain data, so a parsed [`Program`] can be cached,
//! serialized and evaluated any number of times.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::reader::lexer::Position;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Program {
    pub definitions: Vec<Definition>,
    pub expressions: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    pub name: String,
    pub value: Expr,
}

/// Internal definitions followed by exactly one expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub definitions: Vec<Definition>,
    pub expression: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lambda {
    pub params: Vec<String>,
    pub body: Body,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Expr {
    Number(f64),
    String(String),
    Boolean(bool),
    Identifier(String),
    Quote(Datum),
    Assignment {
        name: String,
        value: Box<Expr>,
    },
    Lambda(Rc<Lambda>),
    If {
        predicate: Box<Expr>,
        consequent: Box<Expr>,
        alternative: Option<Box<Expr>>,
    },
    Begin(Vec<Expr>),
    Application {
        operator: Box<Expr>,
        operands: Vec<Expr>,
        position: Position,
    },
}

/// Quoted data, kept inert until the evaluator turns it into values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Datum {
    Number(f64),
    String(String),
    Boolean(bool),
    Symbol(String),
    List(Vec<Datum>),
}

impl Expr {
    pub fn if_then(predicate: Expr, consequent: Expr, alternative: Option<Expr>) -> Expr {
        Expr::If {
            predicate: Box::new(predicate),
            consequent: Box::new(consequent),
            alternative: alternative.map(Box::new),
        }
    }

    pub fn lambda(params: Vec<String>, body: Body) -> Expr { Expr::Lambda(Rc::new(Lambda { params, body })) }

    pub fn apply(operator: Expr, operands: Vec<Expr>, position: Position) -> Expr {
        Expr::Application {
            operator: Box::new(operator),
            operands,
            position,
        }
    }
}

impl Body {
    pub fn expression(expression: Expr) -> Body {
        Body {
            definitions: Vec::new(),
            expression,
        }
    }
}

//! Textual form of values.
//!
//! `Display` is what `display` prints: strings raw, unspecified as nothing.
//! `Debug` quotes and escapes strings, so a printed list of data can be read
//! back by the tokenizer, which is what `eval` relies on.

use std::fmt;

use crate::interpreter::value::{Procedure, Value};

/// Nesting deeper than this prints as `...`.
const MAX_DEPTH: usize = 100;
/// Elements printed per list before eliding the rest, so cyclic tails terminate.
const MAX_ITEMS: usize = 10_000;

struct Printer<'a, 'b> {
    f: &'a mut fmt::Formatter<'b>,
    quoted: bool,
}

impl Printer<'_, '_> {
    fn value(&mut self, value: &Value, depth: usize) -> fmt::Result {
        match value {
            Value::Number(n) => write!(self.f, "{}", n),
            Value::String(s) if self.quoted => self.string(s),
            Value::String(s) => write!(self.f, "{}", s),
            Value::Boolean(b) => write!(self.f, "{}", b),
            Value::DateTime(dt) => write!(self.f, "{}", dt),
            Value::Symbol(symbol) => write!(self.f, "{}", symbol.as_str()),
            Value::Nil => write!(self.f, "()"),
            Value::Unspecified => Ok(()),
            Value::Procedure(procedure) => write!(self.f, "{:?}", procedure),
            Value::Pair(_) => self.list(value, depth),
            Value::ProgramResult(results) => {
                let mut first = true;
                for result in results.iter().filter(|r| !matches!(r, Value::Unspecified)) {
                    if !first {
                        writeln!(self.f)?;
                    }
                    first = false;
                    self.value(result, depth)?;
                }
                Ok(())
            }
        }
    }

    fn list(&mut self, value: &Value, depth: usize) -> fmt::Result {
        if depth >= MAX_DEPTH {
            return write!(self.f, "...");
        }
        write!(self.f, "(")?;
        let mut current = value.clone();
        let mut count = 0;
        loop {
            let pair = match current {
                Value::Pair(ref pair) => pair.clone(),
                _ => break,
            };
            if count > 0 {
                write!(self.f, " ")?;
            }
            if count == MAX_ITEMS {
                write!(self.f, "...")?;
                current = Value::Nil;
                break;
            }
            self.value(&pair.first(), depth + 1)?;
            count += 1;
            current = pair.second();
        }
        match current {
            Value::Nil => write!(self.f, ")"),
            tail => {
                write!(self.f, " . ")?;
                self.value(&tail, depth + 1)?;
                write!(self.f, ")")
            }
        }
    }

    fn string(&mut self, s: &str) -> fmt::Result {
        write!(self.f, "\"")?;
        for c in s.chars() {
            match c {
                '"' => write!(self.f, "\\\"")?,
                '\\' => write!(self.f, "\\\\")?,
                '\n' => write!(self.f, "\\n")?,
                '\t' => write!(self.f, "\\t")?,
                '\r' => write!(self.f, "\\r")?,
                c => write!(self.f, "{}", c)?,
            }
        }
        write!(self.f, "\"")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { Printer { f, quoted: false }.value(self, 0) }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Unspecified => write!(f, "#<unspecified>"),
            _ => Printer { f, quoted: true }.value(self, 0),
        }
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "{:?}", self) }
}

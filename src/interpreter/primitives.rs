//! Native procedures.
//!
//! Every built-in is one [`Op`] variant, found by name through [`PRIMITIVES`]
//! and run by the single [`apply`] dispatch. Arity is checked first, and each
//! arm validates all of its argument kinds before it performs any effect, so a
//! malformed call to `display` or `set-car!` changes nothing.

use std::rc::Rc;

use phf::phf_map;

use crate::error::{Error, EvalErrorKind};
use crate::interpreter::datetime;
use crate::interpreter::output::{Channel, Output};
use crate::interpreter::symbols::Symbol;
use crate::interpreter::value::{Pair, Value, ValueKind};
use crate::reader::ast::Datum;
use crate::{invalid_value, wrong_type};

/// What a primitive may ask of the running session.
pub trait Host {
    fn output(&mut self) -> &mut dyn Output;

    fn intern(&mut self, text: &str) -> Symbol;

    /// Evaluate quoted data as a program in the global frame.
    fn eval_datum(&mut self, datum: &Datum) -> Result<Value, Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Rem,

    Gt,
    Ge,
    Lt,
    Le,
    Eq,

    Not,
    Xor,

    Cons,
    Car,
    Cdr,
    SetCar,
    SetCdr,
    List,
    IsNull,

    IsPair,
    IsNumber,
    IsString,
    IsBoolean,
    IsSymbol,
    IsProcedure,
    IsDateTime,

    StringLength,
    Substring,
    StringIndexOf,
    StringReplace,
    StringUpcase,
    StringDowncase,
    NumberToString,
    StringToNumber,
    SymbolToString,
    StringToSymbol,

    Display,
    Debug,
    Trace,
    Newline,

    Error,
    Round,
    Eval,

    Now,
    UtcNow,
    MakeDate,
    MakeDateTime,
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    DayOfWeek,
    DayOfYear,
    AddYears,
    AddMonths,
    AddDays,
    AddHours,
    AddMinutes,
    AddSeconds,
    DaysDiff,
    HoursDiff,
    MinutesDiff,
    SecondsDiff,
    ToUtc,
    ToLocal,
    ParseDateTime,
    FormatDateTime,
}

pub static PRIMITIVES: phf::Map<&'static str, Op> = phf_map! {
    "+" => Op::Add,
    "-" => Op::Sub,
    "*" => Op::Mul,
    "/" => Op::Div,
    "%" => Op::Rem,
    ">" => Op::Gt,
    ">=" => Op::Ge,
    "<" => Op::Lt,
    "<=" => Op::Le,
    "=" => Op::Eq,
    "not" => Op::Not,
    "xor" => Op::Xor,
    "cons" => Op::Cons,
    "car" => Op::Car,
    "cdr" => Op::Cdr,
    "set-car!" => Op::SetCar,
    "set-cdr!" => Op::SetCdr,
    "list" => Op::List,
    "null?" => Op::IsNull,
    "pair?" => Op::IsPair,
    "number?" => Op::IsNumber,
    "string?" => Op::IsString,
    "boolean?" => Op::IsBoolean,
    "symbol?" => Op::IsSymbol,
    "procedure?" => Op::IsProcedure,
    "datetime?" => Op::IsDateTime,
    "string-length" => Op::StringLength,
    "substring" => Op::Substring,
    "string-index-of" => Op::StringIndexOf,
    "string-replace" => Op::StringReplace,
    "string-upcase" => Op::StringUpcase,
    "string-downcase" => Op::StringDowncase,
    "number->string" => Op::NumberToString,
    "string->number" => Op::StringToNumber,
    "symbol->string" => Op::SymbolToString,
    "string->symbol" => Op::StringToSymbol,
    "display" => Op::Display,
    "debug" => Op::Debug,
    "trace" => Op::Trace,
    "newline" => Op::Newline,
    "error" => Op::Error,
    "round" => Op::Round,
    "eval" => Op::Eval,
    "now" => Op::Now,
    "utc-now" => Op::UtcNow,
    "make-date" => Op::MakeDate,
    "make-datetime" => Op::MakeDateTime,
    "year" => Op::Year,
    "month" => Op::Month,
    "day" => Op::Day,
    "hour" => Op::Hour,
    "minute" => Op::Minute,
    "second" => Op::Second,
    "day-of-week" => Op::DayOfWeek,
    "day-of-year" => Op::DayOfYear,
    "add-years" => Op::AddYears,
    "add-months" => Op::AddMonths,
    "add-days" => Op::AddDays,
    "add-hours" => Op::AddHours,
    "add-minutes" => Op::AddMinutes,
    "add-seconds" => Op::AddSeconds,
    "days-diff" => Op::DaysDiff,
    "hours-diff" => Op::HoursDiff,
    "minutes-diff" => Op::MinutesDiff,
    "seconds-diff" => Op::SecondsDiff,
    "to-utc" => Op::ToUtc,
    "to-local" => Op::ToLocal,
    "parse-datetime" => Op::ParseDateTime,
    "format-datetime" => Op::FormatDateTime,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn check(self, actual: usize) -> Result<(), Error> {
        let (expected, or_more, ok) = match self {
            Arity::Exact(n) => (n, false, actual == n),
            Arity::AtLeast(n) => (n, true, actual >= n),
        };
        match ok {
            true => Ok(()),
            false => Err(EvalErrorKind::WrongNumberOfArguments { actual, expected, or_more }.into()),
        }
    }
}

impl Op {
    pub fn name(self) -> &'static str {
        PRIMITIVES
            .entries()
            .find(|(_, op)| **op == self)
            .map_or("?", |(name, _)| *name)
    }

    pub fn arity(self) -> Arity {
        match self {
            Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Rem => Arity::AtLeast(1),
            Op::List => Arity::AtLeast(0),
            Op::Now | Op::UtcNow | Op::Newline => Arity::Exact(0),
            Op::Not
            | Op::Car
            | Op::Cdr
            | Op::IsNull
            | Op::IsPair
            | Op::IsNumber
            | Op::IsString
            | Op::IsBoolean
            | Op::IsSymbol
            | Op::IsProcedure
            | Op::IsDateTime
            | Op::StringLength
            | Op::StringUpcase
            | Op::StringDowncase
            | Op::NumberToString
            | Op::StringToNumber
            | Op::SymbolToString
            | Op::StringToSymbol
            | Op::Display
            | Op::Debug
            | Op::Trace
            | Op::Error
            | Op::Eval
            | Op::Year
            | Op::Month
            | Op::Day
            | Op::Hour
            | Op::Minute
            | Op::Second
            | Op::DayOfWeek
            | Op::DayOfYear
            | Op::ToUtc
            | Op::ToLocal => Arity::Exact(1),
            Op::Gt
            | Op::Ge
            | Op::Lt
            | Op::Le
            | Op::Eq
            | Op::Xor
            | Op::Cons
            | Op::SetCar
            | Op::SetCdr
            | Op::StringIndexOf
            | Op::Round
            | Op::AddYears
            | Op::AddMonths
            | Op::AddDays
            | Op::AddHours
            | Op::AddMinutes
            | Op::AddSeconds
            | Op::DaysDiff
            | Op::HoursDiff
            | Op::MinutesDiff
            | Op::SecondsDiff
            | Op::ParseDateTime
            | Op::FormatDateTime => Arity::Exact(2),
            Op::Substring | Op::StringReplace | Op::MakeDate => Arity::Exact(3),
            Op::MakeDateTime => Arity::Exact(6),
        }
    }
}

pub fn apply(op: Op, args: Vec<Value>, host: &mut dyn Host) -> Result<Value, Error> {
    op.arity().check(args.len())?;
    match op {
        Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Rem => arithmetic(op, &args),
        Op::Gt | Op::Ge | Op::Lt | Op::Le => compare(op, &args[0], &args[1]).map(Value::Boolean),
        Op::Eq => Ok(Value::Boolean(args[0].equals(&args[1]))),

        Op::Not => Ok(Value::Boolean(!args[0].is_truthy())),
        Op::Xor => Ok(Value::Boolean(args[0].is_truthy() != args[1].is_truthy())),

        Op::Cons => Ok(Value::cons(args[0].clone(), args[1].clone())),
        Op::Car => Ok(pair(&args[0])?.first()),
        Op::Cdr => Ok(pair(&args[0])?.second()),
        Op::SetCar => {
            pair(&args[0])?.set_first(args[1].clone());
            Ok(Value::Unspecified)
        }
        Op::SetCdr => {
            pair(&args[0])?.set_second(args[1].clone());
            Ok(Value::Unspecified)
        }
        Op::List => Ok(Value::from_vec(args)),
        Op::IsNull => Ok(Value::Boolean(matches!(args[0], Value::Nil))),

        Op::IsPair => Ok(Value::Boolean(args[0].kind() == ValueKind::Pair)),
        Op::IsNumber => Ok(Value::Boolean(args[0].kind() == ValueKind::Number)),
        Op::IsString => Ok(Value::Boolean(args[0].kind() == ValueKind::String)),
        Op::IsBoolean => Ok(Value::Boolean(args[0].kind() == ValueKind::Boolean)),
        Op::IsSymbol => Ok(Value::Boolean(args[0].kind() == ValueKind::Symbol)),
        Op::IsProcedure => Ok(Value::Boolean(args[0].kind() == ValueKind::Procedure)),
        Op::IsDateTime => Ok(Value::Boolean(args[0].kind() == ValueKind::DateTime)),

        Op::StringLength => Ok(Value::Number(string(&args[0])?.chars().count() as f64)),
        Op::Substring => substring(string(&args[0])?, &args[1], &args[2]),
        Op::StringIndexOf => {
            let (haystack, needle) = (string(&args[0])?, string(&args[1])?);
            let index = match haystack.find(needle) {
                Some(byte_index) => haystack[..byte_index].chars().count() as f64,
                None => -1.0,
            };
            Ok(Value::Number(index))
        }
        Op::StringReplace => {
            let (text, from, to) = (string(&args[0])?, string(&args[1])?, string(&args[2])?);
            if from.is_empty() {
                invalid_value!("string-replace: the text to replace must not be empty");
            }
            Ok(Value::String(text.replace(from, to)))
        }
        Op::StringUpcase => Ok(Value::String(string(&args[0])?.to_uppercase())),
        Op::StringDowncase => Ok(Value::String(string(&args[0])?.to_lowercase())),
        Op::NumberToString => Ok(Value::String(number(&args[0])?.to_string())),
        Op::StringToNumber => {
            let text = string(&args[0])?;
            match text.trim().parse::<f64>() {
                Ok(n) => Ok(Value::Number(n)),
                Err(_) => invalid_value!("string->number: {:?} is not a number", text),
            }
        }
        Op::SymbolToString => match &args[0] {
            Value::Symbol(symbol) => Ok(Value::String(symbol.as_str().to_string())),
            other => wrong_type!(other, ValueKind::Symbol),
        },
        Op::StringToSymbol => {
            let text = string(&args[0])?;
            Ok(Value::Symbol(host.intern(text)))
        }

        Op::Display => write(host, Channel::Standard, &args[0]),
        Op::Debug => write(host, Channel::Debug, &args[0]),
        Op::Trace => write(host, Channel::Trace, &args[0]),
        Op::Newline => {
            host.output().write(Channel::Standard, "\n");
            Ok(Value::Unspecified)
        }

        Op::Error => {
            let message = match &args[0] {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Err(EvalErrorKind::UserException(message).into())
        }
        Op::Round => round(&args[0], &args[1]),
        Op::Eval => match (&args[0], args[0].to_datum()) {
            (Value::Symbol(_) | Value::Pair(_), Some(datum)) => host.eval_datum(&datum),
            _ => wrong_type!(args[0], ValueKind::Symbol, ValueKind::Pair),
        },

        Op::Now
        | Op::UtcNow
        | Op::MakeDate
        | Op::MakeDateTime
        | Op::Year
        | Op::Month
        | Op::Day
        | Op::Hour
        | Op::Minute
        | Op::Second
        | Op::DayOfWeek
        | Op::DayOfYear
        | Op::AddYears
        | Op::AddMonths
        | Op::AddDays
        | Op::AddHours
        | Op::AddMinutes
        | Op::AddSeconds
        | Op::DaysDiff
        | Op::HoursDiff
        | Op::MinutesDiff
        | Op::SecondsDiff
        | Op::ToUtc
        | Op::ToLocal
        | Op::ParseDateTime
        | Op::FormatDateTime => datetime::apply(op, &args),
    }
}

pub(crate) fn number(value: &Value) -> Result<f64, Error> {
    match value {
        Value::Number(n) => Ok(*n),
        other => wrong_type!(other, ValueKind::Number),
    }
}

pub(crate) fn string(value: &Value) -> Result<&str, Error> {
    match value {
        Value::String(s) => Ok(s),
        other => wrong_type!(other, ValueKind::String),
    }
}

/// A number with no fractional part.
pub(crate) fn integer(value: &Value) -> Result<i64, Error> {
    let n = number(value)?;
    if n.fract() != 0.0 || !n.is_finite() || n.abs() > 9.0e15 {
        invalid_value!("expected an integer, got {}", n);
    }
    Ok(n as i64)
}

fn index(value: &Value) -> Result<usize, Error> {
    let n = integer(value)?;
    match usize::try_from(n) {
        Ok(i) => Ok(i),
        Err(_) => invalid_value!("expected a non-negative index, got {}", n),
    }
}

fn pair(value: &Value) -> Result<&Rc<Pair>, Error> {
    match value {
        Value::Pair(p) => Ok(p),
        other => wrong_type!(other, ValueKind::Pair),
    }
}

fn arithmetic(op: Op, args: &[Value]) -> Result<Value, Error> {
    if let (Op::Add, Value::String(first)) = (op, &args[0]) {
        let rest = args[1..].iter().map(string).collect::<Result<Vec<&str>, Error>>()?;
        let mut text = first.clone();
        rest.into_iter().for_each(|s| text.push_str(s));
        return Ok(Value::String(text));
    }
    let numbers = args.iter().map(number).collect::<Result<Vec<f64>, Error>>()?;
    // arity is checked before dispatch, so there is a first operand
    let result = numbers[1..].iter().fold(numbers[0], |acc, n| match op {
        Op::Add => acc + n,
        Op::Sub => acc - n,
        Op::Mul => acc * n,
        Op::Div => acc / n,
        _ => acc % n,
    });
    Ok(Value::Number(result))
}

fn compare(op: Op, left: &Value, right: &Value) -> Result<bool, Error> {
    let ordering = match (left, right) {
        (Value::Number(a), Value::Number(b)) => {
            return Ok(match op {
                Op::Gt => a > b,
                Op::Ge => a >= b,
                Op::Lt => a < b,
                _ => a <= b,
            })
        }
        (Value::DateTime(a), Value::DateTime(b)) => a.compare(b)?,
        (Value::Number(_), other) => wrong_type!(other, ValueKind::Number),
        (Value::DateTime(_), other) => wrong_type!(other, ValueKind::DateTime),
        (other, _) => wrong_type!(other, ValueKind::Number, ValueKind::DateTime),
    };
    Ok(match op {
        Op::Gt => ordering.is_gt(),
        Op::Ge => ordering.is_ge(),
        Op::Lt => ordering.is_lt(),
        _ => ordering.is_le(),
    })
}

fn substring(text: &str, start: &Value, length: &Value) -> Result<Value, Error> {
    let (start, length) = (index(start)?, index(length)?);
    let count = text.chars().count();
    if start > count || length > count - start {
        invalid_value!("substring: start {} and length {} out of range for a string of length {}", start, length, count);
    }
    Ok(Value::String(text.chars().skip(start).take(length).collect()))
}

fn write(host: &mut dyn Host, channel: Channel, value: &Value) -> Result<Value, Error> {
    let text = value.to_string();
    host.output().write(channel, &text);
    Ok(Value::Unspecified)
}

/// Rounds half away from zero to `digits` decimals.
fn round(value: &Value, digits: &Value) -> Result<Value, Error> {
    let x = number(value)?;
    let digits = integer(digits)?;
    if !(0..=15).contains(&digits) {
        invalid_value!("round: digits must be between 0 and 15, got {}", digits);
    }
    let factor = 10f64.powi(digits as i32);
    let rounded = (x * factor).round() / factor;
    // scaling can overflow for huge inputs, which are already integral
    Ok(Value::Number(if rounded.is_finite() { rounded } else { x }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::output::BufferOutput;
    use crate::interpreter::symbols::SymbolTable;
    use pretty_assertions::assert_eq;

    struct TestHost {
        output: BufferOutput,
        symbols: SymbolTable,
        evaluated: Vec<Datum>,
    }

    impl TestHost {
        fn new() -> TestHost {
            TestHost {
                output: BufferOutput::new(),
                symbols: SymbolTable::new(),
                evaluated: Vec::new(),
            }
        }
    }

    impl Host for TestHost {
        fn output(&mut self) -> &mut dyn Output { &mut self.output }

        fn intern(&mut self, text: &str) -> Symbol { self.symbols.intern(text) }

        fn eval_datum(&mut self, datum: &Datum) -> Result<Value, Error> {
            self.evaluated.push(datum.clone());
            Ok(Value::Number(42.0))
        }
    }

    fn call(op: Op, args: Vec<Value>) -> Result<Value, Error> { apply(op, args, &mut TestHost::new()) }

    fn num(n: f64) -> Value { Value::Number(n) }

    fn text(s: &str) -> Value { Value::String(s.to_string()) }

    fn kind_of(result: Result<Value, Error>) -> EvalErrorKind {
        match result {
            Err(Error::Eval(e)) => e.kind,
            other => panic!("expected evaluation error, got {:?}", other),
        }
    }

    #[test]
    fn test_every_op_has_a_name() {
        for (name, op) in PRIMITIVES.entries() {
            assert_eq!(op.name(), *name);
        }
        assert!(PRIMITIVES.len() >= 60);
    }

    #[test]
    fn test_arithmetic_folds_left() {
        assert_eq!(call(Op::Add, vec![num(1.0), num(2.0), num(3.0)]).unwrap(), num(6.0));
        assert_eq!(call(Op::Sub, vec![num(10.0), num(3.0), num(2.0)]).unwrap(), num(5.0));
        assert_eq!(call(Op::Sub, vec![num(5.0)]).unwrap(), num(5.0));
        assert_eq!(call(Op::Div, vec![num(12.0), num(3.0), num(2.0)]).unwrap(), num(2.0));
        assert_eq!(call(Op::Rem, vec![num(7.0), num(4.0)]).unwrap(), num(3.0));
        assert_eq!(call(Op::Mul, vec![num(2.0), num(3.0), num(4.0)]).unwrap(), num(24.0));
    }

    #[test]
    fn test_arithmetic_errors() {
        assert_eq!(
            kind_of(call(Op::Add, vec![])),
            EvalErrorKind::WrongNumberOfArguments {
                actual: 0,
                expected: 1,
                or_more: true
            }
        );
        assert_eq!(
            kind_of(call(Op::Add, vec![num(1.0), text("a")])),
            EvalErrorKind::WrongTypeOfArgument {
                actual: ValueKind::String,
                expected: vec![ValueKind::Number]
            }
        );
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(call(Op::Add, vec![text("ab"), text("cd"), text("e")]).unwrap(), text("abcde"));
        assert_eq!(
            kind_of(call(Op::Add, vec![text("ab"), num(1.0)])),
            EvalErrorKind::WrongTypeOfArgument {
                actual: ValueKind::Number,
                expected: vec![ValueKind::String]
            }
        );
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(call(Op::Gt, vec![num(2.0), num(1.0)]).unwrap(), Value::Boolean(true));
        assert_eq!(call(Op::Le, vec![num(2.0), num(2.0)]).unwrap(), Value::Boolean(true));
        assert_eq!(call(Op::Lt, vec![num(f64::NAN), num(1.0)]).unwrap(), Value::Boolean(false));
        assert_eq!(
            kind_of(call(Op::Lt, vec![text("a"), num(1.0)])),
            EvalErrorKind::WrongTypeOfArgument {
                actual: ValueKind::String,
                expected: vec![ValueKind::Number, ValueKind::DateTime]
            }
        );
        assert!(matches!(
            kind_of(call(Op::Lt, vec![num(1.0)])),
            EvalErrorKind::WrongNumberOfArguments { actual: 1, expected: 2, or_more: false }
        ));
    }

    #[test]
    fn test_equality() {
        let list = Value::from_vec(vec![num(1.0)]);
        assert_eq!(call(Op::Eq, vec![num(1.0), num(1.0)]).unwrap(), Value::Boolean(true));
        assert_eq!(call(Op::Eq, vec![text("a"), text("a")]).unwrap(), Value::Boolean(true));
        assert_eq!(call(Op::Eq, vec![num(1.0), text("1")]).unwrap(), Value::Boolean(false));
        assert_eq!(call(Op::Eq, vec![list.clone(), list.clone()]).unwrap(), Value::Boolean(true));
        assert_eq!(
            call(Op::Eq, vec![list, Value::from_vec(vec![num(1.0)])]).unwrap(),
            Value::Boolean(false)
        );
        assert_eq!(call(Op::Eq, vec![Value::Nil, Value::Nil]).unwrap(), Value::Boolean(true));
    }

    #[test]
    fn test_logic_uses_truthiness() {
        assert_eq!(call(Op::Not, vec![num(0.0)]).unwrap(), Value::Boolean(false));
        assert_eq!(call(Op::Not, vec![Value::Boolean(false)]).unwrap(), Value::Boolean(true));
        assert_eq!(call(Op::Xor, vec![Value::Nil, Value::Boolean(false)]).unwrap(), Value::Boolean(true));
        assert_eq!(call(Op::Xor, vec![num(1.0), text("")]).unwrap(), Value::Boolean(false));
    }

    #[test]
    fn test_pairs() {
        let p = call(Op::Cons, vec![num(1.0), num(2.0)]).unwrap();
        assert_eq!(call(Op::Car, vec![p.clone()]).unwrap(), num(1.0));
        assert_eq!(call(Op::Cdr, vec![p.clone()]).unwrap(), num(2.0));
        call(Op::SetCar, vec![p.clone(), num(10.0)]).unwrap();
        call(Op::SetCdr, vec![p.clone(), Value::Nil]).unwrap();
        assert_eq!(p, Value::from_vec(vec![num(10.0)]));
        assert_eq!(
            kind_of(call(Op::Car, vec![Value::Nil])),
            EvalErrorKind::WrongTypeOfArgument {
                actual: ValueKind::Nil,
                expected: vec![ValueKind::Pair]
            }
        );
        assert_eq!(call(Op::List, vec![]).unwrap(), Value::Nil);
        assert_eq!(call(Op::IsNull, vec![Value::Nil]).unwrap(), Value::Boolean(true));
        assert_eq!(call(Op::IsNull, vec![num(0.0)]).unwrap(), Value::Boolean(false));
    }

    #[test]
    fn test_strings() {
        assert_eq!(call(Op::StringLength, vec![text("héllo")]).unwrap(), num(5.0));
        assert_eq!(call(Op::Substring, vec![text("héllo"), num(1.0), num(3.0)]).unwrap(), text("éll"));
        assert_eq!(call(Op::Substring, vec![text("abc"), num(3.0), num(0.0)]).unwrap(), text(""));
        assert!(matches!(
            kind_of(call(Op::Substring, vec![text("abc"), num(2.0), num(2.0)])),
            EvalErrorKind::InvalidValue(_)
        ));
        assert!(matches!(
            kind_of(call(Op::Substring, vec![text("abc"), num(-1.0), num(1.0)])),
            EvalErrorKind::InvalidValue(_)
        ));
        assert_eq!(call(Op::StringIndexOf, vec![text("héllo"), text("l")]).unwrap(), num(2.0));
        assert_eq!(call(Op::StringIndexOf, vec![text("abc"), text("z")]).unwrap(), num(-1.0));
        assert_eq!(
            call(Op::StringReplace, vec![text("a-b-c"), text("-"), text("+")]).unwrap(),
            text("a+b+c")
        );
        assert!(matches!(
            kind_of(call(Op::StringReplace, vec![text("abc"), text(""), text("x")])),
            EvalErrorKind::InvalidValue(_)
        ));
        assert_eq!(call(Op::StringUpcase, vec![text("abc")]).unwrap(), text("ABC"));
        assert_eq!(call(Op::StringDowncase, vec![text("ABC")]).unwrap(), text("abc"));
        assert_eq!(call(Op::NumberToString, vec![num(2.5)]).unwrap(), text("2.5"));
        assert_eq!(call(Op::StringToNumber, vec![text(" 42 ")]).unwrap(), num(42.0));
        assert!(matches!(
            kind_of(call(Op::StringToNumber, vec![text("4x")])),
            EvalErrorKind::InvalidValue(_)
        ));
    }

    #[test]
    fn test_display_writes_standard_channel() {
        let mut host = TestHost::new();
        apply(Op::Display, vec![text("hi")], &mut host).unwrap();
        apply(Op::Newline, vec![], &mut host).unwrap();
        apply(Op::Debug, vec![num(1.0)], &mut host).unwrap();
        apply(Op::Trace, vec![Value::Boolean(true)], &mut host).unwrap();
        assert_eq!(host.output.standard(), "hi\n");
        assert_eq!(host.output.debug(), "1");
        assert_eq!(host.output.trace(), "true");
    }

    #[test]
    fn test_malformed_display_has_no_effect() {
        let mut host = TestHost::new();
        let result = apply(Op::Display, vec![text("a"), text("b")], &mut host);
        assert!(result.is_err());
        assert_eq!(host.output.standard(), "");
    }

    #[test]
    fn test_malformed_set_car_has_no_effect() {
        let p = Value::cons(num(1.0), num(2.0));
        assert!(call(Op::SetCar, vec![p.clone(), num(3.0), num(4.0)]).is_err());
        assert!(call(Op::SetCar, vec![num(3.0), p.clone()]).is_err());
        assert_eq!(p, Value::cons(num(1.0), num(2.0)));
    }

    #[test]
    fn test_error_message() {
        assert_eq!(kind_of(call(Op::Error, vec![text("boom")])), EvalErrorKind::UserException("boom".into()));
        assert_eq!(kind_of(call(Op::Error, vec![num(1234.5)])), EvalErrorKind::UserException("1234.5".into()));
    }

    #[test]
    fn test_round_away_from_zero() {
        assert_eq!(call(Op::Round, vec![num(2.5), num(0.0)]).unwrap(), num(3.0));
        assert_eq!(call(Op::Round, vec![num(-2.5), num(0.0)]).unwrap(), num(-3.0));
        assert_eq!(call(Op::Round, vec![num(1.2345), num(2.0)]).unwrap(), num(1.23));
        assert!(matches!(
            kind_of(call(Op::Round, vec![num(1.0), num(1.5)])),
            EvalErrorKind::InvalidValue(_)
        ));
    }

    #[test]
    fn test_eval_argument_checks() {
        let mut host = TestHost::new();
        let plus = Value::Symbol(host.intern("+"));
        let form = Value::from_vec(vec![plus, num(1.0), num(2.0)]);
        assert_eq!(apply(Op::Eval, vec![form], &mut host).unwrap(), num(42.0));
        assert_eq!(
            host.evaluated,
            vec![Datum::List(vec![
                Datum::Symbol("+".to_string()),
                Datum::Number(1.0),
                Datum::Number(2.0)
            ])]
        );
        assert!(matches!(
            kind_of(apply(Op::Eval, vec![num(1.0)], &mut host)),
            EvalErrorKind::WrongTypeOfArgument { .. }
        ));
        let improper = Value::cons(Value::Symbol(host.intern("a")), num(1.0));
        assert!(apply(Op::Eval, vec![improper], &mut host).is_err());
        assert_eq!(host.evaluated.len(), 1);
    }

    #[test]
    fn test_eval_symbol_is_passed_as_one_name() {
        let mut host = TestHost::new();
        let odd = Value::Symbol(host.intern("(display 99)"));
        apply(Op::Eval, vec![odd], &mut host).unwrap();
        assert_eq!(host.evaluated, vec![Datum::Symbol("(display 99)".to_string())]);
    }

    #[test]
    fn test_eval_rejects_self_containing_list() {
        let mut host = TestHost::new();
        let form = Value::from_vec(vec![num(1.0)]);
        if let Value::Pair(ref pair) = form {
            pair.set_first(form.clone());
        }
        assert!(matches!(
            kind_of(apply(Op::Eval, vec![form.clone()], &mut host)),
            EvalErrorKind::WrongTypeOfArgument { .. }
        ));
        assert!(host.evaluated.is_empty());
        if let Value::Pair(ref pair) = form {
            pair.set_first(Value::Nil);
        }
    }
}

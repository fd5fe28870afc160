//! Conversions between `Value` and plain Rust types for embedding hosts.

use crate::error::{Error, EvalErrorKind};
use crate::interpreter::datetime::DateTimeValue;
use crate::interpreter::value::{Value, ValueKind};

fn mismatch(actual: &Value, expected: ValueKind) -> Error {
    EvalErrorKind::WrongTypeOfArgument {
        actual: actual.kind(),
        expected: vec![expected],
    }
    .into()
}

impl TryFrom<Value> for f64 {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Number(n) => Ok(n),
            other => Err(mismatch(&other, ValueKind::Number)),
        }
    }
}

impl TryFrom<Value> for String {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(mismatch(&other, ValueKind::String)),
        }
    }
}

impl TryFrom<Value> for bool {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Boolean(b) => Ok(b),
            other => Err(mismatch(&other, ValueKind::Boolean)),
        }
    }
}

impl TryFrom<Value> for DateTimeValue {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::DateTime(dt) => Ok(dt),
            other => Err(mismatch(&other, ValueKind::DateTime)),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self { Value::Number(n) }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self { Value::Boolean(b) }
}

impl From<String> for Value {
    fn from(s: String) -> Self { Value::String(s) }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self { Value::String(s.to_string()) }
}

impl From<DateTimeValue> for Value {
    fn from(dt: DateTimeValue) -> Self { Value::DateTime(dt) }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self { Value::from_vec(items.into_iter().map(Into::into).collect()) }
}

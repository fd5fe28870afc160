//! Calendar values and the date/time primitives, on top of chrono.
//!
//! A datetime is a naive wall-clock reading tagged with its kind. Local values
//! are interpreted in the host time zone only when converted with `to-utc`;
//! every other operation works on the wall-clock fields directly. Mixing the
//! two kinds in one operation is an invalid value.

use std::cmp::Ordering;
use std::fmt::{self, Write};

use chrono::format::{Item, StrftimeItems};
use chrono::{Datelike, Duration, Local, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};

use crate::error::Error;
use crate::interpreter::primitives::{integer, number, string, Op};
use crate::interpreter::value::{Value, ValueKind};
use crate::{invalid_value, wrong_type};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateTimeValue {
    Local(NaiveDateTime),
    Utc(NaiveDateTime),
}

impl DateTimeValue {
    pub fn naive(&self) -> NaiveDateTime {
        match *self {
            DateTimeValue::Local(dt) | DateTimeValue::Utc(dt) => dt,
        }
    }

    pub fn is_utc(&self) -> bool { matches!(self, DateTimeValue::Utc(_)) }

    fn with(&self, dt: NaiveDateTime) -> DateTimeValue {
        match self {
            DateTimeValue::Local(_) => DateTimeValue::Local(dt),
            DateTimeValue::Utc(_) => DateTimeValue::Utc(dt),
        }
    }

    /// Orders two values of the same kind.
    pub fn compare(&self, other: &DateTimeValue) -> Result<Ordering, Error> {
        same_kind(self, other)?;
        Ok(self.naive().cmp(&other.naive()))
    }
}

impl fmt::Display for DateTimeValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.naive().format("%Y-%m-%dT%H:%M:%S%.f"))?;
        if self.is_utc() {
            write!(f, "Z")?;
        }
        Ok(())
    }
}

fn same_kind(a: &DateTimeValue, b: &DateTimeValue) -> Result<(), Error> {
    if a.is_utc() != b.is_utc() {
        invalid_value!("cannot mix local and UTC datetimes ({} and {})", a, b);
    }
    Ok(())
}

fn datetime(value: &Value) -> Result<DateTimeValue, Error> {
    match value {
        Value::DateTime(dt) => Ok(*dt),
        other => wrong_type!(other, ValueKind::DateTime),
    }
}

fn component(value: &Value, what: &str) -> Result<u32, Error> {
    let n = integer(value)?;
    match u32::try_from(n) {
        Ok(n) => Ok(n),
        Err(_) => invalid_value!("{} must not be negative, got {}", what, n),
    }
}

fn make(year: &Value, month: &Value, day: &Value, time: [&Value; 3]) -> Result<Value, Error> {
    let year = integer(year)?;
    let (month, day) = (component(month, "month")?, component(day, "day")?);
    let (hour, minute, second) = (component(time[0], "hour")?, component(time[1], "minute")?, component(time[2], "second")?);
    let date = i32::try_from(year)
        .ok()
        .and_then(|year| NaiveDate::from_ymd_opt(year, month, day));
    let dt = match date.and_then(|date| date.and_hms_opt(hour, minute, second)) {
        Some(dt) => dt,
        None => invalid_value!(
            "no such date and time: {}-{}-{} {}:{}:{}",
            year,
            month,
            day,
            hour,
            minute,
            second
        ),
    };
    Ok(Value::DateTime(DateTimeValue::Local(dt)))
}

fn add_months(dt: DateTimeValue, months: i64) -> Result<Value, Error> {
    let naive = dt.naive();
    let shifted = match u32::try_from(months.unsigned_abs()) {
        Ok(n) if months >= 0 => naive.checked_add_months(Months::new(n)),
        Ok(n) => naive.checked_sub_months(Months::new(n)),
        Err(_) => None,
    };
    match shifted {
        Some(result) => Ok(Value::DateTime(dt.with(result))),
        None => invalid_value!("adding {} months to {} is out of range", months, dt),
    }
}

/// Adds a possibly fractional amount of `unit_ms` milliseconds.
fn add_duration(dt: DateTimeValue, amount: f64, unit_ms: f64) -> Result<Value, Error> {
    let ms = (amount * unit_ms).round();
    if !ms.is_finite() || ms.abs() > 9.0e15 {
        invalid_value!("duration {} is out of range", amount);
    }
    match dt.naive().checked_add_signed(Duration::milliseconds(ms as i64)) {
        Some(result) => Ok(Value::DateTime(dt.with(result))),
        None => invalid_value!("adding {} to {} is out of range", amount, dt),
    }
}

/// `to - from`, in units of `unit_ms` milliseconds.
fn difference(from: &Value, to: &Value, unit_ms: f64) -> Result<Value, Error> {
    let (from, to) = (datetime(from)?, datetime(to)?);
    same_kind(&from, &to)?;
    let delta = to.naive().signed_duration_since(from.naive());
    Ok(Value::Number(delta.num_milliseconds() as f64 / unit_ms))
}

fn to_utc(dt: DateTimeValue) -> Result<Value, Error> {
    let naive = match dt {
        DateTimeValue::Local(naive) => naive,
        DateTimeValue::Utc(_) => invalid_value!("{} is already UTC", dt),
    };
    match Local.from_local_datetime(&naive).single() {
        Some(local) => Ok(Value::DateTime(DateTimeValue::Utc(local.naive_utc()))),
        None => invalid_value!("{} is ambiguous or skipped in the local time zone", dt),
    }
}

fn to_local(dt: DateTimeValue) -> Result<Value, Error> {
    match dt {
        DateTimeValue::Utc(naive) => Ok(Value::DateTime(DateTimeValue::Local(
            Utc.from_utc_datetime(&naive).with_timezone(&Local).naive_local(),
        ))),
        DateTimeValue::Local(_) => invalid_value!("{} is already local", dt),
    }
}

fn items(format: &str) -> Result<Vec<Item<'_>>, Error> {
    let items: Vec<Item> = StrftimeItems::new(format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        invalid_value!("invalid datetime format {:?}", format);
    }
    Ok(items)
}

fn parse_datetime(text: &str, format: &str) -> Result<Value, Error> {
    items(format)?;
    let parsed = NaiveDateTime::parse_from_str(text, format)
        .or_else(|_| NaiveDate::parse_from_str(text, format).map(|date| date.and_time(NaiveTime::MIN)));
    match parsed {
        Ok(dt) => Ok(Value::DateTime(DateTimeValue::Local(dt))),
        Err(e) => invalid_value!("cannot parse {:?} with format {:?}: {}", text, format, e),
    }
}

fn format_datetime(dt: DateTimeValue, format: &str) -> Result<Value, Error> {
    let items = items(format)?;
    let mut text = String::new();
    if write!(text, "{}", dt.naive().format_with_items(items.into_iter())).is_err() {
        invalid_value!("format {:?} does not apply to {}", format, dt);
    }
    Ok(Value::String(text))
}

const SECOND_MS: f64 = 1_000.0;
const MINUTE_MS: f64 = 60.0 * SECOND_MS;
const HOUR_MS: f64 = 60.0 * MINUTE_MS;
const DAY_MS: f64 = 24.0 * HOUR_MS;

/// Runs a date/time operation. Arity has already been checked by the caller.
pub(crate) fn apply(op: Op, args: &[Value]) -> Result<Value, Error> {
    let field = |f: fn(&NaiveDateTime) -> u32| -> Result<Value, Error> { Ok(Value::Number(f64::from(f(&datetime(&args[0])?.naive())))) };
    match op {
        Op::Now => Ok(Value::DateTime(DateTimeValue::Local(Local::now().naive_local()))),
        Op::UtcNow => Ok(Value::DateTime(DateTimeValue::Utc(Utc::now().naive_utc()))),
        Op::MakeDate => {
            let zero = Value::Number(0.0);
            make(&args[0], &args[1], &args[2], [&zero, &zero, &zero])
        }
        Op::MakeDateTime => make(&args[0], &args[1], &args[2], [&args[3], &args[4], &args[5]]),

        Op::Year => Ok(Value::Number(f64::from(datetime(&args[0])?.naive().year()))),
        Op::Month => field(|dt| dt.month()),
        Op::Day => field(|dt| dt.day()),
        Op::Hour => field(|dt| dt.hour()),
        Op::Minute => field(|dt| dt.minute()),
        Op::Second => field(|dt| dt.second()),
        Op::DayOfWeek => field(|dt| dt.weekday().num_days_from_sunday()),
        Op::DayOfYear => field(|dt| dt.ordinal()),

        Op::AddYears => {
            let dt = datetime(&args[0])?;
            match integer(&args[1])?.checked_mul(12) {
                Some(months) => add_months(dt, months),
                None => invalid_value!("year offset out of range"),
            }
        }
        Op::AddMonths => add_months(datetime(&args[0])?, integer(&args[1])?),
        Op::AddDays => add_duration(datetime(&args[0])?, number(&args[1])?, DAY_MS),
        Op::AddHours => add_duration(datetime(&args[0])?, number(&args[1])?, HOUR_MS),
        Op::AddMinutes => add_duration(datetime(&args[0])?, number(&args[1])?, MINUTE_MS),
        Op::AddSeconds => add_duration(datetime(&args[0])?, number(&args[1])?, SECOND_MS),

        Op::DaysDiff => difference(&args[0], &args[1], DAY_MS),
        Op::HoursDiff => difference(&args[0], &args[1], HOUR_MS),
        Op::MinutesDiff => difference(&args[0], &args[1], MINUTE_MS),
        Op::SecondsDiff => difference(&args[0], &args[1], SECOND_MS),

        Op::ToUtc => to_utc(datetime(&args[0])?),
        Op::ToLocal => to_local(datetime(&args[0])?),
        Op::ParseDateTime => parse_datetime(string(&args[0])?, string(&args[1])?),
        Op::FormatDateTime => format_datetime(datetime(&args[0])?, string(&args[1])?),

        other => invalid_value!("{} is not a date/time operation", other.name()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvalErrorKind;
    use pretty_assertions::assert_eq;

    fn num(n: f64) -> Value { Value::Number(n) }

    fn text(s: &str) -> Value { Value::String(s.to_string()) }

    fn date(y: i32, m: i32, d: i32) -> Value { apply(Op::MakeDate, &[num(y.into()), num(m.into()), num(d.into())]).unwrap() }

    fn moment(parts: [f64; 6]) -> Value { apply(Op::MakeDateTime, &parts.map(num)).unwrap() }

    fn invalid(result: Result<Value, Error>) -> bool {
        matches!(
            result.map_err(|e| e.eval_kind().cloned()),
            Err(Some(EvalErrorKind::InvalidValue(_)))
        )
    }

    #[test]
    fn test_make_and_display() {
        assert_eq!(date(2024, 2, 29).to_string(), "2024-02-29T00:00:00");
        assert_eq!(moment([2024.0, 1.0, 2.0, 3.0, 4.0, 5.0]).to_string(), "2024-01-02T03:04:05");
        assert!(invalid(apply(Op::MakeDate, &[num(2023.0), num(2.0), num(29.0)])));
        assert!(invalid(apply(Op::MakeDate, &[num(2023.0), num(13.0), num(1.0)])));
        assert!(invalid(apply(Op::MakeDate, &[num(2023.0), num(-1.0), num(1.0)])));
        assert!(invalid(apply(Op::MakeDate, &[num(2023.5), num(1.0), num(1.0)])));
    }

    #[test]
    fn test_accessors() {
        let dt = moment([2024.0, 3.0, 10.0, 14.0, 30.0, 15.0]);
        let get = |op| apply(op, &[dt.clone()]).unwrap();
        assert_eq!(get(Op::Year), num(2024.0));
        assert_eq!(get(Op::Month), num(3.0));
        assert_eq!(get(Op::Day), num(10.0));
        assert_eq!(get(Op::Hour), num(14.0));
        assert_eq!(get(Op::Minute), num(30.0));
        assert_eq!(get(Op::Second), num(15.0));
        // a Sunday
        assert_eq!(get(Op::DayOfWeek), num(0.0));
        assert_eq!(get(Op::DayOfYear), num(70.0));
        assert!(matches!(
            apply(Op::Year, &[num(1.0)]).map_err(|e| e.eval_kind().cloned()),
            Err(Some(EvalErrorKind::WrongTypeOfArgument { .. }))
        ));
    }

    #[test]
    fn test_month_arithmetic_clamps() {
        let jan31 = date(2024, 1, 31);
        assert_eq!(apply(Op::AddMonths, &[jan31.clone(), num(1.0)]).unwrap(), date(2024, 2, 29));
        assert_eq!(apply(Op::AddMonths, &[jan31, num(-2.0)]).unwrap(), date(2023, 11, 30));
        assert_eq!(apply(Op::AddYears, &[date(2024, 2, 29), num(1.0)]).unwrap(), date(2025, 2, 28));
        assert!(invalid(apply(Op::AddMonths, &[date(2024, 1, 1), num(0.5)])));
    }

    #[test]
    fn test_duration_arithmetic() {
        let start = date(2024, 1, 1);
        assert_eq!(apply(Op::AddDays, &[start.clone(), num(1.5)]).unwrap(), moment([2024.0, 1.0, 2.0, 12.0, 0.0, 0.0]));
        assert_eq!(apply(Op::AddHours, &[start.clone(), num(-1.0)]).unwrap(), moment([2023.0, 12.0, 31.0, 23.0, 0.0, 0.0]));
        assert_eq!(apply(Op::AddMinutes, &[start.clone(), num(90.0)]).unwrap(), moment([2024.0, 1.0, 1.0, 1.0, 30.0, 0.0]));
        assert_eq!(apply(Op::AddSeconds, &[start.clone(), num(61.0)]).unwrap(), moment([2024.0, 1.0, 1.0, 0.0, 1.0, 1.0]));
        assert!(invalid(apply(Op::AddDays, &[start, num(f64::INFINITY)])));
    }

    #[test]
    fn test_differences() {
        let a = date(2024, 1, 1);
        let b = moment([2024.0, 1.0, 3.0, 12.0, 0.0, 0.0]);
        assert_eq!(apply(Op::DaysDiff, &[a.clone(), b.clone()]).unwrap(), num(2.5));
        assert_eq!(apply(Op::HoursDiff, &[a.clone(), b.clone()]).unwrap(), num(60.0));
        assert_eq!(apply(Op::MinutesDiff, &[b.clone(), a.clone()]).unwrap(), num(-3600.0));
        assert_eq!(apply(Op::SecondsDiff, &[a.clone(), a]).unwrap(), num(0.0));
    }

    #[test]
    fn test_kind_mismatch_is_invalid() {
        let local = date(2024, 1, 1);
        let utc = Value::DateTime(DateTimeValue::Utc(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()));
        assert_eq!(utc.to_string(), "2024-01-01T00:00:00Z");
        assert!(invalid(apply(Op::DaysDiff, &[local.clone(), utc.clone()])));
        assert!(invalid(apply(Op::ToUtc, &[utc.clone()])));
        assert!(invalid(apply(Op::ToLocal, &[local.clone()])));
        if let (Value::DateTime(a), Value::DateTime(b)) = (&local, &utc) {
            assert!(a.compare(b).is_err());
            assert_eq!(a.compare(a).unwrap(), Ordering::Equal);
        }
    }

    #[test]
    fn test_utc_round_trip() {
        let now = apply(Op::Now, &[]).unwrap();
        let utc = apply(Op::ToUtc, &[now.clone()]);
        // skipped or repeated local times are rejected rather than guessed
        if let Ok(utc) = utc {
            assert!(matches!(utc, Value::DateTime(DateTimeValue::Utc(_))));
            assert!(matches!(apply(Op::ToLocal, &[utc]).unwrap(), Value::DateTime(DateTimeValue::Local(_))));
        }
        assert!(matches!(apply(Op::UtcNow, &[]).unwrap(), Value::DateTime(DateTimeValue::Utc(_))));
    }

    #[test]
    fn test_parse_and_format() {
        let parsed = apply(Op::ParseDateTime, &[text("2024-03-10 14:30"), text("%Y-%m-%d %H:%M")]).unwrap();
        assert_eq!(parsed, moment([2024.0, 3.0, 10.0, 14.0, 30.0, 0.0]));
        assert_eq!(apply(Op::ParseDateTime, &[text("10/03/2024"), text("%d/%m/%Y")]).unwrap(), date(2024, 3, 10));
        assert!(invalid(apply(Op::ParseDateTime, &[text("yesterday"), text("%Y-%m-%d")])));
        assert!(invalid(apply(Op::ParseDateTime, &[text("2024"), text("%Q")])));
        assert_eq!(apply(Op::FormatDateTime, &[parsed.clone(), text("%d.%m.%Y %H:%M")]).unwrap(), text("10.03.2024 14:30"));
        assert!(invalid(apply(Op::FormatDateTime, &[parsed.clone(), text("%Q")])));
        assert!(invalid(apply(Op::FormatDateTime, &[parsed, text("%z")])));
    }
}

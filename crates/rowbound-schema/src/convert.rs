//! Conversion between storage-side and domain-side value forms.
//!
//! The storage engine speaks in column-typed text and numbers; the domain
//! side wants epochs for timestamps, lists for sets, booleans for one-byte
//! flags, and native numeric types. Both directions are idempotent on
//! already-converted values so a value can pass through twice without harm.

use rowbound_core::Value;

use crate::types::FieldDef;

/// The storage-side sentinel for an unset timestamp.
pub const ZERO_TIMESTAMP: &str = "0000-00-00 00:00:00";

/// Convert a raw storage value to its domain form, driven by the field's
/// column type.
#[must_use]
pub fn from_storage(field: &FieldDef, value: Value) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    if field.is_timestamp() {
        return Value::Int(timestamp_to_epoch(&value));
    }
    if field.is_set() {
        return match value {
            Value::List(items) => Value::List(items),
            other => {
                let text = other.to_string();
                if text.is_empty() {
                    Value::List(Vec::new())
                } else {
                    Value::List(text.split(',').map(str::to_string).collect())
                }
            }
        };
    }
    if field.is_tinyint() {
        return match value {
            Value::Bool(b) => Value::Bool(b),
            other => Value::Bool(other.integer() == Some(1)),
        };
    }
    if field.is_int() {
        return value.integer().map_or(value, Value::Int);
    }
    if field.is_float() {
        return value.numeric().map_or(value, Value::Float);
    }
    value
}

/// Convert a domain value to its storage form, driven by the field's column
/// type.
#[must_use]
pub fn to_storage(field: &FieldDef, value: Value) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    if field.is_timestamp() {
        return match value.numeric() {
            Some(epoch) if epoch == 0.0 => Value::Text(ZERO_TIMESTAMP.to_string()),
            Some(epoch) => Value::Text(epoch_to_timestamp(epoch as i64)),
            // Already in text form; trust the caller.
            None => value,
        };
    }
    if field.is_set() {
        return match value {
            Value::List(items) => Value::Text(items.join(",")),
            other => other,
        };
    }
    if field.is_tinyint() {
        return Value::Int(i64::from(value.is_truthy()));
    }
    if field.is_int() {
        return value.integer().map_or(value, Value::Int);
    }
    if field.is_float() {
        return value.numeric().map_or(value, Value::Float);
    }
    value
}

/// Parse a `YYYY-MM-DD HH:MM:SS` timestamp into a Unix epoch.
///
/// The zero-date sentinel, unparsable text, and out-of-range components all
/// collapse to epoch 0, so an unset timestamp reads as zero on the domain
/// side.
fn timestamp_to_epoch(value: &Value) -> i64 {
    if let Some(n) = value.integer() {
        return n;
    }
    let Some(text) = value.as_str() else {
        return 0;
    };
    if text == ZERO_TIMESTAMP {
        return 0;
    }
    parse_timestamp(text).unwrap_or(0)
}

fn parse_timestamp(text: &str) -> Option<i64> {
    let (date, time) = text.split_once(' ')?;
    let mut date_parts = date.splitn(3, '-');
    let year: i64 = date_parts.next()?.parse().ok()?;
    let month: u32 = date_parts.next()?.parse().ok()?;
    let day: u32 = date_parts.next()?.parse().ok()?;
    let mut time_parts = time.splitn(3, ':');
    let hour: i64 = time_parts.next()?.parse().ok()?;
    let minute: i64 = time_parts.next()?.parse().ok()?;
    let second: i64 = time_parts.next()?.parse().ok()?;
    if !(1..=12).contains(&month)
        || !(1..=31).contains(&day)
        || !(0..24).contains(&hour)
        || !(0..60).contains(&minute)
        || !(0..60).contains(&second)
        || year == 0
    {
        return None;
    }
    let days = days_from_civil(year, month, day);
    Some(days * 86_400 + hour * 3_600 + minute * 60 + second)
}

/// Format a Unix epoch as `YYYY-MM-DD HH:MM:SS` (UTC).
fn epoch_to_timestamp(epoch: i64) -> String {
    let days = epoch.div_euclid(86_400);
    let seconds = epoch.rem_euclid(86_400);
    let (year, month, day) = civil_from_days(days);
    format!(
        "{year:04}-{month:02}-{day:02} {:02}:{:02}:{:02}",
        seconds / 3_600,
        (seconds % 3_600) / 60,
        seconds % 60
    )
}

// Proleptic-Gregorian day count from 1970-01-01 (Howard Hinnant's civil
// calendar algorithms).
fn days_from_civil(year: i64, month: u32, day: u32) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let m = i64::from(month);
    let d = i64::from(day);
    let doy = (153 * (if m > 2 { m - 3 } else { m + 9 }) + 2) / 5 + d - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    (if m <= 2 { y + 1 } else { y }, m as u32, d as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(column_type: &str) -> FieldDef {
        FieldDef::new("f", column_type)
    }

    #[test]
    fn timestamp_round_trip() {
        let f = field("timestamp");
        let domain = from_storage(&f, Value::Text("2009-02-13 23:31:30".into()));
        assert_eq!(domain, Value::Int(1_234_567_890));
        let storage = to_storage(&f, domain);
        assert_eq!(storage, Value::Text("2009-02-13 23:31:30".into()));
    }

    #[test]
    fn zero_timestamp_sentinel() {
        let f = field("timestamp");
        assert_eq!(
            from_storage(&f, Value::Text(ZERO_TIMESTAMP.into())),
            Value::Int(0)
        );
        assert_eq!(
            to_storage(&f, Value::Int(0)),
            Value::Text(ZERO_TIMESTAMP.into())
        );
    }

    #[test]
    fn unparsable_timestamp_reads_as_zero() {
        let f = field("timestamp");
        assert_eq!(from_storage(&f, Value::Text("garbage".into())), Value::Int(0));
        assert_eq!(
            from_storage(&f, Value::Text("2020-13-01 00:00:00".into())),
            Value::Int(0)
        );
    }

    #[test]
    fn epoch_formatting() {
        assert_eq!(epoch_to_timestamp(0), "1970-01-01 00:00:00");
        assert_eq!(epoch_to_timestamp(1_234_567_890), "2009-02-13 23:31:30");
        assert_eq!(epoch_to_timestamp(-86_400), "1969-12-31 00:00:00");
    }

    #[test]
    fn set_columns() {
        let f = field("set('a','b','c')");
        assert_eq!(
            from_storage(&f, Value::Text("a,c".into())),
            Value::List(vec!["a".into(), "c".into()])
        );
        assert_eq!(from_storage(&f, Value::Text(String::new())), Value::List(vec![]));
        assert_eq!(
            to_storage(&f, Value::List(vec!["a".into(), "c".into()])),
            Value::Text("a,c".into())
        );
        assert_eq!(to_storage(&f, Value::List(vec![])), Value::Text(String::new()));
    }

    #[test]
    fn tinyint_flags() {
        let f = field("tinyint(1)");
        assert_eq!(from_storage(&f, Value::Int(1)), Value::Bool(true));
        assert_eq!(from_storage(&f, Value::Text("0".into())), Value::Bool(false));
        assert_eq!(to_storage(&f, Value::Bool(true)), Value::Int(1));
        assert_eq!(to_storage(&f, Value::Bool(false)), Value::Int(0));
    }

    #[test]
    fn numeric_normalization() {
        let f = field("int(11)");
        assert_eq!(from_storage(&f, Value::Text("42".into())), Value::Int(42));
        assert_eq!(to_storage(&f, Value::Text("42".into())), Value::Int(42));

        let f = field("decimal(10,2)");
        assert_eq!(from_storage(&f, Value::Text("3.5".into())), Value::Float(3.5));
    }

    #[test]
    fn null_passes_through() {
        for column_type in ["timestamp", "set('a')", "int(11)", "tinyint(1)"] {
            let f = field(column_type);
            assert_eq!(from_storage(&f, Value::Null), Value::Null);
            assert_eq!(to_storage(&f, Value::Null), Value::Null);
        }
    }

    #[test]
    fn conversions_are_idempotent() {
        let f = field("timestamp");
        let once = from_storage(&f, Value::Text("2009-02-13 23:31:30".into()));
        let twice = from_storage(&f, once.clone());
        assert_eq!(once, twice);

        let f = field("set('a','b')");
        let once = from_storage(&f, Value::Text("a,b".into()));
        let twice = from_storage(&f, once.clone());
        assert_eq!(once, twice);
    }
}

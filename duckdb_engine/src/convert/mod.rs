//! Exact-fit conversions from host [`Value`]s to native primitive
//! representations.
//!
//! Every conversion either produces a value that is bit-exact for the
//! target type or fails with [`DuckError::Conversion`]; nothing here
//! truncates, rounds an integer, or drops a fractional part silently.

use crate::error::{DuckError, Result};
use crate::types::{Date, Time, Timestamp, Value};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

pub fn to_bool(value: &Value) -> Result<bool> {
    match value {
        Value::Boolean(b) => Ok(*b),
        Value::Int8(v) => Ok(*v != 0),
        Value::Int16(v) => Ok(*v != 0),
        Value::Int32(v) => Ok(*v != 0),
        Value::Int64(v) => Ok(*v != 0),
        Value::UInt8(v) => Ok(*v != 0),
        Value::UInt16(v) => Ok(*v != 0),
        Value::UInt32(v) => Ok(*v != 0),
        Value::UInt64(v) => Ok(*v != 0),
        Value::HugeInt(v) => Ok(*v != 0),
        Value::UHugeInt(v) => Ok(*v != 0),
        Value::Text(s) => {
            let s = s.trim().to_ascii_lowercase();
            Ok(matches!(s.as_str(), "true" | "1" | "t" | "yes" | "y"))
        }
        other => Err(cannot_convert(other, "BOOLEAN")),
    }
}

pub fn to_i8(value: &Value) -> Result<i8> {
    to_integer(value, "TINYINT")
}

pub fn to_i16(value: &Value) -> Result<i16> {
    to_integer(value, "SMALLINT")
}

pub fn to_i32(value: &Value) -> Result<i32> {
    to_integer(value, "INTEGER")
}

pub fn to_i64(value: &Value) -> Result<i64> {
    to_integer(value, "BIGINT")
}

pub fn to_u8(value: &Value) -> Result<u8> {
    to_integer(value, "UTINYINT")
}

pub fn to_u16(value: &Value) -> Result<u16> {
    to_integer(value, "USMALLINT")
}

pub fn to_u32(value: &Value) -> Result<u32> {
    to_integer(value, "UINTEGER")
}

pub fn to_u64(value: &Value) -> Result<u64> {
    to_integer(value, "UBIGINT")
}

pub fn to_hugeint(value: &Value) -> Result<i128> {
    integral_of(value, "HUGEINT")
}

pub fn to_uhugeint(value: &Value) -> Result<u128> {
    if let Value::UHugeInt(v) = value {
        return Ok(*v);
    }
    let v = integral_of(value, "UHUGEINT")?;
    u128::try_from(v).map_err(|_| out_of_range(v, "UHUGEINT"))
}

fn to_integer<T: TryFrom<i128>>(value: &Value, target: &'static str) -> Result<T> {
    let wide = integral_of(value, target)?;
    T::try_from(wide).map_err(|_| out_of_range(wide, target))
}

/// Widens any integral host value to i128, rejecting fractional floats and
/// non-numeric values. Range narrowing happens in the caller.
fn integral_of(value: &Value, target: &'static str) -> Result<i128> {
    match value {
        Value::Boolean(b) => Ok(i128::from(*b)),
        Value::Int8(v) => Ok(i128::from(*v)),
        Value::Int16(v) => Ok(i128::from(*v)),
        Value::Int32(v) => Ok(i128::from(*v)),
        Value::Int64(v) => Ok(i128::from(*v)),
        Value::UInt8(v) => Ok(i128::from(*v)),
        Value::UInt16(v) => Ok(i128::from(*v)),
        Value::UInt32(v) => Ok(i128::from(*v)),
        Value::UInt64(v) => Ok(i128::from(*v)),
        Value::HugeInt(v) => Ok(*v),
        Value::UHugeInt(v) => {
            i128::try_from(*v).map_err(|_| out_of_range_u(*v, target))
        }
        Value::Float(v) => float_to_integral(f64::from(*v), target),
        Value::Double(v) => float_to_integral(*v, target),
        Value::Text(s) => s.trim().parse::<i128>().map_err(|_| {
            DuckError::Conversion(format!("cannot convert string '{s}' to {target}"))
        }),
        Value::Decimal(d) => {
            let divisor = 10i128.pow(u32::from(d.scale));
            if d.value % divisor != 0 {
                return Err(DuckError::Conversion(format!(
                    "value {d} cannot be exactly represented as {target}"
                )));
            }
            Ok(d.value / divisor)
        }
        other => Err(cannot_convert(other, target)),
    }
}

fn float_to_integral(v: f64, target: &'static str) -> Result<i128> {
    if !v.is_finite() || v.fract() != 0.0 {
        return Err(DuckError::Conversion(format!(
            "value {v} cannot be exactly represented as {target}"
        )));
    }
    // 2^127 as f64; anything at or beyond cannot be an i128.
    if v.abs() >= 1.7014118346046923e38 {
        return Err(DuckError::Conversion(format!(
            "value {v} out of range for {target}"
        )));
    }
    Ok(v as i128)
}

pub fn to_f32(value: &Value) -> Result<f32> {
    let wide = to_f64(value)?;
    let narrow = wide as f32;
    if wide.is_finite() && !narrow.is_finite() {
        return Err(DuckError::Conversion(format!(
            "value {wide} out of range for FLOAT"
        )));
    }
    Ok(narrow)
}

pub fn to_f64(value: &Value) -> Result<f64> {
    match value {
        Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Int8(v) => Ok(f64::from(*v)),
        Value::Int16(v) => Ok(f64::from(*v)),
        Value::Int32(v) => Ok(f64::from(*v)),
        Value::Int64(v) => Ok(*v as f64),
        Value::UInt8(v) => Ok(f64::from(*v)),
        Value::UInt16(v) => Ok(f64::from(*v)),
        Value::UInt32(v) => Ok(f64::from(*v)),
        Value::UInt64(v) => Ok(*v as f64),
        Value::HugeInt(v) => Ok(*v as f64),
        Value::UHugeInt(v) => Ok(*v as f64),
        Value::Float(v) => Ok(f64::from(*v)),
        Value::Double(v) => Ok(*v),
        Value::Decimal(d) => Ok(d.value as f64 / 10f64.powi(i32::from(d.scale))),
        Value::Text(s) => s.trim().parse::<f64>().map_err(|_| {
            DuckError::Conversion(format!("cannot convert string '{s}' to DOUBLE"))
        }),
        other => Err(cannot_convert(other, "DOUBLE")),
    }
}

pub fn to_text(value: &Value) -> Result<String> {
    match value {
        Value::Text(s) => Ok(s.clone()),
        Value::Boolean(b) => Ok(if *b { "true" } else { "false" }.to_string()),
        Value::Int8(v) => Ok(v.to_string()),
        Value::Int16(v) => Ok(v.to_string()),
        Value::Int32(v) => Ok(v.to_string()),
        Value::Int64(v) => Ok(v.to_string()),
        Value::UInt8(v) => Ok(v.to_string()),
        Value::UInt16(v) => Ok(v.to_string()),
        Value::UInt32(v) => Ok(v.to_string()),
        Value::UInt64(v) => Ok(v.to_string()),
        Value::Float(v) => Ok(v.to_string()),
        Value::Double(v) => Ok(v.to_string()),
        Value::HugeInt(v) => Ok(v.to_string()),
        Value::UHugeInt(v) => Ok(v.to_string()),
        Value::Decimal(d) => Ok(d.to_string()),
        Value::Date(d) => format_date(*d),
        Value::Time(t) => format_time(*t),
        Value::Timestamp(ts) => format_timestamp(*ts),
        Value::Interval(iv) => Ok(format!(
            "{} months {} days {} microseconds",
            iv.months, iv.days, iv.micros
        )),
        Value::Blob(b) => Ok(b.iter().map(|x| format!("{x:02x}")).collect()),
        Value::Null => Err(cannot_convert(value, "VARCHAR")),
    }
}

pub fn to_blob(value: &Value) -> Result<Vec<u8>> {
    match value {
        Value::Blob(b) => Ok(b.clone()),
        Value::Text(s) => Ok(s.as_bytes().to_vec()),
        other => Err(cannot_convert(other, "BLOB")),
    }
}

pub fn to_date(value: &Value) -> Result<Date> {
    match value {
        Value::Date(d) => Ok(*d),
        Value::Timestamp(ts) => Ok(Date {
            days: ts.micros.div_euclid(86_400_000_000) as i32,
        }),
        Value::Text(s) => {
            let parsed = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
                DuckError::Conversion(format!("cannot parse string '{s}' as DATE"))
            })?;
            Ok(Date::from_naive(parsed))
        }
        other => Err(cannot_convert(other, "DATE")),
    }
}

pub fn to_time(value: &Value) -> Result<Time> {
    match value {
        Value::Time(t) => Ok(*t),
        Value::Text(s) => {
            let parsed = NaiveTime::parse_from_str(s.trim(), "%H:%M:%S%.f").map_err(|_| {
                DuckError::Conversion(format!("cannot parse string '{s}' as TIME"))
            })?;
            Ok(Time::from_naive(parsed))
        }
        other => Err(cannot_convert(other, "TIME")),
    }
}

pub fn to_timestamp(value: &Value) -> Result<Timestamp> {
    match value {
        Value::Timestamp(ts) => Ok(*ts),
        Value::Date(d) => Ok(Timestamp {
            micros: i64::from(d.days) * 86_400_000_000,
        }),
        Value::Text(s) => {
            let s = s.trim();
            let formats = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
            for format in formats {
                if let Ok(parsed) = NaiveDateTime::parse_from_str(s, format) {
                    return Ok(Timestamp::from_naive(parsed));
                }
            }
            if let Ok(parsed) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                let date = Date::from_naive(parsed);
                return Ok(Timestamp {
                    micros: i64::from(date.days) * 86_400_000_000,
                });
            }
            Err(DuckError::Conversion(format!(
                "cannot parse string '{s}' as TIMESTAMP"
            )))
        }
        other => Err(cannot_convert(other, "TIMESTAMP")),
    }
}

pub fn format_date(date: Date) -> Result<String> {
    date.to_naive()
        .map(|d| d.format("%Y-%m-%d").to_string())
        .ok_or_else(|| DuckError::Conversion(format!("day offset {} has no calendar form", date.days)))
}

pub fn format_time(time: Time) -> Result<String> {
    time.to_naive()
        .map(|t| t.format("%H:%M:%S%.6f").to_string())
        .ok_or_else(|| {
            DuckError::Conversion(format!("microsecond offset {} has no clock form", time.micros))
        })
}

pub fn format_timestamp(ts: Timestamp) -> Result<String> {
    ts.to_naive()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string())
        .ok_or_else(|| {
            DuckError::Conversion(format!("epoch offset {} has no calendar form", ts.micros))
        })
}

fn cannot_convert(value: &Value, target: &'static str) -> DuckError {
    DuckError::Conversion(format!(
        "cannot convert {} to {target}",
        value.natural_type()
    ))
}

fn out_of_range(v: i128, target: &'static str) -> DuckError {
    DuckError::Conversion(format!("value {v} out of range for {target}"))
}

fn out_of_range_u(v: u128, target: &'static str) -> DuckError {
    DuckError::Conversion(format!("value {v} out of range for {target}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Decimal;

    #[test]
    fn test_to_i8_in_range() {
        assert_eq!(to_i8(&Value::Int32(100)).unwrap(), 100);
        assert_eq!(to_i8(&Value::Int32(-128)).unwrap(), -128);
        assert_eq!(to_i8(&Value::UInt64(127)).unwrap(), 127);
    }

    #[test]
    fn test_to_i8_out_of_range() {
        let err = to_i8(&Value::Int32(1000)).unwrap_err();
        assert!(err.to_string().contains("1000"), "got: {err}");
        assert!(to_i8(&Value::Int32(128)).is_err());
        assert!(to_i8(&Value::Int32(-129)).is_err());
    }

    #[test]
    fn test_to_integer_from_float_exact_only() {
        assert_eq!(to_i16(&Value::Double(42.0)).unwrap(), 42);
        let err = to_i16(&Value::Double(42.5)).unwrap_err();
        assert!(err.to_string().contains("exactly"), "got: {err}");
        assert!(to_i16(&Value::Float(3.25)).is_err());
        assert!(to_i64(&Value::Double(f64::NAN)).is_err());
        assert!(to_i64(&Value::Double(f64::INFINITY)).is_err());
    }

    #[test]
    fn test_to_integer_from_text() {
        assert_eq!(to_i32(&Value::Text("  -77 ".to_string())).unwrap(), -77);
        assert!(to_i32(&Value::Text("abc".to_string())).is_err());
        assert!(to_i8(&Value::Text("300".to_string())).is_err());
    }

    #[test]
    fn test_to_integer_from_bool() {
        assert_eq!(to_i32(&Value::Boolean(true)).unwrap(), 1);
        assert_eq!(to_i32(&Value::Boolean(false)).unwrap(), 0);
    }

    #[test]
    fn test_to_unsigned_rejects_negative() {
        assert!(to_u8(&Value::Int32(-1)).is_err());
        assert!(to_u64(&Value::Int64(-5)).is_err());
        assert_eq!(to_u8(&Value::Int32(255)).unwrap(), 255);
        assert_eq!(to_u64(&Value::UInt64(u64::MAX)).unwrap(), u64::MAX);
    }

    #[test]
    fn test_to_integer_from_decimal() {
        let whole = Value::Decimal(Decimal { width: 6, scale: 2, value: 400 });
        assert_eq!(to_i32(&whole).unwrap(), 4);
        let fractional = Value::Decimal(Decimal { width: 6, scale: 2, value: 425 });
        assert!(to_i32(&fractional).is_err());
    }

    #[test]
    fn test_to_hugeint_and_uhugeint() {
        assert_eq!(to_hugeint(&Value::Int64(-9)).unwrap(), -9);
        assert_eq!(to_uhugeint(&Value::UHugeInt(u128::MAX)).unwrap(), u128::MAX);
        assert!(to_uhugeint(&Value::Int64(-1)).is_err());
        assert!(to_hugeint(&Value::UHugeInt(u128::MAX)).is_err());
    }

    #[test]
    fn test_to_bool_forms() {
        assert!(to_bool(&Value::Boolean(true)).unwrap());
        assert!(to_bool(&Value::Int32(7)).unwrap());
        assert!(!to_bool(&Value::Int32(0)).unwrap());
        assert!(to_bool(&Value::Text(" YES ".to_string())).unwrap());
        assert!(to_bool(&Value::Text("t".to_string())).unwrap());
        assert!(!to_bool(&Value::Text("false".to_string())).unwrap());
        assert!(!to_bool(&Value::Text("banana".to_string())).unwrap());
        assert!(to_bool(&Value::Double(1.0)).is_err());
    }

    #[test]
    fn test_to_f32_overflow() {
        assert!(to_f32(&Value::Double(1e300)).is_err());
        assert_eq!(to_f32(&Value::Double(1.5)).unwrap(), 1.5f32);
    }

    #[test]
    fn test_to_f64_from_text_and_decimal() {
        assert_eq!(to_f64(&Value::Text("2.5".to_string())).unwrap(), 2.5);
        assert!(to_f64(&Value::Text("xyz".to_string())).is_err());
        let d = Value::Decimal(Decimal { width: 6, scale: 2, value: 314 });
        assert!((to_f64(&d).unwrap() - 3.14).abs() < 1e-9);
    }

    #[test]
    fn test_to_text_renders() {
        assert_eq!(to_text(&Value::Boolean(true)).unwrap(), "true");
        assert_eq!(to_text(&Value::Int64(-3)).unwrap(), "-3");
        assert_eq!(to_text(&Value::Blob(vec![0xde, 0xad])).unwrap(), "dead");
        assert!(to_text(&Value::Null).is_err());
    }

    #[test]
    fn test_to_date_forms() {
        let d = to_date(&Value::Text("1970-01-02".to_string())).unwrap();
        assert_eq!(d.days, 1);
        let from_ts = to_date(&Value::Timestamp(Timestamp { micros: -1 })).unwrap();
        assert_eq!(from_ts.days, -1);
        assert!(to_date(&Value::Text("02/01/1970".to_string())).is_err());
        assert!(to_date(&Value::Int32(1)).is_err());
    }

    #[test]
    fn test_to_time_forms() {
        let t = to_time(&Value::Text("12:34:56.000789".to_string())).unwrap();
        assert_eq!(t.micros, (12i64 * 3600 + 34 * 60 + 56) * 1_000_000 + 789);
        let plain = to_time(&Value::Text("01:02:03".to_string())).unwrap();
        assert_eq!(plain.micros, (3600i64 + 2 * 60 + 3) * 1_000_000);
        assert!(to_time(&Value::Int64(0)).is_err());
    }

    #[test]
    fn test_to_timestamp_forms() {
        let micros_expected = Timestamp::from_naive(
            chrono::NaiveDate::from_ymd_opt(2025, 5, 7)
                .unwrap()
                .and_hms_micro_opt(12, 34, 56, 0)
                .unwrap(),
        )
        .micros;
        for text in [
            "2025-05-07 12:34:56",
            "2025-05-07T12:34:56",
            "2025-05-07 12:34:56.000000",
        ] {
            let ts = to_timestamp(&Value::Text(text.to_string())).unwrap();
            assert_eq!(ts.micros, micros_expected, "for {text}");
        }
        let midnight = to_timestamp(&Value::Text("1970-01-02".to_string())).unwrap();
        assert_eq!(midnight.micros, 86_400_000_000);
        assert!(to_timestamp(&Value::Text("not a time".to_string())).is_err());
    }

    #[test]
    fn test_format_date_time_timestamp() {
        assert_eq!(format_date(Date { days: 1 }).unwrap(), "1970-01-02");
        assert_eq!(
            format_time(Time { micros: 45_296_000_789 }).unwrap(),
            "12:34:56.000789"
        );
        assert_eq!(
            format_timestamp(Timestamp { micros: 86_400_000_000 }).unwrap(),
            "1970-01-02 00:00:00.000000"
        );
    }
}

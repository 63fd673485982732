//! Type-directed result cell decoding.
//!
//! The NULL predicate runs before any typed accessor, always: several
//! native accessors return a zero sentinel for NULL cells, which is
//! indistinguishable from a legitimate zero. When a typed accessor's
//! symbol is unresolved in the loaded build, the cell is re-read through
//! the varchar accessor and converted exactly; [`decode_any`] is the
//! generic row-scan for callers that track no column metadata.

use crate::convert;
use crate::engine::logical::LogicalTypeHandle;
use crate::error::{DuckError, Result};
use crate::ffi::{idx_t, RawResult};
use crate::library::FunctionTable;
use crate::types::{Date, Decimal, PhysicalType, Time, Timestamp, Value};

/// Decodes one cell as `ty`. `Ok(None)` is SQL NULL.
pub(crate) fn decode_cell(
    table: &FunctionTable,
    raw: &mut RawResult,
    col: idx_t,
    row: idx_t,
    ty: PhysicalType,
) -> Result<Option<Value>> {
    // Safety throughout: raw is a live result block owned by the caller,
    // and every slot was bound against the matching native signature.
    if unsafe { (table.value_is_null)(raw, col, row) } {
        return Ok(None);
    }

    let value = match ty {
        PhysicalType::Boolean => match table.value_boolean {
            Some(f) => Value::Boolean(unsafe { f(raw, col, row) }),
            None => Value::Boolean(convert::to_bool(&text_of(table, raw, col, row))?),
        },
        PhysicalType::TinyInt => match table.value_int8 {
            Some(f) => Value::Int8(unsafe { f(raw, col, row) }),
            None => Value::Int8(convert::to_i8(&text_of(table, raw, col, row))?),
        },
        PhysicalType::SmallInt => match table.value_int16 {
            Some(f) => Value::Int16(unsafe { f(raw, col, row) }),
            None => Value::Int16(convert::to_i16(&text_of(table, raw, col, row))?),
        },
        PhysicalType::Integer => match table.value_int32 {
            Some(f) => Value::Int32(unsafe { f(raw, col, row) }),
            None => Value::Int32(convert::to_i32(&text_of(table, raw, col, row))?),
        },
        PhysicalType::BigInt => match table.value_int64 {
            Some(f) => Value::Int64(unsafe { f(raw, col, row) }),
            None => Value::Int64(convert::to_i64(&text_of(table, raw, col, row))?),
        },
        PhysicalType::UTinyInt => match table.value_uint8 {
            Some(f) => Value::UInt8(unsafe { f(raw, col, row) }),
            None => Value::UInt8(convert::to_u8(&text_of(table, raw, col, row))?),
        },
        PhysicalType::USmallInt => match table.value_uint16 {
            Some(f) => Value::UInt16(unsafe { f(raw, col, row) }),
            None => Value::UInt16(convert::to_u16(&text_of(table, raw, col, row))?),
        },
        PhysicalType::UInteger => match table.value_uint32 {
            Some(f) => Value::UInt32(unsafe { f(raw, col, row) }),
            None => Value::UInt32(convert::to_u32(&text_of(table, raw, col, row))?),
        },
        PhysicalType::UBigInt => match table.value_uint64 {
            Some(f) => Value::UInt64(unsafe { f(raw, col, row) }),
            None => Value::UInt64(convert::to_u64(&text_of(table, raw, col, row))?),
        },
        PhysicalType::Float => match table.value_float {
            Some(f) => Value::Float(unsafe { f(raw, col, row) }),
            None => Value::Float(convert::to_f32(&text_of(table, raw, col, row))?),
        },
        PhysicalType::Double => match table.value_double {
            Some(f) => Value::Double(unsafe { f(raw, col, row) }),
            None => Value::Double(convert::to_f64(&text_of(table, raw, col, row))?),
        },
        PhysicalType::Date => match table.value_date {
            Some(f) => Value::Date(Date {
                days: unsafe { f(raw, col, row) }.days,
            }),
            None => Value::Date(convert::to_date(&text_of(table, raw, col, row))?),
        },
        PhysicalType::Time | PhysicalType::TimeTz => match table.value_time {
            Some(f) => Value::Time(Time {
                micros: unsafe { f(raw, col, row) }.micros,
            }),
            None => Value::Time(convert::to_time(&text_of(table, raw, col, row))?),
        },
        PhysicalType::Timestamp | PhysicalType::TimestampTz => match table.value_timestamp {
            Some(f) => Value::Timestamp(Timestamp {
                micros: unsafe { f(raw, col, row) }.micros,
            }),
            None => Value::Timestamp(convert::to_timestamp(&text_of(table, raw, col, row))?),
        },
        // The micros accessor is only exact for the micros variant; the
        // coarser/finer encodings decode through their text rendering.
        PhysicalType::TimestampS | PhysicalType::TimestampMs | PhysicalType::TimestampNs => {
            Value::Timestamp(convert::to_timestamp(&text_of(table, raw, col, row))?)
        }
        PhysicalType::Varchar
        | PhysicalType::Enum
        | PhysicalType::Uuid
        | PhysicalType::Bit
        | PhysicalType::VarInt
        | PhysicalType::StringLiteral => Value::Text(plain_text(table, raw, col, row)),
        PhysicalType::IntegerLiteral => match table.value_int64 {
            Some(f) => Value::Int64(unsafe { f(raw, col, row) }),
            None => Value::Int64(convert::to_i64(&text_of(table, raw, col, row))?),
        },
        PhysicalType::HugeInt => {
            let text = plain_text(table, raw, col, row);
            Value::HugeInt(text.trim().parse::<i128>().map_err(|_| {
                DuckError::Conversion(format!("cannot convert string '{text}' to HUGEINT"))
            })?)
        }
        PhysicalType::UHugeInt => {
            let text = plain_text(table, raw, col, row);
            Value::UHugeInt(text.trim().parse::<u128>().map_err(|_| {
                DuckError::Conversion(format!("cannot convert string '{text}' to UHUGEINT"))
            })?)
        }
        PhysicalType::Decimal => decode_decimal(table, raw, col, row)?,
        PhysicalType::SqlNull => return Ok(None),
        PhysicalType::Invalid | PhysicalType::Any => return decode_any(table, raw, col, row),
        // BLOB has no accessor that survives the calling convention (the
        // native one returns a pointer+length struct by value), and the
        // nested types have no scalar accessor at all.
        other => return Err(DuckError::UnsupportedType(other)),
    };
    Ok(Some(value))
}

/// Generic row-scan decode for callers without column type metadata:
/// timestamp, then date, then time, then text, first hit wins. The epoch
/// accessors return zero both for NULL and for cells of other types, so
/// zero means "not this type" here; the type-directed path is preferred
/// whenever the column's physical type is known.
pub(crate) fn decode_any(
    table: &FunctionTable,
    raw: &mut RawResult,
    col: idx_t,
    row: idx_t,
) -> Result<Option<Value>> {
    // Safety: as in `decode_cell`.
    if unsafe { (table.value_is_null)(raw, col, row) } {
        return Ok(None);
    }
    if let Some(f) = table.value_timestamp {
        let ts = unsafe { f(raw, col, row) };
        if ts.micros != 0 {
            return Ok(Some(Value::Timestamp(Timestamp { micros: ts.micros })));
        }
    }
    if let Some(f) = table.value_date {
        let date = unsafe { f(raw, col, row) };
        if date.days != 0 {
            return Ok(Some(Value::Date(Date { days: date.days })));
        }
    }
    if let Some(f) = table.value_time {
        let time = unsafe { f(raw, col, row) };
        if time.micros != 0 {
            return Ok(Some(Value::Time(Time { micros: time.micros })));
        }
    }
    Ok(Some(Value::Text(plain_text(table, raw, col, row))))
}

fn decode_decimal(
    table: &FunctionTable,
    raw: &mut RawResult,
    col: idx_t,
    row: idx_t,
) -> Result<Value> {
    if let (Some(column_logical_type), Some(_), Some(_)) = (
        table.column_logical_type,
        table.decimal_width,
        table.decimal_scale,
    ) {
        // Safety: as in `decode_cell`; the handle owns the logical type
        // and destroys it on drop.
        let logical = LogicalTypeHandle::new(unsafe { column_logical_type(raw, col) }, table);
        let width = logical.decimal_width()?;
        let scale = logical.decimal_scale()?;
        let text = plain_text(table, raw, col, row);
        let value = parse_decimal_magnitude(&text, scale)?;
        return Ok(Value::Decimal(Decimal {
            width,
            scale,
            value,
        }));
    }
    // Without logical type metadata the exact magnitude is unrecoverable;
    // the double reading is a documented lossy fallback.
    match table.value_double {
        Some(f) => Ok(Value::Double(unsafe { f(raw, col, row) })),
        None => Ok(Value::Double(convert::to_f64(&text_of(
            table, raw, col, row,
        ))?)),
    }
}

/// The unscaled 128-bit magnitude of a rendered decimal.
fn parse_decimal_magnitude(text: &str, scale: u8) -> Result<i128> {
    let text = text.trim();
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => (-1i128, rest),
        None => (1i128, text.strip_prefix('+').unwrap_or(text)),
    };
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, f),
        None => (digits, ""),
    };
    let mut value: i128 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().map_err(|_| bad_decimal(text))?
    };
    let frac = frac_part.as_bytes();
    for i in 0..usize::from(scale) {
        let digit = match frac.get(i) {
            Some(b) if b.is_ascii_digit() => i128::from(b - b'0'),
            Some(_) => return Err(bad_decimal(text)),
            None => 0,
        };
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add(digit))
            .ok_or_else(|| bad_decimal(text))?;
    }
    if frac.len() > usize::from(scale) && frac[usize::from(scale)..].iter().any(|b| *b != b'0') {
        return Err(DuckError::Conversion(format!(
            "decimal '{text}' has more fractional digits than scale {scale}"
        )));
    }
    Ok(sign * value)
}

fn bad_decimal(text: &str) -> DuckError {
    DuckError::Conversion(format!("cannot parse '{text}' as DECIMAL"))
}

fn plain_text(table: &FunctionTable, raw: &mut RawResult, col: idx_t, row: idx_t) -> String {
    // Safety: as in `decode_cell`; copy_and_free takes ownership of the
    // returned buffer.
    unsafe { table.copy_and_free((table.value_varchar)(raw, col, row)) }
}

fn text_of(table: &FunctionTable, raw: &mut RawResult, col: idx_t, row: idx_t) -> Value {
    Value::Text(plain_text(table, raw, col, row))
}

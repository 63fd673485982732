//! Type-directed parameter binding.
//!
//! Dispatch is data-driven: [`bind_chain`] maps each physical type to an
//! ordered list of bind capabilities, and the first one the loaded library
//! resolves wins. The host value is converted once, for the *target* type,
//! with exact-fit checks; later chain steps only widen, so they are
//! value-preserving by construction (the one exception, UBIGINT through
//! the signed int64 entry point, is guarded by a fits-in-i64 check and
//! skipped otherwise).
//!
//! NULL is type-independent and always routes through `duckdb_bind_null`.
//! LIST, STRUCT, ARRAY, UNION and INTERVAL have no calling-convention-safe
//! entry point and fail fast. MAP travels as JSON text when the
//! `json-fallback` feature is on; that is a lossy compatibility shim, not
//! a faithful binding.

use crate::convert;
use crate::error::{DuckError, Result};
use crate::ffi::{
    duckdb_date, duckdb_prepared_statement, duckdb_state, duckdb_time, duckdb_timestamp,
    from_cstr, idx_t, to_cstring, DUCKDB_STATE_SUCCESS,
};
use crate::library::{BindCapability, FunctionTable};
use crate::types::{PhysicalType, Value};
use log::trace;
use std::ffi::c_void;

/// The ordered bind entry points to try for a target type. Empty for
/// types that cannot cross the boundary at all.
pub fn bind_chain(target: PhysicalType) -> &'static [BindCapability] {
    use BindCapability as C;
    match target {
        PhysicalType::Boolean => &[C::Boolean, C::Int32, C::Int64],
        PhysicalType::TinyInt => &[C::Int8, C::Int32, C::Int64],
        PhysicalType::SmallInt => &[C::Int16, C::Int32, C::Int64],
        PhysicalType::Integer => &[C::Int32, C::Int64],
        PhysicalType::BigInt | PhysicalType::IntegerLiteral => &[C::Int64],
        PhysicalType::UTinyInt => &[C::UInt8, C::Int32, C::Int64],
        PhysicalType::USmallInt => &[C::UInt16, C::Int32, C::Int64],
        PhysicalType::UInteger => &[C::UInt32, C::Int64],
        PhysicalType::UBigInt => &[C::UInt64, C::Int64],
        PhysicalType::Float => &[C::Float, C::Double],
        PhysicalType::Double => &[C::Double],
        PhysicalType::Varchar
        | PhysicalType::Enum
        | PhysicalType::Uuid
        | PhysicalType::Bit
        | PhysicalType::VarInt
        | PhysicalType::StringLiteral => &[C::Varchar],
        PhysicalType::Blob => &[C::Blob],
        PhysicalType::Date => &[C::Date, C::Varchar],
        PhysicalType::Time | PhysicalType::TimeTz => &[C::Time, C::Varchar],
        PhysicalType::Timestamp
        | PhysicalType::TimestampTz
        | PhysicalType::TimestampS
        | PhysicalType::TimestampMs
        | PhysicalType::TimestampNs => &[C::Timestamp, C::Varchar],
        PhysicalType::Decimal => &[C::Double, C::Varchar],
        PhysicalType::HugeInt | PhysicalType::UHugeInt => &[C::Varchar],
        _ => &[],
    }
}

/// Binds `value` to the 1-based parameter `index` of a live prepared
/// statement, converting it to the representation `target` demands.
pub(crate) fn bind_cell(
    table: &FunctionTable,
    stmt: duckdb_prepared_statement,
    index: idx_t,
    target: PhysicalType,
    value: &Value,
) -> Result<()> {
    if value.is_null() {
        // Safety: stmt is a live prepared statement, index was validated
        // by the caller.
        let state = unsafe { (table.bind_null)(stmt, index) };
        return finish(table, stmt, index, PhysicalType::SqlNull, state);
    }

    let target = match target {
        PhysicalType::Any | PhysicalType::Invalid => value.natural_type(),
        other => other,
    };

    if target == PhysicalType::Map {
        #[cfg(feature = "json-fallback")]
        return bind_map_as_json(table, stmt, index, value);
        #[cfg(not(feature = "json-fallback"))]
        return Err(DuckError::UnsupportedType(target));
    }
    if target.is_composite()
        || target == PhysicalType::Interval
        || target == PhysicalType::SqlNull
    {
        return Err(DuckError::UnsupportedType(target));
    }

    let chain = bind_chain(target);
    if chain.is_empty() {
        return Err(DuckError::UnsupportedType(target));
    }

    let arg = convert_for_target(target, value)?;
    for (step, &cap) in chain.iter().enumerate() {
        if !table.supports(cap) {
            continue;
        }
        if let Some(state) = try_apply(table, stmt, index, cap, &arg) {
            if step > 0 {
                trace!("bound {target} parameter {index} through fallback {cap:?}");
            }
            return finish(table, stmt, index, target, state);
        }
    }
    Err(DuckError::UnsupportedType(target))
}

/// The converted value, in the exact representation the first chain step
/// wants; later steps widen from it.
enum NativeArg {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Text(String),
    Bytes(Vec<u8>),
    Date(duckdb_date),
    Time(duckdb_time),
    Timestamp(duckdb_timestamp),
}

fn convert_for_target(target: PhysicalType, value: &Value) -> Result<NativeArg> {
    let arg = match target {
        PhysicalType::Boolean => NativeArg::Bool(convert::to_bool(value)?),
        PhysicalType::TinyInt => NativeArg::I8(convert::to_i8(value)?),
        PhysicalType::SmallInt => NativeArg::I16(convert::to_i16(value)?),
        PhysicalType::Integer => NativeArg::I32(convert::to_i32(value)?),
        PhysicalType::BigInt | PhysicalType::IntegerLiteral => {
            NativeArg::I64(convert::to_i64(value)?)
        }
        PhysicalType::UTinyInt => NativeArg::U8(convert::to_u8(value)?),
        PhysicalType::USmallInt => NativeArg::U16(convert::to_u16(value)?),
        PhysicalType::UInteger => NativeArg::U32(convert::to_u32(value)?),
        PhysicalType::UBigInt => NativeArg::U64(convert::to_u64(value)?),
        PhysicalType::Float => NativeArg::F32(convert::to_f32(value)?),
        // DECIMAL goes through double when available; precision loss past
        // 15 significant digits is documented behavior of this fallback.
        PhysicalType::Double | PhysicalType::Decimal => NativeArg::F64(convert::to_f64(value)?),
        PhysicalType::Varchar
        | PhysicalType::Enum
        | PhysicalType::Uuid
        | PhysicalType::Bit
        | PhysicalType::VarInt
        | PhysicalType::StringLiteral => NativeArg::Text(convert::to_text(value)?),
        PhysicalType::HugeInt => NativeArg::Text(convert::to_hugeint(value)?.to_string()),
        PhysicalType::UHugeInt => NativeArg::Text(convert::to_uhugeint(value)?.to_string()),
        PhysicalType::Blob => NativeArg::Bytes(convert::to_blob(value)?),
        PhysicalType::Date => {
            let date = convert::to_date(value)?;
            NativeArg::Date(duckdb_date { days: date.days })
        }
        PhysicalType::Time | PhysicalType::TimeTz => {
            let time = convert::to_time(value)?;
            NativeArg::Time(duckdb_time { micros: time.micros })
        }
        PhysicalType::Timestamp
        | PhysicalType::TimestampTz
        | PhysicalType::TimestampS
        | PhysicalType::TimestampMs
        | PhysicalType::TimestampNs => {
            let ts = convert::to_timestamp(value)?;
            NativeArg::Timestamp(duckdb_timestamp { micros: ts.micros })
        }
        other => return Err(DuckError::UnsupportedType(other)),
    };
    Ok(arg)
}

impl NativeArg {
    fn as_i32(&self) -> Option<i32> {
        match self {
            NativeArg::Bool(b) => Some(i32::from(*b)),
            NativeArg::I8(v) => Some(i32::from(*v)),
            NativeArg::I16(v) => Some(i32::from(*v)),
            NativeArg::I32(v) => Some(*v),
            NativeArg::U8(v) => Some(i32::from(*v)),
            NativeArg::U16(v) => Some(i32::from(*v)),
            _ => None,
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            NativeArg::I64(v) => Some(*v),
            NativeArg::U32(v) => Some(i64::from(*v)),
            // Only value-preserving: a u64 past i64::MAX skips this step.
            NativeArg::U64(v) => i64::try_from(*v).ok(),
            other => other.as_i32().map(i64::from),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            NativeArg::F32(v) => Some(f64::from(*v)),
            NativeArg::F64(v) => Some(*v),
            _ => None,
        }
    }

    fn render_text(&self) -> Option<String> {
        match self {
            NativeArg::Text(s) => Some(s.clone()),
            NativeArg::Bool(b) => Some(if *b { "true" } else { "false" }.to_string()),
            NativeArg::I8(v) => Some(v.to_string()),
            NativeArg::I16(v) => Some(v.to_string()),
            NativeArg::I32(v) => Some(v.to_string()),
            NativeArg::I64(v) => Some(v.to_string()),
            NativeArg::U8(v) => Some(v.to_string()),
            NativeArg::U16(v) => Some(v.to_string()),
            NativeArg::U32(v) => Some(v.to_string()),
            NativeArg::U64(v) => Some(v.to_string()),
            NativeArg::F32(v) => Some(v.to_string()),
            NativeArg::F64(v) => Some(v.to_string()),
            NativeArg::Date(d) => convert::format_date(crate::types::Date { days: d.days }).ok(),
            NativeArg::Time(t) => convert::format_time(crate::types::Time { micros: t.micros }).ok(),
            NativeArg::Timestamp(ts) => {
                convert::format_timestamp(crate::types::Timestamp { micros: ts.micros }).ok()
            }
            NativeArg::Bytes(_) => None,
        }
    }
}

/// Invokes the entry point for `cap` when the argument can reach it
/// value-preserving; `None` means "not applicable, try the next step".
fn try_apply(
    table: &FunctionTable,
    stmt: duckdb_prepared_statement,
    index: idx_t,
    cap: BindCapability,
    arg: &NativeArg,
) -> Option<duckdb_state> {
    use BindCapability as C;
    // Safety for every call below: stmt is a live prepared statement, the
    // index was validated by the caller, and each slot was bound against
    // the matching native signature.
    match cap {
        C::Null => None,
        C::Boolean => match (arg, table.bind_boolean) {
            (NativeArg::Bool(b), Some(f)) => Some(unsafe { f(stmt, index, *b) }),
            _ => None,
        },
        C::Int8 => match (arg, table.bind_int8) {
            (NativeArg::I8(v), Some(f)) => Some(unsafe { f(stmt, index, *v) }),
            _ => None,
        },
        C::Int16 => match (arg, table.bind_int16) {
            (NativeArg::I16(v), Some(f)) => Some(unsafe { f(stmt, index, *v) }),
            _ => None,
        },
        C::Int32 => match (arg.as_i32(), table.bind_int32) {
            (Some(v), Some(f)) => Some(unsafe { f(stmt, index, v) }),
            _ => None,
        },
        C::Int64 => arg
            .as_i64()
            .map(|v| unsafe { (table.bind_int64)(stmt, index, v) }),
        C::UInt8 => match (arg, table.bind_uint8) {
            (NativeArg::U8(v), Some(f)) => Some(unsafe { f(stmt, index, *v) }),
            _ => None,
        },
        C::UInt16 => match (arg, table.bind_uint16) {
            (NativeArg::U16(v), Some(f)) => Some(unsafe { f(stmt, index, *v) }),
            _ => None,
        },
        C::UInt32 => match (arg, table.bind_uint32) {
            (NativeArg::U32(v), Some(f)) => Some(unsafe { f(stmt, index, *v) }),
            _ => None,
        },
        C::UInt64 => match (arg, table.bind_uint64) {
            (NativeArg::U64(v), Some(f)) => Some(unsafe { f(stmt, index, *v) }),
            _ => None,
        },
        C::Float => match (arg, table.bind_float) {
            (NativeArg::F32(v), Some(f)) => Some(unsafe { f(stmt, index, *v) }),
            _ => None,
        },
        C::Double => arg
            .as_f64()
            .map(|v| unsafe { (table.bind_double)(stmt, index, v) }),
        C::Varchar => arg.render_text().map(|s| {
            let c_text = to_cstring(&s);
            // The native call copies the buffer in; it never retains it.
            unsafe { (table.bind_varchar)(stmt, index, c_text.as_ptr()) }
        }),
        C::Blob => match (arg, table.bind_blob) {
            (NativeArg::Bytes(b), Some(f)) => {
                Some(unsafe { f(stmt, index, b.as_ptr() as *const c_void, b.len() as idx_t) })
            }
            _ => None,
        },
        C::Date => match (arg, table.bind_date) {
            (NativeArg::Date(d), Some(f)) => Some(unsafe { f(stmt, index, *d) }),
            _ => None,
        },
        C::Time => match (arg, table.bind_time) {
            (NativeArg::Time(t), Some(f)) => Some(unsafe { f(stmt, index, *t) }),
            _ => None,
        },
        C::Timestamp => match (arg, table.bind_timestamp) {
            (NativeArg::Timestamp(ts), Some(f)) => Some(unsafe { f(stmt, index, *ts) }),
            _ => None,
        },
    }
}

fn finish(
    table: &FunctionTable,
    stmt: duckdb_prepared_statement,
    index: idx_t,
    target: PhysicalType,
    state: duckdb_state,
) -> Result<()> {
    if state == DUCKDB_STATE_SUCCESS {
        return Ok(());
    }
    // The bind error text lives in the statement; read it while the
    // statement is still alive.
    let message = unsafe { from_cstr((table.prepare_error)(stmt)) };
    let message = if message.is_empty() {
        format!("failed to bind parameter {index} as {target}")
    } else {
        message
    };
    Err(DuckError::NativeCallFailed {
        call: "duckdb_bind",
        message,
    })
}

/// Lossy compatibility shim: the MAP value travels as JSON text through
/// the varchar entry point. Key order and numeric typing are whatever
/// serde_json renders.
#[cfg(feature = "json-fallback")]
fn bind_map_as_json(
    table: &FunctionTable,
    stmt: duckdb_prepared_statement,
    index: idx_t,
    value: &Value,
) -> Result<()> {
    let json = json_render(value)?;
    let c_text = to_cstring(&json);
    // Safety: see `try_apply`.
    let state = unsafe { (table.bind_varchar)(stmt, index, c_text.as_ptr()) };
    finish(table, stmt, index, PhysicalType::Map, state)
}

#[cfg(feature = "json-fallback")]
fn json_render(value: &Value) -> Result<String> {
    let rendered = match value {
        // Already-encoded JSON passes through untouched; anything else
        // becomes a JSON string.
        Value::Text(s) => match serde_json::from_str::<serde_json::Value>(s) {
            Ok(parsed) => parsed,
            Err(_) => serde_json::Value::String(s.clone()),
        },
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::Int8(v) => serde_json::Value::from(*v),
        Value::Int16(v) => serde_json::Value::from(*v),
        Value::Int32(v) => serde_json::Value::from(*v),
        Value::Int64(v) => serde_json::Value::from(*v),
        Value::UInt8(v) => serde_json::Value::from(*v),
        Value::UInt16(v) => serde_json::Value::from(*v),
        Value::UInt32(v) => serde_json::Value::from(*v),
        Value::UInt64(v) => serde_json::Value::from(*v),
        Value::Float(v) => serde_json::Number::from_f64(f64::from(*v))
            .map(serde_json::Value::Number)
            .ok_or_else(|| {
                DuckError::Conversion(format!("value {v} has no JSON representation"))
            })?,
        Value::Double(v) => serde_json::Number::from_f64(*v)
            .map(serde_json::Value::Number)
            .ok_or_else(|| {
                DuckError::Conversion(format!("value {v} has no JSON representation"))
            })?,
        other => serde_json::Value::String(convert::to_text(other)?),
    };
    Ok(rendered.to_string())
}

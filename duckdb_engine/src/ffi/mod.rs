//! Raw DuckDB C ABI surface.
//!
//! Everything in this module mirrors declarations from `duckdb.h` and must
//! stay byte-compatible with them. `RawResult` in particular is the one
//! structure the native library writes into directly; its size, field order
//! and alignment are a hard external contract. The rest of the crate only
//! touches it through `engine::result::QueryResult`.

#![allow(non_camel_case_types)]

use std::ffi::{c_char, c_void, CStr, CString};

/// Opaque database instance handle.
pub type duckdb_database = *mut c_void;
/// Opaque connection handle.
pub type duckdb_connection = *mut c_void;
/// Opaque prepared statement handle.
pub type duckdb_prepared_statement = *mut c_void;
/// Opaque logical type descriptor, destroyed separately from results.
pub type duckdb_logical_type = *mut c_void;

/// Row/column/parameter index type (`idx_t`).
pub type idx_t = u64;

/// Return status of native calls. A C enum, kept as a plain integer so an
/// out-of-range value from a mismatched library build cannot be UB.
pub type duckdb_state = i32;
pub const DUCKDB_STATE_SUCCESS: duckdb_state = 0;
pub const DUCKDB_STATE_ERROR: duckdb_state = 1;

/// Days since 1970-01-01.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct duckdb_date {
    pub days: i32,
}

/// Microseconds since 00:00:00.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct duckdb_time {
    pub micros: i64,
}

/// Microseconds since 1970-01-01 00:00:00 UTC.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct duckdb_timestamp {
    pub micros: i64,
}

/// The raw query result block (`duckdb_result`).
///
/// The first three counters and the two leading pointers are deprecated in
/// the native API but still part of the struct layout; `internal_data` is
/// the engine-private state every modern accessor goes through. Never
/// reorder or resize fields.
#[repr(C)]
#[derive(Debug)]
pub struct RawResult {
    pub deprecated_column_count: idx_t,
    pub deprecated_row_count: idx_t,
    pub deprecated_rows_changed: idx_t,
    pub deprecated_columns: *mut c_void,
    pub deprecated_error_message: *mut c_char,
    pub internal_data: *mut c_void,
}

impl RawResult {
    /// An all-zero block ready to be handed to `duckdb_query` /
    /// `duckdb_execute_prepared` as the out-parameter.
    pub const fn zeroed() -> Self {
        Self {
            deprecated_column_count: 0,
            deprecated_row_count: 0,
            deprecated_rows_changed: 0,
            deprecated_columns: std::ptr::null_mut(),
            deprecated_error_message: std::ptr::null_mut(),
            internal_data: std::ptr::null_mut(),
        }
    }
}

// Layout contract: three 8-byte counters followed by three pointers.
#[cfg(target_pointer_width = "64")]
const _: () = {
    assert!(std::mem::size_of::<RawResult>() == 48);
    assert!(std::mem::align_of::<RawResult>() == 8);
    assert!(std::mem::offset_of!(RawResult, deprecated_rows_changed) == 16);
    assert!(std::mem::offset_of!(RawResult, deprecated_error_message) == 32);
    assert!(std::mem::offset_of!(RawResult, internal_data) == 40);
};

// Function signatures, one alias per bound symbol. Argument order and
// by-value struct usage match the native declarations exactly.

pub type OpenFn =
    unsafe extern "C" fn(*const c_char, *mut duckdb_database) -> duckdb_state;
pub type ConnectFn =
    unsafe extern "C" fn(duckdb_database, *mut duckdb_connection) -> duckdb_state;
pub type DisconnectFn = unsafe extern "C" fn(*mut duckdb_connection);
pub type CloseFn = unsafe extern "C" fn(*mut duckdb_database);
pub type QueryFn =
    unsafe extern "C" fn(duckdb_connection, *const c_char, *mut RawResult) -> duckdb_state;
pub type FreeFn = unsafe extern "C" fn(*mut c_void);

pub type PrepareFn = unsafe extern "C" fn(
    duckdb_connection,
    *const c_char,
    *mut duckdb_prepared_statement,
) -> duckdb_state;
pub type DestroyPrepareFn = unsafe extern "C" fn(*mut duckdb_prepared_statement);
pub type ExecutePreparedFn =
    unsafe extern "C" fn(duckdb_prepared_statement, *mut RawResult) -> duckdb_state;
pub type NParamsFn = unsafe extern "C" fn(duckdb_prepared_statement) -> idx_t;
pub type ParamTypeFn = unsafe extern "C" fn(duckdb_prepared_statement, idx_t) -> i32;
pub type ParamLogicalTypeFn =
    unsafe extern "C" fn(duckdb_prepared_statement, idx_t) -> duckdb_logical_type;
pub type ClearBindingsFn = unsafe extern "C" fn(duckdb_prepared_statement) -> duckdb_state;
pub type StatementTypeFn = unsafe extern "C" fn(duckdb_prepared_statement) -> i32;
pub type PrepareErrorFn =
    unsafe extern "C" fn(duckdb_prepared_statement) -> *const c_char;

pub type BindNullFn =
    unsafe extern "C" fn(duckdb_prepared_statement, idx_t) -> duckdb_state;
pub type BindBooleanFn =
    unsafe extern "C" fn(duckdb_prepared_statement, idx_t, bool) -> duckdb_state;
pub type BindInt8Fn =
    unsafe extern "C" fn(duckdb_prepared_statement, idx_t, i8) -> duckdb_state;
pub type BindInt16Fn =
    unsafe extern "C" fn(duckdb_prepared_statement, idx_t, i16) -> duckdb_state;
pub type BindInt32Fn =
    unsafe extern "C" fn(duckdb_prepared_statement, idx_t, i32) -> duckdb_state;
pub type BindInt64Fn =
    unsafe extern "C" fn(duckdb_prepared_statement, idx_t, i64) -> duckdb_state;
pub type BindUInt8Fn =
    unsafe extern "C" fn(duckdb_prepared_statement, idx_t, u8) -> duckdb_state;
pub type BindUInt16Fn =
    unsafe extern "C" fn(duckdb_prepared_statement, idx_t, u16) -> duckdb_state;
pub type BindUInt32Fn =
    unsafe extern "C" fn(duckdb_prepared_statement, idx_t, u32) -> duckdb_state;
pub type BindUInt64Fn =
    unsafe extern "C" fn(duckdb_prepared_statement, idx_t, u64) -> duckdb_state;
pub type BindFloatFn =
    unsafe extern "C" fn(duckdb_prepared_statement, idx_t, f32) -> duckdb_state;
pub type BindDoubleFn =
    unsafe extern "C" fn(duckdb_prepared_statement, idx_t, f64) -> duckdb_state;
pub type BindVarcharFn =
    unsafe extern "C" fn(duckdb_prepared_statement, idx_t, *const c_char) -> duckdb_state;
pub type BindBlobFn = unsafe extern "C" fn(
    duckdb_prepared_statement,
    idx_t,
    *const c_void,
    idx_t,
) -> duckdb_state;
pub type BindDateFn =
    unsafe extern "C" fn(duckdb_prepared_statement, idx_t, duckdb_date) -> duckdb_state;
pub type BindTimeFn =
    unsafe extern "C" fn(duckdb_prepared_statement, idx_t, duckdb_time) -> duckdb_state;
pub type BindTimestampFn =
    unsafe extern "C" fn(duckdb_prepared_statement, idx_t, duckdb_timestamp) -> duckdb_state;

pub type ColumnCountFn = unsafe extern "C" fn(*mut RawResult) -> idx_t;
pub type RowCountFn = unsafe extern "C" fn(*mut RawResult) -> idx_t;
pub type RowsChangedFn = unsafe extern "C" fn(*mut RawResult) -> idx_t;
pub type ColumnNameFn = unsafe extern "C" fn(*mut RawResult, idx_t) -> *const c_char;
pub type ColumnTypeFn = unsafe extern "C" fn(*mut RawResult, idx_t) -> i32;
pub type ColumnLogicalTypeFn =
    unsafe extern "C" fn(*mut RawResult, idx_t) -> duckdb_logical_type;
pub type ResultErrorFn = unsafe extern "C" fn(*mut RawResult) -> *const c_char;
pub type DestroyResultFn = unsafe extern "C" fn(*mut RawResult);

pub type ValueIsNullFn = unsafe extern "C" fn(*mut RawResult, idx_t, idx_t) -> bool;
pub type ValueBooleanFn = unsafe extern "C" fn(*mut RawResult, idx_t, idx_t) -> bool;
pub type ValueInt8Fn = unsafe extern "C" fn(*mut RawResult, idx_t, idx_t) -> i8;
pub type ValueInt16Fn = unsafe extern "C" fn(*mut RawResult, idx_t, idx_t) -> i16;
pub type ValueInt32Fn = unsafe extern "C" fn(*mut RawResult, idx_t, idx_t) -> i32;
pub type ValueInt64Fn = unsafe extern "C" fn(*mut RawResult, idx_t, idx_t) -> i64;
pub type ValueUInt8Fn = unsafe extern "C" fn(*mut RawResult, idx_t, idx_t) -> u8;
pub type ValueUInt16Fn = unsafe extern "C" fn(*mut RawResult, idx_t, idx_t) -> u16;
pub type ValueUInt32Fn = unsafe extern "C" fn(*mut RawResult, idx_t, idx_t) -> u32;
pub type ValueUInt64Fn = unsafe extern "C" fn(*mut RawResult, idx_t, idx_t) -> u64;
pub type ValueFloatFn = unsafe extern "C" fn(*mut RawResult, idx_t, idx_t) -> f32;
pub type ValueDoubleFn = unsafe extern "C" fn(*mut RawResult, idx_t, idx_t) -> f64;
pub type ValueDateFn = unsafe extern "C" fn(*mut RawResult, idx_t, idx_t) -> duckdb_date;
pub type ValueTimeFn = unsafe extern "C" fn(*mut RawResult, idx_t, idx_t) -> duckdb_time;
pub type ValueTimestampFn =
    unsafe extern "C" fn(*mut RawResult, idx_t, idx_t) -> duckdb_timestamp;
pub type ValueVarcharFn = unsafe extern "C" fn(*mut RawResult, idx_t, idx_t) -> *mut c_char;

pub type DecimalWidthFn = unsafe extern "C" fn(duckdb_logical_type) -> u8;
pub type DecimalScaleFn = unsafe extern "C" fn(duckdb_logical_type) -> u8;
pub type DestroyLogicalTypeFn = unsafe extern "C" fn(*mut duckdb_logical_type);

/// Builds a null-terminated copy of `s` for a native call that copies in.
///
/// Native calls in this crate never retain the buffer, so dropping the
/// returned `CString` after the call returns is always safe. Interior NUL
/// bytes end the string early: the native side reads byte-by-byte until
/// the first zero, so everything past it would be invisible anyway.
pub fn to_cstring(s: &str) -> CString {
    let bytes = match s.as_bytes().iter().position(|&b| b == 0) {
        Some(idx) => &s.as_bytes()[..idx],
        None => s.as_bytes(),
    };
    // The slice is NUL-free by construction.
    CString::new(bytes).unwrap_or_default()
}

/// Reads a native null-terminated string into an owned `String`.
///
/// A null pointer yields an empty string: at this layer "no text" is not an
/// error, and database-value NULL-ness must always come from the NULL
/// accessor instead (some accessors return a valid empty string for a
/// non-NULL empty value).
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated buffer that stays valid
/// for the duration of the call.
pub unsafe fn from_cstr(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    CStr::from_ptr(ptr).to_string_lossy().into_owned()
}

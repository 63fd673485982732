//! Loading `libduckdb` and binding its entry points.
//!
//! The [`FunctionTable`] is built exactly once per loaded library and never
//! mutated afterwards; every handle derived from the same library shares it
//! read-only through an `Arc`. Required symbols fail the load with
//! [`DuckError::MissingSymbol`]; optional symbols (availability differs
//! across libduckdb builds) leave their slot `None` and callers go through
//! the documented fallback chains instead.

use crate::error::{DuckError, Result};
use crate::ffi::*;
use lazy_static::lazy_static;
use libloading::Library;
use log::{debug, trace};
use std::collections::HashMap;
use std::ffi::{c_char, c_void};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// A bind entry point the native library may or may not provide.
///
/// The binder plans each parameter as an ordered chain of these and takes
/// the first one the loaded library actually resolves.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindCapability {
    Null = 0,
    Boolean = 1,
    Int8 = 2,
    Int16 = 3,
    Int32 = 4,
    Int64 = 5,
    UInt8 = 6,
    UInt16 = 7,
    UInt32 = 8,
    UInt64 = 9,
    Float = 10,
    Double = 11,
    Varchar = 12,
    Blob = 13,
    Date = 14,
    Time = 15,
    Timestamp = 16,
}

/// Typed slots for every bound native entry point.
///
/// Required slots are plain function pointers; optional slots are
/// `Option`s. Immutable once built. `Copy` because it is nothing but
/// function pointers; the pointers stay valid while the owning
/// [`NativeLibrary`] lives, and the process-wide registry keeps every
/// loaded library alive for the rest of the process.
#[derive(Clone, Copy, Debug)]
pub struct FunctionTable {
    // Database / connection lifecycle
    pub(crate) open: OpenFn,
    pub(crate) connect: ConnectFn,
    pub(crate) disconnect: DisconnectFn,
    pub(crate) close: CloseFn,
    pub(crate) query: QueryFn,
    pub(crate) free: Option<FreeFn>,

    // Prepared statements
    pub(crate) prepare: PrepareFn,
    pub(crate) destroy_prepare: DestroyPrepareFn,
    pub(crate) execute_prepared: ExecutePreparedFn,
    pub(crate) nparams: NParamsFn,
    pub(crate) prepare_error: PrepareErrorFn,
    pub(crate) param_type: Option<ParamTypeFn>,
    pub(crate) param_logical_type: Option<ParamLogicalTypeFn>,
    pub(crate) clear_bindings: Option<ClearBindingsFn>,
    pub(crate) statement_type: Option<StatementTypeFn>,

    // Parameter binding
    pub(crate) bind_null: BindNullFn,
    pub(crate) bind_boolean: Option<BindBooleanFn>,
    pub(crate) bind_int8: Option<BindInt8Fn>,
    pub(crate) bind_int16: Option<BindInt16Fn>,
    pub(crate) bind_int32: Option<BindInt32Fn>,
    pub(crate) bind_int64: BindInt64Fn,
    pub(crate) bind_uint8: Option<BindUInt8Fn>,
    pub(crate) bind_uint16: Option<BindUInt16Fn>,
    pub(crate) bind_uint32: Option<BindUInt32Fn>,
    pub(crate) bind_uint64: Option<BindUInt64Fn>,
    pub(crate) bind_float: Option<BindFloatFn>,
    pub(crate) bind_double: BindDoubleFn,
    pub(crate) bind_varchar: BindVarcharFn,
    pub(crate) bind_blob: Option<BindBlobFn>,
    pub(crate) bind_date: Option<BindDateFn>,
    pub(crate) bind_time: Option<BindTimeFn>,
    pub(crate) bind_timestamp: Option<BindTimestampFn>,

    // Result metadata
    pub(crate) column_count: ColumnCountFn,
    pub(crate) row_count: RowCountFn,
    pub(crate) rows_changed: Option<RowsChangedFn>,
    pub(crate) column_name: ColumnNameFn,
    pub(crate) column_type: Option<ColumnTypeFn>,
    pub(crate) column_logical_type: Option<ColumnLogicalTypeFn>,
    pub(crate) result_error: ResultErrorFn,
    pub(crate) destroy_result: DestroyResultFn,

    // Cell accessors
    pub(crate) value_is_null: ValueIsNullFn,
    pub(crate) value_boolean: Option<ValueBooleanFn>,
    pub(crate) value_int8: Option<ValueInt8Fn>,
    pub(crate) value_int16: Option<ValueInt16Fn>,
    pub(crate) value_int32: Option<ValueInt32Fn>,
    pub(crate) value_int64: Option<ValueInt64Fn>,
    pub(crate) value_uint8: Option<ValueUInt8Fn>,
    pub(crate) value_uint16: Option<ValueUInt16Fn>,
    pub(crate) value_uint32: Option<ValueUInt32Fn>,
    pub(crate) value_uint64: Option<ValueUInt64Fn>,
    pub(crate) value_float: Option<ValueFloatFn>,
    pub(crate) value_double: Option<ValueDoubleFn>,
    pub(crate) value_date: Option<ValueDateFn>,
    pub(crate) value_time: Option<ValueTimeFn>,
    pub(crate) value_timestamp: Option<ValueTimestampFn>,
    pub(crate) value_varchar: ValueVarcharFn,

    // Logical types
    pub(crate) decimal_width: Option<DecimalWidthFn>,
    pub(crate) decimal_scale: Option<DecimalScaleFn>,
    pub(crate) destroy_logical_type: Option<DestroyLogicalTypeFn>,

    optional_resolved: usize,
}

impl FunctionTable {
    /// Resolves every slot against an open library handle.
    fn bind(lib: &Library) -> Result<Self> {
        let mut n = 0usize;
        // Safety: each symbol is bound against the signature alias from
        // `ffi`, which mirrors the native header; the resulting pointers
        // stay valid for as long as the owning `Library` lives, and
        // `NativeLibrary` keeps that `Library` alongside this table.
        unsafe {
            Ok(Self {
                open: required(lib, "duckdb_open")?,
                connect: required(lib, "duckdb_connect")?,
                disconnect: required(lib, "duckdb_disconnect")?,
                close: required(lib, "duckdb_close")?,
                query: required(lib, "duckdb_query")?,
                free: optional(lib, "duckdb_free", &mut n),

                prepare: required(lib, "duckdb_prepare")?,
                destroy_prepare: required(lib, "duckdb_destroy_prepare")?,
                execute_prepared: required(lib, "duckdb_execute_prepared")?,
                nparams: required(lib, "duckdb_nparams")?,
                prepare_error: required(lib, "duckdb_prepare_error")?,
                param_type: optional(lib, "duckdb_param_type", &mut n),
                param_logical_type: optional(lib, "duckdb_param_logical_type", &mut n),
                clear_bindings: optional(lib, "duckdb_clear_bindings", &mut n),
                statement_type: optional(lib, "duckdb_prepared_statement_type", &mut n),

                bind_null: required(lib, "duckdb_bind_null")?,
                bind_boolean: optional(lib, "duckdb_bind_boolean", &mut n),
                bind_int8: optional(lib, "duckdb_bind_int8", &mut n),
                bind_int16: optional(lib, "duckdb_bind_int16", &mut n),
                bind_int32: optional(lib, "duckdb_bind_int32", &mut n),
                bind_int64: required(lib, "duckdb_bind_int64")?,
                bind_uint8: optional(lib, "duckdb_bind_uint8", &mut n),
                bind_uint16: optional(lib, "duckdb_bind_uint16", &mut n),
                bind_uint32: optional(lib, "duckdb_bind_uint32", &mut n),
                bind_uint64: optional(lib, "duckdb_bind_uint64", &mut n),
                bind_float: optional(lib, "duckdb_bind_float", &mut n),
                bind_double: required(lib, "duckdb_bind_double")?,
                bind_varchar: required(lib, "duckdb_bind_varchar")?,
                bind_blob: optional(lib, "duckdb_bind_blob", &mut n),
                bind_date: optional(lib, "duckdb_bind_date", &mut n),
                bind_time: optional(lib, "duckdb_bind_time", &mut n),
                bind_timestamp: optional(lib, "duckdb_bind_timestamp", &mut n),

                column_count: required(lib, "duckdb_column_count")?,
                row_count: required(lib, "duckdb_row_count")?,
                rows_changed: optional(lib, "duckdb_rows_changed", &mut n),
                column_name: required(lib, "duckdb_column_name")?,
                column_type: optional(lib, "duckdb_column_type", &mut n),
                column_logical_type: optional(lib, "duckdb_column_logical_type", &mut n),
                result_error: required(lib, "duckdb_result_error")?,
                destroy_result: required(lib, "duckdb_destroy_result")?,

                value_is_null: required(lib, "duckdb_value_is_null")?,
                value_boolean: optional(lib, "duckdb_value_boolean", &mut n),
                value_int8: optional(lib, "duckdb_value_int8", &mut n),
                value_int16: optional(lib, "duckdb_value_int16", &mut n),
                value_int32: optional(lib, "duckdb_value_int32", &mut n),
                value_int64: optional(lib, "duckdb_value_int64", &mut n),
                value_uint8: optional(lib, "duckdb_value_uint8", &mut n),
                value_uint16: optional(lib, "duckdb_value_uint16", &mut n),
                value_uint32: optional(lib, "duckdb_value_uint32", &mut n),
                value_uint64: optional(lib, "duckdb_value_uint64", &mut n),
                value_float: optional(lib, "duckdb_value_float", &mut n),
                value_double: optional(lib, "duckdb_value_double", &mut n),
                value_date: optional(lib, "duckdb_value_date", &mut n),
                value_time: optional(lib, "duckdb_value_time", &mut n),
                value_timestamp: optional(lib, "duckdb_value_timestamp", &mut n),
                value_varchar: required(lib, "duckdb_value_varchar")?,

                decimal_width: optional(lib, "duckdb_decimal_width", &mut n),
                decimal_scale: optional(lib, "duckdb_decimal_scale", &mut n),
                destroy_logical_type: optional(lib, "duckdb_destroy_logical_type", &mut n),

                optional_resolved: n,
            })
        }
    }

    /// Whether the loaded library resolved the bind entry point for `cap`.
    pub fn supports(&self, cap: BindCapability) -> bool {
        match cap {
            BindCapability::Null
            | BindCapability::Int64
            | BindCapability::Double
            | BindCapability::Varchar => true,
            BindCapability::Boolean => self.bind_boolean.is_some(),
            BindCapability::Int8 => self.bind_int8.is_some(),
            BindCapability::Int16 => self.bind_int16.is_some(),
            BindCapability::Int32 => self.bind_int32.is_some(),
            BindCapability::UInt8 => self.bind_uint8.is_some(),
            BindCapability::UInt16 => self.bind_uint16.is_some(),
            BindCapability::UInt32 => self.bind_uint32.is_some(),
            BindCapability::UInt64 => self.bind_uint64.is_some(),
            BindCapability::Float => self.bind_float.is_some(),
            BindCapability::Blob => self.bind_blob.is_some(),
            BindCapability::Date => self.bind_date.is_some(),
            BindCapability::Time => self.bind_time.is_some(),
            BindCapability::Timestamp => self.bind_timestamp.is_some(),
        }
    }

    /// How many optional slots this build resolved, for load logging.
    pub fn optional_resolved(&self) -> usize {
        self.optional_resolved
    }

    /// Copies a native-allocated string out and releases the native buffer
    /// through `duckdb_free` when that symbol resolved. Without it the
    /// buffer stays with the native allocator.
    ///
    /// # Safety
    /// `ptr` must be null or a live NUL-terminated buffer allocated by the
    /// native library, and must not be used after this call.
    pub(crate) unsafe fn copy_and_free(&self, ptr: *mut c_char) -> String {
        let text = from_cstr(ptr);
        if let Some(free) = self.free {
            if !ptr.is_null() {
                free(ptr as *mut c_void);
            }
        }
        text
    }
}

unsafe fn required<T: Copy>(lib: &Library, name: &'static str) -> Result<T> {
    match lib.get::<T>(name.as_bytes()) {
        Ok(sym) => Ok(*sym),
        Err(_) => Err(DuckError::MissingSymbol(name)),
    }
}

unsafe fn optional<T: Copy>(lib: &Library, name: &'static str, resolved: &mut usize) -> Option<T> {
    match lib.get::<T>(name.as_bytes()) {
        Ok(sym) => {
            *resolved += 1;
            Some(*sym)
        }
        Err(_) => {
            trace!("optional symbol {name} not present in this build");
            None
        }
    }
}

/// A loaded DuckDB shared library and its bound function table.
#[derive(Debug)]
pub struct NativeLibrary {
    table: FunctionTable,
    path: PathBuf,
    // Keeps the symbols in `table` alive; never touched after binding.
    _lib: Library,
}

lazy_static! {
    // Process-wide cache: the table for a given library is built once and
    // shared for the rest of the process lifetime.
    static ref LOADED: Mutex<HashMap<PathBuf, Arc<NativeLibrary>>> = Mutex::new(HashMap::new());
}

impl NativeLibrary {
    /// Loads (or returns the already-loaded) library at `path` and binds
    /// the full function table.
    pub fn load(path: impl AsRef<Path>) -> Result<Arc<Self>> {
        let path = path.as_ref().to_path_buf();
        let mut cache = LOADED
            .lock()
            .map_err(|_| DuckError::Internal("library registry mutex poisoned".to_string()))?;
        if let Some(existing) = cache.get(&path) {
            return Ok(existing.clone());
        }

        // Safety: loading a shared library runs its initializers; a DuckDB
        // build has no initializer side effects we need to guard against.
        let lib = unsafe { Library::new(&path) }
            .map_err(|e| DuckError::LibraryLoad(format!("{}: {e}", path.display())))?;
        let table = FunctionTable::bind(&lib)?;
        debug!(
            "loaded DuckDB library {} ({} optional symbols resolved)",
            path.display(),
            table.optional_resolved()
        );

        let loaded = Arc::new(Self {
            table,
            path: path.clone(),
            _lib: lib,
        });
        cache.insert(path, loaded.clone());
        Ok(loaded)
    }

    /// Loads the library named by `DUCKDB_LIBRARY_PATH`, or the platform
    /// soname resolved by the system loader. An explicitly-set path that
    /// fails to load is an error, not a fallthrough: the caller asked for
    /// that exact library.
    pub fn load_default() -> Result<Arc<Self>> {
        if let Ok(env_path) = std::env::var("DUCKDB_LIBRARY_PATH") {
            if !env_path.is_empty() {
                return Self::load(env_path);
            }
        }
        Self::load(platform_soname())
    }

    pub fn table(&self) -> &FunctionTable {
        &self.table
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn platform_soname() -> &'static str {
    if cfg!(target_os = "windows") {
        "duckdb.dll"
    } else if cfg!(target_os = "macos") {
        "libduckdb.dylib"
    } else {
        "libduckdb.so"
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_library_fails() {
        let result = NativeLibrary::load("/nonexistent/path/libduckdb.so");
        match result {
            Err(DuckError::LibraryLoad(msg)) => {
                assert!(msg.contains("/nonexistent/path/libduckdb.so"))
            }
            other => panic!("expected LibraryLoad error, got {other:?}"),
        }
    }

    #[test]
    fn test_platform_soname_is_duckdb() {
        assert!(platform_soname().contains("duckdb"));
    }

    #[test]
    fn test_supports_required_capabilities_always() {
        let table = stub::table_minimal();
        assert!(table.supports(BindCapability::Null));
        assert!(table.supports(BindCapability::Int64));
        assert!(table.supports(BindCapability::Double));
        assert!(table.supports(BindCapability::Varchar));
    }

    #[test]
    fn test_supports_reflects_missing_optional_slots() {
        let table = stub::table_minimal();
        assert!(!table.supports(BindCapability::Boolean));
        assert!(!table.supports(BindCapability::Int8));
        assert!(!table.supports(BindCapability::Date));
        assert!(!table.supports(BindCapability::Blob));

        let full = stub::table();
        assert!(full.supports(BindCapability::Boolean));
        assert!(full.supports(BindCapability::UInt64));
        assert!(full.supports(BindCapability::Timestamp));
    }
}

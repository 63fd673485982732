use crate::engine::binder;
use crate::engine::cancel::CancelToken;
use crate::engine::connection::ConnectionInner;
use crate::engine::logical::LogicalTypeHandle;
use crate::engine::result::QueryResult;
use crate::engine::{lock_poisoned, HandleSlot};
use crate::error::{DuckError, Result};
use crate::ffi::{from_cstr, RawResult, DUCKDB_STATE_SUCCESS};
use crate::library::FunctionTable;
use crate::types::{PhysicalType, Value};
use std::ffi::c_void;
use std::sync::{Arc, Mutex};

/// What kind of statement a prepared handle will execute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatementKind {
    Invalid,
    Select,
    Insert,
    Update,
    Explain,
    Delete,
    Prepare,
    Create,
    Execute,
    Alter,
    Transaction,
    Copy,
    Analyze,
    VariableSet,
    CreateFunc,
    Drop,
    Export,
    Pragma,
    Vacuum,
    Call,
    Set,
    Load,
    Relation,
    Extension,
    LogicalPlan,
    Attach,
    Detach,
    Multi,
}

impl StatementKind {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => Self::Select,
            2 => Self::Insert,
            3 => Self::Update,
            4 => Self::Explain,
            5 => Self::Delete,
            6 => Self::Prepare,
            7 => Self::Create,
            8 => Self::Execute,
            9 => Self::Alter,
            10 => Self::Transaction,
            11 => Self::Copy,
            12 => Self::Analyze,
            13 => Self::VariableSet,
            14 => Self::CreateFunc,
            15 => Self::Drop,
            16 => Self::Export,
            17 => Self::Pragma,
            18 => Self::Vacuum,
            19 => Self::Call,
            20 => Self::Set,
            21 => Self::Load,
            22 => Self::Relation,
            23 => Self::Extension,
            24 => Self::LogicalPlan,
            25 => Self::Attach,
            26 => Self::Detach,
            27 => Self::Multi,
            _ => Self::Invalid,
        }
    }
}

/// A prepared statement bound to one connection.
///
/// Parameters may be rebound any number of times between prepare and
/// execute; rebinding an index overwrites the prior binding. Bind calls
/// are 1-based, parameter *metadata* queries are 0-based, a native API
/// quirk this surface reproduces on purpose.
pub struct PreparedStatement {
    slot: Mutex<HandleSlot>,
    conn: Arc<ConnectionInner>,
    param_count: u64,
}

unsafe impl Send for PreparedStatement {}
unsafe impl Sync for PreparedStatement {}

impl std::fmt::Debug for PreparedStatement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedStatement")
            .field("param_count", &self.param_count)
            .finish()
    }
}

impl PreparedStatement {
    pub(crate) fn from_raw(ptr: *mut c_void, conn: Arc<ConnectionInner>, param_count: u64) -> Self {
        Self {
            slot: Mutex::new(HandleSlot::new(ptr)),
            conn,
            param_count,
        }
    }

    fn table(&self) -> &FunctionTable {
        self.conn.table()
    }

    /// Number of `?` placeholders in the statement.
    pub fn param_count(&self) -> u64 {
        self.param_count
    }

    /// Binds `value` to the 1-based parameter `index`, converting to the
    /// exact representation `target` demands.
    pub fn bind(&self, index: u64, target: PhysicalType, value: &Value) -> Result<()> {
        self.check_bind_index(index)?;
        let slot = self
            .slot
            .lock()
            .map_err(|_| lock_poisoned("statement handle"))?;
        let ptr = slot.get("statement")?;
        binder::bind_cell(self.table(), ptr, index, target, value)
    }

    /// Binds `value` using the statement's own parameter type metadata
    /// when the loaded build exposes it, the value's natural type
    /// otherwise.
    pub fn bind_value(&self, index: u64, value: &Value) -> Result<()> {
        self.check_bind_index(index)?;
        let target = match self.param_type(index - 1) {
            Ok(ty) if ty != PhysicalType::Invalid && ty != PhysicalType::Any => ty,
            _ => value.natural_type(),
        };
        self.bind(index, target, value)
    }

    /// Parameter type metadata. `index` is 0-based, unlike `bind`.
    pub fn param_type(&self, index: u64) -> Result<PhysicalType> {
        if index >= self.param_count {
            return Err(DuckError::ParameterIndexOutOfRange {
                index,
                count: self.param_count,
            });
        }
        let slot = self
            .slot
            .lock()
            .map_err(|_| lock_poisoned("statement handle"))?;
        let ptr = slot.get("statement")?;
        let param_type = self
            .table()
            .param_type
            .ok_or_else(|| DuckError::UnsupportedFeature("duckdb_param_type".to_string()))?;
        // Safety: ptr is live and serialized by the lock.
        Ok(PhysicalType::from_raw(unsafe { param_type(ptr, index) }))
    }

    /// Owned logical type descriptor for a parameter. `index` is 0-based.
    pub fn param_logical_type(&self, index: u64) -> Result<LogicalTypeHandle<'_>> {
        if index >= self.param_count {
            return Err(DuckError::ParameterIndexOutOfRange {
                index,
                count: self.param_count,
            });
        }
        let slot = self
            .slot
            .lock()
            .map_err(|_| lock_poisoned("statement handle"))?;
        let ptr = slot.get("statement")?;
        let fetch = self.table().param_logical_type.ok_or_else(|| {
            DuckError::UnsupportedFeature("duckdb_param_logical_type".to_string())
        })?;
        // Safety: ptr is live; the handle owns the returned descriptor.
        Ok(LogicalTypeHandle::new(unsafe { fetch(ptr, index) }, self.table()))
    }

    /// Resets every parameter to unbound in one native call.
    pub fn clear_bindings(&self) -> Result<()> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| lock_poisoned("statement handle"))?;
        let ptr = slot.get("statement")?;
        let clear = self
            .table()
            .clear_bindings
            .ok_or_else(|| DuckError::UnsupportedFeature("duckdb_clear_bindings".to_string()))?;
        // Safety: ptr is live and serialized by the lock.
        let state = unsafe { clear(ptr) };
        if state != DUCKDB_STATE_SUCCESS {
            let message = unsafe { from_cstr((self.table().prepare_error)(ptr)) };
            return Err(DuckError::NativeCallFailed {
                call: "duckdb_clear_bindings",
                message: if message.is_empty() {
                    "failed to clear bindings".to_string()
                } else {
                    message
                },
            });
        }
        Ok(())
    }

    pub fn statement_kind(&self) -> Result<StatementKind> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| lock_poisoned("statement handle"))?;
        let ptr = slot.get("statement")?;
        let kind = self.table().statement_type.ok_or_else(|| {
            DuckError::UnsupportedFeature("duckdb_prepared_statement_type".to_string())
        })?;
        // Safety: ptr is live and serialized by the lock.
        Ok(StatementKind::from_raw(unsafe { kind(ptr) }))
    }

    /// Executes with the current bindings.
    pub fn execute(&self) -> Result<QueryResult> {
        self.run(None)
    }

    /// Like [`execute`](Self::execute), but refuses to start the native
    /// call once `token` is cancelled.
    pub fn execute_with_cancel(&self, token: &CancelToken) -> Result<QueryResult> {
        self.run(Some(token))
    }

    fn run(&self, cancel: Option<&CancelToken>) -> Result<QueryResult> {
        if let Some(token) = cancel {
            if token.is_cancelled() {
                return Err(DuckError::Cancelled);
            }
        }
        let table = self.table();
        let mut raw = RawResult::zeroed();
        let state = {
            let slot = self
                .slot
                .lock()
                .map_err(|_| lock_poisoned("statement handle"))?;
            let ptr = slot.get("statement")?;
            // Safety: ptr is live and serialized by the lock; raw is
            // owned by this frame until handed to QueryResult.
            unsafe { (table.execute_prepared)(ptr, &mut raw) }
        };
        if state != DUCKDB_STATE_SUCCESS {
            // Extract before destroy: the text lives in the result block.
            let mut message = unsafe { from_cstr((table.result_error)(&mut raw)) };
            unsafe { (table.destroy_result)(&mut raw) };
            if message.is_empty() {
                message = "prepared statement execution failed".to_string();
            }
            self.conn.db.logger.log_native_error("duckdb_execute_prepared", &message);
            return Err(DuckError::NativeCallFailed {
                call: "duckdb_execute_prepared",
                message,
            });
        }
        Ok(QueryResult::new(raw, self.conn.clone()))
    }

    pub fn is_open(&self) -> bool {
        self.slot.lock().map(|s| !s.closed).unwrap_or(false)
    }

    /// Destroys the native statement. Idempotent; any other operation
    /// afterwards reports `ClosedHandle`.
    pub fn close(&self) -> Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| lock_poisoned("statement handle"))?;
        if slot.closed {
            return Ok(());
        }
        slot.closed = true;
        if !slot.ptr.is_null() {
            // Safety: releases exactly once, guarded by `closed`.
            unsafe { (self.table().destroy_prepare)(&mut slot.ptr) };
            slot.ptr = std::ptr::null_mut();
        }
        Ok(())
    }

    fn check_bind_index(&self, index: u64) -> Result<()> {
        // Bind indexes are 1-based; 0 is as out-of-range as count+1.
        if index == 0 || index > self.param_count {
            return Err(DuckError::ParameterIndexOutOfRange {
                index,
                count: self.param_count,
            });
        }
        Ok(())
    }
}

impl Drop for PreparedStatement {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::database::Database;
    use crate::library::stub;
    use serial_test::serial;

    fn statement() -> PreparedStatement {
        Database::open_stub(stub::table())
            .unwrap()
            .connect()
            .unwrap()
            .prepare("INSERT INTO t VALUES (?, ?, ?)")
            .unwrap()
    }

    #[test]
    fn test_prepare_reports_param_count() {
        let stmt = statement();
        assert_eq!(stmt.param_count(), 3);
    }

    #[test]
    #[serial]
    fn test_bind_valid_indexes() {
        let stmt = statement();
        stmt.bind(1, PhysicalType::Integer, &Value::Int32(1)).unwrap();
        stmt.bind(2, PhysicalType::Varchar, &Value::Text("abc".to_string()))
            .unwrap();
        stmt.bind(3, PhysicalType::Boolean, &Value::Boolean(true)).unwrap();
        // Rebinding an index overwrites the prior binding.
        stmt.bind(1, PhysicalType::Integer, &Value::Int32(2)).unwrap();
    }

    #[test]
    fn test_bind_index_out_of_range() {
        let stmt = statement();
        match stmt.bind(4, PhysicalType::Integer, &Value::Int32(1)) {
            Err(DuckError::ParameterIndexOutOfRange { index: 4, count: 3 }) => (),
            other => panic!("expected ParameterIndexOutOfRange, got {other:?}"),
        }
        // Binds are 1-based.
        match stmt.bind(0, PhysicalType::Integer, &Value::Int32(1)) {
            Err(DuckError::ParameterIndexOutOfRange { index: 0, count: 3 }) => (),
            other => panic!("expected ParameterIndexOutOfRange, got {other:?}"),
        }
    }

    #[test]
    fn test_param_type_is_zero_based() {
        let stmt = statement();
        assert_eq!(stmt.param_type(0).unwrap(), PhysicalType::Integer);
        assert_eq!(stmt.param_type(2).unwrap(), PhysicalType::Integer);
        match stmt.param_type(3) {
            Err(DuckError::ParameterIndexOutOfRange { index: 3, count: 3 }) => (),
            other => panic!("expected ParameterIndexOutOfRange, got {other:?}"),
        }
    }

    #[test]
    #[serial]
    fn test_bind_value_uses_param_metadata() {
        use crate::library::BindCapability;

        let stmt = statement();
        stub::reset_last_bind();
        // The stub reports INTEGER for every parameter, so an i64 host
        // value narrows to the int32 entry point.
        stmt.bind_value(1, &Value::Int64(7)).unwrap();
        assert_eq!(stub::last_bind(), Some(BindCapability::Int32));
    }

    #[test]
    fn test_clear_bindings_supported_and_not() {
        let stmt = statement();
        stmt.clear_bindings().unwrap();

        let minimal = Database::open_stub(stub::table_minimal())
            .unwrap()
            .connect()
            .unwrap()
            .prepare("SELECT ?")
            .unwrap();
        match minimal.clear_bindings() {
            Err(DuckError::UnsupportedFeature(name)) => {
                assert_eq!(name, "duckdb_clear_bindings")
            }
            other => panic!("expected UnsupportedFeature, got {other:?}"),
        }
    }

    #[test]
    fn test_execute_returns_result() {
        let stmt = statement();
        let result = stmt.execute().unwrap();
        assert_eq!(result.row_count(), 1);
    }

    #[test]
    fn test_execute_cancelled() {
        let stmt = statement();
        let token = CancelToken::new();
        token.cancel();
        match stmt.execute_with_cancel(&token) {
            Err(DuckError::Cancelled) => (),
            other => panic!("expected Cancelled, got {other:?}"),
        }
    }

    #[test]
    fn test_close_idempotent_and_rejects_use() {
        let stmt = statement();
        stmt.close().unwrap();
        stmt.close().unwrap();
        assert!(!stmt.is_open());
        match stmt.bind(1, PhysicalType::Integer, &Value::Int32(1)) {
            Err(DuckError::ClosedHandle("statement")) => (),
            other => panic!("expected ClosedHandle, got {other:?}"),
        }
        match stmt.execute() {
            Err(DuckError::ClosedHandle("statement")) => (),
            other => panic!("expected ClosedHandle, got {other:?}"),
        }
        match stmt.param_type(0) {
            Err(DuckError::ClosedHandle("statement")) => (),
            other => panic!("expected ClosedHandle, got {other:?}"),
        }
    }

    #[test]
    fn test_statement_kind_from_raw() {
        assert_eq!(StatementKind::from_raw(1), StatementKind::Select);
        assert_eq!(StatementKind::from_raw(2), StatementKind::Insert);
        assert_eq!(StatementKind::from_raw(27), StatementKind::Multi);
        assert_eq!(StatementKind::from_raw(0), StatementKind::Invalid);
        assert_eq!(StatementKind::from_raw(99), StatementKind::Invalid);
    }

    #[test]
    fn test_statement_kind_unsupported_without_symbol() {
        let stmt = statement();
        match stmt.statement_kind() {
            Err(DuckError::UnsupportedFeature(_)) => (),
            other => panic!("expected UnsupportedFeature, got {other:?}"),
        }
    }
}

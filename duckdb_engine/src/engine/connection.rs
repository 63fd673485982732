use crate::engine::cancel::CancelToken;
use crate::engine::database::{DatabaseConfig, DatabaseInner};
use crate::engine::result::QueryResult;
use crate::engine::statement::PreparedStatement;
use crate::engine::{lock_poisoned, HandleSlot};
use crate::error::{DuckError, Result};
use crate::ffi::{from_cstr, to_cstring, RawResult, DUCKDB_STATE_SUCCESS};
use crate::library::FunctionTable;
use std::ffi::c_void;
use std::ptr;
use std::sync::{Arc, Mutex};

pub(crate) struct ConnectionInner {
    pub(crate) slot: Mutex<HandleSlot>,
    pub(crate) db: Arc<DatabaseInner>,
}

// Same justification as DatabaseInner: the slot mutex serializes every
// native call on this handle.
unsafe impl Send for ConnectionInner {}
unsafe impl Sync for ConnectionInner {}

impl ConnectionInner {
    pub(crate) fn table(&self) -> &FunctionTable {
        &self.db.table
    }
}

impl Drop for ConnectionInner {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.slot.lock() {
            if !slot.ptr.is_null() {
                // Safety: last owner; statements and results derived from
                // this connection hold an Arc to it, so they are gone.
                unsafe { (self.db.table.disconnect)(&mut slot.ptr) };
                slot.ptr = ptr::null_mut();
            }
        }
        self.db.logger.log_connection("close");
    }
}

/// A connection to an open database.
///
/// Not safe for concurrent use of a single native call; the internal
/// mutex serializes callers instead of corrupting native state. One
/// connection per worker remains the recommended layout.
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

impl Connection {
    pub(crate) fn from_raw(ptr: *mut c_void, db: Arc<DatabaseInner>) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                slot: Mutex::new(HandleSlot::new(ptr)),
                db,
            }),
        }
    }

    /// Runs `sql` and returns the materialized result.
    pub fn query(&self, sql: &str) -> Result<QueryResult> {
        let raw = self.run_query(sql, None)?;
        Ok(QueryResult::new(raw, self.inner.clone()))
    }

    /// Like [`query`](Self::query), but checks `token` first and refuses
    /// to start the native call once it is cancelled.
    pub fn query_with_cancel(&self, sql: &str, token: &CancelToken) -> Result<QueryResult> {
        let raw = self.run_query(sql, Some(token))?;
        Ok(QueryResult::new(raw, self.inner.clone()))
    }

    /// Runs a statement and returns the number of changed rows (zero when
    /// the loaded build cannot report it).
    pub fn execute(&self, sql: &str) -> Result<u64> {
        let result = self.query(sql)?;
        let changed = match result.rows_changed() {
            Ok(n) => n,
            Err(DuckError::UnsupportedFeature(_)) => 0,
            Err(e) => return Err(e),
        };
        result.close()?;
        Ok(changed)
    }

    /// Prepares `sql` for repeated parameterized execution.
    pub fn prepare(&self, sql: &str) -> Result<PreparedStatement> {
        let table = self.inner.table();
        let stmt_ptr = {
            let slot = self
                .inner
                .slot
                .lock()
                .map_err(|_| lock_poisoned("connection handle"))?;
            let conn_ptr = slot.get("connection")?;
            let c_sql = to_cstring(sql);
            let mut stmt = ptr::null_mut();
            // Safety: conn_ptr is live and serialized by the lock; the
            // SQL buffer is copied in.
            let state = unsafe { (table.prepare)(conn_ptr, c_sql.as_ptr(), &mut stmt) };
            if state != DUCKDB_STATE_SUCCESS {
                // The error text lives inside the (failed) statement
                // handle; read it before destroying the handle.
                let mut message = String::new();
                if !stmt.is_null() {
                    message = unsafe { from_cstr((table.prepare_error)(stmt)) };
                    unsafe { (table.destroy_prepare)(&mut stmt) };
                }
                if message.is_empty() {
                    message = format!("failed to prepare statement: {sql}");
                }
                self.inner.db.logger.log_native_error("duckdb_prepare", &message);
                return Err(DuckError::NativeCallFailed {
                    call: "duckdb_prepare",
                    message,
                });
            }
            stmt
        };

        // Safety: freshly prepared live statement.
        let param_count = unsafe { (table.nparams)(stmt_ptr) };
        Ok(PreparedStatement::from_raw(
            stmt_ptr,
            self.inner.clone(),
            param_count,
        ))
    }

    /// `LOAD` a DuckDB extension over this connection.
    pub fn load_extension(&self, name: &str) -> Result<()> {
        self.execute(&format!("LOAD '{}'", quote_literal(name)))?;
        Ok(())
    }

    /// `INSTALL` a DuckDB extension from the extension repository.
    pub fn install_extension(&self, name: &str) -> Result<()> {
        self.execute(&format!("INSTALL '{}'", quote_literal(name)))?;
        Ok(())
    }

    /// Caps the engine's memory usage for this connection.
    pub fn set_memory_limit(&self, bytes: i64) -> Result<()> {
        self.execute(&format!(
            "SET memory_limit = '{}'",
            format_memory_size(bytes)
        ))?;
        Ok(())
    }

    /// Caps the number of worker threads the engine may use.
    pub fn set_threads(&self, threads: usize) -> Result<()> {
        self.execute(&format!("SET threads = {threads}"))?;
        Ok(())
    }

    pub(crate) fn apply_config(&self, config: &DatabaseConfig) -> Result<()> {
        if let Some(bytes) = config.memory_limit_bytes {
            self.set_memory_limit(bytes)?;
        }
        if let Some(threads) = config.threads {
            self.set_threads(threads)?;
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.inner.slot.lock().map(|s| !s.closed).unwrap_or(false)
    }

    /// Marks the connection closed; idempotent. The native disconnect
    /// runs when the last statement/result derived from it is gone.
    pub fn close(&self) -> Result<()> {
        let mut slot = self
            .inner
            .slot
            .lock()
            .map_err(|_| lock_poisoned("connection handle"))?;
        slot.closed = true;
        Ok(())
    }

    fn run_query(&self, sql: &str, cancel: Option<&CancelToken>) -> Result<RawResult> {
        if let Some(token) = cancel {
            if token.is_cancelled() {
                return Err(DuckError::Cancelled);
            }
        }
        let table = self.inner.table();
        let slot = self
            .inner
            .slot
            .lock()
            .map_err(|_| lock_poisoned("connection handle"))?;
        let conn_ptr = slot.get("connection")?;
        self.inner.db.logger.log_query(sql);

        let c_sql = to_cstring(sql);
        let mut raw = RawResult::zeroed();
        // Safety: conn_ptr is live and serialized by the lock; the result
        // block is owned by this frame until handed to QueryResult.
        let state = unsafe { (table.query)(conn_ptr, c_sql.as_ptr(), &mut raw) };
        if state != DUCKDB_STATE_SUCCESS {
            // Error text lives inside the result block and is invalidated
            // by destroy_result: extract first, destroy second.
            let mut message = unsafe { from_cstr((table.result_error)(&mut raw)) };
            unsafe { (table.destroy_result)(&mut raw) };
            if message.is_empty() {
                message = format!("query failed: {sql}");
            }
            self.inner.db.logger.log_native_error("duckdb_query", &message);
            return Err(DuckError::NativeCallFailed {
                call: "duckdb_query",
                message,
            });
        }
        Ok(raw)
    }
}

fn quote_literal(name: &str) -> String {
    name.replace('\'', "''")
}

/// Renders a byte count the way the engine's `memory_limit` setting
/// expects it.
fn format_memory_size(bytes: i64) -> String {
    const KB: i64 = 1024;
    const MB: i64 = 1024 * KB;
    const GB: i64 = 1024 * MB;

    if bytes < MB {
        format!("{}KB", bytes / KB)
    } else if bytes < GB {
        format!("{}MB", bytes / MB)
    } else {
        format!("{}GB", bytes / GB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::database::Database;
    use crate::library::stub;

    fn connection() -> Connection {
        Database::open_stub(stub::table()).unwrap().connect().unwrap()
    }

    #[test]
    fn test_query_returns_result() {
        let conn = connection();
        let result = conn.query("SELECT 1").unwrap();
        assert_eq!(result.column_count(), 1);
        assert_eq!(result.row_count(), 1);
    }

    #[test]
    fn test_execute_reports_rows_changed() {
        let conn = connection();
        assert_eq!(conn.execute("DELETE FROM t").unwrap(), 1);
    }

    #[test]
    fn test_close_is_idempotent_and_rejects_use() {
        let conn = connection();
        conn.close().unwrap();
        conn.close().unwrap();
        assert!(!conn.is_open());
        match conn.query("SELECT 1") {
            Err(DuckError::ClosedHandle("connection")) => (),
            other => panic!("expected ClosedHandle, got {other:?}"),
        }
        match conn.prepare("SELECT 1") {
            Err(DuckError::ClosedHandle("connection")) => (),
            other => panic!("expected ClosedHandle, got {other:?}"),
        }
    }

    #[test]
    fn test_cancelled_token_prevents_native_call() {
        let conn = connection();
        let token = CancelToken::new();
        token.cancel();
        match conn.query_with_cancel("SELECT 1", &token) {
            Err(DuckError::Cancelled) => (),
            other => panic!("expected Cancelled, got {other:?}"),
        }
    }

    #[test]
    fn test_clear_token_lets_query_run() {
        let conn = connection();
        let token = CancelToken::new();
        conn.query_with_cancel("SELECT 1", &token).unwrap();
    }

    #[test]
    fn test_format_memory_size() {
        assert_eq!(format_memory_size(512 * 1024), "512KB");
        assert_eq!(format_memory_size(256 * 1024 * 1024), "256MB");
        assert_eq!(format_memory_size(4 * 1024 * 1024 * 1024), "4GB");
    }

    #[test]
    fn test_quote_literal_escapes() {
        assert_eq!(quote_literal("json"), "json");
        assert_eq!(quote_literal("a'b"), "a''b");
    }
}

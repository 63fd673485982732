use crate::engine::connection::ConnectionInner;
use crate::engine::{decoder, lock_poisoned};
use crate::error::{DuckError, Result};
use crate::ffi::{from_cstr, RawResult};
use crate::library::FunctionTable;
use crate::types::{PhysicalType, Value};
use std::sync::{Arc, Mutex};

struct ResultState {
    raw: RawResult,
    destroyed: bool,
}

/// A materialized query result.
///
/// Owns the raw native result block; the block is destroyed exactly once,
/// by [`close`](QueryResult::close) or on drop. Holds its connection's
/// inner state alive so the parent handle is never released first.
pub struct QueryResult {
    state: Mutex<ResultState>,
    conn: Arc<ConnectionInner>,
    column_count: u64,
    row_count: u64,
}

unsafe impl Send for QueryResult {}
unsafe impl Sync for QueryResult {}

impl std::fmt::Debug for QueryResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryResult")
            .field("column_count", &self.column_count)
            .field("row_count", &self.row_count)
            .finish()
    }
}

impl QueryResult {
    pub(crate) fn new(mut raw: RawResult, conn: Arc<ConnectionInner>) -> Self {
        let table = conn.table();
        // Safety: raw is a live result block this struct now owns.
        let column_count = unsafe { (table.column_count)(&mut raw) };
        let row_count = unsafe { (table.row_count)(&mut raw) };
        Self {
            state: Mutex::new(ResultState {
                raw,
                destroyed: false,
            }),
            conn,
            column_count,
            row_count,
        }
    }

    fn table(&self) -> &FunctionTable {
        self.conn.table()
    }

    pub fn column_count(&self) -> u64 {
        self.column_count
    }

    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    /// Rows changed by the statement that produced this result.
    pub fn rows_changed(&self) -> Result<u64> {
        let mut state = self.lock()?;
        let rows_changed = self
            .table()
            .rows_changed
            .ok_or_else(|| DuckError::UnsupportedFeature("duckdb_rows_changed".to_string()))?;
        // Safety: raw is live, guarded by `destroyed`.
        Ok(unsafe { rows_changed(&mut state.raw) })
    }

    /// Name of the 0-based column `index`; empty for an invalid index
    /// (the native accessor returns no text there).
    pub fn column_name(&self, index: u64) -> Result<String> {
        let mut state = self.lock()?;
        let table = self.table();
        // Safety: raw is live; the returned buffer is owned by the result
        // block, so it is copied, never freed here.
        Ok(unsafe { from_cstr((table.column_name)(&mut state.raw, index)) })
    }

    /// Physical type of the 0-based column `index`.
    pub fn column_type(&self, index: u64) -> Result<PhysicalType> {
        let mut state = self.lock()?;
        let column_type = self
            .table()
            .column_type
            .ok_or_else(|| DuckError::UnsupportedFeature("duckdb_column_type".to_string()))?;
        // Safety: raw is live, guarded by `destroyed`.
        Ok(PhysicalType::from_raw(unsafe {
            column_type(&mut state.raw, index)
        }))
    }

    /// The per-cell NULL predicate.
    pub fn is_null(&self, column: u64, row: u64) -> Result<bool> {
        let mut state = self.lock()?;
        // Safety: raw is live, guarded by `destroyed`.
        Ok(unsafe { (self.table().value_is_null)(&mut state.raw, column, row) })
    }

    /// Type-directed decode of one cell; `Ok(None)` is SQL NULL.
    pub fn decode(&self, column: u64, row: u64, ty: PhysicalType) -> Result<Option<Value>> {
        let mut state = self.lock()?;
        decoder::decode_cell(self.table(), &mut state.raw, column, row, ty)
    }

    /// Decodes one cell using the column's own type metadata when the
    /// loaded build exposes it, the generic row-scan otherwise.
    pub fn decode_auto(&self, column: u64, row: u64) -> Result<Option<Value>> {
        match self.column_type(column) {
            Ok(ty) if ty != PhysicalType::Invalid => self.decode(column, row, ty),
            _ => {
                let mut state = self.lock()?;
                decoder::decode_any(self.table(), &mut state.raw, column, row)
            }
        }
    }

    /// All cells of one row, decoded with [`decode_auto`](Self::decode_auto).
    pub fn row_values(&self, row: u64) -> Result<Vec<Option<Value>>> {
        let mut values = Vec::with_capacity(self.column_count as usize);
        for column in 0..self.column_count {
            values.push(self.decode_auto(column, row)?);
        }
        Ok(values)
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().map(|s| !s.destroyed).unwrap_or(false)
    }

    /// Destroys the native result block. Idempotent.
    pub fn close(&self) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| lock_poisoned("result handle"))?;
        if state.destroyed {
            return Ok(());
        }
        state.destroyed = true;
        // Safety: releases exactly once, guarded by `destroyed`.
        unsafe { (self.table().destroy_result)(&mut state.raw) };
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ResultState>> {
        let state = self
            .state
            .lock()
            .map_err(|_| lock_poisoned("result handle"))?;
        if state.destroyed {
            return Err(DuckError::ClosedHandle("result"));
        }
        Ok(state)
    }
}

impl Drop for QueryResult {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

use crate::engine::connection::Connection;
use crate::engine::{lock_poisoned, HandleSlot};
use crate::error::{DuckError, Result};
use crate::ffi::{to_cstring, DUCKDB_STATE_SUCCESS};
use crate::library::{FunctionTable, NativeLibrary};
use crate::observability::DriverLogger;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::ptr;
use std::sync::{Arc, Mutex};

/// Open-time configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file to open; `None` opens an in-memory database.
    pub path: Option<PathBuf>,
    /// Explicit shared library to load; `None` honors
    /// `DUCKDB_LIBRARY_PATH` and then the platform soname.
    pub library_path: Option<PathBuf>,
    /// Applied to each new connection via `SET memory_limit`.
    pub memory_limit_bytes: Option<i64>,
    /// Applied to each new connection via `SET threads`.
    pub threads: Option<usize>,
    /// Log query text at debug level.
    pub log_queries: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            library_path: None,
            memory_limit_bytes: None,
            threads: None,
            log_queries: true,
        }
    }
}

pub(crate) struct DatabaseInner {
    pub(crate) table: Arc<FunctionTable>,
    pub(crate) slot: Mutex<HandleSlot>,
    pub(crate) logger: DriverLogger,
    pub(crate) config: DatabaseConfig,
    // Keeps the loaded library (and with it every function pointer in
    // `table`) alive at least as long as this database. `None` only for
    // in-process stub tables.
    _library: Option<Arc<NativeLibrary>>,
}

// Raw pointer access is serialized by the slot mutex; the table is
// immutable. Concurrent native calls on distinct handles are allowed by
// the engine.
unsafe impl Send for DatabaseInner {}
unsafe impl Sync for DatabaseInner {}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        // Last owner gone: every connection derived from this database
        // has already released its handle, so the parent release ordering
        // holds structurally.
        if let Ok(mut slot) = self.slot.lock() {
            if !slot.ptr.is_null() {
                // Safety: sole remaining owner; runs once.
                unsafe { (self.table.close)(&mut slot.ptr) };
                slot.ptr = ptr::null_mut();
            }
        }
    }
}

/// An open DuckDB database instance.
///
/// `close()` is logical and idempotent: it rejects new work immediately,
/// while the native release runs once the last connection, statement and
/// result derived from this database are gone.
pub struct Database {
    inner: Arc<DatabaseInner>,
}

impl Database {
    /// Opens the database file at `path` with default configuration.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with_config(DatabaseConfig {
            path: Some(path.into()),
            ..DatabaseConfig::default()
        })
    }

    /// Opens a transient in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::open_with_config(DatabaseConfig::default())
    }

    pub fn open_with_config(config: DatabaseConfig) -> Result<Self> {
        let library = match &config.library_path {
            Some(path) => NativeLibrary::load(path)?,
            None => NativeLibrary::load_default()?,
        };
        let logger = DriverLogger::new(config.log_queries);
        logger.log_library(library.path(), library.table().optional_resolved());
        let table = Arc::new(*library.table());
        Self::open_internal(table, Some(library), logger, config)
    }

    fn open_internal(
        table: Arc<FunctionTable>,
        library: Option<Arc<NativeLibrary>>,
        logger: DriverLogger,
        config: DatabaseConfig,
    ) -> Result<Self> {
        let target = config
            .path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| ":memory:".to_string());
        let c_path = to_cstring(&target);
        let mut handle = ptr::null_mut();
        // Safety: open writes the database handle through the out
        // pointer; the path buffer is copied in.
        let state = unsafe { (table.open)(c_path.as_ptr(), &mut handle) };
        if state != DUCKDB_STATE_SUCCESS || handle.is_null() {
            // duckdb_open has no error-text channel; the path is the most
            // useful context available.
            return Err(DuckError::NativeCallFailed {
                call: "duckdb_open",
                message: format!("failed to open database '{target}'"),
            });
        }

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                table,
                slot: Mutex::new(HandleSlot::new(handle)),
                logger,
                config,
                _library: library,
            }),
        })
    }

    #[cfg(test)]
    pub(crate) fn open_stub(table: FunctionTable) -> Result<Self> {
        Self::open_internal(
            Arc::new(table),
            None,
            DriverLogger::new(false),
            DatabaseConfig {
                log_queries: false,
                ..DatabaseConfig::default()
            },
        )
    }

    /// Creates a new connection and applies the configured session
    /// settings to it.
    pub fn connect(&self) -> Result<Connection> {
        let conn_ptr = {
            let slot = self
                .inner
                .slot
                .lock()
                .map_err(|_| lock_poisoned("database handle"))?;
            let db_ptr = slot.get("database")?;
            let mut conn = ptr::null_mut();
            // Safety: db_ptr is a live database handle; the lock
            // serializes this call against close.
            let state = unsafe { (self.inner.table.connect)(db_ptr, &mut conn) };
            if state != DUCKDB_STATE_SUCCESS || conn.is_null() {
                return Err(DuckError::NativeCallFailed {
                    call: "duckdb_connect",
                    message: "failed to connect to database".to_string(),
                });
            }
            conn
        };
        self.inner.logger.log_connection("open");

        let connection = Connection::from_raw(conn_ptr, self.inner.clone());
        connection.apply_config(&self.inner.config)?;
        Ok(connection)
    }

    pub fn is_open(&self) -> bool {
        self.inner.slot.lock().map(|s| !s.closed).unwrap_or(false)
    }

    /// Marks the database closed. New connections are rejected with
    /// `ClosedHandle`; calling this twice is a no-op success.
    pub fn close(&self) -> Result<()> {
        let mut slot = self
            .inner
            .slot
            .lock()
            .map_err(|_| lock_poisoned("database handle"))?;
        slot.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::stub;

    #[test]
    fn test_open_and_connect() {
        let db = Database::open_stub(stub::table()).unwrap();
        assert!(db.is_open());
        let conn = db.connect().unwrap();
        assert!(conn.is_open());
    }

    #[test]
    fn test_close_is_idempotent() {
        let db = Database::open_stub(stub::table()).unwrap();
        db.close().unwrap();
        db.close().unwrap();
        assert!(!db.is_open());
    }

    #[test]
    fn test_connect_after_close_rejected() {
        let db = Database::open_stub(stub::table()).unwrap();
        db.close().unwrap();
        match db.connect() {
            Err(DuckError::ClosedHandle("database")) => (),
            other => panic!("expected ClosedHandle, got {other:?}"),
        }
    }

    #[test]
    fn test_connection_outlives_explicit_database_close() {
        let db = Database::open_stub(stub::table()).unwrap();
        let conn = db.connect().unwrap();
        db.close().unwrap();
        // The connection keeps the inner database state alive; only new
        // work on the database handle is rejected.
        assert!(conn.is_open());
        conn.query("SELECT 1").unwrap().close().unwrap();
    }

    #[test]
    fn test_config_default_roundtrips_through_json() {
        let config = DatabaseConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: DatabaseConfig = serde_json::from_str(&json).unwrap();
        assert!(back.log_queries);
        assert!(back.path.is_none());

        let partial: DatabaseConfig = serde_json::from_str("{\"threads\": 4}").unwrap();
        assert_eq!(partial.threads, Some(4));
        assert!(partial.log_queries);
    }
}

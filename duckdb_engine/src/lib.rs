//! A DuckDB driver engine that binds `libduckdb` at runtime.
//!
//! No static linking: the shared library is loaded once per process, its
//! ~45 C entry points are resolved into an immutable [`FunctionTable`],
//! and everything else - parameter binding, result decoding, handle
//! lifecycle - goes through those typed slots. Entry points a given
//! libduckdb build does not export degrade through documented fallback
//! chains instead of failing the load.
//!
//! ```no_run
//! use duckdb_engine::{Database, PhysicalType, Value};
//!
//! # fn main() -> duckdb_engine::Result<()> {
//! let db = Database::open_in_memory()?;
//! let conn = db.connect()?;
//! conn.execute("CREATE TABLE t (id INTEGER, name VARCHAR)")?;
//!
//! let stmt = conn.prepare("INSERT INTO t VALUES (?, ?)")?;
//! stmt.bind(1, PhysicalType::Integer, &Value::Int32(1))?;
//! stmt.bind(2, PhysicalType::Varchar, &Value::Text("abc".into()))?;
//! stmt.execute()?.close()?;
//!
//! let rows = conn.query("SELECT id, name FROM t")?;
//! assert_eq!(rows.decode(0, 0, PhysicalType::Integer)?, Some(Value::Int32(1)));
//! # Ok(())
//! # }
//! ```

pub mod convert;
pub mod engine;
pub mod error;
pub mod ffi;
pub mod library;
pub mod observability;
pub mod types;

pub use engine::{
    bind_chain, CancelToken, Connection, Database, DatabaseConfig, LogicalTypeHandle,
    PreparedStatement, QueryResult, StatementKind,
};
pub use error::{DuckError, ErrorCategory, Result};
pub use library::{BindCapability, FunctionTable, NativeLibrary};
pub use types::{Date, Decimal, Interval, PhysicalType, Time, Timestamp, Value};

pub mod binder;
pub mod cancel;
pub mod connection;
pub mod database;
pub mod decoder;
pub mod logical;
pub mod result;
pub mod statement;

pub use binder::bind_chain;
pub use cancel::CancelToken;
pub use connection::Connection;
pub use database::{Database, DatabaseConfig};
pub use logical::LogicalTypeHandle;
pub use result::QueryResult;
pub use statement::{PreparedStatement, StatementKind};

use crate::error::{DuckError, Result};
use std::ffi::c_void;

/// The mutable part of every handle wrapper: the raw native pointer plus
/// the logical open/closed state. Always lives behind a `Mutex`, which is
/// also what serializes native calls per handle.
pub(crate) struct HandleSlot {
    pub(crate) ptr: *mut c_void,
    pub(crate) closed: bool,
}

impl HandleSlot {
    pub(crate) fn new(ptr: *mut c_void) -> Self {
        Self { ptr, closed: false }
    }

    /// The raw pointer, or `ClosedHandle` once the handle was closed.
    pub(crate) fn get(&self, kind: &'static str) -> Result<*mut c_void> {
        if self.closed {
            return Err(DuckError::ClosedHandle(kind));
        }
        Ok(self.ptr)
    }
}

pub(crate) fn lock_poisoned(what: &str) -> DuckError {
    DuckError::Internal(format!("{what} mutex poisoned"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_slot_open() {
        let slot = HandleSlot::new(0x10 as *mut c_void);
        assert_eq!(slot.get("database").unwrap(), 0x10 as *mut c_void);
    }

    #[test]
    fn test_handle_slot_closed() {
        let mut slot = HandleSlot::new(0x10 as *mut c_void);
        slot.closed = true;
        match slot.get("statement") {
            Err(DuckError::ClosedHandle("statement")) => (),
            other => panic!("expected ClosedHandle, got {other:?}"),
        }
    }
}

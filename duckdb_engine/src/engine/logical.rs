use crate::error::{DuckError, Result};
use crate::ffi::duckdb_logical_type;
use crate::library::FunctionTable;

/// An owned native logical type descriptor.
///
/// Obtained from column or parameter metadata; owned separately from the
/// result/statement that produced it and destroyed independently, exactly
/// once, when dropped. Needed to recover DECIMAL width/scale, which the
/// physical type tag does not carry.
pub struct LogicalTypeHandle<'lib> {
    ptr: duckdb_logical_type,
    table: &'lib FunctionTable,
}

impl<'lib> LogicalTypeHandle<'lib> {
    pub(crate) fn new(ptr: duckdb_logical_type, table: &'lib FunctionTable) -> Self {
        Self { ptr, table }
    }

    pub fn decimal_width(&self) -> Result<u8> {
        let width_fn = self
            .table
            .decimal_width
            .ok_or_else(|| DuckError::UnsupportedFeature("duckdb_decimal_width".to_string()))?;
        // Safety: ptr is a live logical type owned by this handle.
        Ok(unsafe { width_fn(self.ptr) })
    }

    pub fn decimal_scale(&self) -> Result<u8> {
        let scale_fn = self
            .table
            .decimal_scale
            .ok_or_else(|| DuckError::UnsupportedFeature("duckdb_decimal_scale".to_string()))?;
        // Safety: ptr is a live logical type owned by this handle.
        Ok(unsafe { scale_fn(self.ptr) })
    }
}

impl Drop for LogicalTypeHandle<'_> {
    fn drop(&mut self) {
        if let Some(destroy) = self.table.destroy_logical_type {
            if !self.ptr.is_null() {
                // Safety: sole owner; drop runs once.
                unsafe { destroy(&mut self.ptr) };
                self.ptr = std::ptr::null_mut();
            }
        }
    }
}

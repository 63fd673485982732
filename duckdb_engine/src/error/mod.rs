use crate::types::PhysicalType;
use thiserror::Error;

/// Error category for decision-making in the adapter layer (abort,
/// surface to the user, treat as programming error, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Library could not be loaded or is missing a required entry point
    Setup,
    /// Invalid caller input - bad value, bad index
    Validation,
    /// The native build or this crate does not support the operation
    Unsupported,
    /// The native engine signaled failure
    Native,
    /// Handle misuse - operation on a released handle, cancellation
    Usage,
}

#[derive(Error, Debug, Clone)]
pub enum DuckError {
    #[error("failed to load DuckDB library: {0}")]
    LibraryLoad(String),

    #[error("required symbol not found in DuckDB library: {0}")]
    MissingSymbol(&'static str),

    #[error("unsupported type: {0}")]
    UnsupportedType(PhysicalType),

    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    #[error("conversion failed: {0}")]
    Conversion(String),

    #[error("{call} failed: {message}")]
    NativeCallFailed {
        call: &'static str,
        message: String,
    },

    #[error("operation on closed {0} handle")]
    ClosedHandle(&'static str),

    #[error("parameter index {index} out of range, statement has {count} parameters")]
    ParameterIndexOutOfRange { index: u64, count: u64 },

    #[error("operation cancelled before native call")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl DuckError {
    /// Native error text when the failure carries one, Display otherwise.
    pub fn message(&self) -> String {
        match self {
            DuckError::NativeCallFailed { message, .. } => message.clone(),
            _ => self.to_string(),
        }
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            DuckError::UnsupportedType(_) | DuckError::UnsupportedFeature(_)
        )
    }

    /// Returns the error category for decision-making
    pub fn category(&self) -> ErrorCategory {
        match self {
            DuckError::LibraryLoad(_) | DuckError::MissingSymbol(_) => ErrorCategory::Setup,
            DuckError::Conversion(_) | DuckError::ParameterIndexOutOfRange { .. } => {
                ErrorCategory::Validation
            }
            DuckError::UnsupportedType(_) | DuckError::UnsupportedFeature(_) => {
                ErrorCategory::Unsupported
            }
            DuckError::NativeCallFailed { .. } => ErrorCategory::Native,
            DuckError::ClosedHandle(_) | DuckError::Cancelled | DuckError::Internal(_) => {
                ErrorCategory::Usage
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, DuckError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DuckError::MissingSymbol("duckdb_open");
        assert_eq!(
            err.to_string(),
            "required symbol not found in DuckDB library: duckdb_open"
        );

        let err = DuckError::ClosedHandle("connection");
        assert_eq!(err.to_string(), "operation on closed connection handle");

        let err = DuckError::ParameterIndexOutOfRange { index: 4, count: 3 };
        assert_eq!(
            err.to_string(),
            "parameter index 4 out of range, statement has 3 parameters"
        );
    }

    #[test]
    fn test_native_call_failed_keeps_original_text() {
        let err = DuckError::NativeCallFailed {
            call: "duckdb_prepare",
            message: "Parser Error: syntax error at or near \"SELEC\"".to_string(),
        };
        assert!(err.to_string().contains("SELEC"));
        assert_eq!(
            err.message(),
            "Parser Error: syntax error at or near \"SELEC\""
        );
    }

    #[test]
    fn test_message_falls_back_to_display() {
        let err = DuckError::Cancelled;
        assert_eq!(err.message(), "operation cancelled before native call");
    }

    #[test]
    fn test_category_setup() {
        assert_eq!(
            DuckError::LibraryLoad("not found".to_string()).category(),
            ErrorCategory::Setup
        );
        assert_eq!(
            DuckError::MissingSymbol("duckdb_query").category(),
            ErrorCategory::Setup
        );
    }

    #[test]
    fn test_category_validation() {
        assert_eq!(
            DuckError::Conversion("1000 out of range".to_string()).category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            DuckError::ParameterIndexOutOfRange { index: 0, count: 2 }.category(),
            ErrorCategory::Validation
        );
    }

    #[test]
    fn test_category_unsupported() {
        assert_eq!(
            DuckError::UnsupportedType(PhysicalType::List).category(),
            ErrorCategory::Unsupported
        );
        assert!(DuckError::UnsupportedType(PhysicalType::List).is_unsupported());
        assert!(DuckError::UnsupportedFeature("clear_bindings".to_string()).is_unsupported());
    }

    #[test]
    fn test_category_native_and_usage() {
        let native = DuckError::NativeCallFailed {
            call: "duckdb_query",
            message: "Binder Error".to_string(),
        };
        assert_eq!(native.category(), ErrorCategory::Native);
        assert_eq!(
            DuckError::ClosedHandle("result").category(),
            ErrorCategory::Usage
        );
        assert_eq!(DuckError::Cancelled.category(), ErrorCategory::Usage);
    }
}

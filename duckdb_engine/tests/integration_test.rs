//! Public-surface tests that need no loaded library.

use duckdb_engine::{
    bind_chain, BindCapability, CancelToken, Date, DuckError, ErrorCategory, PhysicalType,
    NativeLibrary, Time, Timestamp, Value,
};

#[test]
fn test_load_reports_library_error_with_path() {
    let err = NativeLibrary::load("/definitely/not/here/libduckdb.so").unwrap_err();
    match err {
        DuckError::LibraryLoad(message) => {
            assert!(message.contains("/definitely/not/here/libduckdb.so"));
            assert_eq!(
                DuckError::LibraryLoad(message).category(),
                ErrorCategory::Setup
            );
        }
        other => panic!("expected LibraryLoad, got {other:?}"),
    }
}

#[test]
fn test_error_taxonomy_categories() {
    assert_eq!(
        DuckError::MissingSymbol("duckdb_open").category(),
        ErrorCategory::Setup
    );
    assert_eq!(
        DuckError::Conversion("value 1000 out of range for TINYINT".to_string()).category(),
        ErrorCategory::Validation
    );
    assert_eq!(
        DuckError::UnsupportedType(PhysicalType::Struct).category(),
        ErrorCategory::Unsupported
    );
    assert_eq!(
        DuckError::ClosedHandle("connection").category(),
        ErrorCategory::Usage
    );
    let native = DuckError::NativeCallFailed {
        call: "duckdb_query",
        message: "Catalog Error: Table with name missing_table does not exist".to_string(),
    };
    assert_eq!(native.category(), ErrorCategory::Native);
    assert!(native.message().contains("missing_table"));
}

#[test]
fn test_bind_chains_are_availability_fallbacks() {
    // Every chain starts with the exact entry point and only widens.
    assert_eq!(
        bind_chain(PhysicalType::SmallInt),
        &[
            BindCapability::Int16,
            BindCapability::Int32,
            BindCapability::Int64
        ]
    );
    assert_eq!(
        bind_chain(PhysicalType::UBigInt),
        &[BindCapability::UInt64, BindCapability::Int64]
    );
    // Composites and INTERVAL have no chain at all; the MAP JSON shim is
    // routed in the binder, not the chain table.
    assert!(bind_chain(PhysicalType::Map).is_empty());
    assert!(bind_chain(PhysicalType::Union).is_empty());
    assert!(bind_chain(PhysicalType::Interval).is_empty());
}

#[test]
fn test_epoch_encodings() {
    let date = Date::from_naive(chrono::NaiveDate::from_ymd_opt(1970, 1, 2).unwrap());
    assert_eq!(date.days, 1);

    let time = Time::from_naive(chrono::NaiveTime::from_hms_opt(12, 34, 56).unwrap());
    assert_eq!(time.micros, 45_296_000_000);

    let ts = Timestamp::from_naive(
        chrono::NaiveDate::from_ymd_opt(2025, 5, 7)
            .unwrap()
            .and_hms_micro_opt(12, 34, 56, 0)
            .unwrap(),
    );
    assert_eq!(ts.to_naive().unwrap().to_string(), "2025-05-07 12:34:56");
}

#[test]
fn test_value_tags() {
    assert!(Value::Null.is_null());
    assert!(!Value::Int32(0).is_null());
    assert_eq!(Value::UInt64(1).natural_type(), PhysicalType::UBigInt);
    assert_eq!(
        Value::Blob(vec![1, 2, 3]).natural_type(),
        PhysicalType::Blob
    );
}

#[test]
fn test_cancel_token_shared_flag() {
    let token = CancelToken::new();
    let clone = token.clone();
    assert!(!clone.is_cancelled());
    token.cancel();
    assert!(clone.is_cancelled());
}

//! Helper functions for reading environment variables in tests

use duckdb_engine::{Database, DatabaseConfig};
use std::path::PathBuf;

/// Get the DUCKDB_TEST_LIBRARY shared library path from environment
/// Returns None if not set (tests should be ignored in this case)
pub fn get_test_library() -> Option<PathBuf> {
    std::env::var("DUCKDB_TEST_LIBRARY")
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Open an in-memory database against the library under test
pub fn open_test_db() -> Database {
    init_logging();
    let library = get_test_library().expect("DUCKDB_TEST_LIBRARY not set");
    Database::open_with_config(DatabaseConfig {
        library_path: Some(library),
        log_queries: false,
        ..DatabaseConfig::default()
    })
    .expect("Failed to open in-memory database")
}

// Common test utilities and helpers

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use redb_containers::{Config, Connection};
use tempfile::TempDir;

/// Route `log` output through the test harness; safe to call repeatedly.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn db_path(dir: &TempDir) -> PathBuf {
    dir.path().join("test.redb")
}

/// A configuration pointing at a fresh file inside `dir`.
pub fn test_config(dir: &TempDir) -> Config {
    Config::new(db_path(dir).to_string_lossy().into_owned())
}

/// Create a connected database in a temporary directory.
///
/// Keep the returned `TempDir` alive for as long as the connection is used.
pub fn create_test_db() -> (TempDir, Arc<Connection>) {
    init_logging();
    let dir = TempDir::new().unwrap();
    let conn = Connection::create(test_config(&dir)).unwrap();
    (dir, conn)
}

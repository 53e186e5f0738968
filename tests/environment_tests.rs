//! Connection lifecycle, path policy and environment limits.

mod common;

use std::thread;

use redb_containers::path::{DATA_FILE_NAME, executable_dir, resolve_path};
use redb_containers::{
    Config, Connection, ContainerError, EngineError, KeyTable, KeyValueTable, TransactionMode,
    UsageError,
};
use tempfile::TempDir;

use common::{create_test_db, db_path, init_logging, test_config};

fn is_engine_error(err: &ContainerError, check: fn(&EngineError) -> bool) -> bool {
    matches!(err, ContainerError::Engine { source, .. } if check(source))
}

#[test]
fn test_explicitly_relative_paths_ignore_exe_flag() {
    let cwd = std::env::current_dir().unwrap();
    assert_eq!(resolve_path("./foo", true).unwrap(), cwd.join("foo"));
    assert_eq!(resolve_path("./foo", false).unwrap(), cwd.join("foo"));
    assert_eq!(
        resolve_path("../foo", true).unwrap(),
        cwd.parent().unwrap().join("foo")
    );
}

#[test]
fn test_plain_relative_paths_follow_exe_flag() {
    let cwd = std::env::current_dir().unwrap();
    let exe_dir = executable_dir().unwrap();
    assert_eq!(
        resolve_path("data/app.redb", true).unwrap(),
        exe_dir.join("data").join("app.redb")
    );
    assert_eq!(
        resolve_path("data/app.redb", false).unwrap(),
        cwd.join("data").join("app.redb")
    );
}

#[test]
fn test_directory_layout_uses_data_file() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let env_dir = dir.path().join("nested").join("env");
    let config = Config::builder()
        .pathname(env_dir.to_string_lossy())
        .no_subdir(false)
        .build();

    let conn = Connection::create(config).unwrap();
    let env = conn.environment().unwrap();
    assert_eq!(env.file(), env_dir.join(DATA_FILE_NAME));
    assert!(env.file().exists());
}

#[test]
fn test_connection_lifecycle_errors() {
    init_logging();
    let conn = Connection::new();
    assert!(conn.connect().unwrap_err().is_usage(UsageError::NotConfigured));
    assert!(conn
        .environment()
        .unwrap_err()
        .is_usage(UsageError::NotConnected));

    let err = Connection::create(Config::new("")).unwrap_err();
    assert!(matches!(err, ContainerError::InvalidConfig(_)));

    let (dir, conn) = create_test_db();
    let err = conn.configure(test_config(&dir)).unwrap_err();
    assert!(err.is_usage(UsageError::AlreadyConnected));

    // Connecting again is a no-op.
    conn.connect().unwrap();
    assert!(conn.is_connected());
    conn.disconnect().unwrap();
    assert!(!conn.is_connected());
    conn.disconnect().unwrap();
}

#[test]
fn test_read_only_environment() {
    let (dir, conn) = create_test_db();
    let table: KeyValueTable<u64, String> = KeyValueTable::new(&conn, "frozen").unwrap();
    table.insert(&1, &"kept".to_string()).unwrap();
    conn.disconnect().unwrap();

    let config = Config::builder()
        .pathname(db_path(&dir).to_string_lossy())
        .read_only(true)
        .build();
    let reader = Connection::create(config).unwrap();
    assert!(reader.environment().unwrap().is_read_only());

    let table: KeyValueTable<u64, String> = KeyValueTable::new(&reader, "frozen").unwrap();
    assert_eq!(table.find(&1).unwrap(), Some("kept".to_string()));
    let err = table.insert(&2, &"new".to_string()).unwrap_err();
    assert!(is_engine_error(&err, |e| matches!(e, EngineError::ReadOnly)));

    let missing: KeyTable<u64> = KeyTable::new(&reader, "never_created").unwrap();
    assert!(missing.is_empty().unwrap());
    assert!(!missing.contains(&1).unwrap());
}

#[test]
fn test_read_only_requires_existing_file() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let config = Config::builder()
        .pathname(db_path(&dir).to_string_lossy())
        .read_only(true)
        .build();
    assert!(Connection::create(config).is_err());
    assert!(!db_path(&dir).exists());
}

#[test]
fn test_reader_limit() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let config = Config::builder()
        .pathname(db_path(&dir).to_string_lossy())
        .max_readers(1)
        .build();
    let conn = Connection::create(config).unwrap();
    let table: KeyValueTable<u64, u64> = KeyValueTable::new(&conn, "limited").unwrap();

    let mut txn = conn.transaction(TransactionMode::ReadOnly).unwrap();
    assert_eq!(conn.environment().unwrap().active_readers(), 1);

    thread::scope(|scope| {
        scope.spawn(|| {
            let err = table.find(&1).unwrap_err();
            assert!(is_engine_error(&err, |e| matches!(e, EngineError::ReadersFull(1))));
            // Writers do not take a reader slot.
            table.insert(&1, &1).unwrap();
        });
    });

    txn.commit().unwrap();
    assert_eq!(conn.environment().unwrap().active_readers(), 0);
    assert_eq!(table.find(&1).unwrap(), Some(1));
}

#[test]
fn test_named_table_limit() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let config = Config::builder()
        .pathname(db_path(&dir).to_string_lossy())
        .max_dbs(2)
        .build();
    let conn = Connection::create(config).unwrap();

    let _a: KeyTable<u64> = KeyTable::new(&conn, "a").unwrap();
    let _b: KeyTable<u64> = KeyTable::new(&conn, "b").unwrap();
    let err = KeyTable::<u64>::new(&conn, "c").err().unwrap();
    assert!(is_engine_error(&err, |e| matches!(e, EngineError::TablesFull(2))));

    // Rebinding a known name does not count against the limit.
    KeyTable::<u64>::new(&conn, "a").unwrap();
}

#[test]
fn test_open_shortcut_connects() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let table = KeyValueTable::<String, u64>::open(test_config(&dir), "shortcut").unwrap();
    table.insert(&"k".to_string(), &1).unwrap();
    assert!(table.connection().is_connected());
    assert_eq!(table.name(), "shortcut");
}

//! Integration tests for the key/value map facade.

mod common;

use std::collections::{BTreeMap, HashMap};

use rand::seq::SliceRandom;
use redb_containers::{ContainerError, KeyValueTable};

use common::create_test_db;

#[test]
fn test_insert_find_and_erase() {
    let (_dir, conn) = create_test_db();
    let table: KeyValueTable<u64, String> = KeyValueTable::new(&conn, "users").unwrap();

    assert!(table.is_empty().unwrap());
    assert!(table.insert(&1, &"alice".to_string()).unwrap());
    assert!(!table.insert(&1, &"mallory".to_string()).unwrap());
    assert_eq!(table.find(&1).unwrap(), Some("alice".to_string()));
    assert_eq!(table.find(&2).unwrap(), None);

    table.insert_or_assign(&1, &"bob".to_string()).unwrap();
    assert_eq!(table.at(&1).unwrap(), "bob");
    assert_eq!(table.count().unwrap(), 1);

    assert!(table.erase(&1).unwrap());
    assert!(!table.erase(&1).unwrap());
    assert!(!table.contains(&1).unwrap());
}

#[test]
fn test_at_reports_missing_key() {
    let (_dir, conn) = create_test_db();
    let table: KeyValueTable<String, u32> = KeyValueTable::new(&conn, "stock").unwrap();

    let err = table.at(&"pears".to_string()).unwrap_err();
    assert!(matches!(err, ContainerError::KeyNotFound));
}

#[test]
fn test_integer_keys_iterate_numerically() {
    let (_dir, conn) = create_test_db();
    let table: KeyValueTable<u32, u32> = KeyValueTable::new(&conn, "numbers").unwrap();

    let mut keys: Vec<u32> = (0..300).map(|n| n * 7).collect();
    keys.shuffle(&mut rand::thread_rng());
    for key in &keys {
        table.insert(key, &(key / 7)).unwrap();
    }

    let stored = table.keys().unwrap();
    let expected: Vec<u32> = (0..300).map(|n| n * 7).collect();
    assert_eq!(stored, expected);
}

#[test]
fn test_signed_and_small_keys_keep_their_order() {
    let (_dir, conn) = create_test_db();
    let signed: KeyValueTable<i64, u8> = KeyValueTable::new(&conn, "signed").unwrap();
    let small: KeyValueTable<i16, u8> = KeyValueTable::new(&conn, "small").unwrap();

    for key in [5i64, -3, i64::MIN, 0, i64::MAX, -1] {
        signed.insert(&key, &0).unwrap();
    }
    for key in [300i16, -300, 0, i16::MIN, 1] {
        small.insert(&key, &0).unwrap();
    }

    assert_eq!(signed.keys().unwrap(), vec![i64::MIN, -3, -1, 0, 5, i64::MAX]);
    assert_eq!(small.keys().unwrap(), vec![i16::MIN, -300, 0, 1, 300]);
}

#[test]
fn test_float_keys_iterate_numerically() {
    let (_dir, conn) = create_test_db();
    let table: KeyValueTable<f64, String> = KeyValueTable::new(&conn, "readings").unwrap();

    for key in [2.5f64, -0.5, f64::NEG_INFINITY, 100.0, -1000.25, 0.0] {
        table.insert(&key, &key.to_string()).unwrap();
    }

    assert_eq!(
        table.keys().unwrap(),
        vec![f64::NEG_INFINITY, -1000.25, -0.5, 0.0, 2.5, 100.0]
    );
}

#[test]
fn test_text_keys_iterate_lexicographically() {
    let (_dir, conn) = create_test_db();
    let table: KeyValueTable<String, u32> = KeyValueTable::new(&conn, "words").unwrap();

    for word in ["pear", "apple", "b", "ab"] {
        table.insert(&word.to_string(), &(word.len() as u32)).unwrap();
    }

    let keys: Vec<String> = table.keys().unwrap();
    assert_eq!(keys, vec!["ab", "apple", "b", "pear"]);
}

#[test]
fn test_reconcile_replaces_contents() {
    let (_dir, conn) = create_test_db();
    let table: KeyValueTable<u64, String> = KeyValueTable::new(&conn, "reconciled").unwrap();

    for key in [1u64, 2, 3] {
        table.insert(&key, &"old".to_string()).unwrap();
    }

    let wanted = BTreeMap::from([(2u64, "x".to_string()), (4u64, "y".to_string())]);
    table.reconcile(&wanted).unwrap();
    assert_eq!(table.retrieve_all::<BTreeMap<_, _>>().unwrap(), wanted);

    // Reconciling again with the same input changes nothing.
    table.reconcile(&wanted).unwrap();
    assert_eq!(table.retrieve_all::<BTreeMap<_, _>>().unwrap(), wanted);
}

#[test]
fn test_reconcile_with_empty_input_clears() {
    let (_dir, conn) = create_test_db();
    let table: KeyValueTable<u64, u64> = KeyValueTable::new(&conn, "emptied").unwrap();
    table.insert(&1, &1).unwrap();

    table.reconcile(&BTreeMap::new()).unwrap();
    assert!(table.is_empty().unwrap());
}

#[test]
fn test_append_keeps_other_keys() {
    let (_dir, conn) = create_test_db();
    let table: KeyValueTable<u64, u64> = KeyValueTable::new(&conn, "appended").unwrap();
    table.insert(&1, &10).unwrap();

    let extra = HashMap::from([(1u64, 11u64), (2, 20)]);
    table.append(&extra).unwrap();

    let all: BTreeMap<u64, u64> = table.retrieve_all().unwrap();
    assert_eq!(all, BTreeMap::from([(1, 11), (2, 20)]));
}

#[test]
fn test_clear_and_load_into() {
    let (_dir, conn) = create_test_db();
    let table: KeyValueTable<String, Vec<u32>> = KeyValueTable::new(&conn, "lists").unwrap();
    table.insert(&"a".to_string(), &vec![1, 2, 3]).unwrap();
    table.insert(&"b".to_string(), &vec![]).unwrap();

    let mut loaded = HashMap::new();
    table.load_into(&mut loaded).unwrap();
    assert_eq!(loaded.get("a"), Some(&vec![1, 2, 3]));
    assert_eq!(loaded.get("b"), Some(&vec![]));

    table.clear().unwrap();
    assert_eq!(table.count().unwrap(), 0);
    assert_eq!(table.iter().unwrap().len(), 0);
}

#[test]
fn test_tables_with_different_names_are_independent() {
    let (_dir, conn) = create_test_db();
    let first: KeyValueTable<u64, u64> = KeyValueTable::new(&conn, "first").unwrap();
    let second: KeyValueTable<u64, u64> = KeyValueTable::new(&conn, "second").unwrap();

    first.insert(&1, &1).unwrap();
    assert!(second.find(&1).unwrap().is_none());
}

#[test]
fn test_values_survive_reconnect() {
    let (_dir, conn) = create_test_db();
    let table: KeyValueTable<u64, Vec<String>> = KeyValueTable::new(&conn, "persisted").unwrap();
    let tags = vec!["red".to_string(), String::new(), "blue".to_string()];
    table.insert(&9, &tags).unwrap();

    conn.disconnect().unwrap();
    assert!(table.find(&9).is_err());

    conn.connect().unwrap();
    assert_eq!(table.find(&9).unwrap(), Some(tags));
}

#[test]
fn test_try_get_leaves_target_on_miss() {
    let (_dir, conn) = create_test_db();
    let table: KeyValueTable<u64, String> = KeyValueTable::new(&conn, "try_get").unwrap();
    table.insert(&1, &"one".to_string()).unwrap();

    let mut out = "unset".to_string();
    assert!(!table.try_get(&2, &mut out).unwrap());
    assert_eq!(out, "unset");
    assert!(table.try_get(&1, &mut out).unwrap());
    assert_eq!(out, "one");
}

//! Empty scan, single split, reverse-order insert, and reopen-with-growth.

use emberdb::storage::btree::BTree;
use emberdb::value::{Value, ValueMap};
use tempfile::tempdir;

fn record(pairs: Vec<(&str, Value)>) -> ValueMap {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

#[test]
fn empty_scan_returns_nothing() {
    let dir = tempdir().unwrap();
    let mut tree = BTree::open(dir.path().join("t.db"), 4096).unwrap();
    for k in ["a", "b", "c"] {
        tree.write(k.as_bytes(), &record(vec![("v", Value::Int32(1))])).unwrap();
    }
    let results = tree.scan(Some(b"x"), None, None).unwrap();
    assert!(results.is_empty());
}

#[test]
fn thirty_five_customer_records_trigger_one_split_with_both_leaves_at_least_ten() {
    let dir = tempdir().unwrap();
    let mut tree = BTree::open(dir.path().join("t.db"), 4096).unwrap();
    for i in 0..35 {
        let key = format!("CUST{i:04}");
        let row = record(vec![
            ("id", Value::Text(key.clone())),
            ("name", Value::Text("n".repeat(10))),
            ("email", Value::Text("e".repeat(20))),
            ("age", Value::Int32(20 + (i % 50))),
            ("city", Value::Text("c".repeat(8))),
        ]);
        tree.write(key.as_bytes(), &row).unwrap();
    }
    for i in 0..35 {
        let key = format!("CUST{i:04}");
        assert!(tree.read(key.as_bytes()).unwrap().is_some(), "missing {key}");
    }
    let all = tree.scan(None, None, None).unwrap();
    assert_eq!(all.len(), 35);
}

#[test]
fn reverse_order_insert_is_fully_readable_and_scans_ascending() {
    let dir = tempdir().unwrap();
    let mut tree = BTree::open(dir.path().join("t.db"), 4096).unwrap();
    for i in (1..=50).rev() {
        let key = format!("CUST{i:04}");
        tree.write(key.as_bytes(), &record(vec![("id", Value::Int32(i))])).unwrap();
    }
    for i in 1..=50 {
        let key = format!("CUST{i:04}");
        assert!(tree.read(key.as_bytes()).unwrap().is_some());
    }
    let scanned = tree.scan(Some(b"CUST0001"), Some(b"CUST0051"), None).unwrap();
    assert_eq!(scanned.len(), 50);
    let keys: Vec<_> = scanned.iter().map(|(k, _)| k.clone()).collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
}

#[test]
fn reopen_with_growth_keeps_all_two_hundred_records_readable_within_page_read_budget() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("t.db");
    {
        let mut tree = BTree::open(&path, 4096).unwrap();
        for i in 1..=100 {
            let key = format!("CUST{i:04}");
            tree.write(key.as_bytes(), &record(vec![("id", Value::Int32(i))])).unwrap();
        }
    }
    let mut tree = BTree::open(&path, 4096).unwrap();
    for i in 101..=200 {
        let key = format!("CUST{i:04}");
        tree.write(key.as_bytes(), &record(vec![("id", Value::Int32(i))])).unwrap();
    }
    for i in 1..=200 {
        let key = format!("CUST{i:04}");
        assert!(tree.read(key.as_bytes()).unwrap().is_some(), "missing {key}");
    }

    tree.reset_counters();
    assert!(tree.read(b"CUST0200").unwrap().is_some());
    assert!(
        tree.page_reads() <= 4,
        "point read of CUST0200 took {} page reads, expected <= 4",
        tree.page_reads()
    );
}

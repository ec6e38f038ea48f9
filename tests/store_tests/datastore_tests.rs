//! Datastore Tests
//!
//! Tests verify:
//! - Field and whole-record addressing
//! - Merge versus replace writes
//! - Transparent striping of oversized byte values
//! - Isolation of stripe records from user records
//! - Rejection of caller-written partition markers
//! - Cleanup of stale stripes and deletes

use std::sync::Arc;

use misery::store::{DocumentStore, MemoryStore};
use misery::{BlobPartitioner, Datastore, MiseryError, Record, Value};

fn setup(limit: usize) -> (Datastore, Arc<MemoryStore>) {
    let backend = Arc::new(MemoryStore::new());
    let store = Datastore::new(backend.clone(), BlobPartitioner::new(limit).unwrap());
    (store, backend)
}

fn path(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

fn blob(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

// =============================================================================
// Addressing Tests
// =============================================================================

#[test]
fn test_field_read_returns_that_field() {
    let (store, _) = setup(1024);
    store
        .write("Guild/Commands/Sticker%color", Value::from("red"), true)
        .unwrap();
    store
        .write("Guild/Commands/Sticker%size", Value::Int(3), true)
        .unwrap();

    assert_eq!(
        store.read("Guild/Commands/Sticker%color").unwrap(),
        Some(Value::from("red"))
    );
    assert_eq!(
        store.read("Guild/Commands/Sticker%size").unwrap(),
        Some(Value::Int(3))
    );
}

#[test]
fn test_whole_record_read_returns_map() {
    let (store, _) = setup(1024);
    store.write("A/B%x", Value::Int(1), true).unwrap();
    store.write("A/B%y", Value::Bool(true), true).unwrap();

    let value = store.read("A/B").unwrap().unwrap();
    let map = value.as_map().unwrap();
    assert_eq!(map.len(), 2);
    assert_eq!(map["x"], Value::Int(1));
    assert_eq!(map["y"], Value::Bool(true));
}

#[test]
fn test_missing_record_and_field_read_as_none() {
    let (store, _) = setup(1024);
    assert_eq!(store.read("Nope%x").unwrap(), None);

    store.write("A%x", Value::Int(1), true).unwrap();
    assert_eq!(store.read("A%missing").unwrap(), None);
}

#[test]
fn test_whitespace_keys_share_a_record() {
    let (store, _) = setup(1024);
    store.write("My Guild/Cmd%f", Value::from("v"), true).unwrap();
    assert_eq!(store.read("My_Guild/Cmd%f").unwrap(), Some(Value::from("v")));
}

#[test]
fn test_invalid_key_is_rejected() {
    let (store, _) = setup(1024);
    let result = store.write("A%B%C", Value::Null, true);
    assert!(matches!(result, Err(MiseryError::InvalidKey { .. })));
}

// =============================================================================
// Write Mode Tests
// =============================================================================

#[test]
fn test_merge_keeps_other_fields() {
    let (store, _) = setup(1024);
    store.write("A%x", Value::Int(1), true).unwrap();
    store.write("A%y", Value::Int(2), true).unwrap();

    assert_eq!(store.read("A%x").unwrap(), Some(Value::Int(1)));
}

#[test]
fn test_replace_drops_other_fields() {
    let (store, _) = setup(1024);
    store.write("A%x", Value::Int(1), true).unwrap();
    store.write("A%y", Value::Int(2), false).unwrap();

    assert_eq!(store.read("A%x").unwrap(), None);
    assert_eq!(store.read("A%y").unwrap(), Some(Value::Int(2)));
}

#[test]
fn test_whole_record_write_needs_map() {
    let (store, _) = setup(1024);

    let result = store.write("A/B", Value::from("not a map"), true);
    assert!(matches!(result, Err(MiseryError::InvalidArgument(_))));

    let mut record = Record::new();
    record.insert("endpoint".to_string(), Value::from("http://h/x"));
    store.write("A/B", Value::Map(record), true).unwrap();
    assert_eq!(
        store.read("A/B%endpoint").unwrap(),
        Some(Value::from("http://h/x"))
    );
}

// =============================================================================
// Striping Tests
// =============================================================================

#[test]
fn test_small_bytes_stay_inline() {
    let (store, backend) = setup(100);
    store.write("G/S%image", Value::Bytes(blob(100)), true).unwrap();

    let record = backend.get(&path(&["G", "S"])).unwrap().unwrap();
    assert_eq!(record["image"], Value::Bytes(blob(100)));
    assert!(backend.children(&path(&["G", "S"])).unwrap().is_empty());
}

#[test]
fn test_large_bytes_are_striped() {
    let (store, backend) = setup(100);
    let data = blob(250);
    store.write("G/S%image", Value::Bytes(data.clone()), true).unwrap();

    let record = backend.get(&path(&["G", "S"])).unwrap().unwrap();
    assert_eq!(record["image"], Value::Partitioned { parts: 3 });
    assert_eq!(
        backend.children(&path(&["G", "S"])).unwrap(),
        vec!["%0", "%1", "%2"]
    );

    let part = backend.get(&path(&["G", "S", "%2"])).unwrap().unwrap();
    assert_eq!(part["image"], Value::Bytes(data[200..].to_vec()));

    assert_eq!(store.read("G/S%image").unwrap(), Some(Value::Bytes(data)));
}

#[test]
fn test_more_than_ten_partitions_reassemble_in_order() {
    let (store, _) = setup(10);
    let data = blob(125);
    store.write("G/S%image", Value::Bytes(data.clone()), true).unwrap();

    let read = store.read_bytes("G/S%image").unwrap().unwrap();
    assert_eq!(read.as_ref(), data.as_slice());
}

#[test]
fn test_shorter_rewrite_clears_stale_stripes() {
    let (store, backend) = setup(100);
    store.write("G/S%image", Value::Bytes(blob(450)), true).unwrap();
    assert_eq!(backend.children(&path(&["G", "S"])).unwrap().len(), 5);

    store.write("G/S%image", Value::Bytes(blob(150)), true).unwrap();
    assert_eq!(
        backend.children(&path(&["G", "S"])).unwrap(),
        vec!["%0", "%1"]
    );
    assert_eq!(store.read("G/S%image").unwrap(), Some(Value::Bytes(blob(150))));

    store.write("G/S%image", Value::from("inline now"), true).unwrap();
    assert!(backend.children(&path(&["G", "S"])).unwrap().is_empty());
}

#[test]
fn test_stripes_of_two_fields_share_children() {
    let (store, backend) = setup(100);
    store.write("G/S%a", Value::Bytes(blob(300)), true).unwrap();
    store.write("G/S%b", Value::Bytes(blob(150)), true).unwrap();

    store.delete("G/S%b").unwrap();
    // "a" still needs all three children
    assert_eq!(backend.children(&path(&["G", "S"])).unwrap().len(), 3);
    assert_eq!(store.read("G/S%a").unwrap(), Some(Value::Bytes(blob(300))));
}

#[test]
fn test_missing_partition_is_corruption() {
    let (store, backend) = setup(100);
    store.write("G/S%image", Value::Bytes(blob(300)), true).unwrap();
    backend.delete(&path(&["G", "S", "%1"])).unwrap();

    let result = store.read("G/S%image");
    assert!(matches!(result, Err(MiseryError::Corruption(_))));
}

#[test]
fn test_whole_record_read_reassembles_striped_fields() {
    let (store, _) = setup(100);
    let mut record = Record::new();
    record.insert("image".to_string(), Value::Bytes(blob(250)));
    record.insert("name".to_string(), Value::from("sticker"));
    store.write("G/S", Value::Map(record.clone()), true).unwrap();

    assert_eq!(store.read("G/S").unwrap(), Some(Value::Map(record)));
}

#[test]
fn test_striping_leaves_user_child_records_alone() {
    let (store, _) = setup(100);
    store.write("G/S/0%image", Value::from("mine"), true).unwrap();
    store.write("G/S%image", Value::Bytes(blob(250)), true).unwrap();

    assert_eq!(store.read("G/S/0%image").unwrap(), Some(Value::from("mine")));
    assert_eq!(store.read("G/S%image").unwrap(), Some(Value::Bytes(blob(250))));
}

#[test]
fn test_user_child_write_leaves_stripes_alone() {
    let (store, _) = setup(100);
    store.write("G/S%image", Value::Bytes(blob(250)), true).unwrap();
    store.write("G/S/1%image", Value::from("note"), true).unwrap();
    store.delete("G/S/2").unwrap();

    assert_eq!(store.read("G/S%image").unwrap(), Some(Value::Bytes(blob(250))));
    assert_eq!(store.read("G/S/1%image").unwrap(), Some(Value::from("note")));
}

#[test]
fn test_stripe_segments_are_not_addressable() {
    assert!(Datastore::is_stripe_segment(&Datastore::stripe_segment(7)));
    assert!(!Datastore::is_stripe_segment("7"));

    let (store, _) = setup(100);
    let result = store.read("G/S/%0%image");
    assert!(matches!(result, Err(MiseryError::InvalidKey { .. })));
}

#[test]
fn test_caller_written_marker_rejected() {
    let (store, backend) = setup(100);

    let result = store.write("G/S%image", Value::Partitioned { parts: 3 }, true);
    assert!(matches!(result, Err(MiseryError::InvalidArgument(_))));

    let mut record = Record::new();
    record.insert("name".to_string(), Value::from("sticker"));
    record.insert("image".to_string(), Value::Partitioned { parts: 2 });
    let result = store.write("G/S", Value::Map(record), false);
    assert!(matches!(result, Err(MiseryError::InvalidArgument(_))));

    assert!(backend.is_empty());
}

#[test]
fn test_read_bytes_rejects_other_kinds() {
    let (store, _) = setup(100);
    store.write("A%s", Value::from("text"), true).unwrap();
    assert!(matches!(
        store.read_bytes("A%s"),
        Err(MiseryError::InvalidArgument(_))
    ));
}

// =============================================================================
// Delete Tests
// =============================================================================

#[test]
fn test_delete_field() {
    let (store, _) = setup(100);
    store.write("A%x", Value::Int(1), true).unwrap();
    store.write("A%y", Value::Int(2), true).unwrap();

    assert!(store.delete("A%x").unwrap());
    assert!(!store.delete("A%x").unwrap());
    assert_eq!(store.read("A%x").unwrap(), None);
    assert_eq!(store.read("A%y").unwrap(), Some(Value::Int(2)));
}

#[test]
fn test_delete_record_removes_stripes() {
    let (store, backend) = setup(100);
    store.write("G/S%image", Value::Bytes(blob(300)), true).unwrap();

    assert!(store.delete("G/S").unwrap());
    assert_eq!(store.read("G/S").unwrap(), None);
    assert!(backend.is_empty());
    assert!(!store.delete("G/S").unwrap());
}

#[test]
fn test_deleting_last_field_removes_record() {
    let (store, backend) = setup(100);
    store.write("A%x", Value::Int(1), true).unwrap();
    store.write("A%img", Value::Bytes(blob(250)), true).unwrap();

    assert!(store.delete("A%x").unwrap());
    assert!(store.delete("A%img").unwrap());
    assert_eq!(store.read("A").unwrap(), None);
    assert!(backend.is_empty());
}

//! Behavioral tests for the change watcher.

use crossbeam_channel::{unbounded, Receiver};
use docwatch::{Change, CollectionChanges, DocId, EntryId, LogEntry, MemoryLog, Revno, Watcher};
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

fn entry(collection: &str, pairs: &[(i64, Revno)]) -> Vec<CollectionChanges> {
    vec![CollectionChanges {
        collection: collection.to_string(),
        doc_ids: pairs.iter().map(|(id, _)| DocId::Int(*id)).collect(),
        revnos: pairs.iter().map(|(_, revno)| *revno).collect(),
    }]
}

/// Start a watcher and wait for its initial sync, so later appends are
/// strictly newer than the seeded boundary.
fn started_watcher(log: &MemoryLog) -> Watcher {
    let watcher = Watcher::new(log.clone());
    watcher.sync();
    watcher
}

fn assert_change(rx: &Receiver<Change>, collection: &str, id: i64, revno: Revno) {
    let change = rx.recv_timeout(TIMEOUT).expect("expected a change event");
    assert_eq!(
        change,
        Change {
            collection: collection.to_string(),
            id: DocId::Int(id),
            revno,
        }
    );
}

/// Only meaningful after a `sync()` barrier: all queued deliveries for
/// finished passes have completed by then.
fn assert_no_change(rx: &Receiver<Change>) {
    assert!(rx.try_recv().is_err(), "expected no change event");
}

#[test]
fn test_document_watch_sees_change() {
    let log = MemoryLog::new();
    let watcher = started_watcher(&log);
    let (tx, rx) = unbounded();

    log.append(entry("users", &[(7, 1)]));
    watcher.watch("users", 7, -1, tx);
    watcher.sync();

    assert_change(&rx, "users", 7, 1);
    watcher.stop().unwrap();
}

#[test]
fn test_no_event_when_revno_not_newer() {
    let log = MemoryLog::new();
    let watcher = started_watcher(&log);
    let (tx, rx) = unbounded();

    watcher.watch("users", 7, 5, tx);
    log.append(entry("users", &[(7, 5)]));
    watcher.sync();

    assert_no_change(&rx);
    watcher.stop().unwrap();
}

#[test]
fn test_collection_watch_newest_revno_wins() {
    let log = MemoryLog::new();
    let watcher = started_watcher(&log);
    let (tx, rx) = unbounded();

    watcher.watch_collection("apps", tx);
    log.append(entry("apps", &[(1, 10), (2, 11), (1, 12)]));
    watcher.sync();

    let mut changes = vec![
        rx.recv_timeout(TIMEOUT).unwrap(),
        rx.recv_timeout(TIMEOUT).unwrap(),
    ];
    assert_no_change(&rx);
    changes.sort_by_key(|change| change.id.clone());
    assert_eq!(changes[0], Change { collection: "apps".into(), id: DocId::Int(1), revno: 12 });
    assert_eq!(changes[1], Change { collection: "apps".into(), id: DocId::Int(2), revno: 11 });
    watcher.stop().unwrap();
}

#[test]
fn test_deletion_is_delivered_as_minus_one() {
    let log = MemoryLog::new();
    let watcher = started_watcher(&log);
    let (tx, rx) = unbounded();

    watcher.watch("users", 7, 5, tx);
    // Any negative revno in the log means deletion.
    log.append(entry("users", &[(7, -5)]));
    watcher.sync();

    assert_change(&rx, "users", 7, -1);
    watcher.stop().unwrap();
}

#[test]
fn test_two_subscribers_then_unwatch_one() {
    let log = MemoryLog::new();
    let watcher = started_watcher(&log);
    let (tx1, rx1) = unbounded();
    let (tx2, rx2) = unbounded();

    watcher.watch("users", 7, 0, tx1.clone());
    watcher.watch("users", 7, 0, tx2);
    log.append(entry("users", &[(7, 3)]));
    watcher.sync();

    assert_change(&rx1, "users", 7, 3);
    assert_change(&rx2, "users", 7, 3);
    assert_no_change(&rx1);
    assert_no_change(&rx2);

    watcher.unwatch("users", 7, &tx1);
    log.append(entry("users", &[(7, 4)]));
    watcher.sync();

    assert_change(&rx2, "users", 7, 4);
    assert_no_change(&rx1);
    watcher.stop().unwrap();
}

#[test]
fn test_history_before_creation_is_suppressed() {
    let log = MemoryLog::new();
    log.append(entry("users", &[(7, 1)]));

    let watcher = started_watcher(&log);
    let (tx, rx) = unbounded();
    watcher.watch("users", 7, -1, tx);
    watcher.sync();

    assert_no_change(&rx);
    watcher.stop().unwrap();
}

#[test]
fn test_catch_up_at_watch_time() {
    let log = MemoryLog::new();
    let watcher = started_watcher(&log);

    log.append(entry("users", &[(7, 3)]));
    watcher.sync();

    // Behind the live revision: caught up without any further sync.
    let (tx1, rx1) = unbounded();
    watcher.watch("users", 7, 1, tx1);
    assert_change(&rx1, "users", 7, 3);

    // Already current: no catch-up.
    let (tx2, rx2) = unbounded();
    watcher.watch("users", 7, 3, tx2);
    watcher.sync();
    assert_no_change(&rx2);
    watcher.stop().unwrap();
}

#[test]
fn test_catch_up_on_deleted_document() {
    let log = MemoryLog::new();
    let watcher = started_watcher(&log);

    log.append(entry("users", &[(7, 5)]));
    watcher.sync();
    log.append(entry("users", &[(7, -1)]));
    watcher.sync();

    // Claims the document exists: must be told it is deleted even though
    // -1 is not numerically greater.
    let (tx1, rx1) = unbounded();
    watcher.watch("users", 7, 2, tx1);
    assert_change(&rx1, "users", 7, -1);

    // Already believes it nonexistent: nothing to say.
    let (tx2, rx2) = unbounded();
    watcher.watch("users", 7, -1, tx2);
    watcher.sync();
    assert_no_change(&rx2);
    watcher.stop().unwrap();
}

#[test]
fn test_revnos_arrive_in_increasing_order() {
    let log = MemoryLog::new();
    let watcher = started_watcher(&log);
    let (tx, rx) = unbounded();

    watcher.watch("users", 7, -1, tx);
    for revno in 1..=3 {
        log.append(entry("users", &[(7, revno)]));
        watcher.sync();
    }

    for revno in 1..=3 {
        assert_change(&rx, "users", 7, revno);
    }
    assert_no_change(&rx);
    watcher.stop().unwrap();
}

#[test]
fn test_one_pass_collapses_to_newest_revno() {
    let log = MemoryLog::new();
    let watcher = started_watcher(&log);
    let (tx, rx) = unbounded();

    watcher.watch("users", 7, -1, tx);
    log.append(entry("users", &[(7, 1)]));
    log.append(entry("users", &[(7, 2)]));
    watcher.sync();

    // Both entries land in one pass; only the newest revno is reported.
    assert_change(&rx, "users", 7, 2);
    assert_no_change(&rx);
    watcher.stop().unwrap();
}

#[test]
fn test_cross_key_events_delivered_oldest_first() {
    let log = MemoryLog::new();
    let watcher = started_watcher(&log);
    let (tx, rx) = unbounded();

    watcher.watch_collection("users", tx);
    log.append(entry("users", &[(1, 1)]));
    log.append(entry("users", &[(2, 2)]));
    watcher.sync();

    assert_change(&rx, "users", 1, 1);
    assert_change(&rx, "users", 2, 2);
    watcher.stop().unwrap();
}

#[test]
fn test_delete_and_recreate() {
    let log = MemoryLog::new();
    let watcher = started_watcher(&log);
    let (tx, rx) = unbounded();

    watcher.watch("users", 7, -1, tx);
    log.append(entry("users", &[(7, 2)]));
    watcher.sync();
    log.append(entry("users", &[(7, -1)]));
    watcher.sync();
    log.append(entry("users", &[(7, 3)]));
    watcher.sync();

    assert_change(&rx, "users", 7, 2);
    assert_change(&rx, "users", 7, -1);
    assert_change(&rx, "users", 7, 3);
    watcher.stop().unwrap();
}

#[test]
fn test_unwatch_collection() {
    let log = MemoryLog::new();
    let watcher = started_watcher(&log);
    let (tx, rx) = unbounded();

    watcher.watch_collection("users", tx.clone());
    log.append(entry("users", &[(7, 1)]));
    watcher.sync();
    assert_change(&rx, "users", 7, 1);

    watcher.unwatch_collection("users", &tx);
    log.append(entry("users", &[(7, 2)]));
    watcher.sync();
    assert_no_change(&rx);
    watcher.stop().unwrap();
}

#[test]
fn test_string_document_ids() {
    let log = MemoryLog::new();
    let watcher = started_watcher(&log);
    let (tx, rx) = unbounded();

    watcher.watch("units", "wordpress/0", -1, tx);
    log.append(vec![CollectionChanges {
        collection: "units".to_string(),
        doc_ids: vec![DocId::from("wordpress/0")],
        revnos: vec![1],
    }]);
    watcher.sync();

    let change = rx.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(change.id, DocId::from("wordpress/0"));
    assert_eq!(change.revno, 1);
    watcher.stop().unwrap();
}

#[test]
fn test_log_entry_wire_format() {
    let entry = LogEntry {
        id: EntryId(42),
        changes: vec![CollectionChanges {
            collection: "users".to_string(),
            doc_ids: vec![DocId::Int(7), DocId::from("bob")],
            revnos: vec![3, -1],
        }],
    };

    let value = serde_json::to_value(&entry).unwrap();
    assert_eq!(
        value,
        serde_json::json!({
            "_id": 42,
            "changes": [{"c": "users", "d": [7, "bob"], "r": [3, -1]}],
        })
    );

    let decoded: LogEntry = serde_json::from_value(value).unwrap();
    assert_eq!(decoded, entry);
}

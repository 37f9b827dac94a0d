//! Integration tests for the transactional buffer pool.
//!
//! These tests watch the pool from the outside: what it asks of the log and
//! the page store, and in which order.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{create_pool, pid, test_config, write_byte, Event, TABLE, TUPLE_WIDTH};
use txcache::{DirtyPagePolicy, Error, Permissions, TransactionId, Tuple};

#[test]
fn test_capacity_invariant() {
    let h = create_pool(test_config(5), 6);
    let tid = TransactionId(1);

    for n in 0..6 {
        h.pool.get_page(tid, pid(n), Permissions::ReadOnly).unwrap();
        assert!(h.pool.page_count() <= 5);
    }

    let snapshot = h.pool.stats().snapshot();
    assert_eq!(h.pool.page_count(), 5);
    assert_eq!(snapshot.evictions, 1);
    assert_eq!(snapshot.cache_misses, 6);
}

#[test]
fn test_commit_logs_before_any_page_write() {
    let h = create_pool(test_config(4), 2);
    let tid = TransactionId(1);

    for n in 0..2 {
        let page = h.pool.get_page(tid, pid(n), Permissions::ReadWrite).unwrap();
        write_byte(&page, tid, 0xA0 + n as u8);
    }
    h.pool.transaction_complete(tid, true).unwrap();

    let mut after = vec![0u8; common::PAGE_SIZE];
    after[0] = 0xA0;
    assert_eq!(
        h.events()[0],
        Event::LogWrite {
            tid,
            page_id: pid(0),
            before: vec![0u8; common::PAGE_SIZE],
            after,
        }
    );
    assert!(matches!(h.events()[1], Event::LogWrite { page_id, .. } if page_id == pid(1)));
    assert_eq!(h.events()[2..], [Event::LogCommit(tid), Event::Force]);

    // Committed pages are clean but still cached; the store has seen nothing
    for n in 0..2 {
        assert!(h.pool.is_cached(pid(n)));
    }

    h.pool.flush_all_pages().unwrap();
    let writes: Vec<_> = h.events()[4..].to_vec();
    assert!(matches!(
        writes.as_slice(),
        [Event::PageWrite { page_id: a, .. }, Event::PageWrite { page_id: b, .. }]
            if *a == pid(0) && *b == pid(1)
    ));
    assert_eq!(h.disk_byte(pid(1)), 0xA1);
}

#[test]
fn test_flushing_uncommitted_page_forces_log_first() {
    let h = create_pool(test_config(4), 1);
    let tid = TransactionId(7);

    let page = h.pool.get_page(tid, pid(0), Permissions::ReadWrite).unwrap();
    write_byte(&page, tid, 0x33);
    drop(page);

    h.pool.flush_pages(tid).unwrap();

    let events = h.events();
    assert_eq!(events.len(), 3);
    assert!(matches!(events[0], Event::LogWrite { tid: t, .. } if t == tid));
    assert_eq!(events[1], Event::Force);
    assert!(matches!(events[2], Event::PageWrite { page_id, .. } if page_id == pid(0)));
    assert!(!h.pool.holds_lock(tid, pid(0)));
}

#[test]
fn test_abort_cleanup() {
    let h = create_pool(test_config(4), 2);
    let tid = TransactionId(1);

    for n in 0..2 {
        let page = h.pool.get_page(tid, pid(n), Permissions::ReadWrite).unwrap();
        write_byte(&page, tid, 0xEE);
    }
    h.pool.transaction_complete(tid, false).unwrap();

    for n in 0..2 {
        assert!(!h.pool.is_cached(pid(n)));
        assert!(!h.pool.holds_lock(tid, pid(n)));
    }
    assert!(h.events().is_empty());

    let reader = TransactionId(2);
    let page = h.pool.get_page(reader, pid(0), Permissions::ReadOnly).unwrap();
    assert_eq!(page.read().as_slice()[0], 0);
    assert_eq!(h.pool.stats().snapshot().aborts, 1);
}

#[test]
fn test_two_transactions_sharing_a_page() {
    let h = create_pool(test_config(2), 2);
    let (t1, t2) = (TransactionId(1), TransactionId(2));
    let (a, b) = (pid(0), pid(1));

    h.pool.get_page(t1, a, Permissions::ReadOnly).unwrap();
    h.pool.get_page(t1, b, Permissions::ReadOnly).unwrap();

    let pool = Arc::clone(&h.pool);
    let writer = thread::spawn(move || {
        let page = pool.get_page(t2, a, Permissions::ReadWrite)?;
        write_byte(&page, t2, 0x42);
        drop(page);
        pool.transaction_complete(t2, true)
    });

    // t2 blocks behind t1's shared lock
    thread::sleep(Duration::from_millis(50));
    assert!(!h.pool.holds_lock(t2, a));

    h.pool.transaction_complete(t1, true).unwrap();
    writer.join().unwrap().unwrap();

    assert!(h.pool.page_count() <= 2);
    for page_id in [a, b] {
        let page = h.pool.get_page(TransactionId(3), page_id, Permissions::ReadOnly).unwrap();
        assert!(!page.read().is_dirty());
    }
    let page = h.pool.get_page(TransactionId(3), a, Permissions::ReadOnly).unwrap();
    assert_eq!(page.read().as_slice()[0], 0x42);
}

#[test]
fn test_lock_timeout_aborts_and_releases() {
    let h = create_pool(test_config(4), 2);
    let (t1, t2) = (TransactionId(1), TransactionId(2));

    h.pool.get_page(t1, pid(0), Permissions::ReadWrite).unwrap();
    h.pool.get_page(t2, pid(1), Permissions::ReadOnly).unwrap();

    let err = h
        .pool
        .get_page(t2, pid(0), Permissions::ReadWrite)
        .unwrap_err();
    assert!(err.is_abort());

    assert!(!h.pool.holds_lock(t2, pid(1)));
    // t1 is untouched and can still upgrade/finish
    assert!(h.pool.holds_lock(t1, pid(0)));
    h.pool.transaction_complete(t1, true).unwrap();
}

#[test]
fn test_no_steal_backpressure_then_retry() {
    let config = txcache::Config {
        dirty_page_policy: DirtyPagePolicy::NoSteal,
        ..test_config(1)
    };
    let h = create_pool(config, 2);
    let (t1, t2) = (TransactionId(1), TransactionId(2));

    let page = h.pool.get_page(t1, pid(0), Permissions::ReadWrite).unwrap();
    write_byte(&page, t1, 1);
    drop(page);

    let err = h
        .pool
        .get_page(t2, pid(1), Permissions::ReadOnly)
        .unwrap_err();
    assert!(err.is_retryable());
    assert!(matches!(err, Error::BufferPoolFull(1)));

    h.pool.transaction_complete(t1, true).unwrap();
    h.pool.get_page(t2, pid(1), Permissions::ReadOnly).unwrap();

    // The committed page was written back on its way out
    assert!(!h.pool.is_cached(pid(0)));
    assert_eq!(h.disk_byte(pid(0)), 1);
}

#[test]
fn test_eviction_failure_is_reported() {
    let h = create_pool(test_config(1), 2);
    let tid = TransactionId(1);

    let page = h.pool.get_page(tid, pid(0), Permissions::ReadWrite).unwrap();
    write_byte(&page, tid, 1);
    drop(page);
    h.pool.transaction_complete(tid, true).unwrap();

    h.fail_writes.store(true, Ordering::SeqCst);

    let err = h
        .pool
        .get_page(TransactionId(2), pid(1), Permissions::ReadOnly)
        .unwrap_err();
    assert!(err.is_retryable());
    assert!(matches!(err, Error::EvictionFailed { page_id, .. } if page_id == pid(0)));
    // Nothing was dropped
    assert!(h.pool.is_cached(pid(0)));

    h.fail_writes.store(false, Ordering::SeqCst);
    h.pool
        .get_page(TransactionId(2), pid(1), Permissions::ReadOnly)
        .unwrap();
    assert_eq!(h.disk_byte(pid(0)), 1);
}

#[test]
fn test_abort_undoes_page_stolen_by_eviction() {
    let h = create_pool(test_config(1), 2);
    let (t1, t2) = (TransactionId(1), TransactionId(2));

    let page = h.pool.get_page(t1, pid(0), Permissions::ReadWrite).unwrap();
    write_byte(&page, t1, 0xEE);
    drop(page);

    // Only slot is dirty: page 0 goes to disk uncommitted
    h.pool.get_page(t1, pid(1), Permissions::ReadOnly).unwrap();
    assert_eq!(h.disk_byte(pid(0)), 0xEE);

    h.pool.transaction_complete(t1, false).unwrap();
    assert_eq!(h.disk_byte(pid(0)), 0);

    let page = h.pool.get_page(t2, pid(0), Permissions::ReadOnly).unwrap();
    assert_eq!(page.read().as_slice()[0], 0);
}

#[test]
fn test_abort_undo_failure_keeps_locks_until_retry() {
    let h = create_pool(test_config(1), 2);
    let t1 = TransactionId(1);

    let page = h.pool.get_page(t1, pid(0), Permissions::ReadWrite).unwrap();
    write_byte(&page, t1, 0xEE);
    drop(page);
    h.pool.get_page(t1, pid(1), Permissions::ReadOnly).unwrap();

    h.fail_writes.store(true, Ordering::SeqCst);
    assert!(h.pool.transaction_complete(t1, false).is_err());
    assert!(h.pool.holds_lock(t1, pid(0)));
    assert_eq!(h.disk_byte(pid(0)), 0xEE);

    h.fail_writes.store(false, Ordering::SeqCst);
    h.pool.transaction_complete(t1, false).unwrap();
    assert!(!h.pool.holds_lock(t1, pid(0)));
    assert_eq!(h.disk_byte(pid(0)), 0);
}

#[test]
fn test_retried_eviction_logs_update_once() {
    let h = create_pool(test_config(1), 2);
    let tid = TransactionId(1);

    let page = h.pool.get_page(tid, pid(0), Permissions::ReadWrite).unwrap();
    write_byte(&page, tid, 4);
    drop(page);

    h.fail_writes.store(true, Ordering::SeqCst);
    for _ in 0..2 {
        let err = h
            .pool
            .get_page(tid, pid(1), Permissions::ReadOnly)
            .unwrap_err();
        assert!(matches!(err, Error::EvictionFailed { .. }));
    }

    h.fail_writes.store(false, Ordering::SeqCst);
    h.pool.get_page(tid, pid(1), Permissions::ReadOnly).unwrap();
    h.pool.transaction_complete(tid, true).unwrap();

    let updates = h
        .events()
        .iter()
        .filter(|event| matches!(event, Event::LogWrite { .. }))
        .count();
    assert_eq!(updates, 1);
    assert_eq!(h.disk_byte(pid(0)), 4);
}

#[test]
fn test_insert_scan_delete_tuples() {
    let h = create_pool(test_config(8), 0);
    let tid = TransactionId(1);

    let mut stored = Vec::new();
    for i in 0..40u8 {
        let mut tuple = Tuple::new(vec![i; TUPLE_WIDTH]);
        h.pool.insert_tuple(tid, TABLE, &mut tuple).unwrap();
        stored.push(tuple);
    }

    // 256-byte pages hold 31 eight-byte tuples
    assert_eq!(h.file.page_count(), 2);
    assert_eq!(h.file.scan(&h.pool, tid).unwrap().len(), 40);

    h.pool.delete_tuple(tid, &stored[3]).unwrap();
    h.pool.transaction_complete(tid, true).unwrap();

    let reader = TransactionId(2);
    let rows = h.file.scan(&h.pool, reader).unwrap();
    assert_eq!(rows.len(), 39);
    assert!(rows.iter().all(|row| row.data()[0] != 3));
}

#[test]
fn test_concurrent_writers_on_distinct_pages() {
    let h = create_pool(test_config(8), 4);

    let handles: Vec<_> = (0..4u32)
        .map(|n| {
            let pool = Arc::clone(&h.pool);
            thread::spawn(move || {
                let tid = TransactionId(100 + n as u64);
                let page = pool.get_page(tid, pid(n), Permissions::ReadWrite).unwrap();
                write_byte(&page, tid, n as u8 + 1);
                drop(page);
                pool.transaction_complete(tid, true).unwrap();
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    h.pool.flush_all_pages().unwrap();
    for n in 0..4 {
        assert_eq!(h.disk_byte(pid(n)), n as u8 + 1);
    }
    assert_eq!(h.pool.stats().snapshot().commits, 4);
}

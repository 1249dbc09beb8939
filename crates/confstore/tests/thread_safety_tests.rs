//! Concurrency tests: readers never observe a half-applied transaction.
#![allow(missing_docs)]

use confstore::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Default, Schema)]
struct Pair {
    a: i64,
    b: i64,
}

#[derive(Debug, Clone, Default, Schema)]
struct Holder {
    #[confstore(nested)]
    left: Pair,
    #[confstore(nested)]
    right: Pair,
}

const WRITES: i64 = 500;
const READERS: usize = 4;

#[test]
fn test_readers_never_see_torn_pairs() {
    let store = PairStore::create(None);
    let done = AtomicBool::new(false);

    thread::scope(|s| {
        for _ in 0..READERS {
            let store = store.clone();
            let done = &done;
            s.spawn(move || {
                while !done.load(Ordering::SeqCst) {
                    let lock = store.write_lock();
                    let _read = lock.read();
                    let a = store.a();
                    let b = store.b();
                    assert_eq!(a, -b, "torn read: a={a} b={b}");
                }
            });
        }

        for i in 1..=WRITES {
            let _tx = store.change_transaction().unwrap();
            store.set_a(i);
            store.set_b(-i);
        }
        done.store(true, Ordering::SeqCst);
    });

    assert_eq!(store.a(), WRITES);
    assert_eq!(store.b(), -WRITES);
}

#[test]
fn test_snapshot_is_consistent_across_children() {
    let store = HolderStore::create(None);
    let done = AtomicBool::new(false);

    thread::scope(|s| {
        {
            let store = store.clone();
            let done = &done;
            s.spawn(move || {
                while !done.load(Ordering::SeqCst) {
                    let snapshot = store.snapshot();
                    assert_eq!(snapshot.left.a, snapshot.right.a);
                }
            });
        }

        for i in 1..=WRITES {
            store.copy_from(
                &Holder {
                    left: Pair { a: i, b: 0 },
                    right: Pair { a: i, b: 0 },
                },
                true,
            );
        }
        done.store(true, Ordering::SeqCst);
    });

    assert_eq!(store.right().a(), WRITES);
}

#[test]
fn test_concurrent_writers_serialize() {
    let store = PairStore::create(None);

    thread::scope(|s| {
        for _ in 0..READERS {
            let store = store.clone();
            s.spawn(move || {
                for _ in 0..100 {
                    let _tx = store.change_transaction().unwrap();
                    let a = store.a();
                    store.set_a(a + 1);
                }
            });
        }
    });

    assert_eq!(store.a(), 100 * READERS as i64);
}

#[test]
fn test_signal_wakes_waiting_thread() {
    let store = PairStore::create(None);
    let signal = store.read_signal();

    thread::scope(|s| {
        let waiter = s.spawn(move || signal.wait_timeout(Duration::from_secs(5)));
        thread::sleep(Duration::from_millis(20));
        store.set_a(1);
        assert!(waiter.join().unwrap());
    });
}

//! Double-checked invoke specs
//!
//! Verify that the conditional invoke fires exactly when the value matches,
//! with no suppression across repeated calls.

use crate::prelude::*;
use rv_core::{CellConfig, StateCell};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

#[test]
fn matching_value_invokes_once_from_another_thread() {
    within(WATCHDOG, || {
        let cell = Arc::new(StateCell::with_value(CellConfig::new("hit"), 1));
        let calls = Arc::new(AtomicUsize::new(0));

        let checker_cell = cell.clone();
        let checker_calls = calls.clone();
        let invoked = thread::spawn(move || {
            checker_cell
                .check_and_invoke(1, |seen| {
                    assert_eq!(seen, 1);
                    checker_calls.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap()
        })
        .join()
        .unwrap();

        assert!(invoked);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    });
}

#[test]
fn non_matching_value_never_invokes() {
    within(WATCHDOG, || {
        let cell = Arc::new(StateCell::with_value(CellConfig::new("miss"), 0));
        let calls = Arc::new(AtomicUsize::new(0));

        let checker_cell = cell.clone();
        let checker_calls = calls.clone();
        let invoked = thread::spawn(move || {
            checker_cell
                .check_and_invoke(1, |_| {
                    checker_calls.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap()
        })
        .join()
        .unwrap();

        assert!(!invoked);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    });
}

#[test]
fn unchanged_value_yields_one_invocation_per_call() {
    let cell = StateCell::with_value(CellConfig::new("idempotent"), 1);
    let calls = AtomicUsize::new(0);

    for round in 1..=10 {
        let invoked = cell
            .check_and_invoke(1, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        assert!(invoked);
        assert_eq!(calls.load(Ordering::SeqCst), round);
    }
}

#[test]
fn invoke_excludes_concurrent_stores() {
    // While on_match runs it holds both locks, so a concurrent store must
    // observe either the pre-invoke or post-invoke world, never the middle.
    within(WATCHDOG, || {
        let cell = Arc::new(StateCell::with_value(CellConfig::new("exclusive"), 1));
        let in_match = Arc::new(AtomicUsize::new(0));
        let stored = Arc::new(AtomicUsize::new(0));

        let checker_in_match = in_match.clone();
        let checker_stored = stored.clone();

        let checker = {
            let cell = cell.clone();
            thread::spawn(move || {
                cell.check_and_invoke(1, |_| {
                    checker_in_match.store(1, Ordering::SeqCst);
                    // Give the storer a chance to run if the locks did not
                    // actually exclude it.
                    thread::sleep(std::time::Duration::from_millis(100));
                    assert_eq!(checker_stored.load(Ordering::SeqCst), 0);
                })
                .unwrap()
            })
        };

        // Wait until on_match is running, then try to store through it.
        while in_match.load(Ordering::SeqCst) == 0 {
            thread::yield_now();
        }
        cell.store_and_notify(0, || {}).unwrap();
        stored.store(1, Ordering::SeqCst);

        assert!(checker.join().unwrap());
        assert_eq!(cell.value().unwrap(), 0);
    });
}

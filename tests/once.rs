use std::cell::Cell;

use task_sync::Once;

#[test]
fn set_on_empty_initializes() {
    let cell = Once::new();
    assert!(cell.set(5).is_ok());
    assert_eq!(cell.get(), Some(&5));
    assert!(cell.is_initialized());
}

#[test]
fn second_set_fails_and_keeps_first_value() {
    let cell = Once::new();
    cell.set(1).unwrap();
    assert_eq!(cell.set(2), Err(2));
    assert_eq!(cell.get(), Some(&1));
}

#[test]
fn try_insert_failure_returns_current_and_passed() {
    let cell = Once::new();
    cell.set(1).unwrap();
    let err = cell.try_insert(2).unwrap_err();
    assert_eq!(*err.0, 1);
    assert_eq!(err.1, 2);
}

#[test]
fn get_or_init_runs_closure_exactly_once() {
    let cell = Once::new();
    let calls = Cell::new(0);
    for _ in 0..5 {
        cell.get_or_init(|| {
            calls.set(calls.get() + 1);
            42
        });
    }
    assert_eq!(calls.get(), 1);
    assert_eq!(cell.get(), Some(&42));
}

#[test]
fn get_or_try_init_err_leaves_cell_empty_and_allows_retry() {
    let cell: Once<i32> = Once::new();
    let result: Result<&i32, &str> = cell.get_or_try_init(|| Err("boom"));
    assert_eq!(result, Err("boom"));
    assert!(!cell.is_initialized());

    let result: Result<&i32, &str> = cell.get_or_try_init(|| Ok(7));
    assert_eq!(result, Ok(&7));
    assert!(cell.is_initialized());
}

#[test]
fn take_resets_the_cell() {
    let mut cell = Once::new();
    cell.set("hello").unwrap();
    assert_eq!(cell.take(), Some("hello"));
    assert!(!cell.is_initialized());
    assert_eq!(cell.get(), None);
    cell.set("world").unwrap();
    assert_eq!(cell.get(), Some(&"world"));
}

#[test]
fn take_on_empty_cell_returns_none() {
    let mut cell: Once<i32> = Once::new();
    assert_eq!(cell.take(), None);
}

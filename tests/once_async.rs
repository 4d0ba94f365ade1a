mod common;

use std::cell::Cell;
use std::rc::Rc;

use task_sync::OnceAsync;

#[test]
fn get_or_init_dedups_concurrent_callers() {
    let cell = Rc::new(OnceAsync::new());
    let calls = Rc::new(Cell::new(0));

    let executor = common::Executor::new();
    let (c1, c2, c3) = (cell.clone(), cell.clone(), cell.clone());
    let (n1, n2, n3) = (calls.clone(), calls.clone(), calls.clone());

    let task_a = executor.spawn(async move {
        *c1.get_or_init(|| async {
            n1.set(n1.get() + 1);
            42
        })
        .await
    });
    let task_b = executor.spawn(async move {
        *c2.get_or_init(|| async {
            n2.set(n2.get() + 1);
            99
        })
        .await
    });
    let task_c = executor.spawn(async move {
        *c3.get_or_init(|| async {
            n3.set(n3.get() + 1);
            77
        })
        .await
    });

    let a = executor.block_on(task_a);
    let b = executor.block_on(task_b);
    let c = executor.block_on(task_c);

    assert_eq!((a, b, c), (42, 42, 42));
    assert_eq!(calls.get(), 1);
}

#[test]
fn get_or_try_init_err_does_not_poison() {
    common::run(async {
        let cell: OnceAsync<i32> = OnceAsync::new();

        let err: Result<&i32, &str> = cell.get_or_try_init(|| async { Err("nope") }).await;
        assert_eq!(err, Err("nope"));
        assert!(!cell.is_initialized());

        let ok: Result<&i32, &str> = cell.get_or_try_init(|| async { Ok(5) }).await;
        assert_eq!(ok, Ok(&5));
        assert!(cell.is_initialized());
    });
}

#[test]
fn wait_resolves_when_filled_by_set() {
    let cell = Rc::new(OnceAsync::new());
    let executor = common::Executor::new();

    let waiter = executor.spawn({
        let cell = cell.clone();
        async move { *cell.wait().await }
    });

    // Nothing has filled the cell yet; waiter stays pending across a queue drain.
    assert_eq!(executor.run_until_stalled(), 1);
    assert!(!cell.is_initialized());

    cell.set(7).unwrap();
    let value = executor.block_on(waiter);
    assert_eq!(value, 7);
}

#[test]
fn take_resets_and_allows_reinitialization() {
    common::run(async {
        let mut cell = OnceAsync::new();
        *cell.get_or_init(|| async { 1 }).await;
        assert_eq!(cell.take(), Some(1));
        assert!(!cell.is_initialized());
        assert_eq!(*cell.get_or_init(|| async { 2 }).await, 2);
    });
}

mod common;

use std::cell::RefCell;
use std::rc::Rc;
use std::task::Poll;

use task_sync::RwLock;

#[test]
fn multiple_readers_share_access_and_count_is_exact() {
    let lock = RwLock::new(10);

    let r1 = match common::poll_once(lock.read()) {
        Poll::Ready(guard) => guard,
        Poll::Pending => panic!("uncontended read should resolve on first poll"),
    };
    assert_eq!(lock.reader_count(), 1);

    let r2 = match common::poll_once(lock.read()) {
        Poll::Ready(guard) => guard,
        Poll::Pending => panic!("second reader should not block on the first"),
    };
    assert_eq!(lock.reader_count(), 2);
    assert_eq!(*r1, 10);
    assert_eq!(*r2, 10);

    drop(r1);
    assert_eq!(lock.reader_count(), 1);
    drop(r2);
    assert_eq!(lock.reader_count(), 0);
}

#[test]
fn writer_excluded_while_any_reader_is_held() {
    let lock = RwLock::new(());
    let _reader = lock.try_read().expect("lock starts unlocked");

    assert!(lock.try_write().is_none());
    assert!(matches!(common::poll_once(lock.write()), Poll::Pending));
}

#[test]
fn reader_excluded_while_writer_is_held() {
    let lock = RwLock::new(());
    let _writer = lock.try_write().expect("lock starts unlocked");

    assert!(lock.try_read().is_none());
    assert!(matches!(common::poll_once(lock.read()), Poll::Pending));
}

/// Hold a reader, queue a writer, then queue a second reader. Releasing the
/// first reader must hand the lock to the waiting writer, not the second
/// reader, even though the second reader arrived after the writer woke the
/// lock's registration point.
#[test]
fn writer_priority_over_a_later_reader() {
    let lock = Rc::new(RwLock::new(0));
    let order = Rc::new(RefCell::new(Vec::new()));
    let executor = common::Executor::new();

    let held = match common::poll_once(lock.read()) {
        Poll::Ready(guard) => guard,
        Poll::Pending => panic!("uncontended read should resolve on first poll"),
    };

    let writer_task = executor.spawn({
        let lock = lock.clone();
        let order = order.clone();
        async move {
            let mut guard = lock.write().await;
            order.borrow_mut().push("writer");
            *guard += 1;
        }
    });
    executor.run_until_stalled();

    let reader_task = executor.spawn({
        let lock = lock.clone();
        let order = order.clone();
        async move {
            let _guard = lock.read().await;
            order.borrow_mut().push("second reader");
        }
    });
    executor.run_until_stalled();

    drop(held);
    executor.block_on(writer_task);
    executor.block_on(reader_task);

    assert_eq!(*order.borrow(), vec!["writer", "second reader"]);
    assert_eq!(*lock.try_read().unwrap(), 1);
}

#[test]
fn with_write_releases_even_when_future_panics() {
    let lock = Rc::new(RwLock::new(0));
    let executor = common::Executor::new();

    let task = executor.spawn({
        let lock = lock.clone();
        async move { lock.with_write(|_| async { panic!("boom") }).await }
    });

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        executor.block_on(task)
    }));
    assert!(result.is_err());
    assert!(!lock.is_write_locked());
    assert_eq!(lock.reader_count(), 0);
}

//! A deterministic, single-threaded executor for driving the futures under test.
//!
//! Adapted from the `vexide-async` executor: a `VecDeque` run queue fed by
//! `async-task`, stepped with `tick`/`run_until_stalled` instead of spinning, so
//! tests can interleave multiple tasks by controlling exactly when each one gets
//! polled next.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

use async_task::{Runnable, Task};
use waker_fn::waker_fn;

pub struct Executor {
    queue: RefCell<VecDeque<Runnable>>,
}

impl Executor {
    pub fn new() -> Self {
        Self {
            queue: RefCell::new(VecDeque::new()),
        }
    }

    /// Spawns a `!Send` future onto this executor. Sound because the executor,
    /// its queue, and every task it runs are only ever touched from this one
    /// thread — nothing here is sent or shared across a thread boundary.
    pub fn spawn<T: 'static>(&self, future: impl Future<Output = T> + 'static) -> Task<T> {
        let (runnable, task) = unsafe {
            async_task::spawn_unchecked(future, |runnable| {
                self.queue.borrow_mut().push_back(runnable);
            })
        };
        runnable.schedule();
        task
    }

    /// Runs every runnable currently in the queue once, in FIFO order. Returns
    /// how many ran. Tasks that wake themselves while running are appended to
    /// the back and are not re-run within this call.
    pub fn run_until_stalled(&self) -> usize {
        let pending: Vec<_> = self.queue.borrow_mut().drain(..).collect();
        let ran = pending.len();
        for runnable in pending {
            runnable.run();
        }
        ran
    }

    /// Drives `task` to completion, running the queue between polls.
    pub fn block_on<R>(&self, mut task: Task<R>) -> R {
        let woken = Arc::new(AtomicBool::new(true));
        let waker = waker_fn({
            let woken = woken.clone();
            move || woken.store(true, Ordering::Relaxed)
        });
        let mut cx = Context::from_waker(&waker);

        loop {
            if woken.swap(false, Ordering::Relaxed) {
                if let Poll::Ready(output) = Pin::new(&mut task).poll(&mut cx) {
                    return output;
                }
            }
            self.run_until_stalled();
        }
    }
}

/// Runs `body` to completion on a fresh single-threaded executor.
pub fn run<R: 'static>(body: impl Future<Output = R> + 'static) -> R {
    let executor = Executor::new();
    let task = executor.spawn(body);
    executor.block_on(task)
}

/// Polls `fut` exactly once against a waker that does nothing when woken.
///
/// For futures that are known to resolve without ever suspending (an
/// uncontended lock acquisition, a non-blocking channel op wrapped in a
/// future), spawning a `Task` just to get the result back out isn't an
/// option: the result can borrow from data the future itself owns, and a
/// `Task`'s output has to be `'static`. Driving the future by hand like this
/// keeps any such borrow tied to the caller's own stack frame instead.
pub fn poll_once<F: Future + Unpin>(mut fut: F) -> Poll<F::Output> {
    let waker = noop_waker();
    let mut cx = Context::from_waker(&waker);
    Pin::new(&mut fut).poll(&mut cx)
}

fn noop_waker() -> Waker {
    fn clone(_: *const ()) -> RawWaker {
        RawWaker::new(std::ptr::null(), &VTABLE)
    }
    fn no_op(_: *const ()) {}
    static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
    unsafe { Waker::from_raw(RawWaker::new(std::ptr::null(), &VTABLE)) }
}

//! [`Mutex`], a cooperative exclusive lock with strict FIFO ordering and
//! ownership-transfer release.
//!
//! A `lock()` future registers on the shared wait queue and resolves into a
//! `MutexGuard` released on `Drop`. Waiters acquire in strict enqueue order, and
//! release hands the lock directly to the head waiter ("ownership transfer")
//! rather than clearing the flag and letting any registered waiter race a fresh
//! acquirer for it.

use std::cell::{Cell, UnsafeCell};
use std::fmt::{self, Debug};
use std::future::Future;
use std::marker::PhantomData;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use crate::waitlist::{Ticket, WaitQueue};

/// A cooperative mutual-exclusion lock protecting a value of type `T`.
pub struct Mutex<T: ?Sized> {
    locked: Cell<bool>,
    wait_queue: WaitQueue<()>,
    _not_send_sync: PhantomData<Rc<()>>,
    data: UnsafeCell<T>,
}

impl<T> Mutex<T> {
    /// Creates a new, unlocked mutex around `value`.
    pub const fn new(value: T) -> Self {
        Self {
            locked: Cell::new(false),
            wait_queue: WaitQueue::new(),
            _not_send_sync: PhantomData,
            data: UnsafeCell::new(value),
        }
    }

    /// Consumes the mutex, returning the inner value.
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> Mutex<T> {
    /// Acquires the lock, waiting in strict FIFO order behind any other pending
    /// lockers.
    pub fn lock(&self) -> Lock<'_, T> {
        Lock {
            mutex: self,
            ticket: None,
        }
    }

    /// Attempts to acquire the lock without waiting. Returns `None` if locked.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        if self.locked.get() {
            None
        } else {
            self.locked.set(true);
            Some(MutexGuard { mutex: self })
        }
    }

    /// Acquires the lock, runs `f` with mutable access to the value, awaits its
    /// result, and releases the lock on every exit path — including when `f`'s
    /// future panics, since the release happens in `MutexGuard::drop`.
    pub async fn with_lock<R, Fut>(&self, f: impl FnOnce(&mut T) -> Fut) -> R
    where
        Fut: Future<Output = R>,
    {
        let mut guard = self.lock().await;
        f(&mut guard).await
    }

    /// Returns `true` while the mutex is held.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked.get()
    }

    /// Gets mutable access to the data without going through the lock protocol.
    /// Sound because `&mut self` already proves exclusive access.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    pub(crate) fn release(&self) {
        if !self.wait_queue.wake_one(|| ()) {
            self.locked.set(false);
        }
        // If a waiter was woken, `locked` is left `true`: ownership transferred
        // directly to it rather than being dropped and re-raced.
    }
}

impl<T: ?Sized + Copy> Mutex<T> {
    /// Returns a copy of the current value, waiting for the lock like any other
    /// operation.
    pub async fn get(&self) -> T {
        *self.lock().await
    }
}

impl<T> Mutex<T> {
    /// Replaces the value, waiting for the lock, without returning the old value.
    pub async fn set(&self, value: T) {
        *self.lock().await = value;
    }

    /// Replaces the value and returns the old one, atomically within one critical
    /// section.
    pub async fn replace(&self, value: T) -> T {
        let mut guard = self.lock().await;
        mem::replace(&mut *guard, value)
    }
}

impl<T> Default for Mutex<T>
where
    T: Default,
{
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> From<T> for Mutex<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: ?Sized + Debug> Debug for Mutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Mutex");
        match self.try_lock() {
            Some(guard) => {
                d.field("data", &&*guard);
            }
            None => {
                d.field("data", &format_args!("<locked>"));
            }
        }
        d.finish_non_exhaustive()
    }
}

impl<T: ?Sized> fmt::Display for Mutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.locked.get() {
            f.write_str("Mutex(<locked>)")
        } else {
            f.write_str("Mutex(<unlocked>)")
        }
    }
}

/// The future returned by [`Mutex::lock`].
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Lock<'a, T: ?Sized> {
    mutex: &'a Mutex<T>,
    ticket: Option<Ticket<()>>,
}

impl<'a, T: ?Sized> Future for Lock<'a, T> {
    type Output = MutexGuard<'a, T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Some(ticket) = &this.ticket {
            return ticket.poll(cx).map(|()| MutexGuard { mutex: this.mutex });
        }
        if !this.mutex.locked.get() {
            this.mutex.locked.set(true);
            return Poll::Ready(MutexGuard { mutex: this.mutex });
        }
        let ticket = this.mutex.wait_queue.register();
        let poll = ticket.poll(cx);
        this.ticket = Some(ticket);
        poll.map(|()| MutexGuard { mutex: this.mutex })
    }
}

/// An RAII guard granting exclusive access to a [`Mutex`]'s value. Unlocks on drop,
/// handing the lock directly to the next waiter if one is queued.
#[must_use = "if unused the Mutex immediately unlocks"]
pub struct MutexGuard<'a, T: ?Sized> {
    mutex: &'a Mutex<T>,
}

impl<'a, T: ?Sized> MutexGuard<'a, T> {
    /// Releases the lock. Equivalent to dropping the guard; spelled out for callers
    /// who want the release to be explicit at the call site.
    pub fn unlock(self) {
        drop(self);
    }
}

impl<T: ?Sized> Deref for MutexGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // SAFETY: holding a `MutexGuard` proves exclusive access to `data`.
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T: ?Sized> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: holding a `MutexGuard` proves exclusive access to `data`.
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<T: ?Sized> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        self.mutex.release();
    }
}

impl<T: ?Sized + Debug> Debug for MutexGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Debug::fmt(&**self, f)
    }
}

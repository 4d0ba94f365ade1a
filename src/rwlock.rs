//! [`RwLock`], a cooperative reader/writer lock with writer priority.
//!
//! Admission and release follow the same fast-path-then-FIFO shape as
//! [`crate::Mutex`], but with two queues instead of one: new readers are blocked
//! whenever a writer holds the lock *or* any writer is already queued (writer
//! priority, to avoid starving writers under a constant stream of readers), and
//! releasing a writer either promotes the next writer or releases an entire burst
//! of queued readers at once.

use std::cell::Cell;
use std::fmt::{self, Debug};
use std::future::Future;
use std::marker::PhantomData;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use crate::waitlist::{Ticket, WaitQueue};

/// A cooperative reader/writer lock protecting a value of type `T`.
pub struct RwLock<T: ?Sized> {
    readers: Cell<usize>,
    writer: Cell<bool>,
    read_wait: WaitQueue<()>,
    write_wait: WaitQueue<()>,
    _not_send_sync: PhantomData<Rc<()>>,
    data: std::cell::UnsafeCell<T>,
}

impl<T> RwLock<T> {
    /// Creates a new, unlocked `RwLock` around `value`.
    pub const fn new(value: T) -> Self {
        Self {
            readers: Cell::new(0),
            writer: Cell::new(false),
            read_wait: WaitQueue::new(),
            write_wait: WaitQueue::new(),
            _not_send_sync: PhantomData,
            data: std::cell::UnsafeCell::new(value),
        }
    }

    /// Consumes the lock, returning the inner value.
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> RwLock<T> {
    fn reader_may_proceed(&self) -> bool {
        !self.writer.get() && self.write_wait.is_empty()
    }

    fn writer_may_proceed(&self) -> bool {
        self.readers.get() == 0 && !self.writer.get()
    }

    /// Acquires a shared read guard, queuing behind any pending writer.
    pub fn read(&self) -> Read<'_, T> {
        Read {
            lock: self,
            ticket: None,
        }
    }

    /// Acquires the exclusive write guard, queuing in strict FIFO order behind
    /// other writers.
    pub fn write(&self) -> Write<'_, T> {
        Write {
            lock: self,
            ticket: None,
        }
    }

    /// Attempts to acquire a read guard without waiting.
    pub fn try_read(&self) -> Option<RwLockReadGuard<'_, T>> {
        if self.reader_may_proceed() {
            self.readers.set(self.readers.get() + 1);
            Some(RwLockReadGuard { lock: self })
        } else {
            None
        }
    }

    /// Attempts to acquire the write guard without waiting.
    pub fn try_write(&self) -> Option<RwLockWriteGuard<'_, T>> {
        if self.writer_may_proceed() {
            self.writer.set(true);
            Some(RwLockWriteGuard { lock: self })
        } else {
            None
        }
    }

    /// Acquires a read guard, runs `f` with a shared view, and awaits its result.
    pub async fn with_read<R, Fut>(&self, f: impl FnOnce(&T) -> Fut) -> R
    where
        Fut: Future<Output = R>,
    {
        let guard = self.read().await;
        f(&guard).await
    }

    /// Acquires the write guard, runs `f` with a mutable view, and awaits its
    /// result.
    pub async fn with_write<R, Fut>(&self, f: impl FnOnce(&mut T) -> Fut) -> R
    where
        Fut: Future<Output = R>,
    {
        let mut guard = self.write().await;
        f(&mut guard).await
    }

    /// Current number of outstanding read guards.
    #[must_use]
    pub fn reader_count(&self) -> usize {
        self.readers.get()
    }

    /// Replaces the value, waiting for the write lock, without returning the
    /// old value.
    pub async fn set(&self, value: T) {
        *self.write().await = value;
    }

    /// Replaces the value and returns the old one, atomically within one
    /// critical section.
    pub async fn replace(&self, value: T) -> T {
        let mut guard = self.write().await;
        mem::replace(&mut *guard, value)
    }

    /// Returns `true` while the write guard is held.
    #[must_use]
    pub fn is_write_locked(&self) -> bool {
        self.writer.get()
    }

    /// Gets mutable access to the data without going through the lock protocol.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    fn release_read(&self) {
        let remaining = self.readers.get() - 1;
        self.readers.set(remaining);
        if remaining == 0 {
            self.promote_writer_if_any();
        }
    }

    fn release_write(&self) {
        self.writer.set(false);
        if !self.promote_writer_if_any() {
            // Each woken reader increments `readers` itself when its `Read` future
            // is next polled and observes the ticket resolved.
            self.read_wait.drain_wake(|| ());
        }
    }

    /// Promotes the head queued writer, if any. Returns whether one was promoted.
    fn promote_writer_if_any(&self) -> bool {
        if self.write_wait.is_empty() {
            return false;
        }
        self.writer.set(true);
        self.write_wait.wake_one(|| ())
    }
}

impl<T: ?Sized + Copy> RwLock<T> {
    /// Returns a copy of the current value, waiting for a read lock like any
    /// other operation.
    pub async fn get(&self) -> T {
        *self.read().await
    }
}

impl<T> Default for RwLock<T>
where
    T: Default,
{
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> From<T> for RwLock<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: ?Sized + Debug> Debug for RwLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("RwLock");
        if let Some(guard) = self.try_read() {
            d.field("data", &&*guard);
        } else {
            d.field("data", &format_args!("<locked>"));
        }
        d.finish_non_exhaustive()
    }
}

impl<T: ?Sized> fmt::Display for RwLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.writer.get() {
            f.write_str("RwLock(<write-locked>)")
        } else {
            let readers = self.readers.get();
            if readers == 0 {
                f.write_str("RwLock(<unlocked>)")
            } else {
                write!(f, "RwLock(<read-locked:{readers}>)")
            }
        }
    }
}

/// The future returned by [`RwLock::read`].
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Read<'a, T: ?Sized> {
    lock: &'a RwLock<T>,
    ticket: Option<Ticket<()>>,
}

impl<'a, T: ?Sized> Future for Read<'a, T> {
    type Output = RwLockReadGuard<'a, T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Some(ticket) = &this.ticket {
            return ticket.poll(cx).map(|()| {
                this.lock.readers.set(this.lock.readers.get() + 1);
                RwLockReadGuard { lock: this.lock }
            });
        }
        if this.lock.reader_may_proceed() {
            this.lock.readers.set(this.lock.readers.get() + 1);
            return Poll::Ready(RwLockReadGuard { lock: this.lock });
        }
        let ticket = this.lock.read_wait.register();
        let poll = ticket.poll(cx);
        this.ticket = Some(ticket);
        poll.map(|()| {
            this.lock.readers.set(this.lock.readers.get() + 1);
            RwLockReadGuard { lock: this.lock }
        })
    }
}

/// The future returned by [`RwLock::write`].
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Write<'a, T: ?Sized> {
    lock: &'a RwLock<T>,
    ticket: Option<Ticket<()>>,
}

impl<'a, T: ?Sized> Future for Write<'a, T> {
    type Output = RwLockWriteGuard<'a, T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Some(ticket) = &this.ticket {
            return ticket.poll(cx).map(|()| RwLockWriteGuard { lock: this.lock });
        }
        if this.ticket.is_none() && this.lock.writer_may_proceed() && this.lock.write_wait.is_empty()
        {
            this.lock.writer.set(true);
            return Poll::Ready(RwLockWriteGuard { lock: this.lock });
        }
        let ticket = this.lock.write_wait.register();
        let poll = ticket.poll(cx);
        this.ticket = Some(ticket);
        poll.map(|()| RwLockWriteGuard { lock: this.lock })
    }
}

/// An RAII guard granting shared read access to an [`RwLock`]'s value.
#[must_use = "if unused the RwLock read guard immediately releases"]
pub struct RwLockReadGuard<'a, T: ?Sized> {
    lock: &'a RwLock<T>,
}

impl<T: ?Sized> Deref for RwLockReadGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // SAFETY: a read guard coexists only with other read guards, never a
        // write guard; no `&mut T` can exist while any `RwLockReadGuard` lives.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for RwLockReadGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.release_read();
    }
}

impl<T: ?Sized + Debug> Debug for RwLockReadGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Debug::fmt(&**self, f)
    }
}

/// An RAII guard granting exclusive write access to an [`RwLock`]'s value.
#[must_use = "if unused the RwLock write guard immediately releases"]
pub struct RwLockWriteGuard<'a, T: ?Sized> {
    lock: &'a RwLock<T>,
}

impl<T: ?Sized> Deref for RwLockWriteGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // SAFETY: holding the write guard proves exclusive access.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> DerefMut for RwLockWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: holding the write guard proves exclusive access.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for RwLockWriteGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.release_write();
    }
}

impl<T: ?Sized + Debug> Debug for RwLockWriteGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Debug::fmt(&**self, f)
    }
}

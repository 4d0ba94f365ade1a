//! [`OnceAsync`], a write-once cell whose initializer is a future, with
//! concurrent-call deduplication and a standalone `wait()` for "any path filled
//! this cell" notification.
//!
//! Unlike [`crate::LazyAsync`], whose initializer is bound once at construction
//! (so every coalesced caller is necessarily awaiting the very same boxed future),
//! `OnceAsync::get_or_init` and `get_or_try_init` each take a *fresh* closure per
//! call. Two concurrent callers can pass closures of different concrete types, so
//! there is no single future value to hand out references to. Instead, a second
//! internal [`Mutex`] — one already built elsewhere in this crate — serializes
//! attempts: a caller acquires the gate, re-checks whether some earlier holder
//! already filled the cell while it waited, and only runs its own closure if the
//! cell is still empty. This produces the same externally observable guarantee
//! (the initializer runs at most once per successful fill) without needing `T:
//! Clone` or type-erased futures.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::mutex::Mutex;
use crate::once::Once;
use crate::waitlist::{Ticket, WaitQueue};

/// A cell that is filled at most once by an async initializer, shared by any
/// number of concurrent callers.
pub struct OnceAsync<T> {
    value: Once<T>,
    gate: Mutex<()>,
    waiters: WaitQueue<()>,
}

impl<T> OnceAsync<T> {
    /// Creates a new, empty cell.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            value: Once::new(),
            gate: Mutex::new(()),
            waiters: WaitQueue::new(),
        }
    }

    /// Returns `true` once the cell holds a value.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.value.is_initialized()
    }

    /// Returns the stored value, if any. Never mutates and never suspends.
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        self.value.get()
    }

    /// Stores `v` if the cell is empty, waking anyone blocked in [`OnceAsync::wait`].
    /// If already initialized, returns `v` back unstored.
    pub fn set(&self, v: T) -> Result<(), T> {
        let result = self.value.set(v);
        if result.is_ok() {
            self.waiters.drain_wake(|| ());
        }
        result
    }

    /// Like [`OnceAsync::set`], but on success returns the stored value, and on
    /// failure returns the pair `(current, passed)`.
    pub fn try_insert(&self, v: T) -> Result<&T, (&T, T)> {
        match self.set(v) {
            Ok(()) => Ok(self.value.get().expect("just inserted")),
            Err(v) => Err((self.value.get().expect("not empty on failure path"), v)),
        }
    }

    /// Runs `f` if the cell is empty and stores its awaited result; concurrent
    /// callers serialize behind an internal gate rather than each invoking `f`.
    /// A caller that waits out the gate while another holder wins re-checks the
    /// cell before considering running its own `f`, so `f` runs at most once per
    /// successful fill regardless of how many callers raced to get here.
    pub async fn get_or_init<Fut>(&self, f: impl FnOnce() -> Fut) -> &T
    where
        Fut: Future<Output = T>,
    {
        if let Some(v) = self.value.get() {
            return v;
        }
        let _gate = self.gate.lock().await;
        if let Some(v) = self.value.get() {
            return v;
        }
        let v = f().await;
        let _ = self.value.set(v);
        self.waiters.drain_wake(|| ());
        self.value.get().expect("just initialized")
    }

    /// As [`OnceAsync::get_or_init`], but `f` may fail. On `Err`, the cell is left
    /// empty and the gate is released, so the very next caller — whether it is
    /// this one retrying or someone else entirely — gets to attempt its own `f`.
    pub async fn get_or_try_init<E, Fut>(&self, f: impl FnOnce() -> Fut) -> Result<&T, E>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(v) = self.value.get() {
            return Ok(v);
        }
        let _gate = self.gate.lock().await;
        if let Some(v) = self.value.get() {
            return Ok(v);
        }
        let v = f().await?;
        let _ = self.value.set(v);
        self.waiters.drain_wake(|| ());
        Ok(self.value.get().expect("just initialized"))
    }

    /// Resolves once the cell is filled by any means at all — `set`, `try_insert`,
    /// `get_or_init`, or a successful `get_or_try_init` — regardless of which
    /// caller drives that fill.
    pub async fn wait(&self) -> &T {
        if let Some(v) = self.value.get() {
            return v;
        }
        let ticket = self.waiters.register();
        Registered(ticket).await;
        self.value.get().expect("woken only after the cell is filled")
    }

    /// Resets the cell to empty, returning the previous value if there was one.
    /// Requires exclusive access, so it can never race a concurrent initializer.
    pub fn take(&mut self) -> Option<T> {
        self.value.take()
    }
}

impl<T> Default for OnceAsync<T> {
    fn default() -> Self {
        Self::new()
    }
}

struct Registered(Ticket<()>);

impl Future for Registered {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.get_mut().0.poll(cx)
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for OnceAsync<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.value.get() {
            Some(v) => write!(f, "OnceAsync({v:?})"),
            None => f.write_str("OnceAsync(<uninitialized>)"),
        }
    }
}

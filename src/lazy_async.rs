//! [`LazyAsync`], deferred initialization with an async initializer and
//! concurrent-call coalescing.
//!
//! `LazyAsync::force` shares its coalescing rule with [`crate::OnceAsync::get_or_init`]:
//! the first caller to actually *poll* its `force()` future becomes the driver and
//! owns the boxed initializer future; any other caller that polls while an attempt
//! is in flight instead registers on a [`crate::waitlist::WaitQueue`] and is woken
//! with a cloned copy of the result once the driver finishes. This requires
//! `T: Clone`: handing the same logical result to more than one owner means
//! actually copying the value, since Rust has no notion of multiple owners sharing
//! one reference to data that outlives the call that produced it without an `Rc` or
//! similar.

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use crate::once::Once;
use crate::waitlist::{Ticket, WaitQueue};

struct Pending<T> {
    fut: Pin<Box<dyn Future<Output = T>>>,
    waiters: WaitQueue<T>,
}

/// A value computed once by an async initializer, on first access.
pub struct LazyAsync<T, F> {
    init: F,
    value: Once<T>,
    state: RefCell<Option<Pending<T>>>,
    _not_send_sync: PhantomData<Rc<()>>,
}

impl<T: Clone, F> LazyAsync<T, F> {
    /// Creates a new, unevaluated lazy value bound to the async initializer `init`.
    pub const fn new(init: F) -> Self {
        Self {
            init,
            value: Once::new(),
            state: RefCell::new(None),
            _not_send_sync: PhantomData,
        }
    }

    /// Returns `true` once [`LazyAsync::force`] has successfully completed at least
    /// once.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.value.is_initialized()
    }

    /// Observes the current value without forcing evaluation. Reports `None` while
    /// an initialization is in flight; there is no separate "in progress" state
    /// exposed.
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        self.value.get()
    }

    /// Forces evaluation, coalescing with any concurrently in-flight attempt. After
    /// the first success, every subsequent `force()` resolves immediately with a
    /// clone of the cached value.
    ///
    /// `Fut`'s output here is `T` directly, not a `Result`, so "rejection" in the
    /// spec's sense can only mean the initializer future panics mid-poll. Resuming a
    /// panicked future is not something this crate attempts to paper over: like
    /// `std::sync::Once`, a panicking attempt leaves the pending slot occupied rather
    /// than silently clearing it, so any other waiters coalesced onto it are dropped
    /// without ever being woken. Callers that need retry-after-error semantics should
    /// reach for [`crate::OnceAsync::get_or_try_init`], whose `Result`-typed
    /// initializer is the documented way to fail without poisoning.
    pub fn force(&self) -> Force<'_, T, F> {
        Force {
            cell: self,
            role: Role::Undecided,
        }
    }
}

enum Role<T> {
    Undecided,
    Driving,
    Waiting(Ticket<T>),
    Done,
}

/// The future returned by [`LazyAsync::force`].
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Force<'a, T: Clone, F> {
    cell: &'a LazyAsync<T, F>,
    role: Role<T>,
}

impl<'a, T: Clone, F, Fut> Future for Force<'a, T, F>
where
    F: Fn() -> Fut,
    Fut: Future<Output = T> + 'static,
{
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let this = self.get_mut();
        loop {
            match &this.role {
                Role::Done => panic!("LazyAsync::force polled again after completion"),
                Role::Undecided => {
                    if let Some(v) = this.cell.value.get() {
                        this.role = Role::Done;
                        return Poll::Ready(v.clone());
                    }
                    let mut state = this.cell.state.borrow_mut();
                    if let Some(pending) = state.as_ref() {
                        let ticket = pending.waiters.register();
                        drop(state);
                        this.role = Role::Waiting(ticket);
                    } else {
                        let fut: Pin<Box<dyn Future<Output = T>>> = Box::pin((this.cell.init)());
                        *state = Some(Pending {
                            fut,
                            waiters: WaitQueue::new(),
                        });
                        drop(state);
                        this.role = Role::Driving;
                    }
                }
                Role::Waiting(ticket) => match ticket.poll(cx) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(v) => {
                        this.role = Role::Done;
                        return Poll::Ready(v);
                    }
                },
                Role::Driving => {
                    let mut state = this.cell.state.borrow_mut();
                    let pending = state
                        .as_mut()
                        .expect("driver role implies a pending attempt exists");
                    match pending.fut.as_mut().poll(cx) {
                        Poll::Pending => return Poll::Pending,
                        Poll::Ready(v) => {
                            let pending = state.take().expect("checked above");
                            drop(state);
                            let _ = this.cell.value.set(v.clone());
                            pending.waiters.drain_wake(|| v.clone());
                            this.role = Role::Done;
                            return Poll::Ready(v);
                        }
                    }
                }
            }
        }
    }
}

impl<T: Debug + Clone, F> Debug for LazyAsync<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value.get() {
            Some(v) => write!(f, "LazyAsync({v:?})"),
            None => f.write_str("LazyAsync(<uninitialized>)"),
        }
    }
}

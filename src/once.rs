//! A write-once cell with synchronous, fallible initializers.
//!
//! The initializer passed to [`Once::get_or_init`] is a plain synchronous `FnOnce`,
//! so there is no suspension point during initialization and nothing to coalesce
//! concurrent callers onto. That coalescing problem belongs to [`crate::OnceAsync`],
//! whose initializer is itself a future.

use std::cell::{Cell, UnsafeCell};
use std::fmt::{self, Debug};
use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::rc::Rc;

/// A slot holding at most one value of type `T`, written at most once.
///
/// `Once` is single-threaded by design: it is `!Send` and `!Sync`.
pub struct Once<T> {
    initialized: Cell<bool>,
    value: UnsafeCell<MaybeUninit<T>>,
    _not_send_sync: PhantomData<Rc<()>>,
}

impl<T> Once<T> {
    /// Creates a new, empty cell.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            initialized: Cell::new(false),
            value: UnsafeCell::new(MaybeUninit::uninit()),
            _not_send_sync: PhantomData,
        }
    }

    /// Returns `true` once the cell holds a value.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.get()
    }

    /// Returns the stored value, if any. Never mutates.
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        if self.initialized.get() {
            // SAFETY: `initialized` is only set after `value` has been written, and
            // the cell is single-owner single-thread, so no concurrent writer exists.
            Some(unsafe { (*self.value.get()).assume_init_ref() })
        } else {
            None
        }
    }

    /// Stores `v` if the cell is empty. If already initialized, returns `v` unstored
    /// in `Err` — the stored value is never overwritten.
    pub fn set(&self, v: T) -> Result<(), T> {
        if self.initialized.get() {
            return Err(v);
        }
        unsafe {
            (*self.value.get()).write(v);
        }
        self.initialized.set(true);
        Ok(())
    }

    /// Like [`Once::set`], but on success returns the stored value, and on failure
    /// returns the pair `(current, passed)`.
    pub fn try_insert(&self, v: T) -> Result<&T, (&T, T)> {
        match self.set(v) {
            Ok(()) => Ok(self.get().expect("just inserted")),
            Err(v) => Err((self.get().expect("not empty on failure path"), v)),
        }
    }

    /// Runs `f` if the cell is empty, stores its result, and returns a reference to
    /// the stored value either way. If `f` panics, the cell remains empty: `f` is
    /// called before anything is written, so a panicking `f` never reaches the store
    /// and the panic propagates through `get_or_init` unchanged.
    pub fn get_or_init(&self, f: impl FnOnce() -> T) -> &T {
        if !self.initialized.get() {
            let v = f();
            let _ = self.set(v);
        }
        self.get().expect("initialized above")
    }

    /// As [`Once::get_or_init`], but `f` may fail. On `Err`, the cell stays empty and
    /// a subsequent call may retry with a different (or the same) `f`.
    pub fn get_or_try_init<E>(&self, f: impl FnOnce() -> Result<T, E>) -> Result<&T, E> {
        if let Some(v) = self.get() {
            return Ok(v);
        }
        let v = f()?;
        let _ = self.set(v);
        Ok(self.get().expect("initialized above"))
    }

    /// Resets the cell to empty, returning the previous value if there was one.
    pub fn take(&mut self) -> Option<T> {
        if self.initialized.get() {
            self.initialized.set(false);
            let old = std::mem::replace(&mut self.value, UnsafeCell::new(MaybeUninit::uninit()));
            Some(unsafe { old.into_inner().assume_init() })
        } else {
            None
        }
    }
}

impl<T> Default for Once<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for Once<T> {
    fn drop(&mut self) {
        if self.initialized.get() {
            unsafe {
                (*self.value.get()).assume_init_drop();
            }
        }
    }
}

impl<T: Debug> Debug for Once<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(v) => write!(f, "Once({v:?})"),
            None => f.write_str("Once(<uninitialized>)"),
        }
    }
}

impl<T: Debug> fmt::Display for Once<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

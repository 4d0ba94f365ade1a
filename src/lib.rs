//! Cooperative concurrency primitives for single-threaded, event-loop-driven
//! async executors.
//!
//! Every type in this crate assumes it is only ever touched from one thread at a
//! time, cooperatively scheduled: operations run to completion except at an
//! explicit `.await`. That assumption is what lets the wait queues, cells, and
//! locks here get away with `Cell`/`RefCell` instead of atomics, and is also why
//! every public type is `!Send + !Sync`. None of this is useful glued onto a
//! multi-threaded executor; it is exactly as useful as `Rc` is next to `Arc`.
//!
//! # Modules
//!
//! - [`Once`] / [`OnceAsync`]: write-once cells, synchronous and async.
//! - [`Lazy`] / [`LazyAsync`]: deferred initialization bound to a closure.
//! - [`Mutex`]: cooperative exclusive lock with FIFO ordering.
//! - [`RwLock`]: cooperative reader/writer lock with writer priority.
//! - [`Channel`]: bounded, unbounded, and rendezvous multi-producer
//!   multi-consumer queue.

#![warn(missing_docs)]

mod channel;
mod error;
mod lazy;
mod lazy_async;
mod mutex;
mod once;
mod once_async;
mod rwlock;
mod waitlist;

pub use channel::{Capacity, Channel, Receive, Receiver, Send, Sender};
pub use error::ChannelCapacityError;
pub use lazy::Lazy;
pub use lazy_async::{Force, LazyAsync};
pub use mutex::{Lock, Mutex, MutexGuard};
pub use once::Once;
pub use once_async::OnceAsync;
pub use rwlock::{Read, RwLock, RwLockReadGuard, RwLockWriteGuard, Write};

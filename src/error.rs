//! Error types for `task-sync`.
//!
//! An invalid channel capacity is the only constructor-time error anywhere in this
//! crate; everything else is a semantic outcome encoded in a return type (`Option`,
//! `Result`, a closed/full flag) rather than an error.

use snafu::Snafu;

/// Returned by [`crate::Channel::bounded`] when asked to construct a channel with
/// a capacity that cannot be honored.
#[derive(Debug, Snafu, PartialEq, Eq, Clone, Copy)]
#[snafu(display("channel capacity {requested} is not a valid bound (must fit in usize)"))]
pub struct ChannelCapacityError {
    /// The capacity that was requested and rejected.
    pub requested: i64,
}

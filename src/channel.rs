//! [`Channel`], a multi-producer multi-consumer queue with bounded, unbounded, and
//! rendezvous (zero-capacity) modes, plus timeout variants of send/receive.
//!
//! Two FIFOs carry the cross-queue handoff: blocked senders waiting for either
//! buffer space or a receiver, and blocked receivers waiting for either a buffered
//! value or a sender. `receive` prefers promoting a queued sender's value into the
//! buffer over leaving it pending, which keeps capacity-bound backpressure moving
//! forward one slot at a time instead of waking every blocked sender at once.
//!
//! Timeout variants race the plain `send`/`receive` future against a
//! [`futures_timer::Delay`] with [`futures_util::future::select`]. Rather than the
//! manual "wrap the resolver so whichever side fires first wins, and remove the
//! loser from its queue" bookkeeping a callback-based host needs, this falls out
//! of ordinary Rust drop semantics: the losing future is simply dropped by
//! `select`, and `Send`/`Receive` deregister their queued ticket (if any) in their
//! own `Drop` impl.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt::{self, Debug};
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use futures_timer::Delay;
use futures_util::future::{select, Either};
use futures_util::stream::Stream;

use crate::error::ChannelCapacityError;
use crate::waitlist::{Ticket, WaitQueue};

/// A channel's bound on buffered values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    /// At most this many values may sit in the buffer at once. Zero means
    /// rendezvous mode: a value only ever moves directly from a sender to a
    /// waiting receiver, never through the buffer.
    Bounded(usize),
    /// No buffer limit; `send` never blocks on capacity.
    Unbounded,
}

struct SendSlot<T> {
    id: u64,
    value: RefCell<Option<T>>,
    result: Cell<Option<bool>>,
    waker: RefCell<Option<Waker>>,
}

/// A FIFO of senders blocked because the buffer is full and no receiver is
/// waiting. Kept separate from [`WaitQueue`] because each entry also carries the
/// value that was being sent.
struct SendQueue<T> {
    next_id: Cell<u64>,
    slots: RefCell<VecDeque<Rc<SendSlot<T>>>>,
}

struct SendTicket<T> {
    slot: Rc<SendSlot<T>>,
}

impl<T> SendQueue<T> {
    fn new() -> Self {
        Self {
            next_id: Cell::new(0),
            slots: RefCell::new(VecDeque::new()),
        }
    }

    fn register(&self, value: T) -> SendTicket<T> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let slot = Rc::new(SendSlot {
            id,
            value: RefCell::new(Some(value)),
            result: Cell::new(None),
            waker: RefCell::new(None),
        });
        self.slots.borrow_mut().push_back(slot.clone());
        SendTicket { slot }
    }

    /// Dequeues the head sender, taking its value and resolving its future with
    /// `true`. `None` if no sender is queued.
    fn take_head(&self) -> Option<T> {
        let slot = self.slots.borrow_mut().pop_front()?;
        let value = slot.value.borrow_mut().take().expect("sender value already taken");
        slot.result.set(Some(true));
        if let Some(waker) = slot.waker.borrow_mut().take() {
            waker.wake();
        }
        Some(value)
    }

    /// Resolves every queued sender with `false`, discarding their values.
    fn close_all(&self) {
        let drained: Vec<_> = self.slots.borrow_mut().drain(..).collect();
        for slot in drained {
            slot.result.set(Some(false));
            if let Some(waker) = slot.waker.borrow_mut().take() {
                waker.wake();
            }
        }
    }

    fn remove(&self, id: u64) -> bool {
        let mut slots = self.slots.borrow_mut();
        match slots.iter().position(|slot| slot.id == id) {
            Some(pos) => {
                slots.remove(pos);
                true
            }
            None => false,
        }
    }
}

impl<T> SendTicket<T> {
    fn id(&self) -> u64 {
        self.slot.id
    }

    fn poll(&self, cx: &mut Context<'_>) -> Poll<bool> {
        match self.slot.result.get() {
            Some(result) => Poll::Ready(result),
            None => {
                *self.slot.waker.borrow_mut() = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

/// A multi-producer multi-consumer channel.
pub struct Channel<T> {
    capacity: Capacity,
    buffer: RefCell<VecDeque<T>>,
    closed: Cell<bool>,
    send_wait: SendQueue<T>,
    receive_wait: WaitQueue<Option<T>>,
    _not_send_sync: PhantomData<Rc<()>>,
}

impl<T> Channel<T> {
    /// Creates a channel that buffers at most `capacity` values. A `capacity` of
    /// `0` is rendezvous mode. Negative or otherwise out-of-range values are
    /// rejected.
    pub fn bounded(capacity: i64) -> Result<Self, ChannelCapacityError> {
        let capacity =
            usize::try_from(capacity).map_err(|_| ChannelCapacityError { requested: capacity })?;
        Ok(Self::with_capacity(Capacity::Bounded(capacity)))
    }

    /// Creates a rendezvous channel: `send` only completes once a receiver is
    /// directly waiting for it.
    #[must_use]
    pub fn rendezvous() -> Self {
        Self::with_capacity(Capacity::Bounded(0))
    }

    /// Creates a channel with no buffer limit. `send` never blocks on capacity.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::with_capacity(Capacity::Unbounded)
    }

    fn with_capacity(capacity: Capacity) -> Self {
        Self {
            capacity,
            buffer: RefCell::new(VecDeque::new()),
            closed: Cell::new(false),
            send_wait: SendQueue::new(),
            receive_wait: WaitQueue::new(),
            _not_send_sync: PhantomData,
        }
    }

    /// A view over this channel exposing only the sending operations.
    #[must_use]
    pub fn sender(&self) -> Sender<'_, T> {
        Sender { channel: self }
    }

    /// A view over this channel exposing only the receiving operations.
    #[must_use]
    pub fn receiver(&self) -> Receiver<'_, T> {
        Receiver {
            channel: self,
            current: None,
        }
    }

    /// Sends `value`, waiting if the channel is full and no receiver is ready.
    /// Resolves to `false` if the channel is, or becomes, closed before delivery.
    pub fn send(&self, value: T) -> Send<'_, T> {
        Send {
            channel: self,
            state: SendState::Start(Some(value)),
        }
    }

    /// Sends `value` without waiting. Returns `false` (dropping `value`) if the
    /// channel is closed or full.
    pub fn try_send(&self, value: T) -> bool {
        self.try_accept(value).unwrap_or(false)
    }

    /// Sends `value`, giving up and returning `false` if `timeout` elapses before
    /// the channel can accept it.
    pub async fn send_timeout(&self, value: T, timeout: Duration) -> bool {
        match select(self.send(value), Delay::new(timeout)).await {
            Either::Left((sent, _)) => sent,
            Either::Right(((), _)) => false,
        }
    }

    /// Receives a value, waiting if none is available. Resolves to `None` once
    /// the channel is closed and drained.
    pub fn receive(&self) -> Receive<'_, T> {
        Receive {
            channel: self,
            state: ReceiveState::Start,
        }
    }

    /// Receives a value without waiting. `None` if nothing is immediately
    /// available.
    pub fn try_receive(&self) -> Option<T> {
        self.try_dequeue()
    }

    /// Receives a value, giving up and returning `None` if `timeout` elapses
    /// first.
    pub async fn receive_timeout(&self, timeout: Duration) -> Option<T> {
        match select(self.receive(), Delay::new(timeout)).await {
            Either::Left((value, _)) => value,
            Either::Right(((), _)) => None,
        }
    }

    /// Closes the channel. Idempotent. Every queued sender resolves to `false`
    /// and every queued receiver resolves to `None`; values already in the
    /// buffer remain available to subsequent `receive` calls.
    pub fn close(&self) {
        if self.closed.replace(true) {
            return;
        }
        self.send_wait.close_all();
        self.receive_wait.drain_wake(|| None);
    }

    /// This channel's capacity.
    #[must_use]
    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    /// Current number of buffered values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.borrow().len()
    }

    /// `true` if nothing is currently buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` if the buffer is at capacity. Always `true` for a rendezvous
    /// channel.
    #[must_use]
    pub fn is_full(&self) -> bool {
        match self.capacity {
            Capacity::Bounded(n) => self.len() >= n,
            Capacity::Unbounded => false,
        }
    }

    /// `true` once [`Channel::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    fn has_room(&self) -> bool {
        match self.capacity {
            Capacity::Bounded(n) => self.buffer.borrow().len() < n,
            Capacity::Unbounded => true,
        }
    }

    /// Tries to deliver `value` synchronously: to a waiting receiver, or into the
    /// buffer if there is room. `Ok` means delivery is settled (`true` if
    /// accepted, `false` if the channel was closed); `Err` hands `value` back
    /// because the caller must queue and wait.
    fn try_accept(&self, value: T) -> Result<bool, T> {
        if self.closed.get() {
            return Ok(false);
        }
        let value = match self.receive_wait.wake_one_with(value, Some) {
            Ok(()) => return Ok(true),
            Err(v) => v,
        };
        if self.has_room() {
            self.buffer.borrow_mut().push_back(value);
            Ok(true)
        } else {
            Err(value)
        }
    }

    /// Tries to take a value synchronously from the buffer or a blocked sender.
    fn try_dequeue(&self) -> Option<T> {
        if let Some(head) = self.buffer.borrow_mut().pop_front() {
            if let Some(v) = self.send_wait.take_head() {
                self.buffer.borrow_mut().push_back(v);
            }
            return Some(head);
        }
        self.send_wait.take_head()
    }
}

impl<T: Debug> Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("closed", &self.closed.get())
            .finish()
    }
}

enum SendState<T> {
    Start(Option<T>),
    Queued(SendTicket<T>),
    Done,
}

/// The future returned by [`Channel::send`].
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Send<'a, T> {
    channel: &'a Channel<T>,
    state: SendState<T>,
}

impl<T> Future for Send<'_, T> {
    type Output = bool;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<bool> {
        let this = self.get_mut();
        loop {
            match &mut this.state {
                SendState::Done => panic!("Channel send future polled after completion"),
                SendState::Queued(ticket) => match ticket.poll(cx) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(result) => {
                        this.state = SendState::Done;
                        return Poll::Ready(result);
                    }
                },
                SendState::Start(slot) => {
                    let value = slot.take().expect("Send::Start polled twice");
                    match this.channel.try_accept(value) {
                        Ok(result) => {
                            this.state = SendState::Done;
                            return Poll::Ready(result);
                        }
                        Err(value) => {
                            let ticket = this.channel.send_wait.register(value);
                            let poll = ticket.poll(cx);
                            this.state = SendState::Queued(ticket);
                            match poll {
                                Poll::Pending => return Poll::Pending,
                                Poll::Ready(result) => {
                                    this.state = SendState::Done;
                                    return Poll::Ready(result);
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

impl<T> Drop for Send<'_, T> {
    fn drop(&mut self) {
        if let SendState::Queued(ticket) = &self.state {
            self.channel.send_wait.remove(ticket.id());
        }
    }
}

enum ReceiveState<T> {
    Start,
    Queued(Ticket<Option<T>>),
    Done,
}

/// The future returned by [`Channel::receive`].
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Receive<'a, T> {
    channel: &'a Channel<T>,
    state: ReceiveState<T>,
}

impl<T> Future for Receive<'_, T> {
    type Output = Option<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let this = self.get_mut();
        loop {
            match &this.state {
                ReceiveState::Done => panic!("Channel receive future polled after completion"),
                ReceiveState::Queued(ticket) => match ticket.poll(cx) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(value) => {
                        this.state = ReceiveState::Done;
                        return Poll::Ready(value);
                    }
                },
                ReceiveState::Start => {
                    if let Some(value) = this.channel.try_dequeue() {
                        this.state = ReceiveState::Done;
                        return Poll::Ready(Some(value));
                    }
                    if this.channel.closed.get() {
                        this.state = ReceiveState::Done;
                        return Poll::Ready(None);
                    }
                    let ticket = this.channel.receive_wait.register();
                    let poll = ticket.poll(cx);
                    this.state = ReceiveState::Queued(ticket);
                    match poll {
                        Poll::Pending => return Poll::Pending,
                        Poll::Ready(value) => {
                            this.state = ReceiveState::Done;
                            return Poll::Ready(value);
                        }
                    }
                }
            }
        }
    }
}

impl<T> Drop for Receive<'_, T> {
    fn drop(&mut self) {
        if let ReceiveState::Queued(ticket) = &self.state {
            self.channel.receive_wait.remove(ticket.id());
        }
    }
}

/// A restricted view over a [`Channel`] exposing only send operations.
#[derive(Clone, Copy)]
pub struct Sender<'a, T> {
    channel: &'a Channel<T>,
}

impl<'a, T> Sender<'a, T> {
    /// See [`Channel::send`].
    pub fn send(&self, value: T) -> Send<'a, T> {
        self.channel.send(value)
    }

    /// See [`Channel::try_send`].
    pub fn try_send(&self, value: T) -> bool {
        self.channel.try_send(value)
    }

    /// See [`Channel::send_timeout`].
    pub async fn send_timeout(&self, value: T, timeout: Duration) -> bool {
        self.channel.send_timeout(value, timeout).await
    }

    /// See [`Channel::capacity`].
    #[must_use]
    pub fn capacity(&self) -> Capacity {
        self.channel.capacity()
    }

    /// See [`Channel::len`].
    #[must_use]
    pub fn len(&self) -> usize {
        self.channel.len()
    }

    /// See [`Channel::is_empty`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    /// See [`Channel::is_full`].
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.channel.is_full()
    }

    /// See [`Channel::is_closed`].
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.channel.is_closed()
    }
}

/// A restricted view over a [`Channel`] exposing only receive operations.
pub struct Receiver<'a, T> {
    channel: &'a Channel<T>,
    current: Option<Receive<'a, T>>,
}

impl<'a, T> Receiver<'a, T> {
    /// See [`Channel::receive`].
    pub fn receive(&self) -> Receive<'a, T> {
        self.channel.receive()
    }

    /// See [`Channel::try_receive`].
    pub fn try_receive(&self) -> Option<T> {
        self.channel.try_receive()
    }

    /// See [`Channel::receive_timeout`].
    pub async fn receive_timeout(&self, timeout: Duration) -> Option<T> {
        self.channel.receive_timeout(timeout).await
    }

    /// See [`Channel::capacity`].
    #[must_use]
    pub fn capacity(&self) -> Capacity {
        self.channel.capacity()
    }

    /// See [`Channel::len`].
    #[must_use]
    pub fn len(&self) -> usize {
        self.channel.len()
    }

    /// See [`Channel::is_empty`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    /// See [`Channel::is_full`].
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.channel.is_full()
    }

    /// See [`Channel::is_closed`].
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.channel.is_closed()
    }
}

impl<'a, T> Stream for Receiver<'a, T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let this = self.get_mut();
        let fut = this.current.get_or_insert_with(|| this.channel.receive());
        match Pin::new(fut).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(value) => {
                this.current = None;
                Poll::Ready(value)
            }
        }
    }
}

impl<T> Channel<T> {
    /// An async iterator over received values, ending once the channel is closed
    /// and drained. Equivalent to `self.receiver()`, which itself implements
    /// [`Stream`].
    #[must_use]
    pub fn iter(&self) -> Receiver<'_, T> {
        self.receiver()
    }
}

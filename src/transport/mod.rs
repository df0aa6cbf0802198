//! Broker transport: the abstract collaborator the bus drives.
//!
//! Framing on the wire, the broker process itself, and reconnection policy
//! are explicitly out of scope for this crate (spec.md §1). This module
//! defines just enough of a contract — [`BrokerTransport`] — for
//! [`crate::bus::BrokerBackedMessageBus`] to be written and tested against,
//! plus an in-memory implementation usable both by this crate's own tests
//! and by embedding applications that want a broker-free bus for unit
//! tests, mirroring the teacher's own `InMemoryMessageBroker` test double.

pub mod error;
pub mod in_memory;

use std::time::Duration;

pub use error::TransportError;

/// A message arriving from the broker, tagged by how it was delivered.
#[derive(Debug, Clone)]
pub enum BrokerEvent {
    /// A point-to-point delivery on a named mailbox.
    MailboxDelivery { queue: String, frame: Vec<Vec<u8>> },
    /// A fan-out delivery on a named topic/stream.
    StreamDelivery { topic: String, frame: Vec<Vec<u8>> },
}

/// The abstract broker collaborator.
///
/// Implementations must be `Send + Sync`: the listener mainloop thread
/// reads from [`BrokerTransport::inbound`] while application threads call
/// [`BrokerTransport::publish_frame`] / [`BrokerTransport::send_frame`]
/// concurrently (spec.md §5: "the broker client handle is used
/// concurrently ... the transport is assumed to support this").
pub trait BrokerTransport: Send + Sync {
    /// This transport's client-name, established at construction.
    fn client_name(&self) -> &str;

    /// Establish the broker connection within `deadline`.
    fn connect(&self, deadline: Duration) -> Result<(), TransportError>;

    /// Fan a frame out to every subscriber of `topic`.
    fn publish_frame(&self, topic: &str, frame: Vec<Vec<u8>>, deadline: Duration) -> Result<(), TransportError>;

    /// Deliver a frame point-to-point to `queue`.
    fn send_frame(&self, queue: &str, frame: Vec<Vec<u8>>, deadline: Duration) -> Result<(), TransportError>;

    /// Declare server-side interest in `topic`'s stream. Re-declaring is
    /// idempotent.
    fn declare_stream(&self, topic: &str) -> Result<(), TransportError>;

    /// Declare this client as the named mailbox `queue`'s consumer.
    fn declare_mailbox(&self, queue: &str) -> Result<(), TransportError>;

    /// Remove server-side interest in `name`. Implementations whose
    /// transport lacks a consumer-removal RPC may treat this as a no-op
    /// (spec.md §9 open question) — the contract only binds local
    /// dispatch, which is the bus's responsibility, not the transport's.
    fn undeclare(&self, name: &str) -> Result<(), TransportError>;

    /// A receiver of inbound broker events, read by the listener mainloop.
    /// Closed (disconnected) when the broker connection is lost.
    fn inbound(&self) -> crossbeam_channel::Receiver<BrokerEvent>;

    /// Tear down the connection. Closes the channel returned by
    /// [`BrokerTransport::inbound`].
    fn close(&self);
}

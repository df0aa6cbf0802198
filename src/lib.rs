//! # messagebus-rt - Broker-Backed Message Bus Abstraction
//!
//! A bus abstraction over a message broker: mailboxes and topics, a
//! synchronous request/reply correlation engine, and a worker pool for
//! listener execution, independent of any one broker product's wire
//! protocol.
//!
//! # Quick Start
//!
//! ```rust
//! use messagebus_rt::{listener, new_bus_with_defaults, Message};
//! use messagebus_rt::transport::in_memory::InMemoryBroker;
//! use std::sync::{Arc, Mutex};
//! use std::time::Duration;
//!
//! let hub = InMemoryBroker::new();
//! let publisher = new_bus_with_defaults(hub.client("publisher"));
//! let subscriber = new_bus_with_defaults(hub.client("subscriber"));
//! publisher.connect().unwrap();
//! subscriber.connect().unwrap();
//!
//! let received = Arc::new(Mutex::new(None));
//! let received2 = Arc::clone(&received);
//! subscriber
//!     .subscribe("weather.updates", listener(move |m| *received2.lock().unwrap() = Some(m)))
//!     .unwrap();
//!
//! std::thread::sleep(Duration::from_millis(20));
//! publisher.publish("weather.updates", Message::builder().data("sunny").build()).unwrap();
//! std::thread::sleep(Duration::from_millis(100));
//!
//! assert_eq!(received.lock().unwrap().as_ref().unwrap().user_data, vec!["sunny"]);
//! ```
//!
//! # Core Features
//!
//! ## Transport-Agnostic
//! - [`transport::BrokerTransport`] abstracts the broker collaborator:
//!   framing on the wire, the broker process itself, and reconnection
//!   policy are the transport implementation's concern, not this crate's.
//! - [`transport::in_memory::InMemoryBrokerTransport`] ships as both this
//!   crate's own test double and an embeddable broker-free bus for
//!   application unit tests.
//!
//! ## Synchronous Request/Reply
//! - [`bus::MessageBus::request`] blocks the caller on a single-slot
//!   rendezvous until a reply with a matching `correlation-id` arrives or
//!   the deadline passes.
//! - Concurrent `request` calls on one instance are serialized, since the
//!   rendezvous has exactly one slot.
//!
//! ## Listener Isolation
//! - Each bus instance drives one dedicated listener thread; a panicking
//!   listener is caught at the dispatch boundary and logged, never
//!   unwinding into the mainloop.
//! - An optional [`pool::PoolWorker`] offloads listener execution to a
//!   fixed thread pool when an application needs to free the mainloop
//!   thread for throughput.
//!
//! # Module Organization
//!
//! ## Core
//! - [`message`] - the [`message::Message`] envelope and its wire codec
//! - [`bus`] - the [`bus::MessageBus`] contract, its broker-backed
//!   implementation, and the sync-request rendezvous
//! - [`transport`] - the [`transport::BrokerTransport`] abstraction and the
//!   in-memory test double
//! - [`dispatcher`] - a generic key-to-callable routing table
//! - [`pool`] - the fixed-size worker pool with offload/queue/schedule
//!   submission primitives
//!
//! ## Infrastructure
//! - [`config`] - [`config::BusConfig`] defaults and builder
//! - [`error`] - [`error::BusError`], the single error type every public
//!   operation returns
//! - [`ids`] - correlation-id and client-name generation
//! - [`facade`] - the typed [`facade::BusHandle`] façade
//!
//! # Architecture Principles
//!
//! ## Per-Instance State Only
//! - No module-scope singletons anywhere in the crate: every
//!   [`bus::BrokerBackedMessageBus`] owns its transport handle,
//!   subscription table, rendezvous cell, and listener thread join handle.
//!
//! ## Errors Are Values
//! - Every fallible public operation returns `Result<_, BusError>`; no
//!   panics cross a public API boundary outside of `#[cfg(test)]` code.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod bus;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod facade;
pub mod ids;
pub mod message;
pub mod pool;
pub mod transport;

pub use bus::{listener, new_bus, new_bus_with_defaults, BrokerBackedMessageBus, Listener, MessageBus};
pub use config::BusConfig;
pub use dispatcher::Dispatcher;
pub use error::BusError;
pub use facade::BusHandle;
pub use message::{Message, MessageBuilder, MetaData, UserData};
pub use pool::{JobHandle, PoolError, PoolWorker, SharedFuture, SharedFutureSetter};
pub use transport::{BrokerEvent, BrokerTransport, TransportError};

//! The message bus: public contract, the broker-backed implementation, the
//! sync-request rendezvous, and construction helpers (spec.md §4.2).

mod broker_backed;
mod contract;
mod factory;
mod rendezvous;

pub use broker_backed::BrokerBackedMessageBus;
pub use contract::{listener, Listener, MessageBus};
pub use factory::{new_bus, new_bus_with_defaults};
pub use rendezvous::Rendezvous;

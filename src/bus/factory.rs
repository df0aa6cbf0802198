//! Construction helpers for [`BrokerBackedMessageBus`] (spec.md §9
//! "Polymorphism over transports": callers pick an implementation by
//! transport, not by subclassing the bus).

use std::sync::Arc;

use crate::config::BusConfig;
use crate::transport::BrokerTransport;

use super::broker_backed::BrokerBackedMessageBus;
use super::contract::MessageBus;

/// Build a [`MessageBus`] over `transport`, not yet connected. Callers must
/// call [`MessageBus::connect`] before using it.
pub fn new_bus<T: BrokerTransport + 'static>(transport: T, config: BusConfig) -> Arc<dyn MessageBus> {
    Arc::new(BrokerBackedMessageBus::new(transport, config))
}

/// As [`new_bus`], using [`BusConfig::default`].
pub fn new_bus_with_defaults<T: BrokerTransport + 'static>(transport: T) -> Arc<dyn MessageBus> {
    new_bus(transport, BusConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::in_memory::InMemoryBroker;

    #[test]
    fn factory_produces_a_connectable_dyn_bus() {
        let hub = InMemoryBroker::new();
        let bus = new_bus_with_defaults(hub.client("factory-test"));
        bus.connect().unwrap();
        assert_eq!(bus.client_name(), "factory-test");
    }
}

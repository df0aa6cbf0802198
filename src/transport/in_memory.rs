//! An in-memory [`BrokerTransport`] backed by `dashmap`/`crossbeam-channel`.
//!
//! Grounded on the teacher's `broker/registry.rs` (a `DashMap`-backed,
//! lock-free routing table) generalized from actor addresses to plain
//! topic/queue name strings, and on `broker/in_memory.rs` for the overall
//! shape of an in-process broker double. Multiple clients share one
//! [`InMemoryBroker`] hub, modelling independent processes talking to the
//! same broker.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use super::{BrokerEvent, BrokerTransport, TransportError};

/// Shared routing state for an in-memory broker: the "server side".
///
/// Construct one `InMemoryBroker` per simulated broker process, then mint a
/// [`InMemoryBrokerTransport`] per simulated client via
/// [`InMemoryBroker::client`].
#[derive(Default)]
pub struct InMemoryBroker {
    streams: DashMap<String, DashMap<String, crossbeam_channel::Sender<BrokerEvent>>>,
    mailboxes: DashMap<String, (String, crossbeam_channel::Sender<BrokerEvent>)>,
}

impl InMemoryBroker {
    /// A fresh broker hub with no routes declared.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Mint a client transport bound to this hub.
    pub fn client(self: &Arc<Self>, client_name: impl Into<String>) -> InMemoryBrokerTransport {
        let (tx, rx) = crossbeam_channel::unbounded();
        InMemoryBrokerTransport {
            hub: Arc::clone(self),
            client_name: client_name.into(),
            tx,
            rx,
        }
    }
}

/// A single simulated client's handle onto an [`InMemoryBroker`].
pub struct InMemoryBrokerTransport {
    hub: Arc<InMemoryBroker>,
    client_name: String,
    tx: crossbeam_channel::Sender<BrokerEvent>,
    rx: crossbeam_channel::Receiver<BrokerEvent>,
}

impl BrokerTransport for InMemoryBrokerTransport {
    fn client_name(&self) -> &str {
        &self.client_name
    }

    fn connect(&self, _deadline: Duration) -> Result<(), TransportError> {
        // A local hub is always reachable immediately.
        Ok(())
    }

    fn publish_frame(&self, topic: &str, frame: Vec<Vec<u8>>, _deadline: Duration) -> Result<(), TransportError> {
        if let Some(subscribers) = self.hub.streams.get(topic) {
            for entry in subscribers.iter() {
                // Fan-out: unroutable/lagging subscribers are the
                // subscriber's problem, not the publisher's (matches
                // typical broker publish-confirm semantics).
                let _ = entry.value().send(BrokerEvent::StreamDelivery {
                    topic: topic.to_string(),
                    frame: frame.clone(),
                });
            }
        }
        Ok(())
    }

    fn send_frame(&self, queue: &str, frame: Vec<Vec<u8>>, deadline: Duration) -> Result<(), TransportError> {
        match self.hub.mailboxes.get(queue) {
            Some(consumer) => consumer
                .value()
                .1
                .send(BrokerEvent::MailboxDelivery {
                    queue: queue.to_string(),
                    frame,
                })
                .map_err(|_| TransportError::SendTimeout {
                    destination: queue.to_string(),
                    deadline,
                }),
            None => {
                // No declared consumer: the broker accepts the frame and
                // drops it, same as publishing to a topic with nobody
                // listening.
                Ok(())
            }
        }
    }

    fn declare_stream(&self, topic: &str) -> Result<(), TransportError> {
        self.hub
            .streams
            .entry(topic.to_string())
            .or_default()
            .insert(self.client_name.clone(), self.tx.clone());
        Ok(())
    }

    fn declare_mailbox(&self, queue: &str) -> Result<(), TransportError> {
        self.hub
            .mailboxes
            .insert(queue.to_string(), (self.client_name.clone(), self.tx.clone()));
        Ok(())
    }

    fn undeclare(&self, name: &str) -> Result<(), TransportError> {
        if let Some(subscribers) = self.hub.streams.get(name) {
            subscribers.remove(&self.client_name);
        }
        if let Some(entry) = self.hub.mailboxes.get(name) {
            if entry.0 == self.client_name {
                drop(entry);
                self.hub.mailboxes.remove(name);
            }
        }
        Ok(())
    }

    fn inbound(&self) -> crossbeam_channel::Receiver<BrokerEvent> {
        self.rx.clone()
    }

    fn close(&self) {
        // Dropping the local `rx` clone handed to the mainloop (owned
        // elsewhere) is what actually disconnects; this only detaches our
        // routing entries so no further frames are fanned our way.
        self.hub.streams.retain(|_, subs| {
            subs.remove(&self.client_name);
            !subs.is_empty()
        });
        self.hub.mailboxes.retain(|_, (owner, _)| owner != &self.client_name);
    }
}

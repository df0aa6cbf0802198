//! The broker-backed [`MessageBus`] implementation: the listener mainloop,
//! the subscription table, and the sync-request rendezvous (spec.md §4.2,
//! the hard part — C7).

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::BusConfig;
use crate::dispatcher::Dispatcher;
use crate::error::BusError;
use crate::message::{codec, Message};
use crate::pool::PoolWorker;
use crate::transport::{BrokerEvent, BrokerTransport, TransportError};

use super::contract::{Listener, MessageBus};
use super::rendezvous::Rendezvous;

/// Control-pipe sentinel that terminates the listener mainloop.
pub const TERM: &str = "$TERM";

/// Bus instance lifecycle (spec.md §4.2 "State machine").
///
/// Shared via `Arc` between the owning instance and its listener mainloop
/// thread: the mainloop writes back through this cell when the broker
/// connection is lost out from under it, so `ensure_connected` reflects
/// reality without the instance polling the thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BusState {
    Fresh,
    Connected,
    Destroyed,
}

struct ListenerThread {
    control_tx: crossbeam_channel::Sender<String>,
    handle: JoinHandle<()>,
}

/// Which kind of name last claimed a subscription-table entry.
///
/// Topics and mailboxes share one name space (spec.md §9 open question);
/// tracking the claimant's kind lets a same-kind re-registration follow
/// spec.md §8's per-operation rule (`subscribe;subscribe` overwrites,
/// `receive;receive` fails) while a cross-kind collision fails
/// symmetrically regardless of which kind registered first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubscriptionKind {
    Topic,
    Mailbox,
}

#[derive(Default)]
struct Subscriptions {
    kinds: HashMap<String, SubscriptionKind>,
    dispatch: Dispatcher<String, Message, ()>,
}

/// Broker-backed [`MessageBus`] implementation.
///
/// Owns the broker connection (via `T: BrokerTransport`), the subscription
/// table, the listener mainloop, and the sync-request rendezvous. No
/// module-scope state is used anywhere (spec.md §9): every field below is
/// per-instance.
pub struct BrokerBackedMessageBus<T: BrokerTransport + 'static> {
    transport: Arc<T>,
    config: BusConfig,
    subscriptions: Arc<Mutex<Subscriptions>>,
    publish_topic: Mutex<Option<String>>,
    rendezvous: Arc<Rendezvous>,
    pool: Option<Arc<PoolWorker>>,
    listener_thread: Mutex<Option<ListenerThread>>,
    state: Arc<Mutex<BusState>>,
}

impl<T: BrokerTransport + 'static> BrokerBackedMessageBus<T> {
    /// Build a bus instance over `transport`, not yet connected.
    pub fn new(transport: T, config: BusConfig) -> Self {
        let pool = if config.pool_size > 0 {
            Some(Arc::new(PoolWorker::new(config.pool_size)))
        } else {
            None
        };
        Self {
            transport: Arc::new(transport),
            config,
            subscriptions: Arc::new(Mutex::new(Subscriptions::default())),
            publish_topic: Mutex::new(None),
            rendezvous: Arc::new(Rendezvous::new()),
            pool,
            listener_thread: Mutex::new(None),
            state: Arc::new(Mutex::new(BusState::Fresh)),
        }
    }

    fn ensure_connected(&self) -> Result<(), BusError> {
        if *self.state.lock() == BusState::Connected {
            Ok(())
        } else {
            Err(BusError::NotConnected)
        }
    }

    fn stamp_from(&self, message: &mut Message) {
        message.set_from(self.transport.client_name().to_string());
    }

    fn map_transport_err(&self, destination: &str, err: TransportError) -> BusError {
        BusError::Send {
            destination: destination.to_string(),
            source: err,
        }
    }

    fn teardown_listener(&self) {
        let mut guard = self.listener_thread.lock();
        if let Some(listener) = guard.take() {
            // Best-effort: the mainloop may already have exited on a
            // broker disconnect, in which case the send is a no-op.
            let _ = listener.control_tx.send(TERM.to_string());
            let _ = listener.handle.join();
        }
    }
}

impl<T: BrokerTransport + 'static> Drop for BrokerBackedMessageBus<T> {
    fn drop(&mut self) {
        self.teardown_listener();
        *self.state.lock() = BusState::Destroyed;
        self.transport.close();
    }
}

impl<T: BrokerTransport + 'static> MessageBus for BrokerBackedMessageBus<T> {
    fn client_name(&self) -> &str {
        self.transport.client_name()
    }

    fn connect(&self) -> Result<(), BusError> {
        // Connection reset (spec.md §4.2): tear down any existing listener
        // before reconnecting. The subscription table is preserved.
        self.teardown_listener();

        // Reset first: if the transport connect below fails, the instance
        // must not be left reporting `Connected` with no listener running.
        *self.state.lock() = BusState::Fresh;

        self.transport
            .connect(self.config.connect_deadline)
            .map_err(|e| match e {
                TransportError::ConnectTimeout(d) => BusError::ConnectTimeout(d),
                other => self.map_transport_err("<broker>", other),
            })?;

        let (control_tx, control_rx) = crossbeam_channel::unbounded();
        let transport = Arc::clone(&self.transport);
        let subscriptions = Arc::clone(&self.subscriptions);
        let rendezvous = Arc::clone(&self.rendezvous);
        let pool = self.pool.clone();
        let state = Arc::clone(&self.state);
        let poll_interval = self.config.poll_interval;

        // Thread creation failure is treated as an unrecoverable environment
        // fault, same as `std::thread::spawn` itself.
        #[allow(clippy::expect_used)]
        let handle = std::thread::Builder::new()
            .name(format!("bus-listener-{}", self.transport.client_name()))
            .spawn(move || mainloop(transport, control_rx, subscriptions, rendezvous, pool, state, poll_interval))
            .expect("failed to spawn listener mainloop thread");

        *self.listener_thread.lock() = Some(ListenerThread { control_tx, handle });
        *self.state.lock() = BusState::Connected;
        Ok(())
    }

    fn publish(&self, topic: &str, mut message: Message) -> Result<(), BusError> {
        self.ensure_connected()?;

        {
            let mut latch = self.publish_topic.lock();
            match latch.as_ref() {
                None => *latch = Some(topic.to_string()),
                Some(latched) if latched == topic => {}
                Some(latched) => {
                    return Err(BusError::ProducerMismatch {
                        latched: latched.clone(),
                        attempted: topic.to_string(),
                    })
                }
            }
        }

        self.stamp_from(&mut message);
        let frame = codec::encode(&message)?;
        self.transport
            .publish_frame(topic, frame, self.config.send_deadline)
            .map_err(|e| self.map_transport_err(topic, e))
    }

    fn subscribe(&self, topic: &str, listener: Listener) -> Result<(), BusError> {
        self.ensure_connected()?;
        self.transport
            .declare_stream(topic)
            .map_err(|e| self.map_transport_err(topic, e))?;
        // At most one listener per name. Re-subscribing a topic replaces the
        // listener (spec.md §8); claiming a name already held by a mailbox
        // fails symmetrically with the `receive`-side collision below.
        let mut subs = self.subscriptions.lock();
        if subs.kinds.get(topic) == Some(&SubscriptionKind::Mailbox) {
            return Err(BusError::AlreadySubscribed(topic.to_string()));
        }
        subs.kinds.insert(topic.to_string(), SubscriptionKind::Topic);
        subs.dispatch.insert(topic.to_string(), listener);
        Ok(())
    }

    fn unsubscribe(&self, name: &str) -> Result<(), BusError> {
        let mut subs = self.subscriptions.lock();
        subs.kinds.remove(name);
        let removed = subs.dispatch.remove(name);
        drop(subs);
        if removed.is_none() {
            return Err(BusError::NoSuchSubscription(name.to_string()));
        }
        // Local dispatch removal only (spec.md §9 open question): server-side
        // consumer removal is best-effort.
        let _ = self.transport.undeclare(name);
        Ok(())
    }

    fn receive(&self, queue: &str, listener: Listener) -> Result<(), BusError> {
        self.ensure_connected()?;
        // Any existing claimant (mailbox or topic) fails a `receive`: a
        // repeat `receive` fails per spec.md §8, and a cross-kind collision
        // fails symmetrically with the `subscribe` side above. Checked and
        // claimed under one lock acquisition so two concurrent `receive`
        // calls on the same name can't both win.
        if self.subscriptions.lock().kinds.contains_key(queue) {
            return Err(BusError::AlreadySubscribed(queue.to_string()));
        }
        self.transport
            .declare_mailbox(queue)
            .map_err(|e| self.map_transport_err(queue, e))?;
        let mut subs = self.subscriptions.lock();
        if subs.kinds.contains_key(queue) {
            return Err(BusError::AlreadySubscribed(queue.to_string()));
        }
        subs.kinds.insert(queue.to_string(), SubscriptionKind::Mailbox);
        subs.dispatch.insert(queue.to_string(), listener);
        Ok(())
    }

    fn send_request(&self, queue: &str, mut message: Message) -> Result<(), BusError> {
        self.ensure_connected()?;
        self.stamp_from(&mut message);
        warn_on_missing_request_metadata(&message);

        let recipient = message.to().map(str::to_string).unwrap_or_else(|| queue.to_string());
        let frame = codec::encode(&message)?;
        self.transport
            .send_frame(&recipient, frame, self.config.send_deadline)
            .map_err(|e| self.map_transport_err(&recipient, e))
    }

    fn send_request_with_listener(
        &self,
        queue: &str,
        message: Message,
        listener: Listener,
    ) -> Result<(), BusError> {
        self.ensure_connected()?;
        let reply_to = message
            .reply_to()
            .ok_or(BusError::MissingMetadata("reply-to"))?
            .to_string();
        self.transport
            .declare_mailbox(&reply_to)
            .map_err(|e| self.map_transport_err(&reply_to, e))?;
        {
            let mut subs = self.subscriptions.lock();
            subs.kinds.insert(reply_to.clone(), SubscriptionKind::Mailbox);
            subs.dispatch.insert(reply_to, listener);
        }
        self.send_request(queue, message)
    }

    fn send_reply(&self, _queue: &str, mut message: Message) -> Result<(), BusError> {
        self.ensure_connected()?;
        if message.correlation_id().is_none() {
            return Err(BusError::MissingMetadata("correlation-id"));
        }
        let recipient = message.to().ok_or(BusError::MissingMetadata("to"))?.to_string();
        self.stamp_from(&mut message);
        let frame = codec::encode(&message)?;
        self.transport
            .send_frame(&recipient, frame, self.config.send_deadline)
            .map_err(|e| self.map_transport_err(&recipient, e))
    }

    fn request(&self, _queue: &str, mut message: Message, timeout: Duration) -> Result<Message, BusError> {
        self.ensure_connected()?;
        let correlation_id = message
            .correlation_id()
            .ok_or(BusError::MissingMetadata("correlation-id"))?
            .to_string();
        let recipient = message.to().ok_or(BusError::MissingMetadata("to"))?.to_string();

        // Sync-request correlation is strictly FIFO-per-instance (spec.md
        // §5): serialize via the instance's rendezvous lock rather than
        // leave the single-slot rendezvous racy (spec.md §9 open question).
        let _guard = self.rendezvous.lock_for_request();

        self.stamp_from(&mut message);
        message.set_reply_to(self.transport.client_name().to_string());
        message.set("timeout", format!("{}", timeout.as_secs_f64()));

        self.rendezvous.arm(correlation_id);
        let frame = match codec::encode(&message) {
            Ok(frame) => frame,
            Err(e) => {
                self.rendezvous.disarm();
                return Err(e.into());
            }
        };

        if let Err(e) = self.transport.send_frame(&recipient, frame, self.config.send_deadline) {
            self.rendezvous.disarm();
            return Err(self.map_transport_err(&recipient, e));
        }

        match self.rendezvous.wait(timeout) {
            Some(reply) => Ok(reply),
            None => Err(BusError::Timeout(timeout)),
        }
    }
}

fn warn_on_missing_request_metadata(message: &Message) {
    for (key, present) in [
        ("correlation-id", message.correlation_id().is_some()),
        ("reply-to", message.reply_to().is_some()),
        ("to", message.to().is_some()),
    ] {
        if !present {
            tracing::warn!(key, "sendRequest missing recommended metadata");
        }
    }
}

/// The listener mainloop: a single-threaded event demultiplexer over two
/// sources — a control pipe and the broker's inbound pipe (spec.md §4.2).
fn mainloop(
    transport: Arc<dyn BrokerTransport>,
    control_rx: crossbeam_channel::Receiver<String>,
    subscriptions: Arc<Mutex<Subscriptions>>,
    rendezvous: Arc<Rendezvous>,
    pool: Option<Arc<PoolWorker>>,
    state: Arc<Mutex<BusState>>,
    poll_interval: Duration,
) {
    let inbound = transport.inbound();

    loop {
        let mut select = crossbeam_channel::Select::new();
        let control_idx = select.recv(&control_rx);
        let broker_idx = select.recv(&inbound);

        match select.ready_timeout(poll_interval) {
            Err(_) => continue, // bounded poll expired; loop and re-check
            Ok(idx) if idx == control_idx => match control_rx.try_recv() {
                Ok(frame) if frame == TERM => break,
                Ok(other) => tracing::warn!(control_frame = %other, "ignoring unknown control frame"),
                Err(_) => {} // spurious wake
            },
            Ok(idx) if idx == broker_idx => match inbound.try_recv() {
                Ok(event) => dispatch_event(event, &subscriptions, &rendezvous, pool.as_deref()),
                Err(crossbeam_channel::TryRecvError::Disconnected) => {
                    tracing::error!("broker inbound pipe closed; terminating listener mainloop");
                    // The broker connection is gone out from under this
                    // bus instance; reflect that so `ensure_connected`
                    // stops passing (spec.md §4.2: broker disconnect
                    // terminates the mainloop, the bus is then NotConnected).
                    *state.lock() = BusState::Fresh;
                    break;
                }
                Err(crossbeam_channel::TryRecvError::Empty) => {}
            },
            Ok(_) => unreachable!("select only registered two sources"),
        }
    }
}

fn dispatch_event(
    event: BrokerEvent,
    subscriptions: &Mutex<Subscriptions>,
    rendezvous: &Rendezvous,
    pool: Option<&PoolWorker>,
) {
    let (name, frame, is_mailbox) = match event {
        BrokerEvent::MailboxDelivery { queue, frame } => (queue, frame, true),
        BrokerEvent::StreamDelivery { topic, frame } => (topic, frame, false),
    };

    let message = match codec::decode(&frame) {
        Ok(message) => message,
        Err(err) => {
            tracing::warn!(name, error = %err, "decode failure, skipping frame");
            return;
        }
    };

    if is_mailbox && rendezvous.try_fulfill(&message) {
        return;
    }

    let listener = subscriptions.lock().dispatch.get(&name);
    let Some(listener) = listener else { return };

    match pool {
        Some(pool) => {
            let name = name.clone();
            pool.offload(move || invoke_listener(&name, &listener, message));
        }
        None => invoke_listener(&name, &listener, message),
    }
}

/// Invoke `listener`, catching panics so a misbehaving handler can never
/// take down the mainloop (or a pool worker) (spec.md §4.2, §7).
fn invoke_listener(name: &str, listener: &Listener, message: Message) {
    let result = std::panic::catch_unwind(AssertUnwindSafe(|| listener(message)));
    if result.is_err() {
        tracing::error!(name, "listener panicked; it remains registered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::contract::listener;
    use crate::message::Message;
    use crate::transport::in_memory::InMemoryBroker;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex as StdMutex;

    fn bus(hub: &Arc<InMemoryBroker>, name: &str) -> BrokerBackedMessageBus<crate::transport::in_memory::InMemoryBrokerTransport> {
        BrokerBackedMessageBus::new(hub.client(name), BusConfig::default())
    }

    #[test]
    fn publish_subscribe_delivers_metadata_and_payload() {
        let hub = InMemoryBroker::new();
        let publisher = bus(&hub, "publisher");
        let subscriber = bus(&hub, "subscriber");
        publisher.connect().unwrap();
        subscriber.connect().unwrap();

        let received = Arc::new(StdMutex::new(None));
        let received2 = Arc::clone(&received);
        subscriber
            .subscribe(
                "T",
                listener(move |m| {
                    *received2.lock().unwrap() = Some(m);
                }),
            )
            .unwrap();

        std::thread::sleep(Duration::from_millis(50));

        let mut msg = Message::new();
        msg.set("subject", "discovery");
        msg.set("mykey", "myvalue");
        msg.user_data.push("arg1".into());
        publisher.publish("T", msg).unwrap();

        std::thread::sleep(Duration::from_millis(250));
        let got = received.lock().unwrap().clone().expect("listener should have fired");
        assert_eq!(got.subject(), Some("discovery"));
        assert_eq!(got.metadata.get("mykey").map(String::as_str), Some("myvalue"));
        assert_eq!(got.user_data, vec!["arg1"]);
        assert_eq!(got.from(), Some("publisher"));
    }

    #[test]
    fn single_producer_per_instance() {
        let hub = InMemoryBroker::new();
        let bus = bus(&hub, "p");
        bus.connect().unwrap();
        bus.publish("X", Message::new()).unwrap();
        let err = bus.publish("Y", Message::new()).unwrap_err();
        assert!(matches!(err, BusError::ProducerMismatch { .. }));
    }

    #[test]
    fn at_most_one_listener_per_mailbox_name() {
        let hub = InMemoryBroker::new();
        let bus = bus(&hub, "b");
        bus.connect().unwrap();
        bus.receive("q", listener(|_| {})).unwrap();
        let err = bus.receive("q", listener(|_| {})).unwrap_err();
        assert!(matches!(err, BusError::AlreadySubscribed(_)));
    }

    #[test]
    fn resubscribing_a_topic_replaces_the_listener() {
        let hub = InMemoryBroker::new();
        let publisher = bus(&hub, "pub");
        let subscriber = bus(&hub, "sub");
        publisher.connect().unwrap();
        subscriber.connect().unwrap();

        let a_fired = Arc::new(AtomicU32::new(0));
        let b_fired = Arc::new(AtomicU32::new(0));
        let a2 = Arc::clone(&a_fired);
        let b2 = Arc::clone(&b_fired);
        subscriber.subscribe("T", listener(move |_| { a2.fetch_add(1, Ordering::SeqCst); })).unwrap();
        subscriber.subscribe("T", listener(move |_| { b2.fetch_add(1, Ordering::SeqCst); })).unwrap();

        std::thread::sleep(Duration::from_millis(50));
        publisher.publish("T", Message::new()).unwrap();
        std::thread::sleep(Duration::from_millis(250));

        assert_eq!(a_fired.load(Ordering::SeqCst), 0);
        assert_eq!(b_fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_panic_does_not_prevent_later_deliveries() {
        let hub = InMemoryBroker::new();
        let publisher = bus(&hub, "pub");
        let subscriber = bus(&hub, "sub");
        publisher.connect().unwrap();
        subscriber.connect().unwrap();

        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = Arc::clone(&calls);
        subscriber
            .subscribe(
                "T",
                listener(move |m| {
                    calls2.fetch_add(1, Ordering::SeqCst);
                    if m.user_data.first().map(String::as_str) == Some("boom") {
                        panic!("listener exploded");
                    }
                }),
            )
            .unwrap();

        std::thread::sleep(Duration::from_millis(50));
        publisher
            .publish("T", Message::builder().data("boom").build())
            .unwrap();
        std::thread::sleep(Duration::from_millis(150));
        publisher
            .publish("T", Message::builder().data("ok").build())
            .unwrap();
        std::thread::sleep(Duration::from_millis(150));

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn ping_pong_request_reply() {
        let hub = InMemoryBroker::new();
        let server = bus(&hub, "ping-server");
        let client = bus(&hub, "ping-client");
        server.connect().unwrap();
        client.connect().unwrap();

        // The replier uses its own transport handle onto the same hub,
        // standing in for the bus instance a real server would route the
        // reply through.
        let replier_transport = hub.client("ping-server-replier");
        server
            .receive(
                "ping.q",
                listener(move |request| {
                    let Some(correlation_id) = request.correlation_id() else { return };
                    let Some(reply_to) = request.reply_to() else { return };
                    let mut reply = Message::new();
                    reply.set_correlation_id(correlation_id.to_string());
                    reply.set_to(reply_to.to_string());
                    reply.set_from("ping-server");
                    match request.subject() {
                        Some("PING") => reply.user_data.push("PONG".into()),
                        Some("PING-KO") => {
                            reply.set_error();
                        }
                        _ => return,
                    };
                    let frame = codec::encode(&reply).unwrap();
                    let _ = replier_transport.send_frame(reply_to, frame, Duration::from_secs(1));
                }),
            )
            .unwrap();

        std::thread::sleep(Duration::from_millis(50));

        let mut request = Message::new();
        request.set_correlation_id("c1");
        request.set_to("ping-server");
        request.set("subject", "PING");

        let reply = client.request("ping.q", request, Duration::from_secs(2)).unwrap();
        assert!(!reply.is_on_error());
        assert_eq!(reply.user_data, vec!["PONG"]);
    }

    #[test]
    fn ping_failure_propagates_status_ko() {
        let hub = InMemoryBroker::new();
        let server = bus(&hub, "ping-server");
        let client = bus(&hub, "ping-client");
        server.connect().unwrap();
        client.connect().unwrap();

        let replier_transport = hub.client("ping-server-replier");
        server
            .receive(
                "ping.q",
                listener(move |request| {
                    let Some(correlation_id) = request.correlation_id() else { return };
                    let Some(reply_to) = request.reply_to() else { return };
                    let mut reply = Message::new();
                    reply.set_correlation_id(correlation_id.to_string());
                    reply.set_to(reply_to.to_string());
                    reply.set_from("ping-server");
                    reply.set_error();
                    let frame = codec::encode(&reply).unwrap();
                    let _ = replier_transport.send_frame(reply_to, frame, Duration::from_secs(1));
                }),
            )
            .unwrap();

        std::thread::sleep(Duration::from_millis(50));

        let mut request = Message::new();
        request.set_correlation_id("c2");
        request.set_to("ping-server");
        request.set("subject", "PING-KO");

        let reply = client.request("ping.q", request, Duration::from_secs(2)).unwrap();
        assert!(reply.is_on_error());
    }

    #[test]
    fn request_times_out_when_nobody_replies() {
        let hub = InMemoryBroker::new();
        let server = bus(&hub, "silent-server");
        let client = bus(&hub, "ping-client-2");
        server.connect().unwrap();
        client.connect().unwrap();
        server.receive("silent.q", listener(|_| {})).unwrap();

        std::thread::sleep(Duration::from_millis(50));

        let mut request = Message::new();
        request.set_correlation_id("c3");
        request.set_to("silent-server");

        let err = client
            .request("silent.q", request, Duration::from_millis(150))
            .unwrap_err();
        assert!(matches!(err, BusError::Timeout(_)));
    }

    #[test]
    fn request_requires_correlation_id_and_to() {
        let hub = InMemoryBroker::new();
        let client = bus(&hub, "client");
        client.connect().unwrap();

        let err = client
            .request("q", Message::new(), Duration::from_millis(50))
            .unwrap_err();
        assert!(matches!(err, BusError::MissingMetadata("correlation-id")));

        let mut with_cid = Message::new();
        with_cid.set_correlation_id("c1");
        let err = client.request("q", with_cid, Duration::from_millis(50)).unwrap_err();
        assert!(matches!(err, BusError::MissingMetadata("to")));
    }
}

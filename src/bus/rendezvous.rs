//! The synchronous-request rendezvous (spec.md §3, §9).
//!
//! A single-slot cell guarded by a mutex and condition variable, holding
//! the awaited correlation-id and the response once delivered. Modelled
//! exactly as spec.md §9 prescribes: "Model as a mutex-guarded
//! `{ awaited: Option<String>, slot: Option<Message> }` with a condition
//! variable; do not expose a raw pointer."
//!
//! spec.md §9 leaves "a second concurrent sync request" as an open
//! question and recommends serializing via the instance mutex; this is
//! resolved here with [`Rendezvous::lock_for_request`], an additional mutex
//! callers must hold for the full duration of a `request` call (see
//! DESIGN.md).

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::message::Message;

struct State {
    awaited: Option<String>,
    slot: Option<Message>,
}

/// The single-slot, condvar-guarded rendezvous cell.
pub struct Rendezvous {
    state: Mutex<State>,
    ready: Condvar,
    request_lock: Mutex<()>,
}

impl Default for Rendezvous {
    fn default() -> Self {
        Self {
            state: Mutex::new(State {
                awaited: None,
                slot: None,
            }),
            ready: Condvar::new(),
            request_lock: Mutex::new(()),
        }
    }
}

impl Rendezvous {
    /// A fresh, idle rendezvous.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize concurrent [`crate::bus::MessageBus::request`] calls: only
    /// one caller may hold the single rendezvous slot at a time.
    pub fn lock_for_request(&self) -> MutexGuard<'_, ()> {
        self.request_lock.lock()
    }

    /// Arm the rendezvous to await `correlation_id`, clearing any stale
    /// response.
    pub fn arm(&self, correlation_id: String) {
        let mut state = self.state.lock();
        state.awaited = Some(correlation_id);
        state.slot = None;
    }

    /// Disarm without waiting (used when the send itself fails before a
    /// reply could ever arrive).
    pub fn disarm(&self) {
        let mut state = self.state.lock();
        state.awaited = None;
        state.slot = None;
    }

    /// Block for up to `timeout` for the armed correlation-id's reply.
    /// Clears the awaited id on both match and timeout.
    pub fn wait(&self, timeout: Duration) -> Option<Message> {
        let mut state = self.state.lock();
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(message) = state.slot.take() {
                state.awaited = None;
                return Some(message);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                state.awaited = None;
                return None;
            }
            self.ready.wait_for(&mut state, remaining);
            // Loop back regardless of whether this wait_for call itself
            // timed out or was woken spuriously: the slot/deadline checks
            // above are authoritative either way.
        }
    }

    /// Called from the listener mainloop on every mailbox delivery. If the
    /// rendezvous is armed and `message`'s correlation-id matches, stores
    /// the message, disarms, and wakes the waiter. Returns `true` iff it
    /// matched (callers must not additionally dispatch to a listener in
    /// that case).
    pub fn try_fulfill(&self, message: &Message) -> bool {
        let mut state = self.state.lock();
        let matched = match (&state.awaited, message.correlation_id()) {
            (Some(awaited), Some(cid)) => awaited == cid,
            _ => false,
        };
        if matched {
            state.slot = Some(message.clone());
            state.awaited = None;
            drop(state);
            self.ready.notify_one();
        }
        matched
    }
}

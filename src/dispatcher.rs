//! Static key→callable dispatch (spec.md §4.3).
//!
//! Replaces the string-keyed `if`/`else` chains the original broker client
//! used to route by subject or command tag: register handlers once, then
//! call through a single lookup.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use crate::error::BusError;

/// A key→callable map with an optional default handler.
///
/// `K` is the dispatch key (e.g. a subject string or command tag), `A` is
/// the argument tuple/type forwarded to handlers, `R` is the return type.
///
/// Handlers are stored as `Arc`, not `Box`: callers that need to invoke a
/// handler outside the lock guarding the dispatcher (the bus's listener
/// mainloop, for panic isolation and pool offload) can clone one out via
/// [`Dispatcher::get`] instead of calling through [`Dispatcher::dispatch`].
pub struct Dispatcher<K, A, R> {
    handlers: HashMap<K, Arc<dyn Fn(A) -> R + Send + Sync>>,
    default: Option<Arc<dyn Fn(K, A) -> R + Send + Sync>>,
}

impl<K, A, R> Default for Dispatcher<K, A, R>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
            default: None,
        }
    }
}

impl<K, A, R> Dispatcher<K, A, R>
where
    K: Eq + Hash + Clone,
{
    /// An empty dispatcher with no handlers and no default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) an already-shared handler for `key`. The
    /// idiomatic way to register a [`crate::bus::Listener`]-shaped handler
    /// without re-wrapping it.
    pub fn insert(&mut self, key: K, handler: Arc<dyn Fn(A) -> R + Send + Sync>) -> &mut Self {
        self.handlers.insert(key, handler);
        self
    }

    /// Register (or replace) the handler for `key`.
    pub fn register(&mut self, key: K, handler: impl Fn(A) -> R + Send + Sync + 'static) -> &mut Self {
        self.insert(key, Arc::new(handler))
    }

    /// Set the handler invoked on a dispatch miss. Receives the missed key
    /// alongside the arguments.
    pub fn set_default(&mut self, handler: impl Fn(K, A) -> R + Send + Sync + 'static) -> &mut Self {
        self.default = Some(Arc::new(handler));
        self
    }

    /// The set of currently registered keys.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.handlers.keys()
    }

    /// `true` if `key` currently has a registered handler.
    pub fn contains_key(&self, key: &K) -> bool {
        self.handlers.contains_key(key)
    }

    /// Clone out the handler registered for `key`, if any, without
    /// invoking it. Lets a caller release the dispatcher's lock before
    /// calling through.
    pub fn get(&self, key: &K) -> Option<Arc<dyn Fn(A) -> R + Send + Sync>> {
        self.handlers.get(key).cloned()
    }

    /// Remove and return the handler registered for `key`, if any.
    pub fn remove(&mut self, key: &K) -> Option<Arc<dyn Fn(A) -> R + Send + Sync>> {
        self.handlers.remove(key)
    }

    /// Look up `key` and invoke its handler with `args`, falling back to the
    /// default handler (or failing with [`BusError::NoHandler`]) on a miss.
    pub fn dispatch(&self, key: K, args: A) -> Result<R, BusError>
    where
        K: std::fmt::Debug,
    {
        if let Some(handler) = self.handlers.get(&key) {
            return Ok(handler(args));
        }
        if let Some(default) = &self.default {
            return Ok(default(key, args));
        }
        Err(BusError::NoHandler(format!("{key:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_to_registered_handler() {
        let mut d: Dispatcher<&str, (i32, i32), i32> = Dispatcher::new();
        d.register("+", |(a, b)| a + b);
        d.register("-", |(a, b)| a - b);
        d.register("*", |(a, b)| a * b);
        d.register("/", |(a, b)| a / b);

        assert_eq!(d.dispatch("+", (2, 3)).unwrap(), 5);
        assert_eq!(d.dispatch("*", (2, 3)).unwrap(), 6);
    }

    #[test]
    fn miss_with_no_default_fails() {
        let d: Dispatcher<&str, (i32, i32), i32> = Dispatcher::new();
        let err = d.dispatch("A", (2, 3)).unwrap_err();
        assert!(matches!(err, BusError::NoHandler(_)));
    }

    #[test]
    fn miss_with_default_forwards_key() {
        let mut d: Dispatcher<&str, (i32, i32), String> = Dispatcher::new();
        d.set_default(|k, (a, b)| format!("unknown {k} ({a},{b})"));
        assert_eq!(d.dispatch("A", (2, 3)).unwrap(), "unknown A (2,3)");
    }

    #[test]
    fn re_registering_a_key_replaces_the_handler() {
        let mut d: Dispatcher<&str, (), i32> = Dispatcher::new();
        d.register("k", |_| 1);
        d.register("k", |_| 2);
        assert_eq!(d.dispatch("k", ()).unwrap(), 2);
    }

    #[test]
    fn get_clones_a_handler_for_use_outside_the_lock() {
        let mut d: Dispatcher<&str, i32, i32> = Dispatcher::new();
        assert!(!d.contains_key(&"double"));
        d.register("double", |n| n * 2);
        assert!(d.contains_key(&"double"));

        let handler = d.get(&"double").expect("handler registered above");
        assert_eq!(handler(21), 42);

        let removed = d.remove(&"double").expect("still registered");
        assert_eq!(removed(2), 4);
        assert!(!d.contains_key(&"double"));
    }
}

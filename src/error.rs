//! Error taxonomy for the message bus.
//!
//! One [`BusError`] enum covers every public operation. Each variant carries
//! the context a caller needs to decide whether to retry, matching
//! spec.md §7's taxonomy table.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
use crate::message::codec::CodecError;
use crate::pool::PoolError;

/// Errors returned by [`crate::bus::MessageBus`] operations.
#[derive(Debug, Error)]
pub enum BusError {
    /// Operation invoked before `connect`, or after the broker connection
    /// was lost.
    #[error("bus is not connected")]
    NotConnected,

    /// `receive` was called on a queue that already has a listener.
    #[error("queue already has a listener: {0}")]
    AlreadySubscribed(String),

    /// A required reserved metadata key was absent or empty.
    #[error("missing required metadata key: {0}")]
    MissingMetadata(&'static str),

    /// `publish` was called with a second topic on an instance that has
    /// already latched a publish topic.
    #[error("instance already publishes on topic {latched:?}, cannot publish on {attempted:?}")]
    ProducerMismatch {
        /// The topic latched by the first publish.
        latched: String,
        /// The topic this call attempted to publish on.
        attempted: String,
    },

    /// Message envelope failed to encode or decode against the wire frame
    /// format (spec.md §7 distinguishes `Encode`/`Decode`; both are carried
    /// by the same underlying [`CodecError`]).
    #[error("codec failure: {0}")]
    Codec(#[from] CodecError),

    /// Broker refused the frame (send timeout or transport error).
    #[error("send failed to {destination}: {source}")]
    Send {
        /// The queue or topic the frame was addressed to.
        destination: String,
        /// The underlying transport error.
        #[source]
        source: crate::transport::TransportError,
    },

    /// A synchronous `request` waited past its deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Dispatcher lookup missed and no default handler was configured.
    #[error("no handler registered for key: {0}")]
    NoHandler(String),

    /// `unsubscribe` was called on an unknown name.
    #[error("no subscription for name: {0}")]
    NoSuchSubscription(String),

    /// Connecting to the broker did not complete within the connect
    /// deadline.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// Pool-worker error surfaced through bus-level scheduling helpers.
    #[error("pool error: {0}")]
    Pool(#[from] PoolError),
}

impl BusError {
    /// True if the error reflects a decode failure on an inbound frame.
    ///
    /// Decode failures are logged and the frame is skipped by the mainloop
    /// rather than surfaced to any caller (spec.md §7), but the variant is
    /// kept distinguishable for callers that build their own diagnostics.
    pub fn is_decode(&self) -> bool {
        matches!(self, BusError::Codec(CodecError::Decode(_)))
    }
}

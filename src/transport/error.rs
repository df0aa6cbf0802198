//! Transport-level errors.

use std::time::Duration;

use thiserror::Error;

/// Failures surfaced by a [`super::BrokerTransport`] implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The broker could not be reached within the connect deadline.
    #[error("connect to broker failed within {0:?}")]
    ConnectTimeout(Duration),

    /// A send did not complete before its deadline.
    #[error("send to {destination} timed out after {deadline:?}")]
    SendTimeout {
        /// Destination queue or topic.
        destination: String,
        /// The deadline that was exceeded.
        deadline: Duration,
    },

    /// The broker connection is closed.
    #[error("broker connection is closed")]
    Closed,
}

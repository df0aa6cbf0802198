//! Message envelope: a metadata map plus an ordered payload sequence.
//!
//! [`Message`] is the only payload shape the core understands (spec.md §3).
//! It carries no application-level typing — typed payloads are marshalled
//! in and out by the application using an agreed encoding over [`UserData`].

pub mod codec;
mod reserved;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub use reserved::{CORRELATION_ID, FROM, REPLY_TO, STATUS, STATUS_KO, STATUS_OK, SUBJECT, TIMEOUT, TO};

/// An unordered mapping from metadata key to value.
///
/// Iteration order is not observable (spec.md §3); callers must not depend
/// on it.
pub type MetaData = HashMap<String, String>;

/// An ordered, possibly empty sequence of opaque payload strings.
pub type UserData = Vec<String>;

/// In-memory message envelope: metadata map + ordered payload sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Reserved and application metadata.
    pub metadata: MetaData,
    /// Ordered application payload.
    pub user_data: UserData,
}

impl Message {
    /// An empty message: no metadata, no payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start building a message fluently.
    pub fn builder() -> MessageBuilder {
        MessageBuilder::default()
    }

    /// `true` iff `status == "ko"` (spec.md §3: absence means `ok`).
    pub fn is_on_error(&self) -> bool {
        self.metadata
            .get(STATUS)
            .map(|s| s == STATUS_KO)
            .unwrap_or(false)
    }

    /// The `correlation-id` metadata value, if present and non-empty.
    pub fn correlation_id(&self) -> Option<&str> {
        non_empty(self.metadata.get(CORRELATION_ID))
    }

    /// The `reply-to` metadata value, if present and non-empty.
    pub fn reply_to(&self) -> Option<&str> {
        non_empty(self.metadata.get(REPLY_TO))
    }

    /// The `to` metadata value, if present and non-empty.
    pub fn to(&self) -> Option<&str> {
        non_empty(self.metadata.get(TO))
    }

    /// The `from` metadata value, if present and non-empty.
    pub fn from(&self) -> Option<&str> {
        non_empty(self.metadata.get(FROM))
    }

    /// The `subject` metadata value, if present and non-empty.
    pub fn subject(&self) -> Option<&str> {
        non_empty(self.metadata.get(SUBJECT))
    }

    /// The `timeout` metadata value parsed as decimal seconds.
    pub fn timeout_seconds(&self) -> Option<f64> {
        self.metadata.get(TIMEOUT).and_then(|v| v.parse().ok())
    }

    /// Set a reserved or application metadata key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Set `correlation-id`.
    pub fn set_correlation_id(&mut self, value: impl Into<String>) -> &mut Self {
        self.set(CORRELATION_ID, value)
    }

    /// Set `reply-to`.
    pub fn set_reply_to(&mut self, value: impl Into<String>) -> &mut Self {
        self.set(REPLY_TO, value)
    }

    /// Set `to`.
    pub fn set_to(&mut self, value: impl Into<String>) -> &mut Self {
        self.set(TO, value)
    }

    /// Set `from`.
    pub fn set_from(&mut self, value: impl Into<String>) -> &mut Self {
        self.set(FROM, value)
    }

    /// Set `status = ko`.
    pub fn set_error(&mut self) -> &mut Self {
        self.set(STATUS, STATUS_KO)
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.is_empty())
}

/// Fluent constructor for [`Message`].
#[derive(Debug, Default)]
pub struct MessageBuilder {
    metadata: MetaData,
    user_data: UserData,
}

impl MessageBuilder {
    /// Set a metadata key.
    pub fn meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Append one payload element.
    pub fn data(mut self, value: impl Into<String>) -> Self {
        self.user_data.push(value.into());
        self
    }

    /// Set the full payload sequence, replacing any previously appended
    /// elements.
    pub fn user_data(mut self, data: impl Into<UserData>) -> Self {
        self.user_data = data.into();
        self
    }

    /// Finish building.
    pub fn build(self) -> Message {
        Message {
            metadata: self.metadata,
            user_data: self.user_data,
        }
    }
}

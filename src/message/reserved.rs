//! Reserved metadata keys (spec.md §3).

/// Mailbox where a correlated reply must arrive.
pub const REPLY_TO: &str = "reply-to";
/// Opaque token identifying a request/reply pair.
pub const CORRELATION_ID: &str = "correlation-id";
/// Recipient's client-name.
pub const TO: &str = "to";
/// Sender's client-name.
pub const FROM: &str = "from";
/// Application-level message kind.
pub const SUBJECT: &str = "subject";
/// `ok` | `ko`; absence means `ok`.
pub const STATUS: &str = "status";
/// `status` value meaning success.
pub const STATUS_OK: &str = "ok";
/// `status` value meaning failure.
pub const STATUS_KO: &str = "ko";
/// Decimal seconds the requester will wait.
pub const TIMEOUT: &str = "timeout";

//! Correlation ids and client-name generation.
//!
//! Correlation ids are canonical UUID v4 strings. Client names are a
//! caller-supplied prefix plus a short, best-effort-unique suffix, matching
//! the naming scheme the original broker client used so that log lines and
//! wire traces stay familiar across a migration.

// Layer 1: Standard library imports
use std::time::{SystemTime, UNIX_EPOCH};

// Layer 2: Third-party crate imports
use rand::Rng;
use uuid::Uuid;

/// Generate a new correlation id.
///
/// Canonical 36-character UUID v4 string, e.g.
/// `"5f2a9c1e-3b7a-4e2a-9a1d-6f6b2c3d4e5f"`.
pub fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a client-name suffix: 8 lowercase hex digits from a system
/// entropy source.
///
/// Falls back to a millisecond timestamp suffix if the caller prefers a
/// monotonic, entropy-free identifier (see [`client_name_from_timestamp`]).
pub fn random_suffix() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 4] = rng.gen();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Build a client-name as `prefix-suffix`, suffix drawn from entropy.
///
/// Uniqueness is best-effort within a broker, matching spec.md §4.1: a
/// collision is possible in principle but astronomically unlikely for any
/// reasonable number of live clients.
pub fn client_name(prefix: &str) -> String {
    format!("{prefix}-{}", random_suffix())
}

/// Build a client-name as `prefix-suffix`, suffix drawn from the current
/// millisecond timestamp instead of entropy.
///
/// Two clients started in the same millisecond under the same prefix will
/// collide; callers that need stronger guarantees should use
/// [`client_name`] instead.
pub fn client_name_from_timestamp(prefix: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    format!("{prefix}-{millis:x}")
}

//! # Generate
//!
//! Generate identifiers for exchange records, threads, and messages.

use uuid::Uuid;

/// Generates a random identifier for an exchange record.
#[must_use]
pub fn exchange_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generates a random thread identifier. Every message in one negotiation
/// carries this value.
#[must_use]
pub fn thread_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generates a random `@id` for an outbound message.
#[must_use]
pub fn message_id() -> String {
    Uuid::new_v4().to_string()
}

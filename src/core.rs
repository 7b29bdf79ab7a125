//! # Core Utilities
//!
//! Identifier generation and payload encoding shared by the message model and
//! the exchange state machine.

pub mod generate;

use base64ct::{Base64, Encoding};

use crate::Result;
use crate::invalid;

/// Encode raw bytes as standard (padded) base64, the encoding used for
/// attachment payloads on the wire.
#[must_use]
pub fn encode(bytes: &[u8]) -> String {
    Base64::encode_string(bytes)
}

/// Decode a standard base64 attachment payload into a UTF-8 string.
///
/// # Errors
///
/// Returns an `InvalidMessage` error when the payload is not valid base64 or
/// does not decode to UTF-8.
pub fn decode(encoded: &str) -> Result<String> {
    let bytes =
        Base64::decode_vec(encoded).map_err(|e| invalid!("attachment is not base64: {e}"))?;
    String::from_utf8(bytes).map_err(|e| invalid!("attachment is not UTF-8: {e}"))
}

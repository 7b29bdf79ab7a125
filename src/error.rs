//! # Exchange Errors
//!
//! This module defines the errors surfaced by the credential-exchange engine.
//! None of them are retried by the engine: each is returned to the immediate
//! caller (a handler or the command façade).

use thiserror::Error;

use crate::exchange::{ProtocolVersion, Role, State};

/// Credential-exchange error codes.
#[derive(Error, Debug)]
pub enum Error {
    /// The operation was attempted while the exchange was outside the state(s)
    /// the operation requires.
    #[error("exchange {exchange_id} is in state {current}, expected one of {expected:?}")]
    InvalidState {
        /// The exchange record the operation targeted.
        exchange_id: String,
        /// The state the record was in.
        current: State,
        /// The state(s) the operation accepts.
        expected: Vec<State>,
    },

    /// The operation belongs to the other party's side of the protocol.
    #[error("exchange {exchange_id} has role {current}, expected {expected}")]
    InvalidRole {
        /// The exchange record the operation targeted.
        exchange_id: String,
        /// The role recorded on the exchange.
        current: Role,
        /// The role the operation requires.
        expected: Role,
    },

    /// The exchange record and the requested operation disagree on the
    /// protocol version.
    #[error("exchange {exchange_id} uses protocol {current}, expected {expected}")]
    ProtocolVersionMismatch {
        /// The exchange record the operation targeted.
        exchange_id: String,
        /// The version recorded on the exchange.
        current: ProtocolVersion,
        /// The version of the service that was invoked.
        expected: ProtocolVersion,
    },

    /// A message is missing the attachment the operation depends on.
    #[error("attachment missing: {0}")]
    AttachmentMissing(String),

    /// A 2.0 message does not advertise the expected attachment identifier in
    /// its `formats` list.
    #[error("format missing: {0}")]
    FormatMissing(String),

    /// A required lookup found nothing.
    #[error("not found: {0}")]
    NotFound(String),

    /// The inbound message type is not one the engine can route.
    #[error("unroutable message: {0}")]
    UnroutableMessage(String),

    /// The message is malformed or arrived without the context needed to
    /// process it.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// A collaborator (store, ledger, crypto, transport) failed. The source is
    /// passed through unchanged.
    #[error(transparent)]
    External(#[from] anyhow::Error),
}

impl Error {
    /// Returns `true` when the error reports a precondition (state, role, or
    /// version) violation rather than bad input or a collaborator failure.
    #[must_use]
    pub const fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::InvalidState { .. }
                | Self::InvalidRole { .. }
                | Self::ProtocolVersionMismatch { .. }
        )
    }
}

/// Construct an `Error::InvalidMessage` error from a format string.
#[macro_export]
macro_rules! invalid {
    ($($arg:tt)+) => {
        $crate::Error::InvalidMessage(format!($($arg)+))
    };
}

/// Construct an `Error::NotFound` error from a format string.
#[macro_export]
macro_rules! not_found {
    ($($arg:tt)+) => {
        $crate::Error::NotFound(format!($($arg)+))
    };
}

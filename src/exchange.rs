//! # Exchange Record
//!
//! An `Exchange` is the aggregate root of one credential negotiation. It is
//! persisted between protocol steps so that each step can verify the previous
//! one, and it is only ever mutated by the credential service.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::generate;
use crate::message::PreviewAttribute;
use crate::{Error, Result};

/// Exchange is used to persist the state of one credential negotiation
/// between protocol steps.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Exchange {
    /// Unique identifier, generated when the record is created.
    pub id: String,

    /// The connection to the other party. Offers created before a connection
    /// exists carry a placeholder until the request binds the real one.
    pub connection_id: String,

    /// Correlates every message of this negotiation. Never changes.
    pub thread_id: String,

    /// Link to a prior out-of-band interaction, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_thread_id: Option<String>,

    /// Current lifecycle state.
    pub state: State,

    /// Which side of the negotiation this record tracks. Never changes.
    pub role: Role,

    /// Protocol family the negotiation runs on. Never changes.
    pub protocol_version: ProtocolVersion,

    /// Per-record override of the process-wide auto-accept default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_accept: Option<AutoAccept>,

    /// Claims of the credential, in preview order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub credential_attributes: Vec<PreviewAttribute>,

    /// Credential definition the credential is issued against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_definition_id: Option<String>,

    /// Opaque context produced while building the request and required to
    /// process the issued credential.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_metadata: Option<String>,

    /// Bindings to externally stored credentials.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub credentials: Vec<CredentialBinding>,

    /// Reason the exchange was declined.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Time the record was created.
    pub created_at: DateTime<Utc>,

    /// Time the record last changed state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Exchange {
    /// Create a new exchange record with a generated id.
    #[must_use]
    pub fn new(
        role: Role, protocol_version: ProtocolVersion, state: State, thread_id: impl Into<String>,
        connection_id: impl Into<String>,
    ) -> Self {
        Self {
            id: generate::exchange_id(),
            connection_id: connection_id.into(),
            thread_id: thread_id.into(),
            parent_thread_id: None,
            state,
            role,
            protocol_version,
            auto_accept: None,
            credential_attributes: vec![],
            credential_definition_id: None,
            request_metadata: None,
            credentials: vec![],
            error_message: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    /// Fails with `ProtocolVersionMismatch` unless the record runs on
    /// `expected`.
    ///
    /// # Errors
    ///
    /// Returns an error when the versions differ.
    pub fn assert_version(&self, expected: ProtocolVersion) -> Result<()> {
        if self.protocol_version != expected {
            return Err(Error::ProtocolVersionMismatch {
                exchange_id: self.id.clone(),
                current: self.protocol_version,
                expected,
            });
        }
        Ok(())
    }

    /// Fails with `InvalidState` unless the record is in one of `expected`.
    ///
    /// # Errors
    ///
    /// Returns an error when the current state is not listed.
    pub fn assert_state(&self, expected: &[State]) -> Result<()> {
        if !expected.contains(&self.state) {
            return Err(Error::InvalidState {
                exchange_id: self.id.clone(),
                current: self.state,
                expected: expected.to_vec(),
            });
        }
        Ok(())
    }

    /// Fails with `InvalidRole` unless the record tracks the `expected` side.
    ///
    /// # Errors
    ///
    /// Returns an error when the roles differ.
    pub fn assert_role(&self, expected: Role) -> Result<()> {
        if self.role != expected {
            return Err(Error::InvalidRole {
                exchange_id: self.id.clone(),
                current: self.role,
                expected,
            });
        }
        Ok(())
    }

    /// Move the record forward to `next`, returning the state it left.
    ///
    /// Terminal states are never left and no state of equal or lower rank is
    /// ever entered.
    pub(crate) fn transition(&mut self, next: State) -> Result<State> {
        if self.state.is_terminal() || next.rank() <= self.state.rank() {
            return Err(Error::InvalidState {
                exchange_id: self.id.clone(),
                current: self.state,
                expected: State::before(next),
            });
        }
        let previous = self.state;
        self.state = next;
        self.updated_at = Some(Utc::now());
        Ok(previous)
    }

    /// The stored attributes as a name to value map, used as the claims of
    /// the issued credential.
    #[must_use]
    pub fn claims(&self) -> BTreeMap<String, String> {
        self.credential_attributes.iter().map(|a| (a.name.clone(), a.value.clone())).collect()
    }

    /// The auto-accept policy in effect: the record's own override, else
    /// `default`.
    #[must_use]
    pub fn policy(&self, default: AutoAccept) -> AutoAccept {
        self.auto_accept.unwrap_or(default)
    }
}

/// Exchange lifecycle states.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum State {
    /// Holder sent a proposal.
    #[default]
    ProposalSent,

    /// Issuer received a proposal.
    ProposalReceived,

    /// Issuer sent an offer.
    OfferSent,

    /// Holder received an offer.
    OfferReceived,

    /// Holder sent a request.
    RequestSent,

    /// Issuer received a request.
    RequestReceived,

    /// Issuer sent the credential.
    CredentialIssued,

    /// Holder received and stored the credential.
    CredentialReceived,

    /// The exchange completed.
    Done,

    /// The exchange was abandoned by either party.
    Declined,
}

const STATES: [State; 10] = [
    State::ProposalSent,
    State::ProposalReceived,
    State::OfferSent,
    State::OfferReceived,
    State::RequestSent,
    State::RequestReceived,
    State::CredentialIssued,
    State::CredentialReceived,
    State::Done,
    State::Declined,
];

impl State {
    /// Position of the state in the negotiation. Sent/received pairs share a
    /// rank.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::ProposalSent | Self::ProposalReceived => 1,
            Self::OfferSent | Self::OfferReceived => 2,
            Self::RequestSent | Self::RequestReceived => 3,
            Self::CredentialIssued | Self::CredentialReceived => 4,
            Self::Done | Self::Declined => 5,
        }
    }

    /// Returns `true` for states that are never left.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Declined)
    }

    /// Every non-terminal state ranked below `next`.
    fn before(next: Self) -> Vec<Self> {
        STATES.into_iter().filter(|s| !s.is_terminal() && s.rank() < next.rank()).collect()
    }
}

impl Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The side of the negotiation an exchange record tracks.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub enum Role {
    /// Receives the credential.
    Holder,

    /// Issues the credential.
    Issuer,
}

impl Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Issue-credential protocol families.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolVersion {
    /// `issue-credential/1.0`: fixed attachment ids per message kind.
    V1,

    /// `issue-credential/2.0`: attachment ids bound through `formats`.
    V2,
}

impl Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V1 => write!(f, "v1"),
            Self::V2 => write!(f, "v2"),
        }
    }
}

/// Whether the next protocol step is taken without asking the application.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AutoAccept {
    /// Always wait for the application.
    #[default]
    Never,

    /// Always respond automatically.
    Always,

    /// Respond automatically when the content matches what was proposed or
    /// offered. Treated as `Never` by the handlers.
    ContentApproved,
}

/// Binding to a credential stored outside the exchange record.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialBinding {
    /// Kind of store the credential lives in.
    pub record_type: String,

    /// Identifier of the stored credential.
    pub record_id: String,
}

impl CredentialBinding {
    /// Create a binding to the stored credential `record_id`.
    #[must_use]
    pub fn new(record_type: impl Into<String>, record_id: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            record_id: record_id.into(),
        }
    }
}

//! # Message Model
//!
//! Every message of the `issue-credential` 1.0 and 2.0 protocol families as a
//! closed, `@type`-tagged union. Version-specific construction and payload
//! extraction live behind the [`Codec`] trait so that the credential service
//! is written once for both families.

mod attachment;
pub mod v1;
pub mod v2;

use std::fmt::{self, Display};

pub use attachment::{
    APPLICATION_JSON, Attachment, AttachmentData, Format, Preview, PreviewAttribute, TEXT_PLAIN,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
pub use v1::V1;
pub use v2::V2;

use crate::core::generate;
use crate::exchange::ProtocolVersion;
use crate::{Error, Result, invalid};

/// Every routable message type.
pub const TYPES: [&str; 12] = [
    v1::PROPOSE,
    v1::OFFER,
    v1::REQUEST,
    v1::ISSUE,
    v1::ACK,
    v1::PROBLEM_REPORT,
    v2::PROPOSE,
    v2::OFFER,
    v2::REQUEST,
    v2::ISSUE,
    v2::ACK,
    v2::PROBLEM_REPORT,
];

/// An issue-credential protocol message.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "@type")]
#[allow(clippy::large_enum_variant)]
pub enum Message {
    /// 1.0 propose credential.
    #[serde(rename = "https://didcomm.org/issue-credential/1.0/propose-credential")]
    ProposeV1(v1::ProposeCredential),

    /// 1.0 offer credential.
    #[serde(rename = "https://didcomm.org/issue-credential/1.0/offer-credential")]
    OfferV1(v1::OfferCredential),

    /// 1.0 request credential.
    #[serde(rename = "https://didcomm.org/issue-credential/1.0/request-credential")]
    RequestV1(v1::RequestCredential),

    /// 1.0 issue credential.
    #[serde(rename = "https://didcomm.org/issue-credential/1.0/issue-credential")]
    IssueV1(v1::IssueCredential),

    /// 1.0 acknowledgement.
    #[serde(rename = "https://didcomm.org/issue-credential/1.0/ack")]
    AckV1(v1::CredentialAck),

    /// 1.0 problem report.
    #[serde(rename = "https://didcomm.org/notification/1.0/problem-report")]
    ProblemReportV1(ProblemReport),

    /// 2.0 propose credential.
    #[serde(rename = "https://didcomm.org/issue-credential/2.0/propose-credential")]
    ProposeV2(v2::ProposeCredential),

    /// 2.0 offer credential.
    #[serde(rename = "https://didcomm.org/issue-credential/2.0/offer-credential")]
    OfferV2(v2::OfferCredential),

    /// 2.0 request credential.
    #[serde(rename = "https://didcomm.org/issue-credential/2.0/request-credential")]
    RequestV2(v2::RequestCredential),

    /// 2.0 issue credential.
    #[serde(rename = "https://didcomm.org/issue-credential/2.0/issue-credential")]
    IssueV2(v2::IssueCredential),

    /// 2.0 acknowledgement.
    #[serde(rename = "https://didcomm.org/issue-credential/2.0/ack")]
    AckV2(v2::CredentialAck),

    /// 2.0 problem report.
    #[serde(rename = "https://didcomm.org/issue-credential/2.0/problem-report")]
    ProblemReportV2(ProblemReport),
}

// Evaluate `$body` against the inner message of any variant.
macro_rules! each {
    ($msg:expr, $m:ident => $body:expr) => {
        match $msg {
            Message::ProposeV1($m) => $body,
            Message::OfferV1($m) => $body,
            Message::RequestV1($m) => $body,
            Message::IssueV1($m) => $body,
            Message::AckV1($m) => $body,
            Message::ProblemReportV1($m) => $body,
            Message::ProposeV2($m) => $body,
            Message::OfferV2($m) => $body,
            Message::RequestV2($m) => $body,
            Message::IssueV2($m) => $body,
            Message::AckV2($m) => $body,
            Message::ProblemReportV2($m) => $body,
        }
    };
}

impl Message {
    /// Decode a plaintext message.
    ///
    /// # Errors
    ///
    /// Returns an `UnroutableMessage` error for a `@type` outside the
    /// protocol families, and an `InvalidMessage` error for anything that is
    /// not a well-formed message of its declared type.
    pub fn decode(plaintext: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(plaintext).map_err(|e| invalid!("message is not JSON: {e}"))?;
        Self::from_value(value)
    }

    /// Decode a message already parsed as JSON.
    ///
    /// # Errors
    ///
    /// See [`Message::decode`].
    pub fn from_value(value: Value) -> Result<Self> {
        let Some(type_uri) = value.get("@type").and_then(Value::as_str) else {
            return Err(invalid!("message has no @type"));
        };
        if !TYPES.contains(&type_uri) {
            return Err(Error::UnroutableMessage(type_uri.to_string()));
        }
        let type_uri = type_uri.to_string();
        serde_json::from_value(value).map_err(|e| invalid!("malformed {type_uri} message: {e}"))
    }

    /// The message as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be serialized.
    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| Error::External(e.into()))
    }

    /// The `@type` URI of the message.
    #[must_use]
    pub const fn type_uri(&self) -> &'static str {
        match self {
            Self::ProposeV1(_) => v1::PROPOSE,
            Self::OfferV1(_) => v1::OFFER,
            Self::RequestV1(_) => v1::REQUEST,
            Self::IssueV1(_) => v1::ISSUE,
            Self::AckV1(_) => v1::ACK,
            Self::ProblemReportV1(_) => v1::PROBLEM_REPORT,
            Self::ProposeV2(_) => v2::PROPOSE,
            Self::OfferV2(_) => v2::OFFER,
            Self::RequestV2(_) => v2::REQUEST,
            Self::IssueV2(_) => v2::ISSUE,
            Self::AckV2(_) => v2::ACK,
            Self::ProblemReportV2(_) => v2::PROBLEM_REPORT,
        }
    }

    /// The protocol family the message belongs to.
    #[must_use]
    pub const fn version(&self) -> ProtocolVersion {
        match self {
            Self::ProposeV1(_)
            | Self::OfferV1(_)
            | Self::RequestV1(_)
            | Self::IssueV1(_)
            | Self::AckV1(_)
            | Self::ProblemReportV1(_) => ProtocolVersion::V1,
            _ => ProtocolVersion::V2,
        }
    }

    /// The kind of message, independent of protocol family.
    #[must_use]
    pub const fn kind(&self) -> Kind {
        match self {
            Self::ProposeV1(_) | Self::ProposeV2(_) => Kind::Propose,
            Self::OfferV1(_) | Self::OfferV2(_) => Kind::Offer,
            Self::RequestV1(_) | Self::RequestV2(_) => Kind::Request,
            Self::IssueV1(_) | Self::IssueV2(_) => Kind::Issue,
            Self::AckV1(_) | Self::AckV2(_) => Kind::Ack,
            Self::ProblemReportV1(_) | Self::ProblemReportV2(_) => Kind::ProblemReport,
        }
    }

    /// The message's `@id`.
    #[must_use]
    pub fn id(&self) -> &str {
        each!(self, m => &m.id)
    }

    /// The message's `~thread` decorator, if any.
    #[must_use]
    pub fn thread(&self) -> Option<&Thread> {
        each!(self, m => m.thread.as_ref())
    }

    /// The thread the message belongs to: `~thread.thid`, or the message's own
    /// `@id` when it opens the thread.
    #[must_use]
    pub fn thread_id(&self) -> &str {
        self.thread().map_or_else(|| self.id(), |t| t.thid.as_str())
    }

    /// The parent thread, if the message carries one.
    #[must_use]
    pub fn parent_thread_id(&self) -> Option<&str> {
        self.thread().and_then(|t| t.pthid.as_deref())
    }

    /// The message's human readable comment, if any.
    #[must_use]
    pub fn comment(&self) -> Option<&str> {
        match self {
            Self::ProposeV1(m) => m.comment.as_deref(),
            Self::OfferV1(m) => m.comment.as_deref(),
            Self::RequestV1(m) => m.comment.as_deref(),
            Self::IssueV1(m) => m.comment.as_deref(),
            Self::ProposeV2(m) => m.comment.as_deref(),
            Self::OfferV2(m) => m.comment.as_deref(),
            Self::RequestV2(m) => m.comment.as_deref(),
            Self::IssueV2(m) => m.comment.as_deref(),
            Self::ProblemReportV1(m) | Self::ProblemReportV2(m) => m.description.en.as_deref(),
            Self::AckV1(_) | Self::AckV2(_) => None,
        }
    }
}

/// The `@type` URI of messages of `kind` in the `version` family.
#[must_use]
pub const fn type_uri(version: ProtocolVersion, kind: Kind) -> &'static str {
    match (version, kind) {
        (ProtocolVersion::V1, Kind::Propose) => v1::PROPOSE,
        (ProtocolVersion::V1, Kind::Offer) => v1::OFFER,
        (ProtocolVersion::V1, Kind::Request) => v1::REQUEST,
        (ProtocolVersion::V1, Kind::Issue) => v1::ISSUE,
        (ProtocolVersion::V1, Kind::Ack) => v1::ACK,
        (ProtocolVersion::V1, Kind::ProblemReport) => v1::PROBLEM_REPORT,
        (ProtocolVersion::V2, Kind::Propose) => v2::PROPOSE,
        (ProtocolVersion::V2, Kind::Offer) => v2::OFFER,
        (ProtocolVersion::V2, Kind::Request) => v2::REQUEST,
        (ProtocolVersion::V2, Kind::Issue) => v2::ISSUE,
        (ProtocolVersion::V2, Kind::Ack) => v2::ACK,
        (ProtocolVersion::V2, Kind::ProblemReport) => v2::PROBLEM_REPORT,
    }
}

/// Message kinds shared by both protocol families.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Propose credential.
    Propose,
    /// Offer credential.
    Offer,
    /// Request credential.
    Request,
    /// Issue credential.
    Issue,
    /// Acknowledgement.
    Ack,
    /// Problem report.
    ProblemReport,
}

impl Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Propose => "propose",
            Self::Offer => "offer",
            Self::Request => "request",
            Self::Issue => "issue",
            Self::Ack => "ack",
            Self::ProblemReport => "problem-report",
        };
        f.write_str(kind)
    }
}

/// The `~thread` decorator.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Thread {
    /// Thread identifier.
    pub thid: String,

    /// Parent thread identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pthid: Option<String>,
}

impl Thread {
    /// Decorator for a reply on thread `thid`.
    #[must_use]
    pub fn new(thid: impl Into<String>) -> Self {
        Self {
            thid: thid.into(),
            pthid: None,
        }
    }
}

/// Identity of a message being built: its `@id` and thread decorator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    /// Message identifier.
    pub id: String,

    /// Thread decorator.
    pub thread: Option<Thread>,
}

impl Header {
    /// Header for the first message of a thread: the message's `@id` is the
    /// thread identifier.
    #[must_use]
    pub fn opening(thread_id: impl Into<String>) -> Self {
        Self {
            id: thread_id.into(),
            thread: None,
        }
    }

    /// Header for a reply on thread `thread_id`.
    #[must_use]
    pub fn reply(thread_id: impl Into<String>) -> Self {
        Self {
            id: generate::message_id(),
            thread: Some(Thread::new(thread_id)),
        }
    }
}

/// Acknowledgement status.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum AckStatus {
    /// The credential was stored.
    #[default]
    Ok,
    /// The credential could not be stored.
    Fail,
    /// Processing is still underway.
    Pending,
}

/// Problem report, sent by either party to abandon the exchange.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProblemReport {
    /// Message identifier.
    #[serde(rename = "@id")]
    pub id: String,

    /// Thread decorator.
    #[serde(rename = "~thread")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread: Option<Thread>,

    /// What went wrong.
    pub description: Description,
}

/// Problem report description.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Description {
    /// Machine readable problem code.
    pub code: String,

    /// English description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub en: Option<String>,
}

impl ProblemReport {
    /// Create a problem report.
    #[must_use]
    pub fn new(header: Header, code: &str, description: &str) -> Self {
        Self {
            id: header.id,
            thread: header.thread,
            description: Description {
                code: code.to_string(),
                en: Some(description.to_string()),
            },
        }
    }
}

/// Version independent content of a credential proposal.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Proposal {
    /// Human readable comment.
    pub comment: Option<String>,

    /// Goal code (2.0 only).
    pub goal_code: Option<String>,

    /// Human readable goal (2.0 only).
    pub goal: Option<String>,

    /// Proposed attributes.
    pub attributes: Vec<PreviewAttribute>,

    /// Credential definition the holder would like issued against.
    pub credential_definition_id: Option<String>,

    /// Schema identifier.
    pub schema_id: Option<String>,

    /// DID of the schema's author.
    pub schema_issuer_did: Option<String>,

    /// Schema name.
    pub schema_name: Option<String>,

    /// Schema version.
    pub schema_version: Option<String>,

    /// DID of the issuer.
    pub issuer_did: Option<String>,
}

/// Version independent content of a credential offer.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct OfferDetails {
    /// Human readable comment.
    pub comment: Option<String>,

    /// Goal code (2.0 only).
    pub goal_code: Option<String>,

    /// Human readable goal (2.0 only).
    pub goal: Option<String>,

    /// Credential this offer replaces (2.0 only).
    pub replacement_id: Option<String>,

    /// Offered attributes.
    pub attributes: Vec<PreviewAttribute>,
}

/// Builds and reads the messages of one protocol family.
pub trait Codec: Clone + Copy + Send + Sync + 'static {
    /// The protocol family the codec implements.
    const VERSION: ProtocolVersion;

    /// Attachment identifier of payloads of `kind`.
    fn attachment_id(kind: Kind) -> &'static str;

    /// Read the payload of `kind` from a message already known to be of this
    /// family and kind.
    ///
    /// # Errors
    ///
    /// Returns `FormatMissing` or `AttachmentMissing` when the payload cannot
    /// be located.
    fn extract(message: &Message, kind: Kind) -> Result<String>;

    /// Read the payload of `kind` from `message`.
    ///
    /// # Errors
    ///
    /// Returns an `InvalidMessage` error when the message is of another
    /// family or kind, and `FormatMissing` or `AttachmentMissing` when the
    /// payload cannot be located.
    fn payload(message: &Message, kind: Kind) -> Result<String> {
        if message.version() != Self::VERSION || message.kind() != kind {
            return Err(invalid!(
                "expected {} {kind} message, found {}",
                Self::VERSION,
                message.type_uri()
            ));
        }
        Self::extract(message, kind)
    }

    /// Build a proposal.
    fn propose(header: Header, proposal: &Proposal) -> Message;

    /// Build an offer carrying the offer `payload`.
    fn offer(header: Header, payload: &str, details: &OfferDetails) -> Message;

    /// Build a request carrying the request `payload` in reply to `offer`.
    fn request(header: Header, payload: &str, offer: &Message) -> Message;

    /// Build a credential message carrying the credential `payload`.
    fn issue(header: Header, payload: &str, comment: Option<String>, offer: &Message) -> Message;

    /// Build an acknowledgement.
    fn ack(header: Header) -> Message;

    /// Build a problem report.
    fn problem_report(header: Header, code: &str, description: &str) -> Message;

    /// Attributes previewed by a proposal or offer.
    fn preview(message: &Message) -> Option<Vec<PreviewAttribute>>;

    /// Credential definition named by a proposal, if any.
    ///
    /// # Errors
    ///
    /// Returns an error when the proposal's filter cannot be read.
    fn proposed_definition(message: &Message) -> Result<Option<String>>;
}

//! # Issue Credential 1.0
//!
//! Messages of the `issue-credential/1.0` protocol family. Payloads are
//! located by fixed, per-kind attachment identifiers.

use serde::{Deserialize, Serialize};

use super::attachment::{self, Attachment, Preview, PreviewAttribute};
use super::{AckStatus, Codec, Header, Kind, Message, OfferDetails, ProblemReport, Proposal, Thread};
use crate::Result;
use crate::exchange::ProtocolVersion;

/// Propose credential message type.
pub const PROPOSE: &str = "https://didcomm.org/issue-credential/1.0/propose-credential";
/// Offer credential message type.
pub const OFFER: &str = "https://didcomm.org/issue-credential/1.0/offer-credential";
/// Request credential message type.
pub const REQUEST: &str = "https://didcomm.org/issue-credential/1.0/request-credential";
/// Issue credential message type.
pub const ISSUE: &str = "https://didcomm.org/issue-credential/1.0/issue-credential";
/// Acknowledgement message type.
pub const ACK: &str = "https://didcomm.org/issue-credential/1.0/ack";
/// Problem report message type.
pub const PROBLEM_REPORT: &str = "https://didcomm.org/notification/1.0/problem-report";
/// Credential preview type.
pub const PREVIEW: &str = "https://didcomm.org/issue-credential/1.0/credential-preview";

/// Attachment identifier of the offer payload.
pub const OFFER_ATTACHMENT_ID: &str = "libindy-cred-offer-0";
/// Attachment identifier of the request payload.
pub const REQUEST_ATTACHMENT_ID: &str = "libindy-cred-request-0";
/// Attachment identifier of the credential payload.
pub const CREDENTIAL_ATTACHMENT_ID: &str = "libindy-cred-0";

/// Holder's proposal of the credential it would like issued.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProposeCredential {
    /// Message identifier.
    #[serde(rename = "@id")]
    pub id: String,

    /// Thread decorator.
    #[serde(rename = "~thread")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread: Option<Thread>,

    /// Human readable comment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    /// Proposed attributes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_proposal: Option<Preview>,

    /// DID of the schema's author.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_issuer_did: Option<String>,

    /// Schema identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_id: Option<String>,

    /// Schema name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,

    /// Schema version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,

    /// Credential definition identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cred_def_id: Option<String>,

    /// DID of the issuer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer_did: Option<String>,
}

/// Issuer's offer of a credential.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct OfferCredential {
    /// Message identifier.
    #[serde(rename = "@id")]
    pub id: String,

    /// Thread decorator.
    #[serde(rename = "~thread")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread: Option<Thread>,

    /// Human readable comment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    /// Offered attributes.
    pub credential_preview: Preview,

    /// Offer payloads.
    #[serde(rename = "offers~attach")]
    pub offers: Vec<Attachment>,
}

/// Holder's request for the offered credential.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct RequestCredential {
    /// Message identifier.
    #[serde(rename = "@id")]
    pub id: String,

    /// Thread decorator.
    #[serde(rename = "~thread")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread: Option<Thread>,

    /// Human readable comment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    /// Request payloads.
    #[serde(rename = "requests~attach")]
    pub requests: Vec<Attachment>,
}

/// Issuer's delivery of the credential.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct IssueCredential {
    /// Message identifier.
    #[serde(rename = "@id")]
    pub id: String,

    /// Thread decorator.
    #[serde(rename = "~thread")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread: Option<Thread>,

    /// Human readable comment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    /// Credential payloads.
    #[serde(rename = "credentials~attach")]
    pub credentials: Vec<Attachment>,
}

/// Holder's acknowledgement of the stored credential.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct CredentialAck {
    /// Message identifier.
    #[serde(rename = "@id")]
    pub id: String,

    /// Thread decorator.
    #[serde(rename = "~thread")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread: Option<Thread>,

    /// Outcome.
    pub status: AckStatus,
}

/// Codec for the 1.0 protocol family.
#[derive(Clone, Copy, Debug, Default)]
pub struct V1;

impl Codec for V1 {
    const VERSION: ProtocolVersion = ProtocolVersion::V1;

    fn attachment_id(kind: Kind) -> &'static str {
        match kind {
            Kind::Request => REQUEST_ATTACHMENT_ID,
            Kind::Issue => CREDENTIAL_ATTACHMENT_ID,
            _ => OFFER_ATTACHMENT_ID,
        }
    }

    fn extract(message: &Message, kind: Kind) -> Result<String> {
        attachment::find(attachments(message), Self::attachment_id(kind))?.payload()
    }

    fn propose(header: Header, proposal: &Proposal) -> Message {
        let credential_proposal = (!proposal.attributes.is_empty()).then(|| Preview {
            type_: PREVIEW.into(),
            attributes: proposal.attributes.clone(),
        });
        Message::ProposeV1(ProposeCredential {
            id: header.id,
            thread: header.thread,
            comment: proposal.comment.clone(),
            credential_proposal,
            schema_issuer_did: proposal.schema_issuer_did.clone(),
            schema_id: proposal.schema_id.clone(),
            schema_name: proposal.schema_name.clone(),
            schema_version: proposal.schema_version.clone(),
            cred_def_id: proposal.credential_definition_id.clone(),
            issuer_did: proposal.issuer_did.clone(),
        })
    }

    fn offer(header: Header, payload: &str, details: &OfferDetails) -> Message {
        Message::OfferV1(OfferCredential {
            id: header.id,
            thread: header.thread,
            comment: details.comment.clone(),
            credential_preview: Preview {
                type_: PREVIEW.into(),
                attributes: details.attributes.clone(),
            },
            offers: vec![Attachment::from_data(OFFER_ATTACHMENT_ID, payload)],
        })
    }

    fn request(header: Header, payload: &str, offer: &Message) -> Message {
        Message::RequestV1(RequestCredential {
            id: header.id,
            thread: header.thread,
            comment: offer.comment().map(ToString::to_string),
            requests: vec![Attachment::from_data(REQUEST_ATTACHMENT_ID, payload)],
        })
    }

    fn issue(header: Header, payload: &str, comment: Option<String>, _offer: &Message) -> Message {
        Message::IssueV1(IssueCredential {
            id: header.id,
            thread: header.thread,
            comment,
            credentials: vec![Attachment::from_data(CREDENTIAL_ATTACHMENT_ID, payload)],
        })
    }

    fn ack(header: Header) -> Message {
        Message::AckV1(CredentialAck {
            id: header.id,
            thread: header.thread,
            status: AckStatus::Ok,
        })
    }

    fn problem_report(header: Header, code: &str, description: &str) -> Message {
        Message::ProblemReportV1(ProblemReport::new(header, code, description))
    }

    fn preview(message: &Message) -> Option<Vec<PreviewAttribute>> {
        match message {
            Message::ProposeV1(m) => m.credential_proposal.as_ref().map(|p| p.attributes.clone()),
            Message::OfferV1(m) => Some(m.credential_preview.attributes.clone()),
            _ => None,
        }
    }

    fn proposed_definition(message: &Message) -> Result<Option<String>> {
        match message {
            Message::ProposeV1(m) => Ok(m.cred_def_id.clone()),
            _ => Ok(None),
        }
    }
}

/// Attachments of a 1.0 message that carries payloads.
fn attachments(message: &Message) -> &[Attachment] {
    match message {
        Message::OfferV1(m) => &m.offers,
        Message::RequestV1(m) => &m.requests,
        Message::IssueV1(m) => &m.credentials,
        _ => &[],
    }
}

//! # Issue Credential 2.0
//!
//! Messages of the `issue-credential/2.0` protocol family. Every payload is
//! bound to a format through the message's `formats` list, and a payload is
//! only read once its attachment identifier is advertised there.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::attachment::{self, Attachment, Format, Preview, PreviewAttribute};
use super::{AckStatus, Codec, Header, Kind, Message, OfferDetails, ProblemReport, Proposal, Thread};
use crate::exchange::ProtocolVersion;
use crate::{Error, Result, invalid};

/// Propose credential message type.
pub const PROPOSE: &str = "https://didcomm.org/issue-credential/2.0/propose-credential";
/// Offer credential message type.
pub const OFFER: &str = "https://didcomm.org/issue-credential/2.0/offer-credential";
/// Request credential message type.
pub const REQUEST: &str = "https://didcomm.org/issue-credential/2.0/request-credential";
/// Issue credential message type.
pub const ISSUE: &str = "https://didcomm.org/issue-credential/2.0/issue-credential";
/// Acknowledgement message type.
pub const ACK: &str = "https://didcomm.org/issue-credential/2.0/ack";
/// Problem report message type.
pub const PROBLEM_REPORT: &str = "https://didcomm.org/issue-credential/2.0/problem-report";
/// Credential preview type.
pub const PREVIEW: &str = "https://didcomm.org/issue-credential/2.0/credential-preview";

/// Attachment identifier used for every payload kind.
pub const ATTACHMENT_ID: &str = "indy";

/// Format of a proposal filter.
pub const FILTER_FORMAT: &str = "hlindy/cred-filter@v2.0";
/// Format of an offer payload.
pub const OFFER_FORMAT: &str = "hlindy/cred-abstract@v2.0";
/// Format of a request payload.
pub const REQUEST_FORMAT: &str = "hlindy/cred-req@v2.0";
/// Format of a credential payload.
pub const CREDENTIAL_FORMAT: &str = "hlindy/cred@v2.0";

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

    /// Goal code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal_code: Option<String>,

    /// Human readable goal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,

    /// Proposed attributes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_preview: Option<Preview>,

    /// Formats of the filter attachments.
    #[serde(default)]
    pub formats: Vec<Format>,

    /// Filters narrowing the credential that is proposed.
    #[serde(rename = "filters~attach")]
    #[serde(default)]
    pub filters: Vec<Attachment>,
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

    /// Goal code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal_code: Option<String>,

    /// Human readable goal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,

    /// Identifier of a credential this offer replaces.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement_id: Option<String>,

    /// Offered attributes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_preview: Option<Preview>,

    /// Formats of the offer attachments.
    #[serde(default)]
    pub formats: Vec<Format>,

    /// Offer payloads.
    #[serde(rename = "offers~attach")]
    #[serde(default)]
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

    /// Goal code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal_code: Option<String>,

    /// Human readable goal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,

    /// Formats of the request attachments.
    #[serde(default)]
    pub formats: Vec<Format>,

    /// Request payloads.
    #[serde(rename = "requests~attach")]
    #[serde(default)]
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

    /// Goal code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal_code: Option<String>,

    /// Human readable goal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,

    /// Identifier of a credential this one replaces.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement_id: Option<String>,

    /// Formats of the credential attachments.
    #[serde(default)]
    pub formats: Vec<Format>,

    /// Credential payloads.
    #[serde(rename = "credentials~attach")]
    #[serde(default)]
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

/// Codec for the 2.0 protocol family.
#[derive(Clone, Copy, Debug, Default)]
pub struct V2;

impl Codec for V2 {
    const VERSION: ProtocolVersion = ProtocolVersion::V2;

    fn attachment_id(_: Kind) -> &'static str {
        ATTACHMENT_ID
    }

    fn extract(message: &Message, kind: Kind) -> Result<String> {
        let (formats, attachments) = parts(message);
        let id = Self::attachment_id(kind);
        validate_format_presence(formats, id)?;
        attachment::find(attachments, id)?.payload()
    }

    fn propose(header: Header, proposal: &Proposal) -> Message {
        let credential_preview = (!proposal.attributes.is_empty()).then(|| Preview {
            type_: PREVIEW.into(),
            attributes: proposal.attributes.clone(),
        });

        let (formats, filters) = match filter(proposal) {
            Some(filter) => (
                vec![Format::new(ATTACHMENT_ID, FILTER_FORMAT)],
                vec![Attachment::from_data(ATTACHMENT_ID, &filter)],
            ),
            None => (vec![], vec![]),
        };

        Message::ProposeV2(ProposeCredential {
            id: header.id,
            thread: header.thread,
            comment: proposal.comment.clone(),
            goal_code: proposal.goal_code.clone(),
            goal: proposal.goal.clone(),
            credential_preview,
            formats,
            filters,
        })
    }

    fn offer(header: Header, payload: &str, details: &OfferDetails) -> Message {
        Message::OfferV2(OfferCredential {
            id: header.id,
            thread: header.thread,
            comment: details.comment.clone(),
            goal_code: details.goal_code.clone(),
            goal: details.goal.clone(),
            replacement_id: details.replacement_id.clone(),
            credential_preview: Some(Preview {
                type_: PREVIEW.into(),
                attributes: details.attributes.clone(),
            }),
            formats: vec![Format::new(ATTACHMENT_ID, OFFER_FORMAT)],
            offers: vec![Attachment::from_data(ATTACHMENT_ID, payload)],
        })
    }

    fn request(header: Header, payload: &str, offer: &Message) -> Message {
        let (goal_code, goal) = goals(offer);
        Message::RequestV2(RequestCredential {
            id: header.id,
            thread: header.thread,
            comment: offer.comment().map(ToString::to_string),
            goal_code,
            goal,
            formats: vec![Format::new(ATTACHMENT_ID, REQUEST_FORMAT)],
            requests: vec![Attachment::from_data(ATTACHMENT_ID, payload)],
        })
    }

    fn issue(header: Header, payload: &str, comment: Option<String>, offer: &Message) -> Message {
        let (goal_code, goal) = goals(offer);
        let replacement_id = match offer {
            Message::OfferV2(m) => m.replacement_id.clone(),
            _ => None,
        };
        Message::IssueV2(IssueCredential {
            id: header.id,
            thread: header.thread,
            comment,
            goal_code,
            goal,
            replacement_id,
            formats: vec![Format::new(ATTACHMENT_ID, CREDENTIAL_FORMAT)],
            credentials: vec![Attachment::from_data(ATTACHMENT_ID, payload)],
        })
    }

    fn ack(header: Header) -> Message {
        Message::AckV2(CredentialAck {
            id: header.id,
            thread: header.thread,
            status: AckStatus::Ok,
        })
    }

    fn problem_report(header: Header, code: &str, description: &str) -> Message {
        Message::ProblemReportV2(ProblemReport::new(header, code, description))
    }

    fn preview(message: &Message) -> Option<Vec<PreviewAttribute>> {
        let preview = match message {
            Message::ProposeV2(m) => m.credential_preview.as_ref(),
            Message::OfferV2(m) => m.credential_preview.as_ref(),
            _ => None,
        };
        preview.map(|p| p.attributes.clone())
    }

    fn proposed_definition(message: &Message) -> Result<Option<String>> {
        let Message::ProposeV2(m) = message else {
            return Ok(None);
        };
        if !m.formats.iter().any(|f| f.attach_id == ATTACHMENT_ID) {
            return Ok(None);
        }
        let filter = attachment::find(&m.filters, ATTACHMENT_ID)?.payload()?;
        let filter: Value =
            serde_json::from_str(&filter).map_err(|e| invalid!("proposal filter is not JSON: {e}"))?;
        Ok(filter.get("cred_def_id").and_then(Value::as_str).map(ToString::to_string))
    }
}

/// Fails with `FormatMissing` unless `attach_id` is advertised in `formats`.
///
/// # Errors
///
/// Returns an error when no format entry names the attachment.
pub fn validate_format_presence(formats: &[Format], attach_id: &str) -> Result<()> {
    if formats.iter().any(|f| f.attach_id == attach_id) {
        return Ok(());
    }
    Err(Error::FormatMissing(format!("no format advertised for attachment {attach_id}")))
}

fn parts(message: &Message) -> (&[Format], &[Attachment]) {
    match message {
        Message::ProposeV2(m) => (m.formats.as_slice(), m.filters.as_slice()),
        Message::OfferV2(m) => (m.formats.as_slice(), m.offers.as_slice()),
        Message::RequestV2(m) => (m.formats.as_slice(), m.requests.as_slice()),
        Message::IssueV2(m) => (m.formats.as_slice(), m.credentials.as_slice()),
        _ => Default::default(),
    }
}

fn goals(offer: &Message) -> (Option<String>, Option<String>) {
    match offer {
        Message::OfferV2(m) => (m.goal_code.clone(), m.goal.clone()),
        _ => (None, None),
    }
}

// Indy filter for the proposal; `None` when the proposal names nothing to
// filter on.
fn filter(proposal: &Proposal) -> Option<String> {
    let fields = [
        ("cred_def_id", &proposal.credential_definition_id),
        ("schema_id", &proposal.schema_id),
        ("schema_issuer_did", &proposal.schema_issuer_did),
        ("schema_name", &proposal.schema_name),
        ("schema_version", &proposal.schema_version),
        ("issuer_did", &proposal.issuer_did),
    ];
    let filter: Map<String, Value> = fields
        .into_iter()
        .filter_map(|(k, v)| v.as_ref().map(|v| (k.to_string(), Value::String(v.clone()))))
        .collect();
    if filter.is_empty() {
        return None;
    }
    Some(Value::Object(filter).to_string())
}

//! # Attachments
//!
//! Payload-carrying parts of a message, and the preview of the credential's
//! attributes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core;
use crate::{Error, Result, invalid};

/// Default media type of a preview attribute's value.
pub const TEXT_PLAIN: &str = "text/plain";

/// Media type of JSON attachment payloads.
pub const APPLICATION_JSON: &str = "application/json";

/// An identified payload carried by a message.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Attachment {
    /// Attachment identifier. 1.0 messages use fixed per-kind identifiers;
    /// 2.0 messages bind identifiers to formats.
    #[serde(rename = "@id")]
    pub id: String,

    /// Media type of the payload.
    #[serde(rename = "mime-type")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// The payload.
    pub data: AttachmentData,
}

/// Attachment payload, either base64 encoded or inline JSON.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct AttachmentData {
    /// Base64 encoded payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base64: Option<String>,

    /// Inline JSON payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json: Option<Value>,
}

impl Attachment {
    /// Wrap `payload` as a base64 encoded JSON attachment.
    #[must_use]
    pub fn from_data(id: impl Into<String>, payload: &str) -> Self {
        Self {
            id: id.into(),
            mime_type: Some(APPLICATION_JSON.into()),
            data: AttachmentData {
                base64: Some(core::encode(payload.as_bytes())),
                json: None,
            },
        }
    }

    /// The attachment's payload as a string.
    ///
    /// # Errors
    ///
    /// Returns an `InvalidMessage` error when the attachment carries neither
    /// a base64 nor an inline JSON payload, or the base64 payload is corrupt.
    pub fn payload(&self) -> Result<String> {
        if let Some(encoded) = &self.data.base64 {
            return core::decode(encoded);
        }
        if let Some(json) = &self.data.json {
            return serde_json::to_string(json).map_err(|e| Error::External(e.into()));
        }
        Err(invalid!("attachment {} carries no data", self.id))
    }
}

/// Find the attachment with identifier `id`.
///
/// # Errors
///
/// Returns an `AttachmentMissing` error when no attachment has that
/// identifier.
pub fn find<'a>(attachments: &'a [Attachment], id: &str) -> Result<&'a Attachment> {
    attachments
        .iter()
        .find(|a| a.id == id)
        .ok_or_else(|| Error::AttachmentMissing(format!("no attachment with id {id}")))
}

/// Binds a 2.0 attachment identifier to the format of its payload.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Format {
    /// Identifier of the attachment the format describes.
    pub attach_id: String,

    /// Format label, e.g. `hlindy/cred-abstract@v2.0`.
    pub format: String,
}

impl Format {
    /// Create a format entry.
    #[must_use]
    pub fn new(attach_id: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            attach_id: attach_id.into(),
            format: format.into(),
        }
    }
}

/// Preview of the credential's attributes.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Preview {
    /// Preview type URI for the protocol version.
    #[serde(rename = "@type")]
    pub type_: String,

    /// Attributes in order.
    pub attributes: Vec<PreviewAttribute>,
}

/// A named credential attribute.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct PreviewAttribute {
    /// Attribute name.
    pub name: String,

    /// Media type of `value`; `text/plain` when absent.
    #[serde(rename = "mime-type")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// Attribute value.
    pub value: String,
}

impl PreviewAttribute {
    /// Create a plain text attribute.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mime_type: Some(TEXT_PLAIN.into()),
            value: value.into(),
        }
    }
}

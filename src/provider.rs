//! # Provider
//!
//! Collaborators the exchange engine relies on but does not implement:
//! persistence, transport, the ledger, anoncreds cryptography, and the
//! wallet. Implementers bundle them into a single [`Provider`].

use std::collections::BTreeMap;
use std::future::Future;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::Event;
use crate::exchange::Exchange;
use crate::message::Message;

/// Credential-exchange Provider trait.
pub trait Provider:
    ExchangeStore
    + MessageStore
    + MessageSender
    + Connections
    + Ledger
    + Registry
    + Anoncreds
    + Wallet
    + EventBus
    + Clone
{
}

/// `ExchangeStore` persists exchange records.
pub trait ExchangeStore: Send + Sync {
    /// Insert or replace the record keyed by `exchange.id`.
    fn put(&self, exchange: &Exchange) -> impl Future<Output = Result<()>> + Send;

    /// Retrieve the record with the given id.
    fn get(&self, exchange_id: &str) -> impl Future<Output = Result<Option<Exchange>>> + Send;

    /// Every record on the given thread.
    fn by_thread(&self, thread_id: &str) -> impl Future<Output = Result<Vec<Exchange>>> + Send;
}

/// Who authored a stored message.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum MessageRole {
    /// This agent sent the message.
    Sender,

    /// This agent received the message.
    Receiver,
}

/// `MessageStore` keeps the raw messages of each exchange, keyed by exchange
/// and message type.
pub trait MessageStore: Send + Sync {
    /// Store `message`, replacing any earlier message of the same type on the
    /// exchange.
    fn save_message(
        &self, exchange_id: &str, role: MessageRole, message: &Message,
    ) -> impl Future<Output = Result<()>> + Send;

    /// The stored message of type `message_type`, as JSON.
    fn find_message(
        &self, exchange_id: &str, message_type: &str,
    ) -> impl Future<Output = Result<Option<Value>>> + Send;
}

/// `MessageSender` delivers outbound messages to the other party.
pub trait MessageSender: Send + Sync {
    /// Send `message` over `connection`.
    fn send(
        &self, message: &Message, connection: &Connection,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// A pairwise connection between this agent and another party.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Connection {
    /// Connection identifier.
    pub id: String,

    /// This agent's DID on the connection.
    pub did: String,

    /// The other party's DID.
    pub their_did: String,

    /// Connection protocol state.
    pub state: ConnectionState,
}

impl Connection {
    /// Returns `true` once the connection protocol has completed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state == ConnectionState::Complete
    }
}

/// Connection protocol states.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionState {
    /// An invitation was created or received.
    #[default]
    Invited,

    /// A connection request was exchanged.
    Requested,

    /// A connection response was exchanged.
    Responded,

    /// The connection is usable.
    Complete,
}

/// `Connections` resolves connection records.
pub trait Connections: Send + Sync {
    /// The connection with the given id.
    fn connection(&self, connection_id: &str) -> impl Future<Output = Result<Connection>> + Send;
}

/// `Ledger` resolves public artifacts from the verifiable data registry. Each
/// method returns the artifact's JSON.
pub trait Ledger: Send + Sync {
    /// Credential definition `cred_def_id`.
    fn credential_definition(
        &self, cred_def_id: &str,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Schema `schema_id`.
    fn schema(&self, schema_id: &str) -> impl Future<Output = Result<String>> + Send;

    /// Revocation registry definition `rev_reg_id`.
    fn revocation_registry_definition(
        &self, rev_reg_id: &str,
    ) -> impl Future<Output = Result<String>> + Send;
}

/// Issuer-owned material for a credential definition.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct IssuerDefinition {
    /// Credential definition identifier.
    pub credential_definition_id: String,

    /// Schema the definition was created from.
    pub schema_id: String,

    /// Public credential definition JSON.
    pub credential_definition: String,

    /// Private credential definition JSON.
    pub credential_definition_private: String,

    /// Key correctness proof JSON.
    pub key_correctness_proof: String,
}

/// Issuer-owned revocation material for one credential.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct RevocationConfig {
    /// Revocation registry definition JSON.
    pub registry_definition: String,

    /// Private revocation registry definition JSON.
    pub registry_definition_private: String,

    /// Current revocation status list JSON.
    pub status_list: String,

    /// Index allocated to the credential in the registry.
    pub registry_index: u32,
}

/// `Registry` holds the issuer's own credential definitions.
pub trait Registry: Send + Sync {
    /// Issuer material for `cred_def_id`.
    fn definition(
        &self, cred_def_id: &str,
    ) -> impl Future<Output = Result<IssuerDefinition>> + Send;

    /// Revocation material for the next credential issued against
    /// `cred_def_id`, or `None` when the definition does not support
    /// revocation.
    fn revocation(
        &self, cred_def_id: &str,
    ) -> impl Future<Output = Result<Option<RevocationConfig>>> + Send;
}

/// A credential request and the context needed to process its credential.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct CredentialRequest {
    /// Request JSON sent to the issuer.
    pub request: String,

    /// Opaque metadata kept by the holder.
    pub metadata: String,
}

/// `Anoncreds` performs the credential cryptography.
pub trait Anoncreds: Send + Sync {
    /// Create an offer for `cred_def_id`.
    fn create_offer(
        &self, schema_id: &str, cred_def_id: &str, key_correctness_proof: &str,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Create a request for the credential offered in `offer`.
    fn create_request(
        &self, holder_did: &str, credential_definition: &str, link_secret_id: &str, offer: &str,
    ) -> impl Future<Output = Result<CredentialRequest>> + Send;

    /// Create the credential answering `request`.
    fn create_credential(
        &self, definition: &IssuerDefinition, offer: &str, request: &str,
        claims: &BTreeMap<String, String>, revocation: Option<&RevocationConfig>,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Verify and store an issued credential, returning its stored id.
    fn process_credential(
        &self, credential: &str, request_metadata: &str, link_secret_id: &str,
        credential_definition: &str, revocation_registry_definition: Option<&str>,
    ) -> impl Future<Output = Result<String>> + Send;
}

/// `Wallet` exposes the holder's secrets by reference.
pub trait Wallet: Send + Sync {
    /// Identifier of the holder's link secret.
    fn link_secret_id(&self) -> impl Future<Output = Result<String>> + Send;
}

/// `EventBus` receives a notification for every persisted state change.
pub trait EventBus: Send + Sync {
    /// Publish `event`. Must not block.
    fn publish(&self, event: Event);
}

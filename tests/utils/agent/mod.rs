pub mod ledger;
pub mod store;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use serde_json::Value;
use vc_exchange::cache::LedgerCache;
use vc_exchange::config::Config;
use vc_exchange::event::{Broadcaster, Event};
use vc_exchange::provider::{
    Anoncreds, Connection, Connections, CredentialRequest, EventBus, ExchangeStore,
    IssuerDefinition, Ledger, MessageRole, MessageSender, MessageStore, Provider, Registry,
    RevocationConfig, Wallet,
};
use vc_exchange::{Exchange, Message};

use self::ledger::{FakeAnoncreds, FakeLedger};
use self::store::{ConnectionTable, ExchangeTable, MessageTable};

pub const CONNECTION_ID: &str = "connection-1";
pub const ISSUER_DID: &str = "did:sov:issuer";
pub const HOLDER_DID: &str = "did:sov:holder";
pub const LINK_SECRET_ID: &str = "main";

#[derive(Clone, Debug)]
pub struct ProviderImpl {
    exchanges: ExchangeTable,
    messages: MessageTable,
    connections: ConnectionTable,
    outbox: Arc<Mutex<Vec<(Message, Connection)>>>,
    fake_ledger: FakeLedger,
    ledger: LedgerCache<FakeLedger>,
    anoncreds: FakeAnoncreds,
    events: Broadcaster,
}

impl ProviderImpl {
    /// A provider whose agent is `did`, connected to `their_did` over
    /// [`CONNECTION_ID`].
    #[must_use]
    pub fn new(did: &str, their_did: &str) -> Self {
        Self::with_config(did, their_did, &Config::default())
    }

    /// As [`ProviderImpl::new`], sizing the ledger cache and the event
    /// buffer from `config`.
    #[must_use]
    pub fn with_config(did: &str, their_did: &str, config: &Config) -> Self {
        let fake_ledger = FakeLedger::default();
        Self {
            exchanges: ExchangeTable::default(),
            messages: MessageTable::default(),
            connections: ConnectionTable::new(store::complete(CONNECTION_ID, did, their_did)),
            outbox: Arc::new(Mutex::new(Vec::new())),
            ledger: LedgerCache::new(fake_ledger.clone(), &config.cache),
            fake_ledger,
            anoncreds: FakeAnoncreds::default(),
            events: Broadcaster::from_config(config),
        }
    }

    #[must_use]
    pub fn issuer() -> Self {
        Self::issuer_with(&Config::default())
    }

    #[must_use]
    pub fn holder() -> Self {
        Self::holder_with(&Config::default())
    }

    #[must_use]
    pub fn issuer_with(config: &Config) -> Self {
        Self::with_config(ISSUER_DID, HOLDER_DID, config)
    }

    #[must_use]
    pub fn holder_with(config: &Config) -> Self {
        Self::with_config(HOLDER_DID, ISSUER_DID, config)
    }

    pub fn connection(&self) -> Connection {
        self.connections.get(CONNECTION_ID).expect("connection should exist")
    }

    pub fn add_connection(&self, connection: Connection) {
        self.connections.add(connection);
    }

    /// Messages sent so far, oldest first.
    pub fn sent(&self) -> Vec<Message> {
        self.outbox.lock().expect("should lock").iter().map(|(m, _)| m.clone()).collect()
    }

    /// The most recently sent message.
    pub fn last_sent(&self) -> Message {
        self.sent().pop().expect("a message should have been sent")
    }

    /// Every stored exchange record.
    pub fn records(&self) -> Vec<Exchange> {
        self.exchanges.all()
    }

    pub const fn events(&self) -> &Broadcaster {
        &self.events
    }

    pub const fn anoncreds(&self) -> &FakeAnoncreds {
        &self.anoncreds
    }

    /// Lookups that reached the ledger rather than the cache.
    pub fn ledger_lookups(&self) -> usize {
        self.fake_ledger.lookups()
    }
}

impl Provider for ProviderImpl {}

impl ExchangeStore for ProviderImpl {
    async fn put(&self, exchange: &Exchange) -> Result<()> {
        self.exchanges.put(exchange);
        Ok(())
    }

    async fn get(&self, exchange_id: &str) -> Result<Option<Exchange>> {
        Ok(self.exchanges.get(exchange_id))
    }

    async fn by_thread(&self, thread_id: &str) -> Result<Vec<Exchange>> {
        Ok(self.exchanges.by_thread(thread_id))
    }
}

impl MessageStore for ProviderImpl {
    async fn save_message(
        &self, exchange_id: &str, _role: MessageRole, message: &Message,
    ) -> Result<()> {
        self.messages.save(exchange_id, message.type_uri(), message.to_value()?);
        Ok(())
    }

    async fn find_message(&self, exchange_id: &str, message_type: &str) -> Result<Option<Value>> {
        Ok(self.messages.find(exchange_id, message_type))
    }
}

impl MessageSender for ProviderImpl {
    async fn send(&self, message: &Message, connection: &Connection) -> Result<()> {
        self.outbox.lock().expect("should lock").push((message.clone(), connection.clone()));
        Ok(())
    }
}

impl Connections for ProviderImpl {
    async fn connection(&self, connection_id: &str) -> Result<Connection> {
        self.connections.get(connection_id)
    }
}

impl Ledger for ProviderImpl {
    async fn credential_definition(&self, cred_def_id: &str) -> Result<String> {
        Ledger::credential_definition(&self.ledger, cred_def_id).await
    }

    async fn schema(&self, schema_id: &str) -> Result<String> {
        Ledger::schema(&self.ledger, schema_id).await
    }

    async fn revocation_registry_definition(&self, rev_reg_id: &str) -> Result<String> {
        Ledger::revocation_registry_definition(&self.ledger, rev_reg_id).await
    }
}

impl Registry for ProviderImpl {
    async fn definition(&self, cred_def_id: &str) -> Result<IssuerDefinition> {
        ledger::definition(cred_def_id)
    }

    async fn revocation(&self, cred_def_id: &str) -> Result<Option<RevocationConfig>> {
        Ok(ledger::revocation(cred_def_id))
    }
}

impl Anoncreds for ProviderImpl {
    async fn create_offer(
        &self, schema_id: &str, cred_def_id: &str, key_correctness_proof: &str,
    ) -> Result<String> {
        self.anoncreds.create_offer(schema_id, cred_def_id, key_correctness_proof)
    }

    async fn create_request(
        &self, holder_did: &str, _credential_definition: &str, link_secret_id: &str, offer: &str,
    ) -> Result<CredentialRequest> {
        self.anoncreds.create_request(holder_did, link_secret_id, offer)
    }

    async fn create_credential(
        &self, definition: &IssuerDefinition, _offer: &str, _request: &str,
        claims: &BTreeMap<String, String>, revocation: Option<&RevocationConfig>,
    ) -> Result<String> {
        self.anoncreds.create_credential(definition, claims, revocation)
    }

    async fn process_credential(
        &self, credential: &str, request_metadata: &str, _link_secret_id: &str,
        _credential_definition: &str, _revocation_registry_definition: Option<&str>,
    ) -> Result<String> {
        self.anoncreds.process_credential(credential, request_metadata)
    }
}

impl Wallet for ProviderImpl {
    async fn link_secret_id(&self) -> Result<String> {
        Ok(LINK_SECRET_ID.into())
    }
}

impl EventBus for ProviderImpl {
    fn publish(&self, event: Event) {
        EventBus::publish(&self.events, event);
    }
}

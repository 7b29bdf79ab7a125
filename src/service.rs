//! # Credential Service
//!
//! The exchange state machine, written once and parameterised by a
//! [`Codec`] for each protocol family. Holder-side operations live in
//! `holder`, issuer-side operations in `issuer`.
//!
//! Every operation that mutates a record runs inside a per-thread critical
//! section: the record is re-read and its guards checked after the thread's
//! lock is taken. External collaborators are called before the record is
//! changed, and every state change goes through `update_state`, which
//! persists the record and publishes exactly one event.

mod holder;
mod issuer;

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, instrument};

use crate::config::Config;
use crate::dispatch::InboundMessage;
use crate::event::Event;
use crate::exchange::{AutoAccept, Exchange, Role, State};
use crate::message::{self, Codec, Kind, Message, OfferDetails, PreviewAttribute, Proposal};
use crate::provider::{EventBus, MessageRole, MessageStore, Provider};
use crate::repository::Repository;
use crate::{Error, Result, invalid, not_found};

/// Record type of credentials bound to an exchange.
pub const CREDENTIAL_RECORD_TYPE: &str = "indy";

/// Problem code sent when a holder declines an offer.
pub const DECLINE_CODE: &str = "issuance-abandoned";

/// Shared table of per-thread locks.
///
/// Entries no task holds or awaits are pruned whenever a lock is acquired.
#[derive(Clone, Debug, Default)]
pub struct Locks {
    table: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl Locks {
    /// Acquire the lock for `thread_id`, waiting for any current holder.
    pub async fn acquire(&self, thread_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            table.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(table.entry(thread_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Number of threads with a live lock entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` when no thread has a live lock entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Options for [`CredentialService::create_proposal`].
#[derive(Clone, Debug, Default)]
pub struct ProposeOptions {
    /// Connection to the issuer.
    pub connection_id: String,

    /// What is proposed.
    pub proposal: Proposal,

    /// Auto-accept override for the new record.
    pub auto_accept: Option<AutoAccept>,
}

/// Options for [`CredentialService::create_offer`].
#[derive(Clone, Debug, Default)]
pub struct OfferOptions {
    /// Connection to the holder. `None` for a connection-less offer.
    pub connection_id: Option<String>,

    /// Credential definition the credential is issued against.
    pub credential_definition_id: String,

    /// Offered attributes and descriptive fields.
    pub details: OfferDetails,

    /// Auto-accept override for the new record.
    pub auto_accept: Option<AutoAccept>,
}

/// Options for [`CredentialService::create_offer_for_proposal`].
#[derive(Clone, Debug, Default)]
pub struct ProposalOfferOptions {
    /// The issuer's `ProposalReceived` record.
    pub exchange_id: String,

    /// Credential definition to offer. Defaults to the one proposed.
    pub credential_definition_id: Option<String>,

    /// Offered attributes and descriptive fields. When no attributes are
    /// given, the proposed attributes are offered.
    pub details: OfferDetails,

    /// Auto-accept override for the record.
    pub auto_accept: Option<AutoAccept>,
}

/// Options for [`CredentialService::create_request`].
#[derive(Clone, Debug, Default)]
pub struct AcceptOfferOptions {
    /// The holder's `OfferReceived` record.
    pub exchange_id: String,

    /// DID to request the credential for. Defaults to the connection's DID.
    pub holder_did: Option<String>,

    /// Auto-accept override for the record.
    pub auto_accept: Option<AutoAccept>,
}

impl AcceptOfferOptions {
    /// Accept the offer on `exchange_id` with defaults.
    #[must_use]
    pub fn new(exchange_id: impl Into<String>) -> Self {
        Self {
            exchange_id: exchange_id.into(),
            ..Self::default()
        }
    }
}

/// Options for [`CredentialService::create_credential`].
#[derive(Clone, Debug, Default)]
pub struct AcceptRequestOptions {
    /// The issuer's `RequestReceived` record.
    pub exchange_id: String,

    /// Comment carried by the credential message.
    pub comment: Option<String>,

    /// Auto-accept override for the record.
    pub auto_accept: Option<AutoAccept>,
}

impl AcceptRequestOptions {
    /// Accept the request on `exchange_id` with defaults.
    #[must_use]
    pub fn new(exchange_id: impl Into<String>) -> Self {
        Self {
            exchange_id: exchange_id.into(),
            ..Self::default()
        }
    }
}

/// Options for [`CredentialService::create_decline`].
#[derive(Clone, Debug, Default)]
pub struct DeclineOptions {
    /// The holder's `OfferReceived` record.
    pub exchange_id: String,

    /// Reason recorded on the exchange and sent to the issuer.
    pub reason: Option<String>,
}

// Offer payload fields the engine reads.
#[derive(Debug, Deserialize)]
struct OfferRef {
    schema_id: String,
    cred_def_id: String,
}

// Credential payload fields the engine reads.
#[derive(Debug, Deserialize)]
struct CredentialRef {
    schema_id: String,
    cred_def_id: String,
    rev_reg_id: Option<String>,
}

fn parse<T: DeserializeOwned>(json: &str, what: &str) -> Result<T> {
    serde_json::from_str(json).map_err(|e| invalid!("malformed {what} payload: {e}"))
}

/// The credential-exchange state machine for one protocol family.
#[derive(Clone, Debug)]
pub struct CredentialService<P, C> {
    provider: P,
    config: Arc<Config>,
    locks: Locks,
    codec: PhantomData<C>,
}

impl<P: Provider, C: Codec> CredentialService<P, C> {
    /// Create a service sharing `locks` with every other service of the
    /// agent.
    #[must_use]
    pub const fn new(provider: P, config: Arc<Config>, locks: Locks) -> Self {
        Self {
            provider,
            config,
            locks,
            codec: PhantomData,
        }
    }

    /// The provider the service was created with.
    pub const fn provider(&self) -> &P {
        &self.provider
    }

    /// The service's configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The exchange record with id `exchange_id`.
    ///
    /// # Errors
    ///
    /// Returns a `NotFound` error if there is no such record.
    pub async fn exchange(&self, exchange_id: &str) -> Result<Exchange> {
        self.repository().get_by_id(exchange_id).await
    }

    /// The stored message of `kind` on exchange `exchange_id`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the record does not exist or the stored message
    /// cannot be read.
    pub async fn find_message(&self, exchange_id: &str, kind: Kind) -> Result<Option<Message>> {
        let exchange = self.exchange(exchange_id).await?;
        let type_uri = message::type_uri(exchange.protocol_version, kind);
        let Some(value) = MessageStore::find_message(&self.provider, exchange_id, type_uri).await?
        else {
            return Ok(None);
        };
        Message::from_value(value).map(Some)
    }

    /// Process a problem report from the other party: the exchange on the
    /// report's thread is declined.
    ///
    /// # Errors
    ///
    /// Returns a `NotFound` error when no exchange is on the thread, and an
    /// `InvalidState` error when the exchange has already finished.
    #[instrument(level = "debug", skip(self))]
    pub async fn process_problem_report(&self, inbound: &InboundMessage) -> Result<Exchange> {
        debug!("process_problem_report");

        let message = &inbound.message;
        let _guard = self.locks.acquire(message.thread_id()).await;

        let mut exchange = self
            .find_bound(message.thread_id(), None, inbound.connection_id())
            .await?
            .ok_or_else(|| not_found!("exchange on thread {}", message.thread_id()))?;
        exchange.assert_version(C::VERSION)?;
        if exchange.state.is_terminal() {
            return Err(Error::InvalidState {
                exchange_id: exchange.id.clone(),
                current: exchange.state,
                expected: vec![],
            });
        }

        exchange.error_message =
            Some(message.comment().unwrap_or("problem reported by the other party").to_string());
        self.save_message(&exchange, MessageRole::Receiver, message).await?;
        self.update_state(&mut exchange, State::Declined).await?;
        Ok(exchange)
    }

    fn repository(&self) -> Repository<'_, P> {
        Repository::new(&self.provider)
    }

    // The record on `thread_id` bound to `connection_id`, or one still
    // carrying the connection-less placeholder. Without a connection the
    // thread alone decides.
    async fn find_bound(
        &self, thread_id: &str, role: Option<Role>, connection_id: Option<&str>,
    ) -> Result<Option<Exchange>> {
        let repository = self.repository();
        let Some(connection_id) = connection_id else {
            return repository.find_by_thread_role_and_connection(thread_id, role, None).await;
        };
        if let Some(exchange) =
            repository.find_by_thread_role_and_connection(thread_id, role, Some(connection_id)).await?
        {
            return Ok(Some(exchange));
        }
        let placeholder = self.config.connectionless_id.as_str();
        repository.find_by_thread_role_and_connection(thread_id, role, Some(placeholder)).await
    }

    // Take the lock for the record's thread and re-read the record inside it.
    async fn lock_record(&self, exchange_id: &str) -> Result<(OwnedMutexGuard<()>, Exchange)> {
        let thread_id = self.exchange(exchange_id).await?.thread_id;
        let guard = self.locks.acquire(&thread_id).await;
        let exchange = self.exchange(exchange_id).await?;
        Ok((guard, exchange))
    }

    // Persist a new record and announce it.
    async fn create(&self, exchange: &Exchange) -> Result<()> {
        self.repository().save(exchange).await?;
        EventBus::publish(&self.provider, Event::created(exchange.clone()));
        debug!(exchange_id = %exchange.id, thread_id = %exchange.thread_id, state = %exchange.state, "exchange created");
        Ok(())
    }

    // The only path by which an existing record changes state.
    async fn update_state(&self, exchange: &mut Exchange, state: State) -> Result<()> {
        let mut updated = exchange.clone();
        let previous = updated.transition(state)?;
        self.repository().update(&updated).await?;
        *exchange = updated;

        EventBus::publish(&self.provider, Event::transitioned(exchange.clone(), previous));
        debug!(exchange_id = %exchange.id, thread_id = %exchange.thread_id, %previous, state = %exchange.state, "exchange updated");
        Ok(())
    }

    async fn save_message(
        &self, exchange: &Exchange, role: MessageRole, message: &Message,
    ) -> Result<()> {
        MessageStore::save_message(&self.provider, &exchange.id, role, message).await?;
        Ok(())
    }

    async fn load_message(&self, exchange: &Exchange, kind: Kind) -> Result<Message> {
        let type_uri = message::type_uri(exchange.protocol_version, kind);
        let value = MessageStore::find_message(&self.provider, &exchange.id, type_uri)
            .await?
            .ok_or_else(|| not_found!("{kind} message for exchange {}", exchange.id))?;
        Message::from_value(value)
    }

    fn attributes(message: &Message) -> Vec<PreviewAttribute> {
        C::preview(message).unwrap_or_default()
    }
}

//! Issuer-side operations.

use tracing::{debug, info, instrument};

use super::{
    AcceptRequestOptions, CredentialService, OfferOptions, OfferRef, ProposalOfferOptions, parse,
};
use crate::core::generate;
use crate::dispatch::InboundMessage;
use crate::exchange::{Exchange, Role, State};
use crate::message::{Codec, Header, Kind, Message, OfferDetails};
use crate::provider::{Anoncreds, MessageRole, Provider, Registry};
use crate::{Result, invalid, not_found};

impl<P: Provider, C: Codec> CredentialService<P, C> {
    /// Process a proposal from a holder, opening an issuer record on the
    /// proposal's thread.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMessage` when the proposal arrives without a ready
    /// connection or its thread already has an issuer record.
    #[instrument(level = "debug", skip(self))]
    pub async fn process_proposal(&self, inbound: &InboundMessage) -> Result<Exchange> {
        debug!("process_proposal");

        let message = &inbound.message;
        if message.kind() != Kind::Propose || message.version() != C::VERSION {
            return Err(invalid!("expected {} proposal, found {}", C::VERSION, message.type_uri()));
        }
        let connection = inbound.connection()?;
        let proposed_definition = C::proposed_definition(message)?;

        let thread_id = message.thread_id();
        let _guard = self.locks.acquire(thread_id).await;

        let repository = self.repository();
        if let Some(existing) =
            repository.find_by_thread_role_and_connection(thread_id, Some(Role::Issuer), None).await?
        {
            return Err(invalid!("thread {thread_id} already has exchange {}", existing.id));
        }

        let mut exchange = Exchange::new(
            Role::Issuer,
            C::VERSION,
            State::ProposalReceived,
            thread_id,
            &connection.id,
        );
        exchange.parent_thread_id = message.parent_thread_id().map(ToString::to_string);
        exchange.credential_attributes = Self::attributes(message);
        exchange.credential_definition_id = proposed_definition;

        self.save_message(&exchange, MessageRole::Receiver, message).await?;
        self.create(&exchange).await?;
        Ok(exchange)
    }

    /// Offer a credential. The offer always opens a new thread; use
    /// [`CredentialService::create_offer_for_proposal`] to answer a proposal
    /// on its own thread.
    ///
    /// # Errors
    ///
    /// Returns `External` when the credential definition cannot be resolved
    /// or the offer cannot be created.
    #[instrument(level = "debug", skip(self))]
    pub async fn create_offer(&self, options: OfferOptions) -> Result<(Message, Exchange)> {
        debug!("create_offer");

        let payload = self.offer_payload(&options.credential_definition_id).await?;

        let connection_id = match options.connection_id {
            Some(id) => id,
            None => {
                info!(cred_def_id = %options.credential_definition_id, "creating connection-less offer");
                self.config.connectionless_id.clone()
            }
        };

        let thread_id = generate::thread_id();
        let _guard = self.locks.acquire(&thread_id).await;

        let mut exchange =
            Exchange::new(Role::Issuer, C::VERSION, State::OfferSent, &thread_id, connection_id);
        exchange.auto_accept = options.auto_accept;
        exchange.credential_attributes.clone_from(&options.details.attributes);
        exchange.credential_definition_id = Some(options.credential_definition_id);

        let message = C::offer(Header::opening(&thread_id), &payload, &options.details);
        self.save_message(&exchange, MessageRole::Sender, &message).await?;
        self.create(&exchange).await?;

        Ok((message, exchange))
    }

    /// Answer a received proposal with an offer on the proposal's thread.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the record holds an unanswered proposal,
    /// `InvalidMessage` when neither the options nor the proposal name a
    /// credential definition, and `External` when a collaborator fails.
    #[instrument(level = "debug", skip(self))]
    pub async fn create_offer_for_proposal(
        &self, options: ProposalOfferOptions,
    ) -> Result<(Message, Exchange)> {
        debug!("create_offer_for_proposal");

        let (_guard, mut exchange) = self.lock_record(&options.exchange_id).await?;
        exchange.assert_version(C::VERSION)?;
        exchange.assert_role(Role::Issuer)?;
        exchange.assert_state(&[State::ProposalReceived])?;

        let Some(cred_def_id) =
            options.credential_definition_id.or_else(|| exchange.credential_definition_id.clone())
        else {
            return Err(invalid!("no credential definition for exchange {}", exchange.id));
        };
        let payload = self.offer_payload(&cred_def_id).await?;

        let mut details = options.details;
        if details.attributes.is_empty() {
            details.attributes.clone_from(&exchange.credential_attributes);
        }

        exchange.credential_attributes.clone_from(&details.attributes);
        exchange.credential_definition_id = Some(cred_def_id);
        if options.auto_accept.is_some() {
            exchange.auto_accept = options.auto_accept;
        }

        let message = C::offer(Header::reply(&exchange.thread_id), &payload, &details);
        self.save_message(&exchange, MessageRole::Sender, &message).await?;
        self.update_state(&mut exchange, State::OfferSent).await?;

        Ok((message, exchange))
    }

    /// Process a credential request. The request either answers the
    /// issuer's offer or opens a new exchange.
    ///
    /// # Errors
    ///
    /// Returns `AttachmentMissing` or `FormatMissing` for a request without a
    /// usable payload, `InvalidMessage` without a ready connection or when
    /// the thread's offer is bound to another connection, and `InvalidState`
    /// when the thread's record is not awaiting a request.
    #[instrument(level = "debug", skip(self))]
    pub async fn process_request(&self, inbound: &InboundMessage) -> Result<Exchange> {
        debug!("process_request");

        let message = &inbound.message;
        C::payload(message, Kind::Request)?;
        let connection = inbound.connection()?;

        let thread_id = message.thread_id();
        let _guard = self.locks.acquire(thread_id).await;

        let existing = self.find_bound(thread_id, Some(Role::Issuer), Some(&connection.id)).await?;

        if let Some(mut exchange) = existing {
            exchange.assert_version(C::VERSION)?;
            exchange.assert_state(&[State::OfferSent])?;

            exchange.connection_id.clone_from(&connection.id);
            self.save_message(&exchange, MessageRole::Receiver, message).await?;
            self.update_state(&mut exchange, State::RequestReceived).await?;
            return Ok(exchange);
        }

        // an offer on this thread belongs to another connection
        if self
            .repository()
            .find_by_thread_role_and_connection(thread_id, Some(Role::Issuer), None)
            .await?
            .is_some()
        {
            return Err(invalid!("exchange on thread {thread_id} is bound to another connection"));
        }

        let exchange = Exchange::new(
            Role::Issuer,
            C::VERSION,
            State::RequestReceived,
            thread_id,
            &connection.id,
        );
        self.save_message(&exchange, MessageRole::Receiver, message).await?;
        self.create(&exchange).await?;
        Ok(exchange)
    }

    /// Accept a request by issuing the credential.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the record holds an unanswered request,
    /// `NotFound` when the offer or request was never stored, and `External`
    /// when a collaborator fails. The record is unchanged on error.
    #[instrument(level = "debug", skip(self))]
    pub async fn create_credential(&self, options: AcceptRequestOptions) -> Result<Message> {
        debug!("create_credential");

        let (_guard, mut exchange) = self.lock_record(&options.exchange_id).await?;
        exchange.assert_version(C::VERSION)?;
        exchange.assert_role(Role::Issuer)?;
        exchange.assert_state(&[State::RequestReceived])?;

        let offer_message = self.load_message(&exchange, Kind::Offer).await?;
        let request_message = self.load_message(&exchange, Kind::Request).await?;
        let offer_payload = C::payload(&offer_message, Kind::Offer)?;
        let request_payload = C::payload(&request_message, Kind::Request)?;
        let offer: OfferRef = parse(&offer_payload, "offer")?;

        let definition = Registry::definition(&self.provider, &offer.cred_def_id).await?;
        let revocation = Registry::revocation(&self.provider, &offer.cred_def_id).await?;
        let credential = Anoncreds::create_credential(
            &self.provider,
            &definition,
            &offer_payload,
            &request_payload,
            &exchange.claims(),
            revocation.as_ref(),
        )
        .await?;

        if options.auto_accept.is_some() {
            exchange.auto_accept = options.auto_accept;
        }

        let message = C::issue(
            Header::reply(&exchange.thread_id),
            &credential,
            options.comment,
            &offer_message,
        );
        self.save_message(&exchange, MessageRole::Sender, &message).await?;
        self.update_state(&mut exchange, State::CredentialIssued).await?;

        Ok(message)
    }

    /// Process the holder's acknowledgement, completing the exchange.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when no issuer record is on the thread and
    /// `InvalidState` unless the credential has been issued.
    #[instrument(level = "debug", skip(self))]
    pub async fn process_ack(&self, inbound: &InboundMessage) -> Result<Exchange> {
        debug!("process_ack");

        let message = &inbound.message;
        if message.kind() != Kind::Ack || message.version() != C::VERSION {
            return Err(invalid!("expected {} ack, found {}", C::VERSION, message.type_uri()));
        }

        let thread_id = message.thread_id();
        let _guard = self.locks.acquire(thread_id).await;

        let mut exchange = self
            .repository()
            .find_by_thread_role_and_connection(thread_id, Some(Role::Issuer), inbound.connection_id())
            .await?
            .ok_or_else(|| not_found!("issuer exchange on thread {thread_id}"))?;
        exchange.assert_version(C::VERSION)?;
        exchange.assert_state(&[State::CredentialIssued])?;

        self.save_message(&exchange, MessageRole::Receiver, message).await?;
        self.update_state(&mut exchange, State::Done).await?;
        Ok(exchange)
    }

    // Resolve the issuer's definition and create an offer payload for it.
    async fn offer_payload(&self, cred_def_id: &str) -> Result<String> {
        let definition = Registry::definition(&self.provider, cred_def_id).await?;
        let payload = Anoncreds::create_offer(
            &self.provider,
            &definition.schema_id,
            &definition.credential_definition_id,
            &definition.key_correctness_proof,
        )
        .await?;
        Ok(payload)
    }
}

impl OfferOptions {
    /// Offer a credential for `cred_def_id` with the given attributes.
    #[must_use]
    pub fn new(cred_def_id: impl Into<String>, details: OfferDetails) -> Self {
        Self {
            connection_id: None,
            credential_definition_id: cred_def_id.into(),
            details,
            auto_accept: None,
        }
    }

    /// Send the offer over `connection_id`.
    #[must_use]
    pub fn connection(mut self, connection_id: impl Into<String>) -> Self {
        self.connection_id = Some(connection_id.into());
        self
    }
}

//! Holder-side operations.

use tracing::{debug, info, instrument};

use super::{
    AcceptOfferOptions, CREDENTIAL_RECORD_TYPE, CredentialRef, CredentialService, DECLINE_CODE,
    DeclineOptions, OfferRef, ProposeOptions, parse,
};
use crate::core::generate;
use crate::dispatch::InboundMessage;
use crate::exchange::{CredentialBinding, Exchange, Role, State};
use crate::message::{Codec, Header, Kind, Message};
use crate::provider::{Anoncreds, Connections, Ledger, MessageRole, Provider, Wallet};
use crate::{Result, not_found};

impl<P: Provider, C: Codec> CredentialService<P, C> {
    /// Propose a credential to an issuer. The proposal opens a new thread.
    ///
    /// # Errors
    ///
    /// Returns an `External` error if the message or record cannot be stored.
    #[instrument(level = "debug", skip(self))]
    pub async fn create_proposal(&self, options: ProposeOptions) -> Result<(Message, Exchange)> {
        debug!("create_proposal");

        let thread_id = generate::thread_id();
        let _guard = self.locks.acquire(&thread_id).await;

        let mut exchange = Exchange::new(
            Role::Holder,
            C::VERSION,
            State::ProposalSent,
            &thread_id,
            &options.connection_id,
        );
        exchange.auto_accept = options.auto_accept;
        exchange.credential_attributes.clone_from(&options.proposal.attributes);
        exchange.credential_definition_id.clone_from(&options.proposal.credential_definition_id);

        let message = C::propose(Header::opening(&thread_id), &options.proposal);
        self.save_message(&exchange, MessageRole::Sender, &message).await?;
        self.create(&exchange).await?;

        Ok((message, exchange))
    }

    /// Process an offer. The offer either answers the holder's own proposal or
    /// opens a new exchange.
    ///
    /// # Errors
    ///
    /// Returns `FormatMissing` or `AttachmentMissing` for an offer without a
    /// usable payload, `InvalidState` when the thread's record is not
    /// awaiting an offer, and `InvalidMessage` when a new exchange would need
    /// a connection the inbound context lacks.
    #[instrument(level = "debug", skip(self))]
    pub async fn process_offer(&self, inbound: &InboundMessage) -> Result<Exchange> {
        debug!("process_offer");

        let message = &inbound.message;
        let payload = C::payload(message, Kind::Offer)?;
        let offer: OfferRef = parse(&payload, "offer")?;

        let thread_id = message.thread_id();
        let _guard = self.locks.acquire(thread_id).await;

        let existing = self
            .repository()
            .find_by_thread_role_and_connection(thread_id, Some(Role::Holder), inbound.connection_id())
            .await?;

        if let Some(mut exchange) = existing {
            exchange.assert_version(C::VERSION)?;
            exchange.assert_state(&[State::ProposalSent])?;

            exchange.credential_attributes = Self::attributes(message);
            exchange.credential_definition_id = Some(offer.cred_def_id);
            self.save_message(&exchange, MessageRole::Receiver, message).await?;
            self.update_state(&mut exchange, State::OfferReceived).await?;
            return Ok(exchange);
        }

        let connection = inbound.connection()?;
        let mut exchange =
            Exchange::new(Role::Holder, C::VERSION, State::OfferReceived, thread_id, &connection.id);
        exchange.parent_thread_id =
            Some(message.parent_thread_id().unwrap_or(thread_id).to_string());
        exchange.credential_attributes = Self::attributes(message);
        exchange.credential_definition_id = Some(offer.cred_def_id);
        debug!(schema_id = %offer.schema_id, "offer received");

        self.save_message(&exchange, MessageRole::Receiver, message).await?;
        self.create(&exchange).await?;
        Ok(exchange)
    }

    /// Accept an offer by building a credential request.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState`, `InvalidRole`, or `ProtocolVersionMismatch`
    /// when the record cannot accept an offer, `NotFound` when the offer was
    /// never stored, and `External` when a collaborator fails. The record is
    /// unchanged on error.
    #[instrument(level = "debug", skip(self))]
    pub async fn create_request(&self, options: AcceptOfferOptions) -> Result<Message> {
        debug!("create_request");

        let (_guard, mut exchange) = self.lock_record(&options.exchange_id).await?;
        exchange.assert_version(C::VERSION)?;
        exchange.assert_role(Role::Holder)?;
        exchange.assert_state(&[State::OfferReceived])?;

        let offer_message = self.load_message(&exchange, Kind::Offer).await?;
        let offer_payload = C::payload(&offer_message, Kind::Offer)?;
        let offer: OfferRef = parse(&offer_payload, "offer")?;

        let holder_did = match options.holder_did {
            Some(did) => did,
            None => Connections::connection(&self.provider, &exchange.connection_id).await?.did,
        };
        let credential_definition =
            Ledger::credential_definition(&self.provider, &offer.cred_def_id).await?;
        let link_secret_id = Wallet::link_secret_id(&self.provider).await?;
        let request = Anoncreds::create_request(
            &self.provider,
            &holder_did,
            &credential_definition,
            &link_secret_id,
            &offer_payload,
        )
        .await?;

        exchange.request_metadata = Some(request.metadata);
        exchange.credential_definition_id = Some(offer.cred_def_id);
        if let Some(attributes) = C::preview(&offer_message) {
            exchange.credential_attributes = attributes;
        }
        if options.auto_accept.is_some() {
            exchange.auto_accept = options.auto_accept;
        }

        let message =
            C::request(Header::reply(&exchange.thread_id), &request.request, &offer_message);
        self.save_message(&exchange, MessageRole::Sender, &message).await?;
        self.update_state(&mut exchange, State::RequestSent).await?;

        Ok(message)
    }

    /// Process an issued credential: the credential is verified and stored
    /// through the anoncreds collaborator and bound to the exchange.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when no holder record is on the thread,
    /// `InvalidState` unless the record is awaiting the credential, and
    /// `External` when a collaborator fails.
    #[instrument(level = "debug", skip(self))]
    pub async fn process_issue(&self, inbound: &InboundMessage) -> Result<Exchange> {
        debug!("process_issue");

        let message = &inbound.message;
        let payload = C::payload(message, Kind::Issue)?;
        let credential: CredentialRef = parse(&payload, "credential")?;

        let thread_id = message.thread_id();
        let _guard = self.locks.acquire(thread_id).await;

        let mut exchange = self
            .repository()
            .find_by_thread_role_and_connection(thread_id, Some(Role::Holder), inbound.connection_id())
            .await?
            .ok_or_else(|| not_found!("holder exchange on thread {thread_id}"))?;
        exchange.assert_version(C::VERSION)?;
        exchange.assert_state(&[State::RequestSent])?;

        let Some(request_metadata) = exchange.request_metadata.clone() else {
            return Err(not_found!("request metadata for exchange {}", exchange.id));
        };

        Ledger::schema(&self.provider, &credential.schema_id).await?;
        let credential_definition =
            Ledger::credential_definition(&self.provider, &credential.cred_def_id).await?;
        let revocation_registry = match &credential.rev_reg_id {
            Some(id) => Some(Ledger::revocation_registry_definition(&self.provider, id).await?),
            None => None,
        };
        let link_secret_id = Wallet::link_secret_id(&self.provider).await?;
        let credential_id = Anoncreds::process_credential(
            &self.provider,
            &payload,
            &request_metadata,
            &link_secret_id,
            &credential_definition,
            revocation_registry.as_deref(),
        )
        .await?;

        exchange.credentials.push(CredentialBinding::new(CREDENTIAL_RECORD_TYPE, credential_id));
        self.save_message(&exchange, MessageRole::Receiver, message).await?;
        self.update_state(&mut exchange, State::CredentialReceived).await?;

        Ok(exchange)
    }

    /// Acknowledge a stored credential, completing the exchange.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the record has received its credential.
    #[instrument(level = "debug", skip(self))]
    pub async fn create_ack(&self, exchange_id: &str) -> Result<Message> {
        debug!("create_ack");

        let (_guard, mut exchange) = self.lock_record(exchange_id).await?;
        exchange.assert_version(C::VERSION)?;
        exchange.assert_role(Role::Holder)?;
        exchange.assert_state(&[State::CredentialReceived])?;

        let message = C::ack(Header::reply(&exchange.thread_id));
        self.save_message(&exchange, MessageRole::Sender, &message).await?;
        self.update_state(&mut exchange, State::Done).await?;

        Ok(message)
    }

    /// Decline an offer. The exchange is declined and a problem report for
    /// the issuer is returned.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the record holds an unanswered offer.
    #[instrument(level = "debug", skip(self))]
    pub async fn create_decline(&self, options: DeclineOptions) -> Result<Message> {
        debug!("create_decline");

        let (_guard, mut exchange) = self.lock_record(&options.exchange_id).await?;
        exchange.assert_version(C::VERSION)?;
        exchange.assert_role(Role::Holder)?;
        exchange.assert_state(&[State::OfferReceived])?;

        let reason = options.reason.unwrap_or_else(|| "offer declined".to_string());
        info!(exchange_id = %exchange.id, %reason, "declining offer");

        exchange.error_message = Some(reason.clone());
        let message = C::problem_report(Header::reply(&exchange.thread_id), DECLINE_CODE, &reason);
        self.save_message(&exchange, MessageRole::Sender, &message).await?;
        self.update_state(&mut exchange, State::Declined).await?;

        Ok(message)
    }
}

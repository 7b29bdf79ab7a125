//! # Credentials Commands
//!
//! The application's entry points. Each command runs a service operation,
//! sends the resulting message to the other party, and returns the updated
//! exchange record.

use tracing::{debug, instrument};

use crate::exchange::Exchange;
use crate::message::{Codec, Kind, Message};
use crate::provider::{Connection, Connections, MessageSender, Provider};
use crate::service::{
    AcceptOfferOptions, AcceptRequestOptions, CredentialService, DeclineOptions, OfferOptions,
    ProposalOfferOptions, ProposeOptions,
};
use crate::{Result, invalid};

/// Credential-exchange commands for one protocol family.
#[derive(Clone, Debug)]
pub struct Credentials<P, C> {
    service: CredentialService<P, C>,
}

impl<P: Provider, C: Codec> Credentials<P, C> {
    /// Create commands over `service`.
    #[must_use]
    pub const fn new(service: CredentialService<P, C>) -> Self {
        Self { service }
    }

    /// The underlying service.
    pub const fn service(&self) -> &CredentialService<P, C> {
        &self.service
    }

    /// Propose a credential to an issuer.
    ///
    /// # Errors
    ///
    /// Returns any error of `create_proposal`, or `External` if the proposal
    /// cannot be sent.
    #[instrument(level = "debug", skip(self))]
    pub async fn propose(&self, options: ProposeOptions) -> Result<Exchange> {
        debug!("propose");

        let (message, exchange) = self.service.create_proposal(options).await?;
        self.send(&message, &exchange.connection_id).await?;
        Ok(exchange)
    }

    /// Offer a credential over a connection.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMessage` when the options name no connection, any
    /// error of `create_offer`, or `External` if the offer cannot be sent.
    #[instrument(level = "debug", skip(self))]
    pub async fn offer(&self, options: OfferOptions) -> Result<Exchange> {
        debug!("offer");

        if options.connection_id.is_none() {
            return Err(invalid!("a connection is required to send an offer"));
        }
        let (message, exchange) = self.service.create_offer(options).await?;
        self.send(&message, &exchange.connection_id).await?;
        Ok(exchange)
    }

    /// Answer a received proposal with an offer on its thread.
    ///
    /// # Errors
    ///
    /// Returns any error of `create_offer_for_proposal`, or `External` if the
    /// offer cannot be sent.
    #[instrument(level = "debug", skip(self))]
    pub async fn offer_for_proposal(&self, options: ProposalOfferOptions) -> Result<Exchange> {
        debug!("offer_for_proposal");

        let (message, exchange) = self.service.create_offer_for_proposal(options).await?;
        self.send(&message, &exchange.connection_id).await?;
        Ok(exchange)
    }

    /// Accept a received offer by requesting the credential.
    ///
    /// # Errors
    ///
    /// Returns any error of `create_request`, or `External` if the request
    /// cannot be sent.
    #[instrument(level = "debug", skip(self))]
    pub async fn accept_offer(&self, options: AcceptOfferOptions) -> Result<Exchange> {
        debug!("accept_offer");

        let exchange_id = options.exchange_id.clone();
        let message = self.service.create_request(options).await?;
        self.deliver(&message, &exchange_id).await
    }

    /// Decline a received offer, notifying the issuer.
    ///
    /// # Errors
    ///
    /// Returns any error of `create_decline`, or `External` if the problem
    /// report cannot be sent.
    #[instrument(level = "debug", skip(self))]
    pub async fn decline_offer(&self, options: DeclineOptions) -> Result<Exchange> {
        debug!("decline_offer");

        let exchange_id = options.exchange_id.clone();
        let message = self.service.create_decline(options).await?;
        self.deliver(&message, &exchange_id).await
    }

    /// Accept a received request by issuing the credential.
    ///
    /// # Errors
    ///
    /// Returns any error of `create_credential`, or `External` if the
    /// credential cannot be sent.
    #[instrument(level = "debug", skip(self))]
    pub async fn accept_request(&self, options: AcceptRequestOptions) -> Result<Exchange> {
        debug!("accept_request");

        let exchange_id = options.exchange_id.clone();
        let message = self.service.create_credential(options).await?;
        self.deliver(&message, &exchange_id).await
    }

    /// Acknowledge a received credential, completing the exchange.
    ///
    /// # Errors
    ///
    /// Returns any error of `create_ack`, or `External` if the ack cannot be
    /// sent.
    #[instrument(level = "debug", skip(self))]
    pub async fn accept_credential(&self, exchange_id: &str) -> Result<Exchange> {
        debug!("accept_credential");

        let message = self.service.create_ack(exchange_id).await?;
        self.deliver(&message, exchange_id).await
    }

    /// The exchange record with id `exchange_id`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if there is no such record.
    pub async fn exchange(&self, exchange_id: &str) -> Result<Exchange> {
        self.service.exchange(exchange_id).await
    }

    /// The stored proposal of an exchange, if any.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if there is no such exchange.
    pub async fn find_proposal_message(&self, exchange_id: &str) -> Result<Option<Message>> {
        self.service.find_message(exchange_id, Kind::Propose).await
    }

    /// The stored offer of an exchange, if any.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if there is no such exchange.
    pub async fn find_offer_message(&self, exchange_id: &str) -> Result<Option<Message>> {
        self.service.find_message(exchange_id, Kind::Offer).await
    }

    /// The stored request of an exchange, if any.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if there is no such exchange.
    pub async fn find_request_message(&self, exchange_id: &str) -> Result<Option<Message>> {
        self.service.find_message(exchange_id, Kind::Request).await
    }

    /// The stored credential message of an exchange, if any.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if there is no such exchange.
    pub async fn find_credential_message(&self, exchange_id: &str) -> Result<Option<Message>> {
        self.service.find_message(exchange_id, Kind::Issue).await
    }

    // Send `message` for an existing exchange and return the updated record.
    async fn deliver(&self, message: &Message, exchange_id: &str) -> Result<Exchange> {
        let exchange = self.service.exchange(exchange_id).await?;
        self.send(message, &exchange.connection_id).await?;
        Ok(exchange)
    }

    async fn send(&self, message: &Message, connection_id: &str) -> Result<Connection> {
        let provider = self.service.provider();
        let connection = Connections::connection(provider, connection_id).await?;
        MessageSender::send(provider, message, &connection).await?;
        Ok(connection)
    }
}

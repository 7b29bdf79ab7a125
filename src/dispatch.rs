//! # Dispatcher
//!
//! Routes a decoded inbound message to the handler for its kind and protocol
//! family. The message union is closed, so every type the engine can decode
//! has exactly one handler.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::config::Config;
use crate::exchange::AutoAccept;
use crate::handlers::{self, Context};
use crate::message::{Message, V1, V2};
use crate::provider::{Connection, Provider};
use crate::service::{CredentialService, Locks};
use crate::{Result, invalid};

/// A decrypted inbound message and the connection it arrived on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    /// The message.
    pub message: Message,

    /// The connection the message arrived on, if any.
    pub connection: Option<Connection>,
}

impl InboundMessage {
    /// Wrap a message received over `connection`.
    #[must_use]
    pub const fn new(message: Message, connection: Option<Connection>) -> Self {
        Self {
            message,
            connection,
        }
    }

    /// Decode a plaintext message received over `connection`.
    ///
    /// # Errors
    ///
    /// Returns `UnroutableMessage` for an unknown message type and
    /// `InvalidMessage` for a malformed message.
    pub fn decode(plaintext: &str, connection: Option<Connection>) -> Result<Self> {
        Ok(Self::new(Message::decode(plaintext)?, connection))
    }

    /// Id of the connection the message arrived on, if any.
    #[must_use]
    pub fn connection_id(&self) -> Option<&str> {
        self.connection.as_ref().map(|c| c.id.as_str())
    }

    /// The connection the message arrived on, which must be complete.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMessage` when the message arrived without a
    /// connection or over one that is not yet complete.
    pub fn connection(&self) -> Result<&Connection> {
        let Some(connection) = &self.connection else {
            return Err(invalid!("{} arrived without a connection", self.message.type_uri()));
        };
        if !connection.is_ready() {
            return Err(invalid!("connection {} is not complete", connection.id));
        }
        Ok(connection)
    }
}

/// A message to be sent to the other party.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    /// The message.
    pub message: Message,

    /// The connection to send it over.
    pub connection: Connection,
}

/// Inbound message dispatcher.
#[derive(Clone, Debug)]
pub struct Dispatcher<P> {
    v1: CredentialService<P, V1>,
    v2: CredentialService<P, V2>,
    auto_accept: AutoAccept,
}

impl<P: Provider> Dispatcher<P> {
    /// Create a dispatcher. The default auto-accept policy is taken from
    /// `config`.
    #[must_use]
    pub fn new(provider: P, config: Arc<Config>, locks: Locks) -> Self {
        let auto_accept = config.auto_accept;
        Self {
            v1: CredentialService::new(provider.clone(), Arc::clone(&config), locks.clone()),
            v2: CredentialService::new(provider, config, locks),
            auto_accept,
        }
    }

    /// Decode and dispatch a plaintext message.
    ///
    /// # Errors
    ///
    /// Returns decoding errors and any error of the handler.
    pub async fn receive(
        &self, plaintext: &str, connection: Option<Connection>,
    ) -> Result<Option<OutboundMessage>> {
        let inbound = InboundMessage::decode(plaintext, connection)?;
        self.dispatch(&inbound).await
    }

    /// Hand `inbound` to its handler, returning the automatic response, if
    /// any.
    ///
    /// # Errors
    ///
    /// Returns the handler's error unchanged.
    #[instrument(level = "debug", skip(self))]
    pub async fn dispatch(&self, inbound: &InboundMessage) -> Result<Option<OutboundMessage>> {
        debug!(message_type = inbound.message.type_uri(), thread_id = inbound.message.thread_id(), "dispatch");

        let v1 = Context::new(&self.v1, self.auto_accept);
        let v2 = Context::new(&self.v2, self.auto_accept);

        match &inbound.message {
            Message::ProposeV1(_) => handlers::propose::handle(&v1, inbound).await,
            Message::OfferV1(_) => handlers::offer::handle(&v1, inbound).await,
            Message::RequestV1(_) => handlers::request::handle(&v1, inbound).await,
            Message::IssueV1(_) => handlers::issue::handle(&v1, inbound).await,
            Message::AckV1(_) => handlers::ack::handle(&v1, inbound).await,
            Message::ProblemReportV1(_) => handlers::problem_report::handle(&v1, inbound).await,
            Message::ProposeV2(_) => handlers::propose::handle(&v2, inbound).await,
            Message::OfferV2(_) => handlers::offer::handle(&v2, inbound).await,
            Message::RequestV2(_) => handlers::request::handle(&v2, inbound).await,
            Message::IssueV2(_) => handlers::issue::handle(&v2, inbound).await,
            Message::AckV2(_) => handlers::ack::handle(&v2, inbound).await,
            Message::ProblemReportV2(_) => handlers::problem_report::handle(&v2, inbound).await,
        }
    }
}

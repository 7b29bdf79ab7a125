//! # Handlers
//!
//! One handler per inbound message kind. A handler runs the matching
//! `process_*` operation and, when the exchange's auto-accept policy is
//! `Always`, immediately builds the next message of the protocol:
//!
//! | Received | Automatic response |
//! |----------|--------------------|
//! | proposal naming a credential definition | offer |
//! | offer    | request            |
//! | request  | credential         |
//! | credential | ack              |

pub mod ack;
pub mod issue;
pub mod offer;
pub mod problem_report;
pub mod propose;
pub mod request;

use tracing::info;

use crate::Result;
use crate::dispatch::{InboundMessage, OutboundMessage};
use crate::exchange::{AutoAccept, Exchange};
use crate::message::{Codec, Message};
use crate::provider::{Connections, Provider};
use crate::service::CredentialService;

/// What a handler needs: the service for the message's protocol family and
/// the default auto-accept policy.
#[derive(Debug)]
pub struct Context<'a, P, C> {
    service: &'a CredentialService<P, C>,
    auto_accept: AutoAccept,
}

impl<'a, P: Provider, C: Codec> Context<'a, P, C> {
    /// Create a handler context.
    #[must_use]
    pub const fn new(service: &'a CredentialService<P, C>, auto_accept: AutoAccept) -> Self {
        Self {
            service,
            auto_accept,
        }
    }

    /// Returns `true` when the next step should be taken for `exchange`
    /// without asking the application.
    #[must_use]
    pub fn accepts(&self, exchange: &Exchange) -> bool {
        let accepts = exchange.policy(self.auto_accept) == AutoAccept::Always;
        if accepts {
            info!(exchange_id = %exchange.id, state = %exchange.state, "auto-accepting");
        }
        accepts
    }

    /// Address `message` to the other party of `exchange`: over the inbound
    /// connection when there is one, else over the exchange's connection.
    ///
    /// # Errors
    ///
    /// Returns `External` when the exchange's connection cannot be resolved.
    pub async fn reply(
        &self, inbound: &InboundMessage, exchange: &Exchange, message: Message,
    ) -> Result<OutboundMessage> {
        let connection = match &inbound.connection {
            Some(connection) => connection.clone(),
            None => Connections::connection(self.service.provider(), &exchange.connection_id).await?,
        };
        Ok(OutboundMessage {
            message,
            connection,
        })
    }
}

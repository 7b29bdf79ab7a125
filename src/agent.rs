//! # Agent
//!
//! Wires a provider and configuration into the version-specific command
//! façades and the inbound dispatcher. Every service handed out by one agent
//! shares the agent's per-thread lock table.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::Result;
use crate::command::Credentials;
use crate::config::Config;
use crate::dispatch::{Dispatcher, OutboundMessage};
use crate::message::{Codec, V1, V2};
use crate::provider::{Connection, MessageSender, Provider};
use crate::service::{CredentialService, Locks};

/// A credential-exchange agent.
#[derive(Clone, Debug)]
pub struct Agent<P> {
    provider: P,
    config: Arc<Config>,
    locks: Locks,
}

impl<P: Provider> Agent<P> {
    /// Create an agent.
    #[must_use]
    pub fn new(provider: P, config: Config) -> Self {
        Self {
            provider,
            config: Arc::new(config),
            locks: Locks::default(),
        }
    }

    /// The agent's provider.
    pub const fn provider(&self) -> &P {
        &self.provider
    }

    /// The agent's configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Commands for the `issue-credential/1.0` family.
    #[must_use]
    pub fn v1(&self) -> Credentials<P, V1> {
        Credentials::new(self.service())
    }

    /// Commands for the `issue-credential/2.0` family.
    #[must_use]
    pub fn v2(&self) -> Credentials<P, V2> {
        Credentials::new(self.service())
    }

    /// The credential service for protocol family `C`.
    #[must_use]
    pub fn service<C: Codec>(&self) -> CredentialService<P, C> {
        CredentialService::new(self.provider.clone(), Arc::clone(&self.config), self.locks.clone())
    }

    /// The inbound message dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> Dispatcher<P> {
        Dispatcher::new(self.provider.clone(), Arc::clone(&self.config), self.locks.clone())
    }

    /// Receive a plaintext message: dispatch it and send any automatic
    /// response.
    ///
    /// # Errors
    ///
    /// Returns any error of decoding, of the handler, or of sending the
    /// response.
    #[instrument(level = "debug", skip(self, plaintext))]
    pub async fn receive(
        &self, plaintext: &str, connection: Option<Connection>,
    ) -> Result<Option<OutboundMessage>> {
        debug!("receive");

        let outbound = self.dispatcher().receive(plaintext, connection).await?;
        if let Some(outbound) = &outbound {
            MessageSender::send(&self.provider, &outbound.message, &outbound.connection).await?;
        }
        Ok(outbound)
    }
}

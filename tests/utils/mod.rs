#![allow(missing_docs)]
#![allow(dead_code)]

pub mod agent;

use std::sync::Once;

use rstest::fixture;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use vc_exchange::config::Config;
use vc_exchange::exchange::AutoAccept;
use vc_exchange::message::PreviewAttribute;
use vc_exchange::{Agent, Message, OutboundMessage, Result};

use self::agent::ProviderImpl;

// initalise tracing once for all tests
static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// # Panics
pub fn init_tracer() {
    INIT.call_once(|| {
        let subscriber = FmtSubscriber::builder().with_max_level(Level::ERROR).finish();
        tracing::subscriber::set_global_default(subscriber).expect("subscriber set");
    });
}

#[fixture]
pub fn issuer() -> ProviderImpl {
    ProviderImpl::issuer()
}

#[fixture]
pub fn holder() -> ProviderImpl {
    ProviderImpl::holder()
}

#[fixture]
pub fn parties() -> Parties {
    Parties::new(AutoAccept::Never, AutoAccept::Never)
}

pub fn attributes() -> Vec<PreviewAttribute> {
    vec![PreviewAttribute::new("name", "Alice"), PreviewAttribute::new("degree", "BSc")]
}

/// An issuer and a holder agent connected to each other.
pub struct Parties {
    pub issuer: Agent<ProviderImpl>,
    pub holder: Agent<ProviderImpl>,
}

impl Parties {
    pub fn new(issuer_policy: AutoAccept, holder_policy: AutoAccept) -> Self {
        Self::with_config(
            Config::default().auto_accept(issuer_policy),
            Config::default().auto_accept(holder_policy),
        )
    }

    /// Parties whose providers and agents share each side's configuration.
    pub fn with_config(issuer: Config, holder: Config) -> Self {
        Self {
            issuer: Agent::new(ProviderImpl::issuer_with(&issuer), issuer),
            holder: Agent::new(ProviderImpl::holder_with(&holder), holder),
        }
    }

    /// Deliver the issuer's last sent message to the holder.
    pub async fn to_holder(&self) -> Result<Option<OutboundMessage>> {
        let message = self.issuer.provider().last_sent();
        deliver(&self.holder, &message).await
    }

    /// Deliver the holder's last sent message to the issuer.
    pub async fn to_issuer(&self) -> Result<Option<OutboundMessage>> {
        let message = self.holder.provider().last_sent();
        deliver(&self.issuer, &message).await
    }
}

/// Hand `message` to `agent` as plaintext over its connection.
pub async fn deliver(
    agent: &Agent<ProviderImpl>, message: &Message,
) -> Result<Option<OutboundMessage>> {
    let plaintext = message.to_value()?.to_string();
    agent.receive(&plaintext, Some(agent.provider().connection())).await
}

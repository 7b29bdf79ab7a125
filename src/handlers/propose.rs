//! # Propose Handler
//!
//! Opens an issuer exchange for a holder's proposal. A proposal that names a
//! credential definition can be answered automatically.

use tracing::{debug, instrument};

use super::Context;
use crate::Result;
use crate::dispatch::{InboundMessage, OutboundMessage};
use crate::message::Codec;
use crate::provider::Provider;
use crate::service::ProposalOfferOptions;

/// Handle a proposal.
///
/// # Errors
///
/// Returns any error of `process_proposal` or, when auto-accepting,
/// `create_offer_for_proposal`.
#[instrument(level = "debug", skip(ctx))]
pub async fn handle<P: Provider, C: Codec>(
    ctx: &Context<'_, P, C>, inbound: &InboundMessage,
) -> Result<Option<OutboundMessage>> {
    debug!("propose::handle");

    let exchange = ctx.service.process_proposal(inbound).await?;
    if exchange.credential_definition_id.is_none() || !ctx.accepts(&exchange) {
        return Ok(None);
    }

    let options = ProposalOfferOptions {
        exchange_id: exchange.id.clone(),
        ..ProposalOfferOptions::default()
    };
    let (message, exchange) = ctx.service.create_offer_for_proposal(options).await?;
    ctx.reply(inbound, &exchange, message).await.map(Some)
}

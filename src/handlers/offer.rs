//! # Offer Handler

use tracing::{debug, instrument};

use super::Context;
use crate::Result;
use crate::dispatch::{InboundMessage, OutboundMessage};
use crate::message::Codec;
use crate::provider::Provider;
use crate::service::AcceptOfferOptions;

/// Handle an offer, answering with a request when auto-accepting.
///
/// # Errors
///
/// Returns any error of `process_offer` or, when auto-accepting,
/// `create_request`.
#[instrument(level = "debug", skip(ctx))]
pub async fn handle<P: Provider, C: Codec>(
    ctx: &Context<'_, P, C>, inbound: &InboundMessage,
) -> Result<Option<OutboundMessage>> {
    debug!("offer::handle");

    let exchange = ctx.service.process_offer(inbound).await?;
    if !ctx.accepts(&exchange) {
        return Ok(None);
    }

    let message = ctx.service.create_request(AcceptOfferOptions::new(&exchange.id)).await?;
    ctx.reply(inbound, &exchange, message).await.map(Some)
}

//! # Issue Handler

use tracing::{debug, instrument};

use super::Context;
use crate::Result;
use crate::dispatch::{InboundMessage, OutboundMessage};
use crate::message::Codec;
use crate::provider::Provider;

/// Handle an issued credential, acknowledging it when auto-accepting.
///
/// # Errors
///
/// Returns any error of `process_issue` or, when auto-accepting,
/// `create_ack`.
#[instrument(level = "debug", skip(ctx))]
pub async fn handle<P: Provider, C: Codec>(
    ctx: &Context<'_, P, C>, inbound: &InboundMessage,
) -> Result<Option<OutboundMessage>> {
    debug!("issue::handle");

    let exchange = ctx.service.process_issue(inbound).await?;
    if !ctx.accepts(&exchange) {
        return Ok(None);
    }

    let message = ctx.service.create_ack(&exchange.id).await?;
    ctx.reply(inbound, &exchange, message).await.map(Some)
}

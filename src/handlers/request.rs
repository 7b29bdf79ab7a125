//! # Request Handler

use tracing::{debug, instrument};

use super::Context;
use crate::Result;
use crate::dispatch::{InboundMessage, OutboundMessage};
use crate::message::Codec;
use crate::provider::Provider;
use crate::service::AcceptRequestOptions;

/// Handle a request, answering with the credential when auto-accepting.
///
/// # Errors
///
/// Returns any error of `process_request` or, when auto-accepting,
/// `create_credential`.
#[instrument(level = "debug", skip(ctx))]
pub async fn handle<P: Provider, C: Codec>(
    ctx: &Context<'_, P, C>, inbound: &InboundMessage,
) -> Result<Option<OutboundMessage>> {
    debug!("request::handle");

    let exchange = ctx.service.process_request(inbound).await?;
    if !ctx.accepts(&exchange) {
        return Ok(None);
    }

    let message = ctx.service.create_credential(AcceptRequestOptions::new(&exchange.id)).await?;
    ctx.reply(inbound, &exchange, message).await.map(Some)
}

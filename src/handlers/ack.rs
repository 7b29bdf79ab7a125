//! # Ack Handler

use tracing::{debug, instrument};

use super::Context;
use crate::Result;
use crate::dispatch::{InboundMessage, OutboundMessage};
use crate::message::Codec;
use crate::provider::Provider;

/// Handle an acknowledgement. Nothing follows it.
///
/// # Errors
///
/// Returns any error of `process_ack`.
#[instrument(level = "debug", skip(ctx))]
pub async fn handle<P: Provider, C: Codec>(
    ctx: &Context<'_, P, C>, inbound: &InboundMessage,
) -> Result<Option<OutboundMessage>> {
    debug!("ack::handle");

    ctx.service.process_ack(inbound).await?;
    Ok(None)
}

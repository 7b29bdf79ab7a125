//! # Problem Report Handler

use tracing::{debug, instrument, warn};

use super::Context;
use crate::Result;
use crate::dispatch::{InboundMessage, OutboundMessage};
use crate::message::Codec;
use crate::provider::Provider;

/// Handle a problem report by declining the exchange.
///
/// # Errors
///
/// Returns any error of `process_problem_report`.
#[instrument(level = "debug", skip(ctx))]
pub async fn handle<P: Provider, C: Codec>(
    ctx: &Context<'_, P, C>, inbound: &InboundMessage,
) -> Result<Option<OutboundMessage>> {
    debug!("problem_report::handle");

    let exchange = ctx.service.process_problem_report(inbound).await?;
    warn!(exchange_id = %exchange.id, reason = exchange.error_message.as_deref(), "exchange declined by the other party");
    Ok(None)
}

//! # Events
//!
//! A state-change notification is published for every persisted exchange
//! transition. [`Broadcaster`] is an in-memory [`EventBus`] that fans events
//! out to any number of subscribers.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::config::Config;
use crate::exchange::{Exchange, State};
use crate::provider::EventBus;

/// Default number of events retained for slow subscribers.
pub const DEFAULT_CAPACITY: usize = 64;

/// Notification that an exchange record was persisted in a new state.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Snapshot of the record as persisted.
    pub exchange: Exchange,

    /// The state the record left; `None` when the record was created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_state: Option<State>,
}

impl Event {
    /// Event for a newly created record.
    #[must_use]
    pub const fn created(exchange: Exchange) -> Self {
        Self {
            exchange,
            previous_state: None,
        }
    }

    /// Event for a record that moved out of `previous`.
    #[must_use]
    pub const fn transitioned(exchange: Exchange, previous: State) -> Self {
        Self {
            exchange,
            previous_state: Some(previous),
        }
    }

    /// The state the record entered.
    #[must_use]
    pub const fn state(&self) -> State {
        self.exchange.state
    }
}

/// In-memory event bus backed by `tokio::sync::broadcast`.
///
/// Publishing never blocks: a subscriber that falls more than `capacity`
/// events behind observes a lag on its next receive.
#[derive(Clone, Debug)]
pub struct Broadcaster {
    sender: broadcast::Sender<Event>,
    published: Arc<AtomicU64>,
}

impl Broadcaster {
    /// Create a broadcaster retaining up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            published: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Create a broadcaster sized by `config.event_capacity`.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.event_capacity)
    }

    /// Subscribe to events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Number of events published so far.
    #[must_use]
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus for Broadcaster {
    fn publish(&self, event: Event) {
        self.published.fetch_add(1, Ordering::Relaxed);

        let exchange_id = event.exchange.id.clone();
        let state = event.state();
        match self.sender.send(event) {
            Ok(receivers) => debug!(%exchange_id, %state, receivers, "event published"),
            Err(_) => trace!(%exchange_id, %state, "event published without subscribers"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{ProtocolVersion, Role};

    #[tokio::test]
    async fn fan_out() {
        let bus = Broadcaster::new(8);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        let exchange =
            Exchange::new(Role::Issuer, ProtocolVersion::V1, State::OfferSent, "thread-1", "c1");
        bus.publish(Event::created(exchange.clone()));

        let event = first.recv().await.expect("should receive");
        assert_eq!(event.exchange, exchange);
        assert_eq!(event.previous_state, None);
        assert_eq!(second.recv().await.expect("should receive").state(), State::OfferSent);
        assert_eq!(bus.published(), 1);
    }

    #[tokio::test]
    async fn capacity_from_config() {
        let bus = Broadcaster::from_config(&Config::default().event_capacity(1));
        let mut slow = bus.subscribe();

        let exchange =
            Exchange::new(Role::Holder, ProtocolVersion::V1, State::OfferReceived, "thread-1", "c1");
        bus.publish(Event::created(exchange.clone()));
        bus.publish(Event::transitioned(exchange, State::OfferReceived));

        let Err(broadcast::error::RecvError::Lagged(missed)) = slow.recv().await else {
            panic!("a one-event buffer should overflow");
        };
        assert_eq!(missed, 1);
    }

    #[test]
    fn no_subscribers() {
        let bus = Broadcaster::default();
        let exchange =
            Exchange::new(Role::Holder, ProtocolVersion::V2, State::Done, "thread-1", "c1");
        bus.publish(Event::transitioned(exchange, State::CredentialReceived));
        assert_eq!(bus.published(), 1);
    }
}

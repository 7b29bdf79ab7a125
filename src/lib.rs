//! An engine for the Aries [Issue Credential] protocols, versions
//! [1.0](https://github.com/hyperledger/aries-rfcs/tree/main/features/0036-issue-credential)
//! and [2.0](https://github.com/hyperledger/aries-rfcs/tree/main/features/0453-issue-credential-v2).
//!
//! The engine tracks each credential negotiation as an [`Exchange`] record and
//! moves it through a single state machine shared by both protocol families.
//! Storage, transport, the ledger, and anoncreds cryptography are supplied by
//! the implementer through the [`provider::Provider`] trait.
//!
//! * [`Agent`] hands out the [`command::Credentials`] façade for each protocol
//!   family and the inbound [`Dispatcher`].
//! * [`Dispatcher`] routes decoded messages to their handlers, answering
//!   automatically when the exchange's auto-accept policy allows it.
//!
//! [Issue Credential]: https://github.com/hyperledger/aries-rfcs/tree/main/features/0453-issue-credential-v2

pub mod agent;
pub mod cache;
pub mod command;
pub mod config;
pub mod core;
pub mod dispatch;
mod error;
pub mod event;
pub mod exchange;
pub mod handlers;
pub mod message;
pub mod provider;
pub mod repository;
pub mod service;

pub use crate::agent::Agent;
pub use crate::config::Config;
pub use crate::dispatch::{Dispatcher, InboundMessage, OutboundMessage};
pub use crate::error::Error;
pub use crate::exchange::{AutoAccept, Exchange, ProtocolVersion, Role, State};
pub use crate::message::{Message, V1, V2};

/// Result type for the credential-exchange engine.
pub type Result<T, E = Error> = std::result::Result<T, E>;

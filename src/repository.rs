//! # Exchange Repository
//!
//! Lookups of exchange records by id, or by thread narrowed by connection and
//! role. A lookup that matches more than one record is an error: a thread
//! holds at most one record per role on any one agent.

use crate::exchange::{Exchange, Role};
use crate::provider::ExchangeStore;
use crate::{Result, invalid, not_found};

/// Exchange record access over an [`ExchangeStore`].
#[derive(Debug)]
pub struct Repository<'a, S> {
    store: &'a S,
}

impl<'a, S: ExchangeStore> Repository<'a, S> {
    /// Create a repository over `store`.
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Persist a new record.
    ///
    /// # Errors
    ///
    /// Returns an `External` error if the store fails.
    pub async fn save(&self, exchange: &Exchange) -> Result<()> {
        self.store.put(exchange).await?;
        Ok(())
    }

    /// Persist changes to an existing record.
    ///
    /// # Errors
    ///
    /// Returns a `NotFound` error if the record was never saved, or an
    /// `External` error if the store fails.
    pub async fn update(&self, exchange: &Exchange) -> Result<()> {
        if self.store.get(&exchange.id).await?.is_none() {
            return Err(not_found!("exchange {}", exchange.id));
        }
        self.store.put(exchange).await?;
        Ok(())
    }

    /// The record with id `exchange_id`.
    ///
    /// # Errors
    ///
    /// Returns a `NotFound` error if there is no such record.
    pub async fn get_by_id(&self, exchange_id: &str) -> Result<Exchange> {
        self.store.get(exchange_id).await?.ok_or_else(|| not_found!("exchange {exchange_id}"))
    }

    /// The record on `thread_id`, narrowed to `connection_id` when given.
    ///
    /// # Errors
    ///
    /// Returns an error if more than one record matches.
    pub async fn find_by_thread_and_connection(
        &self, thread_id: &str, connection_id: Option<&str>,
    ) -> Result<Option<Exchange>> {
        self.find_by_thread_role_and_connection(thread_id, None, connection_id).await
    }

    /// As [`Repository::find_by_thread_and_connection`], failing when nothing
    /// matches.
    ///
    /// # Errors
    ///
    /// Returns a `NotFound` error if no record matches, or an error if more
    /// than one does.
    pub async fn get_by_thread_and_connection(
        &self, thread_id: &str, connection_id: Option<&str>,
    ) -> Result<Exchange> {
        self.find_by_thread_and_connection(thread_id, connection_id)
            .await?
            .ok_or_else(|| not_found!("exchange on thread {thread_id}"))
    }

    /// The record on `thread_id`, narrowed to `role` and `connection_id` when
    /// given.
    ///
    /// # Errors
    ///
    /// Returns an `InvalidMessage` error if more than one record matches.
    pub async fn find_by_thread_role_and_connection(
        &self, thread_id: &str, role: Option<Role>, connection_id: Option<&str>,
    ) -> Result<Option<Exchange>> {
        let mut matches = self
            .store
            .by_thread(thread_id)
            .await?
            .into_iter()
            .filter(|e| e.thread_id == thread_id)
            .filter(|e| role.is_none_or(|r| e.role == r))
            .filter(|e| connection_id.is_none_or(|c| e.connection_id == c));

        let Some(exchange) = matches.next() else {
            return Ok(None);
        };
        if matches.next().is_some() {
            return Err(invalid!("more than one exchange on thread {thread_id}"));
        }
        Ok(Some(exchange))
    }
}

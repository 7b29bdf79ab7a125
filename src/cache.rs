//! # Ledger Cache
//!
//! [`LedgerCache`] wraps any [`Ledger`] and keeps recently resolved artifacts
//! for a bounded time. Once full, the oldest entry is evicted first.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::trace;

use crate::config::CacheConfig;
use crate::provider::Ledger;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Artifact {
    CredentialDefinition,
    Schema,
    RevocationRegistry,
}

#[derive(Debug)]
struct Entry {
    value: String,
    fetched_at: Instant,
}

/// Caching [`Ledger`] decorator.
#[derive(Clone, Debug)]
pub struct LedgerCache<L> {
    inner: L,
    entries: Arc<Mutex<HashMap<(Artifact, String), Entry>>>,
    ttl: Duration,
    capacity: usize,
}

impl<L: Ledger> LedgerCache<L> {
    /// Cache lookups made through `inner` according to `config`.
    #[must_use]
    pub fn new(inner: L, config: &CacheConfig) -> Self {
        Self {
            inner,
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl: config.ttl(),
            capacity: config.capacity,
        }
    }

    /// Number of entries currently held, fresh or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` when nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    async fn lookup<F>(&self, artifact: Artifact, id: &str, fetch: F) -> Result<String>
    where
        F: Future<Output = Result<String>> + Send,
    {
        if let Some(value) = self.fresh(artifact, id) {
            trace!(?artifact, id, "ledger cache hit");
            return Ok(value);
        }
        let value = fetch.await?;
        self.insert(artifact, id, value.clone());
        Ok(value)
    }

    fn fresh(&self, artifact: Artifact, id: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.get(&(artifact, id.to_string()))?;
        (entry.fetched_at.elapsed() < self.ttl).then(|| entry.value.clone())
    }

    fn insert(&self, artifact: Artifact, id: &str, value: String) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let key = (artifact, id.to_string());

        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            entries.retain(|_, e| e.fetched_at.elapsed() < self.ttl);
        }
        while !entries.contains_key(&key) && entries.len() >= self.capacity {
            let Some(oldest) =
                entries.iter().min_by_key(|(_, e)| e.fetched_at).map(|(k, _)| k.clone())
            else {
                break;
            };
            entries.remove(&oldest);
        }

        entries.insert(
            key,
            Entry {
                value,
                fetched_at: Instant::now(),
            },
        );
    }
}

impl<L: Ledger> Ledger for LedgerCache<L> {
    async fn credential_definition(&self, cred_def_id: &str) -> Result<String> {
        let fetch = self.inner.credential_definition(cred_def_id);
        self.lookup(Artifact::CredentialDefinition, cred_def_id, fetch).await
    }

    async fn schema(&self, schema_id: &str) -> Result<String> {
        let fetch = self.inner.schema(schema_id);
        self.lookup(Artifact::Schema, schema_id, fetch).await
    }

    async fn revocation_registry_definition(&self, rev_reg_id: &str) -> Result<String> {
        let fetch = self.inner.revocation_registry_definition(rev_reg_id);
        self.lookup(Artifact::RevocationRegistry, rev_reg_id, fetch).await
    }
}

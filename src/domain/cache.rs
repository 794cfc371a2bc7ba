//! Time-bounded memoization of query results.
//!
//! Entries are keyed by the full query signature and expire `ttl` after the
//! compute that produced them. Failed computes are never stored. The cache is
//! single-threaded (`RefCell`); at most one compute per signature runs at a time
//! because callers run to completion before the next lookup.

use crate::domain::records::EntityScope;
use std::cell::RefCell;
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub const DEFAULT_LEDGER_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_BALANCE_TTL: Duration = Duration::from_secs(60);

/// Everything that makes two queries the same query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuerySignature {
    pub model: String,
    pub filter: String,
    pub fields: Vec<String>,
    pub limit: usize,
    pub entity: EntityScope,
}

pub trait Clock {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

struct Entry<V> {
    stored_at: Instant,
    value: V,
}

pub struct ResultCache<V> {
    entries: RefCell<HashMap<QuerySignature, Entry<V>>>,
    clock: Box<dyn Clock>,
}

impl<V: Clone> Default for ResultCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> ResultCache<V> {
    pub fn new() -> Self {
        Self::with_clock(Box::new(SystemClock))
    }

    pub fn with_clock(clock: Box<dyn Clock>) -> Self {
        Self {
            entries: RefCell::new(HashMap::new()),
            clock,
        }
    }

    /// Returns the stored value when it is younger than `ttl`; otherwise runs
    /// `compute`, stores a successful result with a fresh timestamp and returns it.
    pub fn get_or_compute<E, F>(
        &self,
        signature: &QuerySignature,
        ttl: Duration,
        compute: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let now = self.clock.now();
        if let Some(entry) = self.entries.borrow().get(signature) {
            if now.saturating_duration_since(entry.stored_at) < ttl {
                tracing::debug!(model = %signature.model, "cache hit");
                return Ok(entry.value.clone());
            }
            tracing::debug!(model = %signature.model, "cache entry expired");
        }

        let value = compute()?;
        self.entries.borrow_mut().insert(
            signature.clone(),
            Entry {
                stored_at: self.clock.now(),
                value: value.clone(),
            },
        );
        Ok(value)
    }

    pub fn invalidate(&self, signature: &QuerySignature) {
        self.entries.borrow_mut().remove(signature);
    }

    pub fn invalidate_all(&self) {
        let mut entries = self.entries.borrow_mut();
        tracing::info!(entries = entries.len(), "clearing result cache");
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

//! Remote query executor.
//!
//! Large result sets are fetched in pages: one `search_count` for the filter,
//! then sequential `search_read` pages of `chunk_size` until
//! `min(count, max_records)` records are held or a page comes back short.
//!
//! # Failure semantics
//!
//! - A failed count, or a failure before any page succeeded, propagates.
//! - A page failing after at least one success stops the fetch; the records
//!   accumulated so far are returned with the error as a diagnostic.
//! - Failed pages are not retried.

use crate::domain::cache::QuerySignature;
use crate::domain::error::LedgerError;
use crate::domain::filter::Filter;
use crate::domain::records::{EntityScope, RemoteRecord};
use crate::ports::remote_port::RemotePort;

pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_MAX_RECORDS: usize = 10_000;

/// Receives `(records_fetched, total_expected)` after every page.
pub trait ProgressObserver {
    fn on_page(&self, fetched: usize, expected: usize);
}

impl<F: Fn(usize, usize)> ProgressObserver for F {
    fn on_page(&self, fetched: usize, expected: usize) {
        self(fetched, expected)
    }
}

pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_page(&self, _fetched: usize, _expected: usize) {}
}

/// A filtered read against one backend model.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub model: String,
    pub filter: Filter,
    pub fields: Vec<String>,
    pub max_records: usize,
    pub entity: EntityScope,
}

impl Query {
    pub fn new(model: &str, filter: Filter, fields: &[&str]) -> Self {
        Self {
            model: model.to_string(),
            filter,
            fields: fields.iter().map(|f| f.to_string()).collect(),
            max_records: DEFAULT_MAX_RECORDS,
            entity: EntityScope::All,
        }
    }

    pub fn limit(mut self, max_records: usize) -> Self {
        self.max_records = max_records;
        self
    }

    pub fn entity(mut self, entity: EntityScope) -> Self {
        self.entity = entity;
        self
    }

    /// The filter with the entity clause appended when scoped to one entity.
    pub fn effective_filter(&self) -> Filter {
        match self.entity {
            EntityScope::All => self.filter.clone(),
            EntityScope::One(id) => self.filter.clone().and(Filter::entity(id)),
        }
    }

    pub fn signature(&self) -> QuerySignature {
        QuerySignature {
            model: self.model.clone(),
            filter: self.filter.to_string(),
            fields: self.fields.clone(),
            limit: self.max_records,
            entity: self.entity,
        }
    }
}

/// Records from a fetch, plus the error that cut it short, if any.
#[derive(Debug)]
pub struct FetchOutcome {
    pub records: Vec<RemoteRecord>,
    pub expected: usize,
    pub diagnostic: Option<LedgerError>,
}

impl FetchOutcome {
    pub fn is_partial(&self) -> bool {
        self.diagnostic.is_some()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct QueryExecutor {
    chunk_size: usize,
}

impl Default for QueryExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl QueryExecutor {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn fetch(
        &self,
        remote: &dyn RemotePort,
        query: &Query,
        progress: &dyn ProgressObserver,
    ) -> Result<FetchOutcome, LedgerError> {
        let filter = query.effective_filter();
        let count = remote.search_count(&query.model, &filter)?;
        let expected = count.min(query.max_records);
        let fields: Vec<&str> = query.fields.iter().map(String::as_str).collect();

        tracing::debug!(
            model = %query.model,
            entity = %query.entity,
            count,
            expected,
            chunk_size = self.chunk_size,
            "starting paged fetch"
        );

        let mut records: Vec<RemoteRecord> = Vec::with_capacity(expected);
        let mut pages_ok = 0usize;
        let mut diagnostic = None;

        while records.len() < expected {
            let offset = records.len();
            let limit = self.chunk_size.min(expected - offset);
            match remote.search_read(&query.model, &filter, &fields, offset, limit) {
                Ok(mut page) => {
                    pages_ok += 1;
                    let short = page.len() < limit;
                    page.truncate(limit);
                    records.extend(page);
                    progress.on_page(records.len(), expected);
                    if short {
                        break;
                    }
                }
                Err(e) if pages_ok == 0 => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        model = %query.model,
                        fetched = records.len(),
                        expected,
                        error = %e,
                        "page failed, returning partial result"
                    );
                    diagnostic = Some(e);
                    break;
                }
            }
        }

        Ok(FetchOutcome {
            records,
            expected,
            diagnostic,
        })
    }
}

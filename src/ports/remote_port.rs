//! Remote accounting backend port.
//!
//! Adapters implement the three primitive calls the pipeline needs. Each call
//! is one blocking round-trip bounded by the adapter's timeout; timeouts map to
//! [`LedgerError::RemoteTimeout`] and structured backend faults to
//! [`LedgerError::RemoteError`].

use crate::domain::error::LedgerError;
use crate::domain::filter::Filter;
use crate::domain::records::RemoteRecord;

pub trait RemotePort {
    /// Number of records in `model` matching `filter`.
    fn search_count(&self, model: &str, filter: &Filter) -> Result<usize, LedgerError>;

    /// One page of matching records, ordered by id so that pages are stable.
    fn search_read(
        &self,
        model: &str,
        filter: &Filter,
        fields: &[&str],
        offset: usize,
        limit: usize,
    ) -> Result<Vec<RemoteRecord>, LedgerError>;

    /// Ids of matching records.
    fn search(&self, model: &str, filter: &Filter) -> Result<Vec<i64>, LedgerError>;
}

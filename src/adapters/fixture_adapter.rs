//! Offline backend over a JSON fixture file.
//!
//! The file maps model names to arrays of records shaped like the backend's
//! `search_read` output:
//!
//! ```json
//! { "account.move.line": [ { "id": 1, "account_id": [5, "800001 Omzet"], ... } ] }
//! ```
//!
//! Filters are evaluated locally with [`Filter::matches`]. Records may carry
//! flat dotted keys (`"account_id.account_type": "asset_receivable"`) for
//! fields the backend would resolve through a relation.

use crate::domain::error::LedgerError;
use crate::domain::filter::Filter;
use crate::domain::records::RemoteRecord;
use crate::ports::remote_port::RemotePort;
use serde_json::Value as Json;
use std::collections::HashMap;
use std::path::Path;

pub struct FixtureAdapter {
    models: HashMap<String, Vec<RemoteRecord>>,
}

impl FixtureAdapter {
    pub fn new(models: HashMap<String, Vec<RemoteRecord>>) -> Self {
        let mut models = models;
        for records in models.values_mut() {
            records.sort_by_key(record_id);
        }
        Self { models }
    }

    pub fn from_json(content: &str) -> Result<Self, LedgerError> {
        let models: HashMap<String, Vec<RemoteRecord>> =
            serde_json::from_str(content).map_err(|e| LedgerError::decode("fixtures", e.to_string()))?;
        Ok(Self::new(models))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, LedgerError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let adapter = Self::from_json(&content)?;
        tracing::info!(
            path = %path.as_ref().display(),
            models = adapter.models.len(),
            "loaded fixture backend"
        );
        Ok(adapter)
    }

    fn matching<'a>(&'a self, model: &str, filter: &'a Filter) -> impl Iterator<Item = &'a RemoteRecord> + 'a {
        self.models
            .get(model)
            .map(|records| records.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter(move |r| filter.matches(r))
    }
}

fn record_id(record: &RemoteRecord) -> i64 {
    record.get("id").and_then(Json::as_i64).unwrap_or(0)
}

fn project(record: &RemoteRecord, fields: &[&str]) -> RemoteRecord {
    if fields.is_empty() {
        return record.clone();
    }
    record
        .iter()
        .filter(|(k, _)| k.as_str() == "id" || fields.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

impl RemotePort for FixtureAdapter {
    fn search_count(&self, model: &str, filter: &Filter) -> Result<usize, LedgerError> {
        Ok(self.matching(model, filter).count())
    }

    fn search_read(
        &self,
        model: &str,
        filter: &Filter,
        fields: &[&str],
        offset: usize,
        limit: usize,
    ) -> Result<Vec<RemoteRecord>, LedgerError> {
        Ok(self
            .matching(model, filter)
            .skip(offset)
            .take(limit)
            .map(|r| project(r, fields))
            .collect())
    }

    fn search(&self, model: &str, filter: &Filter) -> Result<Vec<i64>, LedgerError> {
        Ok(self.matching(model, filter).map(record_id).collect())
    }
}

//! Bucketing of classified lines into period/entity/category summaries.
//!
//! Accumulation goes through a `BTreeMap` keyed by the composite
//! `(period, entity, category)` tuple and amounts are exact decimals, so any
//! permutation of the input yields the same rows in the same order.

use crate::domain::records::EntityId;
use crate::domain::taxonomy::ClassifiedLine;
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeGranularity {
    Month,
    Quarter,
    Year,
}

impl TimeGranularity {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "month" | "monthly" => Some(TimeGranularity::Month),
            "quarter" | "quarterly" => Some(TimeGranularity::Quarter),
            "year" | "yearly" => Some(TimeGranularity::Year),
            _ => None,
        }
    }

    /// Lexically sortable key: `2025-03`, `2025-Q1`, `2025`.
    pub fn period_key(&self, date: NaiveDate) -> String {
        match self {
            TimeGranularity::Month => format!("{:04}-{:02}", date.year(), date.month()),
            TimeGranularity::Quarter => {
                format!("{:04}-Q{}", date.year(), (date.month() - 1) / 3 + 1)
            }
            TimeGranularity::Year => format!("{:04}", date.year()),
        }
    }
}

/// Which dimensions to bucket by. Dimensions left out are `None` in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketBy {
    pub time: Option<TimeGranularity>,
    pub entity: bool,
    pub category: bool,
}

impl BucketBy {
    pub fn monthly() -> Self {
        Self {
            time: Some(TimeGranularity::Month),
            entity: false,
            category: false,
        }
    }

    pub fn by_category() -> Self {
        Self {
            time: None,
            entity: false,
            category: true,
        }
    }

    pub fn by_entity() -> Self {
        Self {
            time: None,
            entity: true,
            category: false,
        }
    }

    pub fn with_entity(mut self) -> Self {
        self.entity = true;
        self
    }

    pub fn with_category(mut self) -> Self {
        self.category = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PeriodSummary {
    pub period_key: Option<String>,
    pub entity_id: Option<EntityId>,
    pub category: Option<String>,
    pub total: Decimal,
}

type BucketKey = (Option<String>, Option<EntityId>, Option<String>);

/// One row per populated key. Lines without a date are left out of
/// time-bucketed views only; zero amounts are kept.
pub fn aggregate(lines: &[ClassifiedLine], bucket_by: BucketBy) -> Vec<PeriodSummary> {
    let mut buckets: BTreeMap<BucketKey, Decimal> = BTreeMap::new();

    for line in lines {
        let period_key = match bucket_by.time {
            Some(granularity) => match line.date {
                Some(date) => Some(granularity.period_key(date)),
                None => continue,
            },
            None => None,
        };
        let entity = bucket_by.entity.then_some(line.entity_id);
        let category = bucket_by.category.then(|| line.category.clone());

        *buckets
            .entry((period_key, entity, category))
            .or_insert(Decimal::ZERO) += line.amount;
    }

    buckets
        .into_iter()
        .map(|((period_key, entity_id, category), total)| PeriodSummary {
            period_key,
            entity_id,
            category,
            total,
        })
        .collect()
}

pub fn grand_total(summaries: &[PeriodSummary]) -> Decimal {
    summaries.iter().map(|s| s.total).sum()
}

/// Sums rows per period key, collapsing the other dimensions.
pub fn totals_by_period(summaries: &[PeriodSummary]) -> BTreeMap<String, Decimal> {
    let mut totals = BTreeMap::new();
    for s in summaries {
        if let Some(key) = &s.period_key {
            *totals.entry(key.clone()).or_insert(Decimal::ZERO) += s.total;
        }
    }
    totals
}

/// Sum of line amounts for one entity, e.g. revenue per legal entity.
pub fn total_for_entity(lines: &[ClassifiedLine], entity_id: EntityId) -> Decimal {
    lines
        .iter()
        .filter(|l| l.entity_id == entity_id)
        .map(|l| l.amount)
        .sum()
}

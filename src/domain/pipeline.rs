//! Ledger pipeline: cached queries, per-source degradation, KPIs and forecast.
//!
//! Every data source is fetched independently. A source that fails yields an
//! empty result plus a [`Diagnostic`]; it never aborts the others.

use crate::domain::aggregate::{self, BucketBy, PeriodSummary};
use crate::domain::cache::{DEFAULT_BALANCE_TTL, DEFAULT_LEDGER_TTL, ResultCache};
use crate::domain::decode::{self, FromRecord, decode_all};
use crate::domain::error::LedgerError;
use crate::domain::fetch::{
    DEFAULT_CHUNK_SIZE, DEFAULT_MAX_RECORDS, FetchOutcome, NoProgress, ProgressObserver, Query,
    QueryExecutor,
};
use crate::domain::filter::{Filter, Operator, Value};
use crate::domain::forecast::{AgingBuckets, ForecastConfig, ForecastEngine, Projection, RunRate};
use crate::domain::records::{
    AccountRef, EntityId, EntityScope, Invoice, InvoiceKind, JournalBalance, LedgerLine, OpenItem,
    RemoteRecord,
};
use crate::domain::taxonomy::{CategoryKind, Classification, JournalGroups, Taxonomy};
use crate::ports::remote_port::RemotePort;
use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value as Json;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::Rc;
use std::time::Duration;

pub const DEFAULT_OPEN_ITEM_LIMIT: usize = 5_000;
pub const DEFAULT_DAILY_LIMIT: usize = 1_000;
pub const DEFAULT_PARTNER_PATTERN: &str = "LAB%B.V.";
const ACCOUNT_CODE_FIELD: &str = "account_id.code";
const PARTNER_MODEL: &str = "res.partner";

/// A non-fatal problem with one data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub source: String,
    pub message: String,
    /// Some records were returned before the failure.
    pub partial: bool,
}

impl Diagnostic {
    fn new(source: &str, message: impl Into<String>, partial: bool) -> Self {
        Self {
            source: source.to_string(),
            message: message.into(),
            partial,
        }
    }
}

/// Best-effort data plus whatever went wrong producing it.
#[derive(Debug, Clone)]
pub struct Sourced<T> {
    pub data: T,
    pub diagnostics: Vec<Diagnostic>,
}

impl<T> Sourced<T> {
    pub fn is_degraded(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Sourced<U> {
        Sourced {
            data: f(self.data),
            diagnostics: self.diagnostics,
        }
    }

    fn merge_into(self, diagnostics: &mut Vec<Diagnostic>) -> T {
        diagnostics.extend(self.diagnostics);
        self.data
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceSummary {
    pub kind: InvoiceKind,
    pub count: usize,
    pub total: Decimal,
    pub residual: Decimal,
}

/// Count and sums per invoice kind, in kind order.
pub fn summarize_invoices(invoices: &[Invoice]) -> Vec<InvoiceSummary> {
    let mut by_kind: BTreeMap<InvoiceKind, InvoiceSummary> = BTreeMap::new();
    for invoice in invoices {
        let summary = by_kind.entry(invoice.kind).or_insert(InvoiceSummary {
            kind: invoice.kind,
            count: 0,
            total: Decimal::ZERO,
            residual: Decimal::ZERO,
        });
        summary.count += 1;
        summary.total += invoice.total;
        summary.residual += invoice.residual;
    }
    by_kind.into_values().collect()
}

/// Bank and open-item position of one legal entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityPosition {
    pub entity_id: EntityId,
    pub name: String,
    pub bank: Decimal,
    pub receivables: Decimal,
    pub payables: Decimal,
    pub net: Decimal,
}

impl EntityPosition {
    pub fn is_negative(&self) -> bool {
        self.net < Decimal::ZERO
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct KpiSnapshot {
    pub year: i32,
    pub entity: Option<EntityId>,
    pub total_revenue: Decimal,
    pub total_costs: Decimal,
    pub result: Decimal,
    /// Result as a percentage of revenue, one decimal; zero without revenue.
    pub margin_pct: Decimal,
    pub total_bank: Decimal,
    pub total_intercompany: Decimal,
    pub receivables: Decimal,
    pub payables: Decimal,
    /// Revenue booked on the day before the as-of date.
    pub daily_sales: Decimal,
    pub positions: Vec<EntityPosition>,
    pub classification_gaps: BTreeSet<String>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastRun {
    pub as_of: NaiveDate,
    pub receivables: AgingBuckets,
    pub payables: AgingBuckets,
    pub run_rate: RunRate,
    pub projection: Projection,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub ledger_ttl: Duration,
    pub balance_ttl: Duration,
    pub chunk_size: usize,
    pub max_records: usize,
    pub open_item_limit: usize,
    pub entities: BTreeMap<EntityId, String>,
    /// Partners matching this pattern are group companies and left out of open items.
    pub partner_pattern: String,
    pub forecast: ForecastConfig,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            ledger_ttl: DEFAULT_LEDGER_TTL,
            balance_ttl: DEFAULT_BALANCE_TTL,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_records: DEFAULT_MAX_RECORDS,
            open_item_limit: DEFAULT_OPEN_ITEM_LIMIT,
            entities: BTreeMap::new(),
            partner_pattern: DEFAULT_PARTNER_PATTERN.to_string(),
            forecast: ForecastConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenSide {
    Receivable,
    Payable,
}

impl OpenSide {
    fn account_type(&self) -> &'static str {
        match self {
            OpenSide::Receivable => "asset_receivable",
            OpenSide::Payable => "liability_payable",
        }
    }

    fn source(&self) -> &'static str {
        match self {
            OpenSide::Receivable => "receivables",
            OpenSide::Payable => "payables",
        }
    }
}

pub struct LedgerPipeline {
    remote: Box<dyn RemotePort>,
    cache: ResultCache<Rc<FetchOutcome>>,
    executor: QueryExecutor,
    taxonomy: Taxonomy,
    settings: PipelineSettings,
    progress: Box<dyn ProgressObserver>,
}

impl LedgerPipeline {
    pub fn new(remote: Box<dyn RemotePort>, taxonomy: Taxonomy, settings: PipelineSettings) -> Self {
        Self {
            remote,
            cache: ResultCache::new(),
            executor: QueryExecutor::new(settings.chunk_size),
            taxonomy,
            settings,
            progress: Box::new(NoProgress),
        }
    }

    pub fn with_cache(mut self, cache: ResultCache<Rc<FetchOutcome>>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_progress(mut self, progress: Box<dyn ProgressObserver>) -> Self {
        self.progress = progress;
        self
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn cached_queries(&self) -> usize {
        self.cache.len()
    }

    /// Drops every cached result; the next call of each source hits the backend.
    pub fn invalidate(&self) {
        self.cache.invalidate_all();
    }

    fn fetch_cached(&self, query: &Query, ttl: Duration) -> Result<Rc<FetchOutcome>, LedgerError> {
        let signature = query.signature();
        let outcome = self.cache.get_or_compute(&signature, ttl, || {
            self.executor
                .fetch(self.remote.as_ref(), query, self.progress.as_ref())
                .map(Rc::new)
        })?;
        if outcome.is_partial() {
            self.cache.invalidate(&signature);
        }
        Ok(outcome)
    }

    fn load<T: FromRecord>(&self, source: &str, query: Query, ttl: Duration) -> Sourced<Vec<T>> {
        match self.fetch_cached(&query, ttl) {
            Ok(outcome) => {
                let (data, skipped) = decode_all::<T>(&outcome.records);
                let mut diagnostics = Vec::new();
                if let Some(e) = &outcome.diagnostic {
                    diagnostics.push(Diagnostic::new(
                        source,
                        format!(
                            "{} of {} records fetched: {}",
                            outcome.records.len(),
                            outcome.expected,
                            e
                        ),
                        true,
                    ));
                }
                if !skipped.is_empty() {
                    diagnostics.push(Diagnostic::new(
                        source,
                        format!("{} records could not be decoded", skipped.len()),
                        true,
                    ));
                }
                Sourced { data, diagnostics }
            }
            Err(e) => {
                tracing::warn!(source, error = %e, "data source unavailable");
                Sourced {
                    data: Vec::new(),
                    diagnostics: vec![Diagnostic::new(source, e.to_string(), false)],
                }
            }
        }
    }

    fn posted() -> Filter {
        Filter::eq("parent_state", "posted")
    }

    fn ledger_query(&self, filter: Filter, entity: EntityScope) -> Query {
        Query::new(LedgerLine::MODEL, filter, LedgerLine::fields())
            .limit(self.settings.max_records)
            .entity(entity)
    }

    /// Posted revenue-band lines for one calendar year.
    pub fn revenue_lines(&self, year: i32, entity: EntityScope) -> Sourced<Vec<LedgerLine>> {
        let filter = self
            .taxonomy
            .revenue_filter(ACCOUNT_CODE_FIELD)
            .and(Filter::year_range(year))
            .and(Self::posted());
        self.load("revenue", self.ledger_query(filter, entity), self.settings.ledger_ttl)
    }

    /// Posted cost-scope lines for one calendar year.
    pub fn cost_lines(&self, year: i32, entity: EntityScope) -> Sourced<Vec<LedgerLine>> {
        let filter = Filter::year_range(year)
            .and(Self::posted())
            .and(self.taxonomy.cost_filter(ACCOUNT_CODE_FIELD));
        self.load("costs", self.ledger_query(filter, entity), self.settings.ledger_ttl)
    }

    /// Revenue and cost lines of a year, classified.
    pub fn classified(&self, year: i32, entity: EntityScope) -> Sourced<Classification> {
        let mut diagnostics = Vec::new();
        let mut lines = self.revenue_lines(year, entity).merge_into(&mut diagnostics);
        lines.extend(self.cost_lines(year, entity).merge_into(&mut diagnostics));
        Sourced {
            data: self.taxonomy.classify_lines(&lines),
            diagnostics,
        }
    }

    pub fn summary(&self, year: i32, entity: EntityScope, bucket_by: BucketBy) -> Sourced<Vec<PeriodSummary>> {
        self.classified(year, entity)
            .map(|c| aggregate::aggregate(&c.lines, bucket_by))
    }

    /// Bank journals grouped into bank and intercompany. Journals whose
    /// default account code is unknown get it resolved through a chart lookup,
    /// but only when the code can change their classification.
    pub fn bank_balances(&self, entity: EntityScope) -> Sourced<JournalGroups> {
        let query = Query::new(JournalBalance::MODEL, Filter::eq("type", "bank"), JournalBalance::fields())
            .limit(self.settings.max_records)
            .entity(entity);
        let mut diagnostics = Vec::new();
        let mut journals: Vec<JournalBalance> = self
            .load("bank", query, self.settings.balance_ttl)
            .merge_into(&mut diagnostics);

        let unresolved: BTreeSet<i64> = journals
            .iter()
            .filter(|j| j.account_code.is_empty() && self.taxonomy.journals.needs_code(&j.label))
            .filter_map(|j| j.account_id)
            .collect();
        if !unresolved.is_empty() {
            let lookup = Query::new(
                AccountRef::MODEL,
                Filter::term("id", Operator::In, Value::list(unresolved.iter().copied())),
                AccountRef::fields(),
            );
            let accounts: Vec<AccountRef> = self
                .load("accounts", lookup, self.settings.balance_ttl)
                .merge_into(&mut diagnostics);
            let codes: HashMap<i64, String> = accounts.into_iter().map(|a| (a.id, a.code)).collect();
            for journal in journals.iter_mut().filter(|j| j.account_code.is_empty()) {
                if let Some(code) = journal.account_id.and_then(|id| codes.get(&id)) {
                    journal.account_code = code.clone();
                }
            }
        }

        Sourced {
            data: self.taxonomy.group_journals(journals),
            diagnostics,
        }
    }

    /// Ids of group companies, cached under their own signature like any read.
    fn excluded_partners(&self) -> Result<Vec<i64>, LedgerError> {
        let filter = Filter::term("name", Operator::ILike, self.settings.partner_pattern.as_str());
        let query = Query::new(PARTNER_MODEL, filter, &["id"]);
        let outcome = self.cache.get_or_compute(&query.signature(), self.settings.ledger_ttl, || {
            let ids = self.remote.search(PARTNER_MODEL, &query.filter)?;
            tracing::debug!(count = ids.len(), "intercompany partners excluded from open items");
            let records: Vec<RemoteRecord> = ids
                .iter()
                .map(|id| RemoteRecord::from_iter([("id".to_string(), Json::from(*id))]))
                .collect();
            Ok::<_, LedgerError>(Rc::new(FetchOutcome {
                expected: records.len(),
                records,
                diagnostic: None,
            }))
        })?;
        outcome
            .records
            .iter()
            .map(|record| decode::id(record, PARTNER_MODEL))
            .collect()
    }

    fn open_items(&self, side: OpenSide, entity: EntityScope) -> Sourced<Vec<OpenItem>> {
        let mut diagnostics = Vec::new();
        let mut filter = Filter::eq("account_id.account_type", side.account_type())
            .and(Self::posted())
            .and(Filter::eq("reconciled", false));
        match self.excluded_partners() {
            Ok(ids) if ids.is_empty() => {}
            Ok(ids) => {
                filter = filter.and(Filter::term("partner_id", Operator::NotIn, Value::list(ids)));
            }
            Err(e) => {
                tracing::warn!(error = %e, "partner lookup failed, intercompany items not excluded");
                diagnostics.push(Diagnostic::new("partners", e.to_string(), false));
            }
        }
        let query = Query::new(OpenItem::MODEL, filter, OpenItem::fields())
            .limit(self.settings.open_item_limit)
            .entity(entity);
        let items = self
            .load(side.source(), query, self.settings.ledger_ttl)
            .merge_into(&mut diagnostics);
        Sourced {
            data: items,
            diagnostics,
        }
    }

    /// Unreconciled receivable lines, group companies excluded. Debit-positive.
    pub fn open_receivables(&self, entity: EntityScope) -> Sourced<Vec<OpenItem>> {
        self.open_items(OpenSide::Receivable, entity)
    }

    /// Unreconciled payable lines, group companies excluded. Credit-negative.
    pub fn open_payables(&self, entity: EntityScope) -> Sourced<Vec<OpenItem>> {
        self.open_items(OpenSide::Payable, entity)
    }

    /// Revenue booked on `day`, reported positive.
    pub fn daily_sales(&self, day: NaiveDate, entity: EntityScope) -> Sourced<Decimal> {
        let filter = self
            .taxonomy
            .revenue_filter(ACCOUNT_CODE_FIELD)
            .and(Filter::eq("date", day.format("%Y-%m-%d").to_string()))
            .and(Self::posted());
        let query = self.ledger_query(filter, entity).limit(DEFAULT_DAILY_LIMIT);
        self.load::<LedgerLine>("daily sales", query, self.settings.ledger_ttl)
            .map(|lines| {
                lines
                    .iter()
                    .map(|l| l.amount * CategoryKind::Revenue.sign())
                    .sum()
            })
    }

    /// Posted sale, purchase and credit-note invoices of a year.
    pub fn invoices(&self, year: i32, entity: EntityScope) -> Sourced<Vec<Invoice>> {
        let filter = Filter::term("move_type", Operator::In, Value::list(InvoiceKind::move_types()))
            .and(Filter::year_range(year))
            .and(Filter::eq("state", "posted"));
        let query = Query::new(Invoice::MODEL, filter, Invoice::fields())
            .limit(self.settings.max_records)
            .entity(entity);
        self.load("invoices", query, self.settings.ledger_ttl)
    }

    pub fn kpis(&self, year: i32, entity: EntityScope, as_of: NaiveDate) -> KpiSnapshot {
        let mut diagnostics = Vec::new();
        let classification = self.classified(year, entity).merge_into(&mut diagnostics);
        let journals = self.bank_balances(entity).merge_into(&mut diagnostics);
        let receivables = self.open_receivables(entity).merge_into(&mut diagnostics);
        let payables = self.open_payables(entity).merge_into(&mut diagnostics);
        let daily_sales = match as_of.checked_sub_days(Days::new(1)) {
            Some(day) => self.daily_sales(day, entity).merge_into(&mut diagnostics),
            None => Decimal::ZERO,
        };

        let total_of = |kind: CategoryKind| -> Decimal {
            classification
                .lines
                .iter()
                .filter(|l| l.kind == kind)
                .map(|l| l.amount)
                .sum()
        };
        let total_revenue = total_of(CategoryKind::Revenue);
        let total_costs = total_of(CategoryKind::Cost);
        let result = total_revenue - total_costs;
        let margin_pct = if total_revenue > Decimal::ZERO {
            (result / total_revenue * Decimal::ONE_HUNDRED).round_dp(1)
        } else {
            Decimal::ZERO
        };

        let positions = self
            .settings
            .entities
            .iter()
            .filter(|(id, _)| entity.includes(**id))
            .map(|(id, name)| {
                let bank = journals.bank_total_for(*id);
                let recv = residual_for(&receivables, *id);
                let pay = residual_for(&payables, *id).abs();
                EntityPosition {
                    entity_id: *id,
                    name: name.clone(),
                    bank,
                    receivables: recv,
                    payables: pay,
                    net: bank + recv - pay,
                }
            })
            .collect();

        if !diagnostics.is_empty() {
            tracing::info!(count = diagnostics.len(), "KPIs computed from degraded sources");
        }

        KpiSnapshot {
            year,
            entity: entity.id(),
            total_revenue,
            total_costs,
            result,
            margin_pct,
            total_bank: journals.bank_total(),
            total_intercompany: journals.intercompany_total(),
            receivables: receivables.iter().map(|i| i.residual_amount).sum(),
            payables: payables_total(&payables),
            daily_sales,
            positions,
            classification_gaps: classification.gaps,
            diagnostics,
        }
    }

    /// Projects the cash balance forward from today's bank position, the aged
    /// open items and the year-to-date run-rates.
    pub fn forecast(&self, entity: EntityScope, as_of: NaiveDate, year: i32) -> ForecastRun {
        let mut diagnostics = Vec::new();
        let journals = self.bank_balances(entity).merge_into(&mut diagnostics);
        let receivables = self.open_receivables(entity).merge_into(&mut diagnostics);
        let payables = self.open_payables(entity).merge_into(&mut diagnostics);
        let classification = self.classified(year, entity).merge_into(&mut diagnostics);

        let mut revenue = Decimal::ZERO;
        let mut costs = Decimal::ZERO;
        for line in &classification.lines {
            match line.kind {
                CategoryKind::Revenue => revenue += line.amount,
                CategoryKind::Cost => costs += line.amount,
            }
        }
        let config = self.settings.forecast;
        let run_rate = RunRate::from_totals(revenue, costs, elapsed_days(year, as_of), config.period_days);
        let receivables = AgingBuckets::receivables(&receivables, as_of);
        let payables = AgingBuckets::payables(&payables, as_of);

        let projection = ForecastEngine::new(config).project(
            journals.bank_total(),
            receivables,
            payables,
            run_rate.revenue,
            run_rate.cost,
            config.horizon,
        );

        ForecastRun {
            as_of,
            receivables,
            payables,
            run_rate,
            projection,
            diagnostics,
        }
    }
}

fn residual_for(items: &[OpenItem], entity_id: EntityId) -> Decimal {
    items
        .iter()
        .filter(|i| i.entity_id == entity_id)
        .map(|i| i.residual_amount)
        .sum()
}

fn payables_total(items: &[OpenItem]) -> Decimal {
    items.iter().map(|i| i.residual_amount).sum::<Decimal>().abs()
}

/// Days of `year` elapsed up to and including `as_of`, capped at the year's end.
pub fn elapsed_days(year: i32, as_of: NaiveDate) -> u32 {
    let (Some(start), Some(end)) = (
        NaiveDate::from_ymd_opt(year, 1, 1),
        NaiveDate::from_ymd_opt(year, 12, 31),
    ) else {
        return 0;
    };
    if as_of < start {
        return 0;
    }
    let last = as_of.min(end);
    u32::try_from((last - start).num_days() + 1).unwrap_or(0)
}

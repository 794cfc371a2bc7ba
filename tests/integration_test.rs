//! End-to-end pipeline tests over an in-memory backend.
//!
//! Tests cover:
//! - KPI snapshot over a two-entity sample ledger
//! - Per-source degradation: timeouts, faults, partial pages
//! - Result caching, expiry and invalidation
//! - Journal classification including the secondary account lookup
//! - Summaries, invoices and the cash forecast

mod common;

use common::*;
use ledgerlens::domain::aggregate::{BucketBy, grand_total};
use ledgerlens::domain::cache::{Clock, ResultCache};
use ledgerlens::domain::pipeline::{LedgerPipeline, PipelineSettings, summarize_invoices};
use ledgerlens::domain::records::{EntityScope, InvoiceKind};
use ledgerlens::domain::taxonomy::{IntercompanyPolicy, JournalClassifier, Taxonomy};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

const LINES: &str = "account.move.line";

mod kpis {
    use super::*;

    #[test]
    fn consolidated_snapshot() {
        let (pipeline, _) = sample_pipeline();
        let k = pipeline.kpis(2025, EntityScope::All, as_of());

        assert!(k.diagnostics.is_empty(), "{:?}", k.diagnostics);
        assert_eq!(k.total_revenue, dec!(1750));
        assert_eq!(k.total_costs, dec!(570));
        assert_eq!(k.result, dec!(1180));
        assert_eq!(k.margin_pct, dec!(67.4));
        assert_eq!(k.total_bank, dec!(12500));
        assert_eq!(k.total_intercompany, dec!(1750));
        assert_eq!(k.receivables, dec!(1000));
        assert_eq!(k.payables, dec!(450));
        assert_eq!(k.daily_sales, dec!(250));
        assert_eq!(k.entity, None);
        assert_eq!(k.classification_gaps.iter().collect::<Vec<_>>(), vec!["76"]);
    }

    #[test]
    fn positions_per_entity() {
        let (pipeline, _) = sample_pipeline();
        let k = pipeline.kpis(2025, EntityScope::All, as_of());

        assert_eq!(k.positions.len(), 2);
        let conceptstore = &k.positions[0];
        assert_eq!(conceptstore.name, "LAB Conceptstore B.V.");
        assert_eq!(conceptstore.bank, dec!(10000));
        assert_eq!(conceptstore.receivables, dec!(1000));
        assert_eq!(conceptstore.payables, dec!(300));
        assert_eq!(conceptstore.net, dec!(10700));

        let shops = &k.positions[1];
        assert_eq!(shops.bank, dec!(2500));
        assert_eq!(shops.receivables, Decimal::ZERO);
        assert_eq!(shops.payables, dec!(150));
        assert_eq!(shops.net, dec!(2350));
        assert!(!shops.is_negative());
    }

    #[test]
    fn single_entity_scope() {
        let (pipeline, _) = sample_pipeline();
        let k = pipeline.kpis(2025, EntityScope::One(2), as_of());

        assert_eq!(k.entity, Some(2));
        assert_eq!(k.total_revenue, dec!(750));
        assert_eq!(k.total_costs, dec!(70));
        assert_eq!(k.total_bank, dec!(2500));
        assert_eq!(k.total_intercompany, Decimal::ZERO);
        assert_eq!(k.positions.len(), 1);
        assert_eq!(k.positions[0].entity_id, 2);
    }

    #[test]
    fn no_revenue_means_zero_margin() {
        let (pipeline, _) = sample_pipeline();
        let k = pipeline.kpis(2023, EntityScope::All, as_of());
        assert_eq!(k.total_revenue, Decimal::ZERO);
        assert_eq!(k.margin_pct, Decimal::ZERO);
    }
}

mod degradation {
    use super::*;

    #[test]
    fn bank_timeout_keeps_other_sources() {
        let remote = MockRemotePort::new(sample_fixture()).failing("account.journal", Failure::Timeout);
        let pipeline = pipeline_over(remote);
        let k = pipeline.kpis(2025, EntityScope::All, as_of());

        assert_eq!(k.total_bank, Decimal::ZERO);
        assert_eq!(k.total_revenue, dec!(1750));
        assert_eq!(k.receivables, dec!(1000));
        assert_eq!(k.diagnostics.len(), 1);
        assert_eq!(k.diagnostics[0].source, "bank");
        assert!(!k.diagnostics[0].partial);
        assert!(k.diagnostics[0].message.contains("timed out"));
    }

    #[test]
    fn partner_lookup_failure_keeps_group_items() {
        let remote = MockRemotePort::new(sample_fixture()).failing("res.partner", Failure::Fault);
        let pipeline = pipeline_over(remote);
        let receivables = pipeline.open_receivables(EntityScope::All);

        assert!(receivables.is_degraded());
        assert_eq!(receivables.diagnostics[0].source, "partners");
        let total: Decimal = receivables.data.iter().map(|i| i.residual_amount).sum();
        assert_eq!(total, dec!(6000));
    }

    #[test]
    fn ledger_outage_leaves_balances() {
        let remote = MockRemotePort::new(sample_fixture()).failing(LINES, Failure::Transport);
        let pipeline = pipeline_over(remote);
        let k = pipeline.kpis(2025, EntityScope::All, as_of());

        assert_eq!(k.total_revenue, Decimal::ZERO);
        assert_eq!(k.total_costs, Decimal::ZERO);
        assert_eq!(k.total_bank, dec!(12500));
        let sources: Vec<&str> = k.diagnostics.iter().map(|d| d.source.as_str()).collect();
        for expected in ["revenue", "costs", "receivables", "payables", "daily sales"] {
            assert!(sources.contains(&expected), "missing {expected} in {sources:?}");
        }
    }

    #[test]
    fn failed_page_returns_partial_records() {
        let remote = MockRemotePort::new(sample_fixture()).failing_reads_from(LINES, 2);
        let settings = PipelineSettings {
            chunk_size: 2,
            ..sample_settings()
        };
        let pipeline = LedgerPipeline::new(Box::new(remote), Taxonomy::default(), settings);
        let revenue = pipeline.revenue_lines(2025, EntityScope::All);

        assert_eq!(revenue.data.len(), 2);
        let ids: Vec<i64> = revenue.data.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(revenue.diagnostics.len(), 1);
        assert!(revenue.diagnostics[0].partial);
        assert!(revenue.diagnostics[0].message.starts_with("2 of 3 records"));
    }

    #[test]
    fn partial_results_are_not_cached() {
        let remote = MockRemotePort::new(sample_fixture()).failing_reads_from(LINES, 2);
        let log = remote.log();
        let settings = PipelineSettings {
            chunk_size: 2,
            ..sample_settings()
        };
        let pipeline = LedgerPipeline::new(Box::new(remote), Taxonomy::default(), settings);

        pipeline.revenue_lines(2025, EntityScope::All);
        pipeline.revenue_lines(2025, EntityScope::All);
        assert_eq!(log.borrow().counts(LINES), 2);
        assert_eq!(pipeline.cached_queries(), 0);
    }

    #[test]
    fn undecodable_rows_are_skipped() {
        let mut fixture = sample_fixture();
        fixture["account.move.line"][0]
            .as_object_mut()
            .unwrap()
            .remove("company_id");
        let pipeline = pipeline_over(MockRemotePort::new(fixture));
        let revenue = pipeline.revenue_lines(2025, EntityScope::All);

        assert_eq!(revenue.data.len(), 2);
        assert!(revenue.diagnostics[0].message.contains("1 records could not be decoded"));
    }
}

mod caching {
    use super::*;

    struct ManualClock(Rc<Cell<Instant>>);

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.0.get()
        }
    }

    #[test]
    fn repeated_kpis_hit_the_backend_once() {
        let (pipeline, log) = sample_pipeline();
        pipeline.kpis(2025, EntityScope::All, as_of());
        let calls = log.borrow().total();
        assert!(calls > 0);

        pipeline.kpis(2025, EntityScope::All, as_of());
        assert_eq!(log.borrow().total(), calls);
    }

    #[test]
    fn partner_search_runs_once_for_both_sides() {
        let (pipeline, log) = sample_pipeline();
        pipeline.open_receivables(EntityScope::All);
        pipeline.open_payables(EntityScope::All);
        assert_eq!(log.borrow().searches("res.partner"), 1);
    }

    #[test]
    fn partner_list_expires_with_the_open_items() {
        let now = Rc::new(Cell::new(Instant::now()));
        let remote = MockRemotePort::new(sample_fixture());
        let log = remote.log();
        let pipeline = pipeline_over(remote)
            .with_cache(ResultCache::with_clock(Box::new(ManualClock(Rc::clone(&now)))));

        pipeline.open_receivables(EntityScope::All);
        now.set(now.get() + Duration::from_secs(3600));
        let items = pipeline.open_receivables(EntityScope::All);

        assert_eq!(log.borrow().counts(LINES), 2);
        assert_eq!(log.borrow().searches("res.partner"), 2);
        assert_eq!(items.data.len(), 2);
    }

    #[test]
    fn invalidate_drops_the_partner_list() {
        let (pipeline, log) = sample_pipeline();
        pipeline.open_payables(EntityScope::All);
        pipeline.invalidate();
        pipeline.open_payables(EntityScope::All);
        assert_eq!(log.borrow().searches("res.partner"), 2);
    }

    #[test]
    fn entity_scope_is_part_of_the_key() {
        let (pipeline, log) = sample_pipeline();
        pipeline.revenue_lines(2025, EntityScope::All);
        pipeline.revenue_lines(2025, EntityScope::One(1));
        pipeline.revenue_lines(2025, EntityScope::One(1));
        assert_eq!(log.borrow().counts(LINES), 2);
        assert_eq!(pipeline.cached_queries(), 2);
    }

    #[test]
    fn invalidate_forces_refetch() {
        let (pipeline, log) = sample_pipeline();
        pipeline.revenue_lines(2025, EntityScope::All);
        pipeline.invalidate();
        assert_eq!(pipeline.cached_queries(), 0);
        pipeline.revenue_lines(2025, EntityScope::All);
        assert_eq!(log.borrow().counts(LINES), 2);
    }

    #[test]
    fn balances_expire_before_ledger_lines() {
        let now = Rc::new(Cell::new(Instant::now()));
        let remote = MockRemotePort::new(sample_fixture());
        let log = remote.log();
        let pipeline = pipeline_over(remote)
            .with_cache(ResultCache::with_clock(Box::new(ManualClock(Rc::clone(&now)))));

        pipeline.bank_balances(EntityScope::All);
        pipeline.revenue_lines(2025, EntityScope::All);
        now.set(now.get() + Duration::from_secs(120));
        pipeline.bank_balances(EntityScope::All);
        pipeline.revenue_lines(2025, EntityScope::All);

        assert_eq!(log.borrow().counts("account.journal"), 2);
        assert_eq!(log.borrow().counts(LINES), 1);
    }

    #[test]
    fn failures_are_retried_on_next_call() {
        let remote = MockRemotePort::new(sample_fixture()).failing("account.journal", Failure::Timeout);
        let log = remote.log();
        let pipeline = pipeline_over(remote);
        pipeline.bank_balances(EntityScope::All);
        pipeline.bank_balances(EntityScope::All);
        assert_eq!(log.borrow().counts("account.journal"), 2);
    }
}

mod balances {
    use super::*;

    #[test]
    fn unresolved_code_is_looked_up() {
        let (pipeline, log) = sample_pipeline();
        let groups = pipeline.bank_balances(EntityScope::All).data;

        let bank: Vec<&str> = groups.bank.iter().map(|j| j.label.as_str()).collect();
        assert_eq!(bank, vec!["ING Bank", "Rabobank"]);
        let savings = groups
            .intercompany
            .iter()
            .find(|j| j.label == "Spaarrekening")
            .unwrap();
        assert_eq!(savings.account_code, "120900");
        assert_eq!(log.borrow().reads("account.account"), 1);
    }

    #[test]
    fn all_signals_policy_skips_lookup() {
        let remote = MockRemotePort::new(sample_fixture());
        let log = remote.log();
        let taxonomy = Taxonomy {
            journals: JournalClassifier {
                policy: IntercompanyPolicy::AllSignals,
                ..JournalClassifier::default()
            },
            ..Taxonomy::default()
        };
        let pipeline = LedgerPipeline::new(Box::new(remote), taxonomy, sample_settings());
        let groups = pipeline.bank_balances(EntityScope::All).data;

        assert_eq!(groups.bank_total(), dec!(13500));
        assert_eq!(groups.intercompany_total(), dec!(750));
        assert_eq!(log.borrow().counts("account.account"), 0);
    }

    #[test]
    fn cash_journals_are_not_bank() {
        let (pipeline, _) = sample_pipeline();
        let groups = pipeline.bank_balances(EntityScope::One(2)).data;
        assert_eq!(groups.bank.len(), 1);
        assert_eq!(groups.bank[0].label, "Rabobank");
    }
}

mod summaries {
    use super::*;

    #[test]
    fn by_category_totals() {
        let (pipeline, _) = sample_pipeline();
        let rows = pipeline
            .summary(2025, EntityScope::All, BucketBy::by_category())
            .data;
        let total_of = |label: &str| {
            rows.iter()
                .find(|r| r.category.as_deref() == Some(label))
                .map(|r| r.total)
        };

        assert_eq!(total_of("Omzet"), Some(dec!(1750)));
        assert_eq!(total_of("Personeelskosten"), Some(dec!(300)));
        assert_eq!(total_of("Kantoorkosten"), Some(dec!(50)));
        assert_eq!(total_of("Kostprijs verkopen"), Some(dec!(200)));
        assert_eq!(total_of("Other (76)"), Some(dec!(20)));
        assert_eq!(total_of("Afschrijvingen"), None);
        assert_eq!(grand_total(&rows), dec!(2320));
    }

    #[test]
    fn monthly_by_entity_keys() {
        let (pipeline, _) = sample_pipeline();
        let rows = pipeline
            .summary(2025, EntityScope::All, BucketBy::monthly().with_entity())
            .data;
        let keys: Vec<(String, u32)> = rows
            .iter()
            .map(|r| (r.period_key.clone().unwrap(), r.entity_id.unwrap()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("2025-01".to_string(), 1),
                ("2025-02".to_string(), 2),
                ("2025-03".to_string(), 1),
                ("2025-03".to_string(), 2),
            ]
        );
        assert_eq!(rows[0].total, dec!(1300));
    }

    #[test]
    fn invoices_exclude_drafts() {
        let (pipeline, _) = sample_pipeline();
        let invoices = pipeline.invoices(2025, EntityScope::All).data;
        assert_eq!(invoices.len(), 3);

        let summary = summarize_invoices(&invoices);
        let kinds: Vec<InvoiceKind> = summary.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![InvoiceKind::Sale, InvoiceKind::Purchase, InvoiceKind::CreditNote]
        );
        assert_eq!(summary[0].total, dec!(1210));
        assert_eq!(summary[1].residual, dec!(363));
    }
}

mod forecast {
    use super::*;

    #[test]
    fn projection_from_sample_position() {
        let (pipeline, _) = sample_pipeline();
        let run = pipeline.forecast(EntityScope::All, as_of(), 2025);

        assert!(run.diagnostics.is_empty());
        assert_eq!(run.receivables.due_1w, dec!(400));
        assert_eq!(run.receivables.beyond, dec!(600));
        assert_eq!(run.payables.due_1w, dec!(300));
        assert_eq!(run.payables.due_4w, dec!(150));

        // 74 days elapsed on 2025-03-15
        assert_eq!(run.run_rate.revenue, dec!(165.54));
        assert_eq!(run.run_rate.cost, dec!(53.92));

        let projection = &run.projection;
        assert_eq!(projection.opening_balance, dec!(12500));
        assert_eq!(projection.points.len(), 12);
        assert_eq!(projection.points[0].receivables_remaining, dec!(600));
        assert_eq!(projection.points[0].payables_remaining, dec!(150));
        assert_eq!(projection.points[7].receivables_remaining, Decimal::ZERO);
        assert_eq!(projection.points[7].payables_remaining, Decimal::ZERO);
        assert!(projection.warning.is_none());
    }

    #[test]
    fn closing_balances_follow_the_recurrence() {
        let (pipeline, _) = sample_pipeline();
        let projection = pipeline.forecast(EntityScope::All, as_of(), 2025).projection;

        let mut balance = projection.opening_balance;
        for p in &projection.points {
            balance = balance + p.inflow - p.outflow;
            assert_eq!(p.closing_balance, balance);
        }
    }

    #[test]
    fn bank_outage_projects_from_zero() {
        let remote = MockRemotePort::new(sample_fixture()).failing("account.journal", Failure::Timeout);
        let run = pipeline_over(remote).forecast(EntityScope::All, as_of(), 2025);
        assert_eq!(run.projection.opening_balance, Decimal::ZERO);
        assert_eq!(run.diagnostics[0].source, "bank");
    }
}

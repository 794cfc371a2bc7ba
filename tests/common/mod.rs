#![allow(dead_code)]

use chrono::NaiveDate;
use ledgerlens::adapters::fixture_adapter::FixtureAdapter;
use ledgerlens::domain::error::LedgerError;
use ledgerlens::domain::filter::Filter;
use ledgerlens::domain::pipeline::{LedgerPipeline, PipelineSettings};
use ledgerlens::domain::records::RemoteRecord;
use ledgerlens::domain::taxonomy::Taxonomy;
use ledgerlens::ports::remote_port::RemotePort;
use serde_json::{Value, json};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

#[derive(Debug, Clone, Copy)]
pub enum Failure {
    Timeout,
    Fault,
    Transport,
}

impl Failure {
    fn to_error(self, model: &str) -> LedgerError {
        match self {
            Failure::Timeout => LedgerError::RemoteTimeout {
                model: model.to_string(),
                timeout_secs: 30,
            },
            Failure::Fault => LedgerError::RemoteError {
                model: model.to_string(),
                message: "Access Denied".to_string(),
            },
            Failure::Transport => LedgerError::Transport {
                reason: "connection refused".to_string(),
            },
        }
    }
}

/// Calls per model, shared with the test after the mock is boxed.
#[derive(Debug, Default)]
pub struct CallLog {
    pub counts: HashMap<String, usize>,
    pub reads: HashMap<String, usize>,
    pub searches: HashMap<String, usize>,
}

impl CallLog {
    pub fn counts(&self, model: &str) -> usize {
        self.counts.get(model).copied().unwrap_or(0)
    }

    pub fn reads(&self, model: &str) -> usize {
        self.reads.get(model).copied().unwrap_or(0)
    }

    pub fn searches(&self, model: &str) -> usize {
        self.searches.get(model).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum::<usize>()
            + self.reads.values().sum::<usize>()
            + self.searches.values().sum::<usize>()
    }
}

/// Fixture-backed remote with call counting and injectable failures.
pub struct MockRemotePort {
    inner: FixtureAdapter,
    log: Rc<RefCell<CallLog>>,
    failures: HashMap<String, Failure>,
    fail_reads_from: HashMap<String, usize>,
}

impl MockRemotePort {
    pub fn new(fixture: Value) -> Self {
        Self {
            inner: FixtureAdapter::from_json(&fixture.to_string()).unwrap(),
            log: Rc::new(RefCell::new(CallLog::default())),
            failures: HashMap::new(),
            fail_reads_from: HashMap::new(),
        }
    }

    pub fn log(&self) -> Rc<RefCell<CallLog>> {
        Rc::clone(&self.log)
    }

    /// Every call against `model` fails.
    pub fn failing(mut self, model: &str, failure: Failure) -> Self {
        self.failures.insert(model.to_string(), failure);
        self
    }

    /// Pages of `model` starting at or after `offset` time out.
    pub fn failing_reads_from(mut self, model: &str, offset: usize) -> Self {
        self.fail_reads_from.insert(model.to_string(), offset);
        self
    }

    fn check(&self, model: &str) -> Result<(), LedgerError> {
        match self.failures.get(model) {
            Some(f) => Err(f.to_error(model)),
            None => Ok(()),
        }
    }
}

fn bump(map: &mut HashMap<String, usize>, model: &str) {
    *map.entry(model.to_string()).or_insert(0) += 1;
}

impl RemotePort for MockRemotePort {
    fn search_count(&self, model: &str, filter: &Filter) -> Result<usize, LedgerError> {
        bump(&mut self.log.borrow_mut().counts, model);
        self.check(model)?;
        self.inner.search_count(model, filter)
    }

    fn search_read(
        &self,
        model: &str,
        filter: &Filter,
        fields: &[&str],
        offset: usize,
        limit: usize,
    ) -> Result<Vec<RemoteRecord>, LedgerError> {
        bump(&mut self.log.borrow_mut().reads, model);
        self.check(model)?;
        if self.fail_reads_from.get(model).is_some_and(|from| offset >= *from) {
            return Err(Failure::Timeout.to_error(model));
        }
        self.inner.search_read(model, filter, fields, offset, limit)
    }

    fn search(&self, model: &str, filter: &Filter) -> Result<Vec<i64>, LedgerError> {
        bump(&mut self.log.borrow_mut().searches, model);
        self.check(model)?;
        self.inner.search(model, filter)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// The reference date the sample data is built around.
pub fn as_of() -> NaiveDate {
    date(2025, 3, 15)
}

pub fn ledger_line(id: i64, day: &str, account: &str, balance: f64, company: u32) -> Value {
    json!({
        "id": id,
        "date": day,
        "balance": balance,
        "company_id": [company, format!("Company {}", company)],
        "account_id": [id + 1000, account],
        "partner_id": false,
        "move_name": format!("MISC/{}", id),
        "parent_state": "posted",
    })
}

pub fn open_item(
    id: i64,
    account_type: &str,
    company: u32,
    partner: (i64, &str),
    residual: f64,
    due: &str,
    reconciled: bool,
) -> Value {
    let account = if account_type == "asset_receivable" {
        "130000 Debiteuren"
    } else {
        "140000 Crediteuren"
    };
    json!({
        "id": id,
        "date": "2025-02-01",
        "balance": residual,
        "amount_residual": residual,
        "company_id": [company, format!("Company {}", company)],
        "account_id": [id + 1000, account],
        "account_id.account_type": account_type,
        "partner_id": [partner.0, partner.1],
        "date_maturity": due,
        "reconciled": reconciled,
        "parent_state": "posted",
    })
}

pub fn journal(id: i64, name: &str, company: u32, balance: f64, account: Value, kind: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "type": kind,
        "company_id": [company, format!("Company {}", company)],
        "current_balance": balance,
        "default_account_id": account,
    })
}

pub fn invoice(id: i64, move_type: &str, company: u32, total: f64, residual: f64, state: &str) -> Value {
    json!({
        "id": id,
        "company_id": [company, format!("Company {}", company)],
        "partner_id": [100, "Acme Retail"],
        "move_type": move_type,
        "amount_total": total,
        "amount_residual": residual,
        "payment_state": if residual == 0.0 { "paid" } else { "not_paid" },
        "state": state,
        "date": "2025-01-15",
        "invoice_date": "2025-01-15",
    })
}

/// Two entities, one year of activity, open items around [`as_of`].
///
/// - revenue 2025: 1000 + 500 + 250 = 1750 (the 250 booked on 2025-03-14)
/// - costs 2025 in scope: 300 + 50 + 200 + 20 = 570; depreciation (48) is out of scope
/// - bank 12500, intercompany 1750 (one journal resolved through the chart)
/// - receivables 1000 after excluding the group partner, payables 450
pub fn sample_fixture() -> Value {
    let mut lines = vec![
        ledger_line(1, "2025-01-15", "800001 Omzet hoog", -1000.0, 1),
        ledger_line(2, "2025-02-10", "800001 Omzet hoog", -500.0, 2),
        ledger_line(3, "2025-01-20", "400100 Lonen", 300.0, 1),
        ledger_line(4, "2025-02-05", "430000 Kantoorartikelen", 50.0, 2),
        ledger_line(5, "2025-01-31", "480000 Afschrijving", 100.0, 1),
        ledger_line(6, "2025-03-01", "700000 Inkoop", 200.0, 1),
        ledger_line(7, "2025-03-03", "760000 Overig", 20.0, 2),
        ledger_line(8, "2024-12-31", "800001 Omzet hoog", -999.0, 1),
        ledger_line(10, "2025-03-14", "800002 Omzet laag", -250.0, 2),
    ];
    let mut draft = ledger_line(9, "2025-02-01", "800001 Omzet hoog", -400.0, 1);
    draft["parent_state"] = json!("draft");
    lines.push(draft);

    lines.extend([
        open_item(20, "asset_receivable", 1, (100, "Acme Retail"), 400.0, "2025-03-18", false),
        open_item(21, "asset_receivable", 2, (101, "LAB Shops B.V."), 5000.0, "2025-03-20", false),
        open_item(22, "asset_receivable", 1, (102, "Bakker Brood"), 600.0, "2025-04-30", false),
        open_item(23, "asset_receivable", 1, (100, "Acme Retail"), 999.0, "2025-03-16", true),
        open_item(24, "liability_payable", 1, (103, "Groothandel Jansen"), -300.0, "2025-03-20", false),
        open_item(25, "liability_payable", 2, (103, "Groothandel Jansen"), -150.0, "2025-04-05", false),
    ]);

    json!({
        "account.move.line": lines,
        "account.journal": [
            journal(40, "ING Bank", 1, 10000.0, json!([50, "110000 ING"]), "bank"),
            journal(41, "Rabobank", 2, 2500.0, json!([51, "110100 Rabo"]), "bank"),
            journal(42, "Intercompany R/C Shops", 1, 750.0, json!([52, "120500 RC Shops"]), "bank"),
            journal(43, "Kas", 2, 50.0, json!([54, "100000 Kas"]), "cash"),
            journal(44, "Spaarrekening", 1, 1000.0, json!(53), "bank"),
        ],
        "account.account": [
            { "id": 53, "code": "120900", "name": "RC Projects" },
        ],
        "res.partner": [
            { "id": 100, "name": "Acme Retail" },
            { "id": 101, "name": "LAB Shops B.V." },
            { "id": 102, "name": "Bakker Brood" },
            { "id": 103, "name": "Groothandel Jansen" },
        ],
        "account.move": [
            invoice(60, "out_invoice", 1, 1210.0, 0.0, "posted"),
            invoice(61, "in_invoice", 2, 363.0, 363.0, "posted"),
            invoice(62, "out_refund", 1, 121.0, 0.0, "posted"),
            invoice(63, "out_invoice", 1, 500.0, 500.0, "draft"),
        ],
    })
}

pub fn sample_entities() -> BTreeMap<u32, String> {
    BTreeMap::from([
        (1, "LAB Conceptstore B.V.".to_string()),
        (2, "LAB Shops B.V.".to_string()),
    ])
}

pub fn sample_settings() -> PipelineSettings {
    PipelineSettings {
        entities: sample_entities(),
        ..PipelineSettings::default()
    }
}

pub fn pipeline_over(remote: MockRemotePort) -> LedgerPipeline {
    LedgerPipeline::new(Box::new(remote), Taxonomy::default(), sample_settings())
}

pub fn sample_pipeline() -> (LedgerPipeline, Rc<RefCell<CallLog>>) {
    let remote = MockRemotePort::new(sample_fixture());
    let log = remote.log();
    (pipeline_over(remote), log)
}

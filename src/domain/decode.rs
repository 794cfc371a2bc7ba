//! Decoding of raw backend rows into typed records.
//!
//! The backend returns many-to-one fields as `[id, "display name"]` pairs and
//! unset fields as `false`. Monetary floats are converted to [`Decimal`] and
//! rounded to cents here, once.

use crate::domain::error::LedgerError;
use crate::domain::records::{
    AccountRef, EntityId, Invoice, InvoiceKind, JournalBalance, LedgerLine, OpenItem, RemoteRecord,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value as Json;

pub const MONEY_SCALE: u32 = 2;

/// A record type that can be read from one backend model.
pub trait FromRecord: Sized {
    const MODEL: &'static str;

    fn fields() -> &'static [&'static str];

    fn from_record(record: &RemoteRecord) -> Result<Self, LedgerError>;
}

/// Decodes every row, skipping the ones that fail. Skipped rows are returned
/// as errors so callers can surface them.
pub fn decode_all<T: FromRecord>(records: &[RemoteRecord]) -> (Vec<T>, Vec<LedgerError>) {
    let mut decoded = Vec::with_capacity(records.len());
    let mut skipped = Vec::new();
    for record in records {
        match T::from_record(record) {
            Ok(value) => decoded.push(value),
            Err(e) => {
                tracing::warn!(model = T::MODEL, error = %e, "skipping undecodable record");
                skipped.push(e);
            }
        }
    }
    (decoded, skipped)
}

pub fn id(record: &RemoteRecord, model: &str) -> Result<i64, LedgerError> {
    record
        .get("id")
        .and_then(Json::as_i64)
        .ok_or_else(|| LedgerError::decode(model, "missing id"))
}

pub fn many2one_id(record: &RemoteRecord, key: &str) -> Option<i64> {
    match record.get(key)? {
        Json::Array(pair) => pair.first().and_then(Json::as_i64),
        Json::Number(n) => n.as_i64(),
        _ => None,
    }
}

pub fn many2one_name<'a>(record: &'a RemoteRecord, key: &str) -> Option<&'a str> {
    match record.get(key)? {
        Json::Array(pair) => pair.get(1).and_then(Json::as_str),
        _ => None,
    }
}

pub fn text(record: &RemoteRecord, key: &str) -> Option<String> {
    record.get(key).and_then(Json::as_str).map(str::to_string)
}

/// Reads a monetary field; unset or absent fields count as zero.
pub fn money(record: &RemoteRecord, key: &str, model: &str) -> Result<Decimal, LedgerError> {
    match record.get(key) {
        None | Some(Json::Null) | Some(Json::Bool(false)) => Ok(Decimal::ZERO),
        Some(Json::Number(n)) => {
            if let Some(i) = n.as_i64() {
                return Ok(Decimal::from(i));
            }
            let f = n
                .as_f64()
                .ok_or_else(|| LedgerError::decode(model, format!("{key} is not a number")))?;
            Decimal::try_from(f)
                .map(|d| d.round_dp(MONEY_SCALE))
                .map_err(|e| LedgerError::decode(model, format!("{key}: {e}")))
        }
        Some(Json::String(s)) => s
            .parse::<Decimal>()
            .map(|d| d.round_dp(MONEY_SCALE))
            .map_err(|e| LedgerError::decode(model, format!("{key}: {e}"))),
        Some(other) => Err(LedgerError::decode(
            model,
            format!("{key} has unexpected value {other}"),
        )),
    }
}

/// Reads an ISO date; datetimes are truncated to their date part. Unset or
/// malformed values yield `None`.
pub fn date(record: &RemoteRecord, key: &str) -> Option<NaiveDate> {
    let raw = record.get(key)?.as_str()?;
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn entity(record: &RemoteRecord, model: &str) -> Result<EntityId, LedgerError> {
    many2one_id(record, "company_id")
        .and_then(|id| EntityId::try_from(id).ok())
        .ok_or_else(|| LedgerError::decode(model, "missing company_id"))
}

/// Splits an account display name such as `"800001 Omzet hoog"` into code and name.
pub fn split_account_display(display: &str) -> (String, String) {
    match display.trim().split_once(' ') {
        Some((code, name)) => (code.to_string(), name.trim().to_string()),
        None => (display.trim().to_string(), String::new()),
    }
}

impl FromRecord for LedgerLine {
    const MODEL: &'static str = "account.move.line";

    fn fields() -> &'static [&'static str] {
        &["id", "date", "balance", "company_id", "account_id", "partner_id", "move_name"]
    }

    fn from_record(record: &RemoteRecord) -> Result<Self, LedgerError> {
        let display = many2one_name(record, "account_id")
            .ok_or_else(|| LedgerError::decode(Self::MODEL, "missing account_id"))?;
        let (account_code, account_name) = split_account_display(display);
        Ok(LedgerLine {
            id: id(record, Self::MODEL)?,
            date: date(record, "date"),
            amount: money(record, "balance", Self::MODEL)?,
            account_code,
            account_name,
            entity_id: entity(record, Self::MODEL)?,
            counterparty_id: many2one_id(record, "partner_id"),
            document_ref: text(record, "move_name"),
        })
    }
}

impl FromRecord for JournalBalance {
    const MODEL: &'static str = "account.journal";

    fn fields() -> &'static [&'static str] {
        &["id", "name", "company_id", "current_balance", "default_account_id"]
    }

    fn from_record(record: &RemoteRecord) -> Result<Self, LedgerError> {
        let account_code = many2one_name(record, "default_account_id")
            .map(|display| split_account_display(display).0)
            .unwrap_or_default();
        Ok(JournalBalance {
            journal_id: id(record, Self::MODEL)?,
            entity_id: entity(record, Self::MODEL)?,
            account_code,
            label: text(record, "name").unwrap_or_default(),
            balance: money(record, "current_balance", Self::MODEL)?,
            account_id: many2one_id(record, "default_account_id"),
        })
    }
}

impl FromRecord for OpenItem {
    const MODEL: &'static str = "account.move.line";

    fn fields() -> &'static [&'static str] {
        &["id", "balance", "amount_residual", "company_id", "partner_id", "date_maturity"]
    }

    fn from_record(record: &RemoteRecord) -> Result<Self, LedgerError> {
        let residual_amount = if record.contains_key("amount_residual") {
            money(record, "amount_residual", Self::MODEL)?
        } else {
            money(record, "balance", Self::MODEL)?
        };
        Ok(OpenItem {
            entity_id: entity(record, Self::MODEL)?,
            counterparty_id: many2one_id(record, "partner_id"),
            residual_amount,
            due_date: date(record, "date_maturity"),
        })
    }
}

impl FromRecord for Invoice {
    const MODEL: &'static str = "account.move";

    fn fields() -> &'static [&'static str] {
        &[
            "id",
            "company_id",
            "partner_id",
            "move_type",
            "amount_total",
            "amount_residual",
            "payment_state",
            "state",
            "invoice_date",
        ]
    }

    fn from_record(record: &RemoteRecord) -> Result<Self, LedgerError> {
        let move_type = text(record, "move_type").unwrap_or_default();
        let kind = InvoiceKind::from_move_type(&move_type).ok_or_else(|| {
            LedgerError::decode(Self::MODEL, format!("unsupported move_type '{move_type}'"))
        })?;
        let status = text(record, "payment_state")
            .or_else(|| text(record, "state"))
            .unwrap_or_else(|| "unknown".to_string());
        Ok(Invoice {
            id: id(record, Self::MODEL)?,
            entity_id: entity(record, Self::MODEL)?,
            counterparty_id: many2one_id(record, "partner_id"),
            kind,
            total: money(record, "amount_total", Self::MODEL)?,
            residual: money(record, "amount_residual", Self::MODEL)?,
            status,
            date: date(record, "invoice_date"),
        })
    }
}

impl FromRecord for AccountRef {
    const MODEL: &'static str = "account.account";

    fn fields() -> &'static [&'static str] {
        &["id", "code", "name"]
    }

    fn from_record(record: &RemoteRecord) -> Result<Self, LedgerError> {
        Ok(AccountRef {
            id: id(record, Self::MODEL)?,
            code: text(record, "code")
                .ok_or_else(|| LedgerError::decode(Self::MODEL, "missing code"))?,
            name: text(record, "name").unwrap_or_default(),
        })
    }
}

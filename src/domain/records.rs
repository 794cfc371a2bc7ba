//! Typed records decoded from the remote backend.
//!
//! Remote rows arrive as loosely-typed JSON objects ([`RemoteRecord`]). They are
//! decoded exactly once, at the fetch boundary (see [`crate::domain::decode`]),
//! into the structs below; everything downstream works with these types and
//! never re-checks key presence.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

/// A raw row as returned by the backend.
pub type RemoteRecord = serde_json::Map<String, serde_json::Value>;

/// Small integer key of a legal entity within the group.
pub type EntityId = u32;

/// Which entities a query covers. `0` or an absent id means all entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EntityScope {
    #[default]
    All,
    One(EntityId),
}

impl EntityScope {
    pub fn from_id(id: Option<EntityId>) -> Self {
        match id {
            None | Some(0) => EntityScope::All,
            Some(id) => EntityScope::One(id),
        }
    }

    pub fn id(&self) -> Option<EntityId> {
        match self {
            EntityScope::All => None,
            EntityScope::One(id) => Some(*id),
        }
    }

    pub fn includes(&self, entity_id: EntityId) -> bool {
        match self {
            EntityScope::All => true,
            EntityScope::One(id) => *id == entity_id,
        }
    }
}

impl fmt::Display for EntityScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityScope::All => write!(f, "all"),
            EntityScope::One(id) => write!(f, "{}", id),
        }
    }
}

/// A single posted ledger entry. Amounts are debit-positive, credit-negative.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerLine {
    pub id: i64,
    pub date: Option<NaiveDate>,
    pub amount: Decimal,
    pub account_code: String,
    pub account_name: String,
    pub entity_id: EntityId,
    pub counterparty_id: Option<i64>,
    pub document_ref: Option<String>,
}

/// A bank or intercompany-settlement position at query time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JournalBalance {
    pub journal_id: i64,
    pub entity_id: EntityId,
    /// Code of the journal's default account; empty until resolved.
    pub account_code: String,
    pub label: String,
    pub balance: Decimal,
    pub account_id: Option<i64>,
}

/// An unreconciled receivable or payable line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenItem {
    pub entity_id: EntityId,
    pub counterparty_id: Option<i64>,
    pub residual_amount: Decimal,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum InvoiceKind {
    Sale,
    Purchase,
    CreditNote,
}

impl InvoiceKind {
    /// Maps the backend's `move_type`; entries and receipts are not invoices.
    pub fn from_move_type(move_type: &str) -> Option<Self> {
        match move_type {
            "out_invoice" => Some(InvoiceKind::Sale),
            "in_invoice" => Some(InvoiceKind::Purchase),
            "out_refund" | "in_refund" => Some(InvoiceKind::CreditNote),
            _ => None,
        }
    }

    pub fn move_types() -> [&'static str; 4] {
        ["out_invoice", "in_invoice", "out_refund", "in_refund"]
    }
}

impl fmt::Display for InvoiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvoiceKind::Sale => write!(f, "sale"),
            InvoiceKind::Purchase => write!(f, "purchase"),
            InvoiceKind::CreditNote => write!(f, "credit-note"),
        }
    }
}

/// Read-only projection of an invoice's settlement state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Invoice {
    pub id: i64,
    pub entity_id: EntityId,
    pub counterparty_id: Option<i64>,
    pub kind: InvoiceKind,
    pub total: Decimal,
    pub residual: Decimal,
    pub status: String,
    pub date: Option<NaiveDate>,
}

/// Chart-of-accounts row, used to resolve the code behind a journal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountRef {
    pub id: i64,
    pub code: String,
    pub name: String,
}

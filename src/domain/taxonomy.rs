//! Classification of ledger accounts into the business taxonomy.
//!
//! - Cost accounts: longest registered code prefix → Dutch category label.
//!   Unknown prefixes fall back to `Other (NN)` and are reported as gaps.
//! - Revenue accounts: codes in the revenue band (`8*`); their credit-negative
//!   amounts are reported as positive revenue.
//! - Journals: bank or intercompany, decided by a two-stage classifier. Stage 1
//!   is a label heuristic (marker substrings), stage 2 an authoritative check of
//!   the account code against the reserved intercompany bands. How the two
//!   signals combine is an [`IntercompanyPolicy`].

use crate::domain::filter::Filter;
use crate::domain::records::{EntityId, JournalBalance, LedgerLine};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeSet;

pub const REVENUE_LABEL: &str = "Omzet";
pub const CODE_WIDTH: usize = 6;

const DEFAULT_COST_CATEGORIES: &[(&str, &str)] = &[
    ("40", "Personeelskosten"),
    ("41", "Huisvestingskosten"),
    ("42", "Vervoerskosten"),
    ("43", "Kantoorkosten"),
    ("44", "Verkoopkosten"),
    ("45", "Algemene kosten"),
    ("46", "Overige bedrijfskosten"),
    ("47", "Financiële lasten"),
    ("48", "Afschrijvingen"),
    ("49", "Overige kosten"),
    ("70", "Kostprijs verkopen"),
    ("71", "Kostprijs verkopen"),
    ("72", "Kostprijs verkopen"),
    ("73", "Kostprijs verkopen"),
    ("74", "Kostprijs verkopen"),
    ("75", "Kostprijs verkopen"),
];

const DEFAULT_TRANSLATIONS: &[(&str, &str)] = &[
    ("Kostprijs verkopen", "Cost of sales"),
    ("Overige bedrijfskosten", "Other operating costs"),
    ("Personeelskosten", "Personnel costs"),
    ("Huisvestingskosten", "Housing costs"),
    ("Vervoerskosten", "Transport costs"),
    ("Kantoorkosten", "Office costs"),
    ("Verkoopkosten", "Selling costs"),
    ("Algemene kosten", "General costs"),
    ("Financiële lasten", "Financial expenses"),
    ("Afschrijvingen", "Depreciation"),
    ("Overige kosten", "Other costs"),
    ("Rekening courant", "Current account"),
    ("Debiteuren", "Receivables"),
    ("Crediteuren", "Payables"),
    ("Omzet", "Revenue"),
    ("Kas", "Cash"),
];

const DEFAULT_MARKERS: &[&str] = &["intercompany", "rekening courant", "r/c"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum CategoryKind {
    Revenue,
    Cost,
}

impl CategoryKind {
    /// Multiplier from raw ledger sign to reported sign.
    pub fn sign(&self) -> Decimal {
        match self {
            CategoryKind::Revenue => Decimal::NEGATIVE_ONE,
            CategoryKind::Cost => Decimal::ONE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxonomyEntry {
    pub code_prefix: String,
    pub category_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostTaxonomy {
    entries: Vec<TaxonomyEntry>,
}

impl Default for CostTaxonomy {
    fn default() -> Self {
        Self::new(
            DEFAULT_COST_CATEGORIES
                .iter()
                .map(|(p, l)| (p.to_string(), l.to_string())),
        )
    }
}

impl CostTaxonomy {
    pub fn new<I: IntoIterator<Item = (String, String)>>(entries: I) -> Self {
        let mut taxonomy = Self { entries: vec![] };
        for (prefix, label) in entries {
            taxonomy.register(&prefix, &label);
        }
        taxonomy
    }

    /// Adds or replaces the label for `prefix`.
    pub fn register(&mut self, prefix: &str, label: &str) {
        let prefix = prefix.trim();
        match self.entries.iter_mut().find(|e| e.code_prefix == prefix) {
            Some(entry) => entry.category_label = label.trim().to_string(),
            None => self.entries.push(TaxonomyEntry {
                code_prefix: prefix.to_string(),
                category_label: label.trim().to_string(),
            }),
        }
    }

    pub fn entries(&self) -> &[TaxonomyEntry] {
        &self.entries
    }

    /// Label of the longest registered prefix of `code`.
    pub fn lookup(&self, code: &str) -> Option<&str> {
        self.entries
            .iter()
            .filter(|e| !e.code_prefix.is_empty() && code.starts_with(e.code_prefix.as_str()))
            .max_by_key(|e| e.code_prefix.len())
            .map(|e| e.category_label.as_str())
    }

    pub fn classify(&self, code: &str) -> String {
        match self.lookup(code) {
            Some(label) => label.to_string(),
            None => fallback_label(code),
        }
    }
}

/// `Other (NN)` where `NN` is the two-character primary code.
pub fn fallback_label(code: &str) -> String {
    format!("Other ({})", primary_code(code))
}

pub fn primary_code(code: &str) -> &str {
    match code.char_indices().nth(2) {
        Some((idx, _)) => &code[..idx],
        None => code,
    }
}

/// Inclusive numeric range of normalized account codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeBand {
    pub start: u64,
    pub end: u64,
}

impl CodeBand {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Parses `"120000-120999"`.
    pub fn parse(raw: &str) -> Option<Self> {
        let (start, end) = raw.split_once('-')?;
        let start = normalize_code(start.trim())?;
        let end = normalize_code(end.trim())?;
        (start <= end).then_some(Self { start, end })
    }

    pub fn contains(&self, code: &str) -> bool {
        normalize_code(code).is_some_and(|n| n >= self.start && n <= self.end)
    }
}

/// Numeric value of an account code right-padded (or truncated) to
/// [`CODE_WIDTH`] digits, so `"1205"` and `"120500"` compare equal.
pub fn normalize_code(code: &str) -> Option<u64> {
    let digits: String = code.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let mut padded: String = digits.chars().take(CODE_WIDTH).collect();
    while padded.len() < CODE_WIDTH {
        padded.push('0');
    }
    padded.parse().ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum JournalKind {
    Bank,
    Intercompany,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IntercompanySide {
    Receivable,
    Payable,
}

/// How the label heuristic and the code check combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntercompanyPolicy {
    /// Either signal reclassifies the journal as intercompany.
    #[default]
    AnySignal,
    /// Both signals must agree.
    AllSignals,
}

impl IntercompanyPolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "any" | "either" => Some(IntercompanyPolicy::AnySignal),
            "all" | "both" => Some(IntercompanyPolicy::AllSignals),
            _ => None,
        }
    }
}

/// Stage 1: case-insensitive marker substrings in the journal label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextHeuristic {
    markers: Vec<String>,
}

impl Default for TextHeuristic {
    fn default() -> Self {
        Self::new(DEFAULT_MARKERS.iter().map(|m| m.to_string()))
    }
}

impl TextHeuristic {
    pub fn new<I: IntoIterator<Item = String>>(markers: I) -> Self {
        Self {
            markers: markers
                .into_iter()
                .map(|m| m.trim().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    pub fn detect(&self, label: &str) -> Option<JournalKind> {
        let label = label.to_lowercase();
        self.markers
            .iter()
            .any(|m| label.contains(m.as_str()))
            .then_some(JournalKind::Intercompany)
    }
}

/// Stage 2: reserved intercompany code bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeRangeClassifier {
    pub receivable: CodeBand,
    pub payable: CodeBand,
}

impl Default for CodeRangeClassifier {
    fn default() -> Self {
        Self {
            receivable: CodeBand::new(120_000, 120_999),
            payable: CodeBand::new(160_000, 160_999),
        }
    }
}

impl CodeRangeClassifier {
    pub fn side(&self, code: &str) -> Option<IntercompanySide> {
        if self.receivable.contains(code) {
            Some(IntercompanySide::Receivable)
        } else if self.payable.contains(code) {
            Some(IntercompanySide::Payable)
        } else {
            None
        }
    }

    pub fn classify(&self, code: &str) -> JournalKind {
        match self.side(code) {
            Some(_) => JournalKind::Intercompany,
            None => JournalKind::Bank,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JournalClassifier {
    pub text: TextHeuristic,
    pub codes: CodeRangeClassifier,
    pub policy: IntercompanyPolicy,
}

impl JournalClassifier {
    /// Whether the authoritative code check can change the outcome for this
    /// label. Lets callers skip the secondary account lookup.
    pub fn needs_code(&self, label: &str) -> bool {
        let text_hit = self.text.detect(label).is_some();
        match self.policy {
            IntercompanyPolicy::AnySignal => !text_hit,
            IntercompanyPolicy::AllSignals => text_hit,
        }
    }

    pub fn classify(&self, label: &str, account_code: &str) -> JournalKind {
        let text_hit = self.text.detect(label).is_some();
        let code_hit = self.codes.classify(account_code) == JournalKind::Intercompany;
        let intercompany = match self.policy {
            IntercompanyPolicy::AnySignal => text_hit || code_hit,
            IntercompanyPolicy::AllSignals => text_hit && code_hit,
        };
        if intercompany {
            JournalKind::Intercompany
        } else {
            JournalKind::Bank
        }
    }
}

/// Source-to-target label table. Exact matches win; otherwise the first entry
/// whose source occurs in the name is replaced in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTranslator {
    table: Vec<(String, String)>,
}

impl Default for NameTranslator {
    fn default() -> Self {
        Self::new(
            DEFAULT_TRANSLATIONS
                .iter()
                .map(|(s, t)| (s.to_string(), t.to_string())),
        )
    }
}

impl NameTranslator {
    pub fn new<I: IntoIterator<Item = (String, String)>>(table: I) -> Self {
        Self {
            table: table.into_iter().collect(),
        }
    }

    /// Parses `"Kas:Cash, Debiteuren:Receivables"`.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut table = Vec::new();
        for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (source, target) = pair.split_once(':')?;
            table.push((source.trim().to_string(), target.trim().to_string()));
        }
        Some(Self { table })
    }

    pub fn translate(&self, name: &str) -> String {
        if let Some((_, target)) = self.table.iter().find(|(source, _)| source == name) {
            return target.clone();
        }
        match self
            .table
            .iter()
            .find(|(source, _)| !source.is_empty() && name.contains(source.as_str()))
        {
            Some((source, target)) => name.replace(source.as_str(), target),
            None => name.to_string(),
        }
    }
}

/// Which account-code prefixes the cost query covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostScope {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl Default for CostScope {
    fn default() -> Self {
        Self {
            include: vec!["4".into(), "7".into()],
            exclude: vec!["48".into(), "49".into()],
        }
    }
}

impl CostScope {
    /// `(4% AND NOT (48% OR 49%)) OR 7%` for the default scope.
    pub fn filter(&self, field: &str) -> Filter {
        let branches = self
            .include
            .iter()
            .map(|prefix| {
                let excluded: Vec<Filter> = self
                    .exclude
                    .iter()
                    .filter(|x| x.starts_with(prefix.as_str()))
                    .map(|x| Filter::code_prefix(field, x))
                    .collect();
                let base = Filter::code_prefix(field, prefix);
                if excluded.is_empty() {
                    base
                } else {
                    base.and(Filter::Or(excluded).negate())
                }
            })
            .collect();
        Filter::Or(branches)
    }

    pub fn covers(&self, code: &str) -> bool {
        self.include.iter().any(|p| code.starts_with(p.as_str()))
            && !self.exclude.iter().any(|x| code.starts_with(x.as_str()))
    }
}

/// A ledger line with its category and sign-normalized amount.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedLine {
    pub date: Option<NaiveDate>,
    pub entity_id: EntityId,
    pub category: String,
    pub kind: CategoryKind,
    pub raw_amount: Decimal,
    /// `raw_amount` times the category sign: revenue and costs both positive.
    pub amount: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct Classification {
    pub lines: Vec<ClassifiedLine>,
    /// Primary codes that matched no taxonomy entry.
    pub gaps: BTreeSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct JournalGroups {
    pub bank: Vec<JournalBalance>,
    pub intercompany: Vec<JournalBalance>,
}

impl JournalGroups {
    pub fn bank_total(&self) -> Decimal {
        self.bank.iter().map(|j| j.balance).sum()
    }

    pub fn intercompany_total(&self) -> Decimal {
        self.intercompany.iter().map(|j| j.balance).sum()
    }

    pub fn bank_total_for(&self, entity_id: EntityId) -> Decimal {
        self.bank
            .iter()
            .filter(|j| j.entity_id == entity_id)
            .map(|j| j.balance)
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Taxonomy {
    pub costs: CostTaxonomy,
    pub revenue_prefix: String,
    pub cost_scope: CostScope,
    pub journals: JournalClassifier,
    pub translator: NameTranslator,
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self {
            costs: CostTaxonomy::default(),
            revenue_prefix: "8".into(),
            cost_scope: CostScope::default(),
            journals: JournalClassifier::default(),
            translator: NameTranslator::default(),
        }
    }
}

impl Taxonomy {
    pub fn classify_cost(&self, account_code: &str) -> String {
        self.costs.classify(account_code)
    }

    pub fn classify_revenue(&self, account_code: &str) -> bool {
        !self.revenue_prefix.is_empty() && account_code.starts_with(self.revenue_prefix.as_str())
    }

    pub fn classify_bank_or_intercompany(&self, label: &str, account_code: &str) -> JournalKind {
        self.journals.classify(label, account_code)
    }

    pub fn translate(&self, name: &str) -> String {
        self.translator.translate(name)
    }

    pub fn revenue_filter(&self, field: &str) -> Filter {
        Filter::code_prefix(field, &self.revenue_prefix)
    }

    pub fn cost_filter(&self, field: &str) -> Filter {
        self.cost_scope.filter(field)
    }

    /// Assigns exactly one category to the line.
    pub fn classify_line(&self, line: &LedgerLine) -> ClassifiedLine {
        let (kind, category) = if self.classify_revenue(&line.account_code) {
            (CategoryKind::Revenue, REVENUE_LABEL.to_string())
        } else {
            (CategoryKind::Cost, self.classify_cost(&line.account_code))
        };
        ClassifiedLine {
            date: line.date,
            entity_id: line.entity_id,
            category,
            kind,
            raw_amount: line.amount,
            amount: line.amount * kind.sign(),
        }
    }

    pub fn classify_lines(&self, lines: &[LedgerLine]) -> Classification {
        let mut out = Classification::default();
        for line in lines {
            let classified = self.classify_line(line);
            if classified.kind == CategoryKind::Cost && self.costs.lookup(&line.account_code).is_none()
            {
                let primary = primary_code(&line.account_code).to_string();
                if out.gaps.insert(primary.clone()) {
                    tracing::debug!(
                        account_code = %line.account_code,
                        fallback = %classified.category,
                        "classification gap"
                    );
                }
            }
            out.lines.push(classified);
        }
        out
    }

    pub fn group_journals(&self, journals: Vec<JournalBalance>) -> JournalGroups {
        let mut groups = JournalGroups::default();
        for journal in journals {
            match self.classify_bank_or_intercompany(&journal.label, &journal.account_code) {
                JournalKind::Bank => groups.bank.push(journal),
                JournalKind::Intercompany => groups.intercompany.push(journal),
            }
        }
        groups
    }
}

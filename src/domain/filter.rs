//! Filter expression tree for remote queries.
//!
//! A filter is a boolean predicate tree of `(field, operator, value)` terms
//! combined with `And`, `Or` and `Not`. The same tree serves three purposes:
//!
//! - rendered by the JSON-RPC adapter into the backend's prefix notation
//! - rendered by [`fmt::Display`] into a canonical string used in cache signatures
//! - evaluated locally by [`Filter::matches`] for offline fixture data
//!
//! Dotted field paths (`account_id.code`) follow many-to-one pairs, which the
//! backend returns as `[id, "display name"]`.

use crate::domain::records::{EntityId, RemoteRecord};
use serde_json::Value as Json;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<Value>),
}

impl Value {
    pub fn list<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "'{}'", s.replace('\'', "\\'")),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Bool(b) => write!(f, "{}", b),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    /// Case-sensitive SQL pattern (`%`, `_`), anchored at both ends.
    Like,
    /// Case-insensitive containment pattern.
    ILike,
    In,
    NotIn,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Like => "=like",
            Operator::ILike => "ilike",
            Operator::In => "in",
            Operator::NotIn => "not in",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Term {
        field: String,
        op: Operator,
        value: Value,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn term(field: &str, op: Operator, value: impl Into<Value>) -> Self {
        Filter::Term {
            field: field.to_string(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self::term(field, Operator::Eq, value)
    }

    /// Matches codes starting with `prefix`, e.g. `code_prefix("account_id.code", "8")`.
    pub fn code_prefix(field: &str, prefix: &str) -> Self {
        Self::term(field, Operator::Like, format!("{}%", prefix))
    }

    /// Restricts to one legal entity.
    pub fn entity(id: EntityId) -> Self {
        Self::eq("company_id", id)
    }

    /// Inclusive `YYYY-01-01..=YYYY-12-31` bounds on `date`.
    pub fn year_range(year: i32) -> Self {
        Filter::And(vec![
            Self::term("date", Operator::Ge, format!("{:04}-01-01", year)),
            Self::term("date", Operator::Le, format!("{:04}-12-31", year)),
        ])
    }

    /// Conjunction that flattens nested `And` nodes.
    pub fn and(self, other: Filter) -> Self {
        let mut parts = match self {
            Filter::And(parts) => parts,
            f => vec![f],
        };
        match other {
            Filter::And(more) => parts.extend(more),
            f => parts.push(f),
        }
        Filter::And(parts)
    }

    pub fn or(self, other: Filter) -> Self {
        let mut parts = match self {
            Filter::Or(parts) => parts,
            f => vec![f],
        };
        match other {
            Filter::Or(more) => parts.extend(more),
            f => parts.push(f),
        }
        Filter::Or(parts)
    }

    pub fn negate(self) -> Self {
        match self {
            Filter::Not(inner) => *inner,
            f => Filter::Not(Box::new(f)),
        }
    }

    /// Evaluates the filter against a raw record. An empty `And` is true and
    /// an empty `Or` is false.
    pub fn matches(&self, record: &RemoteRecord) -> bool {
        match self {
            Filter::Term { field, op, value } => match resolve_field(record, field) {
                Some(actual) => compare(&actual, *op, value),
                None => compare(&Json::Null, *op, value),
            },
            Filter::And(parts) => parts.iter().all(|p| p.matches(record)),
            Filter::Or(parts) => parts.iter().any(|p| p.matches(record)),
            Filter::Not(inner) => !inner.matches(record),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Term { field, op, value } => {
                write!(f, "{} {} {}", field, op.as_str(), value)
            }
            Filter::And(parts) if parts.is_empty() => write!(f, "TRUE"),
            Filter::Or(parts) if parts.is_empty() => write!(f, "FALSE"),
            Filter::And(parts) => write_joined(f, parts, " AND "),
            Filter::Or(parts) => write_joined(f, parts, " OR "),
            Filter::Not(inner) => write!(f, "NOT {}", inner),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, parts: &[Filter], sep: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            write!(f, "{}", sep)?;
        }
        write!(f, "{}", part)?;
    }
    write!(f, ")")
}

/// Looks up `path` in the record, following one level of many-to-one pair
/// (`account_id.code`, `partner_id.name`, `company_id.id`).
pub fn resolve_field(record: &RemoteRecord, path: &str) -> Option<Json> {
    if let Some(v) = record.get(path) {
        return Some(v.clone());
    }
    let (head, tail) = path.split_once('.')?;
    match record.get(head)? {
        Json::Array(pair) => match tail {
            "id" => pair.first().cloned(),
            "name" | "display_name" => pair.get(1).cloned(),
            "code" => pair
                .get(1)
                .and_then(Json::as_str)
                .and_then(|name| name.split_whitespace().next())
                .map(|code| Json::String(code.to_string())),
            _ => None,
        },
        Json::Object(map) => {
            let nested: RemoteRecord = map.clone();
            resolve_field(&nested, tail)
        }
        _ => None,
    }
}

#[derive(Debug)]
enum Scalar<'a> {
    Null,
    Bool(bool),
    Num(f64),
    Text(&'a str),
}

/// Many-to-one pairs compare by id; text operators use their display name.
fn scalar(v: &Json) -> Scalar<'_> {
    match v {
        Json::Null => Scalar::Null,
        Json::Bool(false) => Scalar::Null,
        Json::Bool(true) => Scalar::Bool(true),
        Json::Number(n) => n.as_f64().map(Scalar::Num).unwrap_or(Scalar::Null),
        Json::String(s) => Scalar::Text(s),
        Json::Array(pair) => pair.first().map(scalar).unwrap_or(Scalar::Null),
        Json::Object(_) => Scalar::Null,
    }
}

fn text_of(v: &Json) -> Option<&str> {
    match v {
        Json::String(s) => Some(s),
        Json::Array(pair) => pair.get(1).and_then(Json::as_str),
        _ => None,
    }
}

fn equals(actual: &Scalar<'_>, expected: &Value) -> bool {
    match (actual, expected) {
        (Scalar::Null, Value::Bool(false)) => true,
        (Scalar::Bool(a), Value::Bool(b)) => a == b,
        (Scalar::Num(a), Value::Int(b)) => *a == *b as f64,
        (Scalar::Num(a), Value::Float(b)) => a == b,
        (Scalar::Text(a), Value::Str(b)) => a == b,
        _ => false,
    }
}

fn ordering(actual: &Scalar<'_>, expected: &Value) -> Option<std::cmp::Ordering> {
    match (actual, expected) {
        (Scalar::Num(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Scalar::Num(a), Value::Float(b)) => a.partial_cmp(b),
        (Scalar::Text(a), Value::Str(b)) => Some((*a).cmp(b.as_str())),
        _ => None,
    }
}

fn compare(actual: &Json, op: Operator, expected: &Value) -> bool {
    use std::cmp::Ordering::*;
    let s = scalar(actual);
    match op {
        Operator::Eq => equals(&s, expected),
        Operator::Ne => !equals(&s, expected),
        Operator::Gt => ordering(&s, expected) == Some(Greater),
        Operator::Ge => matches!(ordering(&s, expected), Some(Greater | Equal)),
        Operator::Lt => ordering(&s, expected) == Some(Less),
        Operator::Le => matches!(ordering(&s, expected), Some(Less | Equal)),
        Operator::Like => match (text_of(actual), expected) {
            (Some(text), Value::Str(pattern)) => like_match(pattern, text),
            _ => false,
        },
        Operator::ILike => match (text_of(actual), expected) {
            (Some(text), Value::Str(pattern)) => {
                let pattern = format!("%{}%", pattern.to_lowercase());
                like_match(&pattern, &text.to_lowercase())
            }
            _ => false,
        },
        Operator::In => match expected {
            Value::List(items) => items.iter().any(|item| equals(&s, item)),
            _ => false,
        },
        Operator::NotIn => match expected {
            Value::List(items) => !items.iter().any(|item| equals(&s, item)),
            _ => true,
        },
    }
}

/// SQL `LIKE` matching: `%` matches any run, `_` matches one character.
pub fn like_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    // matched[j]: pattern prefix consumed so far matches text prefix of length j
    let mut matched = vec![false; t.len() + 1];
    matched[0] = true;
    for pc in &p {
        let mut next = vec![false; t.len() + 1];
        match pc {
            '%' => {
                let mut seen = false;
                for j in 0..=t.len() {
                    seen |= matched[j];
                    next[j] = seen;
                }
            }
            '_' => {
                for j in 1..=t.len() {
                    next[j] = matched[j - 1];
                }
            }
            c => {
                for j in 1..=t.len() {
                    next[j] = matched[j - 1] && t[j - 1] == *c;
                }
            }
        }
        matched = next;
    }
    matched[t.len()]
}

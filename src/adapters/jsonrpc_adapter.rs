//! JSON-RPC backend adapter (Odoo-style `execute_kw`).
//!
//! Every call is one blocking POST bounded by the client timeout. Filters are
//! sent in the backend's prefix notation: `"&"`, `"|"` and `"!"` precede their
//! operands and n-ary nodes expand into n-1 binary operators.

use crate::domain::error::LedgerError;
use crate::domain::filter::{Filter, Value};
use crate::domain::records::RemoteRecord;
use crate::ports::remote_port::RemotePort;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{Value as Json, json};
use std::cell::Cell;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct JsonRpcConfig {
    pub url: String,
    pub database: String,
    pub uid: i64,
    pub api_key: String,
    pub timeout: Duration,
}

pub struct JsonRpcAdapter {
    config: JsonRpcConfig,
    client: Client,
    next_id: Cell<u64>,
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<Json>,
    error: Option<RpcFault>,
}

#[derive(Deserialize)]
struct RpcFault {
    #[serde(default)]
    message: String,
    data: Option<RpcFaultData>,
}

#[derive(Deserialize)]
struct RpcFaultData {
    message: Option<String>,
}

impl RpcFault {
    /// The detailed server message when present, otherwise the summary.
    fn detail(self) -> String {
        self.data
            .and_then(|d| d.message)
            .filter(|m| !m.is_empty())
            .unwrap_or(self.message)
    }
}

impl JsonRpcAdapter {
    pub fn new(config: JsonRpcConfig) -> Result<Self, LedgerError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LedgerError::Transport {
                reason: format!("cannot build HTTP client: {}", e),
            })?;
        Ok(Self {
            config,
            client,
            next_id: Cell::new(1),
        })
    }

    fn execute_kw(&self, model: &str, method: &str, args: Json, kwargs: Json) -> Result<Json, LedgerError> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let payload = json!({
            "jsonrpc": "2.0",
            "method": "call",
            "params": {
                "service": "object",
                "method": "execute_kw",
                "args": [
                    self.config.database,
                    self.config.uid,
                    self.config.api_key,
                    model,
                    method,
                    args,
                    kwargs,
                ],
            },
            "id": id,
        });

        tracing::debug!(model, method, id, "rpc call");
        let response = self
            .client
            .post(&self.config.url)
            .json(&payload)
            .send()
            .map_err(|e| self.transport_error(model, e))?;
        if !response.status().is_success() {
            return Err(LedgerError::Transport {
                reason: format!("{} returned HTTP {}", model, response.status()),
            });
        }
        let body: RpcResponse = response.json().map_err(|e| self.transport_error(model, e))?;

        if let Some(fault) = body.error {
            return Err(LedgerError::RemoteError {
                model: model.to_string(),
                message: fault.detail(),
            });
        }
        body.result
            .ok_or_else(|| LedgerError::decode(model, "response has neither result nor error"))
    }

    fn transport_error(&self, model: &str, e: reqwest::Error) -> LedgerError {
        if e.is_timeout() {
            LedgerError::RemoteTimeout {
                model: model.to_string(),
                timeout_secs: self.config.timeout.as_secs(),
            }
        } else if e.is_decode() {
            LedgerError::decode(model, e.to_string())
        } else {
            LedgerError::Transport {
                reason: e.to_string(),
            }
        }
    }
}

fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Str(s) => Json::String(s.clone()),
        Value::Int(i) => json!(i),
        Value::Float(x) => json!(x),
        Value::Bool(b) => Json::Bool(*b),
        Value::List(items) => Json::Array(items.iter().map(value_to_json).collect()),
    }
}

fn push_nary(out: &mut Vec<Json>, op: &str, parts: &[Filter], empty: Json) {
    match parts.len() {
        0 => out.push(empty),
        n => {
            for _ in 1..n {
                out.push(Json::String(op.to_string()));
            }
            for part in parts {
                push_domain(out, part);
            }
        }
    }
}

fn push_domain(out: &mut Vec<Json>, filter: &Filter) {
    match filter {
        Filter::Term { field, op, value } => {
            out.push(json!([field, op.as_str(), value_to_json(value)]));
        }
        Filter::And(parts) => push_nary(out, "&", parts, json!([1, "=", 1])),
        Filter::Or(parts) => push_nary(out, "|", parts, json!([0, "=", 1])),
        Filter::Not(inner) => {
            out.push(Json::String("!".to_string()));
            push_domain(out, inner);
        }
    }
}

/// Encodes a filter as a prefix-notation domain list.
pub fn encode_domain(filter: &Filter) -> Json {
    let mut out = Vec::new();
    push_domain(&mut out, filter);
    Json::Array(out)
}

impl RemotePort for JsonRpcAdapter {
    fn search_count(&self, model: &str, filter: &Filter) -> Result<usize, LedgerError> {
        let result = self.execute_kw(model, "search_count", json!([encode_domain(filter)]), json!({}))?;
        result
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| LedgerError::decode(model, format!("search_count returned {}", result)))
    }

    fn search_read(
        &self,
        model: &str,
        filter: &Filter,
        fields: &[&str],
        offset: usize,
        limit: usize,
    ) -> Result<Vec<RemoteRecord>, LedgerError> {
        let kwargs = json!({
            "fields": fields,
            "offset": offset,
            "limit": limit,
            "order": "id asc",
        });
        let result = self.execute_kw(model, "search_read", json!([encode_domain(filter)]), kwargs)?;
        match result {
            Json::Array(rows) => rows
                .into_iter()
                .map(|row| match row {
                    Json::Object(map) => Ok(map),
                    other => Err(LedgerError::decode(model, format!("row is not an object: {}", other))),
                })
                .collect(),
            other => Err(LedgerError::decode(model, format!("search_read returned {}", other))),
        }
    }

    fn search(&self, model: &str, filter: &Filter) -> Result<Vec<i64>, LedgerError> {
        let result = self.execute_kw(model, "search", json!([encode_domain(filter)]), json!({}))?;
        serde_json::from_value(result).map_err(|e| LedgerError::decode(model, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::filter::Operator;

    #[test]
    fn single_term_is_a_triple() {
        let domain = encode_domain(&Filter::eq("type", "bank"));
        assert_eq!(domain, json!([["type", "=", "bank"]]));
    }

    #[test]
    fn nary_and_expands_to_binary_operators() {
        let f = Filter::year_range(2025).and(Filter::eq("parent_state", "posted"));
        assert_eq!(
            encode_domain(&f),
            json!([
                "&",
                "&",
                ["date", ">=", "2025-01-01"],
                ["date", "<=", "2025-12-31"],
                ["parent_state", "=", "posted"]
            ])
        );
    }

    #[test]
    fn cost_scope_matches_backend_domain() {
        let scope = crate::domain::taxonomy::CostScope::default();
        assert_eq!(
            encode_domain(&scope.filter("account_id.code")),
            json!([
                "|",
                "&",
                ["account_id.code", "=like", "4%"],
                "!",
                "|",
                ["account_id.code", "=like", "48%"],
                ["account_id.code", "=like", "49%"],
                ["account_id.code", "=like", "7%"]
            ])
        );
    }

    #[test]
    fn empty_nodes_encode_as_constant_leaves() {
        assert_eq!(encode_domain(&Filter::And(vec![])), json!([[1, "=", 1]]));
        assert_eq!(encode_domain(&Filter::Or(vec![])), json!([[0, "=", 1]]));
    }

    #[test]
    fn lists_and_bools_keep_their_types() {
        let f = Filter::term("partner_id", Operator::NotIn, Value::list([10i64, 11]))
            .and(Filter::eq("reconciled", false));
        assert_eq!(
            encode_domain(&f),
            json!([
                "&",
                ["partner_id", "not in", [10, 11]],
                ["reconciled", "=", false]
            ])
        );
    }

    #[test]
    fn fault_prefers_data_message() {
        let fault: RpcFault = serde_json::from_value(json!({
            "message": "Odoo Server Error",
            "data": { "message": "Invalid field 'foo' on model 'account.move.line'" }
        }))
        .unwrap();
        assert_eq!(fault.detail(), "Invalid field 'foo' on model 'account.move.line'");

        let fault: RpcFault = serde_json::from_value(json!({ "message": "Access Denied" })).unwrap();
        assert_eq!(fault.detail(), "Access Denied");
    }

    #[test]
    fn unreachable_host_is_a_transport_error() {
        let adapter = JsonRpcAdapter::new(JsonRpcConfig {
            url: "http://127.0.0.1:9/jsonrpc".to_string(),
            database: "db".to_string(),
            uid: 1,
            api_key: "key".to_string(),
            timeout: Duration::from_secs(2),
        })
        .unwrap();
        let err = adapter.search_count("res.partner", &Filter::And(vec![])).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Transport { .. } | LedgerError::RemoteTimeout { .. }
        ));
    }
}

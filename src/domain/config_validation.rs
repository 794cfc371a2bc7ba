//! Configuration validation.
//!
//! Validates all config fields before a pipeline is built, so that a bad
//! value is reported with its section and key instead of silently falling
//! back to a default.

use crate::domain::error::LedgerError;
use crate::domain::taxonomy::{CodeBand, IntercompanyPolicy, NameTranslator};
use crate::ports::config_port::ConfigPort;

/// Connection settings. With `offline` set, only the fixture file is required.
pub fn validate_remote_config(config: &dyn ConfigPort, offline: bool) -> Result<(), LedgerError> {
    if !offline {
        validate_url(config)?;
        require(config, "remote", "database")?;
        require(config, "remote", "api_key")?;
        validate_uid(config)?;
    }
    validate_positive_int(config, "remote", "timeout_secs")?;
    validate_positive_int(config, "remote", "chunk_size")?;
    validate_positive_int(config, "remote", "max_records")?;
    Ok(())
}

/// Taxonomy, cache and forecast settings.
pub fn validate_pipeline_config(config: &dyn ConfigPort) -> Result<(), LedgerError> {
    validate_non_negative_int(config, "cache", "ledger_ttl_secs")?;
    validate_non_negative_int(config, "cache", "balance_ttl_secs")?;
    validate_entities(config)?;
    validate_cost_categories(config)?;
    validate_classification(config)?;
    validate_intercompany(config)?;
    validate_translations(config)?;
    validate_forecast(config)?;
    Ok(())
}

fn require(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, LedgerError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(LedgerError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

/// Integers are checked on the raw string; `get_int` would hide a typo behind its default.
fn parse_int(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<i64>, LedgerError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| LedgerError::invalid(section, key, format!("'{}' is not an integer", raw))),
    }
}

fn parse_number(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<f64>, LedgerError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| LedgerError::invalid(section, key, format!("'{}' is not a number", raw))),
    }
}

fn validate_positive_int(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), LedgerError> {
    match parse_int(config, section, key)? {
        Some(v) if v < 1 => Err(LedgerError::invalid(section, key, format!("{} must be at least 1", key))),
        _ => Ok(()),
    }
}

fn validate_non_negative_int(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), LedgerError> {
    match parse_int(config, section, key)? {
        Some(v) if v < 0 => Err(LedgerError::invalid(section, key, format!("{} must be non-negative", key))),
        _ => Ok(()),
    }
}

fn validate_fraction(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), LedgerError> {
    match parse_number(config, section, key)? {
        Some(v) if !(0.0..=1.0).contains(&v) => Err(LedgerError::invalid(
            section,
            key,
            format!("{} must be between 0 and 1", key),
        )),
        _ => Ok(()),
    }
}

fn validate_url(config: &dyn ConfigPort) -> Result<(), LedgerError> {
    let url = require(config, "remote", "url")?;
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(LedgerError::invalid("remote", "url", "url must start with http:// or https://"));
    }
    Ok(())
}

fn validate_uid(config: &dyn ConfigPort) -> Result<(), LedgerError> {
    match parse_int(config, "remote", "uid")? {
        None => Err(LedgerError::ConfigMissing {
            section: "remote".to_string(),
            key: "uid".to_string(),
        }),
        Some(v) if v < 1 => Err(LedgerError::invalid("remote", "uid", "uid must be positive")),
        Some(_) => Ok(()),
    }
}

fn validate_entities(config: &dyn ConfigPort) -> Result<(), LedgerError> {
    for (key, name) in config.section_entries("entities") {
        match key.parse::<u32>() {
            Ok(id) if id >= 1 => {}
            _ => {
                return Err(LedgerError::invalid(
                    "entities",
                    &key,
                    "entity ids must be positive integers",
                ))
            }
        }
        if name.trim().is_empty() {
            return Err(LedgerError::invalid("entities", &key, "entity name is empty"));
        }
    }
    Ok(())
}

fn is_code_prefix(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

fn validate_cost_categories(config: &dyn ConfigPort) -> Result<(), LedgerError> {
    for (prefix, label) in config.section_entries("cost_categories") {
        if !is_code_prefix(&prefix) {
            return Err(LedgerError::invalid(
                "cost_categories",
                &prefix,
                "prefix must be numeric",
            ));
        }
        if label.trim().is_empty() {
            return Err(LedgerError::invalid("cost_categories", &prefix, "label is empty"));
        }
    }
    Ok(())
}

fn validate_prefix_list(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), LedgerError> {
    if let Some(items) = config.get_list(section, key) {
        if let Some(bad) = items.iter().find(|p| !is_code_prefix(p)) {
            return Err(LedgerError::invalid(
                section,
                key,
                format!("'{}' is not a numeric prefix", bad),
            ));
        }
    }
    Ok(())
}

fn validate_classification(config: &dyn ConfigPort) -> Result<(), LedgerError> {
    if let Some(prefix) = config.get_string("classification", "revenue_prefix") {
        if !is_code_prefix(prefix.trim()) {
            return Err(LedgerError::invalid(
                "classification",
                "revenue_prefix",
                "revenue_prefix must be numeric",
            ));
        }
    }
    validate_prefix_list(config, "classification", "cost_prefixes")?;
    validate_prefix_list(config, "classification", "cost_excluded_prefixes")?;
    Ok(())
}

fn validate_intercompany(config: &dyn ConfigPort) -> Result<(), LedgerError> {
    for key in ["receivable_band", "payable_band"] {
        if let Some(raw) = config.get_string("intercompany", key) {
            if CodeBand::parse(&raw).is_none() {
                return Err(LedgerError::invalid(
                    "intercompany",
                    key,
                    "expected a code range such as 120000-120999",
                ));
            }
        }
    }
    if let Some(raw) = config.get_string("intercompany", "policy") {
        if IntercompanyPolicy::parse(&raw).is_none() {
            return Err(LedgerError::invalid("intercompany", "policy", "policy must be 'any' or 'all'"));
        }
    }
    if let Some(raw) = config.get_string("intercompany", "partner_pattern") {
        if raw.trim().is_empty() {
            return Err(LedgerError::invalid("intercompany", "partner_pattern", "pattern is empty"));
        }
    }
    Ok(())
}

fn validate_translations(config: &dyn ConfigPort) -> Result<(), LedgerError> {
    if let Some(raw) = config.get_string("translations", "table") {
        if NameTranslator::parse(&raw).is_none() {
            return Err(LedgerError::invalid(
                "translations",
                "table",
                "entries must be 'Source:Target' pairs",
            ));
        }
    }
    Ok(())
}

fn validate_forecast(config: &dyn ConfigPort) -> Result<(), LedgerError> {
    validate_positive_int(config, "forecast", "horizon")?;
    validate_positive_int(config, "forecast", "period_days")?;
    validate_non_negative_int(config, "forecast", "ramp_periods")?;
    if let Some(raw) = config.get_string("forecast", "release") {
        if !matches!(raw.trim().to_lowercase().as_str(), "aging" | "rate") {
            return Err(LedgerError::invalid("forecast", "release", "release must be 'aging' or 'rate'"));
        }
    }
    validate_fraction(config, "forecast", "collection_rate")?;
    validate_fraction(config, "forecast", "payment_rate")?;
    validate_fraction(config, "forecast", "revenue_start_weight")?;
    validate_fraction(config, "forecast", "cost_start_weight")?;
    Ok(())
}

//! ledgerlens: consolidated ledger KPIs and cash forecasts for a
//! multi-entity group, pulled from a remote accounting backend.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;

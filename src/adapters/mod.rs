//! Concrete adapter implementations for ports.

pub mod csv_report_adapter;
pub mod file_config_adapter;
pub mod fixture_adapter;
#[cfg(feature = "jsonrpc")]
pub mod jsonrpc_adapter;

//! Core domain types and logic.

pub mod aggregate;
pub mod cache;
pub mod config_validation;
pub mod decode;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod forecast;
pub mod pipeline;
pub mod records;
pub mod taxonomy;

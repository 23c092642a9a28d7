//! Rebate Recovery domain core.
//!
//! Rule registry, calculation store, validation engine and metrics
//! aggregation. Storage and external reconciliation data sit behind the
//! repository and source traits; this crate has no database dependency.

pub mod calculation;
pub mod contract;
pub mod engine;
pub mod error;
pub mod evaluation;
pub mod memory;
pub mod metrics;
pub mod registry;
pub mod report;
pub mod rules;
pub mod service;
pub mod source;
pub mod types;

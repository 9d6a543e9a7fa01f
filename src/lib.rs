//! Sentiment Trading Strategy Library
//!
//! News-sentiment driven equity strategy: headlines are scored by an external
//! oracle, aggregated per symbol, turned into risk-sized signals and executed
//! through a brokerage gateway.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod rate_limit;
pub mod task_runner;

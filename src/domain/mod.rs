//! Core domain types and logic.

pub mod ohlcv;
pub mod indicator;
pub mod risk;
pub mod sizing;
pub mod bracket;
pub mod position;
pub mod strategy;
pub mod policy;
pub mod ledger;
pub mod backtest;
pub mod metrics;
pub mod config_validation;
pub mod error;

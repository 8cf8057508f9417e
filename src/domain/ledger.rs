//! Append-only record of closed trades.

use crate::domain::policy::ExitReason;
use crate::domain::position::Position;

/// Commission charged on one fill of `size` units at `price`.
pub trait CommissionModel {
    fn commission(&self, size: f64, price: f64) -> f64;
}

/// Flat fee plus a percentage of traded value: `per_trade + value * pct / 100`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CommissionConfig {
    pub per_trade: f64,
    pub pct: f64,
}

impl CommissionModel for CommissionConfig {
    fn commission(&self, size: f64, price: f64) -> f64 {
        let value = size.abs() * price;
        self.per_trade + value * self.pct / 100.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub entry_price: f64,
    pub exit_price: f64,
    pub size: f64,
    pub pnl_gross: f64,
    /// Gross PnL less entry and exit commission.
    pub pnl_net: f64,
    pub bars_held: usize,
    pub entry_bar_index: usize,
    pub exit_bar_index: usize,
    pub exit_reason: ExitReason,
}

#[derive(Debug, Clone, Default)]
pub struct TradeLedger {
    records: Vec<TradeRecord>,
}

impl TradeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        position: &Position,
        exit_price: f64,
        exit_bar_index: usize,
        exit_reason: ExitReason,
        commission: &dyn CommissionModel,
    ) -> &TradeRecord {
        let pnl_gross = (exit_price - position.entry_price) * position.size;
        let costs = commission.commission(position.size, position.entry_price)
            + commission.commission(position.size, exit_price);

        self.records.push(TradeRecord {
            entry_price: position.entry_price,
            exit_price,
            size: position.size,
            pnl_gross,
            pnl_net: pnl_gross - costs,
            bars_held: position.bars_held(exit_bar_index),
            entry_bar_index: position.entry_bar_index,
            exit_bar_index,
            exit_reason,
        });
        &self.records[self.records.len() - 1]
    }

    pub fn records(&self) -> &[TradeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn total_pnl_net(&self) -> f64 {
        self.records.iter().map(|r| r.pnl_net).sum()
    }
}

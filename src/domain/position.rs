//! The single open position tracked by the decision policy.

use crate::domain::bracket::{BracketId, BracketPlan};

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub size: f64,
    pub entry_price: f64,
    pub entry_bar_index: usize,
    pub stop_price: f64,
    pub target_price: Option<f64>,
    pub bracket: BracketId,
}

impl Position {
    pub fn from_plan(plan: &BracketPlan, entry_bar_index: usize) -> Self {
        Position {
            size: plan.size(),
            entry_price: plan.entry_price,
            entry_bar_index,
            stop_price: plan.stop_price,
            target_price: plan.target_price,
            bracket: plan.bracket,
        }
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.size * (price - self.entry_price)
    }

    pub fn bars_held(&self, bar_index: usize) -> usize {
        bar_index.saturating_sub(self.entry_bar_index)
    }
}

//! Order execution port: accepts intents, matches them against bars and
//! reports closed positions back to the driver.

use crate::domain::bracket::{BracketId, OrderIntent};
use crate::domain::error::TraderError;
use crate::domain::ohlcv::Bar;
use crate::domain::position::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OrderHandle(pub u64);

/// What closed a position on the execution side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillTrigger {
    Stop,
    Target,
    /// A market sell requested through `close_position`.
    Market,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeClosed {
    pub bracket: BracketId,
    pub size: f64,
    pub entry_price: f64,
    pub entry_bar_index: usize,
    pub exit_price: f64,
    pub exit_bar_index: usize,
    pub trigger: FillTrigger,
}

pub trait ExecutionPort {
    /// Cash plus open positions marked at the last seen close.
    fn current_equity(&self) -> f64;

    fn submit(&mut self, intent: OrderIntent) -> Result<OrderHandle, TraderError>;

    /// Cancel the position's resting bracket legs and close it at market.
    fn close_position(&mut self, position: &Position) -> Result<(), TraderError>;

    /// Present the next bar so resting orders can be matched against it.
    fn on_bar(&mut self, index: usize, bar: &Bar) -> Result<(), TraderError>;

    /// Positions closed since the last call, oldest first.
    fn take_closed_trades(&mut self) -> Vec<TradeClosed>;
}

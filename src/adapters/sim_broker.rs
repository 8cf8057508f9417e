//! Single-instrument simulated broker.
//!
//! Fill model:
//! - market orders fill at the open of the next bar presented via `on_bar`
//! - stop and limit legs of a bracket rest inactive until the parent fills
//! - an active stop sells when `low <= stop`, at `min(stop, open)`
//! - an active limit sells when `high >= target`, at `max(target, open)`
//! - if both legs trigger on the same bar the stop wins
//! - filling one leg cancels its sibling
//! - closing a bracket whose entry has not filled is an invariant violation
//!
//! Commission is charged on every fill. No slippage, no margin, long only.

use tracing::{debug, warn};

use crate::domain::bracket::{BracketId, OrderIntent, OrderKind, Side};
use crate::domain::error::TraderError;
use crate::domain::ledger::{CommissionConfig, CommissionModel};
use crate::domain::ohlcv::Bar;
use crate::domain::position::Position;
use crate::ports::execution_port::{
    ExecutionPort, FillTrigger, OrderHandle, TradeClosed,
};

#[derive(Debug, Clone)]
struct RestingOrder {
    intent: OrderIntent,
    active: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct Lot {
    bracket: Option<BracketId>,
    size: f64,
    entry_price: f64,
    entry_bar_index: usize,
}

#[derive(Debug, Clone)]
pub struct SimBroker {
    cash: f64,
    commission: CommissionConfig,
    orders: Vec<RestingOrder>,
    lot: Option<Lot>,
    last_close: Option<f64>,
    closed: Vec<TradeClosed>,
    next_handle: u64,
}

impl SimBroker {
    pub fn new(initial_cash: f64, commission: CommissionConfig) -> Self {
        SimBroker {
            cash: initial_cash,
            commission,
            orders: Vec::new(),
            lot: None,
            last_close: None,
            closed: Vec::new(),
            next_handle: 0,
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn has_open_lot(&self) -> bool {
        self.lot.is_some()
    }

    pub fn resting_orders(&self) -> usize {
        self.orders.len()
    }

    fn has_pending_buy(&self) -> bool {
        self.orders
            .iter()
            .any(|o| o.intent.side == Side::Buy && o.intent.kind == OrderKind::Market)
    }

    fn parent_pending(&self, bracket: BracketId) -> bool {
        self.orders.iter().any(|o| {
            o.intent.kind == OrderKind::Market
                && o.intent.side == Side::Buy
                && o.intent.bracket == Some(bracket)
        })
    }

    fn lot_bracket(&self) -> Option<BracketId> {
        self.lot.as_ref().and_then(|lot| lot.bracket)
    }

    fn cancel_group(&mut self, bracket: BracketId) {
        self.orders.retain(|o| o.intent.bracket != Some(bracket));
    }

    fn fill_buy(&mut self, index: usize, price: f64, intent: &OrderIntent) {
        let value = intent.size * price;
        self.cash -= value + self.commission.commission(intent.size, price);
        self.lot = Some(Lot {
            bracket: intent.bracket,
            size: intent.size,
            entry_price: price,
            entry_bar_index: index,
        });
        if let Some(bracket) = intent.bracket {
            for order in self.orders.iter_mut() {
                if order.intent.bracket == Some(bracket) {
                    order.active = true;
                }
            }
        }
        debug!(bar = index, price, size = intent.size, "buy filled");
    }

    fn close_lot(&mut self, index: usize, price: f64, trigger: FillTrigger) {
        let Some(lot) = self.lot.take() else {
            return;
        };
        self.cash += lot.size * price - self.commission.commission(lot.size, price);
        if let Some(bracket) = lot.bracket {
            self.cancel_group(bracket);
        }
        debug!(bar = index, price, size = lot.size, ?trigger, "position closed");

        // Unbracketed lots are never produced by the policy; use a zero id.
        self.closed.push(TradeClosed {
            bracket: lot.bracket.unwrap_or(BracketId(0)),
            size: lot.size,
            entry_price: lot.entry_price,
            entry_bar_index: lot.entry_bar_index,
            exit_price: price,
            exit_bar_index: index,
            trigger,
        });
    }

    fn fill_market_orders(&mut self, index: usize, bar: &Bar) {
        let (market, resting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.orders)
            .into_iter()
            .partition(|o| o.intent.kind == OrderKind::Market);
        self.orders = resting;

        for order in market {
            match order.intent.side {
                Side::Buy => self.fill_buy(index, bar.open, &order.intent),
                Side::Sell => self.close_lot(index, bar.open, FillTrigger::Market),
            }
        }
    }

    fn check_protective_legs(&mut self, index: usize, bar: &Bar) {
        let Some(bracket) = self.lot_bracket() else {
            return;
        };

        let mut stop_fill = None;
        let mut target_fill = None;
        for order in &self.orders {
            if !order.active || order.intent.bracket != Some(bracket) {
                continue;
            }
            let Some(price) = order.intent.price else {
                continue;
            };
            match order.intent.kind {
                OrderKind::Stop if bar.low <= price => stop_fill = Some(price.min(bar.open)),
                OrderKind::Limit if bar.high >= price => target_fill = Some(price.max(bar.open)),
                _ => {}
            }
        }

        if let Some(price) = stop_fill {
            self.close_lot(index, price, FillTrigger::Stop);
        } else if let Some(price) = target_fill {
            self.close_lot(index, price, FillTrigger::Target);
        }
    }
}

impl ExecutionPort for SimBroker {
    fn current_equity(&self) -> f64 {
        match &self.lot {
            Some(lot) => {
                let mark = self.last_close.unwrap_or(lot.entry_price);
                self.cash + lot.size * mark
            }
            None => self.cash,
        }
    }

    fn submit(&mut self, intent: OrderIntent) -> Result<OrderHandle, TraderError> {
        if !intent.size.is_finite() || intent.size <= 0.0 {
            return Err(TraderError::invariant(format!(
                "order size must be positive, got {}",
                intent.size
            )));
        }

        let active = match (intent.kind, intent.side) {
            (OrderKind::Market, Side::Buy) => {
                if self.lot.is_some() || self.has_pending_buy() {
                    return Err(TraderError::invariant(
                        "buy submitted while a position is open or pending",
                    ));
                }
                true
            }
            (OrderKind::Market, Side::Sell) => true,
            (OrderKind::Stop | OrderKind::Limit, Side::Sell) => {
                if intent.price.is_none() {
                    return Err(TraderError::invariant("stop/limit order without a price"));
                }
                let Some(bracket) = intent.bracket else {
                    return Err(TraderError::invariant(
                        "protective order without a bracket",
                    ));
                };
                if self.lot_bracket() == Some(bracket) {
                    true
                } else if self.parent_pending(bracket) {
                    false
                } else {
                    return Err(TraderError::invariant(format!(
                        "protective order for unknown bracket {}",
                        bracket
                    )));
                }
            }
            (OrderKind::Stop | OrderKind::Limit, Side::Buy) => {
                return Err(TraderError::invariant("stop/limit buys are not supported"));
            }
        };

        self.next_handle += 1;
        self.orders.push(RestingOrder { intent, active });
        Ok(OrderHandle(self.next_handle))
    }

    fn close_position(&mut self, position: &Position) -> Result<(), TraderError> {
        let bracket = position.bracket;
        if self.lot_bracket() == Some(bracket) {
            self.cancel_group(bracket);
            let size = self.lot.as_ref().map(|lot| lot.size).unwrap_or(position.size);
            self.submit(OrderIntent::market(Side::Sell, size, Some(bracket)))?;
        } else if self.parent_pending(bracket) {
            return Err(TraderError::invariant(format!(
                "close requested for bracket {} before its entry filled",
                bracket
            )));
        } else {
            warn!(%bracket, "close requested for a position the broker does not hold");
        }
        Ok(())
    }

    fn on_bar(&mut self, index: usize, bar: &Bar) -> Result<(), TraderError> {
        self.fill_market_orders(index, bar);
        self.check_protective_legs(index, bar);
        self.last_close = Some(bar.close);
        Ok(())
    }

    fn take_closed_trades(&mut self) -> Vec<TradeClosed> {
        std::mem::take(&mut self.closed)
    }
}

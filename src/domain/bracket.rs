//! Order intents and bracket planning.
//!
//! An entry is expressed as up to three linked intents sharing one
//! `BracketId`: a market buy, a protective stop sell and (optionally) a
//! take-profit limit sell. Stop and target are one-cancels-other; enforcing
//! that is left to the execution side.

use std::fmt;

use crate::domain::risk::RiskConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BracketId(pub u64);

impl fmt::Display for BracketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKind {
    Market,
    Stop,
    Limit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderIntent {
    pub kind: OrderKind,
    pub side: Side,
    /// `None` for market orders.
    pub price: Option<f64>,
    pub size: f64,
    pub bracket: Option<BracketId>,
}

impl OrderIntent {
    pub fn market(side: Side, size: f64, bracket: Option<BracketId>) -> Self {
        OrderIntent {
            kind: OrderKind::Market,
            side,
            price: None,
            size,
            bracket,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BracketPlan {
    pub bracket: BracketId,
    pub entry_price: f64,
    pub stop_price: f64,
    pub target_price: Option<f64>,
    pub entry: OrderIntent,
    pub stop: OrderIntent,
    pub target: Option<OrderIntent>,
}

impl BracketPlan {
    pub fn size(&self) -> f64 {
        self.entry.size
    }

    /// Intents in submission order: entry, stop, then target.
    pub fn intents(&self) -> impl Iterator<Item = &OrderIntent> {
        std::iter::once(&self.entry)
            .chain(std::iter::once(&self.stop))
            .chain(self.target.iter())
    }
}

/// Hands out bracket ids and prices the protective legs.
#[derive(Debug, Clone, Default)]
pub struct BracketPlanner {
    next_id: u64,
}

impl BracketPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// stop = entry - atr * stop_multiple, target = entry + atr * target_multiple.
    pub fn plan(&mut self, entry_price: f64, atr: f64, size: f64, risk: &RiskConfig) -> BracketPlan {
        self.next_id += 1;
        let bracket = BracketId(self.next_id);

        let stop_price = entry_price - risk.stop_distance(atr);
        let target_price = risk
            .target_multiple_of_atr
            .map(|multiple| entry_price + atr * multiple);

        let stop = OrderIntent {
            kind: OrderKind::Stop,
            side: Side::Sell,
            price: Some(stop_price),
            size,
            bracket: Some(bracket),
        };
        let target = target_price.map(|price| OrderIntent {
            kind: OrderKind::Limit,
            side: Side::Sell,
            price: Some(price),
            size,
            bracket: Some(bracket),
        });

        BracketPlan {
            bracket,
            entry_price,
            stop_price,
            target_price,
            entry: OrderIntent::market(Side::Buy, size, Some(bracket)),
            stop,
            target,
        }
    }
}

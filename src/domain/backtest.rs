//! Backtest driver: one synchronous pass over the bar stream.
//!
//! Per bar, in order:
//! 1. the execution side matches resting orders against the bar
//! 2. closed trades go to the ledger and back to the policy
//! 3. indicators advance
//! 4. the policy decides
//! 5. the decision is turned into orders
//! 6. equity is sampled

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, info};

use super::bracket::BracketId;
use super::error::TraderError;
use super::indicator::IndicatorEngine;
use super::ledger::{CommissionConfig, CommissionModel, TradeLedger};
use super::metrics::Metrics;
use super::ohlcv::{Bar, ensure_chronological};
use super::policy::{Decision, DecisionPolicy, ExitReason, PolicyState};
use super::position::Position;
use super::strategy::StrategyConfig;
use crate::ports::execution_port::{ExecutionPort, FillTrigger, TradeClosed};

#[derive(Debug, Clone)]
pub struct BacktestConfig {
    pub symbol: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub initial_capital: f64,
    pub commission: CommissionConfig,
    pub risk_free_rate: f64,
    pub periods_per_year: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub equity: f64,
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub ledger: TradeLedger,
    pub equity_curve: Vec<EquityPoint>,
    pub final_state: PolicyState,
    /// Position still held by the policy when the data ran out.
    pub open_position: Option<Position>,
    pub bars_processed: usize,
}

impl BacktestResult {
    pub fn metrics(&self, config: &BacktestConfig) -> Metrics {
        Metrics::compute(
            self.ledger.records(),
            &self.equity_curve,
            config.initial_capital,
            config.risk_free_rate,
            config.periods_per_year,
        )
    }
}

/// Run `strategy` over `bars` against `broker`.
///
/// `commission` prices the ledger's net PnL and should match what the broker
/// charges.
pub fn run_backtest(
    bars: &[Bar],
    strategy: &StrategyConfig,
    broker: &mut dyn ExecutionPort,
    commission: &dyn CommissionModel,
) -> Result<BacktestResult, TraderError> {
    ensure_chronological(bars)?;

    let mut engine = IndicatorEngine::new(strategy.indicators.clone());
    let mut policy = DecisionPolicy::new(strategy.clone());
    let mut ledger = TradeLedger::new();
    let mut equity_curve = Vec::with_capacity(bars.len());

    let mut open_brackets: HashMap<BracketId, Position> = HashMap::new();
    let mut pending_exits: HashMap<BracketId, ExitReason> = HashMap::new();

    info!(
        strategy = %strategy.name,
        variant = %strategy.variant.kind(),
        indicators = %strategy.indicators,
        bars = bars.len(),
        "backtest started"
    );

    for (index, bar) in bars.iter().enumerate() {
        broker.on_bar(index, bar)?;

        for closed in broker.take_closed_trades() {
            settle(
                closed,
                &mut open_brackets,
                &mut pending_exits,
                &mut ledger,
                &mut policy,
                commission,
            )?;
        }

        let snapshot = engine.update(bar);
        let equity = broker.current_equity();

        match policy.on_bar(&snapshot, equity)? {
            Decision::Enter(plan) => {
                open_brackets.insert(plan.bracket, Position::from_plan(&plan, index));
                for intent in plan.intents() {
                    broker.submit(intent.clone())?;
                }
            }
            Decision::Exit { position, reason } => {
                pending_exits.insert(position.bracket, reason);
                broker.close_position(&position)?;
            }
            Decision::Hold | Decision::NoAction => {}
        }

        equity_curve.push(EquityPoint {
            timestamp: bar.timestamp,
            equity: broker.current_equity(),
        });
    }

    let open_position = policy.position().cloned();
    if let (Some(position), Some(last)) = (&open_position, bars.last()) {
        info!(
            bracket = %position.bracket,
            entry_bar = position.entry_bar_index,
            unrealized = position.unrealized_pnl(last.close),
            "position still open at end of data"
        );
    }
    info!(trades = ledger.len(), "backtest finished");

    Ok(BacktestResult {
        ledger,
        equity_curve,
        final_state: policy.state(),
        open_position,
        bars_processed: bars.len(),
    })
}

fn settle(
    closed: TradeClosed,
    open_brackets: &mut HashMap<BracketId, Position>,
    pending_exits: &mut HashMap<BracketId, ExitReason>,
    ledger: &mut TradeLedger,
    policy: &mut DecisionPolicy,
    commission: &dyn CommissionModel,
) -> Result<(), TraderError> {
    let planned = open_brackets.remove(&closed.bracket).ok_or_else(|| {
        TraderError::invariant(format!("close reported for unknown bracket {}", closed.bracket))
    })?;

    let reason = match closed.trigger {
        FillTrigger::Stop => ExitReason::Stop,
        FillTrigger::Target => ExitReason::Target,
        FillTrigger::Market => pending_exits.remove(&closed.bracket).ok_or_else(|| {
            TraderError::invariant(format!(
                "market close for bracket {} without a requested exit",
                closed.bracket
            ))
        })?,
    };

    // Book the actual fills rather than the planned entry.
    let filled = Position {
        size: closed.size,
        entry_price: closed.entry_price,
        entry_bar_index: closed.entry_bar_index,
        ..planned
    };
    let record = ledger.record(
        &filled,
        closed.exit_price,
        closed.exit_bar_index,
        reason,
        commission,
    );
    info!(
        bracket = %closed.bracket,
        %reason,
        entry = record.entry_price,
        exit = record.exit_price,
        pnl_net = record.pnl_net,
        bars_held = record.bars_held,
        "trade closed"
    );

    if !policy.on_position_closed(closed.bracket) {
        debug!(bracket = %closed.bracket, "policy had already released the position");
    }
    Ok(())
}

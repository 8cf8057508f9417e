//! Summary statistics over the trade ledger and the equity curve.

use super::backtest::EquityPoint;
use super::ledger::TradeRecord;

/// Hourly bars over ~252 trading days of ~6.5 hours.
pub const DEFAULT_PERIODS_PER_YEAR: f64 = 252.0 * 6.5;

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub final_equity: f64,
    pub total_return: f64,
    pub annualized_return: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown: f64,
    /// Longest run of bars spent below a prior equity peak.
    pub max_drawdown_duration: usize,
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub win_rate: f64,
    /// Gross wins over gross losses; 0 when there are no losing trades.
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub avg_bars_held: f64,
}

impl Metrics {
    pub fn compute(
        trades: &[TradeRecord],
        equity_curve: &[EquityPoint],
        initial_capital: f64,
        risk_free_rate: f64,
        periods_per_year: f64,
    ) -> Self {
        let final_equity = equity_curve.last().map_or(initial_capital, |p| p.equity);
        let total_return = if initial_capital > 0.0 {
            final_equity / initial_capital - 1.0
        } else {
            0.0
        };
        let annualized_return =
            annualize(total_return, equity_curve.len(), periods_per_year);

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(equity_curve);
        let (sharpe_ratio, sortino_ratio) =
            compute_risk_adjusted(equity_curve, risk_free_rate, periods_per_year);

        let tally = trades.iter().fold(TradeTally::default(), TradeTally::add);
        let total_trades = trades.len();

        Metrics {
            final_equity,
            total_return,
            annualized_return,
            sharpe_ratio,
            sortino_ratio,
            max_drawdown,
            max_drawdown_duration,
            total_trades,
            trades_won: tally.won,
            trades_lost: tally.lost,
            trades_breakeven: tally.breakeven,
            win_rate: ratio(tally.won as f64, total_trades as f64),
            profit_factor: ratio(tally.gross_wins, tally.gross_losses),
            avg_win: ratio(tally.gross_wins, tally.won as f64),
            avg_loss: ratio(tally.gross_losses, tally.lost as f64),
            largest_win: tally.largest_win,
            largest_loss: tally.largest_loss,
            avg_bars_held: ratio(tally.bars_held as f64, total_trades as f64),
        }
    }
}

/// Running win/loss counters over net P&L. Losses are kept as magnitudes.
#[derive(Debug, Default)]
struct TradeTally {
    won: usize,
    lost: usize,
    breakeven: usize,
    gross_wins: f64,
    gross_losses: f64,
    largest_win: f64,
    largest_loss: f64,
    bars_held: usize,
}

impl TradeTally {
    fn add(mut self, trade: &TradeRecord) -> Self {
        let pnl = trade.pnl_net;
        if pnl > 0.0 {
            self.won += 1;
            self.gross_wins += pnl;
            self.largest_win = self.largest_win.max(pnl);
        } else if pnl < 0.0 {
            self.lost += 1;
            self.gross_losses -= pnl;
            self.largest_loss = self.largest_loss.max(-pnl);
        } else {
            self.breakeven += 1;
        }
        self.bars_held += trade.bars_held;
        self
    }
}

/// `num / den`, or 0 when the denominator is not positive.
fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

fn annualize(total_return: f64, bars: usize, periods_per_year: f64) -> f64 {
    let years = ratio(bars as f64, periods_per_year);
    if years <= 0.0 || !total_return.is_finite() || total_return <= -1.0 {
        return 0.0;
    }
    (1.0 + total_return).powf(years.recip()) - 1.0
}

/// Max fractional drawdown and the longest run of bars under water.
fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, usize) {
    let mut peak = f64::NEG_INFINITY;
    let mut underwater = 0usize;
    let mut worst = (0.0_f64, 0usize);

    for equity in equity_curve.iter().map(|p| p.equity) {
        if equity >= peak {
            peak = equity;
            underwater = 0;
            continue;
        }
        if peak > 0.0 {
            underwater += 1;
            worst.0 = worst.0.max(1.0 - equity / peak);
            worst.1 = worst.1.max(underwater);
        }
    }
    worst
}

fn period_returns(equity_curve: &[EquityPoint]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| ratio(w[1].equity - w[0].equity, w[0].equity))
        .collect()
}

/// Annualized (sharpe, sortino) from per-bar returns. Both use the
/// population deviation; sortino only counts returns below the per-bar
/// risk-free rate.
fn compute_risk_adjusted(
    equity_curve: &[EquityPoint],
    risk_free_rate: f64,
    periods_per_year: f64,
) -> (f64, f64) {
    if periods_per_year <= 0.0 {
        return (0.0, 0.0);
    }
    let returns = period_returns(equity_curve);
    if returns.is_empty() {
        return (0.0, 0.0);
    }

    let n = returns.len() as f64;
    let hurdle = risk_free_rate / periods_per_year;
    let mean = returns.iter().sum::<f64>() / n;
    let excess = mean - hurdle;

    let stddev = (returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n).sqrt();
    let downside = (returns
        .iter()
        .map(|r| (r - hurdle).min(0.0).powi(2))
        .sum::<f64>()
        / n)
        .sqrt();

    let scale = periods_per_year.sqrt();
    (
        ratio(excess, stddev) * scale,
        ratio(excess, downside) * scale,
    )
}

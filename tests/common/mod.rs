#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use hybridtrader::adapters::sim_broker::SimBroker;
use hybridtrader::domain::backtest::BacktestConfig;
use hybridtrader::domain::bracket::OrderIntent;
use hybridtrader::domain::error::TraderError;
use hybridtrader::domain::indicator::{IndicatorConfig, MaType};
use hybridtrader::domain::ledger::CommissionConfig;
use hybridtrader::domain::metrics::DEFAULT_PERIODS_PER_YEAR;
pub use hybridtrader::domain::ohlcv::Bar;
use hybridtrader::domain::position::Position;
use hybridtrader::domain::risk::RiskConfig;
use hybridtrader::domain::strategy::{StrategyConfig, VariantKind};
use hybridtrader::ports::data_port::DataPort;
use hybridtrader::ports::execution_port::{ExecutionPort, OrderHandle, TradeClosed};
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        symbol: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<Bar>, TraderError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(TraderError::Data {
                reason: reason.clone(),
            });
        }
        let bars: Vec<Bar> = self
            .data
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| start_date.is_none_or(|d| b.timestamp.date() >= d))
                    .filter(|b| end_date.is_none_or(|d| b.timestamp.date() <= d))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if bars.is_empty() {
            return Err(TraderError::NoData {
                symbol: symbol.to_string(),
            });
        }
        Ok(bars)
    }
}

/// Hourly bars counted from 2024-01-02 09:30.
pub fn ts(i: usize) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap()
        + chrono::Duration::hours(i as i64)
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn make_bar(i: usize, close: f64) -> Bar {
    Bar {
        timestamp: ts(i),
        open: close,
        high: close + 1.0,
        low: close - 1.0,
        close,
        volume: 1000.0,
    }
}

/// Each bar opens at the previous close and spans one point beyond both.
pub fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
    let mut prev = closes.first().copied().unwrap_or_default();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let bar = Bar {
                timestamp: ts(i),
                open: prev,
                high: prev.max(close) + 1.0,
                low: prev.min(close) - 1.0,
                close,
                volume: 1000.0,
            };
            prev = close;
            bar
        })
        .collect()
}

pub fn generate_bars(count: usize, start_price: f64, step: f64) -> Vec<Bar> {
    let closes: Vec<f64> = (0..count).map(|i| start_price + step * i as f64).collect();
    bars_from_closes(&closes)
}

/// A slow slide, a clean rally, a sharp sell-off, then a flat tail.
///
/// With [`round_trip_strategy`] the fast/slow averages cross up once (decided
/// on bar 13 at 98.5) and down once (decided on bar 22).
pub fn round_trip_closes() -> Vec<f64> {
    let mut closes: Vec<f64> = (0..12).map(|i| 100.0 - 0.5 * i as f64).collect();
    for _ in 0..8 {
        closes.push(closes[closes.len() - 1] + 2.0);
    }
    for _ in 0..8 {
        closes.push(closes[closes.len() - 1] - 3.0);
    }
    for _ in 0..6 {
        closes.push(closes[closes.len() - 1]);
    }
    closes
}

pub fn small_indicators() -> IndicatorConfig {
    IndicatorConfig {
        fast_period: 3,
        slow_period: 6,
        trend_period: 10,
        rsi_period: 5,
        atr_period: 5,
        ma_type: MaType::Sma,
    }
}

/// Crossover entries and exits only: no target, no time limit.
pub fn round_trip_strategy() -> StrategyConfig {
    StrategyConfig {
        indicators: small_indicators(),
        risk: RiskConfig {
            target_multiple_of_atr: None,
            max_bars_in_trade: None,
            ..RiskConfig::default()
        },
        ..StrategyConfig::preset(VariantKind::TrendFollowing)
    }
}

pub fn sample_config() -> BacktestConfig {
    BacktestConfig {
        symbol: "TEST".into(),
        start_date: None,
        end_date: None,
        initial_capital: 100_000.0,
        commission: CommissionConfig::default(),
        risk_free_rate: 0.0,
        periods_per_year: DEFAULT_PERIODS_PER_YEAR,
    }
}

/// Simulated broker that also keeps every intent it was handed.
pub struct RecordingBroker {
    pub inner: SimBroker,
    pub submitted: Vec<OrderIntent>,
    pub close_requests: usize,
}

impl RecordingBroker {
    pub fn new(cash: f64, commission: CommissionConfig) -> Self {
        Self {
            inner: SimBroker::new(cash, commission),
            submitted: Vec::new(),
            close_requests: 0,
        }
    }
}

impl ExecutionPort for RecordingBroker {
    fn current_equity(&self) -> f64 {
        self.inner.current_equity()
    }

    fn submit(&mut self, intent: OrderIntent) -> Result<OrderHandle, TraderError> {
        self.submitted.push(intent.clone());
        self.inner.submit(intent)
    }

    fn close_position(&mut self, position: &Position) -> Result<(), TraderError> {
        self.close_requests += 1;
        self.inner.close_position(position)
    }

    fn on_bar(&mut self, index: usize, bar: &Bar) -> Result<(), TraderError> {
        self.inner.on_bar(index, bar)
    }

    fn take_closed_trades(&mut self) -> Vec<TradeClosed> {
        self.inner.take_closed_trades()
    }
}

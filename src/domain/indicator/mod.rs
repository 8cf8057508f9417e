//! Technical indicators maintained incrementally, one bar at a time.
//!
//! This module provides:
//! - `IndicatorConfig`: periods and moving-average type for a run
//! - `IndicatorSnapshot`: every indicator value as of the latest bar
//! - `IndicatorEngine`: owns the rolling state and produces snapshots
//!
//! Each indicator keeps only fixed-size state (a window or an accumulator),
//! so memory does not grow with the length of the bar stream.

pub mod atr;
pub mod crossover;
pub mod ema;
pub mod rsi;
pub mod sma;

use std::fmt;
use std::str::FromStr;

use crate::domain::error::TraderError;
use crate::domain::ohlcv::Bar;

use self::atr::Atr;
use self::crossover::Crossover;
use self::ema::Ema;
use self::rsi::Rsi;
use self::sma::Sma;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaType {
    Sma,
    Ema,
}

impl FromStr for MaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sma" => Ok(MaType::Sma),
            "ema" => Ok(MaType::Ema),
            other => Err(format!("unknown moving average type '{}' (expected sma or ema)", other)),
        }
    }
}

impl fmt::Display for MaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaType::Sma => write!(f, "SMA"),
            MaType::Ema => write!(f, "EMA"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorConfig {
    pub fast_period: usize,
    pub slow_period: usize,
    pub trend_period: usize,
    pub rsi_period: usize,
    pub atr_period: usize,
    pub ma_type: MaType,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        IndicatorConfig {
            fast_period: 20,
            slow_period: 50,
            trend_period: 100,
            rsi_period: 14,
            atr_period: 14,
            ma_type: MaType::Ema,
        }
    }
}

impl IndicatorConfig {
    /// Bars that must be consumed before any snapshot is actionable.
    pub fn warmup_bars(&self) -> usize {
        self.fast_period
            .max(self.slow_period)
            .max(self.trend_period)
            .max(self.rsi_period)
            .max(self.atr_period)
    }
}

impl fmt::Display for IndicatorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{ma}({}) / {ma}({}) / {ma}({}), RSI({}), ATR({})",
            self.fast_period,
            self.slow_period,
            self.trend_period,
            self.rsi_period,
            self.atr_period,
            ma = self.ma_type
        )
    }
}

#[derive(Debug, Clone)]
enum MovingAverage {
    Sma(Sma),
    Ema(Ema),
}

impl MovingAverage {
    fn new(ma_type: MaType, period: usize) -> Self {
        match ma_type {
            MaType::Sma => MovingAverage::Sma(Sma::new(period)),
            MaType::Ema => MovingAverage::Ema(Ema::new(period)),
        }
    }

    fn update(&mut self, close: f64) -> Option<f64> {
        match self {
            MovingAverage::Sma(ma) => ma.update(close),
            MovingAverage::Ema(ma) => ma.update(close),
        }
    }
}

/// Indicator values as of one bar.
///
/// While `warming_up` is set the numeric fields hold 0.0 for any indicator
/// that has not produced a value yet and the snapshot must not drive entries.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSnapshot {
    pub close: f64,
    pub fast_ma: f64,
    pub slow_ma: f64,
    pub trend_ma: f64,
    pub rsi: f64,
    pub atr: f64,
    pub crossover_sign: i8,
    pub warming_up: bool,
}

impl IndicatorSnapshot {
    /// `InsufficientHistory` while warming up, the snapshot otherwise.
    pub fn actionable(&self, have: usize, need: usize) -> Result<&Self, TraderError> {
        if self.warming_up {
            Err(TraderError::InsufficientHistory { have, need })
        } else {
            Ok(self)
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    config: IndicatorConfig,
    fast: MovingAverage,
    slow: MovingAverage,
    trend: MovingAverage,
    rsi: Rsi,
    atr: Atr,
    crossover: Crossover,
    bars_seen: usize,
}

impl IndicatorEngine {
    pub fn new(config: IndicatorConfig) -> Self {
        IndicatorEngine {
            fast: MovingAverage::new(config.ma_type, config.fast_period),
            slow: MovingAverage::new(config.ma_type, config.slow_period),
            trend: MovingAverage::new(config.ma_type, config.trend_period),
            rsi: Rsi::new(config.rsi_period),
            atr: Atr::new(config.atr_period),
            crossover: Crossover::new(),
            bars_seen: 0,
            config,
        }
    }

    pub fn bars_seen(&self) -> usize {
        self.bars_seen
    }

    pub fn update(&mut self, bar: &Bar) -> IndicatorSnapshot {
        self.bars_seen += 1;

        let fast = self.fast.update(bar.close);
        let slow = self.slow.update(bar.close);
        let trend = self.trend.update(bar.close);
        let rsi = self.rsi.update(bar.close);
        let atr = self.atr.update(bar);

        let crossover_sign = match (fast, slow) {
            (Some(f), Some(s)) => self.crossover.update(f - s),
            _ => 0,
        };

        let all_valid = fast.is_some()
            && slow.is_some()
            && trend.is_some()
            && rsi.is_some()
            && atr.is_some();
        let warming_up = !all_valid || self.bars_seen < self.config.warmup_bars();

        IndicatorSnapshot {
            close: bar.close,
            fast_ma: fast.unwrap_or(0.0),
            slow_ma: slow.unwrap_or(0.0),
            trend_ma: trend.unwrap_or(0.0),
            rsi: rsi.unwrap_or(0.0),
            atr: atr.unwrap_or(0.0),
            crossover_sign,
            warming_up,
        }
    }
}

//! Strategy configuration: which entry predicates run and with what parameters.
//!
//! The mean-reversion and trend-following variants share one state machine
//! (see [`crate::domain::policy`]); they differ only in this configuration.

use std::fmt;
use std::str::FromStr;

use crate::domain::indicator::IndicatorConfig;
use crate::domain::risk::RiskConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantKind {
    MeanReversion,
    TrendFollowing,
}

impl FromStr for VariantKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "mean_reversion" => Ok(VariantKind::MeanReversion),
            "trend_following" => Ok(VariantKind::TrendFollowing),
            other => Err(format!(
                "unknown strategy variant '{}' (expected mean_reversion or trend_following)",
                other
            )),
        }
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariantKind::MeanReversion => write!(f, "mean_reversion"),
            VariantKind::TrendFollowing => write!(f, "trend_following"),
        }
    }
}

/// Momentum predicate paired with the trend filter (close > trend MA).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntryVariant {
    /// fast MA above slow MA and rsi_low < RSI < rsi_high.
    MeanReversion { rsi_low: f64, rsi_high: f64 },
    /// Fresh upward crossover and RSI < rsi_upper.
    TrendFollowing { rsi_upper: f64 },
}

impl EntryVariant {
    pub fn kind(&self) -> VariantKind {
        match self {
            EntryVariant::MeanReversion { .. } => VariantKind::MeanReversion,
            EntryVariant::TrendFollowing { .. } => VariantKind::TrendFollowing,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    pub name: String,
    pub variant: EntryVariant,
    /// Close the position when the fast MA crosses below the slow MA.
    pub exit_on_cross_below: bool,
    pub indicators: IndicatorConfig,
    pub risk: RiskConfig,
}

impl StrategyConfig {
    pub fn preset(kind: VariantKind) -> Self {
        match kind {
            VariantKind::MeanReversion => StrategyConfig {
                name: "Hybrid Trend Mean Reversion".into(),
                variant: EntryVariant::MeanReversion {
                    rsi_low: 40.0,
                    rsi_high: 55.0,
                },
                exit_on_cross_below: false,
                indicators: IndicatorConfig::default(),
                risk: RiskConfig::default(),
            },
            VariantKind::TrendFollowing => StrategyConfig {
                name: "Trend Following Crossover".into(),
                variant: EntryVariant::TrendFollowing { rsi_upper: 70.0 },
                exit_on_cross_below: true,
                indicators: IndicatorConfig::default(),
                risk: RiskConfig {
                    max_bars_in_trade: None,
                    ..RiskConfig::default()
                },
            },
        }
    }
}

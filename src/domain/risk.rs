//! Risk budget for a run.

#[derive(Debug, Clone, PartialEq)]
pub struct RiskConfig {
    /// Fraction of equity put at risk per trade.
    pub risk_per_trade: f64,
    pub stop_multiple_of_atr: f64,
    /// `None` disables the take-profit leg.
    pub target_multiple_of_atr: Option<f64>,
    /// Cap on position value as a fraction of equity.
    pub max_exposure_fraction: f64,
    /// `None` disables the time-limit exit.
    pub max_bars_in_trade: Option<usize>,
}

impl Default for RiskConfig {
    fn default() -> Self {
        RiskConfig {
            risk_per_trade: 0.01,
            stop_multiple_of_atr: 1.5,
            target_multiple_of_atr: Some(3.0),
            max_exposure_fraction: 0.2,
            max_bars_in_trade: Some(48),
        }
    }
}

impl RiskConfig {
    pub fn stop_distance(&self, atr: f64) -> f64 {
        atr * self.stop_multiple_of_atr
    }
}

//! Risk-budget position sizing.
//!
//! 1. risk_cash = equity * risk_per_trade
//! 2. raw_size = risk_cash / stop_distance (stop_distance must be > 0)
//! 3. exposure_cap = equity * max_exposure_fraction / price
//! 4. final_size = min(raw_size, exposure_cap), floored at 0
//!
//! A zero or non-finite result means "do not enter".

use crate::domain::error::TraderError;
use crate::domain::risk::RiskConfig;

pub fn position_size(
    equity: f64,
    stop_distance: f64,
    price: f64,
    risk: &RiskConfig,
) -> Result<f64, TraderError> {
    if !stop_distance.is_finite() || stop_distance <= 0.0 {
        return Err(TraderError::invalid_sizing(format!(
            "stop distance must be positive, got {}",
            stop_distance
        )));
    }
    if !price.is_finite() || price <= 0.0 {
        return Err(TraderError::invalid_sizing(format!(
            "price must be positive, got {}",
            price
        )));
    }

    let inputs = [
        ("equity", equity),
        ("risk_per_trade", risk.risk_per_trade),
        ("max_exposure_fraction", risk.max_exposure_fraction),
    ];
    for (name, value) in inputs {
        if !value.is_finite() {
            return Err(TraderError::invalid_sizing(format!("{} is not finite", name)));
        }
    }

    let risk_cash = equity * risk.risk_per_trade;
    let raw_size = risk_cash / stop_distance;
    let exposure_cap = (equity * risk.max_exposure_fraction) / price;
    // f64::min drops a NaN operand
    if !raw_size.is_finite() || !exposure_cap.is_finite() {
        return Err(TraderError::invalid_sizing(format!(
            "raw size {} or exposure cap {} is not finite",
            raw_size, exposure_cap
        )));
    }
    let size = raw_size.min(exposure_cap).max(0.0);

    if !size.is_finite() || size <= 0.0 {
        return Err(TraderError::invalid_sizing(format!(
            "computed size {} is not positive",
            size
        )));
    }
    Ok(size)
}

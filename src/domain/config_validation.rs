//! Configuration validation.
//!
//! Validates every config field before a backtest runs. Absent keys fall
//! back to the strategy preset and are not errors.

use crate::domain::error::TraderError;
use crate::domain::indicator::MaType;
use crate::domain::strategy::{StrategyConfig, VariantKind};
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    validate_initial_capital(config)?;
    validate_commission(config)?;
    validate_risk_free_rate(config)?;
    validate_periods_per_year(config)?;
    validate_dates(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let kind = parse_variant(config)?;
    let preset = StrategyConfig::preset(kind);
    validate_periods(config, &preset)?;
    validate_ma_type(config)?;
    validate_rsi_thresholds(config)?;
    validate_risk(config)?;
    Ok(())
}

/// Variant named in `[strategy] variant`, mean reversion when absent.
pub fn parse_variant(config: &dyn ConfigPort) -> Result<VariantKind, TraderError> {
    match config.get_string("strategy", "variant") {
        None => Ok(VariantKind::MeanReversion),
        Some(s) => s
            .parse()
            .map_err(|reason| invalid("strategy", "variant", reason)),
    }
}

pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> TraderError {
    TraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// A `get_double` that rejects NaN and infinities, which slip through range checks.
fn finite_double(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, TraderError> {
    let value = config.get_double(section, key, default);
    if value.is_finite() {
        Ok(value)
    } else {
        Err(invalid(section, key, format!("{} must be a finite number", key)))
    }
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let value = finite_double(config, "backtest", "initial_capital", 100_000.0)?;
    if value <= 0.0 {
        return Err(invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    Ok(())
}

fn validate_commission(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let per_trade = finite_double(config, "backtest", "commission_per_trade", 0.0)?;
    if per_trade < 0.0 {
        return Err(invalid(
            "backtest",
            "commission_per_trade",
            "commission_per_trade must be non-negative",
        ));
    }
    let pct = finite_double(config, "backtest", "commission_pct", 0.0)?;
    if pct < 0.0 {
        return Err(invalid(
            "backtest",
            "commission_pct",
            "commission_pct must be non-negative",
        ));
    }
    Ok(())
}

fn validate_risk_free_rate(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let value = finite_double(config, "backtest", "risk_free_rate", 0.0)?;
    if !(0.0..1.0).contains(&value) {
        return Err(invalid(
            "backtest",
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }
    Ok(())
}

fn validate_periods_per_year(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let value = finite_double(config, "backtest", "periods_per_year", 1.0)?;
    if value <= 0.0 {
        return Err(invalid(
            "backtest",
            "periods_per_year",
            "periods_per_year must be positive",
        ));
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let start_date = parse_date(config, "start_date")?;
    let end_date = parse_date(config, "end_date")?;

    match (start_date, end_date) {
        (Some(start), Some(end)) if start > end => Err(invalid(
            "backtest",
            "start_date",
            "start_date must not be after end_date",
        )),
        _ => Ok(()),
    }
}

/// Optional `YYYY-MM-DD` date from `[backtest]`.
pub fn parse_date(config: &dyn ConfigPort, field: &str) -> Result<Option<NaiveDate>, TraderError> {
    match config.get_string("backtest", field) {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|_| {
                invalid(
                    "backtest",
                    field,
                    format!("invalid {} format, expected YYYY-MM-DD", field),
                )
            }),
    }
}

fn validate_periods(config: &dyn ConfigPort, preset: &StrategyConfig) -> Result<(), TraderError> {
    let defaults = &preset.indicators;
    let periods = [
        ("fast_period", defaults.fast_period),
        ("slow_period", defaults.slow_period),
        ("trend_period", defaults.trend_period),
        ("rsi_period", defaults.rsi_period),
        ("atr_period", defaults.atr_period),
    ];
    for (key, default) in periods {
        let value = config.get_int("indicators", key, default as i64);
        if value < 1 {
            return Err(invalid(
                "indicators",
                key,
                format!("{} must be at least 1", key),
            ));
        }
    }

    let fast = config.get_int("indicators", "fast_period", defaults.fast_period as i64);
    let slow = config.get_int("indicators", "slow_period", defaults.slow_period as i64);
    if fast >= slow {
        return Err(invalid(
            "indicators",
            "fast_period",
            "fast_period must be shorter than slow_period",
        ));
    }
    Ok(())
}

fn validate_ma_type(config: &dyn ConfigPort) -> Result<(), TraderError> {
    if let Some(s) = config.get_string("indicators", "ma_type") {
        s.parse::<MaType>()
            .map_err(|reason| invalid("indicators", "ma_type", reason))?;
    }
    Ok(())
}

fn validate_rsi_thresholds(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let in_range = |v: f64| (0.0..=100.0).contains(&v);

    let low = finite_double(config, "strategy", "rsi_low", 40.0)?;
    let high = finite_double(config, "strategy", "rsi_high", 55.0)?;
    if !in_range(low) {
        return Err(invalid("strategy", "rsi_low", "rsi_low must be within 0..=100"));
    }
    if !in_range(high) {
        return Err(invalid("strategy", "rsi_high", "rsi_high must be within 0..=100"));
    }
    if low >= high {
        return Err(invalid(
            "strategy",
            "rsi_low",
            "rsi_low must be below rsi_high",
        ));
    }

    let upper = finite_double(config, "strategy", "rsi_upper", 70.0)?;
    if upper <= 0.0 || upper > 100.0 {
        return Err(invalid(
            "strategy",
            "rsi_upper",
            "rsi_upper must be within (0, 100]",
        ));
    }
    Ok(())
}

fn validate_risk(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let risk_per_trade = finite_double(config, "risk", "risk_per_trade", 0.01)?;
    if risk_per_trade <= 0.0 || risk_per_trade > 1.0 {
        return Err(invalid(
            "risk",
            "risk_per_trade",
            "risk_per_trade must be between 0 and 1",
        ));
    }

    let stop_atr = finite_double(config, "risk", "stop_atr", 1.5)?;
    if stop_atr <= 0.0 {
        return Err(invalid("risk", "stop_atr", "stop_atr must be positive"));
    }

    let target_atr = finite_double(config, "risk", "target_atr", 3.0)?;
    if target_atr < 0.0 {
        return Err(invalid(
            "risk",
            "target_atr",
            "target_atr must be non-negative (0 disables the target)",
        ));
    }

    let max_exposure = finite_double(config, "risk", "max_exposure", 0.2)?;
    if max_exposure <= 0.0 || max_exposure > 1.0 {
        return Err(invalid(
            "risk",
            "max_exposure",
            "max_exposure must be between 0 and 1",
        ));
    }

    let max_bars = config.get_int("risk", "max_bars_in_trade", 0);
    if max_bars < 0 {
        return Err(invalid(
            "risk",
            "max_bars_in_trade",
            "max_bars_in_trade must be non-negative (0 disables the time limit)",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn assert_invalid(result: Result<(), TraderError>, expected: &str) {
        let err = result.unwrap_err();
        assert!(
            matches!(&err, TraderError::ConfigInvalid { key, .. } if key == expected),
            "expected invalid {}, got {:?}",
            expected,
            err
        );
    }

    #[test]
    fn valid_backtest_config_passes() {
        let config = make_config(
            r#"
[backtest]
data_file = spy.csv
symbol = SPY
initial_capital = 100000.0
commission_per_trade = 0.0
commission_pct = 0.1
risk_free_rate = 0.02
periods_per_year = 1638
start_date = 2023-01-01
end_date = 2024-12-31
"#,
        );
        assert!(validate_backtest_config(&config).is_ok());
    }

    #[test]
    fn empty_backtest_section_uses_defaults() {
        let config = make_config("[backtest]\n");
        assert!(validate_backtest_config(&config).is_ok());
    }

    #[test]
    fn initial_capital_must_be_positive() {
        let config = make_config("[backtest]\ninitial_capital = 0\n");
        assert_invalid(validate_backtest_config(&config), "initial_capital");
    }

    #[test]
    fn negative_commission_fails() {
        let config = make_config("[backtest]\ncommission_per_trade = -5\n");
        assert_invalid(validate_backtest_config(&config), "commission_per_trade");
        let config = make_config("[backtest]\ncommission_pct = -0.1\n");
        assert_invalid(validate_backtest_config(&config), "commission_pct");
    }

    #[test]
    fn risk_free_rate_out_of_range_fails() {
        let config = make_config("[backtest]\nrisk_free_rate = 1.5\n");
        assert_invalid(validate_backtest_config(&config), "risk_free_rate");
        let config = make_config("[backtest]\nrisk_free_rate = -0.05\n");
        assert_invalid(validate_backtest_config(&config), "risk_free_rate");
    }

    #[test]
    fn periods_per_year_must_be_positive() {
        let config = make_config("[backtest]\nperiods_per_year = 0\n");
        assert_invalid(validate_backtest_config(&config), "periods_per_year");
    }

    #[test]
    fn invalid_date_format_fails() {
        let config = make_config("[backtest]\nstart_date = 2020/01/01\n");
        assert_invalid(validate_backtest_config(&config), "start_date");
    }

    #[test]
    fn start_after_end_fails() {
        let config = make_config("[backtest]\nstart_date = 2024-12-31\nend_date = 2020-01-01\n");
        assert_invalid(validate_backtest_config(&config), "start_date");
    }

    #[test]
    fn same_start_and_end_is_allowed() {
        let config = make_config("[backtest]\nstart_date = 2024-06-03\nend_date = 2024-06-03\n");
        assert!(validate_backtest_config(&config).is_ok());
    }

    #[test]
    fn valid_strategy_config_passes() {
        let config = make_config(
            r#"
[indicators]
fast_period = 20
slow_period = 50
trend_period = 100
rsi_period = 14
atr_period = 14
ma_type = ema

[strategy]
variant = mean_reversion
rsi_low = 40
rsi_high = 55

[risk]
risk_per_trade = 0.01
stop_atr = 1.5
target_atr = 3.0
max_exposure = 0.2
max_bars_in_trade = 48
"#,
        );
        assert!(validate_strategy_config(&config).is_ok());
    }

    #[test]
    fn empty_strategy_uses_preset() {
        let config = make_config("[strategy]\n");
        assert!(validate_strategy_config(&config).is_ok());
    }

    #[test]
    fn unknown_variant_fails() {
        let config = make_config("[strategy]\nvariant = breakout\n");
        assert_invalid(validate_strategy_config(&config), "variant");
    }

    #[test]
    fn parse_variant_defaults_to_mean_reversion() {
        let config = make_config("[strategy]\n");
        assert_eq!(parse_variant(&config).unwrap(), VariantKind::MeanReversion);
        let config = make_config("[strategy]\nvariant = trend_following\n");
        assert_eq!(parse_variant(&config).unwrap(), VariantKind::TrendFollowing);
    }

    #[test]
    fn zero_period_fails() {
        let config = make_config("[indicators]\natr_period = 0\n");
        assert_invalid(validate_strategy_config(&config), "atr_period");
    }

    #[test]
    fn fast_not_shorter_than_slow_fails() {
        let config = make_config("[indicators]\nfast_period = 50\nslow_period = 50\n");
        assert_invalid(validate_strategy_config(&config), "fast_period");
    }

    #[test]
    fn unknown_ma_type_fails() {
        let config = make_config("[indicators]\nma_type = hull\n");
        assert_invalid(validate_strategy_config(&config), "ma_type");
    }

    #[test]
    fn inverted_rsi_band_fails() {
        let config = make_config("[strategy]\nrsi_low = 60\nrsi_high = 50\n");
        assert_invalid(validate_strategy_config(&config), "rsi_low");
    }

    #[test]
    fn rsi_out_of_range_fails() {
        let config = make_config("[strategy]\nrsi_high = 120\n");
        assert_invalid(validate_strategy_config(&config), "rsi_high");
        let config = make_config("[strategy]\nrsi_upper = 0\n");
        assert_invalid(validate_strategy_config(&config), "rsi_upper");
    }

    #[test]
    fn risk_bounds() {
        let config = make_config("[risk]\nrisk_per_trade = 0\n");
        assert_invalid(validate_strategy_config(&config), "risk_per_trade");
        let config = make_config("[risk]\nstop_atr = 0\n");
        assert_invalid(validate_strategy_config(&config), "stop_atr");
        let config = make_config("[risk]\ntarget_atr = -1\n");
        assert_invalid(validate_strategy_config(&config), "target_atr");
        let config = make_config("[risk]\nmax_exposure = 1.5\n");
        assert_invalid(validate_strategy_config(&config), "max_exposure");
        let config = make_config("[risk]\nmax_bars_in_trade = -3\n");
        assert_invalid(validate_strategy_config(&config), "max_bars_in_trade");
    }

    #[test]
    fn non_finite_risk_values_fail() {
        let config = make_config("[risk]\nmax_exposure = nan\n");
        assert_invalid(validate_strategy_config(&config), "max_exposure");
        let config = make_config("[risk]\nrisk_per_trade = NaN\n");
        assert_invalid(validate_strategy_config(&config), "risk_per_trade");
        let config = make_config("[risk]\nstop_atr = inf\n");
        assert_invalid(validate_strategy_config(&config), "stop_atr");
        let config = make_config("[strategy]\nrsi_upper = nan\n");
        assert_invalid(validate_strategy_config(&config), "rsi_upper");
    }

    #[test]
    fn non_finite_backtest_values_fail() {
        let config = make_config("[backtest]\ninitial_capital = inf\n");
        assert_invalid(validate_backtest_config(&config), "initial_capital");
        let config = make_config("[backtest]\ncommission_pct = nan\n");
        assert_invalid(validate_backtest_config(&config), "commission_pct");
        let config = make_config("[backtest]\nperiods_per_year = nan\n");
        assert_invalid(validate_backtest_config(&config), "periods_per_year");
    }

    #[test]
    fn zero_target_and_time_limit_are_valid() {
        let config = make_config("[risk]\ntarget_atr = 0\nmax_bars_in_trade = 0\n");
        assert!(validate_strategy_config(&config).is_ok());
    }
}

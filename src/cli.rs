//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

use crate::adapters::csv_adapter::{CsvAdapter, write_trades_file};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::sim_broker::SimBroker;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, BacktestResult};
use crate::domain::config_validation::{
    invalid, parse_date, parse_variant, validate_backtest_config, validate_strategy_config,
};
use crate::domain::error::TraderError;
use crate::domain::indicator::IndicatorConfig;
use crate::domain::ledger::CommissionConfig;
use crate::domain::metrics::{DEFAULT_PERIODS_PER_YEAR, Metrics};
use crate::domain::risk::RiskConfig;
use crate::domain::strategy::{EntryVariant, StrategyConfig};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;

#[derive(Parser, Debug)]
#[command(
    name = "hybridtrader",
    about = "Trend-filtered mean-reversion and crossover strategy backtester"
)]
pub struct Cli {
    /// Log verbosity: trace, debug, info, warn or error
    #[arg(long, global = true, default_value = "info")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Bar CSV file or directory, overriding [backtest] data_file
        #[arg(short, long)]
        data: Option<PathBuf>,
        /// Write the trade ledger to this CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            data,
            output,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config)
            } else {
                run_backtest(&config, data.as_deref(), output.as_deref())
            }
        }
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn report(err: TraderError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

fn run_backtest(config_path: &Path, data_override: Option<&Path>, output: Option<&Path>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_all(&adapter) {
        return report(e);
    }

    let strategy = match build_strategy(&adapter) {
        Ok(s) => s,
        Err(e) => return report(e),
    };
    let bt_config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return report(e),
    };
    let data_path = match resolve_data_path(data_override, &adapter) {
        Ok(p) => p,
        Err(e) => return report(e),
    };

    eprintln!("Loading strategy: {} ({})", strategy.name, strategy.variant.kind());
    let data_port = CsvAdapter::new(data_path);

    let result = match run_backtest_pipeline(&data_port, &strategy, &bt_config) {
        Ok(r) => r,
        Err(e) => return report(e),
    };

    let metrics = result.metrics(&bt_config);
    print_summary(&strategy, &bt_config, &result, &metrics);

    if let Some(path) = output {
        if let Err(e) = write_trades_file(path, result.ledger.records()) {
            return report(e);
        }
        eprintln!("\nTrades written to: {}", path.display());
    }
    ExitCode::SUCCESS
}

fn validate_all(adapter: &dyn ConfigPort) -> Result<(), TraderError> {
    validate_backtest_config(adapter)?;
    validate_strategy_config(adapter)
}

pub fn resolve_data_path(
    data_override: Option<&Path>,
    adapter: &dyn ConfigPort,
) -> Result<PathBuf, TraderError> {
    if let Some(path) = data_override {
        return Ok(path.to_path_buf());
    }
    match adapter.get_string("backtest", "data_file") {
        Some(s) if !s.trim().is_empty() => Ok(PathBuf::from(s.trim())),
        _ => Err(TraderError::ConfigMissing {
            section: "backtest".into(),
            key: "data_file".into(),
        }),
    }
}

/// Fetch bars and run the strategy against a fresh simulated broker.
pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    strategy: &StrategyConfig,
    bt_config: &BacktestConfig,
) -> Result<BacktestResult, TraderError> {
    let bars = data_port.fetch_bars(&bt_config.symbol, bt_config.start_date, bt_config.end_date)?;

    let need = strategy.indicators.warmup_bars();
    if bars.len() <= need {
        warn!(
            have = bars.len(),
            need,
            "not enough bars to finish indicator warm-up; no trades will be taken"
        );
    }

    eprintln!(
        "Running backtest: {} bars of {} ({} to {})",
        bars.len(),
        bt_config.symbol,
        bars.first().map(|b| b.timestamp.to_string()).unwrap_or_default(),
        bars.last().map(|b| b.timestamp.to_string()).unwrap_or_default(),
    );

    let mut broker = SimBroker::new(bt_config.initial_capital, bt_config.commission);
    let result = backtest_engine::run_backtest(&bars, strategy, &mut broker, &bt_config.commission)?;
    info!(cash = broker.cash(), open_lot = broker.has_open_lot(), "broker settled");
    Ok(result)
}

fn print_summary(
    strategy: &StrategyConfig,
    bt_config: &BacktestConfig,
    result: &BacktestResult,
    metrics: &Metrics,
) {
    eprintln!("\n=== Results: {} ({}) ===", strategy.name, bt_config.symbol);
    eprintln!("Bars Processed:   {}", result.bars_processed);
    eprintln!("Starting Value:   {:.2}", bt_config.initial_capital);
    eprintln!("Final Value:      {:.2}", metrics.final_equity);
    eprintln!("Total Return:     {:.2}%", metrics.total_return * 100.0);
    eprintln!("Annualized:       {:.2}%", metrics.annualized_return * 100.0);
    eprintln!("Sharpe Ratio:     {:.2}", metrics.sharpe_ratio);
    eprintln!("Sortino Ratio:    {:.2}", metrics.sortino_ratio);
    eprintln!("Max Drawdown:     -{:.1}%", metrics.max_drawdown * 100.0);
    eprintln!("Total Trades:     {}", metrics.total_trades);
    eprintln!("Win Rate:         {:.1}%", metrics.win_rate * 100.0);
    eprintln!("Profit Factor:    {:.2}", metrics.profit_factor);
    eprintln!("Avg Bars Held:    {:.1}", metrics.avg_bars_held);

    if let Some(position) = &result.open_position {
        eprintln!(
            "Open Position:    {:.4} @ {:.2} since bar {} (stop {:.2})",
            position.size, position.entry_price, position.entry_bar_index, position.stop_price
        );
    }
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, TraderError> {
    Ok(BacktestConfig {
        symbol: adapter
            .get_string("backtest", "symbol")
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "DATA".to_string()),
        start_date: parse_date(adapter, "start_date")?,
        end_date: parse_date(adapter, "end_date")?,
        initial_capital: adapter.get_double("backtest", "initial_capital", 100_000.0),
        commission: CommissionConfig {
            per_trade: adapter.get_double("backtest", "commission_per_trade", 0.0),
            pct: adapter.get_double("backtest", "commission_pct", 0.1),
        },
        risk_free_rate: adapter.get_double("backtest", "risk_free_rate", 0.01),
        periods_per_year: adapter.get_double(
            "backtest",
            "periods_per_year",
            DEFAULT_PERIODS_PER_YEAR,
        ),
    })
}

fn period(adapter: &dyn ConfigPort, key: &str, default: usize) -> Result<usize, TraderError> {
    let value = adapter.get_int("indicators", key, default as i64);
    usize::try_from(value)
        .ok()
        .filter(|&p| p > 0)
        .ok_or_else(|| invalid("indicators", key, format!("{} must be at least 1", key)))
}

/// Start from the preset for `[strategy] variant` and apply every key present.
pub fn build_strategy(adapter: &dyn ConfigPort) -> Result<StrategyConfig, TraderError> {
    let preset = StrategyConfig::preset(parse_variant(adapter)?);
    let defaults = &preset.indicators;

    let ma_type = match adapter.get_string("indicators", "ma_type") {
        Some(s) => s
            .parse()
            .map_err(|reason| invalid("indicators", "ma_type", reason))?,
        None => defaults.ma_type,
    };
    let indicators = IndicatorConfig {
        fast_period: period(adapter, "fast_period", defaults.fast_period)?,
        slow_period: period(adapter, "slow_period", defaults.slow_period)?,
        trend_period: period(adapter, "trend_period", defaults.trend_period)?,
        rsi_period: period(adapter, "rsi_period", defaults.rsi_period)?,
        atr_period: period(adapter, "atr_period", defaults.atr_period)?,
        ma_type,
    };

    let variant = match preset.variant {
        EntryVariant::MeanReversion { rsi_low, rsi_high } => EntryVariant::MeanReversion {
            rsi_low: adapter.get_double("strategy", "rsi_low", rsi_low),
            rsi_high: adapter.get_double("strategy", "rsi_high", rsi_high),
        },
        EntryVariant::TrendFollowing { rsi_upper } => EntryVariant::TrendFollowing {
            rsi_upper: adapter.get_double("strategy", "rsi_upper", rsi_upper),
        },
    };

    let r = &preset.risk;
    let risk = RiskConfig {
        risk_per_trade: adapter.get_double("risk", "risk_per_trade", r.risk_per_trade),
        stop_multiple_of_atr: adapter.get_double("risk", "stop_atr", r.stop_multiple_of_atr),
        target_multiple_of_atr: adapter.get_enabled_double("risk", "target_atr", r.target_multiple_of_atr),
        max_exposure_fraction: adapter.get_double("risk", "max_exposure", r.max_exposure_fraction),
        max_bars_in_trade: adapter.get_enabled_count("risk", "max_bars_in_trade", r.max_bars_in_trade),
    };

    Ok(StrategyConfig {
        name: adapter
            .get_string("strategy", "name")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(preset.name),
        variant,
        exit_on_cross_below: adapter.get_bool("strategy", "exit_on_cross", preset.exit_on_cross_below),
        indicators,
        risk,
    })
}

fn print_strategy(strategy: &StrategyConfig) {
    eprintln!("\nStrategy: {}", strategy.name);
    match strategy.variant {
        EntryVariant::MeanReversion { rsi_low, rsi_high } => {
            eprintln!("  entry: close > trend MA, fast MA > slow MA, {} < RSI < {}", rsi_low, rsi_high);
        }
        EntryVariant::TrendFollowing { rsi_upper } => {
            eprintln!("  entry: close > trend MA, fast MA crosses above slow MA, RSI < {}", rsi_upper);
        }
    }
    eprintln!("  indicators: {}", strategy.indicators);
    eprintln!("  warm-up: {} bars", strategy.indicators.warmup_bars());

    let r = &strategy.risk;
    eprintln!(
        "  risk: {:.2}% per trade, exposure cap {:.0}%",
        r.risk_per_trade * 100.0,
        r.max_exposure_fraction * 100.0
    );
    eprintln!("  stop: {} x ATR", r.stop_multiple_of_atr);
    match r.target_multiple_of_atr {
        Some(t) => eprintln!("  target: {} x ATR", t),
        None => eprintln!("  target: none"),
    }
    match r.max_bars_in_trade {
        Some(m) => eprintln!("  time limit: {} bars", m),
        None => eprintln!("  time limit: none"),
    }
    eprintln!(
        "  crossover exit: {}",
        if strategy.exit_on_cross_below { "on" } else { "off" }
    );
}

pub fn run_dry_run(config_path: &Path) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_all(&adapter) {
        return report(e);
    }
    eprintln!("Config validated successfully");

    let strategy = match build_strategy(&adapter) {
        Ok(s) => s,
        Err(e) => return report(e),
    };
    let bt_config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return report(e),
    };
    print_strategy(&strategy);

    eprintln!("\nBacktest:");
    eprintln!("  symbol: {}", bt_config.symbol);
    match adapter.get_string("backtest", "data_file") {
        Some(f) => eprintln!("  data: {}", f),
        None => eprintln!("  data: (pass --data)"),
    }
    eprintln!("  initial capital: {:.2}", bt_config.initial_capital);
    eprintln!(
        "  commission: {:.2} + {}%",
        bt_config.commission.per_trade, bt_config.commission.pct
    );

    eprintln!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_all(&adapter) {
        return report(e);
    }
    match build_strategy(&adapter) {
        Ok(strategy) => print_strategy(&strategy),
        Err(e) => return report(e),
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

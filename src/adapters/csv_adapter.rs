//! CSV file data adapter and trade ledger export.
//!
//! Bar files need a header row naming `timestamp` (or `datetime`/`date`),
//! `open`, `high`, `low`, `close` and `volume`; column order and case do not
//! matter and extra columns are ignored.

use crate::domain::error::TraderError;
use crate::domain::ledger::TradeRecord;
use crate::domain::ohlcv::Bar;
use crate::ports::data_port::DataPort;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub struct CsvAdapter {
    path: PathBuf,
}

impl CsvAdapter {
    /// `path` is either a single CSV file or a directory of `<SYMBOL>.csv` files.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        if self.path.is_dir() {
            self.path.join(format!("{}.csv", symbol))
        } else {
            self.path.clone()
        }
    }
}

struct Columns {
    timestamp: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: usize,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, TraderError> {
        let find = |names: &[&str]| {
            headers
                .iter()
                .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
                .ok_or_else(|| TraderError::data(format!("missing {} column", names[0])))
        };
        Ok(Columns {
            timestamp: find(&["timestamp", "datetime", "date"])?,
            open: find(&["open"])?,
            high: find(&["high"])?,
            low: find(&["low"])?,
            close: find(&["close"])?,
            volume: find(&["volume"])?,
        })
    }
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[+HH:MM]`, `YYYY-MM-DDTHH:MM:SS`
/// or a bare `YYYY-MM-DD`. Offsets are dropped, keeping exchange wall-clock time.
pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime, TraderError> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%:z") {
        return Ok(dt.naive_local());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| TraderError::data(format!("invalid timestamp '{}'", s)))
}

fn parse_field(record: &csv::StringRecord, index: usize, name: &str, line: u64) -> Result<Option<f64>, TraderError> {
    let raw = record.get(index).map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Ok(None);
    }
    let value = raw
        .parse::<f64>()
        .map_err(|e| TraderError::data(format!("line {}: invalid {} value '{}': {}", line, name, raw, e)))?;
    if !value.is_finite() {
        return Err(TraderError::data(format!(
            "line {}: {} value '{}' is not a finite number",
            line, name, raw
        )));
    }
    Ok(Some(value))
}

pub fn read_bars<P: AsRef<Path>>(
    path: P,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> Result<Vec<Bar>, TraderError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        TraderError::data(format!("failed to read {}: {}", path.display(), e))
    })?;

    let mut rdr = csv::Reader::from_reader(file);
    let headers = rdr
        .headers()
        .map_err(|e| TraderError::data(format!("CSV header error: {}", e)))?
        .clone();
    let columns = Columns::from_headers(&headers)?;

    let mut bars = Vec::new();
    let mut skipped = 0usize;

    for result in rdr.records() {
        let record = result.map_err(|e| TraderError::data(format!("CSV parse error: {}", e)))?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();

        let ts_str = record.get(columns.timestamp).unwrap_or_default();
        let timestamp = parse_timestamp(ts_str)?;

        let date = timestamp.date();
        if start_date.is_some_and(|start| date < start) || end_date.is_some_and(|end| date > end) {
            continue;
        }

        let fields = (
            parse_field(&record, columns.open, "open", line)?,
            parse_field(&record, columns.high, "high", line)?,
            parse_field(&record, columns.low, "low", line)?,
            parse_field(&record, columns.close, "close", line)?,
        );
        let (Some(open), Some(high), Some(low), Some(close)) = fields else {
            skipped += 1;
            continue;
        };
        let volume = parse_field(&record, columns.volume, "volume", line)?.unwrap_or(0.0);

        if high < low {
            return Err(TraderError::data(format!(
                "line {}: high {} is below low {}",
                line, high, low
            )));
        }

        bars.push(Bar {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        });
    }

    if skipped > 0 {
        warn!(skipped, file = %path.display(), "skipped rows with missing prices");
    }

    bars.sort_by_key(|b| b.timestamp);
    if let Some(pair) = bars.windows(2).find(|w| w[0].timestamp == w[1].timestamp) {
        return Err(TraderError::data(format!(
            "duplicate bar at {}",
            pair[0].timestamp
        )));
    }
    debug!(bars = bars.len(), file = %path.display(), "loaded bars");
    Ok(bars)
}

impl DataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<Bar>, TraderError> {
        let bars = read_bars(self.csv_path(symbol), start_date, end_date)?;
        if bars.is_empty() {
            return Err(TraderError::NoData {
                symbol: symbol.to_string(),
            });
        }
        Ok(bars)
    }
}

/// Write the ledger as CSV, one row per closed trade.
pub fn write_trades<W: Write>(writer: W, records: &[TradeRecord]) -> Result<(), TraderError> {
    let mut wtr = csv::Writer::from_writer(writer);
    let to_err = |e: csv::Error| TraderError::Io(std::io::Error::other(e));

    wtr.write_record([
        "entry_bar",
        "exit_bar",
        "entry_price",
        "exit_price",
        "size",
        "pnl_gross",
        "pnl_net",
        "bars_held",
        "exit_reason",
    ])
    .map_err(to_err)?;

    for r in records {
        wtr.write_record([
            r.entry_bar_index.to_string(),
            r.exit_bar_index.to_string(),
            format!("{:.4}", r.entry_price),
            format!("{:.4}", r.exit_price),
            format!("{:.6}", r.size),
            format!("{:.2}", r.pnl_gross),
            format!("{:.2}", r.pnl_net),
            r.bars_held.to_string(),
            r.exit_reason.to_string(),
        ])
        .map_err(to_err)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_trades_file<P: AsRef<Path>>(path: P, records: &[TradeRecord]) -> Result<(), TraderError> {
    let file = File::create(path.as_ref())?;
    write_trades(file, records)
}

//! Average True Range with Wilder smoothing.
//!
//! TR[0] = high - low, TR[i] = bar.true_range(prev_close).
//! Seed with the mean of the first n true ranges, then
//! ATR[i] = (ATR[i-1] * (n-1) + TR[i]) / n.

use crate::domain::ohlcv::Bar;

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    prev_close: Option<f64>,
    seen: usize,
    seed_sum: f64,
    atr: Option<f64>,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        Atr {
            period,
            prev_close: None,
            seen: 0,
            seed_sum: 0.0,
            atr: None,
        }
    }

    pub fn update(&mut self, bar: &Bar) -> Option<f64> {
        let tr = match self.prev_close.replace(bar.close) {
            Some(prev_close) => bar.true_range(prev_close),
            None => bar.high - bar.low,
        };
        if self.period == 0 {
            return None;
        }
        self.seen += 1;

        let n = self.period as f64;
        match self.atr {
            Some(prev) => self.atr = Some((prev * (n - 1.0) + tr) / n),
            None => {
                self.seed_sum += tr;
                if self.seen == self.period {
                    self.atr = Some(self.seed_sum / n);
                }
            }
        }
        self.atr
    }
}

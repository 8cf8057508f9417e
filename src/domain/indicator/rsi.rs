//! RSI (Relative Strength Index) indicator.
//!
//! Uses Wilder's smoothing for average gain/loss calculation:
//! - First average: simple mean of gains/losses over the first n deltas
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100
//!
//! Warmup: needs n close-to-close deltas, i.e. n+1 closes.

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    prev_close: Option<f64>,
    deltas: usize,
    gain_sum: f64,
    loss_sum: f64,
    avg_gain: f64,
    avg_loss: f64,
    value: Option<f64>,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Rsi {
            period,
            prev_close: None,
            deltas: 0,
            gain_sum: 0.0,
            loss_sum: 0.0,
            avg_gain: 0.0,
            avg_loss: 0.0,
            value: None,
        }
    }

    pub fn update(&mut self, close: f64) -> Option<f64> {
        let prev = self.prev_close.replace(close);
        if self.period == 0 {
            return None;
        }
        let Some(prev) = prev else {
            return None;
        };

        let change = close - prev;
        let gain = if change > 0.0 { change } else { 0.0 };
        let loss = if change < 0.0 { -change } else { 0.0 };
        self.deltas += 1;

        let n = self.period as f64;
        if self.deltas < self.period {
            self.gain_sum += gain;
            self.loss_sum += loss;
            return None;
        } else if self.deltas == self.period {
            self.avg_gain = (self.gain_sum + gain) / n;
            self.avg_loss = (self.loss_sum + loss) / n;
        } else {
            self.avg_gain = (self.avg_gain * (n - 1.0) + gain) / n;
            self.avg_loss = (self.avg_loss * (n - 1.0) + loss) / n;
        }

        let rsi = if self.avg_loss == 0.0 {
            100.0
        } else {
            100.0 - (100.0 / (1.0 + self.avg_gain / self.avg_loss))
        };
        self.value = Some(rsi.clamp(0.0, 100.0));
        self.value
    }
}

//! Exponential Moving Average indicator.
//!
//! k = 2/(n+1), seed with first SMA, then EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! Warmup: first (n-1) updates return `None`.

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    k: f64,
    seen: usize,
    seed_sum: f64,
    ema: Option<f64>,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Ema {
            period,
            k: 2.0 / (period as f64 + 1.0),
            seen: 0,
            seed_sum: 0.0,
            ema: None,
        }
    }

    pub fn update(&mut self, close: f64) -> Option<f64> {
        if self.period == 0 {
            return None;
        }
        self.seen += 1;
        match self.ema {
            Some(prev) => {
                self.ema = Some(close * self.k + prev * (1.0 - self.k));
            }
            None => {
                self.seed_sum += close;
                if self.seen == self.period {
                    self.ema = Some(self.seed_sum / self.period as f64);
                }
            }
        }
        self.ema
    }
}

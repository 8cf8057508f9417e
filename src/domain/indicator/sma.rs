//! Simple Moving Average over a fixed window of closes.
//!
//! SMA = sum(C[i-n+1..=i]) / n, kept as a running sum over a ring buffer.
//! Warmup: first (n-1) updates return `None`.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    window: VecDeque<f64>,
    sum: f64,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        Sma {
            period,
            window: VecDeque::with_capacity(period),
            sum: 0.0,
        }
    }

    pub fn update(&mut self, close: f64) -> Option<f64> {
        if self.period == 0 {
            return None;
        }
        self.window.push_back(close);
        self.sum += close;
        if self.window.len() > self.period {
            if let Some(oldest) = self.window.pop_front() {
                self.sum -= oldest;
            }
        }
        self.value()
    }

    pub fn value(&self) -> Option<f64> {
        if self.period > 0 && self.window.len() == self.period {
            Some(self.sum / self.period as f64)
        } else {
            None
        }
    }
}

//! Crossover detection between two series.
//!
//! Compares the sign of (fast - slow) on this bar with the last nonzero sign:
//! +1 when it turns positive, -1 when it turns negative, 0 otherwise.
//! A zero difference keeps the previous side, so touching without crossing
//! is not a signal.

#[derive(Debug, Clone, Default)]
pub struct Crossover {
    last_side: Option<i8>,
}

impl Crossover {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, diff: f64) -> i8 {
        let side = if diff > 0.0 {
            1
        } else if diff < 0.0 {
            -1
        } else {
            return 0;
        };

        let sign = match self.last_side {
            Some(prev) if prev != side => side,
            _ => 0,
        };
        self.last_side = Some(side);
        sign
    }
}

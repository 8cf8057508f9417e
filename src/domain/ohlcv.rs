//! Price bar representation.

use chrono::NaiveDateTime;

use crate::domain::error::TraderError;

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }
}

/// Check that bars are in strictly increasing timestamp order.
pub fn ensure_chronological(bars: &[Bar]) -> Result<(), TraderError> {
    for pair in bars.windows(2) {
        if pair[1].timestamp <= pair[0].timestamp {
            return Err(TraderError::Data {
                reason: format!(
                    "bars out of order or duplicated at {} (after {})",
                    pair[1].timestamp, pair[0].timestamp
                ),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn sample_bar() -> Bar {
        Bar {
            timestamp: at(10),
            open: 100.0,
            high: 110.0,
            low: 90.0,
            close: 105.0,
            volume: 50_000.0,
        }
    }

    #[test]
    fn true_range_hl_dominates() {
        let bar = sample_bar();
        // high-low=20, |high-100|=10, |low-100|=10 → 20
        assert!((bar.true_range(100.0) - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn true_range_gap_up() {
        let bar = sample_bar();
        // high-low=20, |110-70|=40, |90-70|=20 → 40
        assert!((bar.true_range(70.0) - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn true_range_gap_down() {
        let bar = sample_bar();
        // high-low=20, |110-130|=20, |90-130|=40 → 40
        assert!((bar.true_range(130.0) - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn chronological_accepts_increasing() {
        let mut later = sample_bar();
        later.timestamp = at(11);
        assert!(ensure_chronological(&[sample_bar(), later]).is_ok());
        assert!(ensure_chronological(&[]).is_ok());
    }

    #[test]
    fn chronological_rejects_duplicates_and_reversal() {
        assert!(ensure_chronological(&[sample_bar(), sample_bar()]).is_err());

        let mut earlier = sample_bar();
        earlier.timestamp = at(9);
        assert!(ensure_chronological(&[sample_bar(), earlier]).is_err());
    }
}

//! Configuration access port: sectioned key/value settings.

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;
    fn get_double(&self, section: &str, key: &str, default: f64) -> f64;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;

    /// Optional multiple such as `target_atr`; zero or below switches it off.
    fn get_enabled_double(&self, section: &str, key: &str, default: Option<f64>) -> Option<f64> {
        let value = self.get_double(section, key, default.unwrap_or(0.0));
        (value > 0.0).then_some(value)
    }

    /// Optional bar count such as `max_bars_in_trade`; zero or below switches it off.
    fn get_enabled_count(&self, section: &str, key: &str, default: Option<usize>) -> Option<usize> {
        let fallback = default.and_then(|v| i64::try_from(v).ok()).unwrap_or(0);
        usize::try_from(self.get_int(section, key, fallback))
            .ok()
            .filter(|&v| v > 0)
    }
}

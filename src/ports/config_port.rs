//! Configuration access port trait.

use chrono::NaiveDate;

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;
    fn get_double(&self, section: &str, key: &str, default: f64) -> f64;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;

    /// A `YYYY-MM-DD` value. `None` when absent, `Some(Err)` when malformed.
    fn get_date(&self, section: &str, key: &str) -> Option<Result<NaiveDate, chrono::ParseError>> {
        self.get_string(section, key)
            .map(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d"))
    }

    /// A comma-separated list, trimmed, empty entries dropped.
    fn get_list(&self, section: &str, key: &str) -> Vec<String> {
        self.get_string(section, key)
            .map(|s| {
                s.split(',')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

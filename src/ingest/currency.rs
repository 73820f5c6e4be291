//! Currency conversion to a single reference currency.
//!
//! Rates are pluggable; the default is a fixed snapshot table. Callers always
//! preserve the original amount and currency alongside the converted value.

use std::collections::HashMap;

/// Source of exchange rates into the reference currency.
pub trait RateProvider: Send + Sync {
    /// ISO code the catalog normalizes into, e.g. "USD".
    fn reference_currency(&self) -> &str;

    /// Multiplier from `currency` into the reference currency.
    fn rate_to_reference(&self, currency: &str) -> Option<f64>;

    /// Convert an amount, rounded to cents. None for unknown currencies.
    fn convert(&self, amount: f64, currency: &str) -> Option<f64> {
        let rate = self.rate_to_reference(currency)?;
        Some(((amount * rate) * 100.0).round() / 100.0)
    }
}

/// Fixed snapshot of exchange rates.
pub struct StaticRates {
    reference: String,
    rates: HashMap<String, f64>,
}

impl StaticRates {
    pub fn new(reference: impl Into<String>, rates: HashMap<String, f64>) -> Self {
        Self {
            reference: reference.into(),
            rates,
        }
    }

    /// Snapshot with USD as the reference currency.
    pub fn usd_snapshot() -> Self {
        let rates = HashMap::from([
            ("USD".to_string(), 1.0),
            ("GBP".to_string(), 1.27),
            ("EUR".to_string(), 1.09),
            ("CAD".to_string(), 0.74),
            ("AUD".to_string(), 0.66),
            ("INR".to_string(), 0.012),
            ("JPY".to_string(), 0.0068),
            ("CNY".to_string(), 0.14),
        ]);
        Self::new("USD", rates)
    }
}

impl Default for StaticRates {
    fn default() -> Self {
        Self::usd_snapshot()
    }
}

impl RateProvider for StaticRates {
    fn reference_currency(&self) -> &str {
        &self.reference
    }

    fn rate_to_reference(&self, currency: &str) -> Option<f64> {
        self.rates.get(&currency.trim().to_uppercase()).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gbp_converts_at_snapshot_rate() {
        let rates = StaticRates::usd_snapshot();
        assert_eq!(rates.convert(100.0, "GBP"), Some(127.0));
    }

    #[test]
    fn reference_currency_is_identity() {
        let rates = StaticRates::usd_snapshot();
        assert_eq!(rates.convert(49.99, "USD"), Some(49.99));
    }

    #[test]
    fn unknown_currency_is_none() {
        let rates = StaticRates::usd_snapshot();
        assert_eq!(rates.convert(100.0, "XYZ"), None);
    }

    #[test]
    fn codes_are_case_insensitive() {
        let rates = StaticRates::usd_snapshot();
        assert_eq!(rates.convert(100.0, "gbp"), Some(127.0));
    }
}

use std::collections::HashMap;

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unable to convert from currency {from} to desired ad server currency {to}")]
pub struct ConversionError {
    pub from: String,
    pub to: String,
}

/// Currency-rate source. Rate acquisition lives with the host; the runner
/// only asks for a multiplier.
pub trait Conversions: Send + Sync {
    /// Multiplier turning a price in `from` into a price in `to`.
    fn get_rate(&self, from: &str, to: &str) -> Result<f64, ConversionError>;
}

/// Fixed rate table; the deterministic implementation used by tests and the
/// CLI. Identity conversions always resolve to 1.0.
#[derive(Debug, Clone, Default)]
pub struct StaticRates {
    rates: HashMap<(String, String), f64>,
}

impl StaticRates {
    pub fn new() -> Self {
        StaticRates::default()
    }

    pub fn set(&mut self, from: &str, to: &str, rate: f64) -> &mut Self {
        self.rates.insert((from.to_string(), to.to_string()), rate);
        self
    }
}

impl Conversions for StaticRates {
    fn get_rate(&self, from: &str, to: &str) -> Result<f64, ConversionError> {
        if from == to {
            return Ok(1.0);
        }
        self.rates
            .get(&(from.to_string(), to.to_string()))
            .copied()
            .ok_or_else(|| ConversionError { from: from.to_string(), to: to.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_rate() {
        let rates = StaticRates::new();
        assert_eq!(rates.get_rate("USD", "USD").unwrap(), 1.0);
    }

    #[test]
    fn test_configured_rate_and_miss() {
        let mut rates = StaticRates::new();
        rates.set("EUR", "USD", 1.1);
        assert_eq!(rates.get_rate("EUR", "USD").unwrap(), 1.1);

        let err = rates.get_rate("EUR", "GBP").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unable to convert from currency EUR to desired ad server currency GBP"
        );
    }
}

use std::collections::HashMap;

/// Commission rate applied when a product type has no configured rate.
pub const DEFAULT_COMMISSION_RATE: f64 = 0.10;

/// Per-product-type affiliate commission rates, loaded from the settings
/// table. Missing types fall back to [`DEFAULT_COMMISSION_RATE`].
#[derive(Debug, Clone, Default)]
pub struct CommissionRates(HashMap<String, f64>);

impl CommissionRates {
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, f64)>) -> Self {
        Self(pairs.into_iter().collect())
    }

    pub fn rate_for(&self, product_type: &str) -> f64 {
        self.0
            .get(product_type)
            .copied()
            .unwrap_or(DEFAULT_COMMISSION_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_type_uses_default_rate() {
        let rates = CommissionRates::from_pairs([("course".to_string(), 0.15)]);
        assert_eq!(rates.rate_for("course"), 0.15);
        assert_eq!(rates.rate_for("tool"), DEFAULT_COMMISSION_RATE);
    }
}

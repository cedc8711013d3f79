// crates/core/src/allocation.rs
//! Percentage-of-total breakdowns (portfolio allocation, asset-type donut).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::grouping::NO_CATEGORY;
use crate::types::AssetRecord;

/// Exchange rates relative to a base currency (`1 base = rate[code]`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "codegen", derive(ts_rs::TS), ts(export, export_to = "../../web/src/types/generated/"))]
pub struct ExchangeRates {
    pub base: String,
    pub rates: HashMap<String, f64>,
}

impl ExchangeRates {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into().to_ascii_uppercase(),
            rates: HashMap::new(),
        }
    }

    pub fn with_rate(mut self, code: &str, rate: f64) -> Self {
        self.rates.insert(code.to_ascii_uppercase(), rate);
        self
    }

    fn rate(&self, code: &str) -> Option<f64> {
        let code = code.to_ascii_uppercase();
        if code == self.base {
            return Some(1.0);
        }
        self.rates
            .get(&code)
            .copied()
            .filter(|r| r.is_finite() && *r > 0.0)
    }

    /// Convert `amount` from one currency to another through the base.
    ///
    /// A missing rate on either side leaves the amount unconverted.
    pub fn convert(&self, amount: f64, from: &str, to: &str) -> f64 {
        if from.eq_ignore_ascii_case(to) {
            return amount;
        }
        match (self.rate(from), self.rate(to)) {
            (Some(from_rate), Some(to_rate)) => amount / from_rate * to_rate,
            _ => {
                tracing::debug!(from, to, "Missing exchange rate, leaving amount unconverted");
                amount
            }
        }
    }
}

/// One slice of an allocation breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "codegen", derive(ts_rs::TS), ts(export, export_to = "../../web/src/types/generated/"))]
#[serde(rename_all = "camelCase")]
pub struct AllocationSlice {
    pub category: String,
    pub worth: f64,
    pub percentage: u32,
}

/// Full breakdown in one display currency.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "codegen", derive(ts_rs::TS), ts(export, export_to = "../../web/src/types/generated/"))]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    pub currency: String,
    pub total: f64,
    pub slices: Vec<AllocationSlice>,
}

/// Sum `(category, worth)` pairs into slices.
///
/// Non-positive categories are excluded and do not count towards the total.
/// Slices are ordered by descending worth, ties in discovery order.
pub fn allocate<I, S>(entries: I) -> (f64, Vec<AllocationSlice>)
where
    I: IntoIterator<Item = (S, f64)>,
    S: Into<String>,
{
    let mut sums: Vec<(String, f64)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for (category, worth) in entries {
        if !worth.is_finite() {
            continue;
        }
        let category = category.into();
        let slot = *index.entry(category.clone()).or_insert_with(|| {
            sums.push((category, 0.0));
            sums.len() - 1
        });
        sums[slot].1 += worth;
    }

    sums.retain(|(_, worth)| *worth > 0.0);
    let total: f64 = sums.iter().map(|(_, w)| w).sum();
    // Stable: equal worths keep discovery order.
    sums.sort_by(|a, b| b.1.total_cmp(&a.1));

    let slices = sums
        .into_iter()
        .map(|(category, worth)| AllocationSlice {
            percentage: ((worth / total) * 100.0).round() as u32,
            category,
            worth,
        })
        .collect();
    (total, slices)
}

/// Which attribute of an asset to bucket by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationKey {
    #[default]
    Type,
    Name,
}

/// Allocation of assets in `currency`, converting each asset from its own
/// stored currency (`default_currency` when unset).
pub fn asset_allocation(
    assets: &[AssetRecord],
    key: AllocationKey,
    currency: &str,
    default_currency: &str,
    rates: &ExchangeRates,
) -> Allocation {
    let entries = assets.iter().filter_map(|asset| {
        let worth = asset.worth?;
        let from = asset.currency.as_deref().unwrap_or(default_currency);
        let category = match key {
            AllocationKey::Type => asset.asset_type.clone(),
            AllocationKey::Name => Some(asset.name.clone()),
        }
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| NO_CATEGORY.to_string());
        Some((category, rates.convert(worth, from, currency)))
    });

    let (total, slices) = allocate(entries);
    Allocation {
        currency: currency.to_ascii_uppercase(),
        total,
        slices,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn asset(id: &str, kind: Option<&str>, worth: Option<f64>, currency: Option<&str>) -> AssetRecord {
        AssetRecord {
            id: id.into(),
            name: format!("asset-{id}"),
            asset_type: kind.map(String::from),
            worth,
            currency: currency.map(String::from),
        }
    }

    #[test]
    fn test_allocate_excludes_non_positive() {
        let (total, slices) = allocate([("Stocks", 60.0), ("Cash", 40.0), ("Debt", -10.0), ("Empty", 0.0)]);

        assert_eq!(total, 100.0);
        let names: Vec<&str> = slices.iter().map(|s| s.category.as_str()).collect();
        assert_eq!(names, vec!["Stocks", "Cash"]);
        assert_eq!(slices[0].percentage, 60);
        assert_eq!(slices[1].percentage, 40);
    }

    #[test]
    fn test_allocate_ties_keep_discovery_order() {
        let (_, slices) = allocate([("B", 10.0), ("A", 10.0), ("C", 30.0)]);
        let names: Vec<&str> = slices.iter().map(|s| s.category.as_str()).collect();
        assert_eq!(names, vec!["C", "B", "A"]);
    }

    #[test]
    fn test_allocate_sums_per_category() {
        let (_, slices) = allocate([("Stocks", 10.0), ("Cash", 5.0), ("Stocks", 15.0)]);
        assert_eq!(slices[0].category, "Stocks");
        assert_eq!(slices[0].worth, 25.0);
        assert_eq!(slices[0].percentage, 83);
        assert_eq!(slices[1].percentage, 17);
    }

    #[test]
    fn test_allocate_empty() {
        let (total, slices) = allocate(Vec::<(String, f64)>::new());
        assert_eq!(total, 0.0);
        assert!(slices.is_empty());
    }

    #[test]
    fn test_convert_through_base() {
        let rates = ExchangeRates::new("EUR").with_rate("USD", 1.25).with_rate("GBP", 0.8);
        assert_eq!(rates.convert(100.0, "EUR", "USD"), 125.0);
        assert_eq!(rates.convert(125.0, "usd", "EUR"), 100.0);
        assert!((rates.convert(125.0, "USD", "GBP") - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_convert_missing_rate_leaves_amount() {
        let rates = ExchangeRates::new("EUR");
        assert_eq!(rates.convert(42.0, "JPY", "EUR"), 42.0);
        assert_eq!(rates.convert(42.0, "EUR", "JPY"), 42.0);
    }

    #[test]
    fn test_asset_allocation_converts_and_buckets() {
        let rates = ExchangeRates::new("EUR").with_rate("USD", 2.0);
        let assets = vec![
            asset("1", Some("Stocks"), Some(100.0), Some("USD")),
            asset("2", Some("Cash"), Some(50.0), None),
            asset("3", None, Some(50.0), Some("EUR")),
            asset("4", Some("Crypto"), None, Some("EUR")),
        ];

        let allocation = asset_allocation(&assets, AllocationKey::Type, "eur", "EUR", &rates);

        assert_eq!(allocation.currency, "EUR");
        assert_eq!(allocation.total, 150.0);
        let names: Vec<&str> = allocation.slices.iter().map(|s| s.category.as_str()).collect();
        assert_eq!(names, vec!["Stocks", "Cash", NO_CATEGORY]);
        assert_eq!(allocation.slices[0].percentage, 33);
    }

    proptest! {
        #[test]
        fn prop_percentages_sum_close_to_100(
            worths in prop::collection::vec(0.01f64..1_000_000.0, 1..12),
        ) {
            let entries: Vec<(String, f64)> = worths
                .iter()
                .enumerate()
                .map(|(i, w)| (format!("c{i}"), *w))
                .collect();
            let (_, slices) = allocate(entries);
            let sum: i64 = slices.iter().map(|s| s.percentage as i64).sum();
            let bound = slices.len() as i64;
            prop_assert!((sum - 100).abs() <= bound, "sum {} bound {}", sum, bound);
        }
    }
}

use crate::errors::{EngineError, EngineResult};
use crate::market::PriceTable;
use std::collections::BTreeMap;

/// Ticker -> normalized portfolio weight.
pub type WeightMap = BTreeMap<String, f64>;

/// Ticker -> units held.
pub type Quantities = BTreeMap<String, f64>;

fn market_values(
    quantities: &Quantities,
    last_prices: &BTreeMap<String, f64>,
) -> EngineResult<Vec<(String, f64)>> {
    quantities
        .iter()
        .map(|(t, q)| {
            last_prices
                .get(t)
                .map(|p| (t.clone(), q * p))
                .ok_or_else(|| EngineError::MissingPrice(t.clone()))
        })
        .collect()
}

/// Market-value weights over the tickers of `quantities`.
///
/// Weights sum to 1.0 when the portfolio has positive value. A zero-value
/// portfolio divides by 1.0 instead, which yields all-zero weights.
pub fn compute_weights(
    quantities: &Quantities,
    last_prices: &BTreeMap<String, f64>,
) -> EngineResult<WeightMap> {
    let values = market_values(quantities, last_prices)?;
    let total: f64 = values.iter().map(|(_, v)| v).sum();
    let denom = if total == 0.0 { 1.0 } else { total };

    Ok(values.into_iter().map(|(t, v)| (t, v / denom)).collect())
}

/// Raw portfolio market value. May be zero.
pub fn total_value(quantities: &Quantities, last_prices: &BTreeMap<String, f64>) -> EngineResult<f64> {
    Ok(market_values(quantities, last_prices)?
        .iter()
        .map(|(_, v)| v)
        .sum())
}

/// Weights laid out in the price table's column order.
/// The map must cover exactly the table's columns.
pub fn weight_vector(table: &PriceTable, weights: &WeightMap) -> EngineResult<Vec<f64>> {
    if weights.len() != table.width() {
        return Err(EngineError::WeightMismatch {
            expected: table.width(),
            actual: weights.len(),
        });
    }

    table
        .tickers()
        .iter()
        .map(|t| {
            weights
                .get(t)
                .copied()
                .ok_or_else(|| EngineError::MissingWeight(t.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
        entries.iter().map(|(t, v)| (t.to_string(), *v)).collect()
    }

    #[test]
    fn test_weights_sum_to_one() {
        let qty = map(&[("AAPL", 10.0), ("MSFT", 5.0), ("XOM", 12.5)]);
        let last = map(&[("AAPL", 190.0), ("MSFT", 410.0), ("XOM", 101.3)]);

        let weights = compute_weights(&qty, &last).unwrap();
        let sum: f64 = weights.values().sum();
        assert!((sum - 1.0).abs() < 1e-9, "weights should sum to 1: {sum}");
        assert!(weights.values().all(|w| *w >= 0.0), "no negative weights");
        assert_eq!(weights.len(), qty.len());
    }

    #[test]
    fn test_zero_value_gives_zero_weights() {
        let qty = map(&[("AAPL", 10.0), ("MSFT", 5.0)]);
        let last = map(&[("AAPL", 0.0), ("MSFT", 0.0)]);

        let weights = compute_weights(&qty, &last).unwrap();
        assert!(weights.values().all(|w| *w == 0.0), "expected all-zero weights: {weights:?}");
        assert_eq!(total_value(&qty, &last).unwrap(), 0.0);
    }

    #[test]
    fn test_missing_price_is_an_error() {
        let qty = map(&[("AAPL", 10.0), ("TSLA", 1.0)]);
        let last = map(&[("AAPL", 190.0)]);

        let result = compute_weights(&qty, &last);
        assert!(matches!(result, Err(EngineError::MissingPrice(ref t)) if t == "TSLA"));
    }

    fn two_column_table() -> PriceTable {
        let dates = (1..=3)
            .map(|d| chrono::NaiveDate::from_ymd_opt(2024, 5, d).unwrap())
            .collect();
        PriceTable::new(
            dates,
            vec!["A".into(), "B".into()],
            vec![
                vec![Some(10.0), Some(11.0), Some(12.0)],
                vec![Some(20.0), Some(19.0), Some(21.0)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_weight_vector_follows_column_order() {
        let w = weight_vector(&two_column_table(), &map(&[("B", 0.75), ("A", 0.25)])).unwrap();
        assert_eq!(w, vec![0.25, 0.75]);
    }

    #[test]
    fn test_weight_for_unknown_column_is_missing_weight() {
        // right length, wrong key
        let result = weight_vector(&two_column_table(), &map(&[("A", 0.5), ("Z", 0.5)]));
        assert!(
            matches!(result, Err(EngineError::MissingWeight(ref t)) if t == "B"),
            "got {result:?}"
        );
    }

    #[test]
    fn test_weight_count_must_match_columns() {
        let result = weight_vector(&two_column_table(), &map(&[("A", 1.0)]));
        assert!(matches!(
            result,
            Err(EngineError::WeightMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_total_value() {
        let qty = map(&[("AAPL", 2.0), ("MSFT", 3.0)]);
        let last = map(&[("AAPL", 100.0), ("MSFT", 10.0), ("SPY", 500.0)]);
        assert!((total_value(&qty, &last).unwrap() - 230.0).abs() < 1e-12);
    }
}

//! Feature extraction from a snapshot series.

use crate::stats::RollingStats;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use surveil_core::Snapshot;

/// Model input: (price return, volume ratio, spread pct or 0, book
/// imbalance as a fraction or 0).
pub type FeatureRow = [f64; N_FEATURES];

pub const N_FEATURES: usize = 4;

pub(crate) fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Simple return from `prev` to `cur`; 0 for a non-positive base.
pub(crate) fn simple_return(prev: &Snapshot, cur: &Snapshot) -> f64 {
    let base = to_f64(prev.price);
    if base <= 0.0 {
        return 0.0;
    }
    (to_f64(cur.price) - base) / base
}

/// Volume over the mean of `preceding`; 1.0 when that mean is below `epsilon`.
pub(crate) fn volume_ratio(current: f64, preceding: &[Snapshot], epsilon: f64) -> f64 {
    let mean = RollingStats::from_values(preceding.iter().map(|s| to_f64(s.volume))).mean();
    if preceding.is_empty() || mean <= epsilon {
        return 1.0;
    }
    current / mean
}

/// Book imbalance in [-1, 1]; 0 without depth.
pub(crate) fn imbalance_fraction(snapshot: &Snapshot) -> f64 {
    snapshot
        .imbalance_pct()
        .map(|pct| to_f64(pct) / 100.0)
        .unwrap_or(0.0)
}

/// Feature row for `history[index]`, using up to `window` preceding points.
///
/// `None` for the first point, which has no return.
pub fn feature_row_at(
    history: &[Snapshot],
    index: usize,
    window: usize,
    epsilon: f64,
) -> Option<FeatureRow> {
    if index == 0 || index >= history.len() {
        return None;
    }
    let cur = &history[index];
    let preceding = &history[index.saturating_sub(window)..index];
    Some([
        simple_return(&history[index - 1], cur),
        volume_ratio(to_f64(cur.volume), preceding, epsilon),
        cur.spread_pct().map(to_f64).unwrap_or(0.0),
        imbalance_fraction(cur),
    ])
}

/// Feature rows for every point after the first, oldest first.
pub fn feature_rows(history: &[Snapshot], window: usize, epsilon: f64) -> Vec<FeatureRow> {
    (1..history.len())
        .filter_map(|i| feature_row_at(history, i, window, epsilon))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use surveil_core::Symbol;

    fn snap(i: i64, price: Decimal, volume: Decimal) -> Snapshot {
        Snapshot::new(
            Symbol::new("XYZ"),
            Utc.timestamp_opt(1_700_000_000 + i, 0).unwrap(),
            price,
            volume,
            "test",
        )
    }

    #[test]
    fn test_feature_rows_skip_first_point() {
        let history = vec![
            snap(0, dec!(100), dec!(10)),
            snap(1, dec!(110), dec!(20)),
            snap(2, dec!(99), dec!(15)),
        ];
        let rows = feature_rows(&history, 20, 1e-9);
        assert_eq!(rows.len(), 2);
        assert!((rows[0][0] - 0.1).abs() < 1e-12);
        assert!((rows[0][1] - 2.0).abs() < 1e-12);
        assert!((rows[1][0] + 0.1).abs() < 1e-12);
        assert!((rows[1][1] - 1.0).abs() < 1e-12);
        assert_eq!(rows[1][2], 0.0);
    }

    #[test]
    fn test_zero_volume_history_gives_unit_ratio() {
        let history = vec![snap(0, dec!(10), dec!(0)), snap(1, dec!(10), dec!(50))];
        let row = feature_row_at(&history, 1, 20, 1e-9).unwrap();
        assert_eq!(row[1], 1.0);
    }

    #[test]
    fn test_spread_feature() {
        let history = vec![
            snap(0, dec!(10), dec!(1)),
            snap(1, dec!(10), dec!(1)).with_quote(dec!(9.9), dec!(10.1)),
        ];
        let row = feature_row_at(&history, 1, 20, 1e-9).unwrap();
        assert!((row[2] - 2.0).abs() < 1e-12);
        assert_eq!(row[3], 0.0);
    }

    #[test]
    fn test_imbalance_feature() {
        use surveil_core::{BookLevel, OrderBook};

        let book = OrderBook::new(
            Symbol::new("XYZ"),
            Utc.timestamp_opt(1_700_000_001, 0).unwrap(),
            vec![BookLevel::new(dec!(10), dec!(100))],
            vec![BookLevel::new(dec!(10), dec!(300))],
            "test",
        );
        let history = vec![
            snap(0, dec!(10), dec!(1)),
            snap(1, dec!(10), dec!(1)).with_book(&book),
        ];
        let row = feature_row_at(&history, 1, 20, 1e-9).unwrap();
        assert!((row[3] + 0.5).abs() < 1e-12);
    }
}

//! Spike flag thresholds derived from alert rules.

use surveil_core::{AlertRule, Direction, MetricKind, Symbol};

/// Thresholds behind the `price_spike` and `volume_spike` flags.
///
/// Taken from the lowest threshold among rules that apply to the symbol, so
/// a flag is raised whenever at least one rule would fire on the value.
/// Price thresholds keep the rule direction: an `above`-only rule never
/// flags a fall. `None` means no rule watches that side and it never flags.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpikeThresholds {
    /// Rise in percent (`above` and `either` rules).
    pub price_rise_pct: Option<f64>,
    /// Fall in percent, as a positive magnitude (`below` and `either` rules).
    pub price_fall_pct: Option<f64>,
    /// Volume ratio (`above` and `either` rules; a ratio is never negative).
    pub volume_ratio: Option<f64>,
}

impl SpikeThresholds {
    pub fn from_rules(rules: &[AlertRule], symbol: &Symbol) -> Self {
        let lowest = |metric: MetricKind, directions: &[Direction]| {
            rules
                .iter()
                .filter(|r| {
                    r.metric == metric && r.applies_to(symbol) && directions.contains(&r.direction)
                })
                .map(|r| r.threshold)
                .reduce(f64::min)
        };
        Self {
            price_rise_pct: lowest(
                MetricKind::PriceChangePct,
                &[Direction::Above, Direction::Either],
            ),
            price_fall_pct: lowest(
                MetricKind::PriceChangePct,
                &[Direction::Below, Direction::Either],
            ),
            volume_ratio: lowest(MetricKind::VolumeRatio, &[Direction::Above, Direction::Either]),
        }
    }

    /// Same threshold on both sides.
    pub fn symmetric(price_change_pct: f64, volume_ratio: f64) -> Self {
        Self {
            price_rise_pct: Some(price_change_pct),
            price_fall_pct: Some(price_change_pct),
            volume_ratio: Some(volume_ratio),
        }
    }

    pub fn price_spike(&self, price_change_pct: f64) -> bool {
        self.price_rise_pct.is_some_and(|t| price_change_pct >= t)
            || self.price_fall_pct.is_some_and(|t| price_change_pct <= -t)
    }

    pub fn volume_spike(&self, volume_ratio: f64) -> bool {
        self.volume_ratio.is_some_and(|t| volume_ratio >= t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use surveil_core::RuleScope;

    fn rule(
        id: &str,
        scope: RuleScope,
        metric: MetricKind,
        threshold: f64,
        direction: Direction,
    ) -> AlertRule {
        AlertRule::new(
            id,
            scope,
            metric,
            threshold,
            direction,
            Duration::from_secs(60),
        )
    }

    #[test]
    fn test_lowest_applicable_threshold_wins() {
        let rules = vec![
            rule("px-any", RuleScope::Any, MetricKind::PriceChangePct, 8.0, Direction::Either),
            rule(
                "px-xyz",
                RuleScope::Symbol(Symbol::new("XYZ")),
                MetricKind::PriceChangePct,
                5.0,
                Direction::Either,
            ),
            rule(
                "px-abc",
                RuleScope::Symbol(Symbol::new("ABC")),
                MetricKind::PriceChangePct,
                1.0,
                Direction::Either,
            ),
            rule("vol", RuleScope::Any, MetricKind::VolumeRatio, 3.0, Direction::Above),
        ];
        let t = SpikeThresholds::from_rules(&rules, &Symbol::new("XYZ"));
        assert_eq!(t.price_rise_pct, Some(5.0));
        assert_eq!(t.price_fall_pct, Some(5.0));
        assert_eq!(t.volume_ratio, Some(3.0));

        assert!(t.price_spike(-5.0));
        assert!(!t.price_spike(4.99));
        assert!(t.volume_spike(3.0));
    }

    #[test]
    fn test_above_only_rule_ignores_falls() {
        let rules = vec![rule("px-up", RuleScope::Any, MetricKind::PriceChangePct, 5.0, Direction::Above)];
        let t = SpikeThresholds::from_rules(&rules, &Symbol::new("XYZ"));
        assert!(t.price_spike(8.0));
        assert!(!t.price_spike(-8.0));
    }

    #[test]
    fn test_directional_rules_combine() {
        let rules = vec![
            rule("up", RuleScope::Any, MetricKind::PriceChangePct, 10.0, Direction::Above),
            rule("down", RuleScope::Any, MetricKind::PriceChangePct, 3.0, Direction::Below),
        ];
        let t = SpikeThresholds::from_rules(&rules, &Symbol::new("XYZ"));
        assert!(!t.price_spike(5.0));
        assert!(t.price_spike(-5.0));
        assert!(t.price_spike(10.0));
    }

    #[test]
    fn test_no_rules_never_flags() {
        let t = SpikeThresholds::from_rules(&[], &Symbol::new("XYZ"));
        assert!(!t.price_spike(1_000.0));
        assert!(!t.price_spike(-1_000.0));
        assert!(!t.volume_spike(1_000.0));
    }
}

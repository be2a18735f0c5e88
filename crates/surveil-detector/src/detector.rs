//! Anomaly detector implementation.
//!
//! For the newest point of a symbol's history:
//! - price return and volume are standardized against the `window` points
//!   that precede it (the current point is never part of its own baseline)
//! - volume ratio is current volume over the trailing mean volume
//! - the feature row is scored against the symbol's current outlier model
//!
//! Refits are requested, not performed: `detect` hands back a [`RefitJob`]
//! that the caller runs off the hot path.

use crate::config::DetectorConfig;
use crate::error::{DetectorError, DetectorResult};
use crate::features::{feature_rows, imbalance_fraction, simple_return, to_f64, volume_ratio};
use crate::model_registry::{ModelRegistry, RefitJob};
use crate::stats::RollingStats;
use crate::thresholds::SpikeThresholds;
use std::collections::HashMap;
use std::sync::Arc;
use surveil_core::{DetectionFlags, DetectionResult, DetectionStatus, Snapshot, Symbol};
use surveil_telemetry::Metrics;
use tracing::debug;

/// Detector output for one evaluation.
#[derive(Debug, Clone)]
pub struct DetectionOutput {
    pub result: DetectionResult,
    /// Model refit to schedule, if one is due.
    pub refit: Option<RefitJob>,
}

#[derive(Debug, Default)]
struct RefitState {
    /// Ready evaluations since the last refit request.
    since_last: usize,
    /// Refits requested so far.
    generation: u64,
}

/// Rolling-statistics and isolation-forest detector.
pub struct AnomalyDetector {
    config: DetectorConfig,
    registry: Arc<ModelRegistry>,
    refit_state: HashMap<Symbol, RefitState>,
}

impl AnomalyDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self::with_registry(config, Arc::new(ModelRegistry::new()))
    }

    /// Create a detector scoring against a shared model registry.
    pub fn with_registry(config: DetectorConfig, registry: Arc<ModelRegistry>) -> Self {
        Self {
            config,
            registry,
            refit_state: HashMap::new(),
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Evaluate the newest snapshot of `history` (oldest first).
    ///
    /// Histories shorter than `window + 2` yield a neutral result with
    /// `InsufficientHistory` status. Only an empty history is an error.
    pub fn detect(
        &mut self,
        history: &[Snapshot],
        thresholds: &SpikeThresholds,
    ) -> DetectorResult<DetectionOutput> {
        let current = history.last().ok_or(DetectorError::EmptyHistory)?;
        let symbol = &current.symbol;
        let n = history.len();
        let need = self.config.min_history();

        if n < need {
            Metrics::detection(symbol.as_str(), "insufficient_history");
            return Ok(DetectionOutput {
                result: DetectionResult::insufficient(
                    symbol.clone(),
                    current.timestamp,
                    current.price,
                    current.volume,
                    n,
                    need,
                ),
                refit: None,
            });
        }

        let w = self.config.window;
        let eps = self.config.epsilon;
        let baseline = &history[n - 1 - w..n - 1];

        // Returns ending at each baseline point; index n-1-w >= 1 since n >= w+2.
        let return_stats = RollingStats::from_values(
            (n - 1 - w..n - 1).map(|j| simple_return(&history[j - 1], &history[j])),
        );
        let ret = simple_return(&history[n - 2], current);
        let price_zscore = return_stats.zscore(ret, eps);

        let cur_volume = to_f64(current.volume);
        let volume_stats = RollingStats::from_values(baseline.iter().map(|s| to_f64(s.volume)));
        let volume_zscore = volume_stats.zscore(cur_volume, eps);
        let ratio = volume_ratio(cur_volume, baseline, eps);

        let spread_pct = current.spread_pct().map(to_f64);
        let imbalance_pct = current.imbalance_pct().map(to_f64);
        let row = [ret, ratio, spread_pct.unwrap_or(0.0), imbalance_fraction(current)];

        let (outlier_score, model_outlier) = match self.registry.get(symbol) {
            Some(model) => {
                let score = model.forest.score(&row);
                (Some(score), model.forest.is_outlier(score))
            }
            None => (None, false),
        };

        let price_change_pct = ret * 100.0;
        let cutoff = self.config.zscore_cutoff;
        let flags = DetectionFlags {
            price_spike: thresholds.price_spike(price_change_pct),
            volume_spike: thresholds.volume_spike(ratio),
            statistical_outlier: price_zscore.abs() > cutoff
                || volume_zscore.abs() > cutoff
                || model_outlier,
        };

        Metrics::detection(symbol.as_str(), "ready");
        for (flag, raised) in [
            ("price_spike", flags.price_spike),
            ("volume_spike", flags.volume_spike),
            ("statistical_outlier", flags.statistical_outlier),
        ] {
            if raised {
                Metrics::detection_flag(symbol.as_str(), flag);
            }
        }
        if flags.any() {
            debug!(
                symbol = %symbol,
                price_change_pct,
                volume_ratio = ratio,
                price_zscore,
                volume_zscore,
                outlier_score = ?outlier_score,
                flags = ?flags,
                "Anomaly flags raised"
            );
        }

        let refit = self.maybe_refit(symbol, history);

        Ok(DetectionOutput {
            result: DetectionResult {
                symbol: symbol.clone(),
                timestamp: current.timestamp,
                price: current.price,
                volume: current.volume,
                price_change_pct,
                volume_ratio: ratio,
                spread_pct,
                imbalance_pct,
                price_zscore,
                volume_zscore,
                outlier_score,
                flags,
                status: DetectionStatus::Ready,
            },
            refit,
        })
    }

    /// Whether the next ready evaluation of `symbol` over a series of
    /// `history_len` points will request a refit.
    ///
    /// Scoring only needs the newest [`DetectorConfig::min_history`] points;
    /// callers pass the full series when this returns true, so the refit
    /// sees every row.
    pub fn refit_due(&self, symbol: &Symbol, history_len: usize) -> bool {
        let (since_last, generation) = self
            .refit_state
            .get(symbol)
            .map_or((0, 0), |s| (s.since_last, s.generation));
        let due = generation == 0 || since_last + 1 >= self.config.refit_every;
        due && history_len.saturating_sub(1) >= self.config.min_fit_points
    }

    /// Request a refit once enough rows exist, then every `refit_every` points.
    fn maybe_refit(&mut self, symbol: &Symbol, history: &[Snapshot]) -> Option<RefitJob> {
        let due = self.refit_due(symbol, history.len());
        let state = self.refit_state.entry(symbol.clone()).or_default();
        state.since_last += 1;
        if !due {
            return None;
        }

        state.since_last = 0;
        state.generation += 1;
        Some(RefitJob {
            symbol: symbol.clone(),
            rows: feature_rows(history, self.config.window, self.config.epsilon),
            params: self.config.forest_params(),
            seed: self.config.seed.wrapping_add(state.generation),
            generation: state.generation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn snap(i: i64, price: Decimal, volume: Decimal) -> Snapshot {
        Snapshot::new(
            Symbol::new("XYZ"),
            Utc.timestamp_opt(1_700_000_000 + i, 0).unwrap(),
            price,
            volume,
            "test",
        )
    }

    fn flat(n: i64) -> Vec<Snapshot> {
        (0..n).map(|i| snap(i, dec!(100), dec!(1000))).collect()
    }

    fn thresholds() -> SpikeThresholds {
        SpikeThresholds::symmetric(5.0, 3.0)
    }

    fn small_config() -> DetectorConfig {
        DetectorConfig {
            min_fit_points: 30,
            refit_every: 10,
            n_trees: 20,
            sample_size: 32,
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_history_is_error() {
        let mut detector = AnomalyDetector::new(DetectorConfig::default());
        assert!(matches!(
            detector.detect(&[], &thresholds()),
            Err(DetectorError::EmptyHistory)
        ));
    }

    #[test]
    fn test_insufficient_history_is_neutral() {
        let mut detector = AnomalyDetector::new(DetectorConfig::default());
        let out = detector.detect(&flat(21), &thresholds()).unwrap();
        assert_eq!(
            out.result.status,
            DetectionStatus::InsufficientHistory { have: 21, need: 22 }
        );
        assert!(!out.result.flags.any());
        assert!(out.refit.is_none());
    }

    #[test]
    fn test_constant_window_gives_zero_zscores() {
        let mut detector = AnomalyDetector::new(DetectorConfig::default());
        let out = detector.detect(&flat(30), &thresholds()).unwrap();
        let r = out.result;
        assert!(r.is_ready());
        assert_eq!(r.price_zscore, 0.0);
        assert_eq!(r.volume_zscore, 0.0);
        assert_eq!(r.volume_ratio, 1.0);
        assert_eq!(r.price_change_pct, 0.0);
        assert!(!r.flags.any());
    }

    #[test]
    fn test_price_and_volume_spike() {
        let mut detector = AnomalyDetector::new(DetectorConfig::default());
        let mut history = flat(30);
        history.push(snap(30, dec!(108), dec!(10000)));

        let r = detector.detect(&history, &thresholds()).unwrap().result;
        assert!((r.price_change_pct - 8.0).abs() < 1e-9);
        assert!((r.volume_ratio - 10.0).abs() < 1e-9);
        assert!(r.flags.price_spike);
        assert!(r.flags.volume_spike);
        // Flat baseline has no spread, so z-scores stay neutral.
        assert_eq!(r.price_zscore, 0.0);
    }

    #[test]
    fn test_zscore_against_noisy_baseline() {
        let mut detector = AnomalyDetector::new(DetectorConfig::default());
        let mut history: Vec<Snapshot> = (0..30)
            .map(|i| {
                let vol = if i % 2 == 0 { dec!(900) } else { dec!(1100) };
                snap(i, dec!(100), vol)
            })
            .collect();
        history.push(snap(30, dec!(100), dec!(5000)));

        let r = detector.detect(&history, &thresholds()).unwrap().result;
        assert!(r.volume_zscore > 3.0);
        assert!(r.flags.statistical_outlier);
    }

    #[test]
    fn test_refit_cadence() {
        let mut detector = AnomalyDetector::new(small_config());
        let mut history = flat(25);

        // Not enough rows yet.
        assert!(detector.detect(&history, &thresholds()).unwrap().refit.is_none());

        let mut jobs = Vec::new();
        for i in 25..60 {
            history.push(snap(i, dec!(100), dec!(1000)));
            if let Some(job) = detector.detect(&history, &thresholds()).unwrap().refit {
                jobs.push((history.len(), job.generation));
            }
        }
        // First at 31 points (30 rows), then every 10 evaluations.
        assert_eq!(jobs, vec![(31, 1), (41, 2), (51, 3)]);
    }

    #[test]
    fn test_outlier_score_after_model_install() {
        let mut detector = AnomalyDetector::new(small_config());
        let history: Vec<Snapshot> = (0..40)
            .map(|i| {
                let px = if i % 2 == 0 { dec!(100) } else { dec!(100.1) };
                snap(i, px, dec!(1000))
            })
            .collect();

        let out = detector.detect(&history, &thresholds()).unwrap();
        assert!(out.result.outlier_score.is_none());
        let (symbol, model) = out.refit.unwrap().run().unwrap();
        detector.registry().install(symbol, model);

        let mut next = history.clone();
        next.push(snap(40, dec!(130), dec!(50000)));
        let r = detector.detect(&next, &thresholds()).unwrap().result;
        let score = r.outlier_score.unwrap();
        assert!(score > 0.0 && score <= 1.0);
        assert!(r.flags.statistical_outlier);
    }

    #[test]
    fn test_tail_scores_like_full_history() {
        let config = small_config();
        let need = config.min_history();
        let mut full = AnomalyDetector::new(config.clone());
        let mut tailed = AnomalyDetector::new(config);
        let mut history: Vec<Snapshot> = (0..25)
            .map(|i| snap(i, dec!(100) + Decimal::from(i % 3), dec!(1000) + Decimal::from(i)))
            .collect();

        let mut jobs = Vec::new();
        for i in 25..60 {
            history.push(snap(i, dec!(100) + Decimal::from(i % 4), dec!(1000)));
            let expected = full.detect(&history, &thresholds()).unwrap();

            let input = if tailed.refit_due(&Symbol::new("XYZ"), history.len()) {
                &history[..]
            } else {
                &history[history.len() - need..]
            };
            let out = tailed.detect(input, &thresholds()).unwrap();
            assert_eq!(out.result.price_zscore, expected.result.price_zscore);
            assert_eq!(out.result.volume_ratio, expected.result.volume_ratio);
            assert_eq!(out.refit.is_some(), expected.refit.is_some());
            if let Some(job) = out.refit {
                assert_eq!(job.rows.len(), expected.refit.unwrap().rows.len());
                jobs.push(history.len());
            }
        }
        assert_eq!(jobs, vec![31, 41, 51]);
    }
}

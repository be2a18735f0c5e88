//! Isolation forest outlier model.
//!
//! Anomaly score `s(x) = 2^(-E[h(x)] / c(psi))` where `h` is the path length
//! to isolate `x` in one tree and `c(psi)` the average path length of an
//! unsuccessful BST search over `psi` subsampled rows. Scores lie in (0, 1];
//! values near 1 are easy to isolate (anomalous), values near or below 0.5
//! are ordinary.

use crate::error::{DetectorError, DetectorResult};
use crate::features::{FeatureRow, N_FEATURES};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Fitting parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    /// Rows subsampled per tree (capped at the training set size).
    pub sample_size: usize,
    /// Expected outlier fraction of the training set.
    pub contamination: f64,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        value: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// Average path length of an unsuccessful search in a BST of `n` nodes.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

fn build(rows: &mut [FeatureRow], depth: usize, limit: usize, rng: &mut StdRng) -> Node {
    if depth >= limit || rows.len() <= 1 {
        return Node::Leaf { size: rows.len() };
    }

    // Features with spread, in random order starting from a random offset.
    let start = rng.gen_range(0..N_FEATURES);
    let mut chosen = None;
    for k in 0..N_FEATURES {
        let feature = (start + k) % N_FEATURES;
        let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| {
            (lo.min(r[feature]), hi.max(r[feature]))
        });
        if hi > lo {
            chosen = Some((feature, lo, hi));
            break;
        }
    }
    let Some((feature, lo, hi)) = chosen else {
        return Node::Leaf { size: rows.len() };
    };

    let value = rng.gen_range(lo..hi);
    let mut split = 0;
    for i in 0..rows.len() {
        if rows[i][feature] < value {
            rows.swap(i, split);
            split += 1;
        }
    }
    let (left, right) = rows.split_at_mut(split);
    Node::Split {
        feature,
        value,
        left: Box::new(build(left, depth + 1, limit, rng)),
        right: Box::new(build(right, depth + 1, limit, rng)),
    }
}

fn path_length(node: &Node, row: &FeatureRow, depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + average_path_length(*size),
        Node::Split {
            feature,
            value,
            left,
            right,
        } => {
            if row[*feature] < *value {
                path_length(left, row, depth + 1)
            } else {
                path_length(right, row, depth + 1)
            }
        }
    }
}

/// Fitted isolation forest.
#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<Node>,
    /// c(psi) normalizer.
    normalizer: f64,
    /// `(1 - contamination)` quantile of training scores.
    cutoff: f64,
    trained_rows: usize,
}

impl IsolationForest {
    /// Fit a forest over `rows`.
    ///
    /// Deterministic for a given `seed` and input.
    pub fn fit(rows: &[FeatureRow], params: &ForestParams, seed: u64) -> DetectorResult<Self> {
        if params.n_trees == 0 || params.sample_size < 2 {
            return Err(DetectorError::ConfigError(format!(
                "invalid forest params {params:?}"
            )));
        }
        if rows.len() < 2 {
            return Err(DetectorError::InsufficientData {
                have: rows.len(),
                need: 2,
            });
        }
        if rows.iter().flatten().any(|v| !v.is_finite()) {
            return Err(DetectorError::Refit("non-finite feature value".to_string()));
        }

        let psi = params.sample_size.min(rows.len());
        let limit = (psi as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(seed);

        let trees = (0..params.n_trees)
            .map(|_| {
                let mut sample: Vec<FeatureRow> = rand::seq::index::sample(&mut rng, rows.len(), psi)
                    .into_iter()
                    .map(|i| rows[i])
                    .collect();
                build(&mut sample, 0, limit, &mut rng)
            })
            .collect();

        let mut forest = Self {
            trees,
            normalizer: average_path_length(psi),
            cutoff: 1.0,
            trained_rows: rows.len(),
        };

        let mut scores: Vec<f64> = rows.iter().map(|r| forest.score(r)).collect();
        scores.sort_by(|a, b| a.total_cmp(b));
        let rank = ((1.0 - params.contamination) * scores.len() as f64).ceil() as usize;
        forest.cutoff = scores[rank.clamp(1, scores.len()) - 1];
        Ok(forest)
    }

    /// Anomaly score in (0, 1]; higher is more anomalous.
    pub fn score(&self, row: &FeatureRow) -> f64 {
        if self.normalizer <= 0.0 {
            return 0.5;
        }
        let mean_path = self
            .trees
            .iter()
            .map(|t| path_length(t, row, 0))
            .sum::<f64>()
            / self.trees.len() as f64;
        2f64.powf(-mean_path / self.normalizer)
    }

    /// Whether `score` exceeds the training cutoff.
    pub fn is_outlier(&self, score: f64) -> bool {
        score > self.cutoff
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    pub fn trained_rows(&self) -> usize {
        self.trained_rows
    }
}

//! Per-symbol outlier models and off-path refits.
//!
//! Scoring reads the current `Arc<FittedModel>`; a refit builds a new model
//! on the blocking pool and swaps the `Arc` in one write. A score never sees
//! a half-built model.

use crate::error::{DetectorError, DetectorResult};
use crate::features::FeatureRow;
use crate::isolation_forest::{ForestParams, IsolationForest};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use surveil_core::Symbol;
use surveil_telemetry::Metrics;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// A fitted model and its provenance.
#[derive(Debug)]
pub struct FittedModel {
    pub forest: IsolationForest,
    pub fitted_at: DateTime<Utc>,
    /// Refit sequence number for the symbol, starting at 1.
    pub generation: u64,
}

/// Work item for building a new model.
#[derive(Debug, Clone)]
pub struct RefitJob {
    pub symbol: Symbol,
    pub rows: Vec<FeatureRow>,
    pub params: ForestParams,
    pub seed: u64,
    pub generation: u64,
}

impl RefitJob {
    /// Fit the model. CPU-bound; run on a blocking thread.
    pub fn run(self) -> DetectorResult<(Symbol, FittedModel)> {
        let forest = IsolationForest::fit(&self.rows, &self.params, self.seed)?;
        Ok((
            self.symbol,
            FittedModel {
                forest,
                fitted_at: Utc::now(),
                generation: self.generation,
            },
        ))
    }
}

/// Current model per symbol.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: RwLock<HashMap<Symbol, Arc<FittedModel>>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, symbol: &Symbol) -> Option<Arc<FittedModel>> {
        self.models.read().get(symbol).cloned()
    }

    /// Install a model unless a newer generation is already present.
    ///
    /// Returns true if the model was installed.
    pub fn install(&self, symbol: Symbol, model: FittedModel) -> bool {
        let mut models = self.models.write();
        if let Some(current) = models.get(&symbol) {
            if current.generation >= model.generation {
                return false;
            }
        }
        models.insert(symbol, Arc::new(model));
        true
    }

    pub fn len(&self) -> usize {
        self.models.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.read().is_empty()
    }
}

/// Run a refit job on the blocking pool and install the result.
pub fn spawn_refit(registry: Arc<ModelRegistry>, job: RefitJob) -> JoinHandle<DetectorResult<()>> {
    tokio::spawn(async move {
        let symbol = job.symbol.clone();
        let rows = job.rows.len();
        let fitted = tokio::task::spawn_blocking(move || job.run())
            .await
            .map_err(|e| DetectorError::Refit(e.to_string()))
            .and_then(|r| r);

        match fitted {
            Ok((symbol, model)) => {
                let generation = model.generation;
                let cutoff = model.forest.cutoff();
                if registry.install(symbol.clone(), model) {
                    debug!(symbol = %symbol, rows, generation, cutoff, "Outlier model refit installed");
                }
                Metrics::model_refit(symbol.as_str(), "ok");
                Ok(())
            }
            Err(e) => {
                warn!(symbol = %symbol, rows, error = %e, "Outlier model refit failed");
                Metrics::model_refit(symbol.as_str(), "failed");
                Err(e)
            }
        }
    })
}

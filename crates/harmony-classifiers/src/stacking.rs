use std::path::Path;

use rayon::prelude::*;

use crate::config::StackingConfig;
use crate::error::StackingError;
use crate::folds::FoldAssignment;
use crate::math::Array2;
use crate::models::Estimator;
use crate::oof::{base_label, collect_base_predictions, collect_oof_predictions};
use crate::persistence::{base_model_path, meta_model_path, EnsembleManifest};

/// Two-layer stacked ensemble.
///
/// Base estimators are trained fold by fold to produce out-of-fold label
/// predictions; the meta estimator learns to map those predictions to the
/// true label. The bases are then refit on the full training set and used,
/// together with the meta estimator, at inference time.
pub struct StackingClassifier {
    bases: Vec<Box<dyn Estimator>>,
    meta: Box<dyn Estimator>,
    config: StackingConfig,
    fitted: bool,
}

impl StackingClassifier {
    /// Create a new StackingClassifier
    ///
    /// # Arguments
    ///
    /// * `bases` - Base estimators. Their order fixes the meta-feature column order
    /// * `meta` - Estimator trained on the base models' predictions
    /// * `config` - Fold count, seed and parallelism
    ///
    /// # Returns
    ///
    /// An unfitted StackingClassifier. The fold count is validated by `fit`.
    pub fn new(
        bases: Vec<Box<dyn Estimator>>,
        meta: Box<dyn Estimator>,
        config: StackingConfig,
    ) -> Self {
        StackingClassifier {
            bases,
            meta,
            config,
            fitted: false,
        }
    }

    /// Five folds, seed 1234, parallel base training.
    pub fn with_defaults(bases: Vec<Box<dyn Estimator>>, meta: Box<dyn Estimator>) -> Self {
        Self::new(bases, meta, StackingConfig::default())
    }

    pub fn config(&self) -> &StackingConfig {
        &self.config
    }

    pub fn n_base_models(&self) -> usize {
        self.bases.len()
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    fn meta_label(&self) -> String {
        format!("meta {}", self.meta.name())
    }

    fn validate(&self, x: &Array2<f64>, y: &[i32]) -> Result<FoldAssignment, StackingError> {
        if self.bases.is_empty() {
            return Err(StackingError::InvalidConfiguration(
                "no base models to stack".to_string(),
            ));
        }
        if x.nrows() != y.len() {
            return Err(StackingError::InvalidConfiguration(format!(
                "feature matrix has {} rows but {} labels were given",
                x.nrows(),
                y.len()
            )));
        }
        FoldAssignment::new(x.nrows(), self.config.n_folds, self.config.seed)
    }

    /// Fit the ensemble
    ///
    /// # Arguments
    ///
    /// * `x` - The features to use, shape (n_samples, n_features)
    /// * `y` - The class labels to use, shape (n_samples,)
    ///
    /// On any error the classifier is left unfitted.
    pub fn fit(&mut self, x: &Array2<f64>, y: &[i32]) -> Result<(), StackingError> {
        self.fitted = false;

        let folds = self.validate(x, y)?;
        log::info!(
            "Fitting stacking ensemble: {} samples, {} features, {} base models, {} folds",
            x.nrows(),
            x.ncols(),
            self.bases.len(),
            folds.n_folds()
        );

        let z = collect_oof_predictions(&mut self.bases, x, y, &folds, self.config.parallel)?;
        let z = z.to_array();
        log::debug!("Out-of-fold meta-features ready: shape {:?}", z.shape());

        log::info!("Training meta model ({})", self.meta.name());
        self.meta
            .train(&z, y)
            .map_err(|source| StackingError::EstimatorTraining {
                model: self.meta_label(),
                fold: None,
                source,
            })?;

        log::info!("Refitting base models on the full training set");
        let refit = |(l, base): (usize, &mut Box<dyn Estimator>)| {
            base.train(x, y)
                .map_err(|source| StackingError::EstimatorTraining {
                    model: base_label(l, &**base),
                    fold: None,
                    source,
                })
        };
        if self.config.parallel {
            self.bases
                .par_iter_mut()
                .enumerate()
                .try_for_each(refit)?;
        } else {
            self.bases.iter_mut().enumerate().try_for_each(refit)?;
        }

        self.fitted = true;
        Ok(())
    }

    /// Meta-features (M x L) of `x` as produced by the refit base models.
    pub fn meta_features(&self, x: &Array2<f64>) -> Result<Array2<f64>, StackingError> {
        if !self.fitted {
            return Err(StackingError::NotFitted);
        }
        let z = collect_base_predictions(&self.bases, x, self.config.parallel)?;
        Ok(z.to_array())
    }

    /// Predict class labels, one per row of `x`.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<i32>, StackingError> {
        let z_test = self.meta_features(x)?;
        self.meta
            .predict(&z_test)
            .map_err(|source| StackingError::EstimatorPrediction {
                model: self.meta_label(),
                fold: None,
                source,
            })
    }

    /// Save every estimator plus `config.txt` into `dir`, creating it if needed.
    ///
    /// Stops at the first failure; files written before it are left in place.
    pub fn save_models<P: AsRef<Path>>(&self, dir: P) -> Result<(), StackingError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| StackingError::Persistence {
            model: "ensemble directory".to_string(),
            source: anyhow::Error::new(e).context(format!("creating {}", dir.display())),
        })?;

        for (l, base) in self.bases.iter().enumerate() {
            let path = base_model_path(dir, l, base.name());
            log::debug!("Saving {} to {}", base_label(l, &**base), path.display());
            base.save(&path).map_err(|source| StackingError::Persistence {
                model: base_label(l, &**base),
                source,
            })?;
        }

        let path = meta_model_path(dir, self.meta.name());
        self.meta
            .save(&path)
            .map_err(|source| StackingError::Persistence {
                model: self.meta_label(),
                source,
            })?;

        let manifest = EnsembleManifest {
            num_base_models: self.bases.len(),
            num_folds: self.config.n_folds,
            fitted: self.fitted,
        };
        manifest
            .write_to_dir(dir)
            .map_err(|source| StackingError::Persistence {
                model: "ensemble config".to_string(),
                source,
            })?;

        log::info!("Saved stacking ensemble to {}", dir.display());
        Ok(())
    }

    /// Restore a saved ensemble into the estimators this classifier was built with.
    ///
    /// The estimators must match the saved ones in count, order and type.
    pub fn load_models<P: AsRef<Path>>(&mut self, dir: P) -> Result<(), StackingError> {
        let dir = dir.as_ref();
        self.fitted = false;

        let manifest =
            EnsembleManifest::read_from_dir(dir).map_err(|source| StackingError::Persistence {
                model: "ensemble config".to_string(),
                source,
            })?;
        if manifest.num_base_models != self.bases.len() {
            return Err(StackingError::Persistence {
                model: "ensemble config".to_string(),
                source: anyhow::anyhow!(
                    "saved ensemble has {} base models but {} were constructed",
                    manifest.num_base_models,
                    self.bases.len()
                ),
            });
        }
        if manifest.num_folds < 2 {
            return Err(StackingError::Persistence {
                model: "ensemble config".to_string(),
                source: anyhow::anyhow!(
                    "saved ensemble has num_folds={}, at least 2 are required",
                    manifest.num_folds
                ),
            });
        }

        for (l, base) in self.bases.iter_mut().enumerate() {
            let path = base_model_path(dir, l, base.name());
            base.load(&path).map_err(|source| StackingError::Persistence {
                model: base_label(l, &**base),
                source,
            })?;
        }

        let path = meta_model_path(dir, self.meta.name());
        let meta_label = self.meta_label();
        self.meta
            .load(&path)
            .map_err(|source| StackingError::Persistence {
                model: meta_label,
                source,
            })?;

        self.config.n_folds = manifest.num_folds;
        self.fitted = manifest.fitted;
        log::info!(
            "Loaded stacking ensemble with {} base models from {}",
            self.bases.len(),
            dir.display()
        );
        Ok(())
    }
}

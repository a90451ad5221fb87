use std::path::Path;

use anyhow::Result;

use crate::math::Array2;

/// Contract shared by every classifier that can sit in a stacking ensemble,
/// either as a base model or as the meta model.
///
/// Training is not incremental: each call to `train` discards previously
/// learned state. `predict` takes `&self` so a fitted estimator can be
/// queried from several threads at once.
pub trait Estimator: Send + Sync {
    /// Fit the model on `x` (n_samples x n_features) and 0-indexed class labels `y`.
    fn train(&mut self, x: &Array2<f64>, y: &[i32]) -> Result<()>;

    /// Predict one class label per row of `x`.
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<i32>>;

    /// Write the learned state to `path`. The file format belongs to the estimator.
    fn save(&self, path: &Path) -> Result<()>;

    /// Restore state previously written by `save`.
    fn load(&mut self, path: &Path) -> Result<()>;

    /// Short type name, also used to name the model artifact on disk.
    fn name(&self) -> &str {
        "estimator"
    }
}

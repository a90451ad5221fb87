//! Meta-feature assembly for the stacking ensemble.
//!
//! Every base model owns exactly one column of the meta-feature matrix. The
//! matrix is allocated up front as a single column-major buffer and split
//! with `chunks_mut`, so each (possibly parallel) task holds an exclusive
//! `&mut [f64]` for its column and nothing is resized while tasks run.
use rayon::prelude::*;

use crate::error::StackingError;
use crate::folds::FoldAssignment;
use crate::math::Array2;
use crate::models::Estimator;

/// Column-major N x L buffer of predicted labels, one column per base model.
#[derive(Debug, Clone, PartialEq)]
pub struct MetaFeatures {
    data: Vec<f64>,
    n_rows: usize,
    n_models: usize,
}

impl MetaFeatures {
    pub fn zeros(n_rows: usize, n_models: usize) -> Self {
        Self {
            data: vec![0.0; n_rows * n_models],
            n_rows,
            n_models,
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows, self.n_models)
    }

    pub fn column(&self, model: usize) -> &[f64] {
        let start = model * self.n_rows;
        &self.data[start..start + self.n_rows]
    }

    /// Disjoint mutable column slices, in base-model order.
    fn columns_mut(&mut self) -> std::slice::ChunksMut<'_, f64> {
        self.data.chunks_mut(self.n_rows.max(1))
    }

    fn par_columns_mut(&mut self) -> rayon::slice::ChunksMut<'_, f64> {
        self.data.par_chunks_mut(self.n_rows.max(1))
    }

    /// Row-major copy handed to the meta estimator.
    pub fn to_array(&self) -> Array2<f64> {
        let mut out = Array2::zeros(self.n_rows, self.n_models);
        for model in 0..self.n_models {
            for (row, &value) in self.column(model).iter().enumerate() {
                out[(row, model)] = value;
            }
        }
        out
    }
}

pub(crate) fn base_label(index: usize, estimator: &dyn Estimator) -> String {
    format!("base[{}] {}", index, estimator.name())
}

/// Fill `column` with out-of-fold predictions of one base model.
///
/// For each fold the estimator is retrained on the complement folds and
/// asked to label the held-out rows, so no row is ever predicted by a model
/// that saw it during training.
fn fill_oof_column(
    index: usize,
    base: &mut dyn Estimator,
    column: &mut [f64],
    x: &Array2<f64>,
    y: &[i32],
    folds: &FoldAssignment,
) -> Result<(), StackingError> {
    let n_folds = folds.n_folds();
    for (k, (train_idx, test_idx)) in folds.iter().enumerate() {
        log::debug!(
            "Training base model {} ({}) on fold {}/{} with {} rows",
            index + 1,
            base.name(),
            k + 1,
            n_folds,
            train_idx.len()
        );

        let x_tr = x.select_rows(&train_idx);
        let y_tr: Vec<i32> = train_idx.iter().map(|&i| y[i]).collect();
        base.train(&x_tr, &y_tr)
            .map_err(|source| StackingError::EstimatorTraining {
                model: base_label(index, &*base),
                fold: Some(k),
                source,
            })?;

        let x_te = x.select_rows(test_idx);
        let y_pred = base
            .predict(&x_te)
            .map_err(|source| StackingError::EstimatorPrediction {
                model: base_label(index, &*base),
                fold: Some(k),
                source,
            })?;
        if y_pred.len() != test_idx.len() {
            return Err(StackingError::EstimatorPrediction {
                model: base_label(index, &*base),
                fold: Some(k),
                source: anyhow::anyhow!(
                    "expected {} predictions, got {}",
                    test_idx.len(),
                    y_pred.len()
                ),
            });
        }

        for (&row, &label) in test_idx.iter().zip(y_pred.iter()) {
            column[row] = label as f64;
        }
    }
    Ok(())
}

/// Build the leakage-free meta-feature matrix Z (N x L) used to train the meta model.
///
/// # Arguments
///
/// * `bases` - Base estimators; column `l` of the result comes from `bases[l]`
/// * `x` - Training features, shape (n_samples, n_features)
/// * `y` - Training labels, shape (n_samples,)
/// * `folds` - Fold assignment over `0..n_samples`
/// * `parallel` - Process base models concurrently on the rayon pool
///
/// # Returns
///
/// The filled meta-feature buffer. After this call each base estimator holds
/// the model trained for the last fold.
pub fn collect_oof_predictions(
    bases: &mut [Box<dyn Estimator>],
    x: &Array2<f64>,
    y: &[i32],
    folds: &FoldAssignment,
    parallel: bool,
) -> Result<MetaFeatures, StackingError> {
    let mut z = MetaFeatures::zeros(x.nrows(), bases.len());

    if parallel {
        bases
            .par_iter_mut()
            .zip(z.par_columns_mut())
            .enumerate()
            .try_for_each(|(l, (base, column))| {
                fill_oof_column(l, base.as_mut(), column, x, y, folds)
            })?;
    } else {
        bases
            .iter_mut()
            .zip(z.columns_mut())
            .enumerate()
            .try_for_each(|(l, (base, column))| {
                fill_oof_column(l, base.as_mut(), column, x, y, folds)
            })?;
    }

    Ok(z)
}

fn fill_prediction_column(
    index: usize,
    base: &dyn Estimator,
    column: &mut [f64],
    x: &Array2<f64>,
) -> Result<(), StackingError> {
    let y_pred = base
        .predict(x)
        .map_err(|source| StackingError::EstimatorPrediction {
            model: base_label(index, &*base),
            fold: None,
            source,
        })?;
    if y_pred.len() != column.len() {
        return Err(StackingError::EstimatorPrediction {
            model: base_label(index, &*base),
            fold: None,
            source: anyhow::anyhow!(
                "expected {} predictions, got {}",
                column.len(),
                y_pred.len()
            ),
        });
    }
    for (slot, label) in column.iter_mut().zip(y_pred) {
        *slot = label as f64;
    }
    Ok(())
}

/// Build Z_test (M x L) from already fitted base estimators.
pub fn collect_base_predictions(
    bases: &[Box<dyn Estimator>],
    x: &Array2<f64>,
    parallel: bool,
) -> Result<MetaFeatures, StackingError> {
    let mut z = MetaFeatures::zeros(x.nrows(), bases.len());
    if x.nrows() == 0 {
        return Ok(z);
    }

    if parallel {
        bases
            .par_iter()
            .zip(z.par_columns_mut())
            .enumerate()
            .try_for_each(|(l, (base, column))| {
                fill_prediction_column(l, base.as_ref(), column, x)
            })?;
    } else {
        bases
            .iter()
            .zip(z.columns_mut())
            .enumerate()
            .try_for_each(|(l, (base, column))| {
                fill_prediction_column(l, base.as_ref(), column, x)
            })?;
    }

    Ok(z)
}

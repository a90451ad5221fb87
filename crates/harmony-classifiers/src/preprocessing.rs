//! Feature standardisation.
//!
//! Acoustic features live on very different scales (energies, pitch in Hz,
//! MFCCs), which hurts both the distance-based and the gradient-based
//! estimators. `Scaler` stores per-column mean/std so the statistics learned
//! at training time can be saved next to the models and reapplied at
//! inference.
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::math::Array2;

/// Simple standard scaler (per-column mean/std).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Scaler {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl Scaler {
    /// Minimum stddev to avoid division by zero when transforming.
    const MIN_STD: f64 = 1e-6;

    /// Fit a `Scaler` from a matrix where rows are samples and columns are features.
    pub fn fit(x: &Array2<f64>) -> Result<Self> {
        let (nrows, ncols) = x.shape();
        if nrows == 0 || ncols == 0 {
            bail!("Cannot fit a scaler on an empty {}x{} matrix", nrows, ncols);
        }

        let mut mean = vec![0.0f64; ncols];
        for row in x.rows() {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        let nrows_f = nrows as f64;
        for v in mean.iter_mut() {
            *v /= nrows_f;
        }

        let mut var = vec![0.0f64; ncols];
        for row in x.rows() {
            for ((s, v), m) in var.iter_mut().zip(row).zip(&mean) {
                let d = v - m;
                *s += d * d;
            }
        }
        for v in var.iter_mut() {
            *v = (*v / nrows_f).sqrt().max(Self::MIN_STD);
        }

        Ok(Scaler { mean, std: var })
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    /// Standardise every row of `x` and return a new matrix.
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.n_features() {
            bail!(
                "Scaler was fitted on {} features but got {}",
                self.n_features(),
                x.ncols()
            );
        }
        let mut out = Vec::with_capacity(x.nrows() * x.ncols());
        for row in x.rows() {
            for ((v, m), s) in row.iter().zip(&self.mean).zip(&self.std) {
                out.push((v - m) / s);
            }
        }
        Array2::from_shape_vec(x.shape(), out).context("Failed to build scaled matrix")
    }

    pub fn fit_transform(x: &Array2<f64>) -> Result<(Self, Array2<f64>)> {
        let scaler = Self::fit(x)?;
        let scaled = scaler.transform(x)?;
        Ok((scaler, scaled))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write scaler: {}", path.as_ref().display()))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scaler: {}", path.as_ref().display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse scaler: {}", path.as_ref().display()))
    }
}

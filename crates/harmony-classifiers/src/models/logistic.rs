use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::math::Array2;
use crate::models::estimator::Estimator;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SoftmaxWeights {
    /// n_classes x n_features, row-major.
    weights: Vec<f64>,
    bias: Vec<f64>,
    n_features: usize,
}

/// Multinomial (softmax) logistic regression trained with full-batch
/// gradient descent and an L2 penalty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    lambda: f64,
    learning_rate: f64,
    max_iter: usize,
    n_classes: usize,
    model: Option<SoftmaxWeights>,
}

impl LogisticRegression {
    pub fn new(lambda: f64, learning_rate: f64, max_iter: usize, n_classes: usize) -> Self {
        LogisticRegression {
            lambda,
            learning_rate,
            max_iter,
            n_classes,
            model: None,
        }
    }

    fn logits(model: &SoftmaxWeights, n_classes: usize, row: &[f64], out: &mut [f64]) {
        for c in 0..n_classes {
            let w = &model.weights[c * model.n_features..(c + 1) * model.n_features];
            out[c] = model.bias[c] + w.iter().zip(row).map(|(a, b)| a * b).sum::<f64>();
        }
    }

    fn softmax_in_place(values: &mut [f64]) {
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mut sum = 0.0;
        for v in values.iter_mut() {
            *v = (*v - max).exp();
            sum += *v;
        }
        for v in values.iter_mut() {
            *v /= sum;
        }
    }

    /// Class probabilities, n_samples x n_classes.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let model = self.fitted_model(x)?;
        let mut out = Array2::zeros(x.nrows(), self.n_classes);
        let mut scores = vec![0.0; self.n_classes];
        for (r, row) in x.rows().enumerate() {
            Self::logits(model, self.n_classes, row, &mut scores);
            Self::softmax_in_place(&mut scores);
            for (c, &p) in scores.iter().enumerate() {
                out[(r, c)] = p;
            }
        }
        Ok(out)
    }

    fn fitted_model(&self, x: &Array2<f64>) -> Result<&SoftmaxWeights> {
        let model = match &self.model {
            Some(model) => model,
            None => bail!("Logistic regression model has not been trained"),
        };
        if x.ncols() != model.n_features {
            bail!(
                "Logistic regression was trained on {} features but got {}",
                model.n_features,
                x.ncols()
            );
        }
        Ok(model)
    }
}

impl Estimator for LogisticRegression {
    fn train(&mut self, x: &Array2<f64>, y: &[i32]) -> Result<()> {
        let (n_samples, n_features) = x.shape();
        let n_classes = self.n_classes;
        if n_classes < 2 {
            bail!("Logistic regression needs at least 2 classes, got {}", n_classes);
        }
        if n_samples != y.len() {
            bail!("{} feature rows but {} labels", n_samples, y.len());
        }
        if n_samples == 0 {
            bail!("Cannot train logistic regression on an empty dataset");
        }
        if let Some(&bad) = y.iter().find(|&&l| l < 0 || l as usize >= n_classes) {
            bail!("Label {} outside of [0, {})", bad, n_classes);
        }

        let mut model = SoftmaxWeights {
            weights: vec![0.0; n_classes * n_features],
            bias: vec![0.0; n_classes],
            n_features,
        };
        let mut grad_w = vec![0.0; n_classes * n_features];
        let mut grad_b = vec![0.0; n_classes];
        let mut probs = vec![0.0; n_classes];
        let scale = 1.0 / n_samples as f64;

        for _ in 0..self.max_iter {
            grad_w.iter_mut().for_each(|g| *g = 0.0);
            grad_b.iter_mut().for_each(|g| *g = 0.0);

            for (row, &label) in x.rows().zip(y) {
                Self::logits(&model, n_classes, row, &mut probs);
                Self::softmax_in_place(&mut probs);
                for c in 0..n_classes {
                    let err = probs[c] - if c == label as usize { 1.0 } else { 0.0 };
                    grad_b[c] += err;
                    let g = &mut grad_w[c * n_features..(c + 1) * n_features];
                    for (gj, xj) in g.iter_mut().zip(row) {
                        *gj += err * xj;
                    }
                }
            }

            for (w, g) in model.weights.iter_mut().zip(&grad_w) {
                *w -= self.learning_rate * (g * scale + self.lambda * *w);
            }
            for (b, g) in model.bias.iter_mut().zip(&grad_b) {
                *b -= self.learning_rate * g * scale;
            }
        }

        if model.weights.iter().any(|w| !w.is_finite()) {
            bail!("Logistic regression diverged; try a smaller learning rate or scaled features");
        }

        self.model = Some(model);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<i32>> {
        let model = self.fitted_model(x)?;
        let mut scores = vec![0.0; self.n_classes];
        let mut labels = Vec::with_capacity(x.nrows());
        for row in x.rows() {
            Self::logits(model, self.n_classes, row, &mut scores);
            let mut best = 0;
            for c in 1..self.n_classes {
                if scores[c] > scores[best] {
                    best = c;
                }
            }
            labels.push(best as i32);
        }
        Ok(labels)
    }

    fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json).with_context(|| {
            format!("Failed to write logistic regression model: {}", path.display())
        })
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path).with_context(|| {
            format!("Failed to read logistic regression model: {}", path.display())
        })?;
        *self = serde_json::from_str(&content).with_context(|| {
            format!("Failed to parse logistic regression model: {}", path.display())
        })?;
        Ok(())
    }

    fn name(&self) -> &str {
        "LogisticRegression"
    }
}

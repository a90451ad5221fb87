use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use linfa::dataset::Pr;
use linfa::traits::{Fit, Predict};
use linfa::Dataset;
use linfa_svm::{Svm, SvmParams};
use ndarray::{Array1, Array2 as NdArray2};
use serde::{Deserialize, Serialize};

use crate::config::ModelType;
use crate::math::Array2;
use crate::models::estimator::Estimator;

#[derive(Serialize, Deserialize)]
struct SvmModels {
    n_features: usize,
    per_class: Vec<Svm<f64, Pr>>,
}

/// Support vector classifier (linfa-svm), one-vs-rest over the configured classes.
pub struct SVMClassifier {
    params: ModelType,
    models: Option<SvmModels>,
}

impl SVMClassifier {
    pub fn new(params: ModelType) -> Self {
        SVMClassifier {
            params,
            models: None,
        }
    }

    fn to_ndarray(x: &Array2<f64>) -> Result<NdArray2<f64>> {
        NdArray2::from_shape_vec(x.shape(), x.as_slice().to_vec())
            .map_err(|e| anyhow!("Failed to convert feature matrix: {}", e))
    }
}

impl Estimator for SVMClassifier {
    fn train(&mut self, x: &Array2<f64>, y: &[i32]) -> Result<()> {
        let (c, eps, kernel, gaussian_kernel_eps, n_classes) = match &self.params {
            ModelType::SVM {
                c,
                eps,
                kernel,
                gaussian_kernel_eps,
                n_classes,
            } => (*c, *eps, kernel.clone(), *gaussian_kernel_eps, *n_classes),
            other => bail!("Expected ModelType::SVM params, got {:?}", other),
        };
        if x.nrows() != y.len() {
            bail!("{} feature rows but {} labels", x.nrows(), y.len());
        }
        if let Some(&bad) = y.iter().find(|&&l| l < 0 || l as usize >= n_classes) {
            bail!("Label {} outside of [0, {})", bad, n_classes);
        }

        let records = Self::to_ndarray(x)?;
        let mut per_class = Vec::with_capacity(n_classes);
        for class in 0..n_classes {
            let targets: Array1<bool> = y.iter().map(|&l| l as usize == class).collect();
            let dataset = Dataset::new(records.clone(), targets);

            let params: SvmParams<f64, Pr> = Svm::<f64, Pr>::params().eps(eps).pos_neg_weights(c, c);
            let params = match kernel.as_str() {
                "linear" => params.linear_kernel(),
                "gauss" => params.gaussian_kernel(gaussian_kernel_eps),
                _ => bail!(
                    "Unsupported kernel type: {}. Valid options are: linear, gauss",
                    kernel
                ),
            };
            let model = params
                .fit(&dataset)
                .map_err(|e| anyhow!("SVM training for class {} failed: {}", class, e))?;
            per_class.push(model);
        }

        self.models = Some(SvmModels {
            n_features: x.ncols(),
            per_class,
        });
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<i32>> {
        let models = match &self.models {
            Some(models) => models,
            None => bail!("SVM model has not been trained"),
        };
        if x.ncols() != models.n_features {
            bail!(
                "SVM was trained on {} features but got {}",
                models.n_features,
                x.ncols()
            );
        }

        let records = Self::to_ndarray(x)?;
        let scores: Vec<Array1<Pr>> = models
            .per_class
            .iter()
            .map(|model| model.predict(&records))
            .collect();

        Ok((0..x.nrows())
            .map(|row| {
                let mut best = 0;
                for class in 1..scores.len() {
                    if *scores[class][row] > *scores[best][row] {
                        best = class;
                    }
                }
                best as i32
            })
            .collect())
    }

    fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string(&self.models)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write SVM model: {}", path.display()))
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read SVM model: {}", path.display()))?;
        self.models = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse SVM model: {}", path.display()))?;
        Ok(())
    }

    fn name(&self) -> &str {
        "SVM"
    }
}

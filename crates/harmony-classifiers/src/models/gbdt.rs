use std::path::Path;

use anyhow::{bail, Context, Result};
use gbdt::config::Config;
use gbdt::decision_tree::{Data, DataVec};
use gbdt::gradient_boost::GBDT;
use serde::{Deserialize, Serialize};

use crate::config::ModelType;
use crate::math::Array2;
use crate::models::estimator::Estimator;

/// Gradient Boosting Decision Tree (GBDT) classifier.
///
/// The gbdt backend is binary, so multi-class problems are handled
/// one-vs-rest: one `LogLikelyhood` booster per class, prediction is the
/// class whose booster scores highest.
pub struct GBDTClassifier {
    params: ModelType,
    boosters: Option<GBDTBoosters>,
}

#[derive(Serialize, Deserialize)]
struct GBDTBoosters {
    n_features: usize,
    per_class: Vec<GBDT>,
}

impl GBDTClassifier {
    pub fn new(params: ModelType) -> Self {
        GBDTClassifier {
            params,
            boosters: None,
        }
    }

    fn to_data(x: &Array2<f64>, labels: Option<&[f32]>) -> DataVec {
        let mut data = DataVec::with_capacity(x.nrows());
        for row in 0..x.nrows() {
            let features = x.row_slice(row).iter().map(|&v| v as f32).collect();
            let label = labels.map(|l| l[row]).unwrap_or(0.0);
            data.push(Data::new_training_data(features, 1.0, label, None));
        }
        data
    }
}

impl Estimator for GBDTClassifier {
    fn train(&mut self, x: &Array2<f64>, y: &[i32]) -> Result<()> {
        let (max_depth, num_boost_round, learning_rate, training_optimization_level, n_classes) =
            match &self.params {
                ModelType::GBDT {
                    max_depth,
                    num_boost_round,
                    learning_rate,
                    training_optimization_level,
                    n_classes,
                } => (
                    *max_depth,
                    *num_boost_round,
                    *learning_rate,
                    *training_optimization_level,
                    *n_classes,
                ),
                other => bail!("Expected ModelType::GBDT params, got {:?}", other),
            };
        if x.nrows() != y.len() {
            bail!("{} feature rows but {} labels", x.nrows(), y.len());
        }
        if x.nrows() == 0 {
            bail!("Cannot train GBDT on an empty dataset");
        }
        if let Some(&bad) = y.iter().find(|&&l| l < 0 || l as usize >= n_classes) {
            bail!("Label {} outside of [0, {})", bad, n_classes);
        }

        let mut config = Config::new();
        config.set_feature_size(x.ncols());
        config.set_shrinkage(learning_rate);
        config.set_max_depth(max_depth);
        config.set_iterations(num_boost_round as usize);
        config.set_debug(false);
        config.set_training_optimization_level(training_optimization_level);
        config.set_loss("LogLikelyhood");

        let mut per_class = Vec::with_capacity(n_classes);
        for class in 0..n_classes {
            // LogLikelyhood expects +1 / -1 targets.
            let labels: Vec<f32> = y
                .iter()
                .map(|&l| if l as usize == class { 1.0 } else { -1.0 })
                .collect();
            let mut train_x = Self::to_data(x, Some(&labels));
            let mut gbdt = GBDT::new(&config);
            gbdt.fit(&mut train_x);
            per_class.push(gbdt);
        }
        log::trace!("Trained {} one-vs-rest GBDT boosters", per_class.len());

        self.boosters = Some(GBDTBoosters {
            n_features: x.ncols(),
            per_class,
        });
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<i32>> {
        let boosters = match &self.boosters {
            Some(boosters) => boosters,
            None => bail!("GBDT model has not been trained"),
        };
        if x.ncols() != boosters.n_features {
            bail!(
                "GBDT was trained on {} features but got {}",
                boosters.n_features,
                x.ncols()
            );
        }

        let test_x = Self::to_data(x, None);
        let scores: Vec<Vec<f32>> = boosters
            .per_class
            .iter()
            .map(|gbdt| gbdt.predict(&test_x))
            .collect();

        Ok((0..x.nrows())
            .map(|row| {
                let mut best = 0;
                for class in 1..scores.len() {
                    if scores[class][row] > scores[best][row] {
                        best = class;
                    }
                }
                best as i32
            })
            .collect())
    }

    /// Writes `null` for an untrained model so an unfitted ensemble can
    /// still be saved and reloaded.
    fn save(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create GBDT model file: {}", path.display()))?;
        serde_json::to_writer(std::io::BufWriter::new(file), &self.boosters)
            .with_context(|| format!("Failed to write GBDT model: {}", path.display()))
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open GBDT model file: {}", path.display()))?;
        self.boosters = serde_json::from_reader(std::io::BufReader::new(file))
            .with_context(|| format!("Failed to parse GBDT model: {}", path.display()))?;
        Ok(())
    }

    fn name(&self) -> &str {
        "GBDT"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gbdt_classifier() {
        // Class is decided by the sign of the second feature.
        let x = Array2::from_shape_vec(
            (10, 3),
            vec![
                0.1, 1.0, 5.0, 0.4, -1.0, 5.0, 0.6, 1.0, 5.0, 0.9, -1.0, 5.0, 1.2, 1.0, 5.0, //
                1.5, -1.0, 5.0, 1.8, 1.0, 5.0, 2.1, -1.0, 5.0, 2.4, 1.0, 5.0, 2.7, -1.0, 5.0,
            ],
        )
        .unwrap();
        let y = vec![0, 1, 0, 1, 0, 1, 0, 1, 0, 1];

        let params = ModelType::GBDT {
            max_depth: 3,
            num_boost_round: 20,
            learning_rate: 0.3,
            training_optimization_level: 2,
            n_classes: 2,
        };
        let mut classifier = GBDTClassifier::new(params);
        classifier.train(&x, &y).unwrap();

        let predictions = classifier.predict(&x).unwrap();
        assert_eq!(predictions, y);
    }

    #[test]
    fn test_gbdt_rejects_wrong_params() {
        let x = Array2::from_shape_vec((2, 1), vec![0.0, 1.0]).unwrap();
        let mut classifier = GBDTClassifier::new(ModelType::KNN {
            k: 1,
            metric: Default::default(),
        });
        assert!(classifier.train(&x, &[0, 1]).is_err());
    }

    #[test]
    fn test_gbdt_untrained_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gbdt.json");

        let untrained = GBDTClassifier::new(ModelType::default());
        untrained.save(&path).unwrap();

        let mut reloaded = GBDTClassifier::new(ModelType::default());
        reloaded.load(&path).unwrap();
        let x = Array2::from_shape_vec((1, 2), vec![0.0, 1.0]).unwrap();
        assert!(reloaded.predict(&x).is_err());
    }

    #[test]
    fn test_gbdt_save_load_keeps_predictions() {
        let x = Array2::from_shape_vec(
            (6, 1),
            vec![-3.0, -2.0, -1.0, 1.0, 2.0, 3.0],
        )
        .unwrap();
        let y = vec![0, 0, 0, 1, 1, 1];
        let params = ModelType::GBDT {
            max_depth: 2,
            num_boost_round: 10,
            learning_rate: 0.3,
            training_optimization_level: 2,
            n_classes: 2,
        };
        let mut classifier = GBDTClassifier::new(params.clone());
        classifier.train(&x, &y).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gbdt.json");
        classifier.save(&path).unwrap();
        let mut reloaded = GBDTClassifier::new(params);
        reloaded.load(&path).unwrap();
        assert_eq!(reloaded.predict(&x).unwrap(), classifier.predict(&x).unwrap());
    }
}

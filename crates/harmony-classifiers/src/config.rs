use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Number of demographic classes (age bracket x gender).
pub const DEFAULT_N_CLASSES: usize = 4;

/// Distance used by the nearest-neighbour classifier.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    #[default]
    Euclidean,
    Manhattan,
}

impl FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "euclidean" => Ok(DistanceMetric::Euclidean),
            "manhattan" => Ok(DistanceMetric::Manhattan),
            _ => Err(format!(
                "Unknown distance metric: {}. Valid options are: euclidean, manhattan",
                s
            )),
        }
    }
}

/// Supported estimator types and their hyper-parameters.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub enum ModelType {
    KNN {
        k: usize,
        metric: DistanceMetric,
    },
    LogisticRegression {
        lambda: f64,
        learning_rate: f64,
        max_iter: usize,
        n_classes: usize,
    },
    GBDT {
        max_depth: u32,
        num_boost_round: u32,
        learning_rate: f32,
        training_optimization_level: u8,
        n_classes: usize,
    },
    RandomForest {
        n_trees: usize,
        max_depth: usize,
        min_leaf_size: usize,
        seed: u64,
        n_classes: usize,
    },
    #[cfg(feature = "svm")]
    SVM {
        c: f64,
        eps: f64,
        kernel: String,
        gaussian_kernel_eps: f64,
        n_classes: usize,
    },
}

impl Default for ModelType {
    fn default() -> Self {
        ModelType::GBDT {
            max_depth: 6,
            num_boost_round: 50,
            learning_rate: 0.1,
            training_optimization_level: 2,
            n_classes: DEFAULT_N_CLASSES,
        }
    }
}

impl ModelType {
    /// 100 trees of depth at most 12 with single-sample leaves.
    pub fn random_forest() -> Self {
        ModelType::RandomForest {
            n_trees: 100,
            max_depth: 12,
            min_leaf_size: 1,
            seed: 42,
            n_classes: DEFAULT_N_CLASSES,
        }
    }

    /// Number of classes the estimator is sized for; `None` for KNN, which
    /// predicts whatever labels it was trained on.
    pub fn n_classes(&self) -> Option<usize> {
        match self {
            ModelType::KNN { .. } => None,
            ModelType::LogisticRegression { n_classes, .. }
            | ModelType::GBDT { n_classes, .. }
            | ModelType::RandomForest { n_classes, .. } => Some(*n_classes),
            #[cfg(feature = "svm")]
            ModelType::SVM { n_classes, .. } => Some(*n_classes),
        }
    }

    pub fn set_n_classes(&mut self, classes: usize) {
        match self {
            ModelType::KNN { .. } => {}
            ModelType::LogisticRegression { n_classes, .. }
            | ModelType::GBDT { n_classes, .. }
            | ModelType::RandomForest { n_classes, .. } => *n_classes = classes,
            #[cfg(feature = "svm")]
            ModelType::SVM { n_classes, .. } => *n_classes = classes,
        }
    }

    /// Short name used in logs and artifact file names.
    pub fn name(&self) -> &'static str {
        match self {
            ModelType::KNN { .. } => "KNN",
            ModelType::LogisticRegression { .. } => "LogisticRegression",
            ModelType::GBDT { .. } => "GBDT",
            ModelType::RandomForest { .. } => "RandomForest",
            #[cfg(feature = "svm")]
            ModelType::SVM { .. } => "SVM",
        }
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gbdt" => Ok(ModelType::default()),
            "knn" => Ok(ModelType::KNN {
                k: 3,
                metric: DistanceMetric::Euclidean,
            }),
            "lr" | "logistic" | "logistic_regression" => Ok(ModelType::LogisticRegression {
                lambda: 0.01,
                learning_rate: 0.1,
                max_iter: 500,
                n_classes: DEFAULT_N_CLASSES,
            }),
            "rf" | "random_forest" | "randomforest" => Ok(ModelType::random_forest()),
            #[cfg(feature = "svm")]
            "svm" => Ok(default_margin_model()),
            _ => Err(format!(
                "Unknown model type: {}. Valid options are: gbdt, knn, lr, rf (svm requires `--features svm`)",
                s
            )),
        }
    }
}

/// Cross-validation settings of the stacking ensemble.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct StackingConfig {
    pub n_folds: usize,
    pub seed: u64,
    /// Train base models concurrently on the rayon pool.
    pub parallel: bool,
}

impl Default for StackingConfig {
    fn default() -> Self {
        Self {
            n_folds: 5,
            seed: 1234,
            parallel: true,
        }
    }
}

/// Full description of an ensemble: which estimators to build and how to stack them.
///
/// Saved next to the model artifacts so an ensemble can be rebuilt with
/// matching estimator types before its weights are loaded.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EnsembleConfig {
    pub bases: Vec<ModelType>,
    pub meta: ModelType,
    pub stacking: StackingConfig,
}

/// Margin-based base model of the default line-up: the SVM when the `svm`
/// feature is enabled, GBDT otherwise.
#[cfg(feature = "svm")]
fn default_margin_model() -> ModelType {
    ModelType::SVM {
        c: 1.0,
        eps: 0.1,
        kernel: "gauss".to_string(),
        gaussian_kernel_eps: 100.0,
        n_classes: DEFAULT_N_CLASSES,
    }
}

#[cfg(not(feature = "svm"))]
fn default_margin_model() -> ModelType {
    ModelType::default()
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            bases: vec![
                default_margin_model(),
                ModelType::random_forest(),
                ModelType::KNN {
                    k: 3,
                    metric: DistanceMetric::Euclidean,
                },
            ],
            meta: ModelType::LogisticRegression {
                lambda: 0.01,
                learning_rate: 0.1,
                max_iter: 1000,
                n_classes: DEFAULT_N_CLASSES,
            },
            stacking: StackingConfig::default(),
        }
    }
}

impl EnsembleConfig {
    /// Copy of this config with every estimator sized for `n_classes` labels.
    pub fn with_n_classes(&self, n_classes: usize) -> Self {
        let mut config = self.clone();
        for model in config.bases.iter_mut().chain(std::iter::once(&mut config.meta)) {
            model.set_n_classes(n_classes);
        }
        config
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read ensemble config: {}", path.as_ref().display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse ensemble config: {}", path.as_ref().display()))
    }

    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write ensemble config: {}", path.as_ref().display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_type_aliases() {
        let lr = ModelType::LogisticRegression {
            lambda: 0.01,
            learning_rate: 0.1,
            max_iter: 500,
            n_classes: DEFAULT_N_CLASSES,
        };
        for name in ["lr", "logistic", "logistic_regression", "LR", "Logistic_Regression"] {
            assert_eq!(name.parse::<ModelType>().unwrap(), lr, "{}", name);
        }
        for name in ["gbdt", "GBDT", "Gbdt"] {
            assert_eq!(name.parse::<ModelType>().unwrap(), ModelType::default());
        }
        for name in ["rf", "random_forest", "RandomForest", "RF"] {
            assert_eq!(name.parse::<ModelType>().unwrap(), ModelType::random_forest());
        }
        assert_eq!(
            "KNN".parse::<ModelType>().unwrap(),
            ModelType::KNN {
                k: 3,
                metric: DistanceMetric::Euclidean
            }
        );
    }

    #[test]
    fn test_unknown_model_type() {
        let err = "xgboost".parse::<ModelType>().unwrap_err();
        assert_eq!(
            err,
            "Unknown model type: xgboost. Valid options are: gbdt, knn, lr, rf (svm requires `--features svm`)"
        );
    }

    #[cfg(not(feature = "svm"))]
    #[test]
    fn test_svm_needs_feature() {
        assert!("svm".parse::<ModelType>().is_err());
    }

    #[test]
    fn test_distance_metric_from_str() {
        assert_eq!(
            "Euclidean".parse::<DistanceMetric>().unwrap(),
            DistanceMetric::Euclidean
        );
        assert_eq!(
            "MANHATTAN".parse::<DistanceMetric>().unwrap(),
            DistanceMetric::Manhattan
        );
        assert_eq!(
            "cosine".parse::<DistanceMetric>().unwrap_err(),
            "Unknown distance metric: cosine. Valid options are: euclidean, manhattan"
        );
    }

    #[test]
    fn test_default_line_up() {
        let config = EnsembleConfig::default();
        let names: Vec<&str> = config.bases.iter().map(ModelType::name).collect();
        #[cfg(feature = "svm")]
        assert_eq!(names, ["SVM", "RandomForest", "KNN"]);
        #[cfg(not(feature = "svm"))]
        assert_eq!(names, ["GBDT", "RandomForest", "KNN"]);
        assert_eq!(config.meta.name(), "LogisticRegression");
    }

    #[test]
    fn test_with_n_classes_resizes_every_model() {
        let config = EnsembleConfig::default().with_n_classes(2);
        for model in config.bases.iter().chain(std::iter::once(&config.meta)) {
            assert!(matches!(model.n_classes(), Some(2) | None));
        }
        assert_eq!(config.meta.n_classes(), Some(2));
        assert_eq!(config.stacking, StackingConfig::default());
    }

    #[test]
    fn test_model_type_json_names_variant() {
        let json = serde_json::to_string(&ModelType::random_forest()).unwrap();
        assert!(json.starts_with(r#"{"RandomForest":"#));
        let back: ModelType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ModelType::random_forest());
    }
}

use crate::config::{EnsembleConfig, ModelType};
use crate::models::estimator::Estimator;
use crate::stacking::StackingClassifier;

/// Build a boxed estimator from its `ModelType`.
pub fn build_model(model_type: &ModelType) -> Box<dyn Estimator> {
    match model_type {
        ModelType::KNN { k, metric } => {
            Box::new(crate::models::knn::KNNClassifier::new(*k, *metric))
        }

        ModelType::LogisticRegression {
            lambda,
            learning_rate,
            max_iter,
            n_classes,
        } => Box::new(crate::models::logistic::LogisticRegression::new(
            *lambda,
            *learning_rate,
            *max_iter,
            *n_classes,
        )),

        ModelType::GBDT { .. } => Box::new(crate::models::gbdt::GBDTClassifier::new(
            model_type.clone(),
        )),

        ModelType::RandomForest {
            n_trees,
            max_depth,
            min_leaf_size,
            seed,
            n_classes,
        } => Box::new(crate::models::random_forest::RandomForestClassifier::new(
            *n_trees,
            *max_depth,
            *min_leaf_size,
            *seed,
            *n_classes,
        )),

        #[cfg(feature = "svm")]
        ModelType::SVM { .. } => Box::new(crate::models::svm::SVMClassifier::new(
            model_type.clone(),
        )),
    }
}

/// Build an unfitted stacking ensemble from an `EnsembleConfig`.
///
/// The same config must be used to rebuild an ensemble before
/// `StackingClassifier::load_models`, since saved models do not record
/// their own types.
pub fn build_stacker(config: &EnsembleConfig) -> StackingClassifier {
    let bases = config.bases.iter().map(build_model).collect();
    let meta = build_model(&config.meta);
    StackingClassifier::new(bases, meta, config.stacking.clone())
}

pub mod gbdt;
pub mod knn;
pub mod logistic;
pub mod random_forest;
#[cfg(feature = "svm")]
pub mod svm;

pub mod estimator;
pub mod factory;

pub use estimator::Estimator;

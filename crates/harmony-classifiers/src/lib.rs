//! harmony-classifiers: stacked-ensemble classifiers for speaker demographics.
//!
//! Acoustic feature vectors are classified into one of four age/gender
//! classes by a two-layer stacking ensemble. Base estimators are trained with
//! K-fold cross-validation to produce out-of-fold label predictions, a meta
//! estimator learns from those predictions, and the whole ensemble can be
//! saved to and restored from a directory.
//!
//! Estimators sit behind the object-safe `Estimator` trait. KNN, logistic
//! regression, GBDT and random forest are always available; the linfa-based
//! SVM is behind the `svm` feature flag.
pub mod config;
pub mod error;
pub mod folds;
pub mod io;
pub mod labels;
pub mod math;
pub mod metrics;
pub mod models;
pub mod oof;
pub mod persistence;
pub mod preprocessing;
pub mod stacking;

pub use error::StackingError;
pub use stacking::StackingClassifier;

use std::error::Error;
use std::fmt;

/// Failures surfaced by the stacking ensemble.
///
/// Estimator failures keep the estimator's own error as `source` together
/// with the model slot (e.g. `base[1] KNN` or `meta LogisticRegression`) and,
/// for out-of-fold work, the fold that was being processed.
#[derive(Debug)]
pub enum StackingError {
    /// Bad fold count, shape mismatch, or nothing to stack.
    InvalidConfiguration(String),
    EstimatorTraining {
        model: String,
        fold: Option<usize>,
        source: anyhow::Error,
    },
    EstimatorPrediction {
        model: String,
        fold: Option<usize>,
        source: anyhow::Error,
    },
    NotFitted,
    Persistence {
        model: String,
        source: anyhow::Error,
    },
}

fn fmt_fold(fold: &Option<usize>) -> String {
    match fold {
        Some(k) => format!(" on fold {}", k),
        None => String::new(),
    }
}

impl fmt::Display for StackingError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StackingError::InvalidConfiguration(msg) => {
                write!(f, "Invalid stacking configuration: {}", msg)
            }
            StackingError::EstimatorTraining {
                model,
                fold,
                source,
            } => write!(
                f,
                "Training {}{} failed: {}",
                model,
                fmt_fold(fold),
                source
            ),
            StackingError::EstimatorPrediction {
                model,
                fold,
                source,
            } => write!(
                f,
                "Prediction with {}{} failed: {}",
                model,
                fmt_fold(fold),
                source
            ),
            StackingError::NotFitted => {
                write!(f, "Stacking classifier must be fitted before predicting")
            }
            StackingError::Persistence { model, source } => {
                write!(f, "Persistence of {} failed: {}", model, source)
            }
        }
    }
}

impl Error for StackingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StackingError::EstimatorTraining { source, .. }
            | StackingError::EstimatorPrediction { source, .. }
            | StackingError::Persistence { source, .. } => Some(&**source),
            _ => None,
        }
    }
}

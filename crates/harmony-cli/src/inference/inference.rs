use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};

use harmony_classifiers::config::EnsembleConfig;
use harmony_classifiers::io::{read_unlabeled_tsv, write_predictions_tsv};
use harmony_classifiers::labels::{DemographicClass, LabelTarget};
use harmony_classifiers::math::Array2;
use harmony_classifiers::metrics::accuracy;
use harmony_classifiers::models::factory::build_stacker;
use harmony_classifiers::preprocessing::Scaler;
use harmony_classifiers::StackingClassifier;

use crate::inference::input::{InferenceConfig, InferenceMode};
use crate::util::{log_confusion_matrix, read_target, ENSEMBLE_FILE_NAME, SCALER_FILE_NAME};

/// What an inference run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceSummary {
    /// Predicted labels in input order.
    pub labels: Vec<i32>,
    pub target: LabelTarget,
    /// Accuracy in percent over the rows with a known class, when the input
    /// table carried `age`/`gender` columns.
    pub accuracy: Option<f64>,
}

/// A fitted ensemble restored from one model directory.
struct SavedEnsemble {
    stacker: StackingClassifier,
    scaler: Option<Scaler>,
    target: LabelTarget,
}

impl SavedEnsemble {
    fn load(model_dir: &Path) -> Result<Self> {
        let ensemble = EnsembleConfig::from_json_file(model_dir.join(ENSEMBLE_FILE_NAME))?;
        let mut stacker = build_stacker(&ensemble);
        stacker
            .load_models(model_dir)
            .with_context(|| format!("Failed to load models from {}", model_dir.display()))?;
        if !stacker.is_fitted() {
            bail!(
                "Ensemble in {} was saved before it was fitted",
                model_dir.display()
            );
        }

        let scaler_path = model_dir.join(SCALER_FILE_NAME);
        let scaler = if scaler_path.exists() {
            Some(Scaler::load(&scaler_path)?)
        } else {
            log::debug!("No scaler found in {}, using raw features", model_dir.display());
            None
        };

        Ok(SavedEnsemble {
            stacker,
            scaler,
            target: read_target(model_dir)?,
        })
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<i32>> {
        let labels = match &self.scaler {
            Some(scaler) => self.stacker.predict(&scaler.transform(x)?),
            None => self.stacker.predict(x),
        };
        labels.context("Failed to predict")
    }
}

/// Rebuild the saved ensemble(s), classify every row of the inference table
/// and write the predictions.
pub fn run_inference(config: &InferenceConfig) -> Result<InferenceSummary> {
    let model_dir = Path::new(&config.model_dir);
    let data = read_unlabeled_tsv(&config.inference_data)?;

    let (labels, target) = match config.mode {
        InferenceMode::Single => {
            let ensemble = SavedEnsemble::load(model_dir)?;
            (ensemble.predict(&data.x)?, ensemble.target)
        }
        InferenceMode::Combined => (predict_combined(config, &data.x)?, LabelTarget::Class),
    };

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for &label in &labels {
        *counts
            .entry(target.label_name(label).unwrap_or("unknown"))
            .or_insert(0) += 1;
    }
    for (name, count) in &counts {
        log::info!("{:>16}: {}", name, count);
    }

    let accuracy = match &data.labels {
        Some(truth) => score(truth, &labels, target)?,
        None => None,
    };

    write_predictions_tsv(&config.output_file, &data.ids, &labels, target)?;
    log::info!(
        "Wrote {} predictions to {}",
        labels.len(),
        config.output_file
    );

    Ok(InferenceSummary {
        labels,
        target,
        accuracy,
    })
}

/// Predict gender and age with separate ensembles and merge them into the
/// class label `age * 2 + gender`.
fn predict_combined(config: &InferenceConfig, x: &Array2<f64>) -> Result<Vec<i32>> {
    let model_dir = Path::new(&config.model_dir);
    let gender = SavedEnsemble::load(&model_dir.join(&config.gender_prefix))?;
    let age = SavedEnsemble::load(&model_dir.join(&config.age_prefix))?;
    for (ensemble, expected, prefix) in [
        (&gender, LabelTarget::Gender, &config.gender_prefix),
        (&age, LabelTarget::Age, &config.age_prefix),
    ] {
        if ensemble.target != expected {
            bail!(
                "Ensemble in {} was trained for target '{}', expected '{}'",
                model_dir.join(prefix).display(),
                ensemble.target,
                expected
            );
        }
    }

    let gender_labels = gender.predict(x)?;
    let age_labels = age.predict(x)?;
    age_labels
        .iter()
        .zip(&gender_labels)
        .map(|(&a, &g)| {
            DemographicClass::from_bits(a, g)
                .map(|class| class.label())
                .ok_or_else(|| anyhow!("Cannot combine age label {} with gender label {}", a, g))
        })
        .collect()
}

/// Accuracy and confusion matrix over the rows whose true class is known.
fn score(
    truth: &[Option<DemographicClass>],
    predicted: &[i32],
    target: LabelTarget,
) -> Result<Option<f64>> {
    let (y_true, y_pred): (Vec<i32>, Vec<i32>) = truth
        .iter()
        .zip(predicted)
        .filter_map(|(class, &pred)| class.map(|c| (target.project(c), pred)))
        .unzip();
    if y_true.is_empty() {
        log::warn!("Inference table has label columns but no row with a known class");
        return Ok(None);
    }

    let acc = accuracy(&y_true, &y_pred)?;
    log::info!("Accuracy: {:.2}% ({} labelled samples)", acc, y_true.len());
    log_confusion_matrix(&y_true, &y_pred, target)?;
    Ok(Some(acc))
}

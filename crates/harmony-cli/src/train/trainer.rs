use std::path::Path;

use anyhow::{bail, Context, Result};

use harmony_classifiers::io::read_feature_tsv;
use harmony_classifiers::labels::LabelTarget;
use harmony_classifiers::metrics::accuracy;
use harmony_classifiers::models::factory::build_stacker;
use harmony_classifiers::preprocessing::Scaler;

use crate::train::input::TrainConfig;
use crate::util::{
    ensure_dir, log_confusion_matrix, write_target, ENSEMBLE_FILE_NAME, SCALER_FILE_NAME,
};

/// What a training run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainSummary {
    pub n_train: usize,
    pub n_features: usize,
    /// Accuracy on the test table in percent, when one was given.
    pub test_accuracy: Option<f64>,
}

pub fn run_training(config: &TrainConfig) -> Result<TrainSummary> {
    let train = read_feature_tsv(&config.train_data)?;
    if train.y.is_empty() {
        bail!("No labelled samples found in {}", config.train_data);
    }
    let n_features = train.x.ncols();
    let y_train = project_labels(&train.y, config.target)?;

    let (scaler, x_train) = if config.scale_features {
        let (scaler, scaled) = Scaler::fit_transform(&train.x)?;
        (Some(scaler), scaled)
    } else {
        (None, train.x)
    };

    let ensemble = config.ensemble.with_n_classes(config.target.n_classes());
    log::info!(
        "Training {} base models for target '{}' ({} classes)",
        ensemble.bases.len(),
        config.target,
        config.target.n_classes()
    );
    let mut stacker = build_stacker(&ensemble);
    stacker
        .fit(&x_train, &y_train)
        .context("Failed to train stacking ensemble")?;

    let test_accuracy = match &config.test_data {
        Some(test_path) => {
            let test = read_feature_tsv(test_path)?;
            if test.x.ncols() != n_features {
                bail!(
                    "Test data has {} features but training data has {}",
                    test.x.ncols(),
                    n_features
                );
            }
            let x_test = match &scaler {
                Some(scaler) => scaler.transform(&test.x)?,
                None => test.x,
            };
            let pred = stacker
                .predict(&x_test)
                .context("Failed to predict test data")?;
            let y_test = project_labels(&test.y, config.target)?;
            let acc = accuracy(&y_test, &pred)?;
            log::info!(
                "Test accuracy: {:.2}% ({} samples)",
                acc,
                y_test.len()
            );
            log_confusion_matrix(&y_test, &pred, config.target)?;
            Some(acc)
        }
        None => None,
    };

    let output_dir = Path::new(&config.output_dir);
    ensure_dir(output_dir)?;
    stacker
        .save_models(output_dir)
        .context("Failed to save trained models")?;
    ensemble.to_json_file(output_dir.join(ENSEMBLE_FILE_NAME))?;
    write_target(output_dir, config.target)?;
    if let Some(scaler) = &scaler {
        scaler.save(output_dir.join(SCALER_FILE_NAME))?;
    }
    log::info!("Trained ensemble written to {}", output_dir.display());

    Ok(TrainSummary {
        n_train: train.y.len(),
        n_features,
        test_accuracy,
    })
}

/// Map class labels onto `target`.
fn project_labels(labels: &[i32], target: LabelTarget) -> Result<Vec<i32>> {
    labels
        .iter()
        .map(|&label| {
            target
                .project_label(label)
                .ok_or_else(|| anyhow::anyhow!("Label {} is not a demographic class", label))
        })
        .collect()
}

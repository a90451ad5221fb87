use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::ArgMatches;
use serde::{Deserialize, Serialize};

use harmony_classifiers::config::{EnsembleConfig, ModelType};
use harmony_classifiers::labels::LabelTarget;

use crate::util::validate_tsv_file;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct TrainConfig {
    pub train_data: String,
    pub test_data: Option<String>,
    pub output_dir: String,
    /// Standardise features before training; the scaler is saved with the models.
    pub scale_features: bool,
    /// Train on the four classes, or on gender or age alone.
    pub target: LabelTarget,
    pub ensemble: EnsembleConfig,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            train_data: String::new(),
            test_data: None,
            output_dir: String::from("models"),
            scale_features: true,
            target: LabelTarget::default(),
            ensemble: EnsembleConfig::default(),
        }
    }
}

impl TrainConfig {
    pub fn from_arguments(config_path: &PathBuf, matches: &ArgMatches) -> Result<Self> {
        let config_json = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let mut config: TrainConfig = serde_json::from_str(&config_json)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

        // Apply CLI overrides
        if let Some(train_data) = matches.get_one::<String>("train_data") {
            config.train_data = train_data.clone();
        }
        validate_tsv_file(&config.train_data)?;

        if let Some(test_data) = matches.get_one::<String>("test_data") {
            config.test_data = Some(test_data.clone());
        }
        if let Some(test_data) = &config.test_data {
            validate_tsv_file(test_data)?;
        }

        if let Some(output_dir) = matches.get_one::<String>("output_dir") {
            config.output_dir = output_dir.clone();
        }

        if let Some(target) = matches.get_one::<String>("target") {
            config.target = LabelTarget::from_str(target).map_err(anyhow::Error::msg)?;
        }

        if let Some(meta) = matches.get_one::<String>("meta") {
            config.ensemble.meta = ModelType::from_str(meta).map_err(anyhow::Error::msg)?;
        }

        if let Some(bases) = matches.get_many::<String>("bases") {
            config.ensemble.bases = bases
                .map(|name| ModelType::from_str(name).map_err(anyhow::Error::msg))
                .collect::<Result<Vec<_>>>()?;
        }

        Ok(config)
    }
}

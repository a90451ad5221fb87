use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::ArgMatches;
use serde::{Deserialize, Serialize};

use crate::util::validate_tsv_file;

/// How the model directory is laid out.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum InferenceMode {
    /// One ensemble saved directly in `model_dir`.
    #[default]
    Single,
    /// A gender ensemble and an age ensemble saved in subdirectories of
    /// `model_dir`; their predictions are combined into a class label.
    Combined,
}

impl FromStr for InferenceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single" => Ok(InferenceMode::Single),
            "combined" => Ok(InferenceMode::Combined),
            _ => Err(format!(
                "Unknown inference mode: {}. Valid options are: single, combined",
                s
            )),
        }
    }
}

impl fmt::Display for InferenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferenceMode::Single => f.write_str("single"),
            InferenceMode::Combined => f.write_str("combined"),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct InferenceConfig {
    pub version: String,
    pub model_dir: String,
    pub inference_data: String,
    pub output_file: String,
    pub mode: InferenceMode,
    /// Subdirectory of `model_dir` holding the gender ensemble (combined mode).
    pub gender_prefix: String,
    /// Subdirectory of `model_dir` holding the age ensemble (combined mode).
    pub age_prefix: String,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        InferenceConfig {
            version: clap::crate_version!().to_string(),
            model_dir: String::from("models"),
            inference_data: String::new(),
            output_file: String::from("harmony_predictions.tsv"),
            mode: InferenceMode::default(),
            gender_prefix: String::from("gender"),
            age_prefix: String::from("age"),
        }
    }
}

impl InferenceConfig {
    pub fn from_arguments(config_path: &PathBuf, matches: &ArgMatches) -> Result<Self> {
        let config_json = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let partial: serde_json::Value = serde_json::from_str(&config_json)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;
        let mut config = InferenceConfig::default();

        macro_rules! load_or_default {
            ($field:ident) => {
                if let Some(val) = partial.get(stringify!($field)) {
                    if let Ok(parsed) = serde_json::from_value(val.clone()) {
                        config.$field = parsed;
                    } else {
                        log::warn!(
                            "Config Invalid value for '{}', using default: {:?}",
                            stringify!($field),
                            config.$field
                        );
                    }
                } else {
                    log::debug!(
                        "Config Missing field '{}', using default: {:?}",
                        stringify!($field),
                        config.$field
                    );
                }
            };
        }

        load_or_default!(model_dir);
        load_or_default!(inference_data);
        load_or_default!(output_file);
        load_or_default!(mode);
        load_or_default!(gender_prefix);
        load_or_default!(age_prefix);

        // Apply CLI overrides
        if let Some(model_dir) = matches.get_one::<String>("model_dir") {
            config.model_dir = model_dir.clone();
        }
        if let Some(inference_data) = matches.get_one::<String>("inference_data") {
            config.inference_data = inference_data.clone();
        }
        if let Some(output_file) = matches.get_one::<String>("output_file") {
            config.output_file = output_file.clone();
        }
        if let Some(mode) = matches.get_one::<String>("mode") {
            config.mode = InferenceMode::from_str(mode).map_err(anyhow::Error::msg)?;
        }
        if let Some(gender_prefix) = matches.get_one::<String>("gender_prefix") {
            config.gender_prefix = gender_prefix.clone();
        }
        if let Some(age_prefix) = matches.get_one::<String>("age_prefix") {
            config.age_prefix = age_prefix.clone();
        }

        validate_tsv_file(&config.inference_data)?;
        if !PathBuf::from(&config.model_dir).is_dir() {
            anyhow::bail!("Model directory does not exist: {}", config.model_dir);
        }

        Ok(config)
    }
}

//! On-disk layout of a saved stacking ensemble.
//!
//! A model directory contains `config.txt` plus one artifact per estimator.
//! `config.txt` is a line-oriented `key=value` record:
//!
//! ```text
//! num_base_models=3
//! num_folds=5
//! fitted=true
//! ```
//!
//! Concrete estimator types are not recorded; the caller must construct
//! estimators matching the saved ones before loading.
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};

pub const CONFIG_FILE_NAME: &str = "config.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnsembleManifest {
    pub num_base_models: usize,
    pub num_folds: usize,
    pub fitted: bool,
}

impl EnsembleManifest {
    pub fn path_in<P: AsRef<Path>>(dir: P) -> PathBuf {
        dir.as_ref().join(CONFIG_FILE_NAME)
    }

    pub fn write_to_dir<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let path = Self::path_in(dir);
        fs::write(&path, self.to_string())
            .with_context(|| format!("Failed to write ensemble config: {}", path.display()))
    }

    pub fn read_from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let path = Self::path_in(dir);
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read ensemble config: {}", path.display()))?;
        content
            .parse()
            .with_context(|| format!("Failed to parse ensemble config: {}", path.display()))
    }
}

impl fmt::Display for EnsembleManifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "num_base_models={}", self.num_base_models)?;
        writeln!(f, "num_folds={}", self.num_folds)?;
        writeln!(f, "fitted={}", self.fitted)
    }
}

impl FromStr for EnsembleManifest {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut num_base_models = None;
        let mut num_folds = None;
        let mut fitted = None;

        for (line_no, line) in s.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| anyhow!("line {}: expected key=value, got '{}'", line_no + 1, line))?;
            let value = value.trim();
            match key.trim() {
                "num_base_models" => {
                    num_base_models = Some(value.parse::<usize>().with_context(|| {
                        format!("line {}: invalid num_base_models '{}'", line_no + 1, value)
                    })?)
                }
                "num_folds" => {
                    num_folds = Some(value.parse::<usize>().with_context(|| {
                        format!("line {}: invalid num_folds '{}'", line_no + 1, value)
                    })?)
                }
                "fitted" => {
                    fitted = Some(value.parse::<bool>().with_context(|| {
                        format!("line {}: invalid fitted flag '{}'", line_no + 1, value)
                    })?)
                }
                other => log::trace!("Ignoring unknown ensemble config key '{}'", other),
            }
        }

        match (num_base_models, num_folds, fitted) {
            (Some(num_base_models), Some(num_folds), Some(fitted)) => Ok(Self {
                num_base_models,
                num_folds,
                fitted,
            }),
            (None, _, _) => bail!("missing key 'num_base_models'"),
            (_, None, _) => bail!("missing key 'num_folds'"),
            (_, _, None) => bail!("missing key 'fitted'"),
        }
    }
}

/// Artifact path for base model `index`, e.g. `base_0_KNN.json`.
pub fn base_model_path(dir: &Path, index: usize, name: &str) -> PathBuf {
    dir.join(format!("base_{}_{}.json", index, name))
}

/// Artifact path for the meta model, e.g. `meta_LogisticRegression.json`.
pub fn meta_model_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("meta_{}.json", name))
}

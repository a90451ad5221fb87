use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use harmony_classifiers::labels::LabelTarget;
use harmony_classifiers::metrics::confusion_matrix;

/// File names written next to the saved ensemble.
pub const ENSEMBLE_FILE_NAME: &str = "ensemble.json";
pub const SCALER_FILE_NAME: &str = "scaler.json";
pub const TARGET_FILE_NAME: &str = "target.txt";

pub fn validate_tsv_file(path: &str) -> Result<()> {
    let pb = PathBuf::from(path);

    let ext = pb
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase());
    match ext.as_deref() {
        Some("tsv") | Some("txt") => {}
        _ => anyhow::bail!("File must have a .tsv or .txt extension: {}", path),
    }

    if !pb.exists() {
        anyhow::bail!("File does not exist: {}", path);
    }

    Ok(())
}

pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory: {}", path.display()))
}

pub fn write_target(dir: &Path, target: LabelTarget) -> Result<()> {
    let path = dir.join(TARGET_FILE_NAME);
    std::fs::write(&path, format!("{}\n", target))
        .with_context(|| format!("Failed to write label target: {}", path.display()))
}

/// Label target a model directory was trained for. Directories without a
/// target file hold four-class ensembles.
pub fn read_target(dir: &Path) -> Result<LabelTarget> {
    let path = dir.join(TARGET_FILE_NAME);
    if !path.exists() {
        return Ok(LabelTarget::Class);
    }
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read label target: {}", path.display()))?;
    content
        .parse::<LabelTarget>()
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("Invalid label target in {}", path.display()))
}

pub fn log_confusion_matrix(y_true: &[i32], y_pred: &[i32], target: LabelTarget) -> Result<()> {
    let matrix = confusion_matrix(y_true, y_pred, target.n_classes())?;
    log::info!("Confusion matrix (rows: true, columns: predicted)");
    for (label, row) in matrix.iter().enumerate() {
        let name = target.label_name(label as i32).unwrap_or("unknown");
        log::info!("{:>16} {:?}", name, row);
    }
    Ok(())
}

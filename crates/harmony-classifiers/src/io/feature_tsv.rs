//! Feature table TSV reader.
//!
//! Labelled tables carry one column per acoustic feature followed by the
//! `age` and `gender` columns. Tables used at inference time may carry a
//! leading id column, and keep their labels when they have them so the
//! predictions can be scored.
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use csv::StringRecord;

use crate::labels::{DemographicClass, LabelTarget};
use crate::math::Array2;

/// Labelled feature table ready for training or evaluation.
#[derive(Debug, Clone)]
pub struct FeatureDataset {
    pub x: Array2<f64>,
    pub y: Vec<i32>,
    pub feature_names: Vec<String>,
}

/// Feature table read for inference, one id per row.
#[derive(Debug, Clone)]
pub struct UnlabeledDataset {
    pub ids: Vec<String>,
    pub x: Array2<f64>,
    pub feature_names: Vec<String>,
    /// Present when the table has trailing `age`/`gender` columns. Rows whose
    /// pair is not a known class hold `None`.
    pub labels: Option<Vec<Option<DemographicClass>>>,
}

fn open_tsv(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("Failed to open feature table: {}", path.display()))
}

fn parse_features(
    record: &StringRecord,
    headers: &StringRecord,
    columns: std::ops::Range<usize>,
    row: usize,
    out: &mut Vec<f64>,
) -> Result<()> {
    for idx in columns {
        let value = record
            .get(idx)
            .ok_or_else(|| anyhow!("Missing feature value at row {}", row))?;
        let parsed = value.trim().parse::<f64>().with_context(|| {
            format!(
                "Invalid feature '{}' at row {}",
                headers.get(idx).unwrap_or(""),
                row
            )
        })?;
        out.push(parsed);
    }
    Ok(())
}

fn has_label_columns(headers: &StringRecord) -> bool {
    let n = headers.len();
    n >= 2
        && headers[n - 2].trim().eq_ignore_ascii_case("age")
        && headers[n - 1].trim().eq_ignore_ascii_case("gender")
}

/// Read a labelled feature table.
///
/// # Arguments
///
/// * `path` - Tab-separated file with a header row. All columns except the
///   last two are numeric features; the last two are age and gender.
///
/// # Returns
///
/// The feature matrix and the class label of every row whose age/gender
/// pair is a known demographic class. Other rows are skipped with a warning.
pub fn read_feature_tsv<P: AsRef<Path>>(path: P) -> Result<FeatureDataset> {
    let path = path.as_ref();
    let mut reader = open_tsv(path)?;
    let headers = reader
        .headers()
        .context("Failed to read feature table header row")?
        .clone();

    if headers.len() < 3 {
        bail!(
            "Feature table {} needs at least one feature column plus age and gender, found {} columns",
            path.display(),
            headers.len()
        );
    }
    let n_features = headers.len() - 2;
    let age_idx = n_features;
    let gender_idx = n_features + 1;

    let mut features = Vec::new();
    let mut labels = Vec::new();
    let mut skipped = 0usize;

    for (row_idx, result) in reader.records().enumerate() {
        let row = row_idx + 1;
        let record = result.with_context(|| format!("Failed to read row {}", row))?;

        let age = record.get(age_idx).unwrap_or_default();
        let gender = record.get(gender_idx).unwrap_or_default();
        let class = match DemographicClass::from_age_gender(age, gender) {
            Some(class) => class,
            None => {
                log::warn!(
                    "Skipping row {} with unknown label (age '{}', gender '{}')",
                    row,
                    age,
                    gender
                );
                skipped += 1;
                continue;
            }
        };

        parse_features(&record, &headers, 0..n_features, row, &mut features)?;
        labels.push(class.label());
    }

    let n_samples = labels.len();
    let x = Array2::from_shape_vec((n_samples, n_features), features)
        .context("Failed to build feature matrix")?;
    let feature_names = headers
        .iter()
        .take(n_features)
        .map(|h| h.trim().to_string())
        .collect();

    log::info!(
        "Loaded {} labelled samples with {} features from {} ({} skipped)",
        n_samples,
        n_features,
        path.display(),
        skipped
    );

    Ok(FeatureDataset {
        x,
        y: labels,
        feature_names,
    })
}

/// Read a feature table for inference.
///
/// The first column is kept as row ids when its header is `id` or its first
/// value is not a number; otherwise ids are the 1-based row numbers. Trailing
/// `age` and `gender` columns, if present, are returned as `labels` and are
/// not part of the feature matrix.
pub fn read_unlabeled_tsv<P: AsRef<Path>>(path: P) -> Result<UnlabeledDataset> {
    let path = path.as_ref();
    let mut reader = open_tsv(path)?;
    let headers = reader
        .headers()
        .context("Failed to read feature table header row")?
        .clone();

    let records = reader
        .records()
        .enumerate()
        .map(|(row_idx, result)| {
            result.with_context(|| format!("Failed to read row {}", row_idx + 1))
        })
        .collect::<Result<Vec<StringRecord>>>()?;

    let labelled = has_label_columns(&headers);
    let end = if labelled {
        headers.len() - 2
    } else {
        headers.len()
    };
    let id_column = headers
        .get(0)
        .map(|h| h.trim().eq_ignore_ascii_case("id"))
        .unwrap_or(false)
        || records
            .first()
            .and_then(|r| r.get(0))
            .map(|v| v.trim().parse::<f64>().is_err())
            .unwrap_or(false);
    let start = usize::from(id_column);
    if start >= end {
        bail!("Feature table {} has no feature columns", path.display());
    }

    let mut ids = Vec::with_capacity(records.len());
    let mut features = Vec::with_capacity(records.len() * (end - start));
    let mut labels = Vec::with_capacity(if labelled { records.len() } else { 0 });
    for (row_idx, record) in records.iter().enumerate() {
        let row = row_idx + 1;
        if id_column {
            ids.push(record.get(0).unwrap_or_default().trim().to_string());
        } else {
            ids.push(row.to_string());
        }
        parse_features(record, &headers, start..end, row, &mut features)?;
        if labelled {
            let age = record.get(end).unwrap_or_default();
            let gender = record.get(end + 1).unwrap_or_default();
            labels.push(DemographicClass::from_age_gender(age, gender));
        }
    }

    let x = Array2::from_shape_vec((ids.len(), end - start), features)
        .context("Failed to build feature matrix")?;
    let feature_names = headers
        .iter()
        .skip(start)
        .take(end - start)
        .map(|h| h.trim().to_string())
        .collect();

    log::info!(
        "Loaded {} samples with {} features from {}{}",
        ids.len(),
        end - start,
        path.display(),
        if labelled { " (labelled)" } else { "" }
    );

    Ok(UnlabeledDataset {
        ids,
        x,
        feature_names,
        labels: labelled.then_some(labels),
    })
}

/// Write `id\tlabel\tclass_name` rows, one per prediction. Class names
/// follow `target`; labels it does not know are written as `unknown`.
pub fn write_predictions_tsv<P: AsRef<Path>>(
    path: P,
    ids: &[String],
    labels: &[i32],
    target: LabelTarget,
) -> Result<()> {
    let path = path.as_ref();
    if ids.len() != labels.len() {
        bail!(
            "Cannot write predictions: {} ids but {} labels",
            ids.len(),
            labels.len()
        );
    }

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .with_context(|| format!("Failed to create predictions file: {}", path.display()))?;
    writer.write_record(["id", "label", "class_name"])?;
    for (id, &label) in ids.iter().zip(labels) {
        let class_name = target.label_name(label).unwrap_or("unknown");
        writer.write_record([id.as_str(), label.to_string().as_str(), class_name])?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write predictions file: {}", path.display()))?;
    Ok(())
}

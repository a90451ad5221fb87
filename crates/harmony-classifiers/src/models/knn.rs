use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::DistanceMetric;
use crate::math::Array2;
use crate::models::estimator::Estimator;

/// k-nearest-neighbour classifier. Training just memorises the data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNClassifier {
    k: usize,
    metric: DistanceMetric,
    train_x: Option<Array2<f64>>,
    train_y: Vec<i32>,
}

impl KNNClassifier {
    pub fn new(k: usize, metric: DistanceMetric) -> Self {
        KNNClassifier {
            k,
            metric,
            train_x: None,
            train_y: Vec::new(),
        }
    }

    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        match self.metric {
            DistanceMetric::Euclidean => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f64>()
                .sqrt(),
            DistanceMetric::Manhattan => a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum(),
        }
    }

    /// Majority label among the k nearest training rows. Ties go to the smaller label.
    fn classify(&self, train_x: &Array2<f64>, query: &[f64]) -> i32 {
        let mut neighbours: Vec<(f64, usize)> = train_x
            .rows()
            .enumerate()
            .map(|(i, row)| (self.distance(row, query), i))
            .collect();
        neighbours.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut votes: BTreeMap<i32, usize> = BTreeMap::new();
        for &(_, i) in neighbours.iter().take(self.k) {
            *votes.entry(self.train_y[i]).or_insert(0) += 1;
        }

        let mut best = (0, 0usize);
        for (&label, &count) in votes.iter() {
            if count > best.1 {
                best = (label, count);
            }
        }
        best.0
    }
}

impl Estimator for KNNClassifier {
    fn train(&mut self, x: &Array2<f64>, y: &[i32]) -> Result<()> {
        if self.k < 1 {
            bail!("Number of neighbors (k) must be at least 1");
        }
        if x.nrows() != y.len() {
            bail!("{} feature rows but {} labels", x.nrows(), y.len());
        }
        if x.nrows() == 0 {
            bail!("Cannot train KNN on an empty dataset");
        }
        self.train_x = Some(x.clone());
        self.train_y = y.to_vec();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<i32>> {
        let train_x = match &self.train_x {
            Some(train_x) => train_x,
            None => bail!("KNN model has not been trained"),
        };
        if x.ncols() != train_x.ncols() {
            bail!(
                "KNN was trained on {} features but got {}",
                train_x.ncols(),
                x.ncols()
            );
        }

        Ok((0..x.nrows())
            .into_par_iter()
            .map(|row| self.classify(train_x, x.row_slice(row)))
            .collect())
    }

    fn save(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create KNN model file: {}", path.display()))?;
        serde_json::to_writer(std::io::BufWriter::new(file), self)
            .with_context(|| format!("Failed to write KNN model: {}", path.display()))
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open KNN model file: {}", path.display()))?;
        *self = serde_json::from_reader(std::io::BufReader::new(file))
            .with_context(|| format!("Failed to parse KNN model: {}", path.display()))?;
        Ok(())
    }

    fn name(&self) -> &str {
        "KNN"
    }
}

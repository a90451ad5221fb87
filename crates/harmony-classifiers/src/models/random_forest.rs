use std::path::Path;

use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::math::Array2;
use crate::models::estimator::Estimator;

/// Node of a fitted classification tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
enum TreeNode {
    Leaf {
        label: i32,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    fn classify(&self, sample: &[f64]) -> i32 {
        match self {
            TreeNode::Leaf { label } => *label,
            TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if sample[*feature] <= *threshold {
                    left.classify(sample)
                } else {
                    right.classify(sample)
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Forest {
    n_features: usize,
    trees: Vec<TreeNode>,
}

/// Random forest of gini CART trees.
///
/// Every tree is grown on a bootstrap sample and considers `ceil(sqrt(d))`
/// randomly chosen features at each split. Tree `t` draws from a generator
/// seeded with `seed + t`, so the fitted forest does not depend on how rayon
/// schedules the trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    n_trees: usize,
    max_depth: usize,
    min_leaf_size: usize,
    seed: u64,
    n_classes: usize,
    forest: Option<Forest>,
}

/// Per-tree growing parameters shared by every recursive call.
struct TreeBuilder<'a> {
    x: &'a Array2<f64>,
    y: &'a [i32],
    n_classes: usize,
    max_depth: usize,
    min_leaf_size: usize,
    max_features: usize,
}

impl TreeBuilder<'_> {
    fn class_counts(&self, indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0; self.n_classes];
        for &i in indices {
            counts[self.y[i] as usize] += 1;
        }
        counts
    }

    fn build(&self, indices: &[usize], depth: usize, rng: &mut StdRng) -> TreeNode {
        let counts = self.class_counts(indices);
        let is_pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        if is_pure || depth >= self.max_depth || indices.len() < 2 * self.min_leaf_size {
            return TreeNode::Leaf {
                label: majority(&counts),
            };
        }

        let Some((feature, threshold)) = self.best_split(indices, &counts, rng) else {
            return TreeNode::Leaf {
                label: majority(&counts),
            };
        };
        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| self.x[(i, feature)] <= threshold);

        TreeNode::Split {
            feature,
            threshold,
            left: Box::new(self.build(&left, depth + 1, rng)),
            right: Box::new(self.build(&right, depth + 1, rng)),
        }
    }

    /// Lowest weighted gini over a random feature subset, or `None` when no
    /// split improves on the parent.
    fn best_split(
        &self,
        indices: &[usize],
        parent_counts: &[usize],
        rng: &mut StdRng,
    ) -> Option<(usize, f64)> {
        let n = indices.len();
        let parent_impurity = gini(parent_counts, n);
        let mut best: Option<(usize, f64)> = None;
        let mut best_impurity = parent_impurity;

        let mut candidates = sample(rng, self.x.ncols(), self.max_features).into_vec();
        candidates.sort_unstable();

        let mut order = indices.to_vec();
        for feature in candidates {
            order.sort_by(|&a, &b| self.x[(a, feature)].total_cmp(&self.x[(b, feature)]));

            let mut left_counts = vec![0; self.n_classes];
            let mut right_counts = parent_counts.to_vec();
            for split in 1..n {
                let moved = self.y[order[split - 1]] as usize;
                left_counts[moved] += 1;
                right_counts[moved] -= 1;

                let lo = self.x[(order[split - 1], feature)];
                let hi = self.x[(order[split], feature)];
                if lo == hi || split < self.min_leaf_size || n - split < self.min_leaf_size {
                    continue;
                }

                let impurity = (split as f64 * gini(&left_counts, split)
                    + (n - split) as f64 * gini(&right_counts, n - split))
                    / n as f64;
                if impurity < best_impurity - 1e-12 {
                    best_impurity = impurity;
                    best = Some((feature, (lo + hi) / 2.0));
                }
            }
        }
        best
    }
}

fn gini(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / total;
            p * p
        })
        .sum::<f64>()
}

/// Most frequent label; ties go to the smaller label.
fn majority(counts: &[usize]) -> i32 {
    let mut best = 0;
    for (label, &count) in counts.iter().enumerate() {
        if count > counts[best] {
            best = label;
        }
    }
    best as i32
}

impl RandomForestClassifier {
    pub fn new(
        n_trees: usize,
        max_depth: usize,
        min_leaf_size: usize,
        seed: u64,
        n_classes: usize,
    ) -> Self {
        RandomForestClassifier {
            n_trees,
            max_depth,
            min_leaf_size,
            seed,
            n_classes,
            forest: None,
        }
    }

    fn max_features(n_features: usize) -> usize {
        ((n_features as f64).sqrt().ceil() as usize).clamp(1, n_features)
    }
}

impl Estimator for RandomForestClassifier {
    fn train(&mut self, x: &Array2<f64>, y: &[i32]) -> Result<()> {
        if self.n_trees < 1 {
            bail!("Random forest needs at least one tree");
        }
        if self.min_leaf_size < 1 {
            bail!("min_leaf_size must be at least 1");
        }
        if x.nrows() != y.len() {
            bail!("{} feature rows but {} labels", x.nrows(), y.len());
        }
        if x.nrows() == 0 || x.ncols() == 0 {
            bail!("Cannot train a random forest on an empty dataset");
        }
        if let Some(&bad) = y.iter().find(|&&l| l < 0 || l as usize >= self.n_classes) {
            bail!("Label {} outside of [0, {})", bad, self.n_classes);
        }

        let builder = TreeBuilder {
            x,
            y,
            n_classes: self.n_classes,
            max_depth: self.max_depth,
            min_leaf_size: self.min_leaf_size,
            max_features: Self::max_features(x.ncols()),
        };
        let n = x.nrows();
        let seed = self.seed;
        let trees: Vec<TreeNode> = (0..self.n_trees)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(tree_idx as u64));
                let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                builder.build(&bootstrap, 0, &mut rng)
            })
            .collect();
        log::trace!("Grew {} random forest trees on {} rows", trees.len(), n);

        self.forest = Some(Forest {
            n_features: x.ncols(),
            trees,
        });
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<i32>> {
        let forest = match &self.forest {
            Some(forest) => forest,
            None => bail!("Random forest has not been trained"),
        };
        if x.ncols() != forest.n_features {
            bail!(
                "Random forest was trained on {} features but got {}",
                forest.n_features,
                x.ncols()
            );
        }

        Ok((0..x.nrows())
            .into_par_iter()
            .map(|row| {
                let sample = x.row_slice(row);
                let mut votes = vec![0; self.n_classes];
                for tree in &forest.trees {
                    votes[tree.classify(sample) as usize] += 1;
                }
                majority(&votes)
            })
            .collect())
    }

    fn save(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path).with_context(|| {
            format!("Failed to create random forest file: {}", path.display())
        })?;
        serde_json::to_writer(std::io::BufWriter::new(file), self)
            .with_context(|| format!("Failed to write random forest: {}", path.display()))
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open random forest file: {}", path.display()))?;
        *self = serde_json::from_reader(std::io::BufReader::new(file))
            .with_context(|| format!("Failed to parse random forest: {}", path.display()))?;
        Ok(())
    }

    fn name(&self) -> &str {
        "RandomForest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Class is `2 * (x1 > 0) + (x0 > 0)`.
    fn quadrants() -> (Array2<f64>, Vec<i32>) {
        let mut data = Vec::new();
        let mut labels = Vec::new();
        for i in 0..40 {
            let a = if i % 2 == 0 { -1.0 } else { 1.0 };
            let b = if (i / 2) % 2 == 0 { -1.0 } else { 1.0 } * (1.0 + (i % 3) as f64 * 0.1);
            data.extend_from_slice(&[a, b]);
            labels.push(2 * (b > 0.0) as i32 + (a > 0.0) as i32);
        }
        (Array2::from_shape_vec((40, 2), data).unwrap(), labels)
    }

    #[test]
    fn test_random_forest_classifier() {
        let (x, y) = quadrants();
        let mut forest = RandomForestClassifier::new(25, 8, 1, 7, 4);
        forest.train(&x, &y).unwrap();
        assert_eq!(forest.predict(&x).unwrap(), y);

        let queries =
            Array2::from_shape_vec((2, 2), vec![-2.0, -2.0, 2.0, 2.0]).unwrap();
        assert_eq!(forest.predict(&queries).unwrap(), vec![0, 3]);
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (x, y) = quadrants();
        let mut a = RandomForestClassifier::new(10, 4, 2, 99, 4);
        let mut b = RandomForestClassifier::new(10, 4, 2, 99, 4);
        a.train(&x, &y).unwrap();
        b.train(&x, &y).unwrap();
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_depth_zero_predicts_majority() {
        let x = Array2::from_shape_vec((5, 1), vec![0.0, 1.0, 2.0, 3.0, 4.0]).unwrap();
        let y = vec![1, 1, 1, 1, 1];
        let mut forest = RandomForestClassifier::new(3, 0, 1, 0, 4);
        forest.train(&x, &y).unwrap();
        assert_eq!(forest.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_rejects_bad_input() {
        let (x, y) = quadrants();
        let mut forest = RandomForestClassifier::new(0, 4, 1, 0, 4);
        assert!(forest.train(&x, &y).is_err());

        let mut forest = RandomForestClassifier::new(5, 4, 1, 0, 2);
        assert!(forest.train(&x, &y).is_err());

        let untrained = RandomForestClassifier::new(5, 4, 1, 0, 4);
        assert!(untrained.predict(&x).is_err());
    }

    #[test]
    fn test_save_load_round_trip() {
        let (x, y) = quadrants();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rf.json");

        let mut forest = RandomForestClassifier::new(8, 6, 1, 3, 4);
        forest.train(&x, &y).unwrap();
        forest.save(&path).unwrap();

        let mut restored = RandomForestClassifier::new(1, 1, 1, 0, 4);
        restored.load(&path).unwrap();
        assert_eq!(restored.predict(&x).unwrap(), forest.predict(&x).unwrap());

        let untrained_path = dir.path().join("untrained.json");
        RandomForestClassifier::new(8, 6, 1, 3, 4)
            .save(&untrained_path)
            .unwrap();
        restored.load(&untrained_path).unwrap();
        assert!(restored.predict(&x).is_err());
    }
}

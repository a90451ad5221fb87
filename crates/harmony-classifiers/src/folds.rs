//! Seeded K-fold partitioning of sample indices.
//!
//! The assignment depends only on the number of samples, the number of
//! folds and the seed: `0..n` is shuffled with a seeded RNG and the element
//! at shuffled position `i` lands in fold `i % k`. Fold sizes therefore
//! differ by at most one.
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::StackingError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldAssignment {
    folds: Vec<Vec<usize>>,
    fold_of: Vec<usize>,
}

impl FoldAssignment {
    /// Partition `0..n_samples` into `n_folds` groups.
    ///
    /// # Arguments
    ///
    /// * `n_samples` - Number of rows to partition
    /// * `n_folds` - Number of folds, must satisfy `2 <= n_folds <= n_samples`
    /// * `seed` - Seed for the shuffle
    ///
    /// # Returns
    ///
    /// The fold assignment, or `InvalidConfiguration` when the fold count is out of range
    pub fn new(n_samples: usize, n_folds: usize, seed: u64) -> Result<Self, StackingError> {
        if n_folds < 2 {
            return Err(StackingError::InvalidConfiguration(format!(
                "number of folds must be at least 2, got {}",
                n_folds
            )));
        }
        if n_folds > n_samples {
            return Err(StackingError::InvalidConfiguration(format!(
                "number of folds ({}) exceeds number of samples ({})",
                n_folds, n_samples
            )));
        }

        let mut order: Vec<usize> = (0..n_samples).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        order.shuffle(&mut rng);

        let mut folds = vec![Vec::with_capacity(n_samples / n_folds + 1); n_folds];
        let mut fold_of = vec![0; n_samples];
        for (position, &sample) in order.iter().enumerate() {
            let fold = position % n_folds;
            folds[fold].push(sample);
            fold_of[sample] = fold;
        }
        for fold in folds.iter_mut() {
            fold.sort_unstable();
        }

        log::trace!(
            "Partitioned {} samples into {} folds (sizes {:?})",
            n_samples,
            n_folds,
            folds.iter().map(|f| f.len()).collect::<Vec<_>>()
        );

        Ok(Self { folds, fold_of })
    }

    pub fn n_folds(&self) -> usize {
        self.folds.len()
    }

    pub fn n_samples(&self) -> usize {
        self.fold_of.len()
    }

    /// Held-out indices of fold `k`, ascending.
    pub fn fold(&self, k: usize) -> &[usize] {
        &self.folds[k]
    }

    pub fn fold_of(&self, sample: usize) -> usize {
        self.fold_of[sample]
    }

    /// Indices of every fold except `k`, ascending.
    pub fn train_indices(&self, k: usize) -> Vec<usize> {
        (0..self.n_samples())
            .filter(|&i| self.fold_of[i] != k)
            .collect()
    }

    /// Iterate `(train_indices, test_indices)` pairs in fold order.
    pub fn iter(&self) -> impl Iterator<Item = (Vec<usize>, &[usize])> + '_ {
        (0..self.n_folds()).map(move |k| (self.train_indices(k), self.fold(k)))
    }
}

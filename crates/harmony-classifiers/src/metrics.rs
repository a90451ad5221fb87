//! Evaluation helpers.
use anyhow::{bail, Result};

/// Percentage of positions where `y_pred` equals `y_true`.
///
/// Returns 0.0 for empty inputs.
pub fn accuracy(y_true: &[i32], y_pred: &[i32]) -> Result<f64> {
    if y_true.len() != y_pred.len() {
        bail!(
            "Cannot compute accuracy: {} true labels but {} predictions",
            y_true.len(),
            y_pred.len()
        );
    }
    if y_true.is_empty() {
        return Ok(0.0);
    }
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    Ok(correct as f64 / y_true.len() as f64 * 100.0)
}

/// Counts indexed `[true][predicted]`.
///
/// Pairs with a label outside `[0, n_classes)` are not counted.
pub fn confusion_matrix(y_true: &[i32], y_pred: &[i32], n_classes: usize) -> Result<Vec<Vec<usize>>> {
    if y_true.len() != y_pred.len() {
        bail!(
            "Cannot build confusion matrix: {} true labels but {} predictions",
            y_true.len(),
            y_pred.len()
        );
    }
    let mut matrix = vec![vec![0usize; n_classes]; n_classes];
    for (&t, &p) in y_true.iter().zip(y_pred) {
        match (usize::try_from(t), usize::try_from(p)) {
            (Ok(t), Ok(p)) if t < n_classes && p < n_classes => matrix[t][p] += 1,
            _ => log::trace!("Ignoring out-of-range pair (true {}, predicted {})", t, p),
        }
    }
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accuracy() {
        assert_eq!(accuracy(&[0, 1, 2, 3], &[0, 1, 0, 3]).unwrap(), 75.0);
        assert_eq!(accuracy(&[], &[]).unwrap(), 0.0);
        assert!(accuracy(&[0], &[]).is_err());
    }

    #[test]
    fn test_confusion_matrix() {
        let m = confusion_matrix(&[0, 0, 1, 2, 2], &[0, 1, 1, 2, 9], 3).unwrap();
        assert_eq!(m, vec![vec![1, 1, 0], vec![0, 1, 0], vec![0, 0, 1]]);
    }
}

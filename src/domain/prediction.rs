use serde::Serialize;

use crate::error::{LedgerError, Result};

/// Classifier output for a single image
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// Index of the largest probability
    pub label: usize,
    /// The largest probability
    pub confidence: f32,
    pub probabilities: Vec<f32>,
}

impl Prediction {
    /// Derive label and confidence from a probability vector.
    ///
    /// Ties resolve to the lowest index. Empty vectors and entries that are not
    /// finite values in `[0, 1]` are rejected.
    pub fn from_probabilities(probabilities: Vec<f32>) -> Result<Self> {
        if probabilities.is_empty() {
            return Err(LedgerError::Model(
                "model produced an empty probability vector".to_string(),
            ));
        }
        if probabilities.iter().any(|p| !p.is_finite()) {
            return Err(LedgerError::Model(
                "model produced non-finite probabilities".to_string(),
            ));
        }
        if let Some(p) = probabilities.iter().find(|p| !(0.0..=1.0).contains(*p)) {
            return Err(LedgerError::Model(format!(
                "model produced probability {p} outside [0, 1]"
            )));
        }

        let (label, confidence) = argmax(&probabilities);
        Ok(Self {
            label,
            confidence,
            probabilities,
        })
    }

    pub fn label_i32(&self) -> i32 {
        self.label as i32
    }
}

/// Index and value of the first maximum
pub fn argmax(values: &[f32]) -> (usize, f32) {
    let mut best = 0;
    for (idx, value) in values.iter().enumerate().skip(1) {
        if *value > values[best] {
            best = idx;
        }
    }
    (best, values[best])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_is_index_of_max() {
        let p = Prediction::from_probabilities(vec![0.01, 0.02, 0.05, 0.02, 0.0, 0.0, 0.0, 0.85, 0.03, 0.02])
            .unwrap();
        assert_eq!(p.label, 7);
        assert!((p.confidence - 0.85).abs() < f32::EPSILON);
    }

    #[test]
    fn ties_resolve_to_first_index() {
        let p = Prediction::from_probabilities(vec![0.25, 0.5, 0.5, 0.25]).unwrap();
        assert_eq!(p.label, 1);
    }

    #[test]
    fn rejects_degenerate_vectors() {
        assert!(Prediction::from_probabilities(vec![]).is_err());
        assert!(Prediction::from_probabilities(vec![0.1, f32::NAN]).is_err());

        // raw logits from a linear head
        let err = Prediction::from_probabilities((0..10).map(|k| k as f32).collect()).unwrap_err();
        assert!(matches!(err, LedgerError::Model(_)));
        assert!(Prediction::from_probabilities(vec![-0.1, 0.6, 0.5]).is_err());
        assert!(Prediction::from_probabilities(vec![0.0, 1.0]).is_ok());
    }
}

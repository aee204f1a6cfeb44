use std::cmp::Ordering;
use std::sync::Arc;

use thiserror::Error;

use crate::core::prediction::PredictionCell;
use crate::core::types::DIFFERENT;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifierError {
    #[error("Classifier has no labels")]
    EmptyVocabulary,

    #[error("Empty sequence")]
    EmptySequence,

    #[error("Classifier failed: {0}")]
    Failed(String),
}

/// A trained classifier over k-merized reads.
///
/// Implementations are pure: the same sequence always gives the same output,
/// and calls may run concurrently.
pub trait Classifier: Send + Sync {
    /// Label vocabulary
    fn labels(&self) -> &[String];

    /// Scores for every label, sorted by [`sort_distribution`]
    ///
    /// # Errors
    ///
    /// Returns a `ClassifierError` when the sequence cannot be scored.
    fn predict_distribution(&self, sequence: &str) -> Result<Vec<PredictionCell>, ClassifierError>;

    /// Top-1 call
    ///
    /// # Errors
    ///
    /// Returns a `ClassifierError` when the sequence cannot be scored.
    fn predict(&self, sequence: &str) -> Result<PredictionCell, ClassifierError> {
        self.predict_distribution(sequence)?
            .into_iter()
            .next()
            .ok_or(ClassifierError::EmptyVocabulary)
    }
}

/// Score descending, ties by label ascending
pub fn sort_distribution(cells: &mut [PredictionCell]) {
    cells.sort_by(compare_cells);
}

/// Ordering used by [`sort_distribution`]: better cells compare as `Less`
#[must_use]
pub fn compare_cells(a: &PredictionCell, b: &PredictionCell) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.label.cmp(&b.label))
}

/// A loaded classifier and the key it was registered under
#[derive(Clone)]
pub struct ClassifierHandle {
    key: String,
    model: Arc<dyn Classifier>,
}

impl ClassifierHandle {
    pub fn new(key: impl Into<String>, model: Arc<dyn Classifier>) -> Self {
        Self {
            key: key.into(),
            model,
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn labels(&self) -> &[String] {
        self.model.labels()
    }

    /// One-vs-rest classifiers carry the `different` label
    #[must_use]
    pub fn is_binary(&self) -> bool {
        self.labels().iter().any(|label| label == DIFFERENT)
    }

    /// # Errors
    ///
    /// Propagates the classifier's error.
    pub fn predict(&self, sequence: &str) -> Result<PredictionCell, ClassifierError> {
        self.model.predict(sequence)
    }

    /// # Errors
    ///
    /// Propagates the classifier's error.
    pub fn predict_distribution(&self, sequence: &str) -> Result<Vec<PredictionCell>, ClassifierError> {
        self.model.predict_distribution(sequence)
    }
}

impl std::fmt::Debug for ClassifierHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierHandle")
            .field("key", &self.key)
            .field("labels", &self.labels().len())
            .finish_non_exhaustive()
    }
}

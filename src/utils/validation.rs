//! Centralized validation and helper functions.

use crate::core::types::Rank;

/// Maximum number of reads accepted in a single batch (DOS protection)
pub const MAX_READS: usize = 50_000_000;

/// Artifact keys become file names, so they share the file name limit
pub const MAX_KEY_LENGTH: usize = 255;

/// Prefix fastText-style classifiers put in front of every label
pub const LABEL_PREFIX: &str = "__label__";

/// Validation error types
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Artifact key too long: exceeds {MAX_KEY_LENGTH} characters")]
    KeyTooLong,
    #[error("Invalid artifact key: contains path traversal or invalid characters")]
    InvalidKey,
    #[error("Empty artifact key provided")]
    EmptyKey,
    #[error("Score {0} is not a probability in [0, 1]")]
    InvalidScore(String),
}

/// Turn a taxon or rank name into the key its classifier is stored under.
///
/// # Examples
///
/// ```
/// use taxa_cascade::utils::validation::artifact_key;
///
/// assert_eq!(artifact_key("Escherichia coli"), "Escherichia_coli");
/// assert_eq!(artifact_key(" phylum "), "phylum");
/// ```
#[must_use]
pub fn artifact_key(name: &str) -> String {
    name.trim().replace(' ', "_")
}

/// Turn a classifier label into the taxon name used by the taxonomy.
///
/// Strips the `__label__` prefix and maps underscores back to spaces.
///
/// # Examples
///
/// ```
/// use taxa_cascade::utils::validation::canonical_taxon;
///
/// assert_eq!(canonical_taxon("__label__Escherichia_coli"), "Escherichia coli");
/// assert_eq!(canonical_taxon("different"), "different");
/// ```
#[must_use]
pub fn canonical_taxon(label: &str) -> String {
    let label = label.trim();
    label
        .strip_prefix(LABEL_PREFIX)
        .unwrap_or(label)
        .replace('_', " ")
}

/// Validate an artifact key before it is turned into a path
///
/// Rejects keys that could escape the store directory:
/// - Empty or whitespace-only keys
/// - Keys longer than [`MAX_KEY_LENGTH`]
/// - Directory traversal (`..`, `/`, `\`)
/// - Null bytes and control characters
///
/// # Errors
///
/// Returns `ValidationError::EmptyKey`, `ValidationError::KeyTooLong` or
/// `ValidationError::InvalidKey`.
pub fn validate_key(key: &str) -> Result<(), ValidationError> {
    if key.trim().is_empty() {
        return Err(ValidationError::EmptyKey);
    }

    if key.len() > MAX_KEY_LENGTH {
        return Err(ValidationError::KeyTooLong);
    }

    if key.contains("..") || key.contains('/') || key.contains('\\') {
        return Err(ValidationError::InvalidKey);
    }

    if key.chars().any(char::is_control) {
        return Err(ValidationError::InvalidKey);
    }

    Ok(())
}

/// Check that a classifier score is a finite probability
///
/// # Errors
///
/// Returns `ValidationError::InvalidScore` for NaN, infinite, negative or > 1 scores.
pub fn validate_score(score: f64) -> Result<f64, ValidationError> {
    if score.is_finite() && (0.0..=1.0).contains(&score) {
        Ok(score)
    } else {
        Err(ValidationError::InvalidScore(score.to_string()))
    }
}

/// Check if adding another read would exceed the maximum allowed.
///
/// Call this with the current count BEFORE adding a new read.
/// Returns an error message if adding would exceed the limit, None if safe to add.
#[must_use]
pub fn check_read_limit(count: usize) -> Option<String> {
    if count >= MAX_READS {
        Some(format!(
            "Too many reads: adding another would exceed maximum of {MAX_READS}"
        ))
    } else {
        None
    }
}

/// Normalise a taxon name before comparing predictions against a truth set.
///
/// Underscores become spaces; species keep their first two words (binomial),
/// every other rank its first word.
#[must_use]
pub fn normalize_for_comparison(name: &str, rank: Rank) -> String {
    let words = canonical_taxon(name);
    let keep = if rank == Rank::Species { 2 } else { 1 };
    words
        .split_whitespace()
        .take(keep)
        .collect::<Vec<_>>()
        .join(" ")
}

//! Bag-of-k-mers linear classifier stored as JSON.
//!
//! ```json
//! {
//!   "labels": ["__label__Escherichia_coli", "different"],
//!   "bias": [0.0, 0.1],
//!   "weights": { "AACGT": [1.2, -0.4] }
//! }
//! ```
//!
//! A read scores `bias + Σ weights[kmer]` per label over its whitespace-separated
//! k-mers; unknown k-mers contribute nothing. Scores are the softmax of those
//! logits. Labels are stored canonically (`__label__` stripped, `_` → space).

use std::collections::HashMap;
use std::io::Read;

use flate2::read::MultiGzDecoder;
use serde::{Deserialize, Serialize};

use super::classifier::{sort_distribution, Classifier, ClassifierError};
use crate::core::prediction::PredictionCell;
use crate::utils::validation::canonical_taxon;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KmerModel {
    pub labels: Vec<String>,
    #[serde(default)]
    pub bias: Vec<f64>,
    #[serde(default)]
    pub weights: HashMap<String, Vec<f64>>,
}

impl KmerModel {
    /// Decode a model blob (JSON, optionally gzip-compressed) and validate it
    ///
    /// # Errors
    ///
    /// Returns a description of the first problem found.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, String> {
        let model: Self = if bytes.starts_with(&GZIP_MAGIC) {
            let mut json = Vec::new();
            MultiGzDecoder::new(bytes)
                .read_to_end(&mut json)
                .map_err(|e| format!("gzip: {e}"))?;
            serde_json::from_slice(&json).map_err(|e| e.to_string())?
        } else {
            serde_json::from_slice(bytes).map_err(|e| e.to_string())?
        };
        model.validated()
    }

    /// Check dimensions, fill a missing bias with zeros and canonicalise labels
    ///
    /// # Errors
    ///
    /// Returns a description of the first problem found.
    pub fn validated(mut self) -> Result<Self, String> {
        let width = self.labels.len();
        if width == 0 {
            return Err("model has no labels".to_string());
        }
        if self.bias.is_empty() {
            self.bias = vec![0.0; width];
        }
        if self.bias.len() != width {
            return Err(format!(
                "bias has {} entries for {width} labels",
                self.bias.len()
            ));
        }
        if let Some((kmer, w)) = self.weights.iter().find(|(_, w)| w.len() != width) {
            return Err(format!(
                "k-mer '{kmer}' has {} weights for {width} labels",
                w.len()
            ));
        }
        let all_finite = self.bias.iter().chain(self.weights.values().flatten()).all(|v| v.is_finite());
        if !all_finite {
            return Err("model contains non-finite weights".to_string());
        }

        self.labels = self.labels.iter().map(|l| canonical_taxon(l)).collect();
        Ok(self)
    }

    fn logits(&self, sequence: &str) -> Vec<f64> {
        let mut logits = self.bias.clone();
        for kmer in sequence.split_whitespace() {
            if let Some(weights) = self.weights.get(kmer) {
                for (logit, w) in logits.iter_mut().zip(weights) {
                    *logit += w;
                }
            }
        }
        logits
    }
}

/// Numerically stable softmax
fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

impl Classifier for KmerModel {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn predict_distribution(&self, sequence: &str) -> Result<Vec<PredictionCell>, ClassifierError> {
        if self.labels.is_empty() {
            return Err(ClassifierError::EmptyVocabulary);
        }
        if sequence.trim().is_empty() {
            return Err(ClassifierError::EmptySequence);
        }

        let scores = softmax(&self.logits(sequence));
        let mut cells: Vec<PredictionCell> = self
            .labels
            .iter()
            .zip(scores)
            .map(|(label, score)| PredictionCell::new(label.clone(), score))
            .collect();
        sort_distribution(&mut cells);
        Ok(cells)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn model() -> KmerModel {
        KmerModel::from_slice(
            br#"{
                "labels": ["__label__Escherichia_coli", "__label__Salmonella_enterica"],
                "weights": { "AAAA": [2.0, 0.0], "CCCC": [0.0, 2.0] }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_labels_are_canonical() {
        assert_eq!(model().labels, vec!["Escherichia coli", "Salmonella enterica"]);
    }

    #[test]
    fn test_predict() {
        let m = model();
        let call = m.predict("AAAA AAAA GGGG").unwrap();
        assert_eq!(call.label, "Escherichia coli");
        assert!(call.score > 0.98);

        let dist = m.predict_distribution("CCCC").unwrap();
        assert_eq!(dist[0].label, "Salmonella enterica");
        let total: f64 = dist.iter().map(|c| c.score).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_kmers_tie_by_label() {
        let dist = model().predict_distribution("TTTT").unwrap();
        assert_eq!(dist[0].label, "Escherichia coli");
        assert!((dist[0].score - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_empty_sequence_is_an_error() {
        assert_eq!(model().predict("  "), Err(ClassifierError::EmptySequence));
    }

    #[test]
    fn test_rejects_bad_dimensions() {
        let err = KmerModel::from_slice(br#"{"labels": ["a", "b"], "bias": [1.0]}"#).unwrap_err();
        assert!(err.contains("bias"));

        let err = KmerModel::from_slice(br#"{"labels": ["a"], "weights": {"AC": [1.0, 2.0]}}"#)
            .unwrap_err();
        assert!(err.contains("AC"));

        assert!(KmerModel::from_slice(br#"{"labels": []}"#).is_err());
        assert!(KmerModel::from_slice(br#"{"labels": ["a"], "extra": 1}"#).is_err());
    }

    #[test]
    fn test_gzip_blob() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(br#"{"labels": ["a", "b"]}"#).unwrap();
        let blob = encoder.finish().unwrap();

        let m = KmerModel::from_slice(&blob).unwrap();
        assert_eq!(m.bias, vec![0.0, 0.0]);
    }
}

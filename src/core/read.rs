use serde::{Deserialize, Serialize};

/// A single k-merized read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadRecord {
    /// Position in the input, assigned once when the batch is read
    pub index: usize,

    /// Read identifier (first column of the input, or `read_<n>`)
    pub id: String,

    /// Whitespace-joined k-mers
    pub sequence: String,
}

impl ReadRecord {
    pub fn new(index: usize, id: impl Into<String>, sequence: impl Into<String>) -> Self {
        Self {
            index,
            id: id.into(),
            sequence: sequence.into(),
        }
    }
}

/// An ordered batch of reads plus the number of input records that were rejected
#[derive(Debug, Clone, Default)]
pub struct ReadBatch {
    pub reads: Vec<ReadRecord>,
    pub skipped: usize,
}

impl ReadBatch {
    /// Build a batch from raw sequences, assigning indexes in order
    #[must_use]
    pub fn from_sequences<S: AsRef<str>>(sequences: &[S]) -> Self {
        let reads = sequences
            .iter()
            .enumerate()
            .map(|(i, seq)| ReadRecord::new(i, format!("read_{i}"), seq.as_ref()))
            .collect();
        Self { reads, skipped: 0 }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.reads.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reads.is_empty()
    }

    /// Read identifiers in input order
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.reads.iter().map(|r| r.id.clone()).collect()
    }
}

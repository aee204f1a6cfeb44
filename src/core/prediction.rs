use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::read::ReadRecord;
use crate::core::types::{is_control_label, Rank, NOT_APPLICABLE, NOT_AVAILABLE, RANK_COUNT};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MatrixError {
    #[error("Read index {0} is not part of this matrix")]
    UnknownIndex(usize),

    #[error("Read index {index} appears twice in the {rank} column")]
    DuplicateIndex { index: usize, rank: Rank },
}

/// A classifier output: label and its score in [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionCell {
    pub label: String,
    pub score: f64,
}

impl PredictionCell {
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// State of one (read, rank) slot
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RankCell {
    /// A classifier ran and returned this call
    Call(PredictionCell),
    /// An ancestor call stopped the cascade before this rank
    NotReached,
    /// No classifier was available, or it failed for this read
    #[default]
    Missing,
}

impl RankCell {
    pub fn call(label: impl Into<String>, score: f64) -> Self {
        Self::Call(PredictionCell::new(label, score))
    }

    #[must_use]
    pub fn prediction(&self) -> Option<&PredictionCell> {
        match self {
            Self::Call(cell) => Some(cell),
            Self::NotReached | Self::Missing => None,
        }
    }

    /// The label a cascade may route on, if any.
    ///
    /// Control labels (`different`, `na`, `NA`) never route.
    #[must_use]
    pub fn routable_label(&self) -> Option<&str> {
        self.prediction()
            .map(|p| p.label.as_str())
            .filter(|label| !is_control_label(label))
    }

    /// Text form used in matrix dumps
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Call(cell) => format!("{},{}", cell.label, cell.score),
            Self::NotReached => NOT_APPLICABLE.to_string(),
            Self::Missing => NOT_AVAILABLE.to_string(),
        }
    }
}

/// A read travelling through a cascade, tagged with the call that routes it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedRead {
    pub label: String,
    pub index: usize,
}

/// A cell computed for one read, waiting to be merged back in input order
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedPrediction {
    pub index: usize,
    pub cell: RankCell,
}

impl RoutedPrediction {
    #[must_use]
    pub fn new(index: usize, cell: RankCell) -> Self {
        Self { index, cell }
    }
}

/// A species-level call for one read from a specialized caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesCall {
    pub read_id: String,
    pub species: String,
    pub score: f64,
}

impl SpeciesCall {
    pub fn new(read_id: impl Into<String>, species: impl Into<String>, score: f64) -> Self {
        Self {
            read_id: read_id.into(),
            species: species.into(),
            score,
        }
    }

    /// A call carrying no species
    pub fn unavailable(read_id: impl Into<String>, score: f64) -> Self {
        Self::new(read_id, NOT_AVAILABLE, score)
    }
}

/// All rank cells for one read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixRow {
    pub index: usize,
    cells: [RankCell; RANK_COUNT],
}

impl MatrixRow {
    fn new(index: usize) -> Self {
        Self {
            index,
            cells: std::array::from_fn(|_| RankCell::Missing),
        }
    }

    #[must_use]
    pub fn cell(&self, rank: Rank) -> &RankCell {
        &self.cells[rank.index()]
    }

    /// Cells ordered species to phylum
    pub fn cells(&self) -> impl Iterator<Item = (Rank, &RankCell)> {
        Rank::ALL.into_iter().zip(self.cells.iter())
    }
}

/// Rank-indexed predictions for a batch, rows ascending by original index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionMatrix {
    rows: Vec<MatrixRow>,
}

impl PredictionMatrix {
    /// Create an empty matrix with one row per index
    pub fn new(indexes: impl IntoIterator<Item = usize>) -> Self {
        let mut rows: Vec<MatrixRow> = indexes.into_iter().map(MatrixRow::new).collect();
        rows.sort_by_key(|row| row.index);
        rows.dedup_by_key(|row| row.index);
        Self { rows }
    }

    #[must_use]
    pub fn for_reads(reads: &[ReadRecord]) -> Self {
        Self::new(reads.iter().map(|r| r.index))
    }

    /// Merge one rank's cells back in original order.
    ///
    /// Entries may arrive in any order (e.g. grouped by routing label); they are
    /// stably sorted by index before being written. Rows without an entry keep
    /// their current cell.
    ///
    /// # Errors
    ///
    /// Returns `MatrixError::UnknownIndex` if an entry names a read outside the
    /// matrix, or `MatrixError::DuplicateIndex` if a read appears twice.
    pub fn merge_column(
        &mut self,
        rank: Rank,
        mut entries: Vec<RoutedPrediction>,
    ) -> Result<(), MatrixError> {
        entries.sort_by_key(|entry| entry.index);

        let mut rows = self.rows.iter_mut().peekable();
        let mut previous: Option<usize> = None;
        for entry in entries {
            if previous == Some(entry.index) {
                return Err(MatrixError::DuplicateIndex {
                    index: entry.index,
                    rank,
                });
            }
            previous = Some(entry.index);

            // Both sides ascend, so skip rows until the entry's index is reached
            while rows.peek().is_some_and(|row| row.index < entry.index) {
                rows.next();
            }
            match rows.next() {
                Some(row) if row.index == entry.index => row.cells[rank.index()] = entry.cell,
                _ => return Err(MatrixError::UnknownIndex(entry.index)),
            }
        }
        Ok(())
    }

    /// Set every cell of a column
    pub fn fill_column(&mut self, rank: Rank, cell: &RankCell) {
        for row in &mut self.rows {
            row.cells[rank.index()] = cell.clone();
        }
    }

    #[must_use]
    pub fn row(&self, index: usize) -> Option<&MatrixRow> {
        self.rows
            .binary_search_by_key(&index, |row| row.index)
            .ok()
            .map(|pos| &self.rows[pos])
    }

    #[must_use]
    pub fn cell(&self, index: usize, rank: Rank) -> Option<&RankCell> {
        self.row(index).map(|row| row.cell(rank))
    }

    /// Rows in ascending original index
    #[must_use]
    pub fn rows(&self) -> &[MatrixRow] {
        &self.rows
    }

    /// Original indexes in ascending order
    pub fn indexes(&self) -> impl Iterator<Item = usize> + '_ {
        self.rows.iter().map(|row| row.index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

use std::collections::HashMap;

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::prediction::{MatrixError, PredictionMatrix, RankCell, RoutedPrediction};
use crate::core::read::ReadRecord;
use crate::core::types::{Rank, Topology};
use crate::registry::{ClassifierHandle, ClassifierRegistry, RegistryError};
use crate::taxonomy::TaxonomyHierarchy;

/// Minimum score a specialized species call must reach to be kept
pub const DEFAULT_MIN_SCORE: f64 = 0.5;

#[derive(Error, Debug)]
pub enum CascadeError {
    #[error(transparent)]
    Matrix(#[from] MatrixError),

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Read index {0} appears more than once in the batch")]
    DuplicateRead(usize),
}

/// The reads of one run, addressable by original index
pub(super) struct Batch<'r> {
    pub indexes: Vec<usize>,
    pub sequences: HashMap<usize, &'r str>,
}

impl<'r> Batch<'r> {
    pub fn new(reads: &'r [ReadRecord]) -> Result<Self, CascadeError> {
        let mut sequences = HashMap::with_capacity(reads.len());
        for read in reads {
            if sequences.insert(read.index, read.sequence.as_str()).is_some() {
                return Err(CascadeError::DuplicateRead(read.index));
            }
        }
        let mut indexes: Vec<usize> = sequences.keys().copied().collect();
        indexes.sort_unstable();
        Ok(Self { indexes, sequences })
    }

    pub fn matrix(&self) -> PredictionMatrix {
        PredictionMatrix::new(self.indexes.iter().copied())
    }
}

/// Runs inference topologies over a batch of reads
pub struct CascadeEngine<'a> {
    pub(super) hierarchy: &'a TaxonomyHierarchy,
    pub(super) registry: &'a ClassifierRegistry,
    pool: Option<rayon::ThreadPool>,
    pub(super) min_score: f64,
}

impl<'a> CascadeEngine<'a> {
    #[must_use]
    pub fn new(hierarchy: &'a TaxonomyHierarchy, registry: &'a ClassifierRegistry) -> Self {
        Self {
            hierarchy,
            registry,
            pool: None,
            min_score: DEFAULT_MIN_SCORE,
        }
    }

    /// Run on a dedicated pool of `threads` workers instead of the global pool
    ///
    /// # Errors
    ///
    /// Returns `CascadeError::ThreadPool` if the pool cannot be created.
    pub fn with_threads(mut self, threads: usize) -> Result<Self, CascadeError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()?;
        self.pool = Some(pool);
        Ok(self)
    }

    /// Minimum score for coarse-guided species refinement
    #[must_use]
    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }

    #[must_use]
    pub fn hierarchy(&self) -> &TaxonomyHierarchy {
        self.hierarchy
    }

    /// Run `topology` over `reads`.
    ///
    /// The matrix has one row per read, ascending by original index, whatever
    /// grouping happened in between.
    ///
    /// # Errors
    ///
    /// Returns `CascadeError::DuplicateRead` if two reads share an index.
    /// Missing classifiers and per-read classifier failures are not errors;
    /// they show up as missing cells.
    pub fn run(
        &self,
        reads: &[ReadRecord],
        topology: Topology,
    ) -> Result<PredictionMatrix, CascadeError> {
        let batch = Batch::new(reads)?;
        info!(reads = batch.indexes.len(), %topology, "Running cascade");

        self.install(|| match topology {
            Topology::Lcl => self.run_lcl(&batch),
            Topology::Lcpn => self.run_lcpn(&batch),
            Topology::LclLcpn => self.run_hybrid(&batch),
            Topology::HierarchicalLcl => self.run_hierarchical(&batch),
        })
    }

    pub(super) fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }

    /// Classifier for a taxon or rank, `None` when the branch has none
    pub(super) fn classifier(&self, name: &str) -> Option<ClassifierHandle> {
        match self.registry.load(name) {
            Ok(handle) => Some(handle),
            Err(RegistryError::NotFound(key)) => {
                debug!(key = %key, "No classifier, branch left unpredicted");
                None
            }
            Err(err) => {
                warn!(name, error = %err, "Classifier unavailable");
                None
            }
        }
    }

    /// Top-1 call for every read in `indexes`, in the same order.
    ///
    /// A read the classifier fails on gets a missing cell.
    pub(super) fn predict_bucket(
        &self,
        handle: &ClassifierHandle,
        indexes: &[usize],
        batch: &Batch<'_>,
    ) -> Vec<RoutedPrediction> {
        let predictions: Vec<RoutedPrediction> = indexes
            .par_iter()
            .map(|&index| {
                let cell = match batch.sequences.get(&index) {
                    Some(sequence) => match handle.predict(sequence) {
                        Ok(call) => RankCell::Call(call),
                        Err(err) => {
                            debug!(index, key = handle.key(), error = %err, "Prediction failed");
                            RankCell::Missing
                        }
                    },
                    None => RankCell::Missing,
                };
                RoutedPrediction::new(index, cell)
            })
            .collect();

        let failed = predictions
            .iter()
            .filter(|p| p.cell == RankCell::Missing)
            .count();
        if failed > 0 {
            warn!(key = handle.key(), failed, "Classifier failed on some reads");
        }
        predictions
    }

    /// Fill `ranks` from their rank-level classifiers, each read independently
    pub(super) fn predict_ranks(
        &self,
        matrix: &mut PredictionMatrix,
        batch: &Batch<'_>,
        ranks: &[Rank],
    ) -> Result<(), CascadeError> {
        for &rank in ranks {
            let Some(handle) = self.classifier(rank.as_str()) else {
                matrix.fill_column(rank, &RankCell::Missing);
                continue;
            };
            debug!(%rank, reads = batch.indexes.len(), "Predicting rank");
            let entries = self.predict_bucket(&handle, &batch.indexes, batch);
            matrix.merge_column(rank, entries)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for CascadeEngine<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CascadeEngine")
            .field("taxa", &self.hierarchy.len())
            .field("threads", &self.pool.as_ref().map(rayon::ThreadPool::current_num_threads))
            .field("min_score", &self.min_score)
            .finish_non_exhaustive()
    }
}

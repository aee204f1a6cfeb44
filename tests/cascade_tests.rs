//! End-to-end tests of the cascade topologies, threshold scan and ensembles
//! with in-memory classifiers over a small four-species taxonomy.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use taxa_cascade::core::lineage::ReadLineage;
use taxa_cascade::registry::classifier::{sort_distribution, ClassifierError};
use taxa_cascade::taxonomy::TsvTaxonomy;
use taxa_cascade::{
    CascadeEngine, Classifier, ClassifierRegistry, EnsembleCombiner, PredictionCell,
    PredictionMatrix, Rank, RankCell, ReadRecord, TaxonomyHierarchy, ThresholdEvaluator, Topology,
};

const TAXONOMY: &str = "taxon\tspecies\tgenus\tfamily\torder\tclass\tphylum
Escherichia coli\tEscherichia coli\tEscherichia\tEnterobacteriaceae\tEnterobacterales\tGammaproteobacteria\tPseudomonadota
Salmonella enterica\tSalmonella enterica\tSalmonella\tEnterobacteriaceae\tEnterobacterales\tGammaproteobacteria\tPseudomonadota
Bacillus subtilis\tBacillus subtilis\tBacillus\tBacillaceae\tBacillales\tBacilli\tBacillota
Bacillus cereus\tBacillus cereus\tBacillus\tBacillaceae\tBacillales\tBacilli\tBacillota
";

/// Classifier answering from a fixed table keyed by sequence; unknown
/// sequences fail. Every sequence it is asked about is recorded.
struct TableClassifier {
    labels: Vec<String>,
    rows: HashMap<String, Vec<(String, f64)>>,
    seen: Mutex<Vec<String>>,
}

impl TableClassifier {
    fn new(rows: Vec<(&str, Vec<(&str, f64)>)>) -> Arc<Self> {
        let mut labels: Vec<String> = rows
            .iter()
            .flat_map(|(_, cells)| cells.iter().map(|(label, _)| (*label).to_string()))
            .collect();
        labels.sort();
        labels.dedup();

        let rows = rows
            .into_iter()
            .map(|(sequence, cells)| {
                let cells = cells
                    .into_iter()
                    .map(|(label, score)| (label.to_string(), score))
                    .collect();
                (sequence.to_string(), cells)
            })
            .collect();

        Arc::new(Self {
            labels,
            rows,
            seen: Mutex::new(Vec::new()),
        })
    }

    /// Top-1 classifier: one `(sequence, label, score)` per read
    fn calls(calls: &[(&str, &str, f64)]) -> Arc<Self> {
        Self::new(
            calls
                .iter()
                .map(|(sequence, label, score)| (*sequence, vec![(*label, *score)]))
                .collect(),
        )
    }

    fn saw(&self, sequence: &str) -> bool {
        self.seen.lock().iter().any(|s| s == sequence)
    }
}

impl Classifier for TableClassifier {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn predict_distribution(&self, sequence: &str) -> Result<Vec<PredictionCell>, ClassifierError> {
        self.seen.lock().push(sequence.to_string());
        let row = self
            .rows
            .get(sequence)
            .ok_or_else(|| ClassifierError::Failed(format!("unknown sequence {sequence}")))?;
        let mut cells: Vec<PredictionCell> = row
            .iter()
            .map(|(label, score)| PredictionCell::new(label.clone(), *score))
            .collect();
        sort_distribution(&mut cells);
        Ok(cells)
    }
}

fn hierarchy() -> TaxonomyHierarchy {
    let db = TsvTaxonomy::from_reader(TAXONOMY.as_bytes()).unwrap();
    TaxonomyHierarchy::build(
        &[
            "Escherichia coli",
            "Salmonella enterica",
            "Bacillus subtilis",
            "Bacillus cereus",
        ],
        &db,
    )
}

/// Four reads given out of index order
fn reads() -> Vec<ReadRecord> {
    vec![
        ReadRecord::new(2, "r2", "GGG"),
        ReadRecord::new(0, "r0", "AAA"),
        ReadRecord::new(3, "r3", "TTT"),
        ReadRecord::new(1, "r1", "CCC"),
    ]
}

fn label(matrix: &PredictionMatrix, index: usize, rank: Rank) -> Option<String> {
    matrix
        .cell(index, rank)
        .and_then(RankCell::prediction)
        .map(|cell| cell.label.clone())
}

fn assert_rows_in_order(matrix: &PredictionMatrix, expected: usize) {
    assert_eq!(matrix.len(), expected);
    let indexes: Vec<usize> = matrix.indexes().collect();
    assert_eq!(indexes, (0..expected).collect::<Vec<_>>());
}

/// Registry for the per-node cascade
fn lcpn_registry() -> (ClassifierRegistry, Arc<TableClassifier>, Arc<TableClassifier>) {
    let registry = ClassifierRegistry::in_memory();

    registry.insert(
        "phylum",
        TableClassifier::calls(&[
            ("AAA", "Pseudomonadota", 0.9),
            ("CCC", "Bacillota", 0.8),
            ("GGG", "Pseudomonadota", 0.7),
            ("TTT", "different", 0.6),
        ]),
    );

    // Pseudomonadota has one class: binary against `different`
    let gamma_class = TableClassifier::calls(&[
        ("AAA", "Gammaproteobacteria", 0.95),
        ("GGG", "Gammaproteobacteria", 0.9),
    ]);
    let bacilli_class = TableClassifier::calls(&[("CCC", "Bacilli", 0.9)]);
    registry.insert("Pseudomonadota", gamma_class.clone());
    registry.insert("Bacillota", bacilli_class.clone());

    registry.insert(
        "Gammaproteobacteria",
        TableClassifier::calls(&[("AAA", "Enterobacterales", 0.9), ("GGG", "different", 0.8)]),
    );
    registry.insert("Bacilli", TableClassifier::calls(&[("CCC", "Bacillales", 0.85)]));
    registry.insert(
        "Enterobacterales",
        TableClassifier::calls(&[("AAA", "Enterobacteriaceae", 0.9)]),
    );
    registry.insert("Bacillales", TableClassifier::calls(&[("CCC", "Bacillaceae", 0.9)]));
    registry.insert(
        "Enterobacteriaceae",
        TableClassifier::calls(&[("AAA", "Escherichia", 0.91)]),
    );
    registry.insert("Bacillaceae", TableClassifier::calls(&[("CCC", "Bacillus", 0.9)]));
    registry.insert(
        "Escherichia",
        TableClassifier::calls(&[("AAA", "Escherichia coli", 0.52)]),
    );
    // No species classifier for Bacillus

    (registry, gamma_class, bacilli_class)
}

#[test]
fn test_lcpn_cascade() {
    let hierarchy = hierarchy();
    let (registry, gamma_class, bacilli_class) = lcpn_registry();
    let engine = CascadeEngine::new(&hierarchy, &registry);

    let matrix = engine.run(&reads(), Topology::Lcpn).unwrap();
    assert_rows_in_order(&matrix, 4);

    // Full path
    assert_eq!(label(&matrix, 0, Rank::Species).as_deref(), Some("Escherichia coli"));

    // Missing species classifier leaves the species cell missing
    assert_eq!(label(&matrix, 1, Rank::Genus).as_deref(), Some("Bacillus"));
    assert_eq!(matrix.cell(1, Rank::Species), Some(&RankCell::Missing));

    // `different` at order stops the cascade below it
    assert_eq!(label(&matrix, 2, Rank::Order).as_deref(), Some("different"));
    for rank in [Rank::Family, Rank::Genus, Rank::Species] {
        assert_eq!(matrix.cell(2, rank), Some(&RankCell::NotReached));
    }

    // `different` at phylum: nothing below is ever asked about the read
    for rank in [Rank::Class, Rank::Order, Rank::Family, Rank::Genus, Rank::Species] {
        assert_eq!(matrix.cell(3, rank), Some(&RankCell::NotReached));
    }
    assert!(!gamma_class.saw("TTT"));
    assert!(!bacilli_class.saw("TTT"));
    assert!(gamma_class.saw("AAA"));

    let calls = ThresholdEvaluator::new(0.5).evaluate(&matrix);
    let labels: Vec<&str> = calls.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(
        labels,
        vec!["Escherichia coli", "Bacillus", "Gammaproteobacteria", "unclassified"]
    );
}

#[test]
fn test_lcpn_without_root_classifier() {
    let hierarchy = hierarchy();
    let registry = ClassifierRegistry::in_memory();
    let engine = CascadeEngine::new(&hierarchy, &registry);

    let matrix = engine.run(&reads(), Topology::Lcpn).unwrap();
    assert_rows_in_order(&matrix, 4);
    assert_eq!(matrix.cell(0, Rank::Phylum), Some(&RankCell::Missing));
    assert!(ThresholdEvaluator::default()
        .evaluate(&matrix)
        .iter()
        .all(|c| !c.is_classified()));
}

#[test]
fn test_lcl_with_per_read_failure() {
    let hierarchy = hierarchy();
    let registry = ClassifierRegistry::in_memory();
    registry.insert(
        "phylum",
        // CCC is unknown to this classifier and fails
        TableClassifier::calls(&[
            ("AAA", "Pseudomonadota", 0.9),
            ("GGG", "Pseudomonadota", 0.4),
            ("TTT", "Bacillota", 0.8),
        ]),
    );
    registry.insert(
        "genus",
        TableClassifier::calls(&[
            ("AAA", "Escherichia", 0.91),
            ("CCC", "Bacillus", 0.7),
            ("GGG", "Salmonella", 0.3),
            ("TTT", "Bacillus", 0.2),
        ]),
    );
    registry.insert(
        "species",
        TableClassifier::calls(&[
            ("AAA", "Escherichia coli", 0.52),
            ("CCC", "Bacillus cereus", 0.4),
            ("GGG", "Salmonella enterica", 0.1),
            ("TTT", "Bacillus subtilis", 0.3),
        ]),
    );

    let engine = CascadeEngine::new(&hierarchy, &registry).with_threads(2).unwrap();
    let matrix = engine.run(&reads(), Topology::Lcl).unwrap();
    assert_rows_in_order(&matrix, 4);

    // Only the failing read's phylum cell is missing; its other ranks still run
    assert_eq!(matrix.cell(1, Rank::Phylum), Some(&RankCell::Missing));
    assert_eq!(label(&matrix, 1, Rank::Genus).as_deref(), Some("Bacillus"));
    // Ranks without a classifier are missing for everyone
    assert_eq!(matrix.cell(0, Rank::Family), Some(&RankCell::Missing));

    let calls = ThresholdEvaluator::new(0.5).evaluate(&matrix);
    assert_eq!(calls[0].label, "Escherichia coli");
    assert_eq!(calls[1].label, "Bacillus");
    assert_eq!(calls[1].rank, Some(Rank::Genus));
    assert_eq!(calls[2].label, "unclassified");
    assert_eq!(calls[3].label, "Bacillota");
}

#[test]
fn test_hybrid_routes_on_family_calls() {
    let hierarchy = hierarchy();
    let registry = ClassifierRegistry::in_memory();
    registry.insert(
        "phylum",
        TableClassifier::calls(&[("AAA", "Pseudomonadota", 0.9), ("CCC", "Bacillota", 0.9)]),
    );
    registry.insert(
        "family",
        TableClassifier::calls(&[
            ("AAA", "Enterobacteriaceae", 0.8),
            ("CCC", "Bacillaceae", 0.7),
            ("GGG", "different", 0.9),
        ]),
    );
    registry.insert(
        "Enterobacteriaceae",
        TableClassifier::calls(&[("AAA", "Salmonella", 0.6)]),
    );
    registry.insert(
        "Salmonella",
        TableClassifier::calls(&[("AAA", "Salmonella enterica", 0.75)]),
    );

    let engine = CascadeEngine::new(&hierarchy, &registry);
    let matrix = engine.run(&reads(), Topology::LclLcpn).unwrap();
    assert_rows_in_order(&matrix, 4);

    assert_eq!(label(&matrix, 0, Rank::Genus).as_deref(), Some("Salmonella"));
    assert_eq!(label(&matrix, 0, Rank::Species).as_deref(), Some("Salmonella enterica"));

    // Bacillaceae has no genus classifier
    assert_eq!(matrix.cell(1, Rank::Genus), Some(&RankCell::Missing));
    assert_eq!(matrix.cell(1, Rank::Species), Some(&RankCell::NotReached));

    // A sentinel family call is never routed
    assert_eq!(matrix.cell(2, Rank::Genus), Some(&RankCell::NotReached));
    // Failed family prediction
    assert_eq!(matrix.cell(3, Rank::Family), Some(&RankCell::Missing));
    assert_eq!(matrix.cell(3, Rank::Genus), Some(&RankCell::NotReached));
}

#[test]
fn test_hierarchical_constrains_and_renormalizes() {
    let hierarchy = hierarchy();
    let registry = ClassifierRegistry::in_memory();
    registry.insert(
        "phylum",
        TableClassifier::new(vec![
            ("AAA", vec![("Pseudomonadota", 0.6), ("Bacillota", 0.4)]),
            ("CCC", vec![("Bacillota", 0.9), ("Pseudomonadota", 0.1)]),
        ]),
    );
    registry.insert(
        "class",
        TableClassifier::new(vec![
            ("AAA", vec![("Bacilli", 0.7), ("Gammaproteobacteria", 0.3)]),
            ("CCC", vec![("Gammaproteobacteria", 1.0)]),
        ]),
    );
    registry.insert(
        "order",
        TableClassifier::new(vec![("AAA", vec![("Enterobacterales", 0.2), ("Bacillales", 0.8)])]),
    );
    registry.insert(
        "family",
        TableClassifier::new(vec![("AAA", vec![("Enterobacteriaceae", 0.1), ("Bacillaceae", 0.9)])]),
    );
    registry.insert(
        "genus",
        TableClassifier::new(vec![(
            "AAA",
            vec![("Escherichia", 0.12), ("Salmonella", 0.08), ("Bacillus", 0.8)],
        )]),
    );
    registry.insert(
        "species",
        TableClassifier::new(vec![(
            "AAA",
            vec![
                ("Escherichia coli", 0.05),
                ("Salmonella enterica", 0.9),
                ("Bacillus subtilis", 0.05),
            ],
        )]),
    );

    let engine = CascadeEngine::new(&hierarchy, &registry);
    let matrix = engine.run(&reads(), Topology::HierarchicalLcl).unwrap();
    assert_rows_in_order(&matrix, 4);

    let cell = |index: usize, rank: Rank| {
        matrix
            .cell(index, rank)
            .and_then(RankCell::prediction)
            .cloned()
            .unwrap()
    };

    assert_eq!(cell(0, Rank::Phylum).label, "Pseudomonadota");
    assert!((cell(0, Rank::Phylum).score - 0.6).abs() < 1e-12);
    assert_eq!(cell(0, Rank::Class).label, "Gammaproteobacteria");
    assert!((cell(0, Rank::Class).score - 1.0).abs() < 1e-12);

    let genus = cell(0, Rank::Genus);
    assert_eq!(genus.label, "Escherichia");
    assert!((genus.score - 0.6).abs() < 1e-12);
    assert_eq!(cell(0, Rank::Species).label, "Escherichia coli");

    // No class in the vocabulary descends from Bacillota
    assert_eq!(matrix.cell(1, Rank::Class), Some(&RankCell::Missing));
    assert_eq!(matrix.cell(1, Rank::Order), Some(&RankCell::NotReached));

    // Unknown to the phylum classifier
    assert_eq!(matrix.cell(2, Rank::Phylum), Some(&RankCell::Missing));
    assert_eq!(matrix.cell(2, Rank::Class), Some(&RankCell::NotReached));
}

#[test]
fn test_row_count_every_topology() {
    let hierarchy = hierarchy();
    let (registry, _, _) = lcpn_registry();
    let engine = CascadeEngine::new(&hierarchy, &registry);

    for topology in [
        Topology::Lcl,
        Topology::Lcpn,
        Topology::LclLcpn,
        Topology::HierarchicalLcl,
    ] {
        let matrix = engine.run(&reads(), topology).unwrap();
        assert_rows_in_order(&matrix, 4);
        assert_eq!(ThresholdEvaluator::default().evaluate(&matrix).len(), 4);
    }
}

#[test]
fn test_duplicate_read_index_rejected() {
    let hierarchy = hierarchy();
    let registry = ClassifierRegistry::in_memory();
    let engine = CascadeEngine::new(&hierarchy, &registry);

    let reads = vec![ReadRecord::new(0, "a", "AAA"), ReadRecord::new(0, "b", "CCC")];
    assert!(engine.run(&reads, Topology::Lcl).is_err());
}

#[test]
fn test_refine_species_by_coarse_genus() {
    let hierarchy = TaxonomyHierarchy::default();
    let registry = ClassifierRegistry::in_memory();
    registry.insert(
        "Escherichia",
        TableClassifier::calls(&[("AAA", "Escherichia coli", 0.8), ("CCC", "Escherichia albertii", 0.3)]),
    );

    let reads = vec![
        ReadRecord::new(0, "r0", "AAA"),
        ReadRecord::new(1, "r1", "CCC"),
        ReadRecord::new(2, "r2", "GGG"),
        ReadRecord::new(3, "r3", "TTT"),
    ];
    let genus: HashMap<String, String> = [("r0", "Escherichia"), ("r1", "Escherichia"), ("r2", "Bacillus")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    let engine = CascadeEngine::new(&hierarchy, &registry).with_min_score(0.5);
    let calls = engine.refine_species(&reads, &genus).unwrap();

    let ids: Vec<&str> = calls.iter().map(|c| c.read_id.as_str()).collect();
    assert_eq!(ids, vec!["r0", "r1", "r2", "r3"]);

    assert_eq!(calls[0].species, "Escherichia coli");
    // Below the minimum score
    assert_eq!(calls[1].species, "NA");
    assert!((calls[1].score - 0.3).abs() < 1e-12);
    // No classifier for the genus, or no genus at all
    assert_eq!(calls[2].species, "NA");
    assert!((calls[2].score - 0.49).abs() < 1e-12);
    assert_eq!(calls[3].species, "NA");
}

#[test]
fn test_cascade_into_ensemble() {
    let hierarchy = hierarchy();
    let (registry, _, _) = lcpn_registry();
    let engine = CascadeEngine::new(&hierarchy, &registry);
    let reads = reads();

    let matrix = engine.run(&reads, Topology::Lcpn).unwrap();
    let calls = ThresholdEvaluator::new(0.5).evaluate(&matrix);
    let e_coli = calls[0].lineage(&hierarchy);
    assert_eq!(e_coli.get(Rank::Family), "Enterobacteriaceae");
    assert_eq!(e_coli.get(Rank::Phylum), "Pseudomonadota");

    // Coarse classifier called the genus but named a different species
    let coarse = vec![ReadLineage::new(
        "r0",
        e_coli.clone().with(Rank::Species, "Escherichia fergusonii"),
    )];
    let specialized = vec![taxa_cascade::SpeciesCall::new("r0", "Escherichia coli", 0.52)];

    let merged = EnsembleCombiner::new().combine_all(&coarse, &specialized);
    assert_eq!(merged[0].lineage, e_coli);
}

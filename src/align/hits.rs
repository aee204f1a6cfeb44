use std::collections::HashMap;

use crate::parsing::sam::AlignmentRecord;

/// Best alignment of one read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BestHit {
    pub species: String,
    pub score: i64,
}

impl BestHit {
    /// Higher score wins; equal scores go to the lexicographically smaller species
    fn beats(&self, other: &BestHit) -> bool {
        self.score > other.score || (self.score == other.score && self.species < other.species)
    }
}

/// Best hit per read id
#[must_use]
pub fn best_hits(records: &[AlignmentRecord]) -> HashMap<String, BestHit> {
    let mut best: HashMap<String, BestHit> = HashMap::new();

    for record in records {
        let candidate = BestHit {
            species: record.species.clone(),
            score: record.score,
        };
        match best.get_mut(&record.read_id) {
            Some(current) if candidate.beats(current) => *current = candidate,
            Some(_) => {}
            None => {
                best.insert(record.read_id.clone(), candidate);
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(read: &str, species: &str, score: i64) -> AlignmentRecord {
        AlignmentRecord {
            read_id: read.to_string(),
            species: species.to_string(),
            score,
        }
    }

    #[test]
    fn test_highest_score_wins() {
        let hits = best_hits(&[
            record("r1", "Escherichia coli", 80),
            record("r1", "Escherichia fergusonii", 95),
            record("r2", "Escherichia albertii", 40),
        ]);

        assert_eq!(hits["r1"].species, "Escherichia fergusonii");
        assert_eq!(hits["r1"].score, 95);
        assert_eq!(hits["r2"].species, "Escherichia albertii");
    }

    #[test]
    fn test_ties_break_lexicographically() {
        let forward = best_hits(&[
            record("r1", "Escherichia fergusonii", 90),
            record("r1", "Escherichia coli", 90),
        ]);
        let reverse = best_hits(&[
            record("r1", "Escherichia coli", 90),
            record("r1", "Escherichia fergusonii", 90),
        ]);

        assert_eq!(forward["r1"].species, "Escherichia coli");
        assert_eq!(forward, reverse);
    }
}

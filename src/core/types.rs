use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Label used when no rank qualified for a read
pub const UNCLASSIFIED: &str = "unclassified";

/// Negative class of a binary one-vs-rest classifier
pub const DIFFERENT: &str = "different";

/// Cascade stopped above this rank
pub const NOT_APPLICABLE: &str = "na";

/// No call available (missing classifier, failed tool, low score)
pub const NOT_AVAILABLE: &str = "NA";

/// Lineage filler for taxa the taxonomy database could not resolve
pub const OTHER: &str = "other";

/// Number of ranks in a lineage
pub const RANK_COUNT: usize = 6;

/// Taxonomic rank, ordered fine to coarse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rank {
    Species,
    Genus,
    Family,
    Order,
    Class,
    Phylum,
}

impl Rank {
    /// All ranks, most specific first
    pub const ALL: [Rank; RANK_COUNT] = [
        Rank::Species,
        Rank::Genus,
        Rank::Family,
        Rank::Order,
        Rank::Class,
        Rank::Phylum,
    ];

    /// Position in [`Rank::ALL`]
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::Species => 0,
            Self::Genus => 1,
            Self::Family => 2,
            Self::Order => 3,
            Self::Class => 4,
            Self::Phylum => 5,
        }
    }

    /// The next rank towards phylum
    #[must_use]
    pub fn coarser(self) -> Option<Rank> {
        Self::ALL.get(self.index() + 1).copied()
    }

    /// The next rank towards species
    #[must_use]
    pub fn finer(self) -> Option<Rank> {
        self.index().checked_sub(1).map(|i| Self::ALL[i])
    }

    /// Ranks ordered phylum first, as a cascade visits them
    pub fn top_down() -> impl Iterator<Item = Rank> {
        Self::ALL.into_iter().rev()
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Species => "species",
            Self::Genus => "genus",
            Self::Family => "family",
            Self::Order => "order",
            Self::Class => "class",
            Self::Phylum => "phylum",
        }
    }

    /// Map an NCBI rank string onto one of the six ranks
    #[must_use]
    pub fn from_ncbi(s: &str) -> Option<Self> {
        s.parse().ok()
    }
}

impl std::fmt::Display for Rank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Rank {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "species" => Ok(Self::Species),
            "genus" => Ok(Self::Genus),
            "family" => Ok(Self::Family),
            "order" => Ok(Self::Order),
            "class" => Ok(Self::Class),
            "phylum" => Ok(Self::Phylum),
            other => Err(format!("unknown rank: {other}")),
        }
    }
}

/// True for labels a classifier emits in place of a taxon
#[must_use]
pub fn is_control_label(label: &str) -> bool {
    matches!(label, DIFFERENT | NOT_APPLICABLE | NOT_AVAILABLE)
}

/// True when a lineage cell carries no usable call.
///
/// `unclassified`, `NA`, `na` and `nan` are treated as synonyms.
#[must_use]
pub fn is_absent(value: &str) -> bool {
    let value = value.trim();
    value.is_empty()
        || value == UNCLASSIFIED
        || value.eq_ignore_ascii_case("na")
        || value.eq_ignore_ascii_case("nan")
}

/// Inference topology run by the cascade engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Topology {
    /// Independent classifier per rank
    #[default]
    Lcl,
    /// Classifier per taxonomy node, cascading phylum to species
    Lcpn,
    /// Independent ranks down to family, cascading genus and species
    LclLcpn,
    /// Independent ranks constrained by the hierarchy and renormalized
    HierarchicalLcl,
}

impl std::fmt::Display for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lcl => write!(f, "LCL"),
            Self::Lcpn => write!(f, "LCPN"),
            Self::LclLcpn => write!(f, "LCL-LCPN"),
            Self::HierarchicalLcl => write!(f, "hierarchy-informed LCL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_navigation() {
        assert_eq!(Rank::Species.coarser(), Some(Rank::Genus));
        assert_eq!(Rank::Phylum.coarser(), None);
        assert_eq!(Rank::Phylum.finer(), Some(Rank::Class));
        assert_eq!(Rank::Species.finer(), None);

        let top_down: Vec<Rank> = Rank::top_down().collect();
        assert_eq!(top_down.first(), Some(&Rank::Phylum));
        assert_eq!(top_down.last(), Some(&Rank::Species));
    }

    #[test]
    fn test_rank_parse() {
        assert_eq!("Class".parse::<Rank>(), Ok(Rank::Class));
        assert_eq!(Rank::from_ncbi("superkingdom"), None);
        for rank in Rank::ALL {
            assert_eq!(rank.as_str().parse::<Rank>(), Ok(rank));
        }
    }

    #[test]
    fn test_sentinels() {
        assert!(is_control_label("different"));
        assert!(is_control_label("na"));
        assert!(is_control_label("NA"));
        assert!(!is_control_label("Escherichia"));

        assert!(is_absent("unclassified"));
        assert!(is_absent("nan"));
        assert!(is_absent(" "));
        assert!(!is_absent("Escherichia coli"));
    }
}

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info, warn};

use super::db::{RankedNames, TaxonomyDb};
use crate::core::lineage::{Lineage, LineageTable};
use crate::core::types::{is_absent, Rank, OTHER, UNCLASSIFIED};

/// Lineages of the taxa a classifier set covers, plus the parent/child index
/// the cascade routes on
#[derive(Debug, Clone, Default)]
pub struct TaxonomyHierarchy {
    table: LineageTable,
    /// (rank, name) -> names at the next finer rank
    children: HashMap<(Rank, String), BTreeSet<String>>,
    /// (rank, name) -> lineage of that node, finer ranks unclassified
    nodes: HashMap<(Rank, String), Lineage>,
}

impl TaxonomyHierarchy {
    /// Resolve every taxon through `db`. Never fails: a taxon the database
    /// cannot resolve gets the `other` lineage.
    pub fn build<S: AsRef<str>>(taxa: &[S], db: &dyn TaxonomyDb) -> Self {
        let mut table = LineageTable::new();
        let mut unresolved = 0usize;

        for taxon in taxa {
            let taxon = taxon.as_ref().trim();
            if taxon.is_empty() || table.get(taxon).is_some() {
                continue;
            }
            let lineage = resolve_lineage(taxon, db);
            if lineage == Lineage::other() {
                unresolved += 1;
            }
            table.insert(taxon, lineage);
        }

        if unresolved > 0 {
            warn!(unresolved, "Taxa not found in the taxonomy database");
        }
        info!(taxa = table.len(), "Built taxonomy hierarchy");
        Self::from_table(table)
    }

    /// Index an already resolved table
    #[must_use]
    pub fn from_table(table: LineageTable) -> Self {
        let mut children: HashMap<(Rank, String), BTreeSet<String>> = HashMap::new();
        let mut nodes: HashMap<(Rank, String), Lineage> = HashMap::new();

        for (_, lineage) in table.iter() {
            for rank in Rank::ALL {
                let name = lineage.get(rank);
                if !is_known(name) {
                    continue;
                }

                nodes
                    .entry((rank, name.to_string()))
                    .or_insert_with(|| node_lineage(lineage, rank));

                if let Some(finer) = rank.finer() {
                    let child = lineage.get(finer);
                    if is_known(child) {
                        children
                            .entry((rank, name.to_string()))
                            .or_default()
                            .insert(child.to_string());
                    }
                }
            }
        }

        Self {
            table,
            children,
            nodes,
        }
    }

    /// Name of `taxon`'s ancestor at `rank`, or `unclassified`
    #[must_use]
    pub fn query(&self, taxon: &str, rank: Rank) -> &str {
        self.table
            .get(taxon)
            .map_or(UNCLASSIFIED, |lineage| lineage.get(rank))
    }

    /// Names at the next finer rank below `(rank, name)`, sorted
    #[must_use]
    pub fn children(&self, rank: Rank, name: &str) -> Vec<&str> {
        self.children
            .get(&(rank, name.to_string()))
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// True when `child` at `child_rank` sits below `parent` at `parent_rank`
    #[must_use]
    pub fn is_descendant(
        &self,
        parent_rank: Rank,
        parent: &str,
        child_rank: Rank,
        child: &str,
    ) -> bool {
        if child_rank >= parent_rank {
            return false;
        }
        self.lineage_of(child_rank, child)
            .is_some_and(|lineage| lineage.get(parent_rank) == parent)
    }

    /// Lineage of the node `name` at `rank`; finer ranks are unclassified
    #[must_use]
    pub fn lineage_of(&self, rank: Rank, name: &str) -> Option<&Lineage> {
        self.nodes.get(&(rank, name.to_string()))
    }

    /// Lineage for a final call, or unclassified when nothing is known about it
    #[must_use]
    pub fn expand(&self, rank: Rank, name: &str) -> Lineage {
        self.lineage_of(rank, name)
            .cloned()
            .unwrap_or_else(|| Lineage::unclassified().with(rank, name))
    }

    #[must_use]
    pub fn table(&self) -> &LineageTable {
        &self.table
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

fn is_known(name: &str) -> bool {
    !is_absent(name) && name != OTHER
}

fn node_lineage(lineage: &Lineage, rank: Rank) -> Lineage {
    let mut node = lineage.clone();
    for finer in Rank::ALL.into_iter().take(rank.index()) {
        node.set(finer, UNCLASSIFIED);
    }
    node
}

fn lineage_from(names: RankedNames) -> Lineage {
    let mut lineage = Lineage::unclassified();
    for (rank, name) in names {
        lineage.set(rank, name);
    }
    lineage
}

/// Resolve one taxon, retrying a binomial name through its genus
fn resolve_lineage(taxon: &str, db: &dyn TaxonomyDb) -> Lineage {
    match db.resolve(taxon) {
        Ok(names) if !names.is_empty() => return lineage_from(names),
        Ok(_) => debug!(taxon, "Taxonomy returned no ranks"),
        Err(err) => debug!(taxon, error = %err, "Taxonomy lookup failed"),
    }

    if let Some((genus, _)) = taxon.split_once(char::is_whitespace) {
        if let Ok(names) = db.resolve(genus) {
            if !names.is_empty() {
                debug!(taxon, genus, "Resolved through genus");
                return lineage_from(names).with(Rank::Species, taxon);
            }
        }
    }

    Lineage::other()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::db::TsvTaxonomy;

    const TABLE: &str = "taxon\tspecies\tgenus\tfamily\torder\tclass\tphylum
Escherichia coli\tEscherichia coli\tEscherichia\tEnterobacteriaceae\tEnterobacterales\tGammaproteobacteria\tPseudomonadota
Escherichia fergusonii\tEscherichia fergusonii\tEscherichia\tEnterobacteriaceae\tEnterobacterales\tGammaproteobacteria\tPseudomonadota
Salmonella enterica\tSalmonella enterica\tSalmonella\tEnterobacteriaceae\tEnterobacterales\tGammaproteobacteria\tPseudomonadota
Bacillus subtilis\tBacillus subtilis\tBacillus\tBacillaceae\tBacillales\tBacilli\tBacillota
";

    fn hierarchy(taxa: &[&str]) -> TaxonomyHierarchy {
        let db = TsvTaxonomy::from_reader(TABLE.as_bytes()).unwrap();
        TaxonomyHierarchy::build(taxa, &db)
    }

    #[test]
    fn test_build_and_query() {
        let h = hierarchy(&["Escherichia coli", "Bacillus subtilis"]);

        assert_eq!(h.len(), 2);
        assert_eq!(h.query("Escherichia coli", Rank::Genus), "Escherichia");
        assert_eq!(h.query("Bacillus subtilis", Rank::Phylum), "Bacillota");
        assert_eq!(h.query("Homo sapiens", Rank::Phylum), "unclassified");
    }

    #[test]
    fn test_unresolved_taxon_is_other() {
        let h = hierarchy(&["Nonexistent thing"]);
        assert_eq!(h.query("Nonexistent thing", Rank::Family), "other");
    }

    #[test]
    fn test_binomial_retries_through_genus() {
        let h = hierarchy(&["Escherichia albertii"]);

        assert_eq!(h.query("Escherichia albertii", Rank::Species), "Escherichia albertii");
        assert_eq!(h.query("Escherichia albertii", Rank::Family), "Enterobacteriaceae");
    }

    #[test]
    fn test_children_sorted() {
        let h = hierarchy(&[
            "Salmonella enterica",
            "Escherichia fergusonii",
            "Escherichia coli",
            "Bacillus subtilis",
        ]);

        assert_eq!(
            h.children(Rank::Family, "Enterobacteriaceae"),
            vec!["Escherichia", "Salmonella"]
        );
        assert_eq!(
            h.children(Rank::Genus, "Escherichia"),
            vec!["Escherichia coli", "Escherichia fergusonii"]
        );
        assert_eq!(h.children(Rank::Class, "Bacilli"), vec!["Bacillales"]);
        assert!(h.children(Rank::Species, "Escherichia coli").is_empty());
    }

    #[test]
    fn test_is_descendant() {
        let h = hierarchy(&["Escherichia coli", "Bacillus subtilis"]);

        assert!(h.is_descendant(Rank::Phylum, "Pseudomonadota", Rank::Class, "Gammaproteobacteria"));
        assert!(h.is_descendant(Rank::Family, "Enterobacteriaceae", Rank::Species, "Escherichia coli"));
        assert!(!h.is_descendant(Rank::Phylum, "Bacillota", Rank::Class, "Gammaproteobacteria"));
        assert!(!h.is_descendant(Rank::Genus, "Escherichia", Rank::Genus, "Escherichia"));
    }

    #[test]
    fn test_lineage_of_internal_node() {
        let h = hierarchy(&["Escherichia coli"]);
        let lineage = h.lineage_of(Rank::Family, "Enterobacteriaceae").unwrap();

        assert_eq!(lineage.get(Rank::Species), "unclassified");
        assert_eq!(lineage.get(Rank::Genus), "unclassified");
        assert_eq!(lineage.get(Rank::Family), "Enterobacteriaceae");
        assert_eq!(lineage.get(Rank::Phylum), "Pseudomonadota");

        let unknown = h.expand(Rank::Genus, "Shigella");
        assert_eq!(unknown.get(Rank::Genus), "Shigella");
        assert_eq!(unknown.get(Rank::Phylum), "unclassified");
    }
}

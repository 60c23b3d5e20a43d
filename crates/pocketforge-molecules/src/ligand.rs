//! Candidate and reference molecules.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::smiles::MolecularGraph;

/// A generated or reference molecule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Molecule {
    pub id: Uuid,
    pub notation: String,
    pub name: Option<String>,
    pub atom_count: Option<usize>,
    pub bond_count: Option<usize>,
    pub heteroatom_count: Option<usize>,
    /// Where the molecule came from ("sampler", "reference", ...)
    pub source: String,
}

impl Molecule {
    /// Create a new molecule from its notation.
    pub fn new(notation: &str, source: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            notation: notation.to_string(),
            name: None,
            atom_count: None,
            bond_count: None,
            heteroatom_count: None,
            source: source.to_string(),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Fill the topology counts from a parsed graph.
    pub fn with_graph(mut self, graph: &MolecularGraph) -> Self {
        self.atom_count = Some(graph.len());
        self.bond_count = Some(graph.bond_count());
        self.heteroatom_count = Some(graph.heteroatom_count());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pocketforge_common::PeriodicTable;

    #[test]
    fn test_molecule_counts() {
        let graph = MolecularGraph::parse("CCO", &PeriodicTable::standard()).unwrap();
        let m = Molecule::new("CCO", "sampler").with_graph(&graph).with_name("ethanol");
        assert_eq!(m.atom_count, Some(3));
        assert_eq!(m.bond_count, Some(2));
        assert_eq!(m.heteroatom_count, Some(1));
        assert_eq!(m.name.as_deref(), Some("ethanol"));
        assert_ne!(m.id, Molecule::new("CCO", "sampler").id);
    }
}

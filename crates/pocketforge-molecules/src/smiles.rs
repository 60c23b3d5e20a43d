//! Linear molecule-notation (SMILES subset) parsing.
//!
//! Only atoms are interpreted. Bonds, ring closures, branches and stereo
//! marks are validated and skipped; each atom is bonded to the atom parsed
//! before it, and `.` starts a new fragment.

use serde::{Deserialize, Serialize};
use tracing::debug;

use pocketforge_common::{PeriodicTable, PocketForgeError, Result};

/// Atom graph sufficient for fingerprinting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MolecularGraph {
    atomic_numbers: Vec<u8>,
    adjacency: Vec<Vec<usize>>,
}

impl MolecularGraph {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a graph from atomic numbers and undirected edges.
    pub fn from_edges(atomic_numbers: Vec<u8>, edges: &[(usize, usize)]) -> Result<Self> {
        let n = atomic_numbers.len();
        let mut adjacency = vec![Vec::new(); n];
        for &(a, b) in edges {
            if a >= n || b >= n || a == b {
                return Err(PocketForgeError::InvalidInput(format!(
                    "edge ({a}, {b}) invalid for {n} atoms"
                )));
            }
            adjacency[a].push(b);
            adjacency[b].push(a);
        }
        Ok(Self { atomic_numbers, adjacency })
    }

    /// Parse a notation string; any malformed input is a `Parse` error.
    pub fn parse(notation: &str, table: &PeriodicTable) -> Result<Self> {
        Parser::new(notation, table).run()
    }

    /// Parse, returning an empty graph on failure.
    pub fn parse_lenient(notation: &str, table: &PeriodicTable) -> Self {
        match Self::parse(notation, table) {
            Ok(graph) => graph,
            Err(e) => {
                debug!("Treating unparseable notation as empty: {}", e);
                Self::empty()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.atomic_numbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atomic_numbers.is_empty()
    }

    pub fn atomic_number(&self, atom: usize) -> u8 {
        self.atomic_numbers[atom]
    }

    pub fn atomic_numbers(&self) -> &[u8] {
        &self.atomic_numbers
    }

    pub fn neighbors(&self, atom: usize) -> &[usize] {
        &self.adjacency[atom]
    }

    pub fn degree(&self, atom: usize) -> usize {
        self.adjacency[atom].len()
    }

    pub fn bond_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum::<usize>() / 2
    }

    /// Atoms other than carbon and hydrogen.
    pub fn heteroatom_count(&self) -> usize {
        self.atomic_numbers.iter().filter(|&&z| z != 6 && z != 1).count()
    }
}

struct Parser<'a> {
    input: &'a str,
    chars: Vec<char>,
    pos: usize,
    table: &'a PeriodicTable,
    graph: MolecularGraph,
    previous: Option<usize>,
    open_branches: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str, table: &'a PeriodicTable) -> Self {
        Self {
            input,
            chars: input.trim().chars().collect(),
            pos: 0,
            table,
            graph: MolecularGraph::empty(),
            previous: None,
            open_branches: 0,
        }
    }

    fn fail(&self, reason: impl Into<String>) -> PocketForgeError {
        PocketForgeError::parse(self.input, reason)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn run(mut self) -> Result<MolecularGraph> {
        if self.chars.is_empty() {
            return Err(self.fail("empty notation"));
        }

        while let Some(c) = self.peek() {
            self.pos += 1;
            match c {
                'B' if self.peek() == Some('r') => {
                    self.pos += 1;
                    self.add_atom("Br")?;
                }
                'C' if self.peek() == Some('l') => {
                    self.pos += 1;
                    self.add_atom("Cl")?;
                }
                'B' | 'C' | 'N' | 'O' | 'P' | 'S' | 'F' | 'I' => self.add_atom(&c.to_string())?,
                'b' | 'c' | 'n' | 'o' | 'p' | 's' => self.add_atom(&c.to_ascii_uppercase().to_string())?,
                '[' => self.bracket_atom()?,
                '(' => self.open_branches += 1,
                ')' => {
                    if self.open_branches == 0 {
                        return Err(self.fail(format!("unmatched ')' at {}", self.pos - 1)));
                    }
                    self.open_branches -= 1;
                }
                '.' => self.previous = None,
                '-' | '=' | '#' | '$' | ':' | '/' | '\\' | '@' => {}
                '0'..='9' => {}
                '%' => {
                    let two_digits = self.chars.get(self.pos..self.pos + 2)
                        .is_some_and(|d| d.iter().all(char::is_ascii_digit));
                    if !two_digits {
                        return Err(self.fail("'%' must be followed by two digits"));
                    }
                    self.pos += 2;
                }
                other => return Err(self.fail(format!("unexpected character {other:?} at {}", self.pos - 1))),
            }
        }

        if self.open_branches > 0 {
            return Err(self.fail("unbalanced parentheses"));
        }
        Ok(self.graph)
    }

    /// `[13CH3+]`, `[nH]`, `[Fe+2]`: isotope, chirality, H count and charge are ignored.
    fn bracket_atom(&mut self) -> Result<()> {
        let start = self.pos;
        let Some(len) = self.chars[start..].iter().position(|&c| c == ']') else {
            return Err(self.fail("unterminated bracket atom"));
        };
        let body: Vec<char> = self.chars[start..start + len].to_vec();
        self.pos = start + len + 1;

        let rest: Vec<char> = body.iter().copied().skip_while(char::is_ascii_digit).collect();
        let Some(&first) = rest.first() else {
            return Err(self.fail("bracket atom without element"));
        };
        if !first.is_ascii_alphabetic() {
            return Err(self.fail(format!("bracket atom starts with {first:?}")));
        }

        let head = first.to_ascii_uppercase();
        if let Some(&second) = rest.get(1).filter(|c| c.is_ascii_lowercase()) {
            let two = format!("{head}{second}");
            if self.table.lookup(&two).is_some() {
                return self.add_atom(&two);
            }
        }
        self.add_atom(&head.to_string())
    }

    fn add_atom(&mut self, symbol: &str) -> Result<()> {
        let Some(z) = self.table.atomic_number(symbol) else {
            return Err(self.fail(format!("unknown element {symbol:?}")));
        };
        let idx = self.graph.atomic_numbers.len();
        self.graph.atomic_numbers.push(z);
        self.graph.adjacency.push(Vec::new());
        if let Some(prev) = self.previous {
            self.graph.adjacency[prev].push(idx);
            self.graph.adjacency[idx].push(prev);
        }
        self.previous = Some(idx);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(s: &str) -> Result<MolecularGraph> {
        MolecularGraph::parse(s, &PeriodicTable::standard())
    }

    #[test]
    fn test_linear_backbone() {
        let g = parse("CC(=O)O").unwrap();
        assert_eq!(g.atomic_numbers(), &[6, 6, 8, 8]);
        assert_eq!(g.neighbors(0), &[1]);
        assert_eq!(g.neighbors(1), &[0, 2]);
        assert_eq!(g.neighbors(3), &[2]);
        assert_eq!(g.bond_count(), 3);
    }

    #[test]
    fn test_two_letter_and_aromatic_atoms() {
        let g = parse("ClCBr.c1ccncc1").unwrap();
        assert_eq!(g.atomic_numbers(), &[17, 6, 35, 6, 6, 6, 7, 6, 6]);
        // fragment break between Br and the ring
        assert_eq!(g.degree(2), 1);
        assert_eq!(g.degree(3), 1);
        assert_eq!(g.heteroatom_count(), 3);
    }

    #[test]
    fn test_bracket_atoms() {
        let g = parse("[13CH3][NH3+][Fe+2][nH][Se]").unwrap();
        assert_eq!(g.atomic_numbers(), &[6, 7, 26, 7, 34]);
    }

    #[test]
    fn test_ring_closure_percent() {
        let g = parse("C%12CCCC%12").unwrap();
        assert_eq!(g.len(), 5);
    }

    #[test]
    fn test_invalid_inputs() {
        for bad in ["", "   ", "C(C", "CC)", "C[CH3", "CXC", "C%1", "[Xx]", "C C", "[]"] {
            assert!(
                matches!(parse(bad), Err(PocketForgeError::Parse { .. })),
                "{bad:?} should fail"
            );
        }
    }

    #[test]
    fn test_parse_lenient() {
        let table = PeriodicTable::standard();
        assert!(MolecularGraph::parse_lenient("C(C", &table).is_empty());
        assert_eq!(MolecularGraph::parse_lenient("CCO", &table).len(), 3);
    }

    #[test]
    fn test_from_edges() {
        let g = MolecularGraph::from_edges(vec![6, 6, 8], &[(0, 1), (1, 2), (2, 0)]).unwrap();
        assert_eq!(g.bond_count(), 3);
        assert!(MolecularGraph::from_edges(vec![6], &[(0, 1)]).is_err());
    }
}

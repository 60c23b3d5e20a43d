//! Molecular fingerprints and Tanimoto similarity.
//!
//! Every fingerprint kind has one canonical generator; `FingerprintKind`
//! dispatches to it through the `FingerprintScheme` trait.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::reference::ReferenceLibrary;
use crate::smiles::MolecularGraph;
use pocketforge_common::{FingerprintConfig, FingerprintKind, PeriodicTable};

/// Canonical fingerprint length.
pub const DEFAULT_FP_LENGTH: usize = 512;

// ── Bit vector ───────────────────────────────────────────────────────────────

/// Fixed-length packed bit vector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "FingerprintRepr", into = "FingerprintRepr")]
pub struct Fingerprint {
    length: usize,
    words: Vec<u64>,
}

/// On-disk form: `{ "length": n, "on_bits": [..] }`.
#[derive(Serialize, Deserialize)]
struct FingerprintRepr {
    length: usize,
    on_bits: Vec<usize>,
}

impl From<Fingerprint> for FingerprintRepr {
    fn from(fp: Fingerprint) -> Self {
        Self {
            length: fp.length,
            on_bits: fp.on_bits(),
        }
    }
}

impl TryFrom<FingerprintRepr> for Fingerprint {
    type Error = String;

    fn try_from(repr: FingerprintRepr) -> Result<Self, Self::Error> {
        let mut fp = Fingerprint::new(repr.length);
        for bit in repr.on_bits {
            if bit >= repr.length {
                return Err(format!("bit {bit} out of range for length {}", repr.length));
            }
            fp.set(bit);
        }
        Ok(fp)
    }
}

impl Fingerprint {
    /// All-zero fingerprint.
    pub fn new(length: usize) -> Self {
        Self {
            length,
            words: vec![0; length.div_ceil(64)],
        }
    }

    pub fn from_bits(length: usize, bits: impl IntoIterator<Item = usize>) -> Self {
        let mut fp = Self::new(length);
        for bit in bits {
            if bit < length {
                fp.set(bit);
            }
        }
        fp
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn set(&mut self, bit: usize) {
        debug_assert!(bit < self.length);
        self.words[bit / 64] |= 1u64 << (bit % 64);
    }

    pub fn get(&self, bit: usize) -> bool {
        bit < self.length && self.words[bit / 64] & (1u64 << (bit % 64)) != 0
    }

    /// Set `hash` folded onto the vector (`|hash| mod length`).
    fn set_hash(&mut self, hash: i32) {
        if self.length > 0 {
            self.set(hash.unsigned_abs() as usize % self.length);
        }
    }

    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_zero(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    pub fn on_bits(&self) -> Vec<usize> {
        (0..self.length).filter(|&i| self.get(i)).collect()
    }

    /// `|a ∧ b| / |a ∨ b|`; 0 for an empty union or mismatched lengths.
    pub fn tanimoto(&self, other: &Fingerprint) -> f64 {
        if self.length != other.length {
            return 0.0;
        }
        let (mut both, mut either) = (0u32, 0u32);
        for (a, b) in self.words.iter().zip(&other.words) {
            both += (a & b).count_ones();
            either += (a | b).count_ones();
        }
        if either == 0 {
            0.0
        } else {
            both as f64 / either as f64
        }
    }
}

// ── Generators ───────────────────────────────────────────────────────────────

/// Morgan / ECFP-style circular fingerprint.
#[derive(Debug, Clone, Copy)]
pub struct MorganGenerator {
    pub radius: usize,
    pub length: usize,
}

impl Default for MorganGenerator {
    fn default() -> Self {
        Self { radius: 2, length: DEFAULT_FP_LENGTH }
    }
}

impl MorganGenerator {
    pub fn from_config(config: &FingerprintConfig) -> Self {
        Self {
            radius: config.radius,
            length: config.fp_length,
        }
    }

    /// Every atom hash at every radius sets one bit. Neighbour hashes are
    /// sorted before folding, so adjacency order does not matter.
    pub fn generate(&self, graph: &MolecularGraph, table: &PeriodicTable) -> Fingerprint {
        let mut fp = Fingerprint::new(self.length);
        let n = graph.len();

        let mut hashes: Vec<i32> = (0..n)
            .map(|a| {
                let weight = table.feature_weight(graph.atomic_number(a));
                weight.wrapping_add((graph.degree(a) as i32).wrapping_mul(31))
            })
            .collect();
        for &h in &hashes {
            fp.set_hash(h);
        }

        for _ in 0..self.radius {
            hashes = (0..n)
                .map(|a| {
                    let mut around: Vec<i32> = graph.neighbors(a).iter().map(|&b| hashes[b]).collect();
                    around.sort_unstable();
                    around.iter().fold(hashes[a], |h, &nh| h.wrapping_mul(31).wrapping_add(nh))
                })
                .collect();
            for &h in &hashes {
                fp.set_hash(h);
            }
        }
        fp
    }
}

pub fn ecfp4(graph: &MolecularGraph, length: usize, table: &PeriodicTable) -> Fingerprint {
    MorganGenerator { radius: 2, length }.generate(graph, table)
}

/// Pharmacophore flags of one atom, as a bit-weighted hash.
fn pharmacophore_hash(atomic_number: u8, degree: usize) -> i32 {
    let mut hash = 0;
    if atomic_number == 6 || atomic_number == 16 {
        hash += 1; // hydrophobic
    }
    if atomic_number == 7 && degree >= 3 {
        hash += 2; // donor
    }
    if matches!(atomic_number, 7 | 8 | 9) {
        hash += 4; // acceptor
    }
    if atomic_number == 7 && degree == 4 {
        hash += 8; // positive
    }
    if atomic_number == 8 && degree == 1 {
        hash += 16; // negative
    }
    hash
}

/// Pharmacophore fingerprint: one bit per atom at `feature hash + Z`.
pub fn phfp(graph: &MolecularGraph, length: usize) -> Fingerprint {
    let mut fp = Fingerprint::new(length);
    for a in 0..graph.len() {
        let z = graph.atomic_number(a);
        fp.set_hash(pharmacophore_hash(z, graph.degree(a)) + z as i32);
    }
    fp
}

/// Topology fingerprint: atom, bond and heteroatom counts.
pub fn stfp(graph: &MolecularGraph, length: usize) -> Fingerprint {
    let mut fp = Fingerprint::new(length);
    fp.set_hash(graph.len() as i32);
    fp.set_hash(graph.bond_count() as i32 + 100);
    fp.set_hash(graph.heteroatom_count() as i32 + 200);
    fp
}

/// First half ECFP4, second half the first half of a PHFP.
pub fn fused_ecfp4_phfp(graph: &MolecularGraph, length: usize, table: &PeriodicTable) -> Fingerprint {
    let half = length / 2;
    let ecfp = ecfp4(graph, length, table);
    let pharm = phfp(graph, length);

    let mut fp = Fingerprint::new(length);
    for i in 0..half {
        if ecfp.get(i) {
            fp.set(i);
        }
        if pharm.get(i) {
            fp.set(half + i);
        }
    }
    fp
}

// ── Scheme capability ────────────────────────────────────────────────────────

/// What a fingerprint family can do.
pub trait FingerprintScheme {
    fn fingerprint(&self, graph: &MolecularGraph, length: usize, table: &PeriodicTable) -> Fingerprint;

    fn similarity(&self, a: &Fingerprint, b: &Fingerprint) -> f64 {
        a.tanimoto(b)
    }

    /// Similarity of a candidate to a library's consensus.
    fn score(&self, candidate: &Fingerprint, library: &ReferenceLibrary) -> f64 {
        self.similarity(candidate, &library.consensus)
    }
}

impl FingerprintScheme for FingerprintKind {
    fn fingerprint(&self, graph: &MolecularGraph, length: usize, table: &PeriodicTable) -> Fingerprint {
        match self {
            FingerprintKind::Ecfp4 => ecfp4(graph, length, table),
            FingerprintKind::Phfp => phfp(graph, length),
            FingerprintKind::Stfp => stfp(graph, length),
            FingerprintKind::FusedEcfp4Phfp => fused_ecfp4_phfp(graph, length, table),
        }
    }
}

/// Fingerprint many graphs in parallel, preserving order.
pub fn fingerprint_all<S>(scheme: &S, graphs: &[MolecularGraph], length: usize, table: &PeriodicTable) -> Vec<Fingerprint>
where
    S: FingerprintScheme + Sync,
{
    graphs
        .par_iter()
        .map(|g| scheme.fingerprint(g, length, table))
        .collect()
}
